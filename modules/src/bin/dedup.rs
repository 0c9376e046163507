//! `tmcp-dedup`: forwards only records whose `data` changed meaningfully
//! versus the last one emitted (spec 4.6).

use std::time::{SystemTime, UNIX_EPOCH};

use tmcp_modules_common::{bootstrap, load_module_config, maybe_spawn_stats, Bootstrap, ModuleError};
use tmcp_primitives::{Dedup, DedupConfig};
use tmcp_transport::{ReadOptions, Source, Target, WriteOptions};

const MODULE: &str = "dedup";
const TAG: &str = "dedup";

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as i64
}

#[tokio::main]
async fn main() -> Result<(), ModuleError> {
    let boot = bootstrap(MODULE, |_| Ok(()))?;
    let Bootstrap { ctx, logger, .. } = boot;

    let config: DedupConfig = load_module_config(&ctx, MODULE)?;
    let debug = config.debug;
    let mut dedup = Dedup::new(config);

    let stdin_policy = ctx.policy("stdin", None, None);
    let stdout_policy = ctx.policy("stdout", None, None);
    let do_tag = ctx.do_tag;
    let out_protocol = ctx.out_protocol;
    let verbose_output = ctx.verbose_output;
    let termination = ctx.termination;
    let dedup_logger = logger.clone();
    let stats = maybe_spawn_stats(&ctx, &logger);

    tmcp_transport::read(
        Source::Stdin,
        ReadOptions {
            channel_id: "stdin".into(),
            protocol: ctx.in_protocol,
            policy: stdin_policy,
            termination,
            verbose_input: ctx.verbose_input,
            logger: logger.clone(),
        },
        move |mut record| {
            let forward = dedup.should_forward(&record.data);
            if !forward && debug {
                dedup_logger.info("dropped duplicate record");
            }
            let logger = dedup_logger.clone();
            let stats = stats.clone();
            async move {
                if !forward {
                    return;
                }
                record.meta.append_tag(TAG, do_tag);
                if let Some(stats) = &stats {
                    stats.record(&record, now_ms());
                }
                let _ = tmcp_transport::write(
                    &record,
                    Target::Stdout,
                    WriteOptions {
                        channel_id: "stdout".into(),
                        protocol: out_protocol,
                        policy: stdout_policy,
                        termination,
                        verbose_output,
                        logger,
                    },
                )
                .await;
            }
        },
    )
    .await?;

    Ok(())
}
