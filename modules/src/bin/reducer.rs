//! `tmcp-reducer`: computes derived outputs from a list of named rules,
//! in multiple sweeps per record, with cross-record retention (spec 4.11).

use std::time::{SystemTime, UNIX_EPOCH};

use tmcp_modules_common::{bootstrap, load_required_module_config, maybe_spawn_stats, Bootstrap, ModuleError};
use tmcp_reducer::{Reducer, ReducerConfig};
use tmcp_transport::{ReadOptions, Source, Target, WriteOptions};

const MODULE: &str = "reducer";
const TAG: &str = "reduc";

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

    let config: ReducerConfig = load_required_module_config(&ctx, MODULE)?;
    let mut reducer = Reducer::build(config)?;

    let stdin_policy = ctx.policy("stdin", None, None);
    let stdout_policy = ctx.policy("stdout", None, None);
    let do_tag = ctx.do_tag;
    let out_protocol = ctx.out_protocol;
    let verbose_output = ctx.verbose_output;
    let termination = ctx.termination;
    let reducer_logger = logger.clone();
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
        move |record| {
            let mut out = reducer.process(&record, now_ms());
            let dropped = out.data.is_empty();
            if dropped {
                reducer_logger.warn("reducer rule failed, dropping record");
            } else {
                out.meta.append_tag(TAG, do_tag);
            }
            let logger = reducer_logger.clone();
            let stats = stats.clone();
            async move {
                if dropped {
                    return;
                }
                if let Some(stats) = &stats {
                    stats.record(&out, now_ms());
                }
                let _ = tmcp_transport::write(
                    &out,
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
