//! `tmcp-split`: copies every record to stdout and to N side FIFOs/files
//! given as positionals, in a failure-isolated way (spec 4.7).

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tmcp_config::{GetOptions, PositionalSlot};
use tmcp_modules_common::{bootstrap, maybe_spawn_stats, Bootstrap, ModuleError};
use tmcp_primitives::SplitTargets;
use tmcp_transport::{ensure_path_exists, FifoWriter, Protocol, ReadOptions, Source, Target, WriteOptions};

const MODULE: &str = "split";
const TAG: &str = "splt";

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as i64
}

#[tokio::main]
async fn main() -> Result<(), ModuleError> {
    let boot = bootstrap(MODULE, |reg| {
        reg.register_positionals(vec![PositionalSlot::variadic("sides")])?;
        Ok(())
    })?;
    let Bootstrap { ctx, logger, accessor, .. } = boot;

    let sides: Vec<String> = accessor
        .get("positionals.sides", GetOptions::default())
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default()
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    let targets = SplitTargets::new(sides);

    for path in &targets.paths {
        ensure_path_exists(Path::new(path), &logger)?;
    }
    let mut side_writers: Vec<FifoWriter> =
        targets.paths.iter().map(|p| FifoWriter::new(PathBuf::from(p))).collect();

    let stdin_policy = ctx.policy("stdin", None, None);
    let stdout_policy = ctx.policy("stdout", None, None);
    let do_tag = ctx.do_tag;
    let out_protocol = ctx.out_protocol;
    let verbose_output = ctx.verbose_output;
    let termination = ctx.termination;
    let side_protocol: Protocol = out_protocol;
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
            record.meta.append_tag(TAG, do_tag);
            let logger = logger.clone();
            let side_writers = &mut side_writers;
            let stats = stats.clone();
            async move {
                for writer in side_writers.iter_mut() {
                    writer.write_record(&record, side_protocol).await;
                }
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
