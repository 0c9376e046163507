//! `tmcp-delay`: defers emission by a fixed logical delay, flushing the
//! entire buffer unconditionally on stdin EOF (spec 4.9).

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tmcp_config::{GetOptions, ParamSpec};
use tmcp_modules_common::{bootstrap, maybe_spawn_stats, Bootstrap, ModuleError};
use tmcp_primitives::Delay;
use tmcp_transport::{ChannelPolicy, ReadOptions, Source, Target, WriteOptions};

const MODULE: &str = "delay";
const TAG: &str = "dely";

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as i64
}

#[tokio::main]
async fn main() -> Result<(), ModuleError> {
    let boot = bootstrap(MODULE, |reg| {
        reg.register_param(ParamSpec::value("delay-ms", "logical emission delay, in ms").required())?;
        Ok(())
    })?;
    let Bootstrap { ctx, logger, accessor, .. } = boot;

    let delay_ms = accessor.get("param.delay-ms", GetOptions::default()).and_then(|v| v.as_i64()).unwrap_or(0);
    let delay = Arc::new(tokio::sync::Mutex::new(Delay::new(delay_ms)));

    // Always flush the buffer on EOF before exiting, regardless of the
    // resolved exit-on-close policy, so the unconditional flush in spec
    // 4.9 actually runs instead of being pre-empted by terminate().
    let stdin_policy = ChannelPolicy { exit_on_close: false, ..ctx.policy("stdin", None, None) };
    let stdout_policy = ctx.policy("stdout", None, None);
    let do_tag = ctx.do_tag;
    let out_protocol = ctx.out_protocol;
    let verbose_output = ctx.verbose_output;
    let termination = ctx.termination;
    let stats = maybe_spawn_stats(&ctx, &logger);

    let loop_delay = delay.clone();
    let loop_logger = logger.clone();
    let loop_stats = stats.clone();
    tmcp_transport::read(
        Source::Stdin,
        ReadOptions {
            channel_id: "stdin".into(),
            protocol: ctx.in_protocol,
            policy: stdin_policy,
            termination,
            verbose_input: ctx.verbose_input,
            logger: loop_logger.clone(),
        },
        move |record| {
            let delay = loop_delay.clone();
            let logger = loop_logger.clone();
            let stats = loop_stats.clone();
            async move {
                let ready = {
                    let mut delay = delay.lock().await;
                    delay.ingest(record, now_ms());
                    delay.drain_ready()
                };
                for mut item in ready {
                    item.meta.append_tag(TAG, do_tag);
                    if let Some(stats) = &stats {
                        stats.record(&item, now_ms());
                    }
                    let _ = tmcp_transport::write(
                        &item,
                        Target::Stdout,
                        WriteOptions {
                            channel_id: "stdout".into(),
                            protocol: out_protocol,
                            policy: stdout_policy,
                            termination,
                            verbose_output,
                            logger: logger.clone(),
                        },
                    )
                    .await;
                }
            }
        },
    )
    .await?;

    let flushed = delay.lock().await.flush_all();
    for mut item in flushed {
        item.meta.append_tag(TAG, do_tag);
        if let Some(stats) = &stats {
            stats.record(&item, now_ms());
        }
        let _ = tmcp_transport::write(
            &item,
            Target::Stdout,
            WriteOptions {
                channel_id: "stdout".into(),
                protocol: out_protocol,
                policy: stdout_policy,
                termination,
                verbose_output,
                logger: logger.clone(),
            },
        )
        .await;
    }

    Ok(())
}
