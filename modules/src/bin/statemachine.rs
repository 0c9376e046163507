//! `tmcp-statemachine`: drives one or more finite state machine instances
//! over a record stream (spec 4.10).

use std::time::{SystemTime, UNIX_EPOCH};

use tmcp_modules_common::{bootstrap, load_required_module_config, maybe_spawn_stats, Bootstrap, ModuleError};
use tmcp_statemachine::{StateMachine, StateMachineConfig};
use tmcp_transport::{ReadOptions, Source, Target, WriteOptions};

const MODULE: &str = "statemachine";
const TAG: &str = "sm";

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

    let config: StateMachineConfig = load_required_module_config(&ctx, MODULE)?;
    let mut machine = StateMachine::build(config, now_ms())?;

    let stdin_policy = ctx.policy("stdin", None, None);
    let stdout_policy = ctx.policy("stdout", None, None);
    let do_tag = ctx.do_tag;
    let out_protocol = ctx.out_protocol;
    let verbose_output = ctx.verbose_output;
    let termination = ctx.termination;
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
            machine.annotate(&mut record, now_ms());
            record.meta.append_tag(TAG, do_tag);
            let logger = logger.clone();
            let stats = stats.clone();
            async move {
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
