//! `tmcp-minrate`: guarantees at least one output every `I` ms without ever
//! dropping a real record (spec 4.5).

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tmcp_config::GetOptions;
use tmcp_modules_common::{bootstrap, maybe_spawn_stats, Bootstrap, ModuleError};
use tmcp_primitives::MinRate;
use tmcp_record::Record;
use tmcp_transport::{ReadOptions, Source, Target, WriteOptions};

const MODULE: &str = "minrate";
const TAG: &str = "minr";

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as i64
}

#[tokio::main]
async fn main() -> Result<(), ModuleError> {
    let boot = bootstrap(MODULE, |reg| {
        reg.register_param(tmcp_config::ParamSpec::value(
            "interval-ms",
            "minimum emission interval, in ms",
        ))?;
        reg.register_param(tmcp_config::ParamSpec::value(
            "rate",
            "minimum emission rate, in records/sec",
        ))?;
        Ok(())
    })?;
    let Bootstrap { ctx, logger, accessor, .. } = boot;

    let from_interval = accessor.get("param.interval-ms", GetOptions::default()).and_then(|v| v.as_i64());
    let from_rate = accessor
        .get("param.rate", GetOptions::default())
        .and_then(|v| v.as_f64())
        .filter(|r| *r > 0.0)
        .map(|r| (1000.0 / r).round() as i64);
    let interval_ms = match (from_interval, from_rate) {
        (Some(i), None) => i,
        (None, Some(i)) => i,
        (Some(_), Some(_)) => {
            eprintln!("{MODULE}: specify exactly one of --interval-ms or --rate");
            std::process::exit(2);
        }
        (None, None) => {
            eprintln!("{MODULE}: --interval-ms or --rate is required");
            std::process::exit(2);
        }
    };

    let stdin_policy = ctx.policy("stdin", None, None);
    let stdout_policy = ctx.policy("stdout", None, None);
    let do_tag = ctx.do_tag;
    let out_protocol = ctx.out_protocol;
    let verbose_output = ctx.verbose_output;
    let termination = ctx.termination;

    let mr = Arc::new(tokio::sync::Mutex::new(MinRate::new(interval_ms, now_ms())));
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Record>();

    let stats = maybe_spawn_stats(&ctx, &logger);
    let writer_logger = logger.clone();
    let writer = tokio::spawn(async move {
        while let Some(record) = rx.recv().await {
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
                    logger: writer_logger.clone(),
                },
            )
            .await;
        }
    });

    let timer_mr = mr.clone();
    let timer_tx = tx.clone();
    let timer_interval_ms = { mr.lock().await.timer_interval_ms() };
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(timer_interval_ms.max(1) as u64));
        loop {
            ticker.tick().await;
            let clone = { timer_mr.lock().await.tick(now_ms()) };
            let Some(clone) = clone else { continue };
            if timer_tx.send(clone).is_err() {
                break;
            }
        }
    });

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
            let mr = mr.clone();
            let tx = tx.clone();
            async move {
                let forwarded = mr.lock().await.on_record(record, now_ms());
                let _ = tx.send(forwarded);
            }
        },
    )
    .await?;

    drop(writer);
    Ok(())
}
