//! `tmcp-merge`: time-aligned join of a primary stdin stream against N side
//! streams given as positionals (spec 4.8).

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use tmcp_config::{GetOptions, PositionalSlot};
use tmcp_modules_common::{bootstrap, load_module_config, maybe_spawn_stats, Bootstrap, ModuleError};
use tmcp_primitives::{Merge, MergeSide, SideMode};
use tmcp_transport::{ReadOptions, Source, Target, WriteOptions};

const MODULE: &str = "merge";
const TAG: &str = "merg";

#[derive(Debug, Deserialize)]
struct SideFileConfig {
    #[serde(default)]
    allow_unbounded_delay: bool,
    #[serde(default = "default_max_buffer_ms")]
    max_buffer_ms: i64,
    postfix: Option<String>,
}

fn default_max_buffer_ms() -> i64 {
    5_000
}

#[derive(Debug, Deserialize)]
struct MergeFileConfig {
    #[serde(default)]
    sides: Vec<SideFileConfig>,
    #[serde(default = "default_match_tolerance_ms")]
    match_tolerance_ms: i64,
}

fn default_match_tolerance_ms() -> i64 {
    10
}

impl Default for MergeFileConfig {
    fn default() -> Self {
        MergeFileConfig { sides: Vec::new(), match_tolerance_ms: default_match_tolerance_ms() }
    }
}

impl Default for SideFileConfig {
    fn default() -> Self {
        SideFileConfig { allow_unbounded_delay: false, max_buffer_ms: default_max_buffer_ms(), postfix: None }
    }
}

#[tokio::main]
async fn main() -> Result<(), ModuleError> {
    let boot = bootstrap(MODULE, |reg| {
        reg.register_positionals(vec![PositionalSlot::variadic("sides")])?;
        Ok(())
    })?;
    let Bootstrap { ctx, logger, accessor, .. } = boot;

    let side_paths: Vec<String> = accessor
        .get("positionals.sides", GetOptions::default())
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default()
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();

    let config: MergeFileConfig = load_module_config(&ctx, MODULE)?;
    let match_tolerance_ms = config.match_tolerance_ms;

    let mut sides = Vec::with_capacity(side_paths.len());
    for (idx, side_cfg) in config.sides.iter().enumerate() {
        let postfix = side_cfg.postfix.clone().unwrap_or_else(|| format!("_{}", idx + 1));
        let mode = if side_cfg.allow_unbounded_delay {
            SideMode::Unbounded
        } else {
            SideMode::Bounded { max_buffer_ms: side_cfg.max_buffer_ms }
        };
        sides.push(MergeSide::new(mode, postfix));
    }
    while sides.len() < side_paths.len() {
        let idx = sides.len();
        sides.push(MergeSide::new(SideMode::Bounded { max_buffer_ms: default_max_buffer_ms() }, format!("_{}", idx + 1)));
    }

    let merge = Arc::new(tokio::sync::Mutex::new(Merge::new(sides, match_tolerance_ms)));

    for (idx, path) in side_paths.into_iter().enumerate() {
        let merge = merge.clone();
        let channel_id = format!("side:{idx}");
        let policy = ctx.policy(&channel_id, None, None);
        let termination = ctx.termination;
        let in_protocol = ctx.in_protocol;
        let verbose_input = ctx.verbose_input;
        let logger = logger.clone();
        tokio::spawn(async move {
            let _ = tmcp_transport::read(
                Source::Path(PathBuf::from(path)),
                ReadOptions {
                    channel_id: channel_id.clone(),
                    protocol: in_protocol,
                    policy,
                    termination,
                    verbose_input,
                    logger: logger.clone(),
                },
                move |record| {
                    let merge = merge.clone();
                    async move {
                        merge.lock().await.ingest_side(idx, &record, now_ms());
                    }
                },
            )
            .await;
        });
    }

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
        move |record| {
            let merge = merge.clone();
            let logger = logger.clone();
            let stats = stats.clone();
            async move {
                let mut out = merge.lock().await.merge_main(&record);
                out.meta.append_tag(TAG, do_tag);
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

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_millis() as i64
}
