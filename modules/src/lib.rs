//! Shared CLI bootstrap for every module binary: the universal parameter
//! set from the external interface surface, module-scoped config-file
//! loading, and the logger/policy wiring every `main` needs before it can
//! start driving `tmcp-transport` reads and writes.

use std::collections::HashMap;

use serde::de::DeserializeOwned;

use tmcp_config::{Accessor, ConfigError, GetOptions, ParamSpec, Registry};
use tmcp_log::{LogLevel, Logger, ThroughputStats};
use tmcp_record::Meta;
use tmcp_transport::{ChannelPolicy, PolicyResolution, Protocol, TerminationMode};

/// Errors a module's `main` can surface before exiting non-zero.
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    /// Parameter/positional registration or resolution failed
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A transport-level I/O or framing error escaped a primary channel
    #[error(transparent)]
    Transport(#[from] tmcp_transport::TransportError),
    /// A state-machine or reducer expression failed to parse at startup
    #[error(transparent)]
    Expr(#[from] tmcp_expr::ExprError),
    /// The module config file could not be read
    #[error("unable to read config file '{0}': {1}")]
    ConfigFileIo(String, std::io::Error),
    /// The module config file (or its selected scope) did not parse into the expected shape
    #[error("malformed config in '{0}': {1}")]
    ConfigFileShape(String, serde_json::Error),
    /// A side-channel filesystem operation failed (e.g. creating a missing split target)
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Register the parameters every module binary accepts, per the external
/// interfaces surface: tagging, verbosity, protocol selection, per-channel
/// policy overrides, termination mode, and config scoping.
pub fn register_common(registry: &mut Registry) -> Result<(), ConfigError> {
    registry.register_param(
        ParamSpec::flag("do-tag", "append this module's tag to meta.pipeline")
            .env("TMCP_DO_TAG")
            .default("true"),
    )?;
    registry.register_param(
        ParamSpec::flag("verbose", "enable verbose I/O echo and throughput metrics").env("TMCP_VERBOSE"),
    )?;
    registry.register_param(ParamSpec::flag(
        "verbose-input",
        "echo every decoded input record to stderr",
    ))?;
    registry.register_param(ParamSpec::flag(
        "verbose-output",
        "echo every encoded output record to stderr",
    ))?;
    registry.register_param(
        ParamSpec::value("verbose-log-level", "diagnostic filter: none|error|warn|info").default("warn"),
    )?;
    registry.register_param(
        ParamSpec::value("in-protocol", "inbound wire format: ndjson|msgpack").default("ndjson"),
    )?;
    registry.register_param(
        ParamSpec::value("out-protocol", "outbound wire format: ndjson|msgpack").default("ndjson"),
    )?;
    registry.register_param(ParamSpec::value(
        "exit-on-close",
        "channelId=bool,... overrides of the exit-on-close policy",
    ))?;
    registry.register_param(ParamSpec::value(
        "retry",
        "channelId=bool,... overrides of the retry policy",
    ))?;
    registry.register_param(ParamSpec::flag(
        "exit-instead-of-kill",
        "clean-exit instead of signaling the process group on fatal close",
    ))?;
    registry.register_param(ParamSpec::value(
        "config-tag",
        "scope selector used when loading this module's config file",
    ))?;
    registry.register_param(ParamSpec::value("config", "path to this module's JSON config file"))?;
    registry.register_param(ParamSpec::flag("help", "print usage and exit").short('h'))?;
    Ok(())
}

/// The resolved universal parameters, common to every module.
pub struct CommonCtx {
    /// Whether `meta.pipeline` tagging is enabled
    pub do_tag: bool,
    /// Whether verbose throughput metrics are enabled
    pub verbose: bool,
    /// Echo decoded input records to stderr
    pub verbose_input: bool,
    /// Echo encoded output records to stderr
    pub verbose_output: bool,
    /// Diagnostic level filter
    pub log_level: LogLevel,
    /// Wire format for reads
    pub in_protocol: Protocol,
    /// Wire format for writes
    pub out_protocol: Protocol,
    /// Parsed `--exit-on-close` channel overrides
    pub exit_on_close: HashMap<String, bool>,
    /// Parsed `--retry` channel overrides
    pub retry: HashMap<String, bool>,
    /// How to terminate on a fatal channel close
    pub termination: TerminationMode,
    /// `--config-tag`, used both for config-file scoping
    pub config_tag: Option<String>,
    /// `--config`, the path to this module's JSON config file, if any
    pub config_path: Option<String>,
}

impl CommonCtx {
    /// Pull every universal parameter out of a resolved [`Accessor`].
    pub fn from_accessor(acc: &Accessor) -> Self {
        let get_bool = |path: &str, default: bool| {
            acc.get(path, GetOptions::default()).and_then(|v| v.as_bool()).unwrap_or(default)
        };
        let get_str = |path: &str| acc.get(path, GetOptions::default()).and_then(|v| v.as_str().map(str::to_string));

        let exit_on_close = get_str("param.exit-on-close")
            .map(|s| tmcp_config::parse_channel_policy_map(&s))
            .unwrap_or_default();
        let retry = get_str("param.retry")
            .map(|s| tmcp_config::parse_channel_policy_map(&s))
            .unwrap_or_default();

        CommonCtx {
            do_tag: get_bool("param.do-tag", true),
            verbose: get_bool("param.verbose", false),
            verbose_input: get_bool("param.verbose-input", false),
            verbose_output: get_bool("param.verbose-output", false),
            log_level: get_str("param.verbose-log-level").and_then(|s| s.parse().ok()).unwrap_or_default(),
            in_protocol: get_str("param.in-protocol").and_then(|s| s.parse().ok()).unwrap_or_default(),
            out_protocol: get_str("param.out-protocol").and_then(|s| s.parse().ok()).unwrap_or_default(),
            exit_on_close,
            retry,
            termination: if get_bool("param.exit-instead-of-kill", false) {
                TerminationMode::CleanExit
            } else {
                TerminationMode::Signal
            },
            config_tag: get_str("param.config-tag"),
            config_path: get_str("param.config"),
        }
    }

    /// Resolve the effective policy for `channel_id`, layering the global
    /// CLI overrides on top of a module-supplied option and legacy `linger`.
    pub fn policy(&self, channel_id: &str, module_option: Option<ChannelPolicy>, legacy_linger: Option<bool>) -> ChannelPolicy {
        tmcp_transport::resolve_policy(
            channel_id,
            PolicyResolution {
                module_option,
                legacy_linger,
                global_exit_on_close: Some(&self.exit_on_close),
                global_retry: Some(&self.retry),
            },
        )
    }

    /// Append this module's tag to `meta.pipeline`, honoring `do_tag`.
    pub fn tag(&self, meta: &mut Meta, tag: &str) {
        meta.append_tag(tag, self.do_tag);
    }
}

/// Spawn the 1000ms throughput reporter when `--verbose` is enabled and
/// return the stats handle for binaries to call `.record()` on per record.
/// `None` when verbose metrics are off, so callers skip recording entirely.
pub fn maybe_spawn_stats(ctx: &CommonCtx, logger: &Logger) -> Option<std::sync::Arc<ThroughputStats>> {
    if !ctx.verbose {
        return None;
    }
    let stats = ThroughputStats::new();
    tmcp_log::spawn_throughput_reporter(logger.clone(), stats.clone());
    Some(stats)
}

/// The result of bootstrapping a module: its resolved accessor, universal
/// context, and a ready-to-use logger.
pub struct Bootstrap {
    /// Declared parameter/positional registry, kept for `-h` usage text
    pub registry: Registry,
    /// Resolved CLI/ENV/default values
    pub accessor: Accessor,
    /// Universal parameters pulled out of `accessor`
    pub ctx: CommonCtx,
    /// Module-scoped diagnostic logger
    pub logger: Logger,
}

/// Register the universal parameters plus whatever `extra` declares, parse
/// argv/env, and build the logger. Prints usage and exits (0 on `-h`/`--help`,
/// non-zero on a resolution error) rather than returning in those cases.
pub fn bootstrap(
    module_name: &str,
    extra: impl FnOnce(&mut Registry) -> Result<(), ConfigError>,
) -> Result<Bootstrap, ModuleError> {
    tmcp_log::init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut registry = Registry::new();
    register_common(&mut registry)?;
    extra(&mut registry)?;

    if args.iter().any(|a| a == "-h" || a == "--help") {
        println!("{}", tmcp_config::help::usage(module_name, &registry, None));
        std::process::exit(0);
    }

    let env: HashMap<String, String> = std::env::vars().collect();
    let accessor = match registry.load_cli(&args, &env) {
        Ok(acc) => acc,
        Err(e) => {
            eprintln!("{module_name}: {e}");
            eprintln!("{}", tmcp_config::help::usage(module_name, &registry, None));
            std::process::exit(2);
        }
    };

    let ctx = CommonCtx::from_accessor(&accessor);
    let logger = Logger::new(module_name, ctx.config_tag.as_deref(), ctx.log_level);

    Ok(Bootstrap { registry, accessor, ctx, logger })
}

/// Read `ctx.config_path` and select a subtree by `ctx.config_tag`, falling
/// back to `default_scope`, then to the whole file. `Ok(None)` means no
/// `--config` was given at all.
fn read_config_scope(ctx: &CommonCtx, default_scope: &str) -> Result<Option<serde_json::Value>, ModuleError> {
    let Some(path) = ctx.config_path.as_deref() else {
        return Ok(None);
    };
    let text = std::fs::read_to_string(path).map_err(|e| ModuleError::ConfigFileIo(path.to_string(), e))?;
    let root: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| ModuleError::ConfigFileShape(path.to_string(), e))?;

    let scope_name = ctx.config_tag.as_deref().or(Some(default_scope));
    let scope = scope_name.and_then(|name| lookup_ci(&root, name)).unwrap_or(root);

    Ok(Some(scope))
}

/// Select a subtree with [`read_config_scope`] and deserialize it into `T`.
/// A module with no `--config` gets `T::default()`.
pub fn load_module_config<T>(ctx: &CommonCtx, default_scope: &str) -> Result<T, ModuleError>
where
    T: DeserializeOwned + Default,
{
    let path = ctx.config_path.as_deref().unwrap_or_default();
    match read_config_scope(ctx, default_scope)? {
        Some(scope) => serde_json::from_value(scope).map_err(|e| ModuleError::ConfigFileShape(path.to_string(), e)),
        None => Ok(T::default()),
    }
}

/// Like [`load_module_config`], but for config shapes with required fields
/// and no sensible default (e.g. a state machine or reducer with no rules).
/// `--config` is mandatory here; its absence is an error, not `T::default()`.
pub fn load_required_module_config<T>(ctx: &CommonCtx, default_scope: &str) -> Result<T, ModuleError>
where
    T: DeserializeOwned,
{
    let path = ctx.config_path.as_deref().unwrap_or_default();
    match read_config_scope(ctx, default_scope)? {
        Some(scope) => serde_json::from_value(scope).map_err(|e| ModuleError::ConfigFileShape(path.to_string(), e)),
        None => Err(ModuleError::ConfigFileIo(
            String::new(),
            std::io::Error::new(std::io::ErrorKind::NotFound, "--config is required"),
        )),
    }
}

fn lookup_ci(value: &serde_json::Value, key: &str) -> Option<serde_json::Value> {
    value.as_object()?.iter().find_map(|(k, v)| k.eq_ignore_ascii_case(key).then(|| v.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ci_is_case_insensitive() {
        let root = serde_json::json!({"Gate": {"blocks": []}});
        assert_eq!(lookup_ci(&root, "gate"), Some(serde_json::json!({"blocks": []})));
    }

    #[test]
    fn missing_scope_falls_back_to_whole_document() {
        let root = serde_json::json!({"blocks": []});
        assert!(lookup_ci(&root, "gate").is_none());
    }
}
