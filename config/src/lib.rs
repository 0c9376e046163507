//! Registered parameters, positional schemas, and config-file accessors
//! with CLI > ENV > default precedence, runtime overrides, and
//! auto-generated help.
//!
//! ```
//! use tmcp_config::{Registry, ParamSpec};
//!
//! let mut reg = Registry::new();
//! reg.register_param(ParamSpec::value("interval-ms", "minimum emission interval").default("1000")).unwrap();
//! let env = std::collections::HashMap::new();
//! let acc = reg.load_cli(&["--interval-ms".into(), "250".into()], &env).unwrap();
//! assert_eq!(acc.get("param.interval-ms", Default::default()), Some(serde_json::json!(250)));
//! ```

mod accessor;
mod configfile;
mod error;
pub mod help;
mod param;
mod registry;

pub use accessor::{Accessor, GetOptions};
pub use configfile::ConfigFileRegistry;
pub use error::ConfigError;
pub use param::{ConfigFieldSpec, ParamSpec, PositionalSlot};
pub use registry::Registry;

/// Parse a `channelId=bool,...` comma-separated parameter value, as used by
/// `--exit-on-close` and `--retry`.
pub fn parse_channel_policy_map(spec: &str) -> std::collections::HashMap<String, bool> {
    spec.split(',')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            Some((k.trim().to_string(), v.trim().eq_ignore_ascii_case("true")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_channel_policy_map() {
        let map = parse_channel_policy_map("side:0=true,side:1=false");
        assert_eq!(map.get("side:0"), Some(&true));
        assert_eq!(map.get("side:1"), Some(&false));
    }
}
