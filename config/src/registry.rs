//! Declarative registration of parameters and positionals, and CLI/ENV resolution.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::accessor::{Accessor, FieldMeta};
use crate::error::ConfigError;
use crate::param::{ParamSpec, PositionalSlot};

/// Accumulates `register_param`/`register_positionals` calls during a
/// module's declarative startup, then resolves `argv`/`env` exactly once.
#[derive(Default)]
pub struct Registry {
    params: Vec<ParamSpec>,
    positionals: Vec<PositionalSlot>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parameter. Duplicate long/short names are a programming
    /// error that should fail loudly, so callers are expected to `.expect()`
    /// this at startup rather than handle it at runtime.
    pub fn register_param(&mut self, spec: ParamSpec) -> Result<(), ConfigError> {
        if self.params.iter().any(|p| p.long == spec.long) {
            return Err(ConfigError::DuplicateLongName(spec.long));
        }
        if let Some(c) = spec.short {
            if self.params.iter().any(|p| p.short == Some(c)) {
                return Err(ConfigError::DuplicateShortName(c));
            }
        }
        self.params.push(spec);
        Ok(())
    }

    /// Register the ordered positional schema. Only the last slot may be variadic.
    pub fn register_positionals(&mut self, schema: Vec<PositionalSlot>) -> Result<(), ConfigError> {
        for slot in schema.iter().take(schema.len().saturating_sub(1)) {
            if slot.variadic {
                return Err(ConfigError::NonTerminalVariadic(slot.name.clone()));
            }
        }
        self.positionals = schema;
        Ok(())
    }

    /// Parse `args` (excluding argv[0]) and `env`, resolving every
    /// registered parameter and positional with CLI > ENV > default
    /// precedence. Call this exactly once per process.
    pub fn load_cli(
        &self,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<Accessor, ConfigError> {
        let mut cli_values: HashMap<String, String> = HashMap::new();
        let mut cli_bools: HashMap<String, bool> = HashMap::new();
        let mut positional_values: Vec<String> = Vec::new();

        let mut i = 0;
        while i < args.len() {
            let arg = &args[i];
            if let Some(rest) = arg.strip_prefix("--") {
                let (name, inline_value) = match rest.split_once('=') {
                    Some((n, v)) => (n.to_string(), Some(v.to_string())),
                    None => (rest.to_string(), None),
                };
                if let Some(negated) = name.strip_prefix("no-") {
                    let spec = self.find_long(negated).ok_or_else(|| {
                        ConfigError::UnknownParameter(format!("--{name}"))
                    })?;
                    if !spec.negatable {
                        return Err(ConfigError::UnknownParameter(format!("--{name}")));
                    }
                    cli_bools.insert(spec.long.clone(), false);
                    i += 1;
                    continue;
                }
                let spec = self
                    .find_long(&name)
                    .ok_or_else(|| ConfigError::UnknownParameter(format!("--{name}")))?;
                if spec.takes_value {
                    let value = if let Some(v) = inline_value {
                        v
                    } else {
                        let next = args.get(i + 1).filter(|v| !v.starts_with("--"));
                        match next {
                            Some(v) => {
                                i += 1;
                                v.clone()
                            }
                            None => return Err(ConfigError::MissingFlagValue(spec.long.clone())),
                        }
                    };
                    cli_values.insert(spec.long.clone(), value);
                } else {
                    cli_bools.insert(spec.long.clone(), true);
                }
            } else if let Some(rest) = arg.strip_prefix('-') {
                let c = rest.chars().next().ok_or_else(|| {
                    ConfigError::UnknownParameter(arg.clone())
                })?;
                let spec = self
                    .params
                    .iter()
                    .find(|p| p.short == Some(c))
                    .ok_or_else(|| ConfigError::UnknownParameter(arg.clone()))?;
                if spec.takes_value {
                    let value = args
                        .get(i + 1)
                        .ok_or_else(|| ConfigError::MissingFlagValue(spec.long.clone()))?;
                    cli_values.insert(spec.long.clone(), value.clone());
                    i += 1;
                } else {
                    cli_bools.insert(spec.long.clone(), true);
                }
            } else {
                positional_values.push(arg.clone());
            }
            i += 1;
        }

        let max_positionals = self.positionals.len();
        let last_variadic = self.positionals.last().is_some_and(|s| s.variadic);
        if !last_variadic && positional_values.len() > max_positionals {
            return Err(ConfigError::TooManyPositionals(max_positionals));
        }

        let mut resolved = IndexMap::new();
        let mut meta = IndexMap::new();

        for spec in &self.params {
            let path = format!("param.{}", spec.long);
            let value = if spec.takes_value {
                cli_values
                    .get(&spec.long)
                    .cloned()
                    .or_else(|| spec.env.as_ref().and_then(|e| env.get(e).cloned()))
                    .or_else(|| spec.default.clone())
            } else {
                match cli_bools.get(&spec.long) {
                    Some(b) => Some(b.to_string()),
                    None => spec
                        .env
                        .as_ref()
                        .and_then(|e| env.get(e))
                        .map(|v| v.clone())
                        .or_else(|| spec.default.clone()),
                }
            };
            match value {
                Some(v) => {
                    resolved.insert(path.clone(), string_to_json(&v, spec.takes_value));
                }
                None if spec.required => {
                    return Err(ConfigError::MissingRequired(format!("--{}", spec.long)))
                }
                None => {}
            }
            meta.insert(path, FieldMeta { mutable: spec.mutable });
        }

        for (idx, slot) in self.positionals.iter().enumerate() {
            let path_idx = format!("positionals.{idx}");
            let path_name = format!("positionals.{}", slot.name);
            let value: Option<serde_json::Value> = if slot.variadic {
                let rest: Vec<serde_json::Value> = positional_values
                    .iter()
                    .skip(idx)
                    .map(|v| serde_json::Value::String(v.clone()))
                    .collect();
                if rest.is_empty() {
                    None
                } else {
                    Some(serde_json::Value::Array(rest))
                }
            } else {
                positional_values
                    .get(idx)
                    .map(|v| serde_json::Value::String(v.clone()))
            };
            match &value {
                Some(v) => {
                    resolved.insert(path_idx.clone(), v.clone());
                    resolved.insert(path_name.clone(), v.clone());
                }
                None if slot.required => {
                    return Err(ConfigError::MissingRequired(format!(
                        "positional '{}'",
                        slot.name
                    )))
                }
                None => {}
            }
            meta.insert(path_idx, FieldMeta { mutable: true });
            meta.insert(path_name, FieldMeta { mutable: true });
        }

        Ok(Accessor::new(resolved, meta))
    }

    fn find_long(&self, long: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.long == long)
    }

    /// The registered parameter specs, for auto-generated help.
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// The registered positional schema, for auto-generated help.
    pub fn positionals(&self) -> &[PositionalSlot] {
        &self.positionals
    }
}

fn string_to_json(v: &str, _takes_value: bool) -> serde_json::Value {
    if v == "true" || v == "false" {
        return serde_json::Value::Bool(v == "true");
    }
    if let Ok(i) = v.parse::<i64>() {
        return serde_json::Value::Number(i.into());
    }
    if let Ok(f) = v.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return serde_json::Value::Number(n);
        }
    }
    serde_json::Value::String(v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn cli_overrides_env_overrides_default() {
        let mut reg = Registry::new();
        reg.register_param(
            ParamSpec::value("interval-ms", "interval").env("TMCP_INTERVAL_MS").default("500"),
        )
        .unwrap();

        let acc = reg
            .load_cli(&["--interval-ms".into(), "100".into()], &env(&[("TMCP_INTERVAL_MS", "250")]))
            .unwrap();
        assert_eq!(
            acc.get("param.interval-ms", Default::default()),
            Some(serde_json::json!(100))
        );

        let acc = reg.load_cli(&[], &env(&[("TMCP_INTERVAL_MS", "250")])).unwrap();
        assert_eq!(
            acc.get("param.interval-ms", Default::default()),
            Some(serde_json::json!(250))
        );

        let acc = reg.load_cli(&[], &env(&[])).unwrap();
        assert_eq!(
            acc.get("param.interval-ms", Default::default()),
            Some(serde_json::json!(500))
        );
    }

    #[test]
    fn required_param_with_no_value_is_fatal() {
        let mut reg = Registry::new();
        reg.register_param(ParamSpec::value("required-thing", "x").required()).unwrap();
        assert!(matches!(
            reg.load_cli(&[], &env(&[])),
            Err(ConfigError::MissingRequired(_))
        ));
    }

    #[test]
    fn boolean_negative_form() {
        let mut reg = Registry::new();
        reg.register_param(ParamSpec::flag("do-tag", "tagging").default("true")).unwrap();
        let acc = reg.load_cli(&["--no-do-tag".into()], &env(&[])).unwrap();
        assert_eq!(acc.get("param.do-tag", Default::default()), Some(serde_json::json!(false)));
    }

    #[test]
    fn variadic_positional_absorbs_remainder() {
        let mut reg = Registry::new();
        reg.register_positionals(vec![PositionalSlot::required("primary"), PositionalSlot::variadic("sides")])
            .unwrap();
        let acc = reg
            .load_cli(&["a.fifo".into(), "b.fifo".into(), "c.fifo".into()], &env(&[]))
            .unwrap();
        assert_eq!(
            acc.get("positionals.sides", Default::default()),
            Some(serde_json::json!(["b.fifo", "c.fifo"]))
        );
    }

    #[test]
    fn duplicate_long_name_is_rejected() {
        let mut reg = Registry::new();
        reg.register_param(ParamSpec::value("x", "first")).unwrap();
        assert!(matches!(
            reg.register_param(ParamSpec::value("x", "second")),
            Err(ConfigError::DuplicateLongName(_))
        ));
    }

    #[test]
    fn non_terminal_variadic_is_rejected() {
        let mut reg = Registry::new();
        assert!(matches!(
            reg.register_positionals(vec![PositionalSlot::variadic("a"), PositionalSlot::required("b")]),
            Err(ConfigError::NonTerminalVariadic(_))
        ));
    }

    #[test]
    fn runtime_override_takes_precedence_until_cleared() {
        let mut reg = Registry::new();
        reg.register_param(ParamSpec::value("interval-ms", "interval").default("500")).unwrap();
        let acc = reg.load_cli(&[], &env(&[])).unwrap();
        acc.override_value("param.interval-ms", serde_json::json!(50)).unwrap();
        assert_eq!(acc.get("param.interval-ms", Default::default()), Some(serde_json::json!(50)));
        assert_eq!(
            acc.get("param.interval-ms", crate::accessor::GetOptions { original: true }),
            Some(serde_json::json!(500))
        );
        acc.clear_override("param.interval-ms");
        assert_eq!(acc.get("param.interval-ms", Default::default()), Some(serde_json::json!(500)));
    }

    #[test]
    fn immutable_param_rejects_override() {
        let mut reg = Registry::new();
        reg.register_param(ParamSpec::value("fixed", "x").default("1").immutable()).unwrap();
        let acc = reg.load_cli(&[], &env(&[])).unwrap();
        assert!(matches!(
            acc.override_value("param.fixed", serde_json::json!(2)),
            Err(ConfigError::Immutable(_))
        ));
    }
}
