//! File-scoped config accessors with `$env` indirection.

use indexmap::IndexMap;

use crate::accessor::{Accessor, FieldMeta};
use crate::error::ConfigError;
use crate::param::ConfigFieldSpec;

/// Accumulates `register_config_field` calls, then loads and validates a
/// JSON config file against them.
#[derive(Default)]
pub struct ConfigFileRegistry {
    fields: Vec<ConfigFieldSpec>,
}

impl ConfigFileRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a dotted-path field.
    pub fn register_config_field(&mut self, spec: ConfigFieldSpec) {
        self.fields.push(spec);
    }

    /// Read `path` as JSON, select a subtree via `config_tag` (the
    /// `--config-tag` parameter value) or else `default_scope`, apply
    /// defaults, enforce required fields, and eagerly resolve `{"$env":
    /// "NAME"}` indirection.
    pub fn load_config_file(
        &self,
        path: &str,
        config_tag: Option<&str>,
        default_scope: Option<&str>,
    ) -> Result<Accessor, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::UnreadableFile(path.to_string(), e.to_string()))?;
        let root: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| ConfigError::MalformedJson(path.to_string(), e.to_string()))?;

        let scope_name = config_tag.or(default_scope);
        let scope = match scope_name {
            Some(name) => lookup_ci(&root, name)
                .ok_or_else(|| ConfigError::InvalidScope(name.to_string()))?,
            None => root,
        };
        let scope_obj = scope
            .as_object()
            .ok_or_else(|| ConfigError::InvalidScope(scope_name.unwrap_or("<root>").to_string()))?
            .clone();
        let scope = serde_json::Value::Object(scope_obj);

        let mut resolved = IndexMap::new();
        let mut meta = IndexMap::new();

        for field in &self.fields {
            let key = field.path.to_lowercase();
            let value = lookup_dotted_ci(&scope, &field.path)
                .or_else(|| field.default.clone());
            let value = match value {
                Some(v) => Some(resolve_env_indirection(&field.path, v)?),
                None if field.required => {
                    return Err(ConfigError::MissingRequired(field.path.clone()))
                }
                None => None,
            };
            if let Some(v) = value {
                resolved.insert(key.clone(), v);
            }
            meta.insert(key, FieldMeta { mutable: field.mutable });
        }

        Ok(Accessor::new(resolved, meta))
    }

    /// The registered field specs, for the auto-generated config skeleton.
    pub fn fields(&self) -> &[ConfigFieldSpec] {
        &self.fields
    }
}

fn resolve_env_indirection(field_path: &str, value: serde_json::Value) -> Result<serde_json::Value, ConfigError> {
    if let serde_json::Value::Object(ref o) = value {
        if let Some(serde_json::Value::String(name)) = o.get("$env") {
            return std::env::var(name)
                .map(serde_json::Value::String)
                .map_err(|_| ConfigError::UnsetEnvIndirection(field_path.to_string(), name.clone()));
        }
    }
    Ok(value)
}

fn lookup_ci<'a>(value: &'a serde_json::Value, key: &str) -> Option<serde_json::Value> {
    value.as_object()?.iter().find_map(|(k, v)| {
        if k.eq_ignore_ascii_case(key) {
            Some(v.clone())
        } else {
            None
        }
    })
}

fn lookup_dotted_ci(root: &serde_json::Value, dotted: &str) -> Option<serde_json::Value> {
    let mut current = root.clone();
    for segment in dotted.split('.') {
        current = lookup_ci(&current, segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> String {
        let path = std::env::temp_dir().join(format!(
            "tmcp-config-test-{}-{}.json",
            std::process::id(),
            contents.len()
        ));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path.to_string_lossy().to_string()
    }

    #[test]
    fn scoped_lookup_with_default_and_required() {
        let path = write_temp(r#"{"gate":{"Max_Age_Ms": 5000}}"#);
        let mut reg = ConfigFileRegistry::new();
        reg.register_config_field(ConfigFieldSpec::new("max_age_ms", "x"));
        reg.register_config_field(ConfigFieldSpec::new("timeout_ms", "y").default(serde_json::json!(1000)));
        let acc = reg.load_config_file(&path, None, Some("gate")).unwrap();
        assert_eq!(acc.get("max_age_ms", Default::default()), Some(serde_json::json!(5000)));
        assert_eq!(acc.get("timeout_ms", Default::default()), Some(serde_json::json!(1000)));
    }

    #[test]
    fn env_indirection_resolved_eagerly() {
        std::env::set_var("TMCP_TEST_INDIRECT", "secret-value");
        let path = write_temp(r#"{"input": {"token": {"$env": "TMCP_TEST_INDIRECT"}}}"#);
        let mut reg = ConfigFileRegistry::new();
        reg.register_config_field(ConfigFieldSpec::new("token", "x"));
        let acc = reg.load_config_file(&path, None, Some("input")).unwrap();
        assert_eq!(
            acc.get("token", Default::default()),
            Some(serde_json::json!("secret-value"))
        );
    }

    #[test]
    fn missing_required_field_is_fatal() {
        let path = write_temp(r#"{"gate": {}}"#);
        let mut reg = ConfigFileRegistry::new();
        reg.register_config_field(ConfigFieldSpec::new("must_have", "x").required());
        assert!(matches!(
            reg.load_config_file(&path, None, Some("gate")),
            Err(ConfigError::MissingRequired(_))
        ));
    }
}
