//! Auto-generated usage text: a one-line signature, the parameter list,
//! the positionals list, and a JSON skeleton of the config schema.

use std::fmt::Write as _;

use crate::configfile::ConfigFileRegistry;
use crate::registry::Registry;

/// Render the `-h`/`--help` usage block for a module.
pub fn usage(module_name: &str, registry: &Registry, config: Option<&ConfigFileRegistry>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{module_name} [OPTIONS]{}", positional_signature(registry));
    out.push('\n');

    out.push_str("OPTIONS:\n");
    for p in registry.params() {
        let form = match p.short {
            Some(c) => format!("--{}, -{c}", p.long),
            None => format!("--{}", p.long),
        };
        let env = p.env.as_deref().unwrap_or("-");
        let default = p.default.as_deref().unwrap_or("-");
        let required = if p.required { "required" } else { "optional" };
        let mutable = if p.mutable { "mutable" } else { "immutable" };
        let _ = writeln!(
            out,
            "  {form:<24} env={env:<24} default={default:<10} {required} {mutable}  {}",
            p.description
        );
    }

    if !registry.positionals().is_empty() {
        out.push('\n');
        out.push_str("POSITIONALS:\n");
        for slot in registry.positionals() {
            let kind = if slot.variadic {
                "variadic"
            } else if slot.required {
                "required"
            } else {
                "optional"
            };
            let _ = writeln!(out, "  {:<24} {kind}", slot.name);
        }
    }

    if let Some(config) = config {
        if !config.fields().is_empty() {
            out.push('\n');
            out.push_str("CONFIG SCHEMA:\n");
            let skeleton = config_skeleton(config);
            let _ = writeln!(out, "{}", serde_json::to_string_pretty(&skeleton).unwrap_or_default());
        }
    }

    out
}

fn positional_signature(registry: &Registry) -> String {
    let mut sig = String::new();
    for slot in registry.positionals() {
        let _ = write!(
            sig,
            " {}{}{}",
            if slot.required { "" } else { "[" },
            if slot.variadic {
                format!("{}...", slot.name)
            } else {
                slot.name.clone()
            },
            if slot.required { "" } else { "]" }
        );
    }
    sig
}

fn config_skeleton(config: &ConfigFileRegistry) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for field in config.fields() {
        map.insert(
            field.path.clone(),
            field.default.clone().unwrap_or(serde_json::Value::Null),
        );
    }
    serde_json::Value::Object(map)
}
