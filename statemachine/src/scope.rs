//! Identifier resolution for transition guards: `data.<alias>`,
//! `instance.state`, `instance.timeInStateMs`, `instancesInState.<state>`,
//! and `constant.<name>`.

use std::collections::HashMap;

use indexmap::IndexMap;

use tmcp_expr::{Scope, Value as ExprValue};
use tmcp_record::Value as RecordValue;

pub(crate) fn to_expr_value(v: &RecordValue) -> ExprValue {
    match v {
        RecordValue::Null => ExprValue::Null,
        RecordValue::Bool(b) => ExprValue::Bool(*b),
        RecordValue::I64(i) => ExprValue::Number(*i as f64),
        RecordValue::F64(f) => ExprValue::Number(*f),
        RecordValue::Str(s) => ExprValue::Str(s.clone()),
        // Compound values have no representation in the expression language;
        // guards that reference them see `null`, same as a missing identifier.
        RecordValue::List(_) | RecordValue::Map(_) => ExprValue::Null,
    }
}

pub(crate) struct TransitionScope<'a> {
    pub data: &'a IndexMap<String, RecordValue>,
    pub inputs: &'a IndexMap<String, String>,
    pub instance_state: &'a str,
    pub entered_at_ms: i64,
    pub now_ms: i64,
    pub instances_in_state: &'a HashMap<String, usize>,
    pub constants: &'a IndexMap<String, RecordValue>,
}

impl Scope for TransitionScope<'_> {
    fn resolve(&self, path: &[String]) -> ExprValue {
        let [root, rest @ ..] = path else {
            return ExprValue::Null;
        };
        match (root.as_str(), rest) {
            ("data", [alias]) => self
                .inputs
                .get(alias)
                .and_then(|field| self.data.get(field))
                .map(to_expr_value)
                .unwrap_or(ExprValue::Null),
            ("instance", [member]) if member == "state" => ExprValue::Str(self.instance_state.to_string()),
            ("instance", [member]) if member == "timeInStateMs" => {
                ExprValue::Number((self.now_ms - self.entered_at_ms) as f64)
            }
            ("instancesInState", [state]) => {
                ExprValue::Number(self.instances_in_state.get(state).copied().unwrap_or(0) as f64)
            }
            ("constant", [name]) => self.constants.get(name).map(to_expr_value).unwrap_or(ExprValue::Null),
            _ => ExprValue::Null,
        }
    }
}
