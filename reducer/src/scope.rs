//! Identifier resolution for `expr`/`condition` rules: a bare identifier
//! resolves through the rule's declared alias map into the working map,
//! nothing else is visible.

use indexmap::IndexMap;

use tmcp_expr::{Scope, Value as ExprValue};
use tmcp_record::Value as RecordValue;

pub(crate) struct AliasScope<'a> {
    pub aliases: &'a IndexMap<String, String>,
    pub working: &'a IndexMap<String, RecordValue>,
}

impl Scope for AliasScope<'_> {
    fn resolve(&self, path: &[String]) -> ExprValue {
        let [alias] = path else {
            return ExprValue::Null;
        };
        let Some(field) = self.aliases.get(alias) else {
            return ExprValue::Null;
        };
        match self.working.get(field) {
            Some(RecordValue::Null) | None => ExprValue::Null,
            Some(RecordValue::Bool(b)) => ExprValue::Bool(*b),
            Some(RecordValue::I64(i)) => ExprValue::Number(*i as f64),
            Some(RecordValue::F64(f)) => ExprValue::Number(*f),
            Some(RecordValue::Str(s)) => ExprValue::Str(s.clone()),
            Some(RecordValue::List(_)) | Some(RecordValue::Map(_)) => ExprValue::Null,
        }
    }
}
