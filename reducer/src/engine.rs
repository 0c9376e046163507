//! The multi-pass rule engine (spec 4.11).

use indexmap::IndexMap;

use tmcp_expr::Expr;
use tmcp_record::{Record, Value};

use crate::config::{ForwardPolicy, InputsSpec, MissingPolicy, Op, ReducerConfig, RuleSpec};
use crate::scope::AliasScope;

struct ParsedRule {
    spec: RuleSpec,
    expr: Option<Expr>,
}

enum Outcome {
    Value(Value),
    Skip,
    Fail,
}

/// A compiled reducer: expressions are parsed once at construction, and
/// `<name>__prev` retention persists across calls to [`Reducer::process`].
pub struct Reducer {
    config: ReducerConfig,
    rules: Vec<ParsedRule>,
    retained: IndexMap<String, Value>,
    start_ms: Option<i64>,
}

impl Reducer {
    /// Compile a [`ReducerConfig`], parsing every `expr`/`condition` rule's
    /// expression up front.
    pub fn build(config: ReducerConfig) -> Result<Self, tmcp_expr::ExprError> {
        let mut rules = Vec::with_capacity(config.rules.len());
        for spec in &config.rules {
            let expr = match spec.op {
                Op::Expr | Op::Condition => Some(tmcp_expr::parse(spec.expr.as_deref().unwrap_or(""))?),
                _ => None,
            };
            rules.push(ParsedRule { spec: spec.clone(), expr });
        }
        Ok(Reducer {
            config,
            rules,
            retained: IndexMap::new(),
            start_ms: None,
        })
    }

    /// Run one record through every configured pass, returning the record
    /// with its `data` replaced per `forward_policy`.
    pub fn process(&mut self, record: &Record, now_ms: i64) -> Record {
        let start = *self.start_ms.get_or_insert(now_ms);

        let mut working: IndexMap<String, Value> = record.data.clone();
        working.insert(
            "__timestamp".to_string(),
            record.meta.timestamp.map(Value::I64).unwrap_or(Value::Null),
        );
        working.insert("__now".to_string(), Value::I64(now_ms));
        working.insert("__start".to_string(), Value::I64(start));
        for (k, v) in &self.retained {
            working.insert(k.clone(), v.clone());
        }

        let mut failed = false;
        'passes: for _ in 0..self.config.passes.max(1) {
            for rule in &self.rules {
                let policy = rule.spec.missing.unwrap_or(self.config.missing);
                match evaluate_rule(rule, &working, policy) {
                    Outcome::Value(v) => {
                        working.insert(rule.spec.name.clone(), v);
                    }
                    Outcome::Skip => {}
                    Outcome::Fail => {
                        failed = true;
                        break 'passes;
                    }
                }
            }
        }

        let mut out = record.clone();
        if failed {
            out.data = IndexMap::new();
            return out;
        }

        for rule in &self.rules {
            if rule.spec.retain {
                if let Some(v) = working.get(&rule.spec.name) {
                    self.retained.insert(format!("{}__prev", rule.spec.name), v.clone());
                }
            }
        }

        out.data = match self.config.forward_policy {
            ForwardPolicy::All => working
                .into_iter()
                .filter(|(k, _)| !k.starts_with("__"))
                .filter(|(k, _)| !self.rules.iter().any(|r| r.spec.temp && &r.spec.name == k))
                .collect(),
            ForwardPolicy::Known => self
                .rules
                .iter()
                .filter(|r| !r.spec.temp)
                .filter_map(|r| working.get(&r.spec.name).map(|v| (r.spec.name.clone(), v.clone())))
                .collect(),
        };
        out
    }
}

fn numeric_field(working: &IndexMap<String, Value>, field: &str, policy: MissingPolicy) -> Result<f64, Outcome> {
    match working.get(field).and_then(Value::as_f64) {
        Some(v) => Ok(v),
        None => match policy {
            MissingPolicy::Zero => Ok(0.0),
            MissingPolicy::Ignore => Err(Outcome::Skip),
            MissingPolicy::Fail => Err(Outcome::Fail),
        },
    }
}

fn evaluate_rule(rule: &ParsedRule, working: &IndexMap<String, Value>, policy: MissingPolicy) -> Outcome {
    match rule.spec.op {
        Op::Copy => match rule.spec.inputs.single_src().and_then(|f| working.get(&f).cloned()) {
            Some(v) => Outcome::Value(v),
            None => missing_scalar(policy),
        },
        Op::Passthrough => {
            let aliases = rule.spec.inputs.alias_map();
            match aliases.values().next().and_then(|f| working.get(f).cloned()) {
                Some(v) => Outcome::Value(v),
                None => missing_scalar(policy),
            }
        }
        Op::Sum | Op::Sub | Op::Avg | Op::Max | Op::Min | Op::Range => {
            let fields = rule.spec.inputs.field_list();
            let mut values = Vec::with_capacity(fields.len());
            for f in &fields {
                match numeric_field(working, f, policy) {
                    Ok(v) => values.push(v),
                    Err(outcome) => return outcome,
                }
            }
            aggregate(rule.spec.op, &values)
        }
        Op::WeightedAvg => {
            let weighted = rule.spec.inputs.weighted_map();
            let mut num = 0.0;
            let mut den = 0.0;
            for (field, weight) in &weighted {
                match numeric_field(working, field, policy) {
                    Ok(v) => {
                        num += v * weight;
                        den += weight;
                    }
                    Err(outcome) => return outcome,
                }
            }
            if den == 0.0 {
                Outcome::Skip
            } else {
                Outcome::Value(Value::F64(num / den))
            }
        }
        Op::Expr | Op::Condition => {
            let aliases = rule.spec.inputs.alias_map();
            let scope = AliasScope { aliases: &aliases, working };
            let Some(expr) = &rule.expr else {
                return Outcome::Skip;
            };
            match tmcp_expr::eval(expr, &scope) {
                Ok(tmcp_expr::Value::Null) => missing_scalar(policy),
                Ok(v) if rule.spec.op == Op::Condition => Outcome::Value(Value::Bool(v.truthy())),
                Ok(v) => Outcome::Value(expr_value_to_record(v)),
                Err(_) => missing_scalar(policy),
            }
        }
    }
}

fn missing_scalar(policy: MissingPolicy) -> Outcome {
    match policy {
        MissingPolicy::Zero => Outcome::Value(Value::F64(0.0)),
        MissingPolicy::Ignore => Outcome::Skip,
        MissingPolicy::Fail => Outcome::Fail,
    }
}

fn aggregate(op: Op, values: &[f64]) -> Outcome {
    if values.is_empty() {
        return Outcome::Skip;
    }
    let result = match op {
        Op::Sum => values.iter().sum(),
        Op::Sub => values[0] - values[1..].iter().sum::<f64>(),
        Op::Avg => values.iter().sum::<f64>() / values.len() as f64,
        Op::Max => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        Op::Min => values.iter().cloned().fold(f64::INFINITY, f64::min),
        Op::Range => {
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            max - min
        }
        _ => unreachable!("only called for aggregate ops"),
    };
    Outcome::Value(Value::F64(result))
}

fn expr_value_to_record(v: tmcp_expr::Value) -> Value {
    match v {
        tmcp_expr::Value::Null => Value::Null,
        tmcp_expr::Value::Bool(b) => Value::Bool(b),
        tmcp_expr::Value::Number(n) => Value::F64(n),
        tmcp_expr::Value::Str(s) => Value::Str(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reducer(json: serde_json::Value) -> Reducer {
        let cfg: ReducerConfig = serde_json::from_value(json).expect("valid config");
        Reducer::build(cfg).expect("rules parse")
    }

    #[test]
    fn sum_aggregates_over_field_list() {
        let mut r = reducer(serde_json::json!({
            "rules": [{"name": "total", "op": "sum", "inputs": ["a", "b"]}]
        }));
        let rec = tmcp_record::normalize(serde_json::json!({"data": {"a": 1, "b": 2}}));
        let out = r.process(&rec, 0);
        assert_eq!(out.data.get("total").and_then(|v| v.as_f64()), Some(3.0));
    }

    #[test]
    fn missing_fail_produces_zero_outputs() {
        let mut r = reducer(serde_json::json!({
            "rules": [{"name": "total", "op": "sum", "inputs": ["a", "missing_field"], "missing": "fail"}]
        }));
        let rec = tmcp_record::normalize(serde_json::json!({"data": {"a": 1}}));
        let out = r.process(&rec, 0);
        assert!(out.data.is_empty());
    }

    #[test]
    fn missing_zero_treats_absent_as_zero() {
        let mut r = reducer(serde_json::json!({
            "rules": [{"name": "total", "op": "sum", "inputs": ["a", "missing_field"], "missing": "zero"}]
        }));
        let rec = tmcp_record::normalize(serde_json::json!({"data": {"a": 1}}));
        let out = r.process(&rec, 0);
        assert_eq!(out.data.get("total").and_then(|v| v.as_f64()), Some(1.0));
    }

    #[test]
    fn forward_policy_known_emits_only_declared_non_temp_outputs() {
        let mut r = reducer(serde_json::json!({
            "rules": [
                {"name": "helper", "op": "copy", "inputs": {"src": "a"}, "temp": true},
                {"name": "total", "op": "sum", "inputs": ["helper"]}
            ],
            "forward_policy": "known"
        }));
        let rec = tmcp_record::normalize(serde_json::json!({"data": {"a": 5}}));
        let out = r.process(&rec, 0);
        assert_eq!(out.data.len(), 1);
        assert_eq!(out.data.get("total").and_then(|v| v.as_f64()), Some(5.0));
    }

    #[test]
    fn retain_seeds_next_record_as_prev() {
        let mut r = reducer(serde_json::json!({
            "rules": [
                {"name": "acc", "op": "copy", "inputs": {"src": "x"}, "retain": true},
                {"name": "delta", "op": "sub", "inputs": ["acc", "acc__prev"], "missing": "zero"}
            ]
        }));
        let rec1 = tmcp_record::normalize(serde_json::json!({"data": {"x": 10}}));
        let out1 = r.process(&rec1, 0);
        assert_eq!(out1.data.get("delta").and_then(|v| v.as_f64()), Some(10.0));

        let rec2 = tmcp_record::normalize(serde_json::json!({"data": {"x": 15}}));
        let out2 = r.process(&rec2, 1);
        assert_eq!(out2.data.get("delta").and_then(|v| v.as_f64()), Some(5.0));
    }

    #[test]
    fn expr_rule_evaluates_against_declared_aliases_only() {
        let mut r = reducer(serde_json::json!({
            "rules": [{"name": "ok", "op": "condition", "inputs": {"v": "x"}, "expr": "v > 10"}]
        }));
        let rec = tmcp_record::normalize(serde_json::json!({"data": {"x": 20}}));
        let out = r.process(&rec, 0);
        assert_eq!(out.data.get("ok"), Some(&Value::Bool(true)));
    }

    #[test]
    fn weighted_avg_divides_by_weight_sum() {
        let mut r = reducer(serde_json::json!({
            "rules": [{"name": "w", "op": "weighted_avg", "inputs": {"a": 1.0, "b": 3.0}}]
        }));
        let rec = tmcp_record::normalize(serde_json::json!({"data": {"a": 10, "b": 20}}));
        let out = r.process(&rec, 0);
        // (10*1 + 20*3) / (1+3) = 70/4 = 17.5
        assert_eq!(out.data.get("w").and_then(|v| v.as_f64()), Some(17.5));
    }

    #[test]
    fn later_rule_consumes_earlier_rules_output_within_one_sweep() {
        let mut r = reducer(serde_json::json!({
            "rules": [
                {"name": "copied", "op": "copy", "inputs": {"src": "x"}},
                {"name": "doubled", "op": "sum", "inputs": ["copied", "copied"]}
            ],
            "passes": 1
        }));
        let rec = tmcp_record::normalize(serde_json::json!({"data": {"x": 4}}));
        let out = r.process(&rec, 0);
        assert_eq!(out.data.get("doubled").and_then(|v| v.as_f64()), Some(8.0));
    }
}
