//! JSON configuration shape for the declarative reducer (spec 4.11).

use indexmap::IndexMap;
use serde::Deserialize;

/// How a rule's output is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    /// `inputs.src` -> output, unchanged
    Copy,
    /// Sum over an array of input field names
    Sum,
    /// First input minus the sum of the rest
    Sub,
    /// Arithmetic mean over the inputs
    Avg,
    /// Maximum over the inputs
    Max,
    /// Minimum over the inputs
    Min,
    /// `max - min` over the inputs
    Range,
    /// `sum(value * weight) / sum(weight)`
    WeightedAvg,
    /// Evaluate an expression against the aliased locals
    Expr,
    /// Like `expr`, but the result is coerced to boolean
    Condition,
    /// Emit the first aliased local unchanged
    Passthrough,
}

/// What happens when a rule's inputs can't be resolved to a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    /// Skip this rule's output for the current record
    #[default]
    Ignore,
    /// Treat the missing numeric input as `0`
    Zero,
    /// Drop every output for the current record
    Fail,
}

/// What the reducer forwards into the output `data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardPolicy {
    /// Every working-map key not starting with `__` and not marked `temp`
    #[default]
    All,
    /// Only the declared, non-`temp` rule output names
    Known,
}

/// A rule's `inputs`, shaped differently by `op`: a bare field-name list for
/// the aggregates, a field->weight map for `weighted_avg`, or an
/// alias->field map for `copy`/`expr`/`condition`/`passthrough`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InputsSpec {
    /// A list of working-map field names, used by the aggregate ops
    List(Vec<String>),
    /// A mapping, interpreted per-op (alias->field, or field->weight)
    Map(IndexMap<String, serde_json::Value>),
}

impl InputsSpec {
    /// Field names to aggregate over (`sum`, `avg`, `max`, `min`, `range`, `sub`).
    pub fn field_list(&self) -> Vec<String> {
        match self {
            InputsSpec::List(l) => l.clone(),
            InputsSpec::Map(m) => m.values().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        }
    }

    /// Alias -> working-map field name, used by `copy`, `expr`, `condition`,
    /// `passthrough`.
    pub fn alias_map(&self) -> IndexMap<String, String> {
        match self {
            InputsSpec::Map(m) => m.iter().filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))).collect(),
            InputsSpec::List(l) => l.iter().cloned().map(|f| (f.clone(), f)).collect(),
        }
    }

    /// Field name -> weight, used by `weighted_avg`.
    pub fn weighted_map(&self) -> IndexMap<String, f64> {
        match self {
            InputsSpec::Map(m) => m.iter().filter_map(|(k, v)| v.as_f64().map(|f| (k.clone(), f))).collect(),
            InputsSpec::List(_) => IndexMap::new(),
        }
    }

    /// `inputs.src`, used by `copy`.
    pub fn single_src(&self) -> Option<String> {
        match self {
            InputsSpec::Map(m) => m.get("src").and_then(|v| v.as_str()).map(String::from),
            InputsSpec::List(l) => l.first().cloned(),
        }
    }
}

/// One named rule.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSpec {
    /// Output name; also the working-map key this rule writes
    pub name: String,
    /// How to compute the output
    pub op: Op,
    /// Op-specific input wiring
    #[serde(default = "default_inputs")]
    pub inputs: InputsSpec,
    /// Expression source, for `expr`/`condition`
    #[serde(default)]
    pub expr: Option<String>,
    /// Per-rule missing-input policy override
    #[serde(default)]
    pub missing: Option<MissingPolicy>,
    /// Excluded from emission regardless of `forward_policy`
    #[serde(default)]
    pub temp: bool,
    /// Persist this rule's output as `<name>__prev` for the next record
    #[serde(default)]
    pub retain: bool,
}

fn default_inputs() -> InputsSpec {
    InputsSpec::List(Vec::new())
}

/// Top-level reducer configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReducerConfig {
    /// Rules evaluated in declaration order, each `passes` sweeps
    pub rules: Vec<RuleSpec>,
    /// Number of sweeps over `rules` per record
    #[serde(default = "default_passes")]
    pub passes: u32,
    /// Default missing-input policy for rules that don't override it
    #[serde(default)]
    pub missing: MissingPolicy,
    /// What to emit into output `data`
    #[serde(default)]
    pub forward_policy: ForwardPolicy,
}

fn default_passes() -> u32 {
    1
}
