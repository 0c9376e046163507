//! JSON configuration shape for the state-machine annotator (spec 4.10).

use indexmap::IndexMap;
use serde::Deserialize;

use tmcp_record::Value;

/// Top-level configuration: states, instances, shared constants, and the
/// chained-transition pass count.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMachineConfig {
    /// State name -> its outgoing transitions
    pub states: IndexMap<String, StateSpec>,
    /// Instance name -> its wiring into `data`
    pub instances: IndexMap<String, InstanceSpec>,
    /// Named literals reachable as `constant.<name>`
    #[serde(default)]
    pub constants: IndexMap<String, Value>,
    /// Number of transitions one instance may chain within a single record
    #[serde(default = "default_passes")]
    pub passes: u32,
}

fn default_passes() -> u32 {
    1
}

/// One state's outgoing transitions, tried in declaration order.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StateSpec {
    /// Candidate transitions, first matching `when` wins
    #[serde(default)]
    pub transitions: Vec<TransitionSpec>,
}

/// A single guarded transition.
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionSpec {
    /// Expression-language guard; the state changes when this is truthy
    pub when: String,
    /// What happens when `when` fires
    pub action: ActionSpec,
}

/// A transition's effect. Only `goto` exists today.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionSpec {
    /// Destination state name
    pub goto: String,
}

/// One instance's binding into the shared state graph.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSpec {
    /// State to start in; defaults to the first declared state if absent
    #[serde(default)]
    pub initial_state: Option<String>,
    /// Local alias -> `data` field name, reachable as `data.<alias>`
    #[serde(default)]
    pub inputs: IndexMap<String, String>,
    /// Where to write this instance's current state
    pub outputs: OutputSpec,
}

/// An instance's output wiring.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSpec {
    /// `data` key to receive the current state name
    pub state_field: String,
}
