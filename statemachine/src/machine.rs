//! Drives one or more independent finite state machine instances over a
//! stream of records (spec 4.10).

use std::collections::HashMap;

use indexmap::IndexMap;

use tmcp_expr::Expr;
use tmcp_record::{Record, Value};

use crate::config::StateMachineConfig;
use crate::scope::TransitionScope;

struct ParsedTransition {
    when: Expr,
    goto: String,
}

struct ParsedState {
    transitions: Vec<ParsedTransition>,
}

struct Instance {
    name: String,
    state: String,
    entered_at_ms: i64,
    inputs: IndexMap<String, String>,
    output_key: String,
}

/// A compiled, runnable state machine: transition guards are parsed once at
/// construction, not per record.
pub struct StateMachine {
    states: IndexMap<String, ParsedState>,
    instances: Vec<Instance>,
    constants: IndexMap<String, Value>,
    passes: u32,
}

impl StateMachine {
    /// Compile a [`StateMachineConfig`], parsing every transition guard.
    /// Fails if any `when` expression does not parse.
    pub fn build(config: StateMachineConfig, now_ms: i64) -> Result<Self, tmcp_expr::ExprError> {
        let mut states = IndexMap::new();
        for (name, spec) in &config.states {
            let mut transitions = Vec::with_capacity(spec.transitions.len());
            for t in &spec.transitions {
                transitions.push(ParsedTransition {
                    when: tmcp_expr::parse(&t.when)?,
                    goto: t.action.goto.clone(),
                });
            }
            states.insert(name.clone(), ParsedState { transitions });
        }

        let first_state = config.states.keys().next().cloned().unwrap_or_default();
        let instances = config
            .instances
            .into_iter()
            .map(|(name, spec)| Instance {
                name,
                state: spec.initial_state.unwrap_or_else(|| first_state.clone()),
                entered_at_ms: now_ms,
                inputs: spec.inputs,
                output_key: spec.outputs.state_field,
            })
            .collect();

        Ok(StateMachine {
            states,
            instances,
            constants: config.constants,
            passes: config.passes.max(1),
        })
    }

    /// Evaluate every instance against `record`, mutating `record.data` with
    /// each instance's current state. `now_ms` is used both as the default
    /// record timestamp and for `instance.timeInStateMs`.
    pub fn annotate(&mut self, record: &mut Record, now_ms: i64) {
        let ts = record.meta.timestamp.unwrap_or(now_ms);
        let instances_in_state = self.count_instances_in_state();

        for instance in &mut self.instances {
            for _ in 0..self.passes {
                let Some(state) = self.states.get(&instance.state) else {
                    break;
                };
                let scope = TransitionScope {
                    data: &record.data,
                    inputs: &instance.inputs,
                    instance_state: &instance.state,
                    entered_at_ms: instance.entered_at_ms,
                    now_ms,
                    instances_in_state: &instances_in_state,
                    constants: &self.constants,
                };

                let mut fired = None;
                for transition in &state.transitions {
                    match tmcp_expr::eval(&transition.when, &scope) {
                        Ok(v) if v.truthy() => {
                            fired = Some(transition.goto.clone());
                            break;
                        }
                        Ok(_) => continue,
                        Err(_) => continue, // evaluation error: guard does not fire
                    }
                }

                match fired {
                    Some(goto) => {
                        instance.state = goto;
                        instance.entered_at_ms = ts;
                    }
                    None => break,
                }
            }

            record.data.insert(instance.output_key.clone(), Value::Str(instance.state.clone()));
        }
    }

    fn count_instances_in_state(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for instance in &self.instances {
            *counts.entry(instance.state.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Current state of `instance_name`, if it exists.
    pub fn state_of(&self, instance_name: &str) -> Option<&str> {
        self.instances.iter().find(|i| i.name == instance_name).map(|i| i.state.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(json: serde_json::Value) -> StateMachineConfig {
        serde_json::from_value(json).expect("valid config")
    }

    #[test]
    fn transition_fires_on_guard_and_updates_entered_at() {
        let cfg = config(serde_json::json!({
            "states": {
                "idle": {"transitions": [{"when": "data.ready == true", "action": {"goto": "running"}}]},
                "running": {"transitions": []}
            },
            "instances": {
                "m1": {"inputs": {"ready": "ready"}, "outputs": {"stateField": "state"}}
            }
        }));
        let mut sm = StateMachine::build(cfg, 0).unwrap();

        let mut rec = tmcp_record::normalize(serde_json::json!({"data": {"ready": false}}));
        sm.annotate(&mut rec, 0);
        assert_eq!(rec.data.get("state").and_then(|v| v.as_str()), Some("idle"));

        let mut rec = tmcp_record::normalize(serde_json::json!({"meta": {"timestamp": 500}, "data": {"ready": true}}));
        sm.annotate(&mut rec, 500);
        assert_eq!(rec.data.get("state").and_then(|v| v.as_str()), Some("running"));
        assert_eq!(sm.instances[0].entered_at_ms, 500);
    }

    #[test]
    fn no_transition_fires_leaves_state_and_entered_at_unchanged() {
        let cfg = config(serde_json::json!({
            "states": {"idle": {"transitions": [{"when": "data.x > 10", "action": {"goto": "idle"}}]}},
            "instances": {"m1": {"inputs": {"x": "x"}, "outputs": {"stateField": "state"}}}
        }));
        let mut sm = StateMachine::build(cfg, 100).unwrap();
        let mut rec = tmcp_record::normalize(serde_json::json!({"data": {"x": 1}}));
        sm.annotate(&mut rec, 200);
        assert_eq!(sm.instances[0].entered_at_ms, 100);
    }

    #[test]
    fn passes_allow_chained_transitions_within_one_record() {
        let cfg = config(serde_json::json!({
            "states": {
                "a": {"transitions": [{"when": "true", "action": {"goto": "b"}}]},
                "b": {"transitions": [{"when": "true", "action": {"goto": "c"}}]},
                "c": {"transitions": []}
            },
            "instances": {"m1": {"outputs": {"stateField": "state"}}},
            "passes": 2
        }));
        let mut sm = StateMachine::build(cfg, 0).unwrap();
        let mut rec = tmcp_record::normalize(serde_json::json!({"data": {}}));
        sm.annotate(&mut rec, 0);
        assert_eq!(rec.data.get("state").and_then(|v| v.as_str()), Some("c"));
    }

    #[test]
    fn instances_in_state_counts_before_any_transition_this_record() {
        let cfg = config(serde_json::json!({
            "states": {
                "idle": {"transitions": [{"when": "instancesInState.idle >= 2", "action": {"goto": "crowded"}}]},
                "crowded": {"transitions": []}
            },
            "instances": {
                "m1": {"outputs": {"stateField": "s1"}},
                "m2": {"outputs": {"stateField": "s2"}}
            }
        }));
        let mut sm = StateMachine::build(cfg, 0).unwrap();
        let mut rec = tmcp_record::normalize(serde_json::json!({"data": {}}));
        sm.annotate(&mut rec, 0);
        assert_eq!(rec.data.get("s1").and_then(|v| v.as_str()), Some("crowded"));
        assert_eq!(rec.data.get("s2").and_then(|v| v.as_str()), Some("crowded"));
    }
}
