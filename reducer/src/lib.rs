//! The declarative multi-pass reducer (spec 4.11): named rules computed
//! over a per-record working map, seeded with retained state from prior
//! records, using the same sandboxed expression language as the
//! state-machine annotator.

mod config;
mod engine;
mod scope;

pub use config::{ForwardPolicy, InputsSpec, MissingPolicy, Op, ReducerConfig, RuleSpec};
pub use engine::Reducer;
