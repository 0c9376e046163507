//! The state-machine annotator (spec 4.10): evaluates one or more
//! independent finite state machines per record over the shared sandboxed
//! expression language from `tmcp-expr`.

mod config;
mod machine;
mod scope;

pub use config::{ActionSpec, InstanceSpec, OutputSpec, StateMachineConfig, StateSpec, TransitionSpec};
pub use machine::StateMachine;
