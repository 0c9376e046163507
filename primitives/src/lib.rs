//! Control-flow primitives that sit between transport and a module's main
//! loop: gate, minimum-rate injection, dedup, split/tee, time-aligned
//! merge, and logical delay. Each type here is pure record-in/record-out
//! logic; the owning module binary is responsible for driving it from
//! `tmcp-transport` reads/writes and timers.

pub mod dedup;
pub mod delay;
pub mod gate;
pub mod merge;
pub mod minrate;
pub mod split;

pub use dedup::{Dedup, DedupConfig};
pub use delay::Delay;
pub use gate::{Gate, GateBlock, GateOutcome};
pub use merge::{Merge, MergeSide, SideMode};
pub use minrate::MinRate;
pub use split::SplitTargets;
