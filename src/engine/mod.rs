// Engine: counters, persisted quality, ranking and the batch recompute
// job, all on top of a CounterStore.

pub mod content;
pub mod counters;
pub mod ranking;
pub mod recompute;

pub use content::ContentEngine;
