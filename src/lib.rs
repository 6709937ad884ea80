// Curator: content quality scoring and ranking.
//
// This is the library root. `scoring` is pure math over counter snapshots,
// `db` is the counter store, `engine` ties the two together per content
// kind. The rest backs the `curator` binary.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod output;
pub mod scoring;
pub mod status;

pub use error::{EngineError, Result};
