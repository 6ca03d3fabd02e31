//! Component R: a memory-hard, epoch-keyed hash engine with light
//! (cache-only) and full (dataset-preloaded) execution modes, and
//! thread-parallel mining against a block header and target.

mod cache;
mod engine;
mod vm;
mod xoshiro;

pub use engine::{EngineConfig, HashEngine, HashEngineError, HashEngineStatus, Mode};
