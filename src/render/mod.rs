pub mod biquad;
pub mod compiler;
pub mod engine;

pub use compiler::{CompiledGraph, compile, impulse_response};
pub use engine::{Engine, EngineHandle, EngineMessage};

use anyhow::Result;

use crate::graph::StereoPair;

/// Where finished graphs go to become the active processing graph.
///
/// Installing a graph equal to the one already active must be harmless.
pub trait RenderTarget: Send + Sync {
    fn install(&self, graph: StereoPair) -> Result<()>;
}
