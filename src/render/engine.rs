use anyhow::{Context, Result, bail};
use arc_swap::ArcSwapOption;
use crossbeam::channel::{Receiver, Sender, unbounded};
use log::debug;
use std::sync::Arc;

use crate::graph::StereoPair;
use crate::render::RenderTarget;
use crate::render::compiler::{self, CompiledGraph};

pub enum EngineMessage {
    SetGraph(Box<CompiledGraph>),
    ClearGraph,
}

/// Runs the active compiled graph against stereo blocks.
///
/// With no graph installed audio passes straight through.
pub struct Engine {
    graph: Option<Box<CompiledGraph>>,
    rx_updates: Receiver<EngineMessage>,
    buffer_size: usize,
}

/// Control side of an [`Engine`]. Compiles graphs off the audio path and
/// ships them over.
pub struct EngineHandle {
    tx_updates: Sender<EngineMessage>,
    sample_rate: f32,
    installed: ArcSwapOption<StereoPair>,
}

impl Engine {
    pub fn new(sample_rate: f32, buffer_size: usize) -> (Self, EngineHandle) {
        let (tx_updates, rx_updates) = unbounded();

        (
            Self {
                graph: None,
                rx_updates,
                buffer_size,
            },
            EngineHandle {
                tx_updates,
                sample_rate,
                installed: ArcSwapOption::empty(),
            },
        )
    }

    pub const fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub const fn has_graph(&self) -> bool {
        self.graph.is_some()
    }

    pub fn process(
        &mut self,
        in_left: &[f32],
        in_right: &[f32],
        out_left: &mut [f32],
        out_right: &mut [f32],
    ) -> Result<()> {
        self.handle_messages();

        for len in [in_left.len(), in_right.len(), out_left.len(), out_right.len()] {
            if len != self.buffer_size {
                bail!(
                    "buffer size mismatch: expected {}, got {len}",
                    self.buffer_size
                );
            }
        }

        out_left.copy_from_slice(in_left);
        out_right.copy_from_slice(in_right);

        if let Some(graph) = self.graph.as_mut() {
            graph.process_block(out_left, out_right)?;
        }

        Ok(())
    }

    pub fn update_buffer_size(&mut self, new_size: usize) {
        debug!("Buffer size {} -> {new_size}", self.buffer_size);
        self.buffer_size = new_size;
    }

    /// Applies every queued message; only the newest graph survives.
    pub fn handle_messages(&mut self) {
        for message in self.rx_updates.try_iter() {
            match message {
                EngineMessage::SetGraph(graph) => {
                    debug!("Received new graph ({} filters)", graph.filter_count());
                    self.graph = Some(graph);
                }
                EngineMessage::ClearGraph => {
                    debug!("Graph cleared, passing audio through");
                    self.graph = None;
                }
            }
        }
    }
}

impl EngineHandle {
    pub const fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// The graph most recently handed to the engine.
    pub fn installed(&self) -> Option<Arc<StereoPair>> {
        self.installed.load_full()
    }

    pub fn clear(&self) -> Result<()> {
        self.tx_updates
            .send(EngineMessage::ClearGraph)
            .context("engine is gone")?;
        self.installed.store(None);
        Ok(())
    }
}

impl RenderTarget for EngineHandle {
    fn install(&self, graph: StereoPair) -> Result<()> {
        if self.installed.load().as_deref() == Some(&graph) {
            debug!("Graph unchanged, skipping install");
            return Ok(());
        }

        let compiled =
            compiler::compile(&graph, self.sample_rate).context("failed to compile graph")?;
        self.tx_updates
            .send(EngineMessage::SetGraph(Box::new(compiled)))
            .context("engine is gone")?;
        self.installed.store(Some(Arc::new(graph)));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{input, scale};

    const BUFFER_SIZE: usize = 64;

    fn run(engine: &mut Engine, value: f32) -> Result<(Vec<f32>, Vec<f32>)> {
        let input = vec![value; BUFFER_SIZE];
        let mut left = vec![0.0; BUFFER_SIZE];
        let mut right = vec![0.0; BUFFER_SIZE];
        engine.process(&input, &input, &mut left, &mut right)?;
        Ok((left, right))
    }

    #[test]
    fn passes_through_without_a_graph() -> Result<()> {
        let (mut engine, _handle) = Engine::new(48_000.0, BUFFER_SIZE);
        let (left, right) = run(&mut engine, 0.5)?;

        assert!(left.iter().chain(&right).all(|&x| x == 0.5));
        assert!(!engine.has_graph());
        Ok(())
    }

    #[test]
    fn newest_graph_wins() -> Result<()> {
        let (mut engine, handle) = Engine::new(48_000.0, BUFFER_SIZE);
        handle.install(StereoPair::new(scale(2.0, input(0)), input(1)))?;
        handle.install(StereoPair::new(scale(0.5, input(0)), input(1)))?;

        let (left, right) = run(&mut engine, 1.0)?;
        assert!(left.iter().all(|&x| x == 0.5));
        assert!(right.iter().all(|&x| x == 1.0));
        Ok(())
    }

    #[test]
    fn identical_graph_is_not_reinstalled() -> Result<()> {
        let (engine, handle) = Engine::new(48_000.0, BUFFER_SIZE);
        handle.install(StereoPair::new(scale(2.0, input(0)), input(1)))?;
        handle.install(StereoPair::new(scale(2.0, input(0)), input(1)))?;

        assert_eq!(engine.rx_updates.len(), 1);
        Ok(())
    }

    #[test]
    fn clear_restores_passthrough() -> Result<()> {
        let (mut engine, handle) = Engine::new(48_000.0, BUFFER_SIZE);
        handle.install(StereoPair::new(scale(0.0, input(0)), input(1)))?;
        handle.clear()?;

        let (left, _) = run(&mut engine, 0.25)?;
        assert!(left.iter().all(|&x| x == 0.25));
        assert!(handle.installed().is_none());
        Ok(())
    }

    #[test]
    fn rejects_mismatched_buffer_sizes() {
        let (mut engine, _handle) = Engine::new(48_000.0, BUFFER_SIZE);
        let input = vec![0.0; BUFFER_SIZE / 2];
        let mut left = vec![0.0; BUFFER_SIZE / 2];
        let mut right = vec![0.0; BUFFER_SIZE / 2];

        assert!(
            engine
                .process(&input, &input, &mut left, &mut right)
                .is_err()
        );

        engine.update_buffer_size(BUFFER_SIZE / 2);
        assert!(
            engine
                .process(&input, &input, &mut left, &mut right)
                .is_ok()
        );
    }

    #[test]
    fn install_fails_once_the_engine_is_dropped() {
        let (engine, handle) = Engine::new(48_000.0, BUFFER_SIZE);
        drop(engine);
        assert!(handle.install(StereoPair::inputs()).is_err());
    }
}
