use anyhow::{Context, Result, bail};
use log::{debug, warn};
use std::collections::HashMap;

use crate::graph::{self, Node, Signal, StereoPair};
use crate::render::biquad::Biquad;

#[derive(Debug, Clone, Copy)]
enum Op {
    Input(usize),
    Const(f32),
    Add(usize, usize),
    Sub(usize, usize),
    Mul(usize, usize),
    Filter {
        biquad: usize,
        fc: usize,
        q: usize,
        gain: Option<usize>,
        input: usize,
    },
}

/// A stereo graph flattened into a per-sample program.
///
/// Every node is evaluated once per frame into its own register, in an order
/// where operands always precede their users. Nodes shared inside the graph
/// (the mid/side encoders, filter parameters) map to a single register.
pub struct CompiledGraph {
    ops: Vec<Op>,
    registers: Vec<f32>,
    filters: Vec<Biquad>,
    left: usize,
    right: usize,
}

struct Compiler {
    sample_rate: f32,
    ops: Vec<Op>,
    filters: Vec<Biquad>,
    visited: HashMap<usize, usize>,
}

impl Compiler {
    /// Lowers `root` and everything it depends on, operands first.
    fn visit(&mut self, root: &Signal) -> Result<usize> {
        let mut pending = vec![(root, false)];

        while let Some((signal, expanded)) = pending.pop() {
            if self.visited.contains_key(&signal.id()) {
                continue;
            }
            if !expanded {
                pending.push((signal, true));
                let children = signal.node().children();
                pending.extend(children.into_iter().rev().map(|child| (child, false)));
                continue;
            }

            let op = self.lower(signal)?;
            self.ops.push(op);
            self.visited.insert(signal.id(), self.ops.len() - 1);
        }

        self.register(root)
    }

    fn register(&self, signal: &Signal) -> Result<usize> {
        self.visited
            .get(&signal.id())
            .copied()
            .context("operand was not compiled before its user")
    }

    fn lower(&mut self, signal: &Signal) -> Result<Op> {
        let op = match signal.node() {
            Node::Input { channel } => {
                if *channel > 1 {
                    bail!("input channel {channel} is not available on a stereo graph");
                }
                Op::Input(*channel)
            }
            Node::Const { value, .. } => Op::Const(*value),
            Node::Add(a, b) => Op::Add(self.register(a)?, self.register(b)?),
            Node::Sub(a, b) => Op::Sub(self.register(a)?, self.register(b)?),
            Node::Mul(a, b) => Op::Mul(self.register(a)?, self.register(b)?),
            Node::Filter {
                kind,
                fc,
                q,
                gain,
                input,
            } => {
                let fc = self.register(fc)?;
                let q = self.register(q)?;
                let gain = gain.as_ref().map(|g| self.register(g)).transpose()?;
                let input = self.register(input)?;
                self.filters.push(Biquad::new(*kind, self.sample_rate));
                Op::Filter {
                    biquad: self.filters.len() - 1,
                    fc,
                    q,
                    gain,
                    input,
                }
            }
        };
        Ok(op)
    }
}

/// Flattens `graph` into something that can run against audio at
/// `sample_rate`.
pub fn compile(graph: &StereoPair, sample_rate: f32) -> Result<CompiledGraph> {
    warn_on_conflicting_constants(graph);

    let mut compiler = Compiler {
        sample_rate,
        ops: Vec::new(),
        filters: Vec::new(),
        visited: HashMap::new(),
    };
    let left = compiler.visit(&graph.left)?;
    let right = compiler.visit(&graph.right)?;

    debug!(
        "Compiled graph: {} nodes, {} filters",
        compiler.ops.len(),
        compiler.filters.len()
    );

    Ok(CompiledGraph {
        registers: vec![0.0; compiler.ops.len()],
        ops: compiler.ops,
        filters: compiler.filters,
        left,
        right,
    })
}

fn warn_on_conflicting_constants(graph: &StereoPair) {
    let mut values: HashMap<String, f32> = HashMap::new();
    for (key, value) in graph::keyed_constants(graph) {
        match values.get(&key) {
            Some(&existing) if existing.to_bits() != value.to_bits() => {
                warn!("Constant '{key}' is bound to both {existing} and {value}");
            }
            Some(_) => {}
            None => {
                values.insert(key, value);
            }
        }
    }
}

impl CompiledGraph {
    pub const fn node_count(&self) -> usize {
        self.ops.len()
    }

    pub const fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// Clears all filter memory.
    pub fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.reset();
        }
    }

    #[inline]
    pub fn process_frame(&mut self, left: f32, right: f32) -> (f32, f32) {
        let Self {
            ops,
            registers,
            filters,
            ..
        } = self;

        for (i, op) in ops.iter().enumerate() {
            let value = match *op {
                Op::Input(0) => left,
                Op::Input(_) => right,
                Op::Const(value) => value,
                Op::Add(a, b) => registers[a] + registers[b],
                Op::Sub(a, b) => registers[a] - registers[b],
                Op::Mul(a, b) => registers[a] * registers[b],
                Op::Filter {
                    biquad,
                    fc,
                    q,
                    gain,
                    input,
                } => {
                    let filter = &mut filters[biquad];
                    let gain = gain.map_or(0.0, |g| registers[g]);
                    filter.set_params(registers[fc], registers[q], gain);
                    filter.process(registers[input])
                }
            };
            registers[i] = value;
        }

        (self.registers[self.left], self.registers[self.right])
    }

    /// Processes a block in place.
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) -> Result<()> {
        if left.len() != right.len() {
            bail!(
                "channel length mismatch: left {} vs right {}",
                left.len(),
                right.len()
            );
        }

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            (*l, *r) = self.process_frame(*l, *r);
        }

        Ok(())
    }
}

/// Runs a unit impulse on both channels through `graph` for `len` samples.
pub fn impulse_response(
    graph: &StereoPair,
    sample_rate: f32,
    len: usize,
) -> Result<(Vec<f32>, Vec<f32>)> {
    let mut compiled = compile(graph, sample_rate)?;
    let mut left = vec![0.0; len];
    let mut right = vec![0.0; len];
    if len > 0 {
        left[0] = 1.0;
        right[0] = 1.0;
    }
    compiled.process_block(&mut left, &mut right)?;
    Ok((left, right))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{add, constant, input, keyed_const, lowpass, scale, sub};

    #[test]
    fn arithmetic_nodes_evaluate_per_frame() {
        let graph = StereoPair::new(add(input(0), input(1)), scale(2.0, sub(input(0), input(1))));
        let mut compiled = compile(&graph, 48_000.0).unwrap();

        assert_eq!(compiled.process_frame(0.25, 0.5), (0.75, -0.5));
        assert_eq!(compiled.process_frame(1.0, -1.0), (0.0, 4.0));
    }

    #[test]
    fn shared_nodes_compile_once() {
        let shared = lowpass(keyed_const("lp:fc", 500.0), keyed_const("lp:q", 0.7), input(0));
        let graph = StereoPair::new(shared.clone(), shared);
        let compiled = compile(&graph, 48_000.0).unwrap();

        assert_eq!(compiled.filter_count(), 1);
        assert_eq!(compiled.node_count(), 4);
    }

    #[test]
    fn identity_graph_passes_audio_untouched() {
        let mut compiled = compile(&StereoPair::inputs(), 48_000.0).unwrap();
        let mut left = vec![0.1, 0.2, 0.3];
        let mut right = vec![-0.1, -0.2, -0.3];
        compiled.process_block(&mut left, &mut right).unwrap();

        assert_eq!(left, vec![0.1, 0.2, 0.3]);
        assert_eq!(right, vec![-0.1, -0.2, -0.3]);
    }

    #[test]
    fn rejects_channels_beyond_stereo() {
        let graph = StereoPair::new(input(0), input(2));
        assert!(compile(&graph, 48_000.0).is_err());
    }

    #[test]
    fn rejects_mismatched_block_lengths() {
        let mut compiled = compile(&StereoPair::inputs(), 48_000.0).unwrap();
        let mut left = vec![0.0; 4];
        let mut right = vec![0.0; 3];
        assert!(compiled.process_block(&mut left, &mut right).is_err());
    }

    #[test]
    fn conflicting_constants_still_compile() {
        let graph = StereoPair::new(keyed_const("dup:fc", 1.0), keyed_const("dup:fc", 2.0));
        let mut compiled = compile(&graph, 48_000.0).unwrap();
        assert_eq!(compiled.process_frame(0.0, 0.0), (1.0, 2.0));
    }

    #[test]
    fn deep_chains_compile_on_a_small_stack() {
        let handle = std::thread::Builder::new()
            .stack_size(256 * 1024)
            .spawn(|| {
                let mut left = input(0);
                for _ in 0..100_000 {
                    left = scale(1.0, left);
                }
                let mut compiled = compile(&StereoPair::new(left, input(1)), 48_000.0).unwrap();
                assert_eq!(compiled.node_count(), 200_002);
                assert_eq!(compiled.process_frame(0.5, -0.25), (0.5, -0.25));
            })
            .unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn impulse_response_of_identity_is_an_impulse() {
        let (left, right) = impulse_response(&StereoPair::inputs(), 48_000.0, 4).unwrap();
        assert_eq!(left, vec![1.0, 0.0, 0.0, 0.0]);
        assert_eq!(right, left);

        let graph = StereoPair::new(constant(0.0), input(1));
        let (left, _) = impulse_response(&graph, 48_000.0, 2).unwrap();
        assert_eq!(left, vec![0.0, 0.0]);
    }
}
