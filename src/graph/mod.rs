//! Symbolic signal graph.
//!
//! Nodes are immutable and shared through [`Signal`] handles. Nothing here
//! touches audio buffers: a graph is a description that `render::compiler`
//! turns into something runnable.

pub mod filter;
pub mod node;

pub use filter::FilterKind;
pub use node::{Node, Signal};

use std::collections::HashSet;

/// The left/right output (or input) of a graph.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoPair {
    pub left: Signal,
    pub right: Signal,
}

impl StereoPair {
    pub const fn new(left: Signal, right: Signal) -> Self {
        Self { left, right }
    }

    /// The raw stereo input, channels 0 and 1.
    pub fn inputs() -> Self {
        Self::new(input(0), input(1))
    }

    /// True when both sides are the very same handles as `other`'s.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Signal::ptr_eq(&self.left, &other.left) && Signal::ptr_eq(&self.right, &other.right)
    }
}

pub fn input(channel: usize) -> Signal {
    Signal::new(Node::Input { channel })
}

/// An anonymous constant.
pub fn constant(value: f32) -> Signal {
    Signal::new(Node::Const { key: None, value })
}

/// A constant identified by `key`, so a renderer can tell two constants of
/// equal value apart.
pub fn keyed_const(key: impl Into<String>, value: f32) -> Signal {
    Signal::new(Node::Const {
        key: Some(key.into()),
        value,
    })
}

pub fn add(a: Signal, b: Signal) -> Signal {
    Signal::new(Node::Add(a, b))
}

pub fn sub(a: Signal, b: Signal) -> Signal {
    Signal::new(Node::Sub(a, b))
}

pub fn mul(a: Signal, b: Signal) -> Signal {
    Signal::new(Node::Mul(a, b))
}

pub fn scale(factor: f32, x: Signal) -> Signal {
    mul(constant(factor), x)
}

fn filter(kind: FilterKind, fc: Signal, q: Signal, gain: Option<Signal>, x: Signal) -> Signal {
    Signal::new(Node::Filter {
        kind,
        fc,
        q,
        gain,
        input: x,
    })
}

pub fn bandpass(fc: Signal, q: Signal, x: Signal) -> Signal {
    filter(FilterKind::Bandpass, fc, q, None, x)
}

pub fn highpass(fc: Signal, q: Signal, x: Signal) -> Signal {
    filter(FilterKind::Highpass, fc, q, None, x)
}

pub fn lowpass(fc: Signal, q: Signal, x: Signal) -> Signal {
    filter(FilterKind::Lowpass, fc, q, None, x)
}

pub fn notch(fc: Signal, q: Signal, x: Signal) -> Signal {
    filter(FilterKind::Notch, fc, q, None, x)
}

/// `g` is the shelf gain in dB.
pub fn highshelf(fc: Signal, q: Signal, g: Signal, x: Signal) -> Signal {
    filter(FilterKind::Highshelf, fc, q, Some(g), x)
}

/// `g` is the shelf gain in dB.
pub fn lowshelf(fc: Signal, q: Signal, g: Signal, x: Signal) -> Signal {
    filter(FilterKind::Lowshelf, fc, q, Some(g), x)
}

/// `g` is the boost/cut in dB at `fc`.
pub fn peak(fc: Signal, q: Signal, g: Signal, x: Signal) -> Signal {
    filter(FilterKind::Peak, fc, q, Some(g), x)
}

/// Every keyed constant reachable from `pair`, in first-visit order.
/// Shared sub-nodes are visited once.
pub fn keyed_constants(pair: &StereoPair) -> Vec<(String, f32)> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    let mut stack = vec![pair.right.clone(), pair.left.clone()];

    while let Some(signal) = stack.pop() {
        if !seen.insert(signal.id()) {
            continue;
        }
        match signal.node() {
            Node::Input { .. } => {}
            Node::Const { key, value } => {
                if let Some(key) = key {
                    found.push((key.clone(), *value));
                }
            }
            Node::Add(a, b) | Node::Sub(a, b) | Node::Mul(a, b) => {
                stack.push(b.clone());
                stack.push(a.clone());
            }
            Node::Filter {
                fc,
                q,
                gain,
                input,
                ..
            } => {
                stack.push(input.clone());
                if let Some(g) = gain {
                    stack.push(g.clone());
                }
                stack.push(q.clone());
                stack.push(fc.clone());
            }
        }
    }

    found
}
