use crate::graph::FilterKind;
use std::collections::HashSet;
use std::fmt;
use std::mem;
use std::ptr;
use std::sync::{Arc, OnceLock};

#[derive(Debug)]
pub enum Node {
    /// Channel `channel` of the live input.
    Input { channel: usize },
    Const { key: Option<String>, value: f32 },
    Add(Signal, Signal),
    Sub(Signal, Signal),
    Mul(Signal, Signal),
    Filter {
        kind: FilterKind,
        fc: Signal,
        q: Signal,
        /// Present only for gain-bearing kinds.
        gain: Option<Signal>,
        input: Signal,
    },
}

impl Node {
    /// Direct operands, in evaluation order.
    pub fn children(&self) -> Vec<&Signal> {
        match self {
            Self::Input { .. } | Self::Const { .. } => Vec::new(),
            Self::Add(a, b) | Self::Sub(a, b) | Self::Mul(a, b) => vec![a, b],
            Self::Filter {
                fc,
                q,
                gain,
                input,
                ..
            } => {
                let mut children = vec![fc, q];
                children.extend(gain.as_ref());
                children.push(input);
                children
            }
        }
    }

    fn detach_children(&mut self) -> Vec<Signal> {
        match self {
            Self::Input { .. } | Self::Const { .. } => Vec::new(),
            Self::Add(a, b) | Self::Sub(a, b) | Self::Mul(a, b) => {
                vec![mem::replace(a, leaf()), mem::replace(b, leaf())]
            }
            Self::Filter {
                fc,
                q,
                gain,
                input,
                ..
            } => {
                let mut children = vec![
                    mem::replace(fc, leaf()),
                    mem::replace(q, leaf()),
                    mem::replace(input, leaf()),
                ];
                children.extend(gain.take());
                children
            }
        }
    }
}

/// Shared stand-in left behind by [`Node::detach_children`].
fn leaf() -> Signal {
    static LEAF: OnceLock<Signal> = OnceLock::new();
    LEAF.get_or_init(|| Signal::new(Node::Const { key: None, value: 0.0 }))
        .clone()
}

// Unlinks children iteratively so long chains don't overflow the stack.
impl Drop for Node {
    fn drop(&mut self) {
        let mut pending = self.detach_children();
        while let Some(signal) = pending.pop() {
            if let Some(mut node) = Arc::into_inner(signal.0) {
                pending.append(&mut node.detach_children());
            }
        }
    }
}

/// Structural equality. Each pair of nodes is compared at most once, so
/// subgraphs shared inside both sides (mid/side encoders) stay linear.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        let mut seen: HashSet<(*const Node, *const Node)> = HashSet::new();
        let mut pending = vec![(self, other)];

        while let Some((a, b)) = pending.pop() {
            if ptr::eq(a, b) || !seen.insert((ptr::from_ref(a), ptr::from_ref(b))) {
                continue;
            }

            let same_shape = match (a, b) {
                (Self::Input { channel: x }, Self::Input { channel: y }) => x == y,
                (Self::Const { key: ka, value: va }, Self::Const { key: kb, value: vb }) => {
                    ka == kb && va == vb
                }
                (Self::Add(..), Self::Add(..))
                | (Self::Sub(..), Self::Sub(..))
                | (Self::Mul(..), Self::Mul(..)) => true,
                (
                    Self::Filter {
                        kind: ka, gain: ga, ..
                    },
                    Self::Filter {
                        kind: kb, gain: gb, ..
                    },
                ) => ka == kb && ga.is_some() == gb.is_some(),
                _ => false,
            };
            if !same_shape {
                return false;
            }

            pending.extend(
                a.children()
                    .into_iter()
                    .zip(b.children())
                    .map(|(x, y)| (x.node(), y.node())),
            );
        }

        true
    }
}

/// Cheap, clonable handle to an immutable graph node.
#[derive(Clone)]
pub struct Signal(Arc<Node>);

impl Signal {
    pub fn new(node: Node) -> Self {
        Self(Arc::new(node))
    }

    pub fn node(&self) -> &Node {
        &self.0
    }

    /// Reference identity, as opposed to the structural `==`.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Address of the node; stable for as long as any handle to it is alive.
    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl PartialEq for Signal {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other) || *self.0 == *other.0
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node() {
            Node::Input { channel } => write!(f, "in({channel})"),
            Node::Const {
                key: Some(key),
                value,
            } => write!(f, "const({key}={value})"),
            Node::Const { key: None, value } => write!(f, "{value}"),
            Node::Add(a, b) => write!(f, "add({a}, {b})"),
            Node::Sub(a, b) => write!(f, "sub({a}, {b})"),
            Node::Mul(a, b) => write!(f, "mul({a}, {b})"),
            Node::Filter {
                kind,
                fc,
                q,
                gain: Some(g),
                input,
            } => write!(f, "{kind}({fc}, {q}, {g}, {input})"),
            Node::Filter {
                kind,
                fc,
                q,
                gain: None,
                input,
            } => write!(f, "{kind}({fc}, {q}, {input})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::{add, constant, input, keyed_const, peak, scale, sub};
    use std::time::{Duration, Instant};

    #[test]
    fn display_reads_like_a_call_tree() {
        let x = peak(
            keyed_const("b:fc", 1000.0),
            keyed_const("b:q", 2.0),
            keyed_const("b:g", -3.0),
            add(input(0), constant(0.5)),
        );

        assert_eq!(
            x.to_string(),
            "peak(const(b:fc=1000), const(b:q=2), const(b:g=-3), add(in(0), 0.5))"
        );
    }

    // Each stage reuses the previous pair twice per channel, like a mid/side band.
    fn encoded_chain(stages: usize, last_gain: f32) -> super::Signal {
        let (mut left, mut right) = (input(0), input(1));
        for i in 0..stages {
            let gain = if i + 1 == stages { last_gain } else { 0.0 };
            let mid = scale(0.5, add(left.clone(), right.clone()));
            let side = scale(0.5, sub(left, right));
            let mid = peak(
                keyed_const(format!("b{i}:fc"), 1000.0),
                keyed_const(format!("b{i}:q"), 1.0),
                keyed_const(format!("b{i}:g"), gain),
                mid,
            );
            left = add(mid.clone(), side.clone());
            right = sub(mid, side);
        }
        left
    }

    #[test]
    fn equality_of_shared_subgraphs_is_linear() {
        let start = Instant::now();
        let a = encoded_chain(64, 0.0);
        let b = encoded_chain(64, 0.0);
        let changed = encoded_chain(64, 1.0);

        assert!(!super::Signal::ptr_eq(&a, &b));
        assert_eq!(a, b);
        assert_ne!(a, changed);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn differing_shapes_are_unequal() {
        assert_ne!(add(input(0), input(1)), sub(input(0), input(1)));
        assert_ne!(input(0), input(1));
        assert_ne!(keyed_const("a", 1.0), constant(1.0));
        assert_eq!(scale(2.0, input(0)), scale(2.0, input(0)));
    }

    #[test]
    fn dropping_a_long_chain_does_not_recurse() {
        let handle = std::thread::Builder::new()
            .stack_size(128 * 1024)
            .spawn(|| {
                let mut x = input(0);
                for _ in 0..200_000 {
                    x = scale(1.0, x);
                }
                drop(x);
            })
            .unwrap();
        handle.join().unwrap();
    }
}
