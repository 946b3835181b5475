use crate::graph::{self, Signal, StereoPair};

/// `mid = ½(l + r)`, `side = ½(l − r)`.
pub fn encode(left: Signal, right: Signal) -> (Signal, Signal) {
    let mid = graph::scale(0.5, graph::add(left.clone(), right.clone()));
    let side = graph::scale(0.5, graph::sub(left, right));
    (mid, side)
}

/// Inverse of [`encode`]: `l = mid + side`, `r = mid − side`.
pub fn decode(mid: Signal, side: Signal) -> StereoPair {
    StereoPair::new(
        graph::add(mid.clone(), side.clone()),
        graph::sub(mid, side),
    )
}
