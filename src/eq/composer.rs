use log::debug;

use crate::eq::band::{self, BandConfig};
use crate::graph::StereoPair;

/// Folds `bands` over `input` strictly in iteration order.
///
/// No band is skipped, merged or reordered. An empty iterator hands `input`
/// back unchanged.
pub fn build<'a>(bands: impl IntoIterator<Item = &'a BandConfig>, input: StereoPair) -> StereoPair {
    bands.into_iter().fold(input, |acc, band| {
        debug!(
            "band {}: {} {} fc={} q={} g={}{}",
            band.key,
            band.kind,
            band.channels,
            band.fc,
            band.q,
            band.g,
            if band.bypass { " (bypassed)" } else { "" }
        );
        band::apply(band, acc)
    })
}

/// [`build`] seeded with the raw stereo input.
pub fn build_from_inputs<'a>(bands: impl IntoIterator<Item = &'a BandConfig>) -> StereoPair {
    build(bands, StereoPair::inputs())
}
