pub mod band;
pub mod composer;
pub mod mid_side;

pub use band::{BandConfig, Channels, apply};
pub use composer::{build, build_from_inputs};
