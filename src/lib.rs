// Pedantic and nursery lints are on; the allows below cover graph and DSP code.
#![warn(clippy::pedantic, clippy::nursery)]
// Builders and constructors would all need #[must_use]
#![allow(clippy::must_use_candidate, clippy::return_self_not_must_use)]
// Sample rates and frame counts are cast between float and integer
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::cast_possible_wrap
)]
// Errors are anyhow chains with context, so no doc sections
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]
// Graph constructors take nodes by value and tests compare floats exactly
#![allow(
    clippy::module_name_repetitions,
    clippy::doc_markdown,
    clippy::float_cmp,
    clippy::many_single_char_names,
    clippy::needless_pass_by_value,
    clippy::unnecessary_wraps
)]
#![allow(clippy::redundant_pub_crate)]

pub mod config;
pub mod eq;
pub mod graph;
pub mod preset;
pub mod render;
pub mod settings;
