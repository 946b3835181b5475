pub mod band_list;
pub mod rebuild;
pub mod session;

pub use band_list::{BandEdit, BandList, default_bands};
pub use rebuild::Rebuilder;
pub use session::{ConfigEvent, Session, Snapshot, SnapshotReader};
