use anyhow::{Result, anyhow};
use arc_swap::ArcSwap;
use crossbeam::channel::{Receiver, Sender, unbounded};
use log::debug;
use std::sync::{Arc, Mutex};

use crate::config::band_list::{BandEdit, BandList};
use crate::eq::BandConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigEvent {
    Changed { generation: u64 },
}

/// A band list together with the generation that produced it.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub generation: u64,
    pub bands: BandList,
}

/// Read side of a [`Session`]; cheap to clone and safe to hold on any thread.
#[derive(Clone)]
pub struct SnapshotReader {
    current: Arc<ArcSwap<Snapshot>>,
}

impl SnapshotReader {
    pub fn load(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }
}

/// The live, editable band configuration.
///
/// Readers always see a whole snapshot. Every successful mutation publishes
/// a new snapshot and then emits one [`ConfigEvent::Changed`].
pub struct Session {
    current: Arc<ArcSwap<Snapshot>>,
    write_lock: Mutex<()>,
    tx_events: Sender<ConfigEvent>,
}

impl Session {
    pub fn new(bands: BandList) -> (Self, Receiver<ConfigEvent>) {
        let (tx_events, rx_events) = unbounded();
        let current = Arc::new(ArcSwap::from_pointee(Snapshot {
            generation: 0,
            bands,
        }));

        (
            Self {
                current,
                write_lock: Mutex::new(()),
                tx_events,
            },
            rx_events,
        )
    }

    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            current: Arc::clone(&self.current),
        }
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    pub fn bands(&self) -> BandList {
        self.current.load().bands.clone()
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }

    pub fn edit(&self, key: &str, edit: BandEdit) -> Result<u64> {
        self.update(|bands| bands.with_edit(key, edit))
    }

    pub fn insert(&self, index: usize, band: BandConfig) -> Result<u64> {
        self.update(|bands| bands.with_inserted(index, band))
    }

    pub fn push(&self, band: BandConfig) -> Result<u64> {
        self.update(|bands| Ok(bands.with_pushed(band)))
    }

    pub fn remove(&self, key: &str) -> Result<u64> {
        self.update(|bands| bands.without(key))
    }

    /// Swaps in a whole new band list, e.g. when a preset is loaded.
    pub fn replace(&self, bands: BandList) -> Result<u64> {
        self.update(|_| Ok(bands))
    }

    fn update(&self, change: impl FnOnce(&BandList) -> Result<BandList>) -> Result<u64> {
        let generation = {
            let _guard = self
                .write_lock
                .lock()
                .map_err(|_| anyhow!("session write lock poisoned"))?;

            let current = self.current.load();
            let bands = change(&current.bands)?;
            let generation = current.generation + 1;
            self.current
                .store(Arc::new(Snapshot { generation, bands }));
            generation
        };

        if self
            .tx_events
            .send(ConfigEvent::Changed { generation })
            .is_err()
        {
            debug!("No listener for configuration changes (generation {generation})");
        }

        Ok(generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::band_list::default_bands;

    #[test]
    fn each_edit_emits_one_event() {
        let (session, rx) = Session::new(default_bands());

        session.edit("eq1", BandEdit::Gain(1.0)).unwrap();
        session.edit("eq3", BandEdit::ToggleBypass).unwrap();

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                ConfigEvent::Changed { generation: 1 },
                ConfigEvent::Changed { generation: 2 }
            ]
        );
        assert_eq!(session.generation(), 2);
    }

    #[test]
    fn failed_edit_changes_nothing() {
        let (session, rx) = Session::new(default_bands());

        assert!(session.edit("missing", BandEdit::Q(3.0)).is_err());
        assert_eq!(session.generation(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn held_snapshot_is_unaffected_by_later_edits() {
        let (session, _rx) = Session::new(default_bands());
        let held = session.reader().load();

        session.edit("eq1", BandEdit::Frequency(20.0)).unwrap();
        session.remove("eq2").unwrap();

        assert_eq!(held.bands.len(), 3);
        assert_eq!(held.bands.get("eq1").unwrap().fc, 1000.0);
        assert_eq!(session.bands().len(), 2);
        assert_eq!(session.bands().get("eq1").unwrap().fc, 20.0);
    }

    #[test]
    fn edits_work_without_a_listener() {
        let (session, rx) = Session::new(BandList::default());
        drop(rx);

        let band = BandConfig::new("x", crate::graph::FilterKind::Notch, 60.0, 10.0, 0.0);
        assert_eq!(session.push(band).unwrap(), 1);
        assert_eq!(session.replace(default_bands()).unwrap(), 2);
        assert_eq!(session.bands(), default_bands());
    }
}
