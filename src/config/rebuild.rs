use anyhow::{Context, Result};
use crossbeam::channel::Receiver;
use log::{debug, error, info, warn};
use std::thread::{self, JoinHandle};

use crate::config::session::{ConfigEvent, SnapshotReader};
use crate::eq::composer;
use crate::render::RenderTarget;

/// Rebuilds the graph from scratch whenever the configuration changes and
/// hands the result to a [`RenderTarget`].
///
/// Events that pile up between two polls are coalesced: only the newest
/// snapshot gets built, anything older would have been superseded anyway.
pub struct Rebuilder<T: RenderTarget> {
    reader: SnapshotReader,
    rx_events: Receiver<ConfigEvent>,
    target: T,
    last_built: Option<u64>,
}

impl<T: RenderTarget> Rebuilder<T> {
    pub const fn new(reader: SnapshotReader, rx_events: Receiver<ConfigEvent>, target: T) -> Self {
        Self {
            reader,
            rx_events,
            target,
            last_built: None,
        }
    }

    pub const fn target(&self) -> &T {
        &self.target
    }

    pub const fn last_built(&self) -> Option<u64> {
        self.last_built
    }

    /// Handles any pending change events without blocking. Returns the
    /// generation that was built, if any.
    pub fn poll(&mut self) -> Result<Option<u64>> {
        let pending = self.rx_events.try_iter().count();
        if pending == 0 {
            return Ok(None);
        }
        if pending > 1 {
            debug!("Coalescing {pending} configuration changes");
        }
        self.rebuild_now().map(Some)
    }

    /// Builds and installs the current snapshot regardless of pending events.
    pub fn rebuild_now(&mut self) -> Result<u64> {
        let snapshot = self.reader.load();

        let duplicates = snapshot.bands.duplicate_keys();
        if !duplicates.is_empty() {
            warn!("Duplicate band keys: {}", duplicates.join(", "));
        }

        let graph = composer::build_from_inputs(&snapshot.bands);
        self.target
            .install(graph)
            .with_context(|| format!("failed to install generation {}", snapshot.generation))?;

        debug!(
            "Installed generation {} ({} bands)",
            snapshot.generation,
            snapshot.bands.len()
        );
        self.last_built = Some(snapshot.generation);
        Ok(snapshot.generation)
    }
}

impl<T: RenderTarget + 'static> Rebuilder<T> {
    /// Blocks on change events until the session is dropped.
    pub fn run(mut self) {
        while self.rx_events.recv().is_ok() {
            let skipped = self.rx_events.try_iter().count();
            if skipped > 0 {
                debug!("Coalescing {} configuration changes", skipped + 1);
            }
            if let Err(e) = self.rebuild_now() {
                error!("Rebuild failed: {e:#}");
            }
        }
        info!("Configuration session closed, rebuilder stopping");
    }

    pub fn spawn(self) -> Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("eq-rebuilder".to_string())
            .spawn(move || self.run())
            .context("failed to spawn rebuilder thread")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::band_list::{BandEdit, default_bands};
    use crate::config::session::Session;
    use crate::graph::StereoPair;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recording {
        installs: Arc<Mutex<Vec<StereoPair>>>,
    }

    impl RenderTarget for Recording {
        fn install(&self, graph: StereoPair) -> Result<()> {
            self.installs.lock().unwrap().push(graph);
            Ok(())
        }
    }

    impl Recording {
        fn count(&self) -> usize {
            self.installs.lock().unwrap().len()
        }
    }

    #[test]
    fn poll_without_changes_builds_nothing() {
        let (session, rx) = Session::new(default_bands());
        let mut rebuilder = Rebuilder::new(session.reader(), rx, Recording::default());

        assert_eq!(rebuilder.poll().unwrap(), None);
        assert_eq!(rebuilder.target().count(), 0);
    }

    #[test]
    fn one_change_one_rebuild() {
        let (session, rx) = Session::new(default_bands());
        let mut rebuilder = Rebuilder::new(session.reader(), rx, Recording::default());

        session.edit("eq1", BandEdit::Gain(0.0)).unwrap();
        assert_eq!(rebuilder.poll().unwrap(), Some(1));
        session.edit("eq2", BandEdit::Gain(0.0)).unwrap();
        assert_eq!(rebuilder.poll().unwrap(), Some(2));

        assert_eq!(rebuilder.target().count(), 2);
        assert_eq!(rebuilder.last_built(), Some(2));
    }

    #[test]
    fn burst_of_changes_builds_only_the_latest() {
        let (session, rx) = Session::new(default_bands());
        let mut rebuilder = Rebuilder::new(session.reader(), rx, Recording::default());

        for gain in [1.0, 2.0, 3.0] {
            session.edit("eq1", BandEdit::Gain(gain)).unwrap();
        }
        assert_eq!(rebuilder.poll().unwrap(), Some(3));
        assert_eq!(rebuilder.target().count(), 1);

        let installed = rebuilder.target().installs.lock().unwrap()[0].clone();
        let expected = composer::build_from_inputs(&session.bands());
        assert_eq!(installed, expected);
    }

    #[test]
    fn spawned_rebuilder_stops_when_session_drops() {
        let (session, rx) = Session::new(default_bands());
        let target = Recording::default();
        let handle = Rebuilder::new(session.reader(), rx, target.clone())
            .spawn()
            .unwrap();

        session.edit("eq3", BandEdit::Bypass(true)).unwrap();
        drop(session);
        handle.join().unwrap();

        assert_eq!(target.count(), 1);
    }
}
