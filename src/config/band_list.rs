use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

use crate::eq::{BandConfig, Channels};
use crate::graph::FilterKind;

/// A single-field change to one band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BandEdit {
    Frequency(f32),
    Q(f32),
    Gain(f32),
    Type(FilterKind),
    Channels(Channels),
    Bypass(bool),
    ToggleBypass,
}

impl BandEdit {
    fn apply_to(self, band: &mut BandConfig) {
        match self {
            Self::Frequency(fc) => band.fc = fc,
            Self::Q(q) => band.q = q,
            Self::Gain(g) => band.g = g,
            Self::Type(kind) => band.kind = kind,
            Self::Channels(channels) => band.channels = channels,
            Self::Bypass(bypass) => band.bypass = bypass,
            Self::ToggleBypass => band.bypass = !band.bypass,
        }
    }
}

/// Immutable, ordered snapshot of the equalizer's bands.
///
/// Edits return a new list. Bands an edit does not touch stay shared with
/// the list they came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BandList {
    bands: Vec<Arc<BandConfig>>,
}

impl BandList {
    pub fn new(bands: impl IntoIterator<Item = BandConfig>) -> Self {
        Self {
            bands: bands.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BandConfig> {
        self.bands.iter().map(deref_band)
    }

    pub fn get(&self, key: &str) -> Option<&BandConfig> {
        self.iter().find(|band| band.key == key)
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.bands.iter().position(|band| band.key == key)
    }

    /// Shared handle to the band at `index`.
    pub fn band_arc(&self, index: usize) -> Option<&Arc<BandConfig>> {
        self.bands.get(index)
    }

    /// Applies `edit` to the first band keyed `key`.
    pub fn with_edit(&self, key: &str, edit: BandEdit) -> Result<Self> {
        let index = self
            .position(key)
            .ok_or_else(|| anyhow!("no band with key '{key}'"))?;

        let mut band = BandConfig::clone(&self.bands[index]);
        edit.apply_to(&mut band);

        let mut bands = self.bands.clone();
        bands[index] = Arc::new(band);
        Ok(Self { bands })
    }

    /// Replaces the band at `key`'s position wholesale; its position is kept.
    pub fn with_replaced(&self, key: &str, band: BandConfig) -> Result<Self> {
        let index = self
            .position(key)
            .ok_or_else(|| anyhow!("no band with key '{key}'"))?;

        let mut bands = self.bands.clone();
        bands[index] = Arc::new(band);
        Ok(Self { bands })
    }

    pub fn with_inserted(&self, index: usize, band: BandConfig) -> Result<Self> {
        if index > self.bands.len() {
            bail!(
                "insert position {index} is past the end of {} bands",
                self.bands.len()
            );
        }

        let mut bands = self.bands.clone();
        bands.insert(index, Arc::new(band));
        Ok(Self { bands })
    }

    pub fn with_pushed(&self, band: BandConfig) -> Self {
        let mut bands = self.bands.clone();
        bands.push(Arc::new(band));
        Self { bands }
    }

    pub fn without(&self, key: &str) -> Result<Self> {
        let index = self
            .position(key)
            .ok_or_else(|| anyhow!("no band with key '{key}'"))?;

        let mut bands = self.bands.clone();
        bands.remove(index);
        Ok(Self { bands })
    }

    /// Keys that appear on more than one band.
    pub fn duplicate_keys(&self) -> Vec<&str> {
        let mut duplicates: Vec<&str> = Vec::new();
        for (i, band) in self.bands.iter().enumerate() {
            let key = band.key.as_str();
            if self.bands[..i].iter().any(|b| b.key == key) && !duplicates.contains(&key) {
                duplicates.push(key);
            }
        }
        duplicates
    }

    pub fn to_vec(&self) -> Vec<BandConfig> {
        self.iter().cloned().collect()
    }
}

impl<'a> IntoIterator for &'a BandList {
    type Item = &'a BandConfig;
    type IntoIter = std::iter::Map<
        std::slice::Iter<'a, Arc<BandConfig>>,
        fn(&'a Arc<BandConfig>) -> &'a BandConfig,
    >;

    fn into_iter(self) -> Self::IntoIter {
        self.bands.iter().map(deref_band as fn(&'a Arc<BandConfig>) -> &'a BandConfig)
    }
}

fn deref_band(band: &Arc<BandConfig>) -> &BandConfig {
    band
}

impl FromIterator<BandConfig> for BandList {
    fn from_iter<I: IntoIterator<Item = BandConfig>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl Serialize for BandList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for BandList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<BandConfig>::deserialize(deserializer).map(Self::new)
    }
}

/// The bands a fresh session starts with.
pub fn default_bands() -> BandList {
    BandList::new([
        BandConfig::new("eq1", FilterKind::Highshelf, 1000.0, 1.414, 3.0),
        BandConfig::new("eq2", FilterKind::Peak, 10000.0, 0.717, -3.0)
            .with_channels(Channels::Left),
        BandConfig::new("eq3", FilterKind::Highpass, 100.0, 0.2, 3.0),
    ])
}
