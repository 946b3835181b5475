use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::eq::mid_side;
use crate::graph::{self, FilterKind, Signal, StereoPair};

/// Which derived channel(s) a band filters.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Channels {
    Left,
    Right,
    #[default]
    Stereo,
    Mid,
    Side,
}

impl Channels {
    pub const ALL: [Self; 5] = [
        Self::Left,
        Self::Right,
        Self::Stereo,
        Self::Mid,
        Self::Side,
    ];

    pub const fn tag(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Stereo => "stereo",
            Self::Mid => "mid",
            Self::Side => "side",
        }
    }
}

impl FromStr for Channels {
    type Err = anyhow::Error;

    // No fallback here: an unknown routing is a caller error.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "stereo" => Ok(Self::Stereo),
            "mid" => Ok(Self::Mid),
            "side" => Ok(Self::Side),
            other => bail!("unknown channel routing '{other}'"),
        }
    }
}

impl std::fmt::Display for Channels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// One equalizer band.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BandConfig {
    /// Unique within a band list; prefixes the band's constant keys.
    pub key: String,
    /// Unset or unknown types resolve to peak.
    #[serde(rename = "type", default)]
    pub kind: FilterKind,
    pub fc: f32,
    pub q: f32,
    /// Gain in dB, only read by shelf and peak filters.
    #[serde(default)]
    pub g: f32,
    #[serde(default)]
    pub bypass: bool,
    pub channels: Channels,
}

impl BandConfig {
    pub fn new(key: impl Into<String>, kind: FilterKind, fc: f32, q: f32, g: f32) -> Self {
        Self {
            key: key.into(),
            kind,
            fc,
            q,
            g,
            bypass: false,
            channels: Channels::Stereo,
        }
    }

    pub const fn with_channels(mut self, channels: Channels) -> Self {
        self.channels = channels;
        self
    }

    pub const fn with_bypass(mut self, bypass: bool) -> Self {
        self.bypass = bypass;
        self
    }

    fn constant(&self, param: &str, value: f32) -> Signal {
        graph::keyed_const(format!("{}:{param}", self.key), value)
    }

    /// The filter this band applies, bound to its keyed parameters.
    fn filter(&self) -> impl Fn(Signal) -> Signal {
        let fc = self.constant("fc", self.fc);
        let q = self.constant("q", self.q);
        let g = self.constant("g", self.g);
        let kind = self.kind;

        move |x| match kind {
            FilterKind::Bandpass => graph::bandpass(fc.clone(), q.clone(), x),
            FilterKind::Highpass => graph::highpass(fc.clone(), q.clone(), x),
            FilterKind::Highshelf => graph::highshelf(fc.clone(), q.clone(), g.clone(), x),
            FilterKind::Lowpass => graph::lowpass(fc.clone(), q.clone(), x),
            FilterKind::Lowshelf => graph::lowshelf(fc.clone(), q.clone(), g.clone(), x),
            FilterKind::Notch => graph::notch(fc.clone(), q.clone(), x),
            FilterKind::Peak => graph::peak(fc.clone(), q.clone(), g.clone(), x),
        }
    }
}

/// Applies one band to `input`. A bypassed band hands back `input` itself.
pub fn apply(band: &BandConfig, input: StereoPair) -> StereoPair {
    if band.bypass {
        return input;
    }

    let filter = band.filter();
    let StereoPair { left, right } = input;

    match band.channels {
        Channels::Mid | Channels::Side => {
            let (mid, side) = mid_side::encode(left, right);
            let (mid, side) = if band.channels == Channels::Mid {
                (filter(mid), side)
            } else {
                (mid, filter(side))
            };
            mid_side::decode(mid, side)
        }
        Channels::Left => StereoPair::new(filter(left), right),
        Channels::Right => StereoPair::new(left, filter(right)),
        Channels::Stereo => StereoPair::new(filter(left), filter(right)),
    }
}
