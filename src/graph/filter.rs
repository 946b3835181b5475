use log::warn;
use serde::{Deserialize, Serialize};

/// The seven filter primitives a band can select.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "Option<String>", into = "String")]
pub enum FilterKind {
    Bandpass,
    Highpass,
    Highshelf,
    Lowpass,
    Lowshelf,
    Notch,
    #[default]
    Peak,
}

impl FilterKind {
    pub const ALL: [Self; 7] = [
        Self::Bandpass,
        Self::Highpass,
        Self::Highshelf,
        Self::Lowpass,
        Self::Lowshelf,
        Self::Notch,
        Self::Peak,
    ];

    /// Parses a filter tag. Tags outside the closed set resolve to
    /// [`FilterKind::Peak`].
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "bandpass" => Self::Bandpass,
            "highpass" => Self::Highpass,
            "highshelf" => Self::Highshelf,
            "lowpass" => Self::Lowpass,
            "lowshelf" => Self::Lowshelf,
            "notch" => Self::Notch,
            "peak" => Self::Peak,
            other => {
                warn!("Unknown filter type '{other}', falling back to peak");
                Self::Peak
            }
        }
    }

    pub const fn tag(self) -> &'static str {
        match self {
            Self::Bandpass => "bandpass",
            Self::Highpass => "highpass",
            Self::Highshelf => "highshelf",
            Self::Lowpass => "lowpass",
            Self::Lowshelf => "lowshelf",
            Self::Notch => "notch",
            Self::Peak => "peak",
        }
    }

    /// Whether the band's gain parameter means anything for this kind.
    pub const fn has_gain(self) -> bool {
        matches!(self, Self::Highshelf | Self::Lowshelf | Self::Peak)
    }
}

impl From<String> for FilterKind {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

/// An unset tag (`null` or a missing field) means the default, peak.
impl From<Option<String>> for FilterKind {
    fn from(tag: Option<String>) -> Self {
        tag.map_or_else(Self::default, |tag| Self::from_tag(&tag))
    }
}

impl From<FilterKind> for String {
    fn from(kind: FilterKind) -> Self {
        kind.tag().to_string()
    }
}

impl std::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}
