use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

/// Sample rate EVI assumes for linear16 input when none is announced.
pub const EVI_DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Channel count EVI assumes when none is announced.
pub const EVI_DEFAULT_CHANNELS: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AudioEncoding {
    #[default]
    Linear16,
    Custom(String),
}

impl Serialize for AudioEncoding {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            AudioEncoding::Linear16 => serializer.serialize_str("linear16"),
            AudioEncoding::Custom(s) => serializer.serialize_str(s),
        }
    }
}

impl FromStr for AudioEncoding {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "linear16" => AudioEncoding::Linear16,
            _ => AudioEncoding::Custom(s.to_string()),
        })
    }
}

impl<'de> Deserialize<'de> for AudioEncoding {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(AudioEncoding::from_str(&s).unwrap_or_else(|never| match never {}))
    }
}
