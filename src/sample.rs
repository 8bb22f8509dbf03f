use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Sample types which the destination container can store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleType {
    Uint8,
    Uint16,
    Uint32,
    Float32,
}

impl SampleType {
    /// Size of a single sample in bytes.
    pub fn size(self) -> usize {
        match self {
            SampleType::Uint8 => 1,
            SampleType::Uint16 => 2,
            SampleType::Uint32 | SampleType::Float32 => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SampleType::Uint8 => "uint8",
            SampleType::Uint16 => "uint16",
            SampleType::Uint32 => "uint32",
            SampleType::Float32 => "float32",
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SampleType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = match s {
            "uint8" | "u8" => SampleType::Uint8,
            "uint16" | "u16" => SampleType::Uint16,
            "uint32" | "u32" => SampleType::Uint32,
            "float32" | "f32" | "float" => SampleType::Float32,
            s => return Err(Error::general(format!("unsupported sample type: {s}"))),
        };
        Ok(t)
    }
}
