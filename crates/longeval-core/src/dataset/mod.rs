//! Benchmark datasets: keyed prompts in, accuracy out.

pub mod stackselect;
pub mod textsort;

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::model::{ResultRecord, WorkItem};

/// A benchmark dataset. Keys must be stable across reruns (derived from
/// record identity, never list position).
pub trait Dataset: Send + Sync + std::fmt::Debug {
    /// e.g. `stackselect_4k`.
    fn name(&self) -> &str;

    fn work_items(&self) -> Vec<WorkItem>;

    /// Score completed predictions (percent accuracy). Called only once the
    /// store has been verified complete.
    fn evaluate(&self, records: &[ResultRecord]) -> f64;
}

/// Context-length setting, from 1k to 128k tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setting {
    kilo: u32,
}

impl Setting {
    pub const ALL: [Setting; 8] = [
        Setting { kilo: 1 },
        Setting { kilo: 2 },
        Setting { kilo: 4 },
        Setting { kilo: 8 },
        Setting { kilo: 16 },
        Setting { kilo: 32 },
        Setting { kilo: 64 },
        Setting { kilo: 128 },
    ];

    pub fn kilo(&self) -> u32 {
        self.kilo
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}k", self.kilo)
    }
}

impl FromStr for Setting {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let setting = Self::ALL
            .iter()
            .find(|c| c.to_string() == s)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("unknown setting '{s}' (expected 1k..128k)"))?;
        Ok(setting)
    }
}

/// How many records to keep per setting. `Less` is the trimmed variant used
/// for paid API backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetMode {
    Normal,
    Less,
}

impl DatasetMode {
    pub fn item_limit(&self, setting: Setting) -> usize {
        match self {
            DatasetMode::Normal => {
                if setting.kilo() < 32 {
                    1000
                } else {
                    200
                }
            }
            DatasetMode::Less => {
                if setting.kilo() < 32 {
                    200
                } else {
                    50
                }
            }
        }
    }
}

/// Record ids appear as either JSON numbers or strings in the data files.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub(crate) enum RecordId {
    Num(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Num(n) => write!(f, "{n}"),
            RecordId::Text(s) => write!(f, "{s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_parse_and_display_roundtrip() {
        for s in Setting::ALL {
            assert_eq!(s.to_string().parse::<Setting>().unwrap(), s);
        }
        assert!("3k".parse::<Setting>().is_err());
    }

    #[test]
    fn item_limits_switch_at_32k() {
        let s16: Setting = "16k".parse().unwrap();
        let s32: Setting = "32k".parse().unwrap();
        assert_eq!(DatasetMode::Normal.item_limit(s16), 1000);
        assert_eq!(DatasetMode::Normal.item_limit(s32), 200);
        assert_eq!(DatasetMode::Less.item_limit(s16), 200);
        assert_eq!(DatasetMode::Less.item_limit(s32), 50);
    }

    #[test]
    fn record_ids_deserialize_from_numbers_and_strings() {
        let n: RecordId = serde_json::from_str("42").unwrap();
        let s: RecordId = serde_json::from_str("\"q42\"").unwrap();
        assert_eq!(n.to_string(), "42");
        assert_eq!(s.to_string(), "q42");
    }
}
