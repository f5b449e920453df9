//! TextSort: restore the original order of four shuffled book paragraphs.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use super::{Dataset, DatasetMode, RecordId, Setting};
use crate::model::{ResultRecord, WorkItem};

const PARAGRAPHS: usize = 4;

#[derive(Debug, Clone, Deserialize)]
struct TextSortRecord {
    book_id: RecordId,
    para_offset: Vec<i64>,
    /// Prompts ship pre-rendered in the data file.
    prompt: String,
    /// The correct permutation, as a JSON array or a JSON-encoded string.
    answer: serde_json::Value,
}

#[derive(Debug)]
pub struct TextSort {
    name: String,
    records: Vec<TextSortRecord>,
}

impl TextSort {
    /// Load `data/textsort_{setting}.json`, truncated per `mode`.
    pub fn load(data_dir: &Path, setting: Setting, mode: DatasetMode) -> anyhow::Result<Self> {
        let name = format!("textsort_{setting}");
        let path = data_dir.join(format!("{name}.json"));
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read dataset file {}", path.display()))?;
        let mut records: Vec<TextSortRecord> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse dataset file {}", path.display()))?;
        records.truncate(mode.item_limit(setting));
        Ok(Self { name, records })
    }

    fn key(record: &TextSortRecord) -> String {
        let offsets: Vec<String> = record.para_offset.iter().map(|x| x.to_string()).collect();
        format!("{}_{}", record.book_id, offsets.join("_"))
    }

    fn expected(record: &TextSortRecord) -> Vec<i64> {
        match &record.answer {
            serde_json::Value::String(s) => serde_json::from_str(s).unwrap_or_default(),
            other => serde_json::from_value(other.clone()).unwrap_or_default(),
        }
    }
}

fn is_subsequence(needle: &str, haystack: &str) -> bool {
    let mut hay = haystack.chars();
    needle.chars().all(|c| hay.any(|h| h == c))
}

fn permutations() -> Vec<String> {
    let mut perms = Vec::new();
    for a in 1..=PARAGRAPHS {
        for b in 1..=PARAGRAPHS {
            for c in 1..=PARAGRAPHS {
                for d in 1..=PARAGRAPHS {
                    if a != b && a != c && a != d && b != c && b != d && c != d {
                        perms.push(format!("{a}{b}{c}{d}"));
                    }
                }
            }
        }
    }
    perms
}

/// Parse the predicted ordering: a JSON array after an optional `Answer:`
/// marker, else the single permutation of 1..4 that appears as a character
/// subsequence of the text. Ambiguity or no match scores as all zeros.
fn extract_order(prediction: &str) -> Vec<i64> {
    let tail = match prediction.split_once("Answer:") {
        Some((_, rest)) => rest.trim(),
        None => prediction.trim(),
    };
    if let Ok(order) = serde_json::from_str::<Vec<i64>>(tail) {
        return order;
    }

    let matches: Vec<String> = permutations()
        .into_iter()
        .filter(|p| is_subsequence(p, tail))
        .collect();
    if let [only] = matches.as_slice() {
        return only
            .chars()
            .map(|c| i64::from(c.to_digit(10).unwrap_or(0)))
            .collect();
    }
    vec![0; PARAGRAPHS]
}

impl Dataset for TextSort {
    fn name(&self) -> &str {
        &self.name
    }

    fn work_items(&self) -> Vec<WorkItem> {
        self.records
            .iter()
            .map(|r| WorkItem::new(Self::key(r), r.prompt.clone()))
            .collect()
    }

    fn evaluate(&self, records: &[ResultRecord]) -> f64 {
        let predictions: BTreeMap<&str, &str> = records
            .iter()
            .map(|r| (r.key.as_str(), r.value.as_str()))
            .collect();

        let mut hits = 0usize;
        for record in &self.records {
            let key = Self::key(record);
            let Some(prediction) = predictions.get(key.as_str()) else {
                continue;
            };
            if extract_order(prediction) == Self::expected(record) {
                hits += 1;
            }
        }
        100.0 * hits as f64 / self.records.len().max(1) as f64
    }
}
