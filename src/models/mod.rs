use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::data;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub party: String,
    pub abbreviation: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingCenter {
    pub code: String,
    pub name: String,
}

/// One vote count per known candidate abbreviation. Every candidate is
/// always present (explicit zero); unknown abbreviations never get in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    counts: BTreeMap<String, u64>,
}

impl VoteTally {
    pub fn zeroed() -> Self {
        let counts = data::candidates()
            .iter()
            .map(|c| (c.abbreviation.clone(), 0))
            .collect();
        Self { counts }
    }

    pub fn get(&self, abbreviation: &str) -> u64 {
        self.counts.get(abbreviation).copied().unwrap_or(0)
    }

    /// Returns false when the abbreviation is not a known candidate.
    pub fn set(&mut self, abbreviation: &str, count: u64) -> bool {
        match self.counts.get_mut(abbreviation) {
            Some(slot) => {
                *slot = count;
                true
            }
            None => false,
        }
    }

    pub fn add(&mut self, other: &VoteTally) {
        for (abbreviation, count) in &other.counts {
            if let Some(slot) = self.counts.get_mut(abbreviation) {
                *slot += count;
            }
        }
    }

    pub fn candidate_total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl Default for VoteTally {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Decoded form of one stored result. Raw documents are dynamic field maps;
/// decoding keeps only the known candidate keys plus the metadata fields and
/// treats anything non-numeric as zero.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultDocument {
    pub tally: VoteTally,
    pub null_and_void: u64,
    pub last_updated_by: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub region: Option<String>,
    pub district: Option<String>,
    pub constituency: Option<String>,
}

impl ResultDocument {
    pub fn decode(fields: &Map<String, Value>) -> Self {
        let mut tally = VoteTally::zeroed();
        for candidate in data::candidates() {
            let count = fields
                .get(&candidate.abbreviation)
                .map(count_field)
                .unwrap_or(0);
            tally.set(&candidate.abbreviation, count);
        }

        Self {
            tally,
            null_and_void: fields.get("nullAndVoid").map(count_field).unwrap_or(0),
            last_updated_by: string_field(fields, "lastUpdatedBy"),
            timestamp: fields
                .get("timestamp")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            region: string_field(fields, "region"),
            district: string_field(fields, "district"),
            constituency: string_field(fields, "constituency"),
        }
    }

    pub fn total_votes_cast(&self) -> u64 {
        self.tally.candidate_total() + self.null_and_void
    }
}

/// Payload for a merge-upsert. The store assigns the write timestamp.
#[derive(Debug, Clone)]
pub struct ResultWrite {
    pub tally: VoteTally,
    pub null_and_void: u64,
    pub last_updated_by: String,
    pub region: String,
    pub district: String,
    pub constituency: String,
}

impl ResultWrite {
    /// Flattens into the wire field map: one integer field per candidate
    /// abbreviation, matching the documents already in the shared store.
    pub fn into_fields(self) -> Map<String, Value> {
        let mut fields = Map::new();
        for (abbreviation, count) in self.tally.iter() {
            fields.insert(abbreviation.to_string(), Value::from(count));
        }
        fields.insert("nullAndVoid".to_string(), Value::from(self.null_and_void));
        fields.insert("lastUpdatedBy".to_string(), Value::from(self.last_updated_by));
        fields.insert("region".to_string(), Value::from(self.region));
        fields.insert("district".to_string(), Value::from(self.district));
        fields.insert("constituency".to_string(), Value::from(self.constituency));
        fields
    }
}

/// Locally entered, not-yet-submitted counts for one location. Lives only
/// for the session; kept per visited location so switching selections does
/// not lose work.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocalDraft {
    pub tally: VoteTally,
    pub null_and_void: u64,
}

impl LocalDraft {
    pub fn zeroed() -> Self {
        Self {
            tally: VoteTally::zeroed(),
            null_and_void: 0,
        }
    }

    pub fn from_document(doc: &ResultDocument) -> Self {
        Self {
            tally: doc.tally.clone(),
            null_and_void: doc.null_and_void,
        }
    }

    pub fn total_votes_cast(&self) -> u64 {
        self.tally.candidate_total() + self.null_and_void
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Constituency,
    District,
    National,
}

impl ViewMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "constituency" => Some(Self::Constituency),
            "district" => Some(Self::District),
            "national" => Some(Self::National),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Constituency => "constituency",
            Self::District => "district",
            Self::National => "national",
        }
    }
}

fn count_field(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| if f > 0.0 { f as u64 } else { 0 })),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
    .unwrap_or(0)
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_string)
}
