//! Domain data structures for properties, bin collections, and config entries.

use std::collections::BTreeMap;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::DOMAIN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
/// Unique Property Reference Number identifying a household.
pub struct Uprn(pub u64);

impl fmt::Display for Uprn {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl FromStr for Uprn {
    type Err = ParseIntError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        raw.trim().parse().map(Uprn)
    }
}

impl From<u64> for Uprn {
    fn from(value: u64) -> Self {
        Uprn(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Next collection of a single bin, as reported by the council.
pub struct BinCollection {
    /// Waste category, e.g. `general` or `recycling`.
    pub bin_type: String,
    /// Local date and time of the next collection.
    pub collection_timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
/// Latest known collection per bin type.
pub struct BinSchedule(BTreeMap<String, NaiveDateTime>);

impl BinSchedule {
    /// Build a schedule from fetched records.
    ///
    /// Later records overwrite earlier ones sharing a bin type.
    #[must_use]
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = BinCollection>,
    {
        let bins = records
            .into_iter()
            .map(|record| (record.bin_type, record.collection_timestamp))
            .collect();
        Self(bins)
    }

    /// Collection timestamp for a bin type.
    #[must_use]
    pub fn get(&self, bin_type: &str) -> Option<NaiveDateTime> {
        self.0.get(bin_type).copied()
    }

    /// Bin types in alphabetical order.
    pub fn bin_types(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of bin types known.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the schedule holds no bins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Data stored for a config entry.
pub struct EntryData {
    /// Property the entry tracks.
    pub uprn: Uprn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A configured location, as persisted by the host.
pub struct ConfigEntry {
    /// Host-assigned identifier.
    pub entry_id: String,
    /// Identifier used to reject duplicate entries.
    pub unique_id: String,
    /// Human-friendly title.
    pub title: String,
    /// Entry payload.
    pub data: EntryData,
}

impl ConfigEntry {
    /// Create an entry for a validated UPRN.
    #[must_use]
    pub fn new(title: impl Into<String>, data: EntryData) -> Self {
        Self {
            entry_id: format!("{DOMAIN}_{}", data.uprn),
            unique_id: unique_id_for(data.uprn),
            title: title.into(),
            data,
        }
    }

    /// Property the entry tracks.
    #[must_use]
    pub fn uprn(&self) -> Uprn {
        self.data.uprn
    }
}

/// Unique id under which an entry for `uprn` is registered.
#[must_use]
pub fn unique_id_for(uprn: Uprn) -> String {
    format!("hdc_bins_{uprn}")
}

/// Title given to an entry for `uprn`.
#[must_use]
pub fn entry_title(uprn: Uprn) -> String {
    format!("Bin collections at UPRN {uprn}")
}
