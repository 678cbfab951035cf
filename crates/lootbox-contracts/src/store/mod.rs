//! Small JSON-file key-value stores shared by concurrent claims.

mod json_store;

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::rarity::RarityLabel;

pub use json_store::JsonStore;

/// Whole-document persistence with a mutual-exclusion scope per store.
pub trait Repository<T> {
    fn read(&self) -> Result<T>;
    fn write_atomic(&self, value: &T) -> Result<()>;
    /// One read-modify-write under the store's lock. Nothing is written when
    /// `mutate` fails.
    fn update<R>(&self, mutate: impl FnOnce(&mut T) -> Result<R>) -> Result<R>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: String,
    pub secret: String,
}

pub type UsersRoster = IndexMap<String, Account>;

/// Username to claimed day hashes, oldest first.
pub type ClaimHistory = IndexMap<String, Vec<String>>;

pub type RarityTally = BTreeMap<RarityLabel, u64>;
pub type RarityTallies = IndexMap<String, RarityTally>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCounter {
    pub next_id: u64,
}

impl TokenCounter {
    /// Hands out `count` consecutive ids and returns the first.
    pub fn reserve(&mut self, count: u64) -> u64 {
        let first = self.next_id;
        self.next_id += count;
        first
    }
}

pub fn zeroed_tally() -> RarityTally {
    crate::rarity::labels()
        .into_iter()
        .map(|label| (label, 0))
        .collect()
}

/// Stable marker for one calendar day: hex of the first 8 bytes of
/// sha256 over the ISO `(year, week, weekday)` triple.
pub fn day_hash(date: NaiveDate) -> String {
    let iso = date.iso_week();
    let key = format!(
        "{}-{}-{}",
        iso.year(),
        iso.week(),
        date.weekday().number_from_monday()
    );
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(&digest[..8])
}
