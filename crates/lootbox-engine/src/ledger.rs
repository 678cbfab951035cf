//! Token ownership. `LocalLedger` is a JSON-backed test chain.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Result};
use lootbox_contracts::store::{JsonStore, Repository};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUri {
    pub token_id: u64,
    pub uri: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Balance {
    pub native: f64,
    pub tokens: u64,
}

pub trait Ledger: Send + Sync {
    fn name(&self) -> &str;
    fn mint(&self, address: &str, tokens: &[TokenUri]) -> Result<()>;
    fn transfer(&self, from: &str, from_secret: &str, to: &str, token_id: u64) -> Result<()>;
    fn owner_of(&self, token_id: u64) -> Result<Option<String>>;
    fn balance_of(&self, address: &str) -> Result<Balance>;
}

/// `0x` followed by the first 20 bytes of sha256(secret), hex encoded.
pub fn address_from_secret(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    format!("0x{}", hex::encode(&digest[..20]))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub owner: String,
    pub uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerState {
    #[serde(default)]
    pub tokens: BTreeMap<u64, TokenRecord>,
    #[serde(default)]
    pub native: BTreeMap<String, f64>,
}

pub struct LocalLedger {
    state: JsonStore<LedgerState>,
}

impl LocalLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            state: JsonStore::new(path),
        }
    }

    pub fn credit(&self, address: &str, amount: f64) -> Result<()> {
        self.state.update(|state| {
            *state.native.entry(address.to_string()).or_insert(0.0) += amount;
            Ok(())
        })
    }
}

impl Ledger for LocalLedger {
    fn name(&self) -> &str {
        "local"
    }

    fn mint(&self, address: &str, tokens: &[TokenUri]) -> Result<()> {
        self.state.update(|state| {
            if let Some(taken) = tokens
                .iter()
                .find(|token| state.tokens.contains_key(&token.token_id))
            {
                bail!("token {} already minted", taken.token_id);
            }
            for token in tokens {
                state.tokens.insert(
                    token.token_id,
                    TokenRecord {
                        owner: address.to_string(),
                        uri: token.uri.clone(),
                    },
                );
            }
            Ok(())
        })
    }

    fn transfer(&self, from: &str, from_secret: &str, to: &str, token_id: u64) -> Result<()> {
        if address_from_secret(from_secret) != from {
            bail!("secret does not match {from}");
        }
        self.state.update(|state| {
            let Some(record) = state.tokens.get_mut(&token_id) else {
                bail!("token {token_id} does not exist");
            };
            if record.owner != from {
                bail!("{from} does not own token {token_id}");
            }
            record.owner = to.to_string();
            Ok(())
        })
    }

    fn owner_of(&self, token_id: u64) -> Result<Option<String>> {
        Ok(self
            .state
            .read()?
            .tokens
            .get(&token_id)
            .map(|record| record.owner.clone()))
    }

    fn balance_of(&self, address: &str) -> Result<Balance> {
        let state = self.state.read()?;
        Ok(Balance {
            native: state.native.get(address).copied().unwrap_or(0.0),
            tokens: state
                .tokens
                .values()
                .filter(|record| record.owner == address)
                .count() as u64,
        })
    }
}
