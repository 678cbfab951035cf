//! Collaborators and claim orchestration for the advent lootbox bot.

pub mod artists;
pub mod chat;
pub mod compositor;
pub mod config;
pub mod content;
pub mod error;
mod http;
pub mod ledger;
pub mod orchestrator;
pub mod season;

pub use config::{LootboxConfig, SeasonConfig};
pub use error::{ClaimError, ClaimResult};
pub use orchestrator::{ClaimOrchestrator, ClaimOutcome, ClaimStage, GiftRequest};
