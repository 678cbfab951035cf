use lootbox_contracts::rarity::RarityError;
use thiserror::Error;

/// Terminal outcome of a failed player or admin request.
#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("the event has ended")]
    EventEnded,
    #[error("the event has not started yet")]
    EventNotStarted,
    #[error("no account for {0}")]
    NoAccount(String),
    #[error("{0} already claimed today")]
    AlreadyClaimedToday(String),
    #[error("art generation failed: {0:#}")]
    GenerationFailure(#[source] anyhow::Error),
    #[error("content store failed: {0:#}")]
    ContentStoreFailure(#[source] anyhow::Error),
    #[error("minting failed: {0:#}")]
    MintFailure(#[source] anyhow::Error),
    #[error("transfer failed: {0:#}")]
    TransferFailure(#[source] anyhow::Error),
    #[error("{0} is not authorized")]
    NotAuthorized(String),
    #[error(transparent)]
    Rarity(#[from] RarityError),
    #[error("persistence failed: {0:#}")]
    Persistence(#[source] anyhow::Error),
}

impl ClaimError {
    /// Outcomes a player can act on. Everything else goes to an operator.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::EventEnded
                | Self::EventNotStarted
                | Self::NoAccount(_)
                | Self::AlreadyClaimedToday(_)
                | Self::NotAuthorized(_)
                | Self::TransferFailure(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::EventEnded => "event_ended",
            Self::EventNotStarted => "event_not_started",
            Self::NoAccount(_) => "no_account",
            Self::AlreadyClaimedToday(_) => "already_claimed_today",
            Self::GenerationFailure(_) => "generation_failure",
            Self::ContentStoreFailure(_) => "content_store_failure",
            Self::MintFailure(_) => "mint_failure",
            Self::TransferFailure(_) => "transfer_failure",
            Self::NotAuthorized(_) => "not_authorized",
            Self::Rarity(_) => "rarity",
            Self::Persistence(_) => "persistence",
        }
    }
}

pub type ClaimResult<T> = std::result::Result<T, ClaimError>;
