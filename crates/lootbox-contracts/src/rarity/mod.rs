//! Rarity tiers, the weekly drop schedule and tier-gated trait sampling.

mod attributes;
mod label;
mod pools;
mod schedule;

use thiserror::Error;

pub use attributes::{sample_attributes, sample_frame, FrameChoice, SampledAttributes};
pub use label::{label_of, labels, level_of, RarityLabel, LABEL_COUNT};
pub use pools::{
    frame_names, OptionalPool, RequiredPool, TieredPool, AGES, BACKGROUNDS, EYES, HATS, SCARVES,
    STYLES, SUBJECTS, SWEATERS,
};
pub use schedule::{
    drop_report, format_pmf_table, poisson_pmf, sample_label, sample_label_uniform,
    schedule_rate, simulation_pmf, weekly_pmf, DropReport, DropTable, Pmf, WeekOdds,
    POISSON_SCHEDULE, SIMULATION_WEIGHTS,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RarityError {
    #[error("unknown rarity label: {0}")]
    UnknownRarityLabel(String),
    #[error("rarity configuration error: {0}")]
    Configuration(String),
    #[error("invalid rarity distribution: {0}")]
    InvalidDistribution(String),
}
