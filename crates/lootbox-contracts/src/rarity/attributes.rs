use std::fmt;

use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::label::RarityLabel;
use super::pools::{
    frame_names, OptionalPool, RequiredPool, AGES, BACKGROUNDS, EYES, HATS, SCARVES, STYLES,
    SUBJECTS, SWEATERS,
};
use super::RarityError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampledAttributes {
    pub rarity: RarityLabel,
    pub age: Option<String>,
    pub subject: String,
    pub eyes: String,
    pub hat: Option<String>,
    pub scarf: Option<String>,
    pub sweater: Option<String>,
    pub background: String,
    pub style: String,
}

impl SampledAttributes {
    /// Traits in metadata order; `None` marks an absent optional trait.
    pub fn traits(&self) -> Vec<(&'static str, Option<&str>)> {
        vec![
            ("rarity", Some(self.rarity.as_str())),
            ("age", self.age.as_deref()),
            ("subject", Some(self.subject.as_str())),
            ("eyes", Some(self.eyes.as_str())),
            ("hat", self.hat.as_deref()),
            ("scarf", self.scarf.as_deref()),
            ("sweater", self.sweater.as_deref()),
            ("background", Some(self.background.as_str())),
            ("style", Some(self.style.as_str())),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameChoice {
    None,
    Named(&'static str),
}

impl FrameChoice {
    pub fn name(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Named(name) => Some(name),
        }
    }
}

impl fmt::Display for FrameChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name().unwrap_or("none"))
    }
}

fn draw_required<R: Rng + ?Sized>(
    pool: &RequiredPool,
    label: RarityLabel,
    rng: &mut R,
) -> Result<String, RarityError> {
    pool.candidates(label)?
        .choose(rng)
        .map(|value| (*value).to_string())
        .ok_or_else(|| RarityError::Configuration(format!("{} pool is empty", pool.trait_name)))
}

fn draw_optional<R: Rng + ?Sized>(
    pool: &OptionalPool,
    label: RarityLabel,
    rng: &mut R,
) -> Result<Option<String>, RarityError> {
    pool.candidates(label)?
        .choose(rng)
        .map(|value| value.map(str::to_string))
        .ok_or_else(|| RarityError::Configuration(format!("{} pool is empty", pool.trait_name)))
}

/// Independent uniform draw per trait from the pools unlocked at `label`.
pub fn sample_attributes<R: Rng + ?Sized>(
    label: RarityLabel,
    rng: &mut R,
) -> Result<SampledAttributes, RarityError> {
    Ok(SampledAttributes {
        rarity: label,
        age: draw_optional(&AGES, label, rng)?,
        subject: draw_required(&SUBJECTS, label, rng)?,
        eyes: draw_required(&EYES, label, rng)?,
        hat: draw_optional(&HATS, label, rng)?,
        scarf: draw_optional(&SCARVES, label, rng)?,
        sweater: draw_optional(&SWEATERS, label, rng)?,
        background: draw_required(&BACKGROUNDS, label, rng)?,
        style: draw_required(&STYLES, label, rng)?,
    })
}

pub fn sample_frame<R: Rng + ?Sized>(
    label: RarityLabel,
    rng: &mut R,
) -> Result<FrameChoice, RarityError> {
    let frames = frame_names(label);
    let Some(choice) = frames.choose(rng) else {
        return Err(RarityError::Configuration(format!(
            "no frames registered for {label}"
        )));
    };
    Ok(match *choice {
        Some(name) => FrameChoice::Named(name),
        None => FrameChoice::None,
    })
}
