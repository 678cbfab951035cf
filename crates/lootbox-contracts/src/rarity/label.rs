use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::RarityError;

pub const LABEL_COUNT: usize = 7;

/// Rarity tiers, lowest to highest. The discriminant is the tier level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RarityLabel {
    #[serde(rename = "common")]
    Common = 0,
    #[serde(rename = "uncommon")]
    Uncommon = 1,
    #[serde(rename = "rare")]
    Rare = 2,
    #[serde(rename = "legendary")]
    Legendary = 3,
    #[serde(rename = "mythical")]
    Mythical = 4,
    #[serde(rename = "n-f-tacular")]
    NFTacular = 5,
    #[serde(rename = "christmas-miracle")]
    ChristmasMiracle = 6,
}

const ALL_LABELS: [RarityLabel; LABEL_COUNT] = [
    RarityLabel::Common,
    RarityLabel::Uncommon,
    RarityLabel::Rare,
    RarityLabel::Legendary,
    RarityLabel::Mythical,
    RarityLabel::NFTacular,
    RarityLabel::ChristmasMiracle,
];

pub fn labels() -> [RarityLabel; LABEL_COUNT] {
    ALL_LABELS
}

pub fn level_of(label: &str) -> Result<usize, RarityError> {
    label.parse::<RarityLabel>().map(RarityLabel::level)
}

pub fn label_of(level: usize) -> Result<RarityLabel, RarityError> {
    RarityLabel::from_level(level)
}

impl RarityLabel {
    pub fn level(self) -> usize {
        self as usize
    }

    pub fn from_level(level: usize) -> Result<Self, RarityError> {
        ALL_LABELS
            .get(level)
            .copied()
            .ok_or_else(|| RarityError::UnknownRarityLabel(format!("level {level}")))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Uncommon => "uncommon",
            Self::Rare => "rare",
            Self::Legendary => "legendary",
            Self::Mythical => "mythical",
            Self::NFTacular => "n-f-tacular",
            Self::ChristmasMiracle => "christmas-miracle",
        }
    }

    /// Embed color as 0xRRGGBB.
    pub fn color(self) -> u32 {
        match self {
            Self::Common => 0x9d9d9d,
            Self::Uncommon => 0x1eff00,
            Self::Rare => 0x0070dd,
            Self::Legendary => 0xa335ee,
            Self::Mythical => 0xff8000,
            Self::NFTacular => 0xe6cc80,
            Self::ChristmasMiracle => 0xff0000,
        }
    }
}

impl fmt::Display for RarityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RarityLabel {
    type Err = RarityError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw
            .trim()
            .to_ascii_lowercase()
            .split(|ch: char| ch.is_whitespace() || ch == '_' || ch == '-')
            .filter(|part| !part.is_empty())
            .collect::<Vec<&str>>()
            .join("-");
        ALL_LABELS
            .iter()
            .copied()
            .find(|label| label.as_str() == normalized)
            .ok_or_else(|| RarityError::UnknownRarityLabel(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_and_labels_are_bijective() {
        for (idx, label) in labels().into_iter().enumerate() {
            assert_eq!(label.level(), idx);
            assert_eq!(label_of(idx).ok(), Some(label));
            assert_eq!(level_of(label.as_str()).ok(), Some(idx));
        }
        assert!(label_of(LABEL_COUNT).is_err());
    }

    #[test]
    fn parsing_is_case_insensitive() {
        assert_eq!(level_of("LEGENDARY").ok(), Some(3));
        assert_eq!(level_of("N-F-Tacular").ok(), Some(5));
        assert_eq!(
            "Christmas Miracle".parse::<RarityLabel>().ok(),
            Some(RarityLabel::ChristmasMiracle)
        );
        assert_eq!(
            "christmas_miracle".parse::<RarityLabel>().ok(),
            Some(RarityLabel::ChristmasMiracle)
        );
    }

    #[test]
    fn unknown_label_is_rejected() {
        let err = level_of("epic").err();
        assert_eq!(err, Some(RarityError::UnknownRarityLabel("epic".to_string())));
    }

    #[test]
    fn serde_uses_kebab_names() -> anyhow::Result<()> {
        assert_eq!(
            serde_json::to_string(&RarityLabel::NFTacular)?,
            "\"n-f-tacular\""
        );
        let parsed: RarityLabel = serde_json::from_str("\"christmas-miracle\"")?;
        assert_eq!(parsed, RarityLabel::ChristmasMiracle);
        Ok(())
    }

    #[test]
    fn colors_are_distinct_rgb() {
        let colors: Vec<u32> = labels().into_iter().map(RarityLabel::color).collect();
        for (idx, color) in colors.iter().enumerate() {
            assert!(*color <= 0xff_ffff);
            assert!(!colors[idx + 1..].contains(color));
        }
        assert_eq!(format!("#{:06x}", RarityLabel::Rare.color()), "#0070dd");
    }
}
