use super::label::{RarityLabel, LABEL_COUNT};
use super::RarityError;

/// Candidate list for one trait. Level `n` sees the first `unlocked[n]` options,
/// so every tier's pool is a prefix of the next tier's.
#[derive(Debug, Clone, Copy)]
pub struct TieredPool<T: 'static> {
    pub trait_name: &'static str,
    options: &'static [T],
    unlocked: [usize; LABEL_COUNT],
}

impl<T: 'static> TieredPool<T> {
    pub const fn new(
        trait_name: &'static str,
        options: &'static [T],
        unlocked: [usize; LABEL_COUNT],
    ) -> Self {
        Self {
            trait_name,
            options,
            unlocked,
        }
    }

    pub const fn flat(trait_name: &'static str, options: &'static [T]) -> Self {
        let len = options.len();
        Self::new(trait_name, options, [len; LABEL_COUNT])
    }

    pub fn candidates(&self, label: RarityLabel) -> Result<&'static [T], RarityError> {
        let len = self.unlocked[label.level()];
        let Some(candidates) = self.options.get(..len) else {
            return Err(RarityError::Configuration(format!(
                "{} pool unlocks {len} options at {label} but only {} exist",
                self.trait_name,
                self.options.len()
            )));
        };
        if candidates.is_empty() {
            return Err(RarityError::Configuration(format!(
                "{} pool is empty at {label}",
                self.trait_name
            )));
        }
        Ok(candidates)
    }
}

pub type RequiredPool = TieredPool<&'static str>;
pub type OptionalPool = TieredPool<Option<&'static str>>;

pub const AGES: OptionalPool =
    TieredPool::flat("age", &[None, Some("baby"), Some("young"), Some("old")]);

pub const SUBJECTS: RequiredPool = TieredPool::new(
    "subject",
    &[
        "cat",
        "dog",
        "monkey",
        "panda",
        "owl",
        "lion",
        "baby",
        "robot",
        "dragon",
        "reindeer",
        "santa claus",
    ],
    [5, 5, 5, 5, 8, 8, 11],
);

pub const EYES: RequiredPool = TieredPool::new(
    "eyes",
    &[
        "white",
        "black",
        "blue",
        "brown",
        "green",
        "purple",
        "neon",
        "rgb",
        "rainbow",
        "fire",
        "sunglasses",
        "laser beam",
        "peppermint",
    ],
    [4, 4, 4, 4, 7, 11, 13],
);

pub const HATS: OptionalPool = TieredPool::new(
    "hat",
    &[
        None,
        Some("winter hat"),
        Some("nightcap"),
        Some("beanie"),
        Some("robot head"),
        Some("santa hat"),
        Some("party hat"),
    ],
    [2, 2, 2, 2, 2, 4, 7],
);

pub const SCARVES: OptionalPool = TieredPool::new(
    "scarf",
    &[
        None,
        Some("white"),
        Some("black"),
        Some("blue"),
        Some("brown"),
        Some("green"),
        Some("purple"),
        Some("neon"),
        Some("rgb"),
        Some("rainbow"),
        Some("fire"),
        Some("peppermint"),
    ],
    [5, 5, 5, 5, 8, 11, 12],
);

pub const SWEATERS: OptionalPool = TieredPool::new(
    "sweater",
    &[
        None,
        Some("red"),
        Some("green"),
        Some("white"),
        Some("striped"),
        Some("ugly christmas"),
        Some("reindeer"),
        Some("snowflake"),
        Some("light-up"),
        Some("golden"),
        Some("candy cane"),
    ],
    [5, 5, 5, 5, 8, 10, 11],
);

pub const BACKGROUNDS: RequiredPool = TieredPool::flat(
    "background",
    &[
        "snowy",
        "icey",
        "space",
        "fireplace",
        "christmas tree",
        "north pole",
    ],
);

pub const STYLES: RequiredPool =
    TieredPool::flat("style", &["realistic", "toon", "meme", "NFT"]);

/// Overlay assets per tier; `None` means no frame.
pub fn frame_names(label: RarityLabel) -> &'static [Option<&'static str>] {
    match label {
        RarityLabel::Common => &[None],
        RarityLabel::Uncommon => &[Some("portal_blue"), Some("portal_orange")],
        RarityLabel::Rare => &[Some("darkage_red"), Some("darkage_blue")],
        RarityLabel::Legendary => &[Some("darkage_rgb"), Some("glitch_unstable")],
        RarityLabel::Mythical => &[
            Some("glitch_neon"),
            Some("neon_frame"),
            Some("glitch_wave"),
        ],
        RarityLabel::NFTacular => &[
            Some("speedlines"),
            Some("rain_of_gold"),
            Some("cat_crime_graffiti"),
        ],
        RarityLabel::ChristmasMiracle => &[Some("christmas_lights")],
    }
}
