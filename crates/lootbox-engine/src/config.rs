use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::artists::DEFAULT_ART_SIZE;

pub const DEFAULT_SEASON_YEAR: i32 = 2022;
pub const DEFAULT_START_WEEK: u32 = 48;
pub const DEFAULT_END_WEEK: u32 = 52;
pub const DEFAULT_BATCH_SIZE: u64 = 4;
pub const DEFAULT_ADMIN: &str = "bayesbrew";
pub const DEFAULT_IMAGE_MODEL: &str = "dall-e-2";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonConfig {
    pub year: i32,
    /// First ISO week of the event.
    pub start_week: u32,
    /// Last ISO week of the event, inclusive.
    pub end_week: u32,
}

impl Default for SeasonConfig {
    fn default() -> Self {
        Self {
            year: DEFAULT_SEASON_YEAR,
            start_week: DEFAULT_START_WEEK,
            end_week: DEFAULT_END_WEEK,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArtistKind {
    #[default]
    Dryrun,
    OpenAi,
}

impl ArtistKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dryrun => "dryrun",
            Self::OpenAi => "openai",
        }
    }
}

impl FromStr for ArtistKind {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dryrun" => Ok(Self::Dryrun),
            "openai" => Ok(Self::OpenAi),
            other => bail!("unknown artist: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentStoreKind {
    #[default]
    Local,
    Pinata,
}

impl FromStr for ContentStoreKind {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "pinata" => Ok(Self::Pinata),
            other => bail!("unknown content store: {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LootboxConfig {
    pub data_dir: PathBuf,
    pub frame_dir: PathBuf,
    pub out_dir: PathBuf,
    pub season: SeasonConfig,
    pub batch_size: u64,
    /// Edge length in pixels of each generated image.
    pub art_size: u32,
    pub simulation: bool,
    pub admin: String,
    pub artist: ArtistKind,
    pub content_store: ContentStoreKind,
    pub image_model: String,
}

impl Default for LootboxConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            frame_dir: PathBuf::from("assets/frames"),
            out_dir: PathBuf::from("nfts"),
            season: SeasonConfig::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            art_size: DEFAULT_ART_SIZE,
            simulation: false,
            admin: DEFAULT_ADMIN.to_string(),
            artist: ArtistKind::default(),
            content_store: ContentStoreKind::default(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }
}

impl LootboxConfig {
    /// Defaults overlaid with `LOOTBOX_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(non_empty_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(dir) = lookup("LOOTBOX_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("LOOTBOX_FRAME_DIR") {
            config.frame_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("LOOTBOX_OUT_DIR") {
            config.out_dir = PathBuf::from(dir);
        }
        if let Some(flag) = lookup("LOOTBOX_SIM") {
            config.simulation = parse_flag(&flag);
        }
        if let Some(admin) = lookup("LOOTBOX_ADMIN") {
            config.admin = admin;
        }
        if let Some(year) = lookup("LOOTBOX_SEASON_YEAR") {
            config.season.year = year
                .parse()
                .with_context(|| format!("LOOTBOX_SEASON_YEAR is not a year: {year}"))?;
        }
        if let Some(week) = lookup("LOOTBOX_START_WEEK") {
            config.season.start_week = parse_week("LOOTBOX_START_WEEK", &week)?;
        }
        if let Some(week) = lookup("LOOTBOX_END_WEEK") {
            config.season.end_week = parse_week("LOOTBOX_END_WEEK", &week)?;
        }
        if let Some(artist) = lookup("LOOTBOX_ARTIST") {
            config.artist = artist.parse()?;
        }
        if let Some(store) = lookup("LOOTBOX_CONTENT_STORE") {
            config.content_store = store.parse()?;
        }
        if let Some(size) = lookup("LOOTBOX_ART_SIZE") {
            config.art_size = size
                .parse()
                .with_context(|| format!("LOOTBOX_ART_SIZE is not a pixel size: {size}"))?;
        }
        if let Some(model) = lookup("LOOTBOX_IMAGE_MODEL") {
            config.image_model = model;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.season.start_week > self.season.end_week {
            bail!(
                "season starts in week {} but ends in week {}",
                self.season.start_week,
                self.season.end_week
            );
        }
        if self.batch_size == 0 {
            bail!("batch size must be positive");
        }
        if self.art_size == 0 {
            bail!("art size must be positive");
        }
        Ok(())
    }

    pub fn events_path(&self) -> PathBuf {
        self.data_dir.join("events.jsonl")
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_week(key: &str, raw: &str) -> Result<u32> {
    let week: u32 = raw
        .parse()
        .with_context(|| format!("{key} is not a week number: {raw}"))?;
    if !(1..=53).contains(&week) {
        bail!("{key} out of range: {week}");
    }
    Ok(week)
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
