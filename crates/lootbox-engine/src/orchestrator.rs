//! Claim orchestration: verify, sample, generate, finalize.
//!
//! Every shared file is its own `JsonStore`; a store lock is only held for a
//! single read-modify-write, never across art generation, pinning or minting.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context};
use chrono::NaiveDate;
use lootbox_contracts::description::{build_prompt, MetadataRecord};
use lootbox_contracts::events::{
    EventPayload, EventWriter, ACCOUNT_CREATED, CLAIM_COMPLETED, CLAIM_FAILED, CLAIM_ROLLED_BACK,
    CLAIM_STAGE, CLAIM_STARTED, GIFT_RECOVERED, TOKEN_TRANSFERRED,
};
use lootbox_contracts::rarity::{
    sample_attributes, sample_frame, DropTable, FrameChoice, Pmf, RarityError, RarityLabel,
    SampledAttributes,
};
use lootbox_contracts::store::{
    day_hash, zeroed_tally, Account, ClaimHistory, JsonStore, RarityTallies, Repository,
    TokenCounter, UsersRoster,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::artists::{artist_for, ArtGenerator, ArtRequest};
use crate::compositor::FrameCompositor;
use crate::config::LootboxConfig;
use crate::content::{content_store_for, ContentStore};
use crate::error::{ClaimError, ClaimResult};
use crate::ledger::{address_from_secret, Balance, Ledger, LocalLedger, TokenUri};
use crate::season::Season;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimStage {
    Verifying,
    Sampling,
    Generating,
    Finalizing,
}

impl ClaimStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Verifying => "verifying",
            Self::Sampling => "sampling",
            Self::Generating => "generating",
            Self::Finalizing => "finalizing",
        }
    }
}

/// What a claim should produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GiftRequest {
    /// Rarity and traits are drawn; the prompt is built from the traits.
    Sampled,
    /// Rarity is drawn; the player wrote the prompt.
    Custom { description: String },
    /// Admin gift with a fixed rarity and prompt.
    Exact {
        label: RarityLabel,
        description: String,
    },
}

#[derive(Debug, Clone)]
struct GiftPlan {
    label: RarityLabel,
    attributes: Option<SampledAttributes>,
    frame: FrameChoice,
    prompt: String,
    metadata: MetadataRecord,
}

#[derive(Debug, Clone)]
pub struct ClaimOutcome {
    pub claim_id: String,
    pub username: String,
    pub address: String,
    pub label: RarityLabel,
    pub attributes: Option<SampledAttributes>,
    pub frame: FrameChoice,
    pub prompt: String,
    pub revised_prompt: Option<String>,
    pub token_ids: Vec<u64>,
    pub image_cid: String,
    pub nft_cid: String,
    pub metadata_cid: String,
    pub nft_files: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub username: String,
    pub account: Account,
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OddsReport {
    pub week_offset: usize,
    pub simulation: bool,
    pub pmf: Pmf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenOwner {
    pub address: String,
    pub username: Option<String>,
}

pub fn normalize_username(raw: &str) -> String {
    raw.trim().trim_start_matches('@').to_lowercase()
}

#[derive(Debug)]
struct Stores {
    users: JsonStore<UsersRoster>,
    history: JsonStore<ClaimHistory>,
    rarities: JsonStore<RarityTallies>,
    next_id: JsonStore<TokenCounter>,
}

impl Stores {
    fn open(data_dir: &Path) -> Self {
        Self {
            users: JsonStore::new(data_dir.join("users.json")),
            history: JsonStore::new(data_dir.join("history.json")),
            rarities: JsonStore::new(data_dir.join("rarities.json")),
            next_id: JsonStore::new(data_dir.join("next_id.json")),
        }
    }
}

fn persistence(err: anyhow::Error) -> ClaimError {
    ClaimError::Persistence(err)
}

struct BatchDirs {
    img: PathBuf,
    nft: PathBuf,
    dat: PathBuf,
}

impl BatchDirs {
    fn new(out_dir: &Path, first_id: u64) -> Self {
        Self {
            img: out_dir.join(format!("xlb-{first_id}-img")),
            nft: out_dir.join(format!("xlb-{first_id}-nft")),
            dat: out_dir.join(format!("xlb-{first_id}-dat")),
        }
    }

    fn create(&self) -> anyhow::Result<()> {
        for dir in [&self.img, &self.nft, &self.dat] {
            fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

pub struct ClaimOrchestrator {
    config: LootboxConfig,
    season: Season,
    stores: Stores,
    artist: Box<dyn ArtGenerator>,
    content: Box<dyn ContentStore>,
    ledger: Box<dyn Ledger>,
    compositor: FrameCompositor,
    events: EventWriter,
    rng: Mutex<StdRng>,
}

impl ClaimOrchestrator {
    pub fn new(
        config: LootboxConfig,
        artist: Box<dyn ArtGenerator>,
        content: Box<dyn ContentStore>,
        ledger: Box<dyn Ledger>,
    ) -> Self {
        Self {
            season: Season::new(config.season),
            stores: Stores::open(&config.data_dir),
            compositor: FrameCompositor::new(&config.frame_dir),
            events: EventWriter::new(config.events_path()),
            rng: Mutex::new(StdRng::from_os_rng()),
            artist,
            content,
            ledger,
            config,
        }
    }

    /// Wires the collaborators named in `config`, with a local ledger under
    /// the data directory.
    pub fn from_config(config: LootboxConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let artist = artist_for(config.artist)?;
        let content = content_store_for(config.content_store, &config.data_dir.join("ipfs"));
        let ledger = Box::new(LocalLedger::new(config.data_dir.join("ledger.json")));
        Ok(Self::new(config, artist, content, ledger))
    }

    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    pub fn config(&self) -> &LootboxConfig {
        &self.config
    }

    pub fn season(&self) -> &Season {
        &self.season
    }

    pub fn events(&self) -> &EventWriter {
        &self.events
    }

    fn emit(&self, event_type: &str, claim_id: &str, payload: Value) {
        let payload: EventPayload = payload.as_object().cloned().unwrap_or_default();
        if let Err(err) = self.events.emit(event_type, claim_id, payload) {
            warn!(event_type, claim_id, "failed to append event: {err:#}");
        }
    }

    fn enter(&self, claim_id: &str, stage: ClaimStage) {
        debug!(claim_id, stage = stage.as_str(), "claim stage");
        self.emit(CLAIM_STAGE, claim_id, json!({ "stage": stage.as_str() }));
    }

    fn with_rng<T>(
        &self,
        draw: impl FnOnce(&mut StdRng) -> Result<T, RarityError>,
    ) -> ClaimResult<T> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| persistence(anyhow!("rng lock poisoned")))?;
        Ok(draw(&mut *rng)?)
    }

    fn is_admin(&self, username: &str) -> bool {
        normalize_username(username) == normalize_username(&self.config.admin)
    }

    pub fn account(&self, username: &str) -> ClaimResult<Account> {
        let username = normalize_username(username);
        self.stores
            .users
            .read()
            .map_err(persistence)?
            .get(&username)
            .cloned()
            .ok_or(ClaimError::NoAccount(username))
    }

    pub fn join(&self, username: &str) -> ClaimResult<JoinOutcome> {
        let username = normalize_username(username);
        let (account, created) = self
            .stores
            .users
            .update(|users| {
                if let Some(existing) = users.get(&username) {
                    return Ok((existing.clone(), false));
                }
                let secret = Uuid::new_v4().simple().to_string();
                let account = Account {
                    address: address_from_secret(&secret),
                    secret,
                };
                users.insert(username.clone(), account.clone());
                Ok((account, true))
            })
            .map_err(persistence)?;

        self.stores
            .history
            .update(|history| {
                history.entry(username.clone()).or_default();
                Ok(())
            })
            .map_err(persistence)?;
        self.stores
            .rarities
            .update(|tallies| {
                tallies.entry(username.clone()).or_insert_with(zeroed_tally);
                Ok(())
            })
            .map_err(persistence)?;

        if created {
            info!(
                username = username.as_str(),
                address = account.address.as_str(),
                "account created"
            );
            self.emit(
                ACCOUNT_CREATED,
                "",
                json!({ "username": username, "address": account.address }),
            );
        }
        Ok(JoinOutcome {
            username,
            account,
            created,
        })
    }

    pub fn claim(&self, username: &str, today: NaiveDate) -> ClaimResult<ClaimOutcome> {
        self.run_gift(username, today, GiftRequest::Sampled)
    }

    pub fn create(
        &self,
        username: &str,
        description: &str,
        today: NaiveDate,
    ) -> ClaimResult<ClaimOutcome> {
        self.run_gift(
            username,
            today,
            GiftRequest::Custom {
                description: description.to_string(),
            },
        )
    }

    pub fn power(
        &self,
        admin: &str,
        username: &str,
        label: RarityLabel,
        description: &str,
        today: NaiveDate,
    ) -> ClaimResult<ClaimOutcome> {
        if !self.is_admin(admin) {
            return Err(ClaimError::NotAuthorized(normalize_username(admin)));
        }
        self.run_gift(
            username,
            today,
            GiftRequest::Exact {
                label,
                description: description.to_string(),
            },
        )
    }

    /// Gives `username` back today's claim. Returns whether a day marker was
    /// removed.
    pub fn recover(
        &self,
        admin: &str,
        username: &str,
        label: Option<RarityLabel>,
        today: NaiveDate,
    ) -> ClaimResult<bool> {
        if !self.is_admin(admin) {
            return Err(ClaimError::NotAuthorized(normalize_username(admin)));
        }
        let username = normalize_username(username);
        self.account(&username)?;
        let removed = self.remove_day_marker(&username, today)?;
        if let Some(label) = label {
            self.adjust_tally(&username, label, -1)?;
        }
        info!(username = username.as_str(), removed, "gift recovered");
        self.emit(
            GIFT_RECOVERED,
            "",
            json!({
                "username": username,
                "removed_marker": removed,
                "label": label.map(|label| label.as_str()),
            }),
        );
        Ok(removed)
    }

    pub fn odds(&self, today: NaiveDate) -> OddsReport {
        let week_offset = self.season.week_offset(today);
        OddsReport {
            week_offset,
            simulation: self.config.simulation,
            pmf: self.drop_table(week_offset).pmf(),
        }
    }

    pub fn rares(&self) -> ClaimResult<RarityTallies> {
        self.stores.rarities.read().map_err(persistence)
    }

    pub fn history(&self) -> ClaimResult<ClaimHistory> {
        self.stores.history.read().map_err(persistence)
    }

    pub fn balance(&self, username: &str) -> ClaimResult<(Account, Balance)> {
        let account = self.account(username)?;
        let balance = self
            .ledger
            .balance_of(&account.address)
            .map_err(persistence)?;
        Ok((account, balance))
    }

    pub fn owner_of(&self, token_id: u64) -> ClaimResult<Option<TokenOwner>> {
        let Some(address) = self.ledger.owner_of(token_id).map_err(persistence)? else {
            return Ok(None);
        };
        let username = self
            .stores
            .users
            .read()
            .map_err(persistence)?
            .iter()
            .find(|(_, account)| account.address == address)
            .map(|(username, _)| username.clone());
        Ok(Some(TokenOwner { address, username }))
    }

    pub fn transfer(&self, from_user: &str, to_user: &str, token_id: u64) -> ClaimResult<()> {
        let from = self.account(from_user)?;
        let to = self.account(to_user)?;
        self.ledger
            .transfer(&from.address, &from.secret, &to.address, token_id)
            .map_err(ClaimError::TransferFailure)?;
        info!(token_id, from = from.address.as_str(), to = to.address.as_str(), "token transferred");
        self.emit(
            TOKEN_TRANSFERRED,
            "",
            json!({
                "token_id": token_id,
                "from": normalize_username(from_user),
                "to": normalize_username(to_user),
            }),
        );
        Ok(())
    }

    fn drop_table(&self, week_offset: usize) -> DropTable {
        if self.config.simulation {
            DropTable::Simulation
        } else {
            DropTable::Weekly(week_offset)
        }
    }

    fn run_gift(
        &self,
        username: &str,
        today: NaiveDate,
        request: GiftRequest,
    ) -> ClaimResult<ClaimOutcome> {
        let username = normalize_username(username);
        let claim_id = Uuid::new_v4().to_string();
        info!(
            claim_id = claim_id.as_str(),
            username = username.as_str(),
            "claim started"
        );
        self.emit(
            CLAIM_STARTED,
            &claim_id,
            json!({ "username": username, "day": today.to_string() }),
        );

        let result = self.run_stages(&claim_id, &username, today, &request);
        match &result {
            Ok(outcome) => {
                info!(
                    claim_id = claim_id.as_str(),
                    username = username.as_str(),
                    label = outcome.label.as_str(),
                    first_id = outcome.token_ids.first().copied(),
                    "claim completed"
                );
                self.emit(
                    CLAIM_COMPLETED,
                    &claim_id,
                    json!({
                        "username": username,
                        "label": outcome.label.as_str(),
                        "frame": outcome.frame.to_string(),
                        "token_ids": outcome.token_ids,
                        "nft_cid": outcome.nft_cid,
                        "metadata_cid": outcome.metadata_cid,
                    }),
                );
            }
            Err(err) => {
                if err.is_user_facing() {
                    info!(claim_id = claim_id.as_str(), username = username.as_str(), "claim refused: {err}");
                } else {
                    error!(claim_id = claim_id.as_str(), username = username.as_str(), "claim failed: {err}");
                }
                self.emit(
                    CLAIM_FAILED,
                    &claim_id,
                    json!({
                        "username": username,
                        "reason": err.kind(),
                        "message": err.to_string(),
                    }),
                );
            }
        }
        result
    }

    fn run_stages(
        &self,
        claim_id: &str,
        username: &str,
        today: NaiveDate,
        request: &GiftRequest,
    ) -> ClaimResult<ClaimOutcome> {
        self.enter(claim_id, ClaimStage::Verifying);
        let week_offset = self.season.check_open(today)?;
        let account = self.account(username)?;
        let marker_recorded = self.record_day_marker(username, today)?;

        self.enter(claim_id, ClaimStage::Sampling);
        let label = match self.draw_label(request, week_offset) {
            Ok(label) => label,
            Err(err) => {
                self.rollback(claim_id, username, today, marker_recorded, None);
                return Err(err);
            }
        };
        if let Err(err) = self.adjust_tally(username, label, 1) {
            self.rollback(claim_id, username, today, marker_recorded, None);
            return Err(err);
        }
        let plan = match self.plan_gift(label, request) {
            Ok(plan) => plan,
            Err(err) => {
                self.rollback(claim_id, username, today, marker_recorded, Some(label));
                return Err(err);
            }
        };
        debug!(claim_id, prompt = plan.prompt.as_str(), frame = %plan.frame, "gift sampled");

        self.enter(claim_id, ClaimStage::Generating);
        let staging = self.config.out_dir.join(format!("claim-{claim_id}"));
        let art = self
            .artist
            .generate(&ArtRequest {
                prompt: plan.prompt.clone(),
                count: self.config.batch_size,
                out_dir: staging.clone(),
                stem: "art".to_string(),
                size: self.config.art_size,
                model: self.config.image_model.clone(),
            })
            .and_then(|art| {
                if art.images.len() as u64 != self.config.batch_size {
                    return Err(anyhow!(
                        "{} returned {} images, expected {}",
                        self.artist.name(),
                        art.images.len(),
                        self.config.batch_size
                    ));
                }
                Ok(art)
            });
        let art = match art {
            Ok(art) => art,
            Err(err) => {
                remove_staging(&staging);
                self.rollback(claim_id, username, today, marker_recorded, Some(label));
                return Err(ClaimError::GenerationFailure(err));
            }
        };

        self.enter(claim_id, ClaimStage::Finalizing);
        let outcome = self.finalize(claim_id, username, &account, plan, art.images, &staging);
        remove_staging(&staging);
        let mut outcome = outcome?;
        outcome.revised_prompt = art.revised_prompt;
        Ok(outcome)
    }

    fn draw_label(&self, request: &GiftRequest, week_offset: usize) -> ClaimResult<RarityLabel> {
        match request {
            GiftRequest::Exact { label, .. } => Ok(*label),
            GiftRequest::Sampled | GiftRequest::Custom { .. } => {
                let table = self.drop_table(week_offset);
                self.with_rng(|rng| table.sample(rng))
            }
        }
    }

    fn plan_gift(&self, label: RarityLabel, request: &GiftRequest) -> ClaimResult<GiftPlan> {
        let frame = self.with_rng(|rng| sample_frame(label, rng))?;
        match request {
            GiftRequest::Sampled => {
                let attributes = self.with_rng(|rng| sample_attributes(label, rng))?;
                let prompt = build_prompt(&attributes);
                let metadata = MetadataRecord::build(&attributes, &prompt);
                Ok(GiftPlan {
                    label,
                    attributes: Some(attributes),
                    frame,
                    prompt,
                    metadata,
                })
            }
            GiftRequest::Custom { description } | GiftRequest::Exact { description, .. } => {
                Ok(GiftPlan {
                    label,
                    attributes: None,
                    frame,
                    prompt: description.clone(),
                    metadata: MetadataRecord::custom(label, description),
                })
            }
        }
    }

    fn finalize(
        &self,
        claim_id: &str,
        username: &str,
        account: &Account,
        plan: GiftPlan,
        images: Vec<PathBuf>,
        staging: &Path,
    ) -> ClaimResult<ClaimOutcome> {
        let batch = images.len() as u64;
        let first_id = self
            .stores
            .next_id
            .update(|counter| Ok(counter.reserve(batch)))
            .map_err(persistence)?;
        let token_ids: Vec<u64> = (first_id..first_id + batch).collect();
        debug!(claim_id, first_id, batch, "token ids reserved");

        let dirs = BatchDirs::new(&self.config.out_dir, first_id);
        dirs.create().map_err(ClaimError::ContentStoreFailure)?;

        let mut img_files = Vec::with_capacity(images.len());
        let mut nft_files = Vec::with_capacity(images.len());
        for (token_id, source) in token_ids.iter().zip(&images) {
            let img = dirs.img.join(format!("{token_id}.png"));
            fs::rename(source, &img)
                .or_else(|_| fs::copy(source, &img).map(|_| ()))
                .with_context(|| {
                    format!("failed to move {} out of {}", source.display(), staging.display())
                })
                .map_err(ClaimError::ContentStoreFailure)?;
            let nft = dirs.nft.join(format!("{token_id}.gif"));
            self.compositor
                .apply_frame(&img, plan.frame, &nft)
                .map_err(ClaimError::ContentStoreFailure)?;
            img_files.push(img);
            nft_files.push(nft);
        }

        let image_cid = self
            .content
            .pin(&img_files)
            .map_err(ClaimError::ContentStoreFailure)?;
        let nft_cid = self
            .content
            .pin(&nft_files)
            .map_err(ClaimError::ContentStoreFailure)?;

        let mut dat_files = Vec::with_capacity(token_ids.len());
        for token_id in &token_ids {
            let image_uri = self.content.uri(&nft_cid, &format!("{token_id}.gif"));
            let path = dirs.dat.join(format!("{token_id}.json"));
            plan.metadata
                .instantiate(*token_id, &image_uri)
                .write(&path)
                .map_err(ClaimError::ContentStoreFailure)?;
            dat_files.push(path);
        }
        let metadata_cid = self
            .content
            .pin(&dat_files)
            .map_err(ClaimError::ContentStoreFailure)?;

        let tokens: Vec<TokenUri> = token_ids
            .iter()
            .map(|token_id| TokenUri {
                token_id: *token_id,
                uri: self.content.uri(&metadata_cid, &format!("{token_id}.json")),
            })
            .collect();
        self.ledger
            .mint(&account.address, &tokens)
            .map_err(ClaimError::MintFailure)?;

        Ok(ClaimOutcome {
            claim_id: claim_id.to_string(),
            username: username.to_string(),
            address: account.address.clone(),
            label: plan.label,
            attributes: plan.attributes,
            frame: plan.frame,
            prompt: plan.prompt,
            revised_prompt: None,
            token_ids,
            image_cid,
            nft_cid,
            metadata_cid,
            nft_files,
        })
    }

    /// Appends today's marker. Simulation mode checks without recording.
    fn record_day_marker(&self, username: &str, today: NaiveDate) -> ClaimResult<bool> {
        let marker = day_hash(today);
        let record = !self.config.simulation;
        let claimed_before = self
            .stores
            .history
            .update(|history| {
                let days = history.entry(username.to_string()).or_default();
                if days.contains(&marker) {
                    return Ok(true);
                }
                if record {
                    days.push(marker.clone());
                }
                Ok(false)
            })
            .map_err(persistence)?;
        if claimed_before {
            return Err(ClaimError::AlreadyClaimedToday(username.to_string()));
        }
        Ok(record)
    }

    fn remove_day_marker(&self, username: &str, today: NaiveDate) -> ClaimResult<bool> {
        let marker = day_hash(today);
        self.stores
            .history
            .update(|history| {
                let Some(days) = history.get_mut(username) else {
                    return Ok(false);
                };
                let before = days.len();
                days.retain(|day| *day != marker);
                Ok(days.len() != before)
            })
            .map_err(persistence)
    }

    fn adjust_tally(&self, username: &str, label: RarityLabel, delta: i64) -> ClaimResult<()> {
        self.stores
            .rarities
            .update(|tallies| {
                let tally = tallies
                    .entry(username.to_string())
                    .or_insert_with(zeroed_tally);
                let count = tally.entry(label).or_insert(0);
                *count = count.saturating_add_signed(delta);
                Ok(())
            })
            .map_err(persistence)
    }

    /// Undoes the verification side effects of a claim that will not finish.
    fn rollback(
        &self,
        claim_id: &str,
        username: &str,
        today: NaiveDate,
        marker_recorded: bool,
        tallied: Option<RarityLabel>,
    ) {
        if marker_recorded {
            if let Err(err) = self.remove_day_marker(username, today) {
                error!(claim_id, username, "failed to roll back day marker: {err}");
            }
        }
        if let Some(label) = tallied {
            if let Err(err) = self.adjust_tally(username, label, -1) {
                error!(claim_id, username, "failed to roll back rarity tally: {err}");
            }
        }
        warn!(claim_id, username, "claim rolled back");
        self.emit(
            CLAIM_ROLLED_BACK,
            claim_id,
            json!({
                "username": username,
                "marker_removed": marker_recorded,
                "tally_label": tallied.map(|label| label.as_str()),
            }),
        );
    }
}

fn remove_staging(staging: &Path) {
    if staging.exists() {
        if let Err(err) = fs::remove_dir_all(staging) {
            warn!(path = %staging.display(), "failed to remove staging dir: {err}");
        }
    }
}

/// Draws a fresh seed for callers that want reproducible runs logged.
pub fn random_seed() -> u64 {
    rand::rng().random()
}
