use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use image::codecs::gif::GifEncoder;
use image::{Delay, Frame, Rgba, RgbaImage};
use lootbox_contracts::rarity::{frame_names, labels, simulation_pmf, RarityLabel};
use lootbox_engine::artists::{ArtGenerator, ArtRequest, ArtResponse, DryrunArtist};
use lootbox_engine::content::LocalContentStore;
use lootbox_engine::ledger::{address_from_secret, LocalLedger};
use lootbox_engine::{ClaimError, ClaimOrchestrator, LootboxConfig};
use serde_json::Value;
use tempfile::TempDir;

struct BrokenArtist;

impl ArtGenerator for BrokenArtist {
    fn name(&self) -> &str {
        "broken"
    }

    fn generate(&self, request: &ArtRequest) -> Result<ArtResponse> {
        fs::create_dir_all(&request.out_dir)?;
        fs::write(request.out_dir.join("partial.png"), b"not an image")?;
        bail!("the paint dried up")
    }
}

fn day(year: i32, month: u32, date: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, date).unwrap_or_default()
}

fn write_frame_assets(frame_dir: &Path) -> Result<()> {
    fs::create_dir_all(frame_dir)?;
    for label in labels() {
        for name in frame_names(label).iter().flatten() {
            let frames: Vec<Frame> = (0..2u8)
                .map(|idx| {
                    let mut buffer = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0]));
                    buffer.put_pixel(0, 0, Rgba([255, 60 * idx, 0, 255]));
                    Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(10, 1))
                })
                .collect();
            let writer = BufWriter::new(File::create(frame_dir.join(format!("{name}.gif")))?);
            GifEncoder::new(writer).encode_frames(frames)?;
        }
    }
    Ok(())
}

fn config_in(root: &Path) -> LootboxConfig {
    LootboxConfig {
        data_dir: root.join("data"),
        frame_dir: root.join("frames"),
        out_dir: root.join("nfts"),
        art_size: 8,
        ..LootboxConfig::default()
    }
}

fn orchestrator(
    root: &Path,
    config: LootboxConfig,
    artist: Box<dyn ArtGenerator>,
) -> ClaimOrchestrator {
    ClaimOrchestrator::new(
        config,
        artist,
        Box::new(LocalContentStore::new(root.join("ipfs"))),
        Box::new(LocalLedger::new(root.join("data").join("ledger.json"))),
    )
    .with_seed(2022)
}

fn setup() -> Result<(TempDir, ClaimOrchestrator)> {
    let temp = tempfile::tempdir()?;
    write_frame_assets(&temp.path().join("frames"))?;
    let bot = orchestrator(temp.path(), config_in(temp.path()), Box::new(DryrunArtist));
    Ok((temp, bot))
}

fn event_types(bot: &ClaimOrchestrator) -> Result<Vec<String>> {
    Ok(bot
        .events()
        .read_all()?
        .iter()
        .filter_map(|event| event.get("type").and_then(Value::as_str))
        .map(str::to_string)
        .collect())
}

#[test]
fn claim_mints_a_batch_and_pins_everything() -> Result<()> {
    let (temp, bot) = setup()?;
    let joined = bot.join("@Rudolph")?;
    assert!(joined.created);
    assert_eq!(joined.username, "rudolph");

    let outcome = bot.claim("rudolph", day(2022, 12, 5))?;
    assert_eq!(outcome.token_ids, vec![0, 1, 2, 3]);
    assert_eq!(outcome.address, joined.account.address);
    assert_eq!(outcome.nft_files.len(), 4);
    assert!(outcome.attributes.is_some());
    assert!(outcome.prompt.contains(" background, drawn in "));

    let store = LocalContentStore::new(temp.path().join("ipfs"));
    let metadata: Value =
        serde_json::from_str(&fs::read_to_string(store.resolve(&outcome.metadata_cid, "2.json"))?)?;
    assert_eq!(metadata["name"], "Advent Gift #2");
    assert_eq!(
        metadata["image"],
        format!("ipfs://{}/2.gif", outcome.nft_cid).as_str()
    );
    assert!(store.resolve(&outcome.nft_cid, "3.gif").exists());
    assert!(store.resolve(&outcome.image_cid, "0.png").exists());
    assert!(temp.path().join("nfts").join("xlb-0-dat").join("0.json").exists());

    let owner = bot.owner_of(3)?.map(|owner| owner.username);
    assert_eq!(owner, Some(Some("rudolph".to_string())));
    assert_eq!(bot.balance("rudolph")?.1.tokens, 4);

    let tallies = bot.rares()?;
    assert_eq!(tallies["rudolph"][&outcome.label], 1);
    assert_eq!(tallies["rudolph"].values().sum::<u64>(), 1);

    let types = event_types(&bot)?;
    assert_eq!(types.first().map(String::as_str), Some("account_created"));
    assert_eq!(types.iter().filter(|kind| *kind == "claim_stage").count(), 4);
    assert_eq!(types.last().map(String::as_str), Some("claim_completed"));
    Ok(())
}

#[test]
fn second_claim_on_the_same_day_is_refused() -> Result<()> {
    let (_temp, bot) = setup()?;
    bot.join("dasher")?;

    bot.claim("dasher", day(2022, 12, 5))?;
    let again = bot.claim("Dasher", day(2022, 12, 5));
    assert!(matches!(again, Err(ClaimError::AlreadyClaimedToday(ref user)) if user == "dasher"));
    assert_eq!(bot.history()?["dasher"].len(), 1);
    assert_eq!(bot.rares()?["dasher"].values().sum::<u64>(), 1);

    let tomorrow = bot.claim("dasher", day(2022, 12, 6))?;
    assert_eq!(tomorrow.token_ids, vec![4, 5, 6, 7]);
    assert_eq!(bot.history()?["dasher"].len(), 2);
    Ok(())
}

#[test]
fn failed_generation_rolls_back_and_burns_no_ids() -> Result<()> {
    let temp = tempfile::tempdir()?;
    write_frame_assets(&temp.path().join("frames"))?;
    let broken = orchestrator(temp.path(), config_in(temp.path()), Box::new(BrokenArtist));
    broken.join("prancer")?;

    let result = broken.claim("prancer", day(2022, 12, 12));
    assert!(matches!(result, Err(ClaimError::GenerationFailure(_))));
    assert!(broken.history()?["prancer"].is_empty());
    assert_eq!(broken.rares()?["prancer"].values().sum::<u64>(), 0);
    let types = event_types(&broken)?;
    assert!(types.contains(&"claim_rolled_back".to_string()));
    assert_eq!(types.last().map(String::as_str), Some("claim_failed"));

    let staging: Vec<_> = fs::read_dir(temp.path().join("nfts"))
        .map(|entries| entries.flatten().collect())
        .unwrap_or_default();
    assert!(staging.is_empty());

    let working = orchestrator(temp.path(), config_in(temp.path()), Box::new(DryrunArtist));
    let outcome = working.claim("prancer", day(2022, 12, 12))?;
    assert_eq!(outcome.token_ids, vec![0, 1, 2, 3]);
    Ok(())
}

#[test]
fn concurrent_claims_get_disjoint_ids() -> Result<()> {
    let (_temp, bot) = setup()?;
    let users = ["comet", "cupid", "donner", "blitzen"];
    for user in users {
        bot.join(user)?;
    }

    let bot = &bot;
    let outcomes = std::thread::scope(|scope| {
        let handles: Vec<_> = users
            .into_iter()
            .map(|user| scope.spawn(move || bot.claim(user, day(2022, 12, 19))))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().map_err(|_| anyhow::anyhow!("claim thread panicked")))
            .collect::<Result<Vec<_>>>()
    })?;

    let mut ids = BTreeSet::new();
    for outcome in outcomes {
        let outcome = outcome?;
        assert_eq!(outcome.token_ids.len(), 4);
        for id in outcome.token_ids {
            assert!(ids.insert(id), "token {id} minted twice");
        }
    }
    assert_eq!(ids, (0..16).collect::<BTreeSet<u64>>());
    let history = bot.history()?;
    assert!(users.iter().all(|user| history[*user].len() == 1));
    Ok(())
}

#[test]
fn claims_outside_the_season_are_refused() -> Result<()> {
    let (_temp, bot) = setup()?;
    bot.join("vixen")?;
    assert!(matches!(
        bot.claim("vixen", day(2022, 11, 20)),
        Err(ClaimError::EventNotStarted)
    ));
    assert!(matches!(
        bot.claim("vixen", day(2022, 12, 27)),
        Err(ClaimError::EventEnded)
    ));
    assert!(matches!(
        bot.claim("vixen", day(2023, 12, 5)),
        Err(ClaimError::EventEnded)
    ));
    assert!(bot.history()?["vixen"].is_empty());
    Ok(())
}

#[test]
fn unknown_players_are_refused() -> Result<()> {
    let (_temp, bot) = setup()?;
    assert!(matches!(
        bot.claim("grinch", day(2022, 12, 5)),
        Err(ClaimError::NoAccount(ref user)) if user == "grinch"
    ));
    Ok(())
}

#[test]
fn join_is_idempotent() -> Result<()> {
    let (_temp, bot) = setup()?;
    let first = bot.join("cupid")?;
    let second = bot.join("CUPID")?;
    assert!(!second.created);
    assert_eq!(first.account, second.account);
    assert_eq!(bot.rares()?["cupid"].len(), labels().len());

    let donner = bot.join("donner")?;
    assert_eq!(donner.account.address, address_from_secret(&donner.account.secret));
    let gift = bot.claim("donner", day(2022, 12, 5))?;
    let first_id = gift.token_ids[0];
    bot.transfer("donner", "cupid", first_id)?;
    let owner = bot.owner_of(first_id)?.and_then(|owner| owner.username);
    assert_eq!(owner.as_deref(), Some("cupid"));
    Ok(())
}

#[test]
fn create_uses_the_players_description() -> Result<()> {
    let (temp, bot) = setup()?;
    bot.join("blitzen")?;
    let outcome = bot.create("blitzen", "a reindeer made of gingerbread", day(2022, 12, 5))?;
    assert_eq!(outcome.prompt, "a reindeer made of gingerbread");
    assert!(outcome.attributes.is_none());

    let store = LocalContentStore::new(temp.path().join("ipfs"));
    let metadata: Value =
        serde_json::from_str(&fs::read_to_string(store.resolve(&outcome.metadata_cid, "0.json"))?)?;
    assert_eq!(metadata["description"], "a reindeer made of gingerbread");
    let attributes = metadata["attributes"].as_array().cloned().unwrap_or_default();
    assert_eq!(attributes.len(), 1);
    assert_eq!(attributes[0]["value"], outcome.label.as_str());
    Ok(())
}

#[test]
fn top_elf_commands_require_the_admin() -> Result<()> {
    let (_temp, bot) = setup()?;
    bot.join("comet")?;
    let today = day(2022, 12, 20);

    assert!(matches!(
        bot.power("comet", "comet", RarityLabel::ChristmasMiracle, "a star", today),
        Err(ClaimError::NotAuthorized(_))
    ));
    assert!(matches!(
        bot.recover("comet", "comet", None, today),
        Err(ClaimError::NotAuthorized(_))
    ));

    let gift = bot.power(
        "BayesBrew",
        "comet",
        RarityLabel::ChristmasMiracle,
        "a golden star",
        today,
    )?;
    assert_eq!(gift.label, RarityLabel::ChristmasMiracle);
    assert_eq!(gift.prompt, "a golden star");
    assert!(matches!(
        bot.claim("comet", today),
        Err(ClaimError::AlreadyClaimedToday(_))
    ));

    assert!(bot.recover("bayesbrew", "comet", Some(RarityLabel::ChristmasMiracle), today)?);
    assert_eq!(bot.rares()?["comet"][&RarityLabel::ChristmasMiracle], 0);
    bot.claim("comet", today)?;
    Ok(())
}

#[test]
fn gifts_can_change_hands() -> Result<()> {
    let (_temp, bot) = setup()?;
    bot.join("alice")?;
    bot.join("bob")?;
    bot.claim("alice", day(2022, 12, 5))?;

    bot.transfer("alice", "@Bob", 2)?;
    let owner = bot.owner_of(2)?.and_then(|owner| owner.username);
    assert_eq!(owner.as_deref(), Some("bob"));
    assert_eq!(bot.balance("alice")?.1.tokens, 3);
    assert_eq!(bot.balance("bob")?.1.tokens, 1);

    assert!(matches!(
        bot.transfer("alice", "bob", 2),
        Err(ClaimError::TransferFailure(_))
    ));
    assert!(bot.owner_of(99)?.is_none());
    Ok(())
}

#[test]
fn simulation_mode_uses_flat_odds_and_keeps_no_markers() -> Result<()> {
    let temp = tempfile::tempdir()?;
    write_frame_assets(&temp.path().join("frames"))?;
    let config = LootboxConfig {
        simulation: true,
        batch_size: 1,
        ..config_in(temp.path())
    };
    let bot = orchestrator(temp.path(), config, Box::new(DryrunArtist));
    bot.join("elf")?;

    let odds = bot.odds(day(2022, 12, 5));
    assert!(odds.simulation);
    assert_eq!(odds.pmf, simulation_pmf());

    let first = bot.claim("elf", day(2022, 12, 5))?;
    let second = bot.claim("elf", day(2022, 12, 5))?;
    assert_eq!(first.token_ids, vec![0]);
    assert_eq!(second.token_ids, vec![1]);
    assert!(bot.history()?["elf"].is_empty());
    Ok(())
}
