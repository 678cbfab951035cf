use std::collections::BTreeMap;
use std::io::{self, BufRead, ErrorKind, Write};
use std::path::PathBuf;

use anyhow::{bail, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use lootbox_contracts::chat::replies;
use lootbox_contracts::rarity::{
    drop_report, format_pmf_table, labels, DropTable, RarityLabel, POISSON_SCHEDULE,
};
use lootbox_engine::chat::handle_message;
use lootbox_engine::config::{ArtistKind, ContentStoreKind};
use lootbox_engine::orchestrator::random_seed;
use lootbox_engine::{ClaimError, ClaimOrchestrator, LootboxConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "lootbox", version, about = "Advent lootbox chat bot")]
struct Cli {
    #[command(flatten)]
    overrides: ConfigOverrides,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read `username: !command` lines from stdin and print the bot's replies.
    Chat(ChatArgs),
    Claim(ClaimArgs),
    Join(JoinArgs),
    Odds(OddsArgs),
    /// Per-week odds and the chance of seeing each tier over the event.
    Drops(DropsArgs),
    /// Draw many tiers and print the observed frequencies.
    Simulate(SimulateArgs),
}

/// Flags that override `LOOTBOX_*` environment variables.
#[derive(Debug, Default, Args)]
struct ConfigOverrides {
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    frame_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    out_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    sim: bool,
    #[arg(long, global = true)]
    artist: Option<ArtistKind>,
    #[arg(long, global = true)]
    content_store: Option<ContentStoreKind>,
    #[arg(long, global = true)]
    season_year: Option<i32>,
    #[arg(long, global = true)]
    seed: Option<u64>,
    /// Pretend today is this date (YYYY-MM-DD).
    #[arg(long, global = true)]
    today: Option<NaiveDate>,
}

#[derive(Debug, Args)]
struct ChatArgs {
    /// Username for lines without a `name:` prefix.
    #[arg(long, default_value = "guest")]
    user: String,
}

#[derive(Debug, Args)]
struct ClaimArgs {
    #[arg(long)]
    user: String,
    /// Use this description instead of sampled traits.
    #[arg(long)]
    describe: Option<String>,
}

#[derive(Debug, Args)]
struct JoinArgs {
    #[arg(long)]
    user: String,
}

#[derive(Debug, Args)]
struct OddsArgs {
    /// Week offset into the schedule; defaults to the current week.
    #[arg(long)]
    week: Option<usize>,
}

#[derive(Debug, Args)]
struct DropsArgs {
    #[arg(long, default_value_t = 7)]
    claims_per_week: u32,
}

#[derive(Debug, Args)]
struct SimulateArgs {
    #[arg(long, default_value_t = 10_000)]
    draws: u64,
    /// Draw from the flat simulation odds instead of the weekly schedule.
    #[arg(long)]
    uniform: bool,
    #[arg(long, default_value_t = 0)]
    week: usize,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("lootbox error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let today = cli
        .overrides
        .today
        .unwrap_or_else(|| Local::now().date_naive());
    match cli.command {
        Command::Chat(args) => run_chat(&cli.overrides, args, today),
        Command::Claim(args) => run_claim(&cli.overrides, args, today),
        Command::Join(args) => run_join(&cli.overrides, args),
        Command::Odds(args) => run_odds(&cli.overrides, args, today),
        Command::Drops(args) => {
            print!("{}", render_drop_report(args.claims_per_week));
            Ok(0)
        }
        Command::Simulate(args) => run_simulate(&cli.overrides, args),
    }
}

fn load_config(overrides: &ConfigOverrides) -> Result<LootboxConfig> {
    let mut config = LootboxConfig::from_env()?;
    apply_overrides(&mut config, overrides);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut LootboxConfig, overrides: &ConfigOverrides) {
    if let Some(dir) = &overrides.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(dir) = &overrides.frame_dir {
        config.frame_dir = dir.clone();
    }
    if let Some(dir) = &overrides.out_dir {
        config.out_dir = dir.clone();
    }
    if overrides.sim {
        config.simulation = true;
    }
    if let Some(artist) = overrides.artist {
        config.artist = artist;
    }
    if let Some(store) = overrides.content_store {
        config.content_store = store;
    }
    if let Some(year) = overrides.season_year {
        config.season.year = year;
    }
}

fn orchestrator(overrides: &ConfigOverrides) -> Result<ClaimOrchestrator> {
    let config = load_config(overrides)?;
    let seed = overrides.seed.unwrap_or_else(random_seed);
    info!(
        data_dir = %config.data_dir.display(),
        artist = config.artist.as_str(),
        simulation = config.simulation,
        seed,
        "lootbox ready"
    );
    Ok(ClaimOrchestrator::from_config(config)?.with_seed(seed))
}

/// Splits `name: text`; lines without a name belong to `default_user`.
fn split_chat_line<'a>(line: &'a str, default_user: &'a str) -> (&'a str, &'a str) {
    let line = line.trim();
    if line.starts_with('!') {
        return (default_user, line);
    }
    match line.split_once(':') {
        Some((user, text)) if !user.trim().is_empty() && !user.contains(char::is_whitespace) => {
            (user.trim(), text.trim())
        }
        _ => (default_user, line),
    }
}

fn run_chat(overrides: &ConfigOverrides, args: ChatArgs, today: NaiveDate) -> Result<i32> {
    let bot = orchestrator(overrides)?;
    println!("{}", replies::welcome());
    println!("[{}]", replies::countdown(bot.season().days_until_christmas(today)));

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();
    let mut input = stdin.lock();
    loop {
        print!("> ");
        stdout.flush()?;
        line.clear();
        let read = match input.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }
        let (user, text) = split_chat_line(&line, &args.user);
        if text.is_empty() {
            continue;
        }
        for reply in handle_message(&bot, user, text, today) {
            println!("{reply}\n");
        }
    }
    Ok(0)
}

fn run_claim(overrides: &ConfigOverrides, args: ClaimArgs, today: NaiveDate) -> Result<i32> {
    let bot = orchestrator(overrides)?;
    let result = match args.describe.as_deref() {
        Some(description) => bot.create(&args.user, description, today),
        None => bot.claim(&args.user, today),
    };
    match result {
        Ok(outcome) => {
            println!(
                "{}",
                replies::admirable(
                    &outcome.username,
                    outcome.label,
                    bot.season().days_until_christmas(today),
                    outcome.revised_prompt.as_deref().unwrap_or(&outcome.prompt),
                )
            );
            println!(
                "{}",
                replies::success(&outcome.username, &outcome.address, &outcome.token_ids)
            );
            for path in &outcome.nft_files {
                println!("  {}", path.display());
            }
            Ok(0)
        }
        Err(err) if err.is_user_facing() => {
            warn!(user = args.user.as_str(), "claim refused: {err}");
            println!("{err}");
            Ok(exit_code(&err))
        }
        Err(err) => bail!("claim failed: {err}"),
    }
}

fn exit_code(err: &ClaimError) -> i32 {
    match err {
        ClaimError::AlreadyClaimedToday(_) => 3,
        ClaimError::EventEnded | ClaimError::EventNotStarted => 4,
        _ => 2,
    }
}

fn run_join(overrides: &ConfigOverrides, args: JoinArgs) -> Result<i32> {
    let bot = orchestrator(overrides)?;
    let joined = bot.join(&args.user)?;
    if joined.created {
        println!("{}", replies::created(&joined.username, &joined.account.address));
    } else {
        println!(
            "{}",
            replies::already_joined(&joined.username, &joined.account.address)
        );
    }
    Ok(0)
}

fn run_odds(overrides: &ConfigOverrides, args: OddsArgs, today: NaiveDate) -> Result<i32> {
    let config = load_config(overrides)?;
    let week_offset = match args.week {
        Some(week) => week,
        None => lootbox_engine::season::Season::new(config.season).week_offset(today),
    };
    let table = if config.simulation {
        DropTable::Simulation
    } else {
        DropTable::Weekly(week_offset)
    };
    println!("{}", replies::odds(week_offset, &table.pmf()));
    Ok(0)
}

fn render_drop_report(claims_per_week: u32) -> String {
    let report = drop_report(claims_per_week);
    let mut out = String::new();
    for week in &report.weeks {
        out.push_str(&format!(
            "Week {} (mu = {:.1}):\n{}\n",
            week.week_offset + 1,
            week.mu,
            format_pmf_table(&week.pmf)
        ));
    }
    out.push_str(&format!(
        "Chance of at least one of each tier over {} weeks at {} claims per week:\n",
        POISSON_SCHEDULE.len(),
        report.claims_per_week
    ));
    out.push_str(&format_pmf_table(&report.at_least_once));
    out
}

fn simulate(table: DropTable, draws: u64, seed: u64) -> Result<BTreeMap<RarityLabel, u64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut counts: BTreeMap<RarityLabel, u64> =
        labels().into_iter().map(|label| (label, 0)).collect();
    for _ in 0..draws {
        let label = table.sample(&mut rng)?;
        *counts.entry(label).or_insert(0) += 1;
    }
    Ok(counts)
}

fn run_simulate(overrides: &ConfigOverrides, args: SimulateArgs) -> Result<i32> {
    if args.draws == 0 {
        bail!("--draws must be positive");
    }
    let table = if args.uniform {
        DropTable::Simulation
    } else {
        DropTable::Weekly(args.week)
    };
    let seed = overrides.seed.unwrap_or_else(random_seed);
    let counts = simulate(table, args.draws, seed)?;
    let expected = table.pmf();

    println!("| Rarity | Count | Observed (%) | Expected (%) |");
    println!("| ------ | ----- | ------------ | ------------ |");
    for (label, count) in &counts {
        println!(
            "| {label} | {count} | {:.3} % | {:.3} % |",
            100.0 * *count as f64 / args.draws as f64,
            100.0 * expected[label.level()]
        );
    }
    println!("seed: {seed}");
    Ok(0)
}
