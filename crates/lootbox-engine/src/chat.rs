//! Routes parsed chat commands to the orchestrator and renders replies.

use chrono::NaiveDate;
use lootbox_contracts::chat::{parse_command, replies, ChatCommand};

use crate::error::ClaimError;
use crate::orchestrator::{normalize_username, ClaimOrchestrator, ClaimOutcome};

/// One incoming message. Returns the replies to post, empty when the
/// message was not a command.
pub fn handle_message(
    orchestrator: &ClaimOrchestrator,
    username: &str,
    text: &str,
    today: NaiveDate,
) -> Vec<String> {
    match parse_command(text) {
        Some(command) => dispatch(orchestrator, username, command, today),
        None => Vec::new(),
    }
}

pub fn dispatch(
    orchestrator: &ClaimOrchestrator,
    username: &str,
    command: ChatCommand,
    today: NaiveDate,
) -> Vec<String> {
    let username = normalize_username(username);
    let season = orchestrator.season();
    match command {
        ChatCommand::Claim => gift_replies(orchestrator, &username, today, orchestrator.claim(&username, today)),
        ChatCommand::Create { description } => gift_replies(
            orchestrator,
            &username,
            today,
            orchestrator.create(&username, &description, today),
        ),
        ChatCommand::Power {
            username: target,
            label,
            description,
        } => gift_replies(
            orchestrator,
            &target,
            today,
            orchestrator.power(&username, &target, label, &description, today),
        ),
        ChatCommand::Recover {
            username: target,
            label,
        } => match orchestrator.recover(&username, &target, label, today) {
            Ok(_) => vec![replies::recovered(&normalize_username(&target))],
            Err(err) => vec![error_reply(orchestrator, &username, today, &err)],
        },
        ChatCommand::Join => match orchestrator.join(&username) {
            Ok(joined) if joined.created => {
                vec![replies::created(&joined.username, &joined.account.address)]
            }
            Ok(joined) => vec![replies::already_joined(
                &joined.username,
                &joined.account.address,
            )],
            Err(err) => vec![error_reply(orchestrator, &username, today, &err)],
        },
        ChatCommand::Address => match orchestrator.account(&username) {
            Ok(account) => vec![replies::address(&username, &account.address)],
            Err(err) => vec![error_reply(orchestrator, &username, today, &err)],
        },
        ChatCommand::Balance => match orchestrator.balance(&username) {
            Ok((_, balance)) => vec![replies::balance(&username, balance.native, balance.tokens)],
            Err(err) => vec![error_reply(orchestrator, &username, today, &err)],
        },
        ChatCommand::Odds => {
            let report = orchestrator.odds(today);
            vec![
                replies::odds(report.week_offset, &report.pmf),
                replies::countdown(season.days_until_christmas(today)),
            ]
        }
        ChatCommand::Rares => match orchestrator.rares() {
            Ok(tallies) => vec![replies::rares(&tallies)],
            Err(err) => vec![error_reply(orchestrator, &username, today, &err)],
        },
        ChatCommand::Owner { token_id } => match orchestrator.owner_of(token_id) {
            Ok(owner) => {
                let holder = owner.map(|owner| owner.username.unwrap_or(owner.address));
                vec![replies::owner(token_id, holder.as_deref())]
            }
            Err(err) => vec![error_reply(orchestrator, &username, today, &err)],
        },
        ChatCommand::Transfer { token_id, to } => {
            match orchestrator.transfer(&username, &to, token_id) {
                Ok(()) => vec![replies::transferred(token_id, &username, &normalize_username(&to))],
                Err(err) => vec![error_reply(orchestrator, &username, today, &err)],
            }
        }
        ChatCommand::Help => vec![replies::help()],
        ChatCommand::Welcome => vec![replies::welcome()],
        ChatCommand::Joke => vec![replies::joke(&mut rand::rng())],
        ChatCommand::Usage { command, reason } => vec![replies::usage(command, &reason)],
        ChatCommand::Unknown { command, .. } => vec![replies::unknown(&command)],
    }
}

fn gift_replies(
    orchestrator: &ClaimOrchestrator,
    username: &str,
    today: NaiveDate,
    result: Result<ClaimOutcome, ClaimError>,
) -> Vec<String> {
    match result {
        Ok(outcome) => vec![
            replies::admirable(
                &outcome.username,
                outcome.label,
                orchestrator.season().days_until_christmas(today),
                outcome.revised_prompt.as_deref().unwrap_or(&outcome.prompt),
            ),
            replies::success(&outcome.username, &outcome.address, &outcome.token_ids),
        ],
        Err(err) => vec![error_reply(orchestrator, username, today, &err)],
    }
}

fn error_reply(
    orchestrator: &ClaimOrchestrator,
    username: &str,
    today: NaiveDate,
    err: &ClaimError,
) -> String {
    let season = orchestrator.season();
    match err {
        ClaimError::EventEnded => {
            replies::end_of_event(username, season.days_until_next_christmas(today))
        }
        ClaimError::EventNotStarted => {
            replies::not_started(username, season.days_until_christmas(today))
        }
        ClaimError::NoAccount(missing) => replies::no_account(missing),
        ClaimError::AlreadyClaimedToday(_) => replies::impish(username),
        ClaimError::NotAuthorized(_) => replies::not_authorized(username),
        ClaimError::TransferFailure(cause) => format!("That transfer did not go through: {cause}"),
        _ => replies::embarrassing(username),
    }
}

#[cfg(test)]
mod tests {
    use lootbox_contracts::rarity::RarityLabel;

    use super::*;
    use crate::artists::DryrunArtist;
    use crate::config::LootboxConfig;
    use crate::content::LocalContentStore;
    use crate::ledger::LocalLedger;

    fn orchestrator(root: &std::path::Path) -> ClaimOrchestrator {
        let config = LootboxConfig {
            data_dir: root.join("data"),
            frame_dir: root.join("frames"),
            out_dir: root.join("nfts"),
            art_size: 8,
            ..LootboxConfig::default()
        };
        ClaimOrchestrator::new(
            config,
            Box::new(DryrunArtist),
            Box::new(LocalContentStore::new(root.join("ipfs"))),
            Box::new(LocalLedger::new(root.join("ledger.json"))),
        )
        .with_seed(1)
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 12, 1).unwrap_or_default()
    }

    #[test]
    fn plain_chatter_gets_no_reply() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let bot = orchestrator(temp.path());
        assert!(handle_message(&bot, "comet", "hello there", day()).is_empty());
        Ok(())
    }

    #[test]
    fn join_then_address() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let bot = orchestrator(temp.path());
        let joined = handle_message(&bot, "Comet", "!join", day());
        assert!(joined[0].starts_with("Created an account for comet!"));
        let again = handle_message(&bot, "comet", "!join", day());
        assert!(again[0].contains("already has an account"));
        let address = handle_message(&bot, "comet", "!address", day());
        assert!(address[0].contains("0x"));
        Ok(())
    }

    #[test]
    fn strangers_are_on_the_naughty_list() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let bot = orchestrator(temp.path());
        let reply = handle_message(&bot, "grinch", "!claim", day());
        assert!(reply[0].contains("Naughty List"));
        Ok(())
    }

    #[test]
    fn admin_commands_require_the_top_elf() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let bot = orchestrator(temp.path());
        bot.join("cupid")?;
        let reply = dispatch(
            &bot,
            "cupid",
            ChatCommand::Recover {
                username: "cupid".to_string(),
                label: Some(RarityLabel::Rare),
            },
            day(),
        );
        assert!(reply[0].contains("not authorized"));

        let reply = handle_message(&bot, "bayesbrew", "!topElfRecover cupid", day());
        assert_eq!(reply, vec![replies::recovered("cupid")]);
        Ok(())
    }

    #[test]
    fn help_and_unknown() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let bot = orchestrator(temp.path());
        assert!(handle_message(&bot, "a", "!help", day())[0].contains("!claim"));
        assert!(handle_message(&bot, "a", "!sleigh", day())[0].contains("!sleigh"));
        assert!(handle_message(&bot, "a", "!owner", day())[0].contains("Usage"));

        let joke = handle_message(&bot, "a", "!joke", day());
        assert_eq!(joke.len(), 1);
        assert!(replies::JOKES
            .iter()
            .any(|(setup, _)| joke[0].starts_with(setup)));
        Ok(())
    }

    #[test]
    fn hash_prefixed_ids_reach_the_ledger() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let bot = orchestrator(temp.path());
        bot.join("alice")?;
        bot.join("bob")?;

        let moved = handle_message(&bot, "alice", "!transfer #5 @bob", day());
        assert!(moved[0].starts_with("That transfer did not go through"));
        let owner = handle_message(&bot, "alice", "!owner #5", day());
        assert_eq!(owner, vec![replies::owner(5, None)]);
        Ok(())
    }
}
