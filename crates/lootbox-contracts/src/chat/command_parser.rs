use crate::rarity::RarityLabel;

use super::command_registry::{find_command, COMMAND_PREFIX};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Claim,
    Create { description: String },
    Join,
    Address,
    Balance,
    Odds,
    Rares,
    Owner { token_id: u64 },
    Transfer { token_id: u64, to: String },
    Recover { username: String, label: Option<RarityLabel> },
    Power {
        username: String,
        label: RarityLabel,
        description: String,
    },
    Help,
    Welcome,
    Joke,
    /// A known command whose arguments did not parse.
    Usage { command: &'static str, reason: String },
    Unknown { command: String, arg: String },
}

/// Marks a word-leading `#` outside quotes as literal. `shell_words` would
/// otherwise read it as the start of a comment and drop the rest.
fn escape_comment_marks(arg: &str) -> String {
    let mut escaped = String::with_capacity(arg.len());
    let mut quote: Option<char> = None;
    let mut word_start = true;
    let mut chars = arg.chars();
    while let Some(ch) = chars.next() {
        match (quote, ch) {
            (None, '#') if word_start => escaped.push_str("\\#"),
            (None | Some('"'), '\\') => {
                escaped.push(ch);
                if let Some(next) = chars.next() {
                    escaped.push(next);
                }
            }
            (None, '\'' | '"') => {
                quote = Some(ch);
                escaped.push(ch);
            }
            (Some(open), _) if ch == open => {
                quote = None;
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
        word_start = quote.is_none() && ch.is_whitespace();
    }
    escaped
}

/// Splits token ids and usernames. Free text never goes through here.
fn split_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(&escape_comment_marks(arg)) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg.split_whitespace().map(str::to_string).collect(),
    }
}

/// Peels one whitespace-delimited word and returns it with the untouched rest.
fn split_word(arg: &str) -> Option<(&str, &str)> {
    let arg = arg.trim_start();
    if arg.is_empty() {
        return None;
    }
    match arg.split_once(char::is_whitespace) {
        Some((word, rest)) => Some((word, rest.trim())),
        None => Some((arg, "")),
    }
}

fn free_text(arg: &str) -> String {
    let arg = arg.trim();
    let unwrapped = arg
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .filter(|inner| !inner.contains('"'))
        .unwrap_or(arg);
    unwrapped.trim().to_string()
}

fn usage(command: &'static str, reason: impl Into<String>) -> ChatCommand {
    ChatCommand::Usage {
        command,
        reason: reason.into(),
    }
}

fn parse_token_id(command: &'static str, raw: Option<&String>) -> Result<u64, ChatCommand> {
    let Some(raw) = raw else {
        return Err(usage(command, "missing token id"));
    };
    raw.trim_start_matches('#')
        .parse::<u64>()
        .map_err(|_| usage(command, format!("`{raw}` is not a token id")))
}

fn parse_label(command: &'static str, raw: &str) -> Result<RarityLabel, ChatCommand> {
    raw.parse::<RarityLabel>()
        .map_err(|err| usage(command, err.to_string()))
}

/// Parses one chat message. Returns `None` for messages that are not
/// addressed to the bot.
pub fn parse_command(text: &str) -> Option<ChatCommand> {
    let tail = text.trim().strip_prefix(COMMAND_PREFIX)?;
    let command_len = tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    if command_len == 0 {
        return None;
    }
    let command = &tail[..command_len];
    let arg = tail[command_len..].trim();

    let Some(spec) = find_command(command) else {
        return Some(ChatCommand::Unknown {
            command: command.to_string(),
            arg: arg.to_string(),
        });
    };

    let parsed = match spec.command {
        "claim" => Ok(ChatCommand::Claim),
        "join" => Ok(ChatCommand::Join),
        "address" => Ok(ChatCommand::Address),
        "balance" => Ok(ChatCommand::Balance),
        "odds" => Ok(ChatCommand::Odds),
        "rares" => Ok(ChatCommand::Rares),
        "help" => Ok(ChatCommand::Help),
        "welcome" => Ok(ChatCommand::Welcome),
        "joke" => Ok(ChatCommand::Joke),
        "create" => parse_create(spec.command, arg),
        "owner" => {
            let args = split_args(arg);
            parse_token_id(spec.command, args.first())
                .map(|token_id| ChatCommand::Owner { token_id })
        }
        "transfer" => parse_transfer(spec.command, arg),
        "topelfrecover" => parse_recover(spec.command, arg),
        "topelfpower" => parse_power(spec.command, arg),
        _ => Err(ChatCommand::Unknown {
            command: command.to_string(),
            arg: arg.to_string(),
        }),
    };
    Some(parsed.unwrap_or_else(|fallback| fallback))
}

fn parse_create(command: &'static str, arg: &str) -> Result<ChatCommand, ChatCommand> {
    let description = free_text(arg);
    if description.is_empty() {
        return Err(usage(command, "missing description"));
    }
    Ok(ChatCommand::Create { description })
}

fn parse_transfer(command: &'static str, arg: &str) -> Result<ChatCommand, ChatCommand> {
    let args = split_args(arg);
    let token_id = parse_token_id(command, args.first())?;
    let Some(to) = args.get(1) else {
        return Err(usage(command, "missing recipient"));
    };
    Ok(ChatCommand::Transfer {
        token_id,
        to: to.trim_start_matches('@').to_string(),
    })
}

fn parse_recover(command: &'static str, arg: &str) -> Result<ChatCommand, ChatCommand> {
    let Some((username, rest)) = split_word(arg) else {
        return Err(usage(command, "missing username"));
    };
    let label = match rest {
        "" => None,
        rest => Some(parse_label(command, rest)?),
    };
    Ok(ChatCommand::Recover {
        username: username.trim_start_matches('@').to_string(),
        label,
    })
}

fn parse_power(command: &'static str, arg: &str) -> Result<ChatCommand, ChatCommand> {
    let Some((username, (label, rest))) =
        split_word(arg).and_then(|(username, rest)| Some((username, split_word(rest)?)))
    else {
        return Err(usage(command, "expected a username and a rarity"));
    };
    let description = free_text(rest);
    if description.is_empty() {
        return Err(usage(command, "missing description"));
    }
    Ok(ChatCommand::Power {
        username: username.trim_start_matches('@').to_string(),
        label: parse_label(command, label)?,
        description,
    })
}
