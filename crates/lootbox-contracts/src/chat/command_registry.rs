pub const COMMAND_PREFIX: char = '!';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub command: &'static str,
    pub usage: &'static str,
    pub summary: &'static str,
    pub admin: bool,
}

const fn player(command: &'static str, usage: &'static str, summary: &'static str) -> CommandSpec {
    CommandSpec {
        command,
        usage,
        summary,
        admin: false,
    }
}

const fn admin(command: &'static str, usage: &'static str, summary: &'static str) -> CommandSpec {
    CommandSpec {
        command,
        usage,
        summary,
        admin: true,
    }
}

/// Lookup keys are lowercase; `topElfRecover` is matched as `topelfrecover`.
pub const COMMANDS: &[CommandSpec] = &[
    player("claim", "!claim", "Open today's loot box."),
    player(
        "create",
        "!create <description>",
        "Open today's loot box with your own description.",
    ),
    player("join", "!join", "Get on the Nice List and receive an address."),
    player("address", "!address", "Show your address."),
    player("balance", "!balance", "Show your balance and gift count."),
    player("odds", "!odds", "Show this week's rarity odds."),
    player("rares", "!rares", "Show everyone's rarity tallies."),
    player("owner", "!owner <token_id>", "Show who owns a gift."),
    player(
        "transfer",
        "!transfer <token_id> <username>",
        "Give one of your gifts to another player.",
    ),
    player("help", "!help", "List the commands."),
    player("welcome", "!welcome", "Explain the game."),
    player("joke", "!joke", "Tell a Christmas joke."),
    admin(
        "topelfrecover",
        "!topElfRecover <username> [rarity]",
        "Give a player back today's claim.",
    ),
    admin(
        "topelfpower",
        "!topElfPower <username> <rarity> <description>",
        "Mint an exact gift for a player.",
    ),
];

pub fn find_command(command: &str) -> Option<&'static CommandSpec> {
    let lower = command.to_ascii_lowercase();
    COMMANDS.iter().find(|spec| spec.command == lower)
}
