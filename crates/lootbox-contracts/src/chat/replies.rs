//! Reply texts for the chat surface. Plain strings; the transport decides
//! how to render them.

use rand::seq::IndexedRandom;
use rand::Rng;

use crate::rarity::{format_pmf_table, labels, Pmf, RarityLabel};
use crate::store::RarityTallies;

use super::command_registry::COMMANDS;

pub fn countdown(days_until_christmas: i64) -> String {
    format!("{days_until_christmas} days until Christmas!!!!")
}

pub fn end_of_event(username: &str, days_until_next_christmas: i64) -> String {
    format!(
        "Sorry {username}, Santa is Broke!\n\
         Santa cannot afford loot boxes at the moment...\n\
         Keep being admirable and check back next year. Ho Ho Ho!\n\
         [{}]",
        countdown(days_until_next_christmas)
    )
}

pub fn not_started(username: &str, days_until_christmas: i64) -> String {
    format!(
        "Patience {username}! The elves are still wrapping this year's loot boxes.\n[{}]",
        countdown(days_until_christmas)
    )
}

pub fn no_account(username: &str) -> String {
    format!(
        "Sorry {username}, you're on the Naughty List!\n\
         ...Well more accurately, I don't see you on the Nice List. Use !join to play."
    )
}

pub fn impish(username: &str) -> String {
    format!(
        "How Impish of you {username}!\n\
         -You have already claimed a loot box today...\n\
         Greed is very impish! If you are admirable, check back tomorrow for a new loot box."
    )
}

pub fn embarrassing(username: &str) -> String {
    format!(
        "Well this is embarrassing...\n\
         -An error occurred minting the gifts for {username}. An elf has been notified."
    )
}

pub fn not_authorized(username: &str) -> String {
    format!("You are not authorized to do that, {username}!")
}

pub fn admirable(
    username: &str,
    label: RarityLabel,
    days_until_christmas: i64,
    description: &str,
) -> String {
    format!(
        "Merry Christmas {username}!\nYour loot box contained {} {label} gift (#{:06X})!\n\
         +It seems you have been quite admirable this year!\n\
         [{}]\n\
         Please stand by while my elves generate your daily gifts!\n\
         Generating: {description}",
        article_for(label),
        label.color(),
        countdown(days_until_christmas)
    )
}

fn article_for(label: RarityLabel) -> &'static str {
    match label.as_str().chars().next() {
        Some('a' | 'e' | 'i' | 'o' | 'u') => "an",
        _ => "a",
    }
}

pub fn success(username: &str, address: &str, token_ids: &[u64]) -> String {
    let ids = token_ids
        .iter()
        .map(u64::to_string)
        .collect::<Vec<String>>()
        .join(", ");
    format!("Your gift is available, {username}!\nSent to {address}.\nYour gift ids are: {ids}.")
}

pub fn created(username: &str, address: &str) -> String {
    format!(
        "Created an account for {username}!\nYour address is:\n{address}\n\
         You can collect a loot box right away. Use !help to get started."
    )
}

pub fn already_joined(username: &str, address: &str) -> String {
    format!("{username} already has an account!\nYour address is:\n{address}")
}

pub fn address(username: &str, address: &str) -> String {
    format!("{username}, your address is:\n{address}")
}

pub fn balance(username: &str, native: f64, gifts: u64) -> String {
    format!("{username} holds {native:.4} coins and {gifts} gifts.")
}

pub fn owner(token_id: u64, owner: Option<&str>) -> String {
    match owner {
        Some(owner) => format!("Gift #{token_id} belongs to {owner}."),
        None => format!("Gift #{token_id} has not been minted yet."),
    }
}

pub fn transferred(token_id: u64, from: &str, to: &str) -> String {
    format!("{from} gave gift #{token_id} to {to}. How admirable!")
}

pub fn recovered(username: &str) -> String {
    format!("A top elf restored today's loot box for {username}.")
}

pub fn odds(week_offset: usize, pmf: &Pmf) -> String {
    format!("Week {} odds:\n{}", week_offset + 1, format_pmf_table(pmf))
}

pub fn rares(tallies: &RarityTallies) -> String {
    let mut out = String::from("| User |");
    for label in labels() {
        out.push_str(&format!(" {label} |"));
    }
    out.push('\n');
    out.push_str("| ---- |");
    for _ in labels() {
        out.push_str(" --- |");
    }
    out.push('\n');
    for (username, tally) in tallies {
        out.push_str(&format!("| {username} |"));
        for label in labels() {
            out.push_str(&format!(" {} |", tally.get(&label).copied().unwrap_or(0)));
        }
        out.push('\n');
    }
    out
}

pub fn help() -> String {
    let mut out = String::from("Commands:\n");
    for spec in COMMANDS.iter().filter(|spec| !spec.admin) {
        out.push_str(&format!("  {:<34} {}\n", spec.usage, spec.summary));
    }
    out
}

pub fn welcome() -> String {
    "Welcome to the Advent Lootbox!\n\
     Every day until Christmas you may open one loot box with !claim.\n\
     Each box holds a batch of freshly painted gifts. Rarer tiers unlock stranger \
     subjects, eyes, hats, scarves and sweaters, and the odds improve every week."
        .to_string()
}

pub const JOKES: &[(&str, &str)] = &[
    ("What do you call an elf who sings?", "A wrapper."),
    ("Why did the Christmas tree go to the barber?", "It needed a trim."),
    ("What do snowmen eat for breakfast?", "Frosted flakes."),
    ("How does Santa take photos?", "With his North Pole-aroid."),
    ("What do you get if you cross a bell with a skunk?", "Jingle smells."),
    ("Why is Rudolph always so wise?", "Because he nose a lot."),
    ("What do reindeer hang on their trees?", "Horn-aments."),
    ("What is an elf's favorite kind of music?", "Wrap."),
];

pub fn joke<R: Rng + ?Sized>(rng: &mut R) -> String {
    let (setup, punchline) = JOKES.choose(rng).copied().unwrap_or(JOKES[0]);
    format!("{setup}\n{punchline}")
}

pub fn usage(command: &str, reason: &str) -> String {
    let usage = COMMANDS
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.usage)
        .unwrap_or("!help");
    format!("{reason}. Usage: {usage}")
}

pub fn unknown(command: &str) -> String {
    format!("I don't know `!{command}`. Try !help.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rarity::weekly_pmf;
    use crate::store::zeroed_tally;

    #[test]
    fn admirable_picks_article() {
        let msg = admirable("vixen", RarityLabel::Uncommon, 20, "cat");
        assert!(msg.contains("an uncommon gift"));
        let msg = admirable("vixen", RarityLabel::Rare, 20, "cat");
        assert!(msg.contains("a rare gift"));
        assert!(msg.contains("20 days until Christmas"));
    }

    #[test]
    fn success_lists_every_id() {
        let msg = success("cupid", "0xabc", &[4, 5, 6, 7]);
        assert!(msg.contains("4, 5, 6, 7"));
    }

    #[test]
    fn help_hides_admin_commands() {
        let text = help();
        assert!(text.contains("!claim"));
        assert!(!text.contains("topElf"));
    }

    #[test]
    fn rares_has_row_per_user() {
        let mut tallies = RarityTallies::new();
        let mut tally = zeroed_tally();
        tally.insert(RarityLabel::Mythical, 3);
        tallies.insert("blitzen".to_string(), tally);
        let table = rares(&tallies);
        assert_eq!(table.lines().count(), 3);
        assert!(table.contains("| blitzen | 0 | 0 | 0 | 0 | 3 | 0 | 0 |"));
    }

    #[test]
    fn odds_are_one_based_weeks() {
        assert!(odds(0, &weekly_pmf(0)).starts_with("Week 1 odds"));
    }

    #[test]
    fn jokes_come_from_the_list() {
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            let told = joke(&mut rng);
            assert!(JOKES
                .iter()
                .any(|(setup, punchline)| told == format!("{setup}\n{punchline}")));
        }
        assert!(help().contains("!joke"));
    }

    #[test]
    fn admirable_carries_the_tier_color() {
        let msg = admirable("vixen", RarityLabel::Legendary, 3, "a sled");
        assert!(msg.contains("(#A335EE)"));
    }

    #[test]
    fn usage_falls_back_to_help() {
        assert_eq!(usage("owner", "missing token id"), "missing token id. Usage: !owner <token_id>");
        assert_eq!(usage("nope", "bad"), "bad. Usage: !help");
    }
}
