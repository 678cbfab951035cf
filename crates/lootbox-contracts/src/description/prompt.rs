use crate::rarity::SampledAttributes;

const WORN_EYEWEAR: &str = "sunglasses";

/// Initialisms that show up lowercase in the trait pools.
const LOWERCASE_INITIALISMS: &[&str] = &["rgb", "lcd", "ufo"];

fn is_initialism(word: &str) -> bool {
    let head = word
        .split(|ch: char| !ch.is_ascii_alphanumeric())
        .next()
        .unwrap_or_default();
    let all_caps = head.len() > 1 && head.chars().all(|ch| ch.is_ascii_uppercase());
    all_caps || LOWERCASE_INITIALISMS.contains(&head)
}

/// Picks by sound: initialisms are read letter by letter, so `NFT` and `rgb`
/// take "an".
fn article(word: &str) -> &'static str {
    let first = word.chars().next().map(|ch| ch.to_ascii_lowercase());
    let vowel_sound = if is_initialism(word) {
        matches!(
            first,
            Some('a' | 'e' | 'f' | 'h' | 'i' | 'l' | 'm' | 'n' | 'o' | 'r' | 's' | 'x')
        )
    } else {
        matches!(first, Some('a' | 'e' | 'i' | 'o' | 'u'))
    };
    if vowel_sound {
        "an"
    } else {
        "a"
    }
}

fn with_article(word: &str) -> String {
    format!("{} {word}", article(word))
}

fn join_worn(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [first, second] => format!("{first} and {second}"),
        [rest @ .., last] => format!("{}, and {last}", rest.join(", ")),
    }
}

/// Renders the art prompt for a sampled gift.
///
/// Shape: `[age] subject [with <eyes> eyes] [and|] [wearing <worn items>]
/// in a <background> background, drawn in a <style> style`. Sunglasses are
/// worn items listed right after the hat rather than an eye color.
pub fn build_prompt(attrs: &SampledAttributes) -> String {
    let mut prompt = match attrs.age.as_deref() {
        Some(age) => format!("{age} {}", attrs.subject),
        None => attrs.subject.clone(),
    };

    let wears_eyewear = attrs.eyes.eq_ignore_ascii_case(WORN_EYEWEAR);
    if !wears_eyewear {
        prompt.push_str(&format!(" with {} eyes", attrs.eyes));
    }

    let mut worn: Vec<String> = Vec::new();
    if let Some(hat) = attrs.hat.as_deref() {
        worn.push(with_article(hat));
    }
    if wears_eyewear {
        worn.push(attrs.eyes.clone());
    }
    if let Some(sweater) = attrs.sweater.as_deref() {
        worn.push(with_article(&format!("{sweater} sweater")));
    }
    if let Some(scarf) = attrs.scarf.as_deref() {
        worn.push(with_article(&format!("{scarf} scarf")));
    }
    if !worn.is_empty() {
        let lead = if wears_eyewear { " wearing " } else { " and wearing " };
        prompt.push_str(lead);
        prompt.push_str(&join_worn(&worn));
    }

    prompt.push_str(&format!(
        " in {} background, drawn in {} style",
        with_article(&attrs.background),
        with_article(&attrs.style)
    ));
    prompt
}
