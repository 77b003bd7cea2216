//! Deterministic cache-key derivation.
//!
//! Keys are pure functions of normalized input: identical semantic
//! input under different surface formatting hashes identically.

use sha2::{Digest, Sha256};

const PROMPT_PREFIX: &str = "parse:";
const PLAN_PREFIX: &str = "plan:";
const AESTHETIC_PREFIX: &str = "aesthetic:vector:";

fn digest(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Key for a parsed-prompt entry: exact hash of the lower-cased,
/// whitespace-trimmed prompt text.
pub fn prompt_key(prompt: &str) -> String {
    format!("{PROMPT_PREFIX}{}", digest(&prompt.trim().to_lowercase()))
}

/// Key for an outfit-plan entry: composite of aesthetic, gender,
/// sorted categories and occasion. Order-independent on categories
/// only.
pub fn plan_key(
    aesthetic: &str,
    gender: Option<&str>,
    categories: &[&str],
    occasion: Option<&str>,
) -> String {
    let mut sorted = categories.to_vec();
    sorted.sort_unstable();

    let composite = [
        aesthetic.trim().to_lowercase(),
        gender.unwrap_or("unisex").to_string(),
        sorted.join(","),
        occasion.unwrap_or_default().to_string(),
    ]
    .join("|");

    format!("{PLAN_PREFIX}{}", digest(&composite))
}

/// Key for a precomputed aesthetic reference vector.
pub fn aesthetic_key(label: &str) -> String {
    let slug = label
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    format!("{AESTHETIC_PREFIX}{slug}")
}

/// Glob pattern matching every aesthetic reference key.
pub fn aesthetic_pattern() -> String {
    format!("{AESTHETIC_PREFIX}*")
}

/// Reconstruct the display label from an aesthetic reference key.
pub fn aesthetic_label(key: &str) -> Option<String> {
    let slug = key.strip_prefix(AESTHETIC_PREFIX)?;
    let label = slug
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    Some(label)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn prompt_key_is_case_and_whitespace_insensitive() {
        assert_eq!(prompt_key("Korean Minimal "), prompt_key("korean minimal"));
        assert_eq!(prompt_key("  STREETWEAR"), prompt_key("streetwear"));
    }

    #[test]
    fn prompt_key_distinguishes_different_prompts() {
        assert_ne!(prompt_key("korean minimal"), prompt_key("streetwear"));
    }

    #[test]
    fn plan_key_ignores_category_order_only() {
        let a = plan_key("y2k", Some("female"), &["top", "shoes"], Some("party"));
        let b = plan_key("y2k", Some("female"), &["shoes", "top"], Some("party"));
        assert_eq!(a, b);

        let c = plan_key("y2k", Some("male"), &["top", "shoes"], Some("party"));
        assert_ne!(a, c);

        let d = plan_key("y2k", Some("female"), &["top", "shoes"], None);
        assert_ne!(a, d);
    }

    #[test]
    fn plan_key_defaults_missing_gender_to_unisex() {
        let a = plan_key("boho", None, &["top", "bottom"], None);
        let b = plan_key("boho", Some("unisex"), &["top", "bottom"], None);
        assert_eq!(a, b);
    }

    #[test]
    fn aesthetic_key_slugs_label() {
        assert_eq!(aesthetic_key("Korean Minimal"), "aesthetic:vector:korean_minimal");
        assert_eq!(aesthetic_key("  Dark  Academia "), "aesthetic:vector:dark_academia");
    }

    #[test]
    fn aesthetic_label_round_trips() {
        let key = aesthetic_key("Quiet Luxury");
        assert_eq!(aesthetic_label(&key), Some("Quiet Luxury".to_string()));
        assert_eq!(aesthetic_label("unrelated:key"), None);
    }
}
