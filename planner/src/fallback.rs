//! Deterministic rule-based fallbacks.
//!
//! Invoked whenever the completion API fails or returns invalid data.
//! These functions never fail and never touch the network, so the
//! operations built on them always produce a usable answer.

use regex_lite::Regex;
use tracing::warn;

use crate::plan::OutfitPlan;
use crate::query::{Category, Gender, ParsedQuery, Size, default_categories};

/// Extract a query from raw prompt text with keyword rules. The raw
/// input serves as the aesthetic label since nothing better is
/// available.
pub fn extract_query(prompt: &str) -> ParsedQuery {
    warn!("using fallback prompt extraction");

    let lower = prompt.to_lowercase();

    let mut categories = default_categories();
    if lower.contains("shoe") {
        categories.push(Category::Shoes);
    }
    if lower.contains("accessor") {
        categories.push(Category::Accessories);
    }

    ParsedQuery {
        aesthetic: prompt.trim().to_string(),
        budget: first_number(&lower),
        size: find_size(&lower),
        gender: Some(find_gender(&lower)),
        occasion: None,
        categories,
    }
}

/// First integer token in the text, read as a budget.
fn first_number(text: &str) -> Option<u32> {
    let re = Regex::new(r"[0-9]+").ok()?;
    re.find(text)?.as_str().parse().ok()
}

/// Size token bounded by word boundaries. Longer tokens first so
/// "xxl" is never read as "xl" or "l".
fn find_size(text: &str) -> Option<Size> {
    let re = Regex::new(r"\b(xxl|xl|xs|s|m|l)\b").ok()?;
    match re.find(text)?.as_str() {
        "xs" => Some(Size::Xs),
        "s" => Some(Size::S),
        "m" => Some(Size::M),
        "l" => Some(Size::L),
        "xl" => Some(Size::Xl),
        "xxl" => Some(Size::Xxl),
        _ => None,
    }
}

/// Keyword gender match. Female keywords are checked first so "women"
/// is not shadowed by its "men" substring.
fn find_gender(text: &str) -> Gender {
    if text.contains("women") || text.contains("female") {
        Gender::Female
    } else if text.contains("men") || text.contains("male") {
        Gender::Male
    } else {
        Gender::Unisex
    }
}

/// Plan an outfit from the aesthetic-keyword table. Always yields 2-4
/// items.
pub fn plan_for(query: &ParsedQuery) -> OutfitPlan {
    warn!("using fallback outfit planning");

    let aesthetic = query.aesthetic.to_lowercase();

    let (items, reasoning): (Vec<&str>, String) =
        if aesthetic.contains("korean") || aesthetic.contains("minimal") {
            (
                vec!["oversized t-shirt", "straight pants", "white sneakers"],
                "Korean minimal aesthetic with clean lines and neutral colors".to_string(),
            )
        } else if aesthetic.contains("street") {
            (
                vec!["graphic hoodie", "cargo pants", "chunky sneakers"],
                "Streetwear with bold graphics and utility elements".to_string(),
            )
        } else if aesthetic.contains("y2k") {
            (
                vec!["crop top", "low-rise jeans", "platform shoes"],
                "Y2K aesthetic with 2000s-inspired pieces".to_string(),
            )
        } else if aesthetic.contains("vintage") {
            (
                vec!["vintage blouse", "high-waisted skirt"],
                "Vintage style with classic silhouettes".to_string(),
            )
        } else if aesthetic.contains("athle") || aesthetic.contains("sport") {
            (
                vec!["sports top", "leggings", "running shoes"],
                "Athleisure combining athletic and casual style".to_string(),
            )
        } else if aesthetic.contains("office") || aesthetic.contains("formal") {
            (
                vec!["button-down shirt", "chino pants"],
                "Office wear balancing professionalism and comfort".to_string(),
            )
        } else {
            (
                vec!["casual top", "comfortable pants"],
                format!("Casual outfit for {} aesthetic", query.aesthetic),
            )
        };

    let mut items: Vec<String> = items.into_iter().map(String::from).collect();

    if query.categories.contains(&Category::Shoes) && items.len() == 2 {
        items.push("casual shoes".to_string());
    }
    items.truncate(4);

    OutfitPlan { items, reasoning }
}
