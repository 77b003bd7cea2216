//! Typed query model produced by prompt parsing.

use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, Result};

/// Clothing category. The closed set every query draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Top,
    Bottom,
    Shoes,
    Accessories,
}

impl Category {
    /// Stable lower-case name, as used in cache keys and store rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Top => "top",
            Category::Bottom => "bottom",
            Category::Shoes => "shoes",
            Category::Accessories => "accessories",
        }
    }
}

/// Gender preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Unisex,
}

impl Gender {
    /// Stable lower-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Unisex => "unisex",
        }
    }
}

/// Clothing size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Size {
    Xs,
    S,
    M,
    L,
    Xl,
    Xxl,
}

/// Structured output from prompt parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedQuery {
    /// Fashion aesthetic or style (e.g. "korean minimal").
    pub aesthetic: String,

    /// Budget, when stated. Non-negative by construction.
    #[serde(default)]
    pub budget: Option<u32>,

    /// Clothing size, when stated.
    #[serde(default)]
    pub size: Option<Size>,

    /// Gender preference, when stated.
    #[serde(default)]
    pub gender: Option<Gender>,

    /// Occasion (e.g. "coffee date"), when stated.
    #[serde(default)]
    pub occasion: Option<String>,

    /// Required clothing categories, in request order.
    #[serde(default = "default_categories")]
    pub categories: Vec<Category>,
}

pub(crate) fn default_categories() -> Vec<Category> {
    vec![Category::Top, Category::Bottom]
}

impl ParsedQuery {
    /// Enforce invariants on an API-derived query: non-empty
    /// aesthetic, deduplicated non-empty categories.
    pub fn validate(mut self) -> Result<Self> {
        if self.aesthetic.trim().is_empty() {
            return Err(PlannerError::MalformedResponse(
                "empty aesthetic label".to_string(),
            ));
        }

        let mut seen = Vec::new();
        self.categories.retain(|c| {
            if seen.contains(c) {
                false
            } else {
                seen.push(*c);
                true
            }
        });
        if self.categories.is_empty() {
            self.categories = default_categories();
        }

        Ok(self)
    }

    /// Category names, for cache-key derivation.
    pub fn category_names(&self) -> Vec<&'static str> {
        self.categories.iter().map(Category::as_str).collect()
    }
}
