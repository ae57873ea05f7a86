//! Category based channel selection for parsed playlists

use std::collections::HashSet;

use regex::Regex;

use crate::config::PlaylistConfig;
use crate::errors::{AppError, AppResult};
use crate::models::PlaylistChannel;

#[derive(Debug, Clone)]
struct NameRule {
    category: String,
    pattern: Regex,
}

/// Keeps channels by category, then narrows categories that carry a name rule
#[derive(Debug, Clone, Default)]
pub struct ChannelFilter {
    keep_categories: HashSet<String>,
    name_rules: Vec<NameRule>,
}

impl ChannelFilter {
    /// Compile the configured rules; `name_contains` is a regular expression
    pub fn new(config: &PlaylistConfig) -> AppResult<Self> {
        let name_rules = config
            .category_rules
            .iter()
            .map(|rule| {
                let pattern = Regex::new(&rule.name_contains).map_err(|e| {
                    AppError::configuration(format!(
                        "Invalid name pattern for category {}: {}",
                        rule.category, e
                    ))
                })?;
                Ok(NameRule {
                    category: rule.category.clone(),
                    pattern,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Self {
            keep_categories: config.keep_categories.iter().cloned().collect(),
            name_rules,
        })
    }

    /// True when no rule is configured and every channel passes
    pub fn is_pass_through(&self) -> bool {
        self.keep_categories.is_empty() && self.name_rules.is_empty()
    }

    pub fn matches(&self, channel: &PlaylistChannel) -> bool {
        let category = channel.category.as_deref();

        if !self.keep_categories.is_empty() {
            match category {
                Some(category) if self.keep_categories.contains(category) => {}
                _ => return false,
            }
        }

        let mut rules = self
            .name_rules
            .iter()
            .filter(|rule| category == Some(rule.category.as_str()))
            .peekable();
        if rules.peek().is_none() {
            return true;
        }

        // A nameless channel cannot satisfy a name rule
        match channel.name.as_deref() {
            Some(name) => rules.all(|rule| rule.pattern.is_match(name)),
            None => false,
        }
    }
}
