//! Field extraction for a single `<programme>` element

use std::collections::HashMap;

use crate::models::ProgramRecord;
use crate::utils::{non_empty_trimmed, normalize_timestamp};

/// Attributes and first-occurrence child text of one `<programme>` element
///
/// Only direct children are tracked, and only the first element of each
/// name. A child's text is the character data before its first nested
/// element.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProgrammeElement {
    attributes: HashMap<String, String>,
    children: HashMap<String, Option<String>>,
}

impl ProgrammeElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Record a child element; later children with the same name are ignored.
    /// Returns whether this was the first occurrence.
    pub fn insert_child(&mut self, name: impl Into<String>, text: Option<String>) -> bool {
        let name = name.into();
        if self.children.contains_key(&name) {
            return false;
        }
        self.children.insert(name, text);
        true
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.children.contains_key(name)
    }

    /// Raw text of the first child with this name
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.children.get(name).and_then(|text| text.as_deref())
    }

    fn text(&self, name: &str) -> Option<String> {
        self.child_text(name).and_then(non_empty_trimmed)
    }
}

/// Build the flat record for one programme element
pub fn extract(element: &ProgrammeElement) -> ProgramRecord {
    let start_raw = element.attribute("start").map(str::to_string);
    let stop_raw = element.attribute("stop").map(str::to_string);

    ProgramRecord {
        channel: element.attribute("channel").map(str::to_string),
        start_time: normalize_timestamp(start_raw.as_deref()),
        start_raw,
        stop_time: normalize_timestamp(stop_raw.as_deref()),
        stop_raw,
        title: element.text("title"),
        subtitle: element.text("sub-title"),
        description: element.text("desc"),
        date: element.text("date"),
        category: element.text("category"),
        keyword: element.text("keyword"),
        language: element.text("language"),
        original_language: element.text("orig-language"),
        length: element.text("length"),
        country: element.text("country"),
        episode_number: element.text("episode-num"),
        is_new: element.has_child("new"),
        premiere: element.text("premiere"),
        last_chance: element.text("last-chance"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::XmltvTimestamp;

    fn element_with(children: &[(&str, Option<&str>)]) -> ProgrammeElement {
        let mut element = ProgrammeElement::new();
        element.set_attribute("channel", "bbc1.uk");
        element.set_attribute("start", "20240115133000 +0000");
        element.set_attribute("stop", "20240115143000 +0000");
        for (name, text) in children {
            element.insert_child(*name, text.map(str::to_string));
        }
        element
    }

    #[test]
    fn test_extract_full_programme() {
        let element = element_with(&[
            ("title", Some("  News at One ")),
            ("sub-title", Some("Lunchtime")),
            ("desc", Some("The latest headlines.")),
            ("date", Some("2024")),
            ("category", Some("News")),
            ("keyword", Some("politics")),
            ("language", Some("en")),
            ("orig-language", Some("cy")),
            ("length", Some("30")),
            ("country", Some("GB")),
            ("episode-num", Some("0.12.")),
            ("new", None),
            ("premiere", Some("First showing")),
            ("last-chance", Some("Final airing")),
        ]);

        let record = extract(&element);
        assert_eq!(record.channel.as_deref(), Some("bbc1.uk"));
        assert_eq!(record.start_raw.as_deref(), Some("20240115133000 +0000"));
        assert_eq!(
            record.start_time,
            XmltvTimestamp::parse("20240115133000 +0000")
        );
        assert_eq!(record.title.as_deref(), Some("News at One"));
        assert_eq!(record.subtitle.as_deref(), Some("Lunchtime"));
        assert_eq!(record.description.as_deref(), Some("The latest headlines."));
        assert_eq!(record.original_language.as_deref(), Some("cy"));
        assert_eq!(record.episode_number.as_deref(), Some("0.12."));
        assert!(record.is_new);
        assert_eq!(record.premiere.as_deref(), Some("First showing"));
        assert_eq!(record.last_chance.as_deref(), Some("Final airing"));
    }

    #[test]
    fn test_first_child_wins() {
        let mut element = element_with(&[("category", Some("Sport"))]);
        assert!(!element.insert_child("category", Some("Football".to_string())));
        assert_eq!(extract(&element).category.as_deref(), Some("Sport"));
    }

    #[test]
    fn test_blank_first_child_hides_later_ones() {
        let mut element = element_with(&[("title", Some("   "))]);
        element.insert_child("title", Some("Second".to_string()));
        assert_eq!(extract(&element).title, None);
    }

    #[test]
    fn test_missing_children_are_absent() {
        let record = extract(&element_with(&[]));
        assert_eq!(record.title, None);
        assert_eq!(record.description, None);
        assert!(!record.is_new);
    }

    #[test]
    fn test_new_marker_with_content_still_counts() {
        let record = extract(&element_with(&[("new", Some("yes"))]));
        assert!(record.is_new);
    }

    #[test]
    fn test_bad_timestamp_keeps_raw() {
        let mut element = ProgrammeElement::new();
        element.set_attribute("start", "202401");
        let record = extract(&element);
        assert_eq!(record.start_raw.as_deref(), Some("202401"));
        assert_eq!(record.start_time, None);
        assert_eq!(record.stop_raw, None);
        assert_eq!(record.stop_time, None);
        assert_eq!(record.channel, None);
    }
}
