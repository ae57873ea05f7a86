use serde::{Deserialize, Serialize};

use crate::utils::XmltvTimestamp;

/// One `<programme>` entry from an XMLTV guide
///
/// Every descriptive field holds the trimmed text of the first matching child
/// element, or `None` when that child is missing or blank.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgramRecord {
    pub channel: Option<String>,
    pub start_raw: Option<String>, // verbatim `start` attribute
    pub start_time: Option<XmltvTimestamp>,
    pub stop_raw: Option<String>, // verbatim `stop` attribute
    pub stop_time: Option<XmltvTimestamp>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub category: Option<String>,
    pub keyword: Option<String>,
    pub language: Option<String>,
    pub original_language: Option<String>,
    pub length: Option<String>,
    pub country: Option<String>,
    pub episode_number: Option<String>,
    pub is_new: bool,
    pub premiere: Option<String>,
    pub last_chance: Option<String>,
}

/// One `#EXTINF` entry from an M3U playlist
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaylistChannel {
    pub name: Option<String>,
    pub logo: Option<String>, // tvg-logo
    pub url: String,
    pub category: Option<String>, // group-title
    pub guide_id: Option<String>, // tvg-id, joins to ProgramRecord::channel
}
