//! In-memory channel and program tables for the query API

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::QueryConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{PlaylistChannel, ProgramRecord};
use crate::output::{read_records, OutputFormat};
use crate::utils::time::{parse_display_timezone, to_display_time};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryView {
    pub name: String,
}

/// A program as returned to clients, with times in the display timezone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramView {
    pub channel: String,
    pub start_dt: Option<DateTime<FixedOffset>>,
    pub stop_dt: DateTime<FixedOffset>,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Channel and program tables indexed for lookup by category and channel id
#[derive(Debug)]
pub struct Catalog {
    channels: Vec<PlaylistChannel>,
    programs: Vec<ProgramRecord>,
    programs_by_channel: HashMap<String, Vec<usize>>,
    display_tz: Tz,
}

impl Catalog {
    pub fn new(channels: Vec<PlaylistChannel>, programs: Vec<ProgramRecord>, display_tz: Tz) -> Self {
        let mut programs_by_channel: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, program) in programs.iter().enumerate() {
            if let Some(channel) = &program.channel {
                programs_by_channel
                    .entry(channel.clone())
                    .or_default()
                    .push(index);
            }
        }

        Self {
            channels,
            programs,
            programs_by_channel,
            display_tz,
        }
    }

    /// Load both tables named in `config`; a missing file is a configuration error
    pub fn load(config: &QueryConfig) -> AppResult<Self> {
        let display_tz =
            parse_display_timezone(&config.display_timezone).map_err(AppError::configuration)?;

        let channels: Vec<PlaylistChannel> = load_table(&config.channels_path)?;
        let programs: Vec<ProgramRecord> = load_table(&config.programs_path)?;
        info!(
            "Loaded catalog: {} channels, {} programs (display timezone {})",
            channels.len(),
            programs.len(),
            display_tz
        );

        Ok(Self::new(channels, programs, display_tz))
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    pub fn display_tz(&self) -> Tz {
        self.display_tz
    }

    /// Distinct non-empty categories in sorted order
    pub fn categories(&self) -> Vec<CategoryView> {
        self.channels
            .iter()
            .filter_map(|channel| channel.category.as_deref())
            .filter(|category| !category.trim().is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|name| CategoryView {
                name: name.to_string(),
            })
            .collect()
    }

    /// Channels in `category`, sorted by name with unnamed channels first
    pub fn channels_in_category(&self, category: &str) -> Vec<PlaylistChannel> {
        let mut channels: Vec<PlaylistChannel> = self
            .channels
            .iter()
            .filter(|channel| channel.category.as_deref() == Some(category))
            .cloned()
            .collect();
        channels.sort_by(|a, b| a.name.cmp(&b.name));
        channels
    }

    /// Programs on `channel` that have not ended by `now`
    ///
    /// Duplicates on (channel, start, title) keep the first row from the
    /// table. Programs without a stop time are skipped.
    pub fn upcoming_programs(&self, channel: &str, now: DateTime<Utc>) -> Vec<ProgramView> {
        let Some(indexes) = self.programs_by_channel.get(channel) else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut upcoming: Vec<(Option<DateTime<Utc>>, ProgramView)> = Vec::new();

        for program in indexes.iter().map(|&index| &self.programs[index]) {
            let Some(stop) = program.stop_time.as_ref().map(|stop| stop.to_utc()) else {
                continue;
            };
            if stop <= now {
                continue;
            }

            let start = program.start_time.as_ref().map(|start| start.to_utc());
            if !seen.insert((start, program.title.clone())) {
                continue;
            }

            upcoming.push((
                start,
                ProgramView {
                    channel: channel.to_string(),
                    start_dt: start.map(|start| to_display_time(start, &self.display_tz)),
                    stop_dt: to_display_time(stop, &self.display_tz),
                    title: program.title.clone(),
                    description: program.description.clone(),
                },
            ));
        }

        upcoming.sort_by_key(|(start, _)| *start);
        upcoming.into_iter().map(|(_, view)| view).collect()
    }
}

fn load_table<T: serde::de::DeserializeOwned>(path: &Path) -> AppResult<Vec<T>> {
    if !path.exists() {
        return Err(AppError::configuration(format!(
            "Input file not found: {}",
            path.display()
        )));
    }
    let format = OutputFormat::from_path(path)?;
    read_records(path, format)
}
