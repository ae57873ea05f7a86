//! Streaming M3U playlist parser
//!
//! Reads an extended M3U playlist line by line. Each `#EXTINF` line is paired
//! with the next non-directive line, which holds the stream URL.

use std::io::BufRead;
use std::iter::FusedIterator;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use super::reporter::{ParseReporter, TracingReporter};
use crate::errors::PlaylistError;
use crate::models::PlaylistChannel;
use crate::utils::{non_empty_trimmed, open_source, SourceReader};

const EXTINF_PREFIX: &str = "#EXTINF:";
const HEADER: &str = "#EXTM3U";

/// Entry point for playlist parsing
#[derive(Clone)]
pub struct M3uParser {
    reporter: Arc<dyn ParseReporter>,
}

impl Default for M3uParser {
    fn default() -> Self {
        Self::new()
    }
}

impl M3uParser {
    pub fn new() -> Self {
        Self::with_reporter(Arc::new(TracingReporter::new("M3U")))
    }

    pub fn with_reporter(reporter: Arc<dyn ParseReporter>) -> Self {
        Self { reporter }
    }

    pub fn parse_file(&self, path: &Path) -> Result<PlaylistStream<SourceReader>, PlaylistError> {
        let source_name = path.display().to_string();
        let reader = open_source(path).map_err(|e| PlaylistError::io(&source_name, e))?;
        Ok(self.parse_reader(reader, source_name))
    }

    pub fn parse_reader<R: BufRead>(
        &self,
        source: R,
        source_name: impl Into<String>,
    ) -> PlaylistStream<R> {
        let source_name = source_name.into();
        self.reporter.started(&source_name);
        PlaylistStream {
            lines: Some(source),
            line: String::new(),
            pending: None,
            header_checked: false,
            source_name,
            processed: 0,
            started: Instant::now(),
            reporter: Arc::clone(&self.reporter),
        }
    }
}

/// Attributes and display name from one `#EXTINF` line
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct ExtInf {
    name: Option<String>,
    logo: Option<String>,
    category: Option<String>,
    guide_id: Option<String>,
}

/// Lazy sequence of playlist channels
pub struct PlaylistStream<R: BufRead> {
    lines: Option<R>,
    line: String,
    pending: Option<ExtInf>,
    header_checked: bool,
    source_name: String,
    processed: usize,
    started: Instant,
    reporter: Arc<dyn ParseReporter>,
}

impl<R: BufRead> PlaylistStream<R> {
    pub fn processed(&self) -> usize {
        self.processed
    }

    fn advance(&mut self) -> Result<Option<PlaylistChannel>, PlaylistError> {
        loop {
            let Some(reader) = self.lines.as_mut() else {
                return Ok(None);
            };

            self.line.clear();
            let read = reader
                .read_line(&mut self.line)
                .map_err(|e| PlaylistError::io(&self.source_name, e))?;
            if read == 0 {
                if self.pending.take().is_some() {
                    debug!("{}: #EXTINF at end of file without a URL", self.source_name);
                }
                return Ok(None);
            }

            let line = self.line.trim_start_matches('\u{feff}').trim();
            if line.is_empty() {
                continue;
            }

            if !self.header_checked {
                self.header_checked = true;
                if !line.starts_with(HEADER) {
                    warn!("{}: missing {} header", self.source_name, HEADER);
                }
            }

            if let Some(rest) = line.strip_prefix(EXTINF_PREFIX) {
                if self.pending.is_some() {
                    debug!("{}: #EXTINF without a URL, skipping", self.source_name);
                }
                self.pending = Some(parse_extinf(rest));
            } else if line.starts_with('#') {
                continue;
            } else if let Some(info) = self.pending.take() {
                return Ok(Some(PlaylistChannel {
                    name: info.name,
                    logo: info.logo,
                    url: line.to_string(),
                    category: info.category,
                    guide_id: info.guide_id,
                }));
            } else {
                debug!("{}: URL without #EXTINF: {}", self.source_name, line);
            }
        }
    }

    fn finish(&mut self) {
        if self.lines.take().is_some() {
            self.reporter
                .finished(&self.source_name, self.processed, self.started.elapsed());
        }
    }
}

impl<R: BufRead> Iterator for PlaylistStream<R> {
    type Item = Result<PlaylistChannel, PlaylistError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(Some(channel)) => {
                self.processed += 1;
                Some(Ok(channel))
            }
            Ok(None) => {
                self.finish();
                None
            }
            Err(e) => {
                self.lines = None;
                Some(Err(e))
            }
        }
    }
}

impl<R: BufRead> FusedIterator for PlaylistStream<R> {}

/// Parse the part of an `#EXTINF` line after the prefix:
/// `-1 tvg-id="..." tvg-logo="..." group-title="...",Channel Name`
fn parse_extinf(rest: &str) -> ExtInf {
    let (attributes_part, name) = match find_unquoted_comma(rest) {
        Some(pos) => (&rest[..pos], &rest[pos + 1..]),
        None => (rest, ""),
    };

    let mut info = ExtInf {
        name: non_empty_trimmed(name),
        ..ExtInf::default()
    };

    for (key, value) in parse_attributes(attributes_part) {
        let value = non_empty_trimmed(&value);
        match key.to_ascii_lowercase().as_str() {
            "tvg-id" => info.guide_id = value,
            "tvg-logo" => info.logo = value,
            "group-title" => info.category = value,
            "tvg-name" if info.name.is_none() => info.name = value,
            _ => {}
        }
    }

    info
}

fn find_unquoted_comma(s: &str) -> Option<usize> {
    let mut in_quotes = false;
    for (i, ch) in s.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => return Some(i),
            _ => {}
        }
    }
    None
}

/// Split `key="value" key2=value2` pairs; bare tokens such as the duration are skipped
fn parse_attributes(attributes: &str) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    let mut current_key = String::new();
    let mut current_value = String::new();
    let mut in_quotes = false;
    let mut in_value = false;

    for ch in attributes.chars() {
        match ch {
            '"' if in_value => in_quotes = !in_quotes,
            '=' if !in_quotes && !in_value => in_value = true,
            ' ' | '\t' if !in_quotes => {
                if in_value {
                    attrs.push((current_key.trim().to_string(), current_value.clone()));
                    in_value = false;
                }
                current_key.clear();
                current_value.clear();
            }
            _ => {
                if in_value {
                    current_value.push(ch);
                } else {
                    current_key.push(ch);
                }
            }
        }
    }

    // Handle last attribute
    if in_value {
        attrs.push((current_key.trim().to_string(), current_value));
    }

    attrs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(content: &str) -> Vec<PlaylistChannel> {
        M3uParser::new()
            .parse_reader(Cursor::new(content.as_bytes().to_vec()), "test.m3u")
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_parse_playlist() {
        let channels = parse(
            "#EXTM3U\n\
             #EXTINF:-1 tvg-id=\"cnn.us\" tvg-logo=\"http://logo/cnn.png\" group-title=\"NEWS\",CNN\n\
             http://stream/cnn\n\
             \n\
             #EXTINF:-1 tvg-id=\"\" group-title=\"USA LOCALS\",WPVI Philadelphia\n\
             #EXTVLCOPT:http-user-agent=test\n\
             http://stream/wpvi\n",
        );

        assert_eq!(channels.len(), 2);
        assert_eq!(
            channels[0],
            PlaylistChannel {
                name: Some("CNN".to_string()),
                logo: Some("http://logo/cnn.png".to_string()),
                url: "http://stream/cnn".to_string(),
                category: Some("NEWS".to_string()),
                guide_id: Some("cnn.us".to_string()),
            }
        );
        assert_eq!(channels[1].name.as_deref(), Some("WPVI Philadelphia"));
        assert_eq!(channels[1].guide_id, None);
        assert_eq!(channels[1].url, "http://stream/wpvi");
    }

    #[test]
    fn test_comma_inside_quotes() {
        let info = parse_extinf("-1 group-title=\"News, Weather\",Local 6");
        assert_eq!(info.category.as_deref(), Some("News, Weather"));
        assert_eq!(info.name.as_deref(), Some("Local 6"));
    }

    #[test]
    fn test_duration_is_not_an_attribute_key() {
        let attrs = parse_attributes("-1 tvg-id=\"a.b\"");
        assert_eq!(attrs, vec![("tvg-id".to_string(), "a.b".to_string())]);
    }

    #[test]
    fn test_unquoted_values() {
        let attrs = parse_attributes("0 tvg-id=abc group-title=\"Two Words\"");
        assert_eq!(
            attrs,
            vec![
                ("tvg-id".to_string(), "abc".to_string()),
                ("group-title".to_string(), "Two Words".to_string()),
            ]
        );
    }

    #[test]
    fn test_extinf_without_url_is_dropped() {
        let channels = parse(
            "#EXTM3U\n#EXTINF:-1,Orphan\n#EXTINF:-1,Kept\nhttp://stream/kept\n#EXTINF:-1,Trailing\n",
        );
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name.as_deref(), Some("Kept"));
    }

    #[test]
    fn test_missing_header_and_bom() {
        let channels = parse("\u{feff}#EXTINF:-1 tvg-name=\"Fallback\",\nhttp://x\n");
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name.as_deref(), Some("Fallback"));
    }
}
