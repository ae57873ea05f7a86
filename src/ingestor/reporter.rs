//! Parse telemetry
//!
//! Walkers report once when they start and once when they finish. Nothing is
//! reported per record.

use std::time::Duration;

use tracing::{debug, info};

/// Receives start/finish notices from a parse
pub trait ParseReporter: Send + Sync {
    /// A parse of `source` has started
    fn started(&self, source: &str);

    /// A parse of `source` finished normally after `records` records
    fn finished(&self, source: &str, records: usize, elapsed: Duration);

    /// The consumer stopped pulling before the end of `source`
    fn abandoned(&self, source: &str, records: usize, elapsed: Duration) {
        let _ = (source, records, elapsed);
    }
}

/// Default reporter that writes to the tracing subscriber
#[derive(Debug, Clone, Copy)]
pub struct TracingReporter {
    kind: &'static str,
}

impl TracingReporter {
    /// `kind` names the record type in log lines, e.g. "programmes"
    pub fn new(kind: &'static str) -> Self {
        Self { kind }
    }
}

impl ParseReporter for TracingReporter {
    fn started(&self, source: &str) {
        info!("Starting {} parse: {}", self.kind, source);
    }

    fn finished(&self, source: &str, records: usize, elapsed: Duration) {
        info!(
            "Finished {} parse: {} records from {} in {:.3}s",
            self.kind,
            records,
            source,
            elapsed.as_secs_f64()
        );
    }

    fn abandoned(&self, source: &str, records: usize, elapsed: Duration) {
        debug!(
            "Stopped {} parse of {} after {} records ({:.3}s)",
            self.kind,
            source,
            records,
            elapsed.as_secs_f64()
        );
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Notice {
        Started(String),
        Finished(String, usize),
        Abandoned(String, usize),
    }

    /// Collects notices for assertions
    #[derive(Debug, Default)]
    pub struct RecordingReporter {
        pub notices: Mutex<Vec<Notice>>,
    }

    impl RecordingReporter {
        pub fn notices(&self) -> Vec<Notice> {
            self.notices.lock().unwrap().clone()
        }
    }

    impl ParseReporter for RecordingReporter {
        fn started(&self, source: &str) {
            self.notices
                .lock()
                .unwrap()
                .push(Notice::Started(source.to_string()));
        }

        fn finished(&self, source: &str, records: usize, _elapsed: Duration) {
            self.notices
                .lock()
                .unwrap()
                .push(Notice::Finished(source.to_string(), records));
        }

        fn abandoned(&self, source: &str, records: usize, _elapsed: Duration) {
            self.notices
                .lock()
                .unwrap()
                .push(Notice::Abandoned(source.to_string(), records));
        }
    }
}
