//! Streaming parsers for guide and playlist sources
//!
//! Both parsers hand back lazy iterators. Nothing is buffered beyond the
//! element or line currently being read.

pub mod channel_filter;
pub mod m3u_parser;
pub mod programme;
pub mod reporter;
pub mod xmltv_parser;

pub use channel_filter::ChannelFilter;
pub use m3u_parser::{M3uParser, PlaylistStream};
pub use programme::{extract, ProgrammeElement};
pub use reporter::{ParseReporter, TracingReporter};
pub use xmltv_parser::{ProgrammeStream, XmltvParser, PROGRAMME_ELEMENT, ROOT_ELEMENT};
