//! Quick-XML based streaming XMLTV parser
//!
//! [`ProgrammeStream`] is a pull-based iterator over the `<programme>`
//! elements of an XMLTV document. It reads one event at a time, keeps only
//! the programmes currently open, and hands each finished element to
//! [`extract`]. Memory use is bounded by the largest single programme, not
//! by the size of the document.
//!
//! The root element is checked while the stream is being constructed, so a
//! document that is not XMLTV fails before a single record is produced. The
//! source is read to its end after the root closes; anything but comments,
//! processing instructions and whitespace there is an error.

use std::io::BufRead;
use std::iter::FusedIterator;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, warn};

use super::programme::{extract, ProgrammeElement};
use super::reporter::{ParseReporter, TracingReporter};
use crate::errors::{XmltvError, XmltvResult};
use crate::models::ProgramRecord;
use crate::utils::{open_source, SourceReader};

/// Required outermost element
pub const ROOT_ELEMENT: &str = "tv";

/// Element holding one scheduled broadcast
pub const PROGRAMME_ELEMENT: &str = "programme";

/// Entry point for XMLTV parsing
#[derive(Clone)]
pub struct XmltvParser {
    reporter: Arc<dyn ParseReporter>,
}

impl Default for XmltvParser {
    fn default() -> Self {
        Self::new()
    }
}

impl XmltvParser {
    pub fn new() -> Self {
        Self::with_reporter(Arc::new(TracingReporter::new("XMLTV")))
    }

    pub fn with_reporter(reporter: Arc<dyn ParseReporter>) -> Self {
        Self { reporter }
    }

    /// Open a guide file (plain or gzip) and validate its root element
    pub fn parse_file(&self, path: &Path) -> XmltvResult<ProgrammeStream<SourceReader>> {
        let source_name = path.display().to_string();
        let reader = open_source(path).map_err(|e| XmltvError::io(&source_name, e))?;
        self.parse_reader(reader, source_name)
    }

    /// Stream programmes from any buffered reader
    pub fn parse_reader<R: BufRead>(
        &self,
        source: R,
        source_name: impl Into<String>,
    ) -> XmltvResult<ProgrammeStream<R>> {
        ProgrammeStream::open(source, source_name.into(), Arc::clone(&self.reporter))
    }

    /// Parse a whole guide into memory
    pub fn parse_all(&self, path: &Path) -> XmltvResult<Vec<ProgramRecord>> {
        self.parse_file(path)?.collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkState {
    BeforeRoot,
    InRoot,
    Done,
    Failed,
}

/// Outcome of feeding one event to the cursor
enum Step {
    Continue,
    Emit(ProgramRecord),
    Finished,
}

/// Text being collected for a direct child of the open programme
struct ChildCapture {
    name: String,
    text: String,
    // cleared once a nested element starts; later text is not part of it
    open: bool,
}

struct OpenProgramme {
    element: ProgrammeElement,
    depth: usize,
    capture: Option<ChildCapture>,
}

/// Tracks element depth and the programmes under construction
///
/// Programmes nest in malformed guides; the innermost open one receives
/// child text and each is emitted when its own end tag is reached.
#[derive(Default)]
struct DocumentCursor {
    depth: usize,
    programmes: Vec<OpenProgramme>,
}

impl DocumentCursor {
    fn handle(&mut self, event: Event<'_>, position: u64) -> XmltvResult<Step> {
        match event {
            Event::Start(e) => {
                self.depth += 1;
                self.on_start(&e, position)?;
                Ok(Step::Continue)
            }
            Event::Empty(e) => self.on_empty(&e, position),
            Event::End(_) => Ok(self.on_end()),
            Event::Text(e) => {
                if self.capturing() {
                    let text = e.unescape().map_err(|err| markup(position, err))?;
                    self.push_text(&text);
                }
                Ok(Step::Continue)
            }
            Event::CData(e) => {
                if self.capturing() {
                    let text = std::str::from_utf8(&e).map_err(|source| XmltvError::Encoding {
                        context: "CDATA",
                        source,
                    })?;
                    self.push_text(text);
                }
                Ok(Step::Continue)
            }
            Event::Eof => Err(XmltvError::Truncated {
                element: ROOT_ELEMENT.to_string(),
            }),
            _ => Ok(Step::Continue),
        }
    }

    fn on_start(&mut self, e: &BytesStart<'_>, position: u64) -> XmltvResult<()> {
        let depth = self.depth;
        if e.name().as_ref() == PROGRAMME_ELEMENT.as_bytes() {
            self.interrupt_capture();
            self.programmes.push(OpenProgramme {
                element: programme_from_attributes(e, position)?,
                depth,
                capture: None,
            });
            return Ok(());
        }

        match self.is_direct_child(depth) {
            Some(true) => {
                let name = element_name(e)?;
                if let Some(open) = self.programmes.last_mut() {
                    if !open.element.has_child(&name) {
                        open.capture = Some(ChildCapture {
                            name,
                            text: String::new(),
                            open: true,
                        });
                    }
                }
            }
            Some(false) => self.interrupt_capture(),
            None => {}
        }
        Ok(())
    }

    fn on_empty(&mut self, e: &BytesStart<'_>, position: u64) -> XmltvResult<Step> {
        let depth = self.depth + 1;
        if e.name().as_ref() == PROGRAMME_ELEMENT.as_bytes() {
            self.interrupt_capture();
            let element = programme_from_attributes(e, position)?;
            return Ok(Step::Emit(extract(&element)));
        }

        match self.is_direct_child(depth) {
            Some(true) => {
                let name = element_name(e)?;
                if let Some(open) = self.programmes.last_mut() {
                    open.element.insert_child(name, None);
                }
            }
            Some(false) => self.interrupt_capture(),
            None => {}
        }
        Ok(Step::Continue)
    }

    fn on_end(&mut self) -> Step {
        let depth = self.depth;
        self.depth = self.depth.saturating_sub(1);

        let closes_programme = self
            .programmes
            .last()
            .map_or(false, |open| open.depth == depth);
        if closes_programme {
            if let Some(open) = self.programmes.pop() {
                return Step::Emit(extract(&open.element));
            }
        }

        if let Some(open) = self.programmes.last_mut() {
            if depth == open.depth + 1 {
                if let Some(capture) = open.capture.take() {
                    open.element.insert_child(capture.name, Some(capture.text));
                }
            }
        }

        if self.depth == 0 {
            Step::Finished
        } else {
            Step::Continue
        }
    }

    /// Whether an element at `depth` is a direct child of the innermost
    /// programme; `None` outside any programme
    fn is_direct_child(&self, depth: usize) -> Option<bool> {
        self.programmes.last().map(|open| depth == open.depth + 1)
    }

    /// A nested element ends the text run of the child being captured
    fn interrupt_capture(&mut self) {
        if let Some(capture) = self
            .programmes
            .last_mut()
            .and_then(|open| open.capture.as_mut())
        {
            capture.open = false;
        }
    }

    fn capturing(&self) -> bool {
        self.programmes
            .last()
            .and_then(|open| open.capture.as_ref())
            .map_or(false, |capture| capture.open)
    }

    fn push_text(&mut self, text: &str) {
        if let Some(capture) = self
            .programmes
            .last_mut()
            .and_then(|open| open.capture.as_mut())
        {
            capture.text.push_str(text);
        }
    }
}

/// Whitespace, optionally preceded by a UTF-8 byte order mark
fn is_blank(text: &[u8]) -> bool {
    let text = text.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(text);
    text.iter().all(u8::is_ascii_whitespace)
}

fn markup(position: u64, err: quick_xml::Error) -> XmltvError {
    XmltvError::Markup {
        position,
        source: err,
    }
}

fn element_name(e: &BytesStart<'_>) -> XmltvResult<String> {
    std::str::from_utf8(e.name().as_ref())
        .map(str::to_string)
        .map_err(|source| XmltvError::Encoding {
            context: "element name",
            source,
        })
}

fn programme_from_attributes(e: &BytesStart<'_>, position: u64) -> XmltvResult<ProgrammeElement> {
    let mut element = ProgrammeElement::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| markup(position, err.into()))?;
        let key = std::str::from_utf8(attr.key.as_ref()).map_err(|source| {
            XmltvError::Encoding {
                context: "attribute name",
                source,
            }
        })?;
        let value = attr.unescape_value().map_err(|err| markup(position, err))?;
        element.set_attribute(key, value.into_owned());
    }
    Ok(element)
}

/// Lazy, single-pass sequence of programme records
///
/// Dropping the stream closes the source. Once the root element closes, or an
/// error is returned, the source is released and the stream yields nothing
/// further.
pub struct ProgrammeStream<R: BufRead> {
    reader: Option<Reader<R>>,
    buf: Vec<u8>,
    cursor: DocumentCursor,
    state: WalkState,
    source_name: String,
    processed: usize,
    started: Instant,
    reporter: Arc<dyn ParseReporter>,
}

impl<R: BufRead> ProgrammeStream<R> {
    fn open(source: R, source_name: String, reporter: Arc<dyn ParseReporter>) -> XmltvResult<Self> {
        reporter.started(&source_name);

        let mut stream = Self {
            reader: Some(Reader::from_reader(source)),
            buf: Vec::new(),
            cursor: DocumentCursor::default(),
            state: WalkState::BeforeRoot,
            source_name,
            processed: 0,
            started: Instant::now(),
            reporter,
        };

        if let Err(e) = stream.enter_root() {
            stream.fail(&e);
            return Err(e);
        }
        Ok(stream)
    }

    /// Number of records yielded so far
    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Whether the source handle is still held
    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    fn enter_root(&mut self) -> XmltvResult<()> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(());
        };

        loop {
            self.buf.clear();
            let event = reader.read_event_into(&mut self.buf).map_err(|e| {
                XmltvError::from_reader(&self.source_name, reader.buffer_position() as u64, e)
            })?;

            let position = reader.buffer_position() as u64;

            match event {
                Event::Start(e) => {
                    check_root(&e)?;
                    self.cursor.depth = 1;
                    self.state = WalkState::InRoot;
                    return Ok(());
                }
                Event::Empty(e) => {
                    check_root(&e)?;
                    debug!("{} has an empty <{}> root", self.source_name, ROOT_ELEMENT);
                    self.state = WalkState::InRoot;
                    self.check_epilogue()?;
                    self.finish();
                    return Ok(());
                }
                Event::Eof => {
                    return Err(XmltvError::MissingRoot {
                        expected: ROOT_ELEMENT.to_string(),
                    });
                }
                Event::Text(text) if !is_blank(&text) => {
                    return Err(XmltvError::TextBeforeRoot { position });
                }
                Event::CData(_) => return Err(XmltvError::TextBeforeRoot { position }),
                // declaration, doctype, comments, processing instructions, whitespace
                _ => {}
            }
        }
    }

    /// Read to the end of the source after the root closes; only comments,
    /// processing instructions and whitespace may follow it
    fn check_epilogue(&mut self) -> XmltvResult<()> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(());
        };

        loop {
            self.buf.clear();
            let event = reader.read_event_into(&mut self.buf).map_err(|e| {
                XmltvError::from_reader(&self.source_name, reader.buffer_position() as u64, e)
            })?;
            let position = reader.buffer_position() as u64;

            match event {
                Event::Eof => return Ok(()),
                Event::Comment(_) | Event::PI(_) => {}
                Event::Text(text) if is_blank(&text) => {}
                _ => return Err(XmltvError::TrailingContent { position }),
            }
        }
    }

    fn advance(&mut self) -> XmltvResult<Option<ProgramRecord>> {
        loop {
            let Some(reader) = self.reader.as_mut() else {
                return Ok(None);
            };

            self.buf.clear();
            let event = reader.read_event_into(&mut self.buf).map_err(|e| {
                XmltvError::from_reader(&self.source_name, reader.buffer_position() as u64, e)
            })?;
            let position = reader.buffer_position() as u64;

            match self.cursor.handle(event, position)? {
                Step::Continue => {}
                Step::Emit(record) => return Ok(Some(record)),
                Step::Finished => {
                    self.check_epilogue()?;
                    return Ok(None);
                }
            }
        }
    }

    fn finish(&mut self) {
        self.reader = None;
        self.buf = Vec::new();
        if self.state == WalkState::InRoot {
            self.state = WalkState::Done;
            self.reporter
                .finished(&self.source_name, self.processed, self.started.elapsed());
        }
    }

    fn fail(&mut self, error: &XmltvError) {
        warn!(
            "XMLTV parse of {} failed after {} programmes: {}",
            self.source_name, self.processed, error
        );
        self.reader = None;
        self.buf = Vec::new();
        self.cursor = DocumentCursor::default();
        self.state = WalkState::Failed;
    }
}

fn check_root(e: &BytesStart<'_>) -> XmltvResult<()> {
    if e.name().as_ref() == ROOT_ELEMENT.as_bytes() {
        Ok(())
    } else {
        let found = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        Err(XmltvError::unexpected_root(ROOT_ELEMENT, found))
    }
}

impl<R: BufRead> Iterator for ProgrammeStream<R> {
    type Item = XmltvResult<ProgramRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != WalkState::InRoot {
            return None;
        }

        match self.advance() {
            Ok(Some(record)) => {
                self.processed += 1;
                Some(Ok(record))
            }
            Ok(None) => {
                self.finish();
                None
            }
            Err(e) => {
                self.fail(&e);
                Some(Err(e))
            }
        }
    }
}

impl<R: BufRead> FusedIterator for ProgrammeStream<R> {}

impl<R: BufRead> Drop for ProgrammeStream<R> {
    fn drop(&mut self) {
        if self.state == WalkState::InRoot {
            self.reporter
                .abandoned(&self.source_name, self.processed, self.started.elapsed());
        }
    }
}
