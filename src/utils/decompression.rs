use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use tracing::debug;

/// Read buffer for guide files; XMLTV lines are short but documents are large
const SOURCE_BUFFER_SIZE: usize = 64 * 1024;

/// Supported compression formats detected by magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    Gzip,
    Uncompressed,
}

/// Boxed reader handed to the parsers; dropping it closes the file
pub type SourceReader = Box<dyn BufRead + Send>;

/// Magic file detection and streaming decompression
pub struct DecompressionService;

impl DecompressionService {
    /// Detect compression format using magic bytes
    pub fn detect_compression_format(data: &[u8]) -> CompressionFormat {
        match infer::get(data) {
            Some(kind) if kind.mime_type() == "application/gzip" => CompressionFormat::Gzip,
            _ => CompressionFormat::Uncompressed,
        }
    }

    /// Wrap a buffered reader, decompressing on the fly when the content is compressed
    pub fn wrap<R>(mut reader: R) -> io::Result<(SourceReader, CompressionFormat)>
    where
        R: BufRead + Send + 'static,
    {
        let format = Self::detect_compression_format(reader.fill_buf()?);
        match format {
            CompressionFormat::Gzip => Ok((Self::gzip_reader(reader)?, format)),
            CompressionFormat::Uncompressed => Ok((Box::new(reader), format)),
        }
    }

    #[cfg(feature = "compression-gzip")]
    fn gzip_reader<R>(reader: R) -> io::Result<SourceReader>
    where
        R: BufRead + Send + 'static,
    {
        let decoder = flate2::bufread::MultiGzDecoder::new(reader);
        Ok(Box::new(BufReader::with_capacity(SOURCE_BUFFER_SIZE, decoder)))
    }

    #[cfg(not(feature = "compression-gzip"))]
    fn gzip_reader<R>(_reader: R) -> io::Result<SourceReader>
    where
        R: BufRead + Send + 'static,
    {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "gzip input requires the compression-gzip feature",
        ))
    }
}

/// Open a file for parsing, transparently decompressing gzip content
pub fn open_source(path: &Path) -> io::Result<SourceReader> {
    let file = File::open(path)?;
    let (reader, format) =
        DecompressionService::wrap(BufReader::with_capacity(SOURCE_BUFFER_SIZE, file))?;
    debug!("Opened {} (compression: {:?})", path.display(), format);
    Ok(reader)
}
