pub mod gpx;
pub mod loc;
mod xml;

use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use chrono::Utc;

use crate::error::{ImportError, Result};
use crate::io::open_input;
use crate::model::Geocache;
use crate::progress::{ProgressHandler, ProgressTrackingReader};

use gpx::GpxParser;
use loc::LocParser;

// extract Vec<Geocache> from different export formats
pub trait CacheParser: Send + Sync {
    /// Parse every cache in `stream`, in document order.
    ///
    /// Fails with [`ImportError::Io`] if the stream can't be read,
    /// [`ImportError::Format`] if the content doesn't match the format, and
    /// [`ImportError::Cancelled`] once `progress` reports a cancellation.
    fn parse(
        &self,
        stream: &mut dyn Read,
        progress: Option<&dyn ProgressHandler>,
    ) -> Result<Vec<Geocache>>;

    /// Convenience wrapper opening `path` (gunzipping `*.gz`). The file is
    /// closed when this returns, whatever the outcome.
    fn parse_file(
        &self,
        path: &Path,
        progress: Option<&dyn ProgressHandler>,
    ) -> Result<Vec<Geocache>> {
        let mut stream = open_input(path)?;
        self.parse(&mut stream, progress)
    }

    fn name(&self) -> &'static str;
}

/// Read the whole stream as UTF-8 text, one line at a time, reporting the
/// cumulative byte count after every line. Invalid sequences become U+FFFD.
pub fn read_all_text(
    stream: &mut dyn Read,
    progress: Option<&dyn ProgressHandler>,
) -> Result<String> {
    let mut input = BufReader::new(ProgressTrackingReader::new(stream));
    let mut buffer = String::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        if input.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        let text = String::from_utf8_lossy(&line);
        buffer.push_str(text.trim_end_matches(['\n', '\r']));
        buffer.push('\n');
        report_progress(progress, input.get_ref().bytes_read())?;
    }

    Ok(buffer)
}

/// Poll for cancellation, then forward the byte count.
pub fn report_progress(progress: Option<&dyn ProgressHandler>, bytes_read: u64) -> Result<()> {
    if let Some(handler) = progress {
        if handler.is_cancelled() {
            return Err(ImportError::Cancelled);
        }
        handler.notify_progress(bytes_read);
    }
    Ok(())
}

/// Normalize a freshly parsed record. Call exactly once per record, after
/// every other field is populated.
pub fn finalize_record(cache: &mut Geocache) {
    cache.inventory_items = cache.inventory.as_ref().map_or(0, Vec::len);
    let now = Utc::now();
    cache.updated = Some(now);
    cache.detailed_update = Some(now);
}

type ParserEntry = (&'static str, fn() -> Box<dyn CacheParser>);

static FILE_PARSERS: &[ParserEntry] = &[
    ("gpx", || Box::new(GpxParser)),
    ("loc", || Box::new(LocParser)),
];

/// Pick a parser from the file name; a trailing `.gz` is looked through.
pub fn parser_for_path(path: &Path) -> Option<Box<dyn CacheParser>> {
    let file_name = path.file_name()?.to_str()?.to_ascii_lowercase();
    let file_name = file_name.strip_suffix(".gz").unwrap_or(&file_name);
    let extension = Path::new(file_name).extension()?.to_str()?;

    FILE_PARSERS
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, factory)| factory())
}
