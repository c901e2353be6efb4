//! Import geocaches from GPX and LOC export files.
//!
//! Every format parser implements [`CacheParser`] and shares the same
//! streaming, progress and cancellation behaviour: progress is reported in
//! bytes consumed, cancellation is polled at line or record boundaries and
//! surfaces as [`ImportError::Cancelled`], separate from I/O and format
//! failures.

pub mod config;
pub mod error;
pub mod import;
pub mod io;
pub mod model;
pub mod parsers;
pub mod progress;

pub use error::{ImportError, Result};
pub use import::{ImportSummary, discover_files, import_directory, import_file};
pub use io::is_compressed;
pub use model::{CacheSize, CacheType, Geocache, Trackable};
pub use parsers::{
    CacheParser, finalize_record, gpx::GpxParser, loc::LocParser, parser_for_path,
    read_all_text, report_progress,
};
pub use progress::{
    CancellationToken, CombinedProgress, FileProgress, ProgressHandler, ProgressTrackingReader,
};
