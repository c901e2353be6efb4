use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::model::Geocache;

/// Open an export file for reading, buffered; `*.gz` files are gunzipped on
/// the fly. Dropping the returned reader closes the file.
pub fn open_input(path: &Path) -> std::io::Result<Box<dyn Read + Send>> {
    let file = File::open(path)?;

    if is_compressed(path) {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

pub fn is_compressed(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// Write the imported caches as a pretty-printed JSON array.
pub fn write_caches_json(caches: &[Geocache], output_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(output_path)?);
    serde_json::to_writer_pretty(&mut writer, caches)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    Ok(())
}
