use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use geocache_import::config::Config;
use geocache_import::io::{is_compressed, write_caches_json};
use geocache_import::{
    CancellationToken, Geocache, ImportError, ProgressHandler, import_directory, import_file,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Byte progress of a single-file import, drawn with indicatif.
struct BarProgress {
    bar: ProgressBar,
    token: CancellationToken,
}

impl ProgressHandler for BarProgress {
    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    fn notify_progress(&self, bytes_read: u64) {
        self.bar.set_position(bytes_read);
    }
}

fn init_tracing(default_filter: &str) {
    // RUST_LOG overrides the configured filter
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let config = Config::load()?;
    init_tracing(&config.log_filter);

    let input = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| config.data_dir.clone());

    if !input.exists() {
        bail!("Input path {} does not exist", input.display());
    }

    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    ctrlc::set_handler(move || {
        warn!("Interrupted, stopping import...");
        on_interrupt.cancel();
    })?;

    let result = if input.is_dir() {
        import_directory(&input, Some(&token)).map(|summary| {
            for (path, e) in &summary.failures {
                warn!("Skipped {}: {}", path.display(), e);
            }
            summary.deduplicated()
        })
    } else {
        import_single(&input, token)
    };

    let caches = match result {
        Ok(caches) => caches,
        Err(ImportError::Cancelled) => {
            warn!("Import cancelled, nothing written");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    info!("--- Summary ---");
    info!("Collected {} caches", caches.len());
    let with_inventory = caches.iter().filter(|c| c.inventory_items > 0).count();
    info!("{} caches hold trackables", with_inventory);

    if caches.is_empty() {
        info!("No caches to write.");
        return Ok(());
    }

    write_caches_json(&caches, &config.output_path)?;
    info!(
        "✓ Successfully wrote {} caches to {}",
        caches.len(),
        config.output_path.display()
    );

    Ok(())
}

fn import_single(path: &Path, token: CancellationToken) -> geocache_import::Result<Vec<Geocache>> {
    // compressed inputs report decompressed bytes, so the file size is no bound
    let bar = match std::fs::metadata(path) {
        Ok(meta) if !is_compressed(path) => ProgressBar::new(meta.len()),
        _ => ProgressBar::new_spinner(),
    };
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {bytes}/{total_bytes} {msg}") {
        bar.set_style(style);
    }

    let progress = BarProgress { bar, token };
    let result = import_file(path, Some(&progress));
    progress.bar.finish_and_clear();
    result
}
