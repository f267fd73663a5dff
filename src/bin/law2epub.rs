//! CLI binary for law2epub.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use law2epub::{
    convert, convert_to_file, ConversionConfig, ConversionProgressCallback, ProgressCallback,
    Stage, StorageBackend,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner whose message follows the current
/// stage, plus one log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, document_id: &str) {
        self.bar.set_prefix("Converting");
        self.bar.set_message(document_id.to_string());
    }

    fn on_stage_start(&self, stage: Stage) {
        let msg = match stage {
            Stage::Fetch => "fetching law data…",
            Stage::Extract => "decoding XML…",
            Stage::Transform => "building EPUB…",
            Stage::Publish => "uploading…",
        };
        self.bar.set_message(msg);
    }

    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<10} {}",
            green("✓"),
            stage.to_string(),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_conversion_complete(&self, artifact_path: &str, epub_bytes: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {}  {}",
            green("✔"),
            bold(artifact_path),
            dim(&format!("{epub_bytes} bytes")),
        );
    }

    fn on_conversion_failed(&self, stage: Stage, error: &str) {
        self.bar.finish_and_clear();
        // Truncate very long error messages; the full chain is printed on exit.
        let msg = if error.chars().count() > 80 {
            let head: String = error.chars().take(79).collect();
            format!("{head}\u{2026}")
        } else {
            error.to_string()
        };
        eprintln!("{} {} failed: {}", red("✘"), stage, red(&msg));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a law and upload to the default bucket
  law2epub 129AC0000000089

  # A specific historical revision, under a custom version prefix
  law2epub 129AC0000000089_20230401_503AC0000000037 --epub-version v2.0.0

  # Local run: filesystem storage, keep a copy of the EPUB
  law2epub 129AC0000000089 --storage fs --storage-root ./out -o civil-code.epub

  # Dry run without any bucket, summary as JSON
  law2epub 129AC0000000089 --storage memory --json

STORAGE LAYOUT:
  <bucket>/<version>/<id>.status   JSON status while processing or after failure
  <bucket>/<version>/<id>.epub     the finished EPUB

ENVIRONMENT VARIABLES:
  EPUB_BUCKET_NAME        Bucket to write to (default: epub-storage)
  LAW2EPUB_STORAGE        Storage backend: gcs, fs, memory
  LAW2EPUB_STORAGE_ROOT   Root directory for the fs backend
  LAW2EPUB_API_URL        e-Gov law API v2 base URL
  LAW2EPUB_TRANSFORMER    EPUB builder executable (default: jplaw2epub)
  GCS_ACCESS_TOKEN        Bearer token for GCS (otherwise the metadata server)
  STORAGE_EMULATOR_HOST   Use a GCS emulator, no auth
"#;

/// Convert Japanese laws to EPUB and publish them to object storage.
#[derive(Parser, Debug)]
#[command(
    name = "law2epub",
    version,
    about = "Convert Japanese laws to EPUB and publish them to object storage",
    long_about = "Fetch a law (or a specific revision) from the e-Gov law API, convert it \
to EPUB with an external builder and upload the result to a GCS bucket or a local \
directory. A status record next to the artifact tracks progress and failures.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Law ID, law number, or revision ID (LAWID_DATE_AMENDMENT).
    id: String,

    /// Version prefix for the storage paths.
    #[arg(long = "epub-version", env = "LAW2EPUB_VERSION", default_value = "v1.0.0")]
    epub_version: String,

    /// Bucket (GCS) or top-level directory (fs) to write to.
    #[arg(long, env = "EPUB_BUCKET_NAME", default_value = law2epub::DEFAULT_BUCKET)]
    bucket: String,

    /// Storage backend: gcs, fs, memory.
    #[arg(long, env = "LAW2EPUB_STORAGE", default_value = "gcs",
          value_parser = str::parse::<StorageBackend>)]
    storage: StorageBackend,

    /// Root directory for the fs backend.
    #[arg(long, env = "LAW2EPUB_STORAGE_ROOT", default_value = "storage")]
    storage_root: PathBuf,

    /// e-Gov law API v2 base URL.
    #[arg(long, env = "LAW2EPUB_API_URL")]
    api_url: Option<String>,

    /// Law API request timeout in seconds (none by default).
    #[arg(long, env = "LAW2EPUB_API_TIMEOUT",
          value_parser = clap::value_parser!(u64).range(1..))]
    api_timeout: Option<u64>,

    /// EPUB builder executable.
    #[arg(long, env = "LAW2EPUB_TRANSFORMER")]
    transformer: Option<PathBuf>,

    /// Also write the EPUB to this local file.
    #[arg(short, long, env = "LAW2EPUB_OUTPUT")]
    output: Option<PathBuf>,

    /// Print the conversion summary as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "LAW2EPUB_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "LAW2EPUB_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = shows_progress(&cli);
    let filter = log_filter(&cli);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let version = Some(cli.epub_version.as_str());
    let output = match cli.output {
        Some(ref path) => convert_to_file(&cli.id, version, path, &config).await,
        None => convert(&cli.id, version, &config).await,
    }
    .with_context(|| format!("Conversion of '{}' failed", cli.id))?;

    if let Some(ref path) = cli.output {
        if !cli.quiet {
            eprintln!("   {} {}", dim("local copy →"), bold(&path.display().to_string()));
        }
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet && !show_progress {
        eprintln!(
            "Published {} ({} bytes) in {}ms",
            output.paths.artifact, output.stats.epub_bytes, output.stats.total_duration_ms
        );
    }

    Ok(())
}

/// The spinner runs unless output is quiet, machine-readable, or verbose.
fn shows_progress(cli: &Cli) -> bool {
    !cli.quiet && !cli.json && !cli.verbose
}

/// Default log filter when `RUST_LOG` is unset.
///
/// Under the spinner, library INFO logs would tear it, but status-record
/// warnings still get through.
fn log_filter(cli: &Cli) -> &'static str {
    if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else if shows_progress(cli) {
        "error,law2epub=warn"
    } else {
        "info"
    }
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .bucket(&cli.bucket)
        .default_version(&cli.epub_version)
        .storage(cli.storage)
        .storage_root(&cli.storage_root)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref url) = cli.api_url {
        builder = builder.api_base_url(url);
    }
    if let Some(ref program) = cli.transformer {
        builder = builder.transformer_program(program);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_of(value: &str) -> Result<StorageBackend, clap::Error> {
        Cli::try_parse_from(["law2epub", "129AC0000000089", "--storage", value]).map(|c| c.storage)
    }

    #[test]
    fn storage_flag_accepts_every_backend_alias() {
        for (value, expected) in [
            ("gcs", StorageBackend::Gcs),
            ("gs", StorageBackend::Gcs),
            ("fs", StorageBackend::Filesystem),
            ("filesystem", StorageBackend::Filesystem),
            ("file", StorageBackend::Filesystem),
            ("FS", StorageBackend::Filesystem),
            ("memory", StorageBackend::Memory),
            ("mem", StorageBackend::Memory),
        ] {
            assert_eq!(storage_of(value).unwrap(), expected, "--storage {value}");
            assert_eq!(value.parse::<StorageBackend>().unwrap(), expected);
        }
    }

    #[test]
    fn storage_flag_rejects_unknown_backend() {
        let err = storage_of("s3").unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn spinner_mode_keeps_library_warnings() {
        let parse = |args: &[&str]| {
            let mut argv = vec!["law2epub", "x"];
            argv.extend_from_slice(args);
            Cli::try_parse_from(argv).unwrap()
        };

        let spinner = parse(&[]);
        assert!(shows_progress(&spinner));
        let filter = EnvFilter::new(log_filter(&spinner));
        assert_eq!(filter.max_level_hint(), Some(tracing::Level::WARN.into()));

        assert_eq!(log_filter(&parse(&["--quiet"])), "error");
        assert_eq!(log_filter(&parse(&["--json"])), "info");
        assert_eq!(log_filter(&parse(&["--verbose"])), "debug");
    }

    #[test]
    fn build_config_carries_storage_backend() {
        let cli = Cli::try_parse_from(["law2epub", "x", "--storage", "mem"]).unwrap();
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.storage, StorageBackend::Memory);
    }
}
