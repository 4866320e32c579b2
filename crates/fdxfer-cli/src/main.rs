//! fdxfer - move bytes between descriptors with kernel-side copies
//!
//! Copies a file, pipe or socket stream to another descriptor using
//! `copy_file_range(2)`, `sendfile(2)` or `splice(2)` where the kernel
//! allows it, and a buffered loop everywhere else.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use console::{style, Term};
use fdxfer_config::{Config, ConfigLoader, LoggingConfig};
use fdxfer_types::{BufferSize, TransferOptions};
use fdxfer_zerocopy::{Copier, Endpoint};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

mod display;
mod json_output;

use display::{display_endpoint, display_report};
use json_output::{to_json_string, EndpointJson, TransferResultJson};

/// Path argument meaning stdin or stdout
const STDIO: &str = "-";

/// fdxfer - descriptor-to-descriptor copies without user-space buffering
#[derive(Parser)]
#[command(
    name = "fdxfer",
    version = env!("CARGO_PKG_VERSION"),
    about = "Copy data between files, pipes and sockets using kernel-side transfers",
    long_about = "fdxfer copies a data stream from one descriptor to another.\n\
                  Between regular files it uses copy_file_range, from files to pipes\n\
                  and sockets it uses sendfile, and around pipes and sockets it uses\n\
                  splice, falling back to a buffered read/write loop otherwise."
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Quiet mode - minimal output
    #[arg(short, long)]
    quiet: bool,

    /// Verbose mode - detailed output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy a stream from SOURCE to DEST (`-` for stdin/stdout)
    Copy {
        /// Source path, `-` for stdin
        source: PathBuf,
        /// Destination path, `-` for stdout
        destination: PathBuf,
        /// Copy at most this many bytes
        #[arg(short, long)]
        limit: Option<u64>,
        /// Append to the destination instead of truncating it
        #[arg(short, long)]
        append: bool,
        /// Disable copy_file_range
        #[arg(long)]
        no_range_copy: bool,
        /// Disable sendfile
        #[arg(long)]
        no_sendfile: bool,
        /// Disable splice
        #[arg(long)]
        no_splice: bool,
        /// Buffer size for the read/write fallback, in bytes
        #[arg(short, long)]
        buffer_size: Option<usize>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show how a path's descriptor is classified
    Probe {
        /// Path to probe, `-` for stdin
        path: PathBuf,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

/// Engine switches given on the command line
#[derive(Debug, Default, Clone, Copy)]
struct MethodOverrides {
    no_range_copy: bool,
    no_sendfile: bool,
    no_splice: bool,
    buffer_size: Option<usize>,
}

impl MethodOverrides {
    fn apply(self, mut options: TransferOptions) -> Result<TransferOptions> {
        if self.no_range_copy {
            options.enable_range_copy = false;
        }
        if self.no_sendfile {
            options.enable_sendfile = false;
        }
        if self.no_splice {
            options.enable_splice = false;
        }
        if let Some(size) = self.buffer_size {
            options.buffer_size = BufferSize::new(size).map_err(|e| anyhow!(e))?;
        }
        Ok(options)
    }
}

trait Source: Read + AsFd {}
impl<T: Read + AsFd> Source for T {}

trait Sink: Write + AsFd {}
impl<T: Write + AsFd> Sink for T {}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_logging(cli.debug, cli.quiet, cli.verbose, &config.logging)?;

    info!("fdxfer v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Copy {
            source,
            destination,
            limit,
            append,
            no_range_copy,
            no_sendfile,
            no_splice,
            buffer_size,
            json,
        } => {
            let overrides = MethodOverrides {
                no_range_copy,
                no_sendfile,
                no_splice,
                buffer_size,
            };
            let options = overrides.apply(config.transfer.to_options())?;
            copy_command(&source, &destination, limit, append, options, json, cli.quiet)?;
        }
        Commands::Probe { path, json } => {
            probe_command(&path, json)?;
        }
        Commands::Config { default } => {
            config_command(&config, default)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => ConfigLoader::load_from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => ConfigLoader::load_default().context("failed to load configuration")?,
    };
    Ok(config)
}

fn init_logging(debug: bool, quiet: bool, verbose: bool, logging: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else if quiet {
        "error"
    } else {
        logging.level.as_str()
    };

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    // stdout may carry the copied data
    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let result = if logging.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow!("failed to initialize logging: {}", e))
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == STDIO
}

fn open_source(path: &Path) -> Result<Box<dyn Source>> {
    if is_stdio(path) {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file =
        File::open(path).with_context(|| format!("failed to open source {}", path.display()))?;
    Ok(Box::new(file))
}

fn open_destination(path: &Path, append: bool) -> Result<Box<dyn Sink>> {
    if is_stdio(path) {
        return Ok(Box::new(io::stdout().lock()));
    }
    let mut options = OpenOptions::new();
    options.create(true);
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    let file = options
        .open(path)
        .with_context(|| format!("failed to open destination {}", path.display()))?;
    Ok(Box::new(file))
}

fn copy_command(
    source: &Path,
    destination: &Path,
    limit: Option<u64>,
    append: bool,
    options: TransferOptions,
    json: bool,
    quiet: bool,
) -> Result<()> {
    info!("Starting copy operation");
    info!("Source: {}", source.display());
    info!("Destination: {}", destination.display());
    debug!("Options: {:?}", options);

    // Keep the report off the data stream
    let term = if is_stdio(destination) {
        Term::stderr()
    } else {
        Term::stdout()
    };

    if !quiet && !json {
        term.write_line(&format!(
            "{} Copying {} to {}",
            style("→").green().bold(),
            style(source.display()).cyan(),
            style(destination.display()).cyan()
        ))?;
    }

    let mut src = open_source(source)?;
    let mut dst = open_destination(destination, append)?;

    let copier = Copier::with_options(options);
    let started = Instant::now();
    let report = copier
        .transfer_report(&mut *dst, &mut *src, limit)
        .with_context(|| {
            format!(
                "failed to copy {} to {}",
                source.display(),
                destination.display()
            )
        })?;
    dst.flush().context("failed to flush destination")?;
    let elapsed = started.elapsed();

    info!(
        "Copied {} bytes ({} accelerated)",
        report.bytes,
        report.accelerated_bytes()
    );

    if json {
        let output = TransferResultJson::new(
            &source.display().to_string(),
            &destination.display().to_string(),
            report,
            elapsed,
        );
        term.write_line(&to_json_string(&output)?)?;
    } else if !quiet {
        display_report(&term, &report, elapsed)?;
    }

    Ok(())
}

fn probe_command(path: &Path, json: bool) -> Result<()> {
    info!("Probing {}", path.display());
    let term = Term::stdout();
    let label = path.display().to_string();

    let file;
    let stdin = io::stdin();
    let fd = if is_stdio(path) {
        stdin.as_fd()
    } else {
        file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        file.as_fd()
    };

    let endpoint = Endpoint::probe(fd).with_context(|| format!("failed to probe {}", label))?;

    if json {
        term.write_line(&to_json_string(&EndpointJson::new(&label, &endpoint))?)?;
    } else {
        display_endpoint(&term, &label, &endpoint)?;
    }
    Ok(())
}

fn config_command(config: &Config, default: bool) -> Result<()> {
    let term = Term::stdout();
    let (title, yaml) = if default {
        ("Default configuration:", ConfigLoader::to_yaml(&Config::default())?)
    } else {
        ("Current configuration:", ConfigLoader::to_yaml(config)?)
    };

    term.write_line(&format!("{} {}", style("⚙").blue().bold(), title))?;
    if !default {
        match ConfigLoader::config_exists() {
            Some(path) => term.write_line(&format!(
                "  {}",
                style(format!("loaded from {}", path.display())).dim()
            ))?,
            None => term.write_line(&format!(
                "  {}",
                style("No configuration file found, using defaults").dim()
            ))?,
        }
    }
    term.write_str(&yaml)?;
    term.flush()?;
    Ok(())
}
