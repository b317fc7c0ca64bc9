//! Configuration types for fanscan
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation (`PipelineConfig`, `WalkConfig`)
//!
//! Configuration is built once at startup and passed by reference into the
//! walker, the worker pool and the collector. Nothing here is global.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::cancel::StopSignal;
use crate::error::ScanError;
use crate::filter::NameFilter;

/// Hard ceiling on the pool size. Every worker holds at most one open file,
/// and this stays well below the usual 1024 descriptor limit.
pub const MAX_WORKERS: usize = 512;

/// Longest accepted wall-clock timeout.
pub const MAX_TIMEOUT_SECS: u64 = 300;

/// Workers per logical CPU. Hashing and grepping wait on I/O far more than
/// they compute.
pub const DEFAULT_MULTIPLIER: usize = 2;

/// Work-queue slots per worker when no capacity is given.
pub(crate) const QUEUE_SLOTS_PER_WORKER: usize = 4;

/// Directory-name fragments skipped by default.
pub const DEFAULT_SKIP_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".bzr",
    "node_modules",
    "vendor",
    "target",
    "__pycache__",
    ".cache",
];

// ---------------------------------------------------------------------------
// WalkConfig
// ---------------------------------------------------------------------------

/// Traversal parameters handed to a [`Source`](crate::Source).
#[derive(Debug, Clone)]
pub struct WalkConfig {
    /// `0` is the root only, `1` one level of children, and so on.
    pub max_depth: Option<usize>,

    /// Files larger than this many bytes are skipped.
    pub max_file_size: Option<u64>,

    /// A directory whose name contains any of these fragments is skipped
    /// along with everything beneath it.
    pub skip_dirs: Vec<String>,

    pub name_filter: NameFilter,

    /// Checked for every entry the source visits. The engine installs its
    /// own signal before walking; the default never fires.
    pub stop: StopSignal,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            max_depth:     None,
            max_file_size: None,
            skip_dirs:     DEFAULT_SKIP_DIRS.iter().map(|s| s.to_string()).collect(),
            name_filter:   NameFilter::Any,
            stop:          StopSignal::default(),
        }
    }
}

impl WalkConfig {
    /// Whether a directory name hits the deny-list.
    pub fn is_skipped_dir(&self, name: &str) -> bool {
        self.skip_dirs.iter().any(|frag| name.contains(frag.as_str()))
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Pool sizing and deadline for one run. Read-only once the run starts.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub workers:        usize,
    pub queue_capacity: usize,
    pub timeout:        Option<Duration>,
    pub walk:           WalkConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let workers = default_workers(DEFAULT_MULTIPLIER);
        Self {
            workers,
            queue_capacity: workers * QUEUE_SLOTS_PER_WORKER,
            timeout:        None,
            walk:           WalkConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Validate CLI arguments into a pipeline configuration.
    ///
    /// The name filter comes from the subcommand and is left as
    /// [`NameFilter::Any`] here.
    pub fn from_args(args: &CliArgs) -> Result<Self, ScanError> {
        if args.multiplier == 0 {
            return Err(ScanError::InvalidConfig("multiplier must be at least 1".into()));
        }

        let workers = match args.workers {
            Some(n) if n > MAX_WORKERS => return Err(ScanError::InvalidThreadCount(n)),
            Some(n) => n.max(1),
            None    => default_workers(args.multiplier),
        };

        let queue_capacity = args
            .queue_size
            .unwrap_or(workers * QUEUE_SLOTS_PER_WORKER)
            .max(1);

        let timeout = validate_timeout(args.timeout)?;

        let mut skip_dirs: Vec<String> = if args.no_default_skips {
            Vec::new()
        } else {
            DEFAULT_SKIP_DIRS.iter().map(|s| s.to_string()).collect()
        };
        skip_dirs.extend(args.skip_dirs.iter().cloned());

        Ok(Self {
            workers,
            queue_capacity,
            timeout,
            walk: WalkConfig {
                max_depth:     args.max_depth,
                max_file_size: args.max_size,
                skip_dirs,
                name_filter:   NameFilter::Any,
                stop:          StopSignal::default(),
            },
        })
    }
}

/// Logical CPUs × `multiplier`, clamped to `1..=MAX_WORKERS`.
pub fn default_workers(multiplier: usize) -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    cpus.saturating_mul(multiplier).clamp(1, MAX_WORKERS)
}

/// `None` and `Some(0)` disable the deadline.
pub fn validate_timeout(secs: Option<u64>) -> Result<Option<Duration>, ScanError> {
    match secs {
        None | Some(0) => Ok(None),
        Some(s) if s > MAX_TIMEOUT_SECS => Err(ScanError::InvalidConfig(format!(
            "timeout of {s}s exceeds the maximum of {MAX_TIMEOUT_SECS}s"
        ))),
        Some(s) => Ok(Some(Duration::from_secs(s))),
    }
}

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Bounded concurrent file scanner
#[derive(Parser, Debug, Clone)]
#[command(
    name = "fanscan",
    version,
    about = "Bounded concurrent file scanner: grep, find-by-hash and checksum verification",
    after_help = "EXAMPLES:\n    \
        fanscan grep 'fn main' src\n    \
        fanscan grep -i todo . --exclude 'TODO\\(done\\)' -g '*.rs'\n    \
        fanscan find-hash 9e107d9d372bb6826bd81d3542a419d6 ~/Downloads\n    \
        fanscan verify SHA256SUMS -t 120"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Fixed number of workers (overrides --multiplier)
    #[arg(short = 'w', long, value_name = "NUM", global = true)]
    pub workers: Option<usize>,

    /// Workers per logical CPU
    #[arg(short = 'm', long, default_value_t = DEFAULT_MULTIPLIER, value_name = "NUM", global = true)]
    pub multiplier: usize,

    /// Work queue capacity (defaults to 4 slots per worker)
    #[arg(long, value_name = "NUM", global = true)]
    pub queue_size: Option<usize>,

    /// Wall-clock timeout in seconds (max 300)
    #[arg(short = 't', long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Skip files larger than this many bytes
    #[arg(long, value_name = "BYTES", global = true)]
    pub max_size: Option<u64>,

    /// Maximum directory depth (unlimited if not set)
    #[arg(short = 'd', long, value_name = "NUM", global = true)]
    pub max_depth: Option<usize>,

    /// Skip directories whose name contains this fragment (can be repeated)
    #[arg(long = "skip-dir", value_name = "FRAGMENT", action = ArgAction::Append, global = true)]
    pub skip_dirs: Vec<String>,

    /// Do not skip .git, node_modules, vendor and friends
    #[arg(long, global = true)]
    pub no_default_skips: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print every line matching a regular expression
    Grep {
        /// Regular expression applied to each line
        #[arg(value_name = "PATTERN")]
        pattern: String,

        /// Directory or file to scan
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,

        /// Suppress lines that also match this expression
        #[arg(short = 'x', long, value_name = "PATTERN")]
        exclude: Option<String>,

        /// Case-insensitive matching
        #[arg(short = 'i', long)]
        ignore_case: bool,

        #[command(flatten)]
        names: NameArgs,
    },

    /// Report which files hash to the given digest (md5, sha1, sha256, sha384, sha512)
    FindHash {
        /// Expected hex digest; its length selects the algorithm
        #[arg(value_name = "HASH")]
        hash: String,

        /// Directory or file to scan
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        names: NameArgs,
    },

    /// Check every file named in a checksum listing
    Verify {
        /// Listing with one "hash filename" or "filename hash" pair per line
        #[arg(value_name = "LISTING")]
        listing: PathBuf,
    },
}

/// File-name filter flags shared by the directory-walking subcommands.
#[derive(Args, Debug, Clone, Default)]
pub struct NameArgs {
    /// Only scan files whose name matches this glob
    #[arg(short = 'g', long, value_name = "GLOB", conflicts_with = "name_regex")]
    pub glob: Option<String>,

    /// Only scan files whose name matches this regular expression
    #[arg(short = 'r', long, value_name = "REGEX")]
    pub name_regex: Option<String>,
}

impl NameArgs {
    pub fn to_filter(&self) -> Result<NameFilter, ScanError> {
        match (&self.glob, &self.name_regex) {
            (Some(g), _)    => NameFilter::glob(g),
            (None, Some(r)) => NameFilter::regex(r),
            (None, None)    => Ok(NameFilter::Any),
        }
    }
}
