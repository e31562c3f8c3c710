// src/lib.rs

pub mod normalizer {
use clap::Parser;
use log::{debug, info, LevelFilter};
use serde::Deserialize;
use simplelog::{ConfigBuilder, WriteLogger};
use std::{
    error::Error,
    fmt,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    str::FromStr,
};
use tempfile::NamedTempFile;

pub const CR: u8 = b'\r';
pub const LF: u8 = b'\n';

/// Target of the working-directory entry point.
pub const WORKING_DIR_TARGET: &str = "cinema/e2e-test.sh";
/// Target of the anchored entry point, below the crate root.
pub const ANCHORED_TARGET: &str = "app/e2e-test.sh";

// -------------- Error type --------------

#[derive(Debug)]
pub enum NormalizeError {
    FileAccess(PathBuf, String),
    InvalidConfiguration(String),
    Logging(String),
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeError::FileAccess(path, e) => {
                write!(f, "File access error on {}: {}", path.display(), e)
            }
            NormalizeError::InvalidConfiguration(e) => write!(f, "Invalid configuration: {}", e),
            NormalizeError::Logging(e) => write!(f, "Logging setup error: {}", e),
        }
    }
}

impl Error for NormalizeError {}

fn file_access(path: &Path, e: io::Error) -> NormalizeError {
    NormalizeError::FileAccess(path.to_path_buf(), e.to_string())
}

// -------------- ByteProcessor trait --------------

pub trait ByteProcessor {
    fn name(&self) -> &'static str;
    fn process(&self, input: &[u8]) -> Result<Vec<u8>, NormalizeError>;
}

// -------------- Processors --------------

/// Collapses every `CR LF` pair into a single `LF`.
pub struct CrlfToLf;
impl CrlfToLf {
    pub fn apply(input: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(input.len());
        let mut bytes = input.iter().peekable();
        while let Some(&b) = bytes.next() {
            if b == CR && bytes.peek() == Some(&&LF) {
                continue;
            }
            out.push(b);
        }
        out
    }
}
impl ByteProcessor for CrlfToLf {
    fn name(&self) -> &'static str { "crlf_to_lf" }
    fn process(&self, input: &[u8]) -> Result<Vec<u8>, NormalizeError> {
        Ok(Self::apply(input))
    }
}

/// Turns each remaining `CR` into `LF`. Must run after [`CrlfToLf`].
pub struct CrToLf;
impl CrToLf {
    pub fn apply(input: &[u8]) -> Vec<u8> {
        input.iter().map(|&b| if b == CR { LF } else { b }).collect()
    }
}
impl ByteProcessor for CrToLf {
    fn name(&self) -> &'static str { "cr_to_lf" }
    fn process(&self, input: &[u8]) -> Result<Vec<u8>, NormalizeError> {
        Ok(Self::apply(input))
    }
}

/// Line-ending normalization of a whole buffer.
pub fn normalize(input: &[u8]) -> Vec<u8> {
    CrToLf::apply(&CrlfToLf::apply(input))
}

// -------------- Pipeline --------------

/// Processors run in the order they were added.
#[derive(Default)]
pub struct Pipeline {
    processors: Vec<Box<dyn ByteProcessor>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Pipeline { processors: Vec::new() }
    }

    pub fn with<P: ByteProcessor + 'static>(mut self, processor: P) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    /// CRLF first, then lone CR.
    pub fn line_endings() -> Self {
        Pipeline::new().with(CrlfToLf).with(CrToLf)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    pub fn process_all(&self, mut data: Vec<u8>) -> Result<Vec<u8>, NormalizeError> {
        for processor in &self.processors {
            debug!("Running processor: {} (in={} bytes)", processor.name(), data.len());
            data = processor.process(&data)?;
        }
        Ok(data)
    }
}

// -------------- Target resolution --------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Relative to the process's current directory.
    WorkingDir { relative: PathBuf },
    /// Relative to a fixed anchor directory.
    Anchored { anchor: PathBuf, relative: PathBuf },
}

impl Target {
    pub fn working_dir(relative: impl Into<PathBuf>) -> Self {
        Target::WorkingDir { relative: relative.into() }
    }

    pub fn anchored(anchor: impl Into<PathBuf>, relative: impl Into<PathBuf>) -> Self {
        Target::Anchored { anchor: anchor.into(), relative: relative.into() }
    }

    pub fn resolve(&self) -> Result<PathBuf, NormalizeError> {
        match self {
            Target::WorkingDir { relative } => {
                let cwd = std::env::current_dir().map_err(|e| file_access(Path::new("."), e))?;
                Ok(cwd.join(relative))
            }
            Target::Anchored { anchor, relative } => Ok(anchor.join(relative)),
        }
    }
}

// -------------- File rewrite --------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStrategy {
    /// Sibling temp file, then rename over the target.
    Atomic,
    /// Truncate the target and write in place.
    Truncate,
}

/// Normalizes `path` in place and returns the number of bytes written.
///
/// Nothing is written if the read fails.
pub fn rewrite_file(path: &Path, strategy: WriteStrategy) -> Result<usize, NormalizeError> {
    let original = fs::read(path).map_err(|e| file_access(path, e))?;
    info!("Read {} ({} bytes)", path.display(), original.len());

    let pipeline = Pipeline::line_endings();
    let normalized = pipeline.process_all(original)?;

    match strategy {
        WriteStrategy::Atomic => write_atomic(path, &normalized)?,
        WriteStrategy::Truncate => fs::write(path, &normalized).map_err(|e| file_access(path, e))?,
    }
    info!("Wrote {} ({} bytes, {:?})", path.display(), normalized.len(), strategy);

    Ok(normalized.len())
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<(), NormalizeError> {
    // rename onto the link target, not over the link itself
    let path = fs::canonicalize(path).map_err(|e| file_access(path, e))?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    // directory write access is enough for a rename, so check the file itself
    OpenOptions::new()
        .write(true)
        .open(&path)
        .map_err(|e| file_access(&path, e))?;

    // the rename would otherwise leave the temp file's 0600 mode behind
    let metadata = fs::metadata(&path).map_err(|e| file_access(&path, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| file_access(dir, e))?;
    let tmp_path = tmp.path().to_path_buf();
    tmp.write_all(data).map_err(|e| file_access(&tmp_path, e))?;
    tmp.as_file().sync_all().map_err(|e| file_access(&tmp_path, e))?;
    keep_owner(&metadata, &tmp_path)?;
    fs::set_permissions(&tmp_path, metadata.permissions()).map_err(|e| file_access(&tmp_path, e))?;

    tmp.persist(&path).map_err(|e| file_access(&path, e.error))?;
    Ok(())
}

/// Gives the temp file the target's owner; fails before the rename if that is not allowed.
#[cfg(unix)]
fn keep_owner(target: &fs::Metadata, tmp_path: &Path) -> Result<(), NormalizeError> {
    use std::os::unix::fs::MetadataExt;

    let tmp = fs::metadata(tmp_path).map_err(|e| file_access(tmp_path, e))?;
    if tmp.uid() == target.uid() && tmp.gid() == target.gid() {
        return Ok(());
    }
    debug!("Restoring owner {}:{} on {}", target.uid(), target.gid(), tmp_path.display());
    std::os::unix::fs::chown(tmp_path, Some(target.uid()), Some(target.gid()))
        .map_err(|e| file_access(tmp_path, e))
}

#[cfg(not(unix))]
fn keep_owner(_target: &fs::Metadata, _tmp_path: &Path) -> Result<(), NormalizeError> {
    Ok(())
}

pub fn status_line(bytes: usize) -> String {
    format!("normalized to LF, bytes: {}", bytes)
}

// -------------- Config structures --------------

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    schema_version: Option<String>,

    log_enabled: Option<bool>,
    log_level: Option<String>,
    log_file: Option<String>,
    log_append: Option<bool>,

    atomic_write: Option<bool>,
}

#[derive(Parser)]
#[command(version, about = "Rewrite the e2e test script with LF line endings")]
pub struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)] log_enabled: Option<bool>,
    #[arg(long)] log_level: Option<String>,
    #[arg(long)] log_file: Option<String>,
    #[arg(long)] log_append: Option<bool>,

    /// Replace the target via temp file + rename
    #[arg(long)] atomic_write: Option<bool>,
}

#[derive(Debug)]
pub struct Config {
    pub schema_version: String,

    pub log_enabled: bool,
    pub log_level: LevelFilter,
    pub log_file: String,
    pub log_append: bool,

    pub write_strategy: WriteStrategy,
}

impl Config {
    pub fn from(cli: Cli) -> Result<Self, NormalizeError> {
        // 1) Determine config file path; without one, defaults apply
        let path = cli
            .config
            .or_else(|| std::env::var_os("EOLNORM_CONFIG").map(PathBuf::from));

        // 2) Load JSON; a missing file means defaults
        let raw = match path {
            Some(path) => match fs::read_to_string(&path) {
                Ok(s) => serde_json::from_str::<RawConfig>(&s).map_err(|e| {
                    NormalizeError::InvalidConfiguration(format!("{}: {}", path.display(), e))
                })?,
                Err(e) if e.kind() == io::ErrorKind::NotFound => RawConfig::default(),
                Err(e) => return Err(file_access(&path, e)),
            },
            None => RawConfig::default(),
        };

        // 3) Override with CLI
        let schema_version = raw.schema_version.unwrap_or_else(|| "1.0".into());
        if schema_version != "1.0" {
            return Err(NormalizeError::InvalidConfiguration(format!(
                "unsupported schema_version {}",
                schema_version
            )));
        }

        let log_enabled = cli.log_enabled.or(raw.log_enabled).unwrap_or(false);
        let log_level_str = cli.log_level.or(raw.log_level).unwrap_or_else(|| "info".into());
        let log_level = LevelFilter::from_str(&log_level_str).map_err(|_| {
            NormalizeError::InvalidConfiguration(format!("unknown log_level {}", log_level_str))
        })?;
        let log_file = cli.log_file.or(raw.log_file).unwrap_or_else(|| "eolnorm.log".into());
        let log_append = cli.log_append.or(raw.log_append).unwrap_or(true);

        let write_strategy = if cli.atomic_write.or(raw.atomic_write).unwrap_or(true) {
            WriteStrategy::Atomic
        } else {
            WriteStrategy::Truncate
        };

        // 4) Validate
        if log_enabled && log_file.trim().is_empty() {
            return Err(NormalizeError::InvalidConfiguration(
                "log_file must be set if log_enabled".into(),
            ));
        }

        Ok(Config {
            schema_version,
            log_enabled,
            log_level,
            log_file,
            log_append,
            write_strategy,
        })
    }
}

fn init_logging(cfg: &Config) -> Result<(), NormalizeError> {
    if !cfg.log_enabled {
        return Ok(());
    }
    let path = Path::new(&cfg.log_file);
    let file = OpenOptions::new()
        .write(true)
        .append(cfg.log_append)
        .truncate(!cfg.log_append)
        .create(true)
        .open(path)
        .map_err(|e| file_access(path, e))?;
    let log_cfg = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();
    WriteLogger::init(cfg.log_level, log_cfg, file)
        .map_err(|e| NormalizeError::Logging(e.to_string()))
}

// -------------- Main --------------

pub(crate) fn main_internal(cfg: Config, target: &Target) -> Result<(), Box<dyn Error>> {
    init_logging(&cfg)?;

    let path = target.resolve()?;
    info!("Target resolved to {} via {:?}", path.display(), target);

    let bytes = rewrite_file(&path, cfg.write_strategy)?;
    println!("{}", status_line(bytes));

    Ok(())
}


}

use clap::Parser;

/// Entrypoint shared by both binaries.
pub fn run_app(target: crate::normalizer::Target) -> Result<(), Box<dyn std::error::Error>> {
    let cli = crate::normalizer::Cli::parse();
    let cfg = crate::normalizer::Config::from(cli)?;

    crate::normalizer::main_internal(cfg, &target)?;
    Ok(())
}
