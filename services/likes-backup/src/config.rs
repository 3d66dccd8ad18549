//!
//! src/config.rs  Andrew Belles  Oct 17th, 2026
//!
//! Command line flags and environment backed configuration for the
//! backup run. Environment is read from .env first (dotenvy), flags win
//!

use std::{path::PathBuf, time};

use clap::{Parser, ValueEnum};
use url::Url;

use crate::errors::BackupError;

/// Constants for HTTP Config
pub const HTTP_TIMEOUT: u64 = 8000;
pub const HTTP_CONNECT_TIMEOUT: u64 = 2000;
pub const HTTP_POOL_MAX_IDLE: usize = 4;
pub const HTTP_POOL_IDLE_TIMEOUT: u64 = 90000;
pub const HTTP_MAX_REDIRECTS: u8 = 4;

pub const RETRY_MAX_ATTEMPTS: u8 = 4;
pub const RETRY_BASE_BACKOFF: u64 = 250;
pub const RETRY_JITTER: bool = true;
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

pub const YANDEX_API_BASE: &str = "https://api.music.yandex.net/";
pub const YANDEX_TRACKS_BATCH: usize = 250;
pub const DEFAULT_SNAPSHOT: &str = "tracks.csv";

///
/// Command line of the backup binary
///
#[derive(Debug, Clone, Parser)]
#[command(name = "likes-backup", version, about = "Run Yandex Music likes backup.")]
pub struct Cli {
    /// Username of playlist owner
    #[arg(short = 'u', long, env = "YANDEX_MUSIC_USER")]
    pub username: String,

    /// Proxy server <example: 92.39.141.246:65056>
    #[arg(short = 'x', long, env = "YANDEX_MUSIC_PROXY")]
    pub proxy: Option<String>,

    /// Back up the owner's playlist of this kind instead of their likes
    #[arg(short = 'p', long, env = "YANDEX_MUSIC_PLAYLIST")]
    pub playlist: Option<String>,

    /// Snapshot csv file
    #[arg(short = 'o', long, env = "LIKES_SNAPSHOT_PATH", default_value = DEFAULT_SNAPSHOT)]
    pub snapshot: PathBuf,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Log every added, deleted and restored track
    #[arg(short, long)]
    pub verbose: bool,
}

/// Ensures that url is https
fn ensure_https(url: &Url) -> Result<(), String> {
    if url.scheme() == "https" {
        Ok(())
    } else {
        Err(format!("URL must be https: {url}"))
    }
}

fn ensure_trailing_slash(url: &mut Url) {
    if !url.path().ends_with('/') {
        let mut path = url.path().to_string();
        path.push('/');
        url.set_path(&path);
    }
}

/// Empty env values count as unset
fn env_opt(s: &str) -> Option<String> {
    std::env::var(s).ok().filter(|v| !v.trim().is_empty())
}

///
/// Configuration for the Yandex Music api
///
#[derive(Debug, Clone)]
pub struct YandexConfig {
    pub api_base: Url,
    pub token: Option<String>,    // anonymous access when unset
    pub proxy: Option<Url>,
    pub playlist: Option<String>, // playlist kind, likes when unset
    pub batch_size: usize         // track ids per /tracks request
}

pub fn parse_api_base(raw: &str) -> Result<Url, BackupError> {
    let mut api_base = Url::parse(raw)
        .map_err(|e| BackupError::Config(
            format!("YANDEX_MUSIC_API_BASE invalid {e}")
        ))?;
    ensure_https(&api_base).map_err(BackupError::Config)?;
    ensure_trailing_slash(&mut api_base);
    Ok(api_base)
}

/// Proxy is given as host:port and always spoken to over plain http
pub fn parse_proxy(raw: &str) -> Result<Url, BackupError> {
    let raw = raw.trim();
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };

    let url = Url::parse(&with_scheme)
        .map_err(|e| BackupError::Config(format!("proxy {raw} invalid {e}")))?;
    if url.host_str().is_none() {
        return Err(BackupError::Config(format!("proxy {raw} missing host")));
    }
    Ok(url)
}

fn parse_batch_size(raw: Option<String>) -> Result<usize, BackupError> {
    match raw {
        None => Ok(YANDEX_TRACKS_BATCH),
        Some(s) => match s.trim().parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(BackupError::Config(format!("YANDEX_TRACKS_BATCH invalid: {s}")))
        }
    }
}

/// Playlists are only read with an authorized client
fn require_token(playlist: Option<&str>, token: Option<&str>) -> Result<(), BackupError> {
    match (playlist, token) {
        (Some(kind), None) => Err(BackupError::Config(format!(
            "YANDEX_MUSIC_TOKEN is required to back up playlist {kind}"
        ))),
        _ => Ok(())
    }
}

fn build_yandex(cli: &Cli) -> Result<YandexConfig, BackupError> {
    let api_base = env_opt("YANDEX_MUSIC_API_BASE")
        .unwrap_or_else(|| YANDEX_API_BASE.to_string());
    let api_base = parse_api_base(&api_base)?;

    let token = env_opt("YANDEX_MUSIC_TOKEN");
    let proxy = cli.proxy.as_deref()
        .filter(|p| !p.trim().is_empty())
        .map(parse_proxy)
        .transpose()?;
    let playlist = cli.playlist.as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string);
    require_token(playlist.as_deref(), token.as_deref())?;
    let batch_size = parse_batch_size(env_opt("YANDEX_TRACKS_BATCH"))?;

    Ok( YandexConfig { api_base, token, proxy, playlist, batch_size } )
}

///
/// Configuration for Http timeouts, retries, etc.
///
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u8,
    pub base_backoff: time::Duration,
    pub jitter: bool,
    pub retryable_statuses: Vec<u16>
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: RETRY_MAX_ATTEMPTS,
            base_backoff: time::Duration::from_millis(RETRY_BASE_BACKOFF),
            jitter: RETRY_JITTER,
            retryable_statuses: RETRYABLE_STATUSES.to_vec()
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: time::Duration,
    pub connect_timeout: time::Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: time::Duration,
    pub max_redirects: u8,
    pub retry: RetryConfig
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: time::Duration::from_millis(HTTP_TIMEOUT),
            connect_timeout: time::Duration::from_millis(HTTP_CONNECT_TIMEOUT),
            pool_max_idle_per_host: HTTP_POOL_MAX_IDLE,
            pool_idle_timeout: time::Duration::from_millis(HTTP_POOL_IDLE_TIMEOUT),
            max_redirects: HTTP_MAX_REDIRECTS,
            retry: RetryConfig::default()
        }
    }
}

///
/// Where the snapshot csv lives
///
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    pub path: PathBuf
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self { path: PathBuf::from(DEFAULT_SNAPSHOT) }
    }
}

///
/// Configuration for Logger
///

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter_directives: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub include_file_line: bool,
    pub include_target: bool
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter_directives: "info,likes_backup=info,reqwest=warn,hyper=warn".to_string(),
            format: LogFormat::Pretty,
            with_ansi: true,
            include_file_line: false,
            include_target: false
        }
    }
}

fn build_logging(cli: &Cli) -> LoggingConfig {
    let mut logging = LoggingConfig {
        format: cli.log_format,
        ..LoggingConfig::default()
    };
    if cli.verbose {
        logging.filter_directives = "info,likes_backup=debug,reqwest=warn,hyper=warn".to_string();
    }
    if logging.format == LogFormat::Json {
        logging.with_ansi = false;
        logging.include_target = true;
        logging.include_file_line = true;
    }
    logging
}

///
/// AppConfig which holds everything the refresh run needs
///
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub owner: String,
    pub yandex: YandexConfig,
    pub http: HttpConfig,
    pub snapshot: SnapshotConfig,
    pub logging: LoggingConfig
}

///
/// Resolve the configuration from parsed flags and the environment.
///
pub fn load_config(cli: &Cli) -> Result<AppConfig, BackupError> {
    let owner = cli.username.trim().to_string();
    if owner.is_empty() {
        return Err(BackupError::Config("username was not set".to_string()));
    }

    let yandex   = build_yandex(cli)?;
    let http     = HttpConfig::default();
    let snapshot = SnapshotConfig { path: cli.snapshot.clone() };
    let logging  = build_logging(cli);

    Ok( AppConfig { owner, yandex, http, snapshot, logging } )
}
