//! Configuration handling for the detector.

use crate::similarity::{
    AcceptancePolicy, DEFAULT_LEVENSHTEIN_THRESHOLD, DEFAULT_SIMILARITY_THRESHOLD,
};
use crate::types::{Result, RuleKind, SquatwatchError};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default trailing window, in days, for recently published packages.
pub const DEFAULT_CHECK_DAYS: u32 = 3;

/// Default number of popular packages protected.
pub const DEFAULT_MOST_POPULAR: usize = 3000;

/// Default registry connection file.
pub const DEFAULT_DB_CONFIG: &str = "db.conf";

/// Typosquatting detector for newly published crates.
#[derive(Parser, Debug, Clone)]
#[command(name = "squatwatch")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Telegram bot token for notifications
    #[arg(long, env = "SQUATWATCH_TELEGRAM_TOKEN", global = true)]
    pub telegram_token: Option<String>,

    /// Telegram chat ID for notifications
    #[arg(long, env = "SQUATWATCH_TELEGRAM_CHAT_ID", global = true)]
    pub telegram_chat_id: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Check recently published crates for typosquats of popular crates
    Scan(ScanConfig),
    /// Print the variants generated for a name, without touching the registry
    Variants(VariantsConfig),
}

/// Configuration for the variants command.
#[derive(Parser, Debug, Clone)]
pub struct VariantsConfig {
    /// Package name to derive variants from
    pub name: String,

    /// Transform rule to disable (repeatable)
    #[arg(long = "disable-rule", value_enum)]
    pub disabled_rules: Vec<RuleKind>,

    /// Skip bit-flip variants
    #[arg(long)]
    pub no_bitflips: bool,

    /// Output variants as JSON
    #[arg(long)]
    pub json: bool,
}

/// Configuration for the scan command.
#[derive(Parser, Debug, Clone)]
pub struct ScanConfig {
    /// Only check crates with versions created/updated within this number of days
    #[arg(long = "days", env = "CHECK_DAYS", default_value_t = DEFAULT_CHECK_DAYS)]
    pub check_days: u32,

    /// Number of most popular crates to consider as typosquatting targets
    #[arg(long = "top", env = "MOST_POPULAR", default_value_t = DEFAULT_MOST_POPULAR)]
    pub most_popular: usize,

    /// Semantic similarity in the range 0-1 above which descriptions are similar
    #[arg(long, env = "SIMILARITY_THRESHOLD", default_value_t = DEFAULT_SIMILARITY_THRESHOLD)]
    pub similarity_threshold: f64,

    /// Levenshtein distance below which descriptions are similar
    #[arg(
        long = "lev-threshold",
        env = "LEVENSHTEIN_THRESHOLD",
        default_value_t = DEFAULT_LEVENSHTEIN_THRESHOLD
    )]
    pub levenshtein_threshold: usize,

    /// Directory into which suspicious crates are downloaded, created if necessary
    #[arg(long, env = "CRATE_DOWNLOAD_DIR")]
    pub download_dir: Option<PathBuf>,

    /// Registry connection file
    #[arg(long = "dbconf", env = "DB_CONFIG", default_value = DEFAULT_DB_CONFIG)]
    pub db_config: PathBuf,

    /// Semantic similarity scorer endpoint (edit distance is used when unset)
    #[arg(long, env = "SQUATWATCH_SIMILARITY_URL")]
    pub similarity_url: Option<String>,

    /// Transform rule to disable (repeatable)
    #[arg(long = "disable-rule", value_enum)]
    pub disabled_rules: Vec<RuleKind>,

    /// Skip bit-flip variants
    #[arg(long)]
    pub no_bitflips: bool,

    /// Report candidates without downloading them
    #[arg(long)]
    pub no_download: bool,

    /// Number of downloads to run in parallel
    #[arg(long, default_value = "4")]
    pub download_concurrency: usize,

    /// Enable Telegram notifications for findings
    #[arg(long)]
    pub telegram: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,

    /// Output file path (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Quiet mode: only print the matches
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            check_days: DEFAULT_CHECK_DAYS,
            most_popular: DEFAULT_MOST_POPULAR,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            levenshtein_threshold: DEFAULT_LEVENSHTEIN_THRESHOLD,
            download_dir: None,
            db_config: PathBuf::from(DEFAULT_DB_CONFIG),
            similarity_url: None,
            disabled_rules: Vec::new(),
            no_bitflips: false,
            no_download: false,
            download_concurrency: 4,
            telegram: false,
            json: false,
            output: None,
            quiet: false,
        }
    }
}

impl ScanConfig {
    /// Reject option values outside their meaningful range.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(SquatwatchError::ConfigError(format!(
                "similarity threshold {} is outside 0-1",
                self.similarity_threshold
            )));
        }
        if self.most_popular == 0 {
            return Err(SquatwatchError::ConfigError(
                "number of popular crates must be positive".to_string(),
            ));
        }
        if self.download_concurrency == 0 {
            return Err(SquatwatchError::ConfigError(
                "download concurrency must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn acceptance_policy(&self) -> AcceptancePolicy {
        AcceptancePolicy::new(self.similarity_threshold, self.levenshtein_threshold)
    }

    /// Download directory, defaulting to `cratefiles` under the system temp dir.
    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("cratefiles"))
    }

    /// Load the registry connection file.
    pub fn source_config(&self) -> Result<SourceConfig> {
        let explicit = self.db_config != Path::new(DEFAULT_DB_CONFIG);
        if !explicit && !self.db_config.exists() {
            debug!("No {} found, using default registry settings", DEFAULT_DB_CONFIG);
            return Ok(SourceConfig::default());
        }
        SourceConfig::load(&self.db_config)
    }
}

/// Registry connection parameters read from the `DB_CONFIG` file.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    pub api_url: String,
    pub user_agent: String,
    /// Requests per second.
    pub rate_limit: u32,
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Results per page, 1-100.
    pub page_size: u32,
    /// Owner cache lifetime in seconds.
    pub cache_ttl: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_url: "https://crates.io".to_string(),
            user_agent: concat!("squatwatch/", env!("CARGO_PKG_VERSION")).to_string(),
            rate_limit: 1,
            timeout: 30,
            page_size: 100,
            cache_ttl: 3600,
        }
    }
}

impl SourceConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SquatwatchError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse `key = value` lines. Blank lines and `#` comments are ignored.
    pub fn parse(content: &str) -> Result<Self> {
        let mut config = Self::default();

        for (idx, line) in content.lines().enumerate() {
            let line_no = idx + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let (key, value) = trimmed.split_once('=').ok_or_else(|| {
                SquatwatchError::ConfigError(format!("line {}: expected key = value", line_no))
            })?;
            let (key, value) = (key.trim(), value.trim());

            match key {
                "api_url" => {
                    url::Url::parse(value).map_err(|e| {
                        let reason = format!("line {}: invalid api_url: {}", line_no, e);
                        SquatwatchError::ConfigError(reason)
                    })?;
                    config.api_url = value.trim_end_matches('/').to_string();
                }
                "user_agent" => {
                    if value.is_empty() {
                        return Err(SquatwatchError::ConfigError(format!(
                            "line {}: user_agent must not be empty",
                            line_no
                        )));
                    }
                    config.user_agent = value.to_string();
                }
                "rate_limit" => config.rate_limit = parse_number(key, value, line_no)?,
                "timeout" => config.timeout = parse_number(key, value, line_no)?,
                "page_size" => {
                    let page_size: u32 = parse_number(key, value, line_no)?;
                    if !(1..=100).contains(&page_size) {
                        return Err(SquatwatchError::ConfigError(format!(
                            "line {}: page_size must be between 1 and 100",
                            line_no
                        )));
                    }
                    config.page_size = page_size;
                }
                "cache_ttl" => config.cache_ttl = parse_number(key, value, line_no)?,
                other => {
                    return Err(SquatwatchError::ConfigError(format!(
                        "line {}: unknown key '{}'",
                        line_no, other
                    )))
                }
            }
        }

        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str, line_no: usize) -> Result<T> {
    value.parse().map_err(|_| {
        SquatwatchError::ConfigError(format!("line {}: invalid {} '{}'", line_no, key, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_scan_defaults() {
        let config = Config::parse_from(["squatwatch", "scan"]);
        match config.command {
            Commands::Scan(scan) => {
                assert_eq!(scan.check_days, 3);
                assert_eq!(scan.most_popular, 3000);
                assert_eq!(scan.similarity_threshold, 0.97);
                assert_eq!(scan.levenshtein_threshold, 10);
                assert_eq!(scan.db_config, PathBuf::from("db.conf"));
                assert!(scan.download_dir().ends_with("cratefiles"));
            }
            _ => panic!("Expected scan command"),
        }
    }

    #[test]
    fn test_scan_flags() {
        let config = Config::parse_from([
            "squatwatch",
            "scan",
            "--days",
            "7",
            "--top",
            "500",
            "--lev-threshold",
            "4",
            "--disable-rule",
            "affix",
            "--disable-rule",
            "keyboard-typo",
        ]);
        let Commands::Scan(scan) = config.command else {
            panic!("Expected scan command");
        };
        assert_eq!(scan.check_days, 7);
        assert_eq!(scan.most_popular, 500);
        assert_eq!(scan.acceptance_policy().levenshtein_threshold, 4);
        assert_eq!(scan.disabled_rules, vec![RuleKind::Affix, RuleKind::KeyboardTypo]);
    }

    #[test]
    fn test_validate() {
        let mut scan = ScanConfig::default();
        assert!(scan.validate().is_ok());
        scan.similarity_threshold = 1.5;
        assert!(scan.validate().is_err());
    }

    #[test]
    fn test_source_config_parse() {
        let text = "# registry mirror\n\n\
                    api_url = https://mirror.example.com/\n\
                    user_agent = squatwatch (ops@example.com)\n\
                    rate_limit=5\n\
                    page_size = 50\n";
        let config = SourceConfig::parse(text).unwrap();
        assert_eq!(config.api_url, "https://mirror.example.com");
        assert_eq!(config.user_agent, "squatwatch (ops@example.com)");
        assert_eq!(config.rate_limit, 5);
        assert_eq!(config.page_size, 50);
        assert_eq!(config.timeout, 30);
    }

    #[test]
    fn test_source_config_malformed() {
        assert!(SourceConfig::parse("api_url https://crates.io").is_err());
        assert!(SourceConfig::parse("hostname = db").is_err());
        assert!(SourceConfig::parse("rate_limit = fast").is_err());
        assert!(SourceConfig::parse("page_size = 500").is_err());
        assert!(SourceConfig::parse("api_url = not a url").is_err());
    }

    #[test]
    fn test_source_config_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timeout = 5").unwrap();

        let scan = ScanConfig {
            db_config: file.path().to_path_buf(),
            ..Default::default()
        };
        assert_eq!(scan.source_config().unwrap().timeout, 5);

        let missing = ScanConfig {
            db_config: PathBuf::from("/nonexistent/squatwatch.conf"),
            ..Default::default()
        };
        assert!(missing.source_config().is_err());
    }
}
