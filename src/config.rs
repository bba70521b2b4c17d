use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, ScrapeError};

#[derive(Debug, Clone)]
pub struct ChromeConfig {
    pub headless: bool,
    pub window_size: (u32, u32),
    pub path: Option<PathBuf>,
    pub user_agent: Option<String>,
    pub launch_timeout: Duration,
}

impl Default for ChromeConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_size: (1920, 1080),
            path: None,
            user_agent: None,
            launch_timeout: Duration::from_secs(30),
        }
    }
}

/// Runtime settings, read from the environment (and `.env`) at start-up.
#[derive(Debug, Clone)]
pub struct Config {
    pub chrome: ChromeConfig,
    /// Directory for diagnostic screenshots.
    pub debug_dir: PathBuf,
    /// Where the variant crawl persists its bundle.
    pub variants_output: PathBuf,
    pub memory_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chrome: ChromeConfig::default(),
            debug_dir: PathBuf::from("."),
            variants_output: PathBuf::from("product-variants-data.json"),
            memory_interval: Duration::from_secs(10),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let headless = match lookup("CHROME_HEADLESS") {
            Some(v) => parse_bool("CHROME_HEADLESS", &v)?,
            None => defaults.chrome.headless,
        };
        let window_size = match lookup("CHROME_WINDOW") {
            Some(v) => parse_window("CHROME_WINDOW", &v)?,
            None => defaults.chrome.window_size,
        };
        let launch_timeout = match lookup("CHROME_LAUNCH_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse_num("CHROME_LAUNCH_TIMEOUT_SECS", &v)?),
            None => defaults.chrome.launch_timeout,
        };
        let memory_interval = match lookup("MEMORY_INTERVAL_SECS") {
            Some(v) => {
                let secs: u64 = parse_num("MEMORY_INTERVAL_SECS", &v)?;
                if secs == 0 {
                    return Err(ScrapeError::Config(
                        "MEMORY_INTERVAL_SECS must be greater than zero".to_string(),
                    ));
                }
                Duration::from_secs(secs)
            }
            None => defaults.memory_interval,
        };

        Ok(Self {
            chrome: ChromeConfig {
                headless,
                window_size,
                path: lookup("CHROME_PATH").filter(|p| !p.is_empty()).map(PathBuf::from),
                user_agent: lookup("CHROME_USER_AGENT").filter(|ua| !ua.is_empty()),
                launch_timeout,
            },
            debug_dir: lookup("DEBUG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.debug_dir),
            variants_output: lookup("VARIANTS_OUTPUT")
                .map(PathBuf::from)
                .unwrap_or(defaults.variants_output),
            memory_interval,
        })
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ScrapeError::Config(format!("{key}: expected a boolean, got `{other}`"))),
    }
}

fn parse_num<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ScrapeError::Config(format!("{key}: expected a number, got `{value}`")))
}

fn parse_window(key: &str, value: &str) -> Result<(u32, u32)> {
    let (w, h) = value
        .trim()
        .split_once('x')
        .ok_or_else(|| ScrapeError::Config(format!("{key}: expected WIDTHxHEIGHT, got `{value}`")))?;
    Ok((parse_num(key, w)?, parse_num(key, h)?))
}
