use log::warn;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_TMDB_URL: &str = "https://api.themoviedb.org/3";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub tmdb_base_url: String,
    pub tmdb_api_key: String,
    /// `None` keeps everything in a temporary database.
    pub db_path: Option<String>,
    pub cookie_key: Vec<u8>,
    pub checkout_delay: Duration,
    pub bcrypt_cost: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: "127.0.0.1:8080".to_owned(),
            tmdb_base_url: DEFAULT_TMDB_URL.to_owned(),
            tmdb_api_key: String::new(),
            db_path: None,
            cookie_key: vec![0u8; 32],
            checkout_delay: Duration::from_millis(2000),
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

fn parsed<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Ignoring unparsable {}={:?}", name, raw);
            default
        }),
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();
        let cookie_key = match env::var("ARC_COOKIE_KEY") {
            Ok(key) if key.len() >= 32 => key.into_bytes(),
            Ok(_) => {
                warn!("ARC_COOKIE_KEY must be at least 32 bytes, using the default key");
                defaults.cookie_key
            }
            Err(_) => defaults.cookie_key,
        };
        if env::var("TMDB_API_KEY").is_err() {
            warn!("TMDB_API_KEY is not set, catalog requests will fail");
        }
        Config {
            bind: env::var("ARC_BIND").unwrap_or(defaults.bind),
            tmdb_base_url: env::var("TMDB_BASE_URL").unwrap_or(defaults.tmdb_base_url),
            tmdb_api_key: env::var("TMDB_API_KEY").unwrap_or(defaults.tmdb_api_key),
            db_path: env::var("ARC_DB_PATH").ok(),
            cookie_key,
            checkout_delay: Duration::from_millis(parsed("ARC_CHECKOUT_DELAY_MS", 2000)),
            bcrypt_cost: parsed("ARC_BCRYPT_COST", defaults.bcrypt_cost),
        }
    }

    pub fn open_db(&self) -> sled::Result<sled::Db> {
        match &self.db_path {
            Some(path) => sled::open(path),
            None => sled::Config::new().temporary(true).open(),
        }
    }
}
