use std::env;

use anyhow::{Context, Result};

use crate::db::models::ContentKind;
use crate::scoring::quality::{ScoreWeights, Signal};

/// Central configuration loaded from environment variables.
///
/// The .env file is loaded automatically at startup via dotenvy. Every value
/// has a default; only malformed values are an error.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    /// PostgreSQL connection URL (when set and starts with postgres://, uses Postgres backend)
    pub database_url: Option<String>,
    pub post_half_life_days: i64,
    pub comment_half_life_days: i64,
    pub reply_half_life_days: i64,
    /// Signal weights, each overridable with CURATOR_WEIGHT_<SIGNAL>.
    pub weights: ScoreWeights,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from any key lookup. `load` passes the process
    /// environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let half_life = |key: &str, kind: ContentKind| -> Result<i64> {
            let days = match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<i64>()
                    .with_context(|| format!("{key} must be a whole number of days, got {raw:?}"))?,
                None => kind.default_half_life_days(),
            };
            if days <= 0 {
                anyhow::bail!("{key} must be positive, got {days}");
            }
            Ok(days)
        };

        let mut weights = ScoreWeights::default();
        for signal in Signal::ALL {
            let key = format!("CURATOR_WEIGHT_{}", signal.as_str().to_ascii_uppercase());
            if let Some(raw) = lookup(&key) {
                let weight = raw
                    .trim()
                    .parse::<f64>()
                    .with_context(|| format!("{key} must be a number, got {raw:?}"))?;
                weights.set(signal, weight);
            }
        }
        weights.validate().context("Invalid signal weights")?;

        Ok(Self {
            db_path: lookup("CURATOR_DB_PATH").unwrap_or_else(|| "./curator.db".to_string()),
            database_url: lookup("DATABASE_URL"),
            post_half_life_days: half_life("CURATOR_POST_HALF_LIFE_DAYS", ContentKind::Post)?,
            comment_half_life_days: half_life("CURATOR_COMMENT_HALF_LIFE_DAYS", ContentKind::Comment)?,
            reply_half_life_days: half_life("CURATOR_REPLY_HALF_LIFE_DAYS", ContentKind::Reply)?,
            weights,
        })
    }

    pub fn half_life_days(&self, kind: ContentKind) -> i64 {
        match kind {
            ContentKind::Post => self.post_half_life_days,
            ContentKind::Comment => self.comment_half_life_days,
            ContentKind::Reply => self.reply_half_life_days,
        }
    }

    /// True when DATABASE_URL points at PostgreSQL.
    pub fn uses_postgres(&self) -> bool {
        self.database_url
            .as_deref()
            .is_some_and(|u| u.starts_with("postgres://") || u.starts_with("postgresql://"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.db_path, "./curator.db");
        assert_eq!(config.half_life_days(ContentKind::Post), 30);
        assert_eq!(config.half_life_days(ContentKind::Comment), 180);
        assert_eq!(config.weights, ScoreWeights::default());
        assert!(!config.uses_postgres());
    }

    #[test]
    fn test_weight_override() {
        let config = config_from(&[("CURATOR_WEIGHT_VIEWS", "0.25"), ("CURATOR_WEIGHT_ABUSE_REPORTS", "3")]).unwrap();
        assert_eq!(config.weights.views, 0.25);
        assert_eq!(config.weights.abuse_reports, 3.0);
        assert_eq!(config.weights.likes, 1.0);
    }

    #[test]
    fn test_negative_weight_is_config_error() {
        assert!(config_from(&[("CURATOR_WEIGHT_LIKES", "-1")]).is_err());
        assert!(config_from(&[("CURATOR_WEIGHT_LIKES", "lots")]).is_err());
    }

    #[test]
    fn test_half_life_validation() {
        assert!(config_from(&[("CURATOR_POST_HALF_LIFE_DAYS", "0")]).is_err());
        assert!(config_from(&[("CURATOR_POST_HALF_LIFE_DAYS", "week")]).is_err());
        let config = config_from(&[("CURATOR_REPLY_HALF_LIFE_DAYS", " 7 ")]).unwrap();
        assert_eq!(config.half_life_days(ContentKind::Reply), 7);
    }

    #[test]
    fn test_postgres_detection() {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/curator")]).unwrap();
        assert!(config.uses_postgres());
    }
}
