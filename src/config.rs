use anyhow::{bail, Context};
use serde::Deserialize;

/// Upper bound for `JWT_TTL_MINUTES`: one year.
pub const MAX_TTL_MINUTES: i64 = 365 * 24 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Argon2id cost parameters. Defaults follow the argon2 crate's recommended
/// values (19 MiB, 2 passes, 1 lane).
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u32>().ok());

        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());

        let secret = lookup("JWT_SECRET").context("JWT_SECRET must be set")?;
        if secret.is_empty() {
            bail!("JWT_SECRET must not be empty");
        }

        let ttl_minutes = lookup("JWT_TTL_MINUTES")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(60);
        if !(1..=MAX_TTL_MINUTES).contains(&ttl_minutes) {
            bail!("JWT_TTL_MINUTES must be between 1 and {MAX_TTL_MINUTES}, got {ttl_minutes}");
        }

        let jwt = JwtConfig {
            secret,
            issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "taskgate".into()),
            audience: lookup("JWT_AUDIENCE").unwrap_or_else(|| "taskgate-users".into()),
            ttl_minutes,
        };

        let defaults = PasswordConfig::default();
        let password = PasswordConfig {
            memory_kib: parsed("PASSWORD_MEMORY_KIB").unwrap_or(defaults.memory_kib),
            iterations: parsed("PASSWORD_ITERATIONS").unwrap_or(defaults.iterations),
            parallelism: parsed("PASSWORD_PARALLELISM").unwrap_or(defaults.parallelism),
        };

        Ok(Self {
            database_url,
            jwt,
            password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let cfg = config_from(&[("JWT_SECRET", "s3cret")]).expect("config");
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.jwt.secret, "s3cret");
        assert_eq!(cfg.jwt.issuer, "taskgate");
        assert_eq!(cfg.jwt.audience, "taskgate-users");
        assert_eq!(cfg.jwt.ttl_minutes, 60);
        assert_eq!(cfg.password.memory_kib, argon2::Params::DEFAULT_M_COST);
        assert_eq!(cfg.password.iterations, argon2::Params::DEFAULT_T_COST);
        assert_eq!(cfg.password.parallelism, argon2::Params::DEFAULT_P_COST);
    }

    #[test]
    fn missing_or_empty_secret_is_an_error() {
        assert!(config_from(&[]).is_err());
        assert!(config_from(&[("JWT_SECRET", "")]).is_err());
    }

    #[test]
    fn non_positive_ttl_is_rejected() {
        let err = config_from(&[("JWT_SECRET", "x"), ("JWT_TTL_MINUTES", "0")]).unwrap_err();
        assert!(err.to_string().contains("JWT_TTL_MINUTES"));
    }

    #[test]
    fn ttl_above_one_year_is_rejected() {
        let max = MAX_TTL_MINUTES.to_string();
        let cfg = config_from(&[("JWT_SECRET", "x"), ("JWT_TTL_MINUTES", max.as_str())])
            .expect("one year is allowed");
        assert_eq!(cfg.jwt.ttl_minutes, MAX_TTL_MINUTES);

        let over = (MAX_TTL_MINUTES + 1).to_string();
        let err = config_from(&[("JWT_SECRET", "x"), ("JWT_TTL_MINUTES", over.as_str())])
            .unwrap_err();
        assert!(err.to_string().contains("JWT_TTL_MINUTES"));

        let huge = i64::MAX.to_string();
        assert!(config_from(&[("JWT_SECRET", "x"), ("JWT_TTL_MINUTES", huge.as_str())]).is_err());
    }

    #[test]
    fn explicit_values_override_defaults() {
        let cfg = config_from(&[
            ("JWT_SECRET", "x"),
            ("DATABASE_URL", "postgres://localhost/tasks"),
            ("JWT_TTL_MINUTES", "15"),
            ("JWT_ISSUER", "iss"),
            ("PASSWORD_MEMORY_KIB", "4096"),
            ("PASSWORD_ITERATIONS", "3"),
            ("PASSWORD_PARALLELISM", "not-a-number"),
        ])
        .expect("config");
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/tasks"));
        assert_eq!(cfg.jwt.ttl_minutes, 15);
        assert_eq!(cfg.jwt.issuer, "iss");
        assert_eq!(cfg.password.memory_kib, 4096);
        assert_eq!(cfg.password.iterations, 3);
        assert_eq!(cfg.password.parallelism, argon2::Params::DEFAULT_P_COST);
    }

    #[test]
    fn blank_database_url_means_in_memory() {
        let cfg = config_from(&[("JWT_SECRET", "x"), ("DATABASE_URL", "  ")]).expect("config");
        assert!(cfg.database_url.is_none());
    }
}
