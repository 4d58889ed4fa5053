// Configuration du service, chargée depuis les variables d'environnement.
use crate::error::ConfigError;
use crate::sampler::SamplingPolicy;
use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

#[derive(Debug, Clone)]
pub struct Config {
    // Fichier SQLite (`:memory:` accepté).
    pub database_file: String,
    pub bind_addr: SocketAddr,
    // Répertoire servi en fallback pour les fichiers statiques.
    pub static_dir: PathBuf,
    // Fichier sysfs/IIO du capteur de température. Absent : pas d'échantillonnage.
    pub sensor_path: Option<PathBuf>,
    pub sampling: SamplingPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    // Séparé de `from_env` pour pouvoir tester sans toucher à l'environnement du processus.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = SamplingPolicy::default();

        let max_attempts = parse_or(&lookup, "SENSOR_MAX_ATTEMPTS", defaults.max_attempts)?;
        if max_attempts == 0 {
            return Err(invalid(&lookup, "SENSOR_MAX_ATTEMPTS"));
        }
        let attempt_delay = secs_or(&lookup, "SENSOR_RETRY_DELAY_SECS", defaults.attempt_delay)?;
        let attempt_timeout = secs_or(&lookup, "SENSOR_TIMEOUT_SECS", defaults.attempt_timeout)?;
        // Un délai nul ferait échouer chaque lecture avant même qu'elle commence.
        if attempt_timeout.is_zero() {
            return Err(invalid(&lookup, "SENSOR_TIMEOUT_SECS"));
        }

        let sampling = SamplingPolicy {
            max_attempts,
            attempt_delay,
            cycle_interval: secs_or(&lookup, "SENSOR_INTERVAL_SECS", defaults.cycle_interval)?,
            // Une lecture ne doit pas durer plus longtemps que l'écart entre deux tentatives.
            attempt_timeout: if attempt_delay.is_zero() {
                attempt_timeout
            } else {
                attempt_timeout.min(attempt_delay)
            },
        };

        Ok(Self {
            database_file: lookup("DATABASE_FILE").unwrap_or_else(|| "kiosk_board.db".to_string()),
            bind_addr: parse_or(&lookup, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 5000)))?,
            static_dir: lookup("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("static")),
            sensor_path: lookup("SENSOR_PATH")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            sampling,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

fn invalid<F>(lookup: &F, name: &'static str) -> ConfigError
where
    F: Fn(&str) -> Option<String>,
{
    ConfigError::Invalid {
        name,
        value: lookup(name).unwrap_or_default(),
    }
}

fn secs_or<F>(lookup: &F, name: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    parse_or(lookup, name, default.as_secs()).map(Duration::from_secs)
}
