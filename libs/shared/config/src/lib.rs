use std::env;
use std::path::PathBuf;
use tracing::warn;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_SNAPSHOT_PATH: &str = "data/clinic_snapshot.json";
const DEFAULT_SESSION_TTL_HOURS: i64 = 12;
/// Thirty days.
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 30;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub snapshot_path: PathBuf,
    pub session_secret: String,
    pub session_ttl_hours: i64,
    pub seed_doctors: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| {
                    warn!("BIND_ADDR not set, using default");
                    DEFAULT_BIND_ADDR.to_string()
                }),
            snapshot_path: env::var("SNAPSHOT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    warn!("SNAPSHOT_PATH not set, using default");
                    PathBuf::from(DEFAULT_SNAPSHOT_PATH)
                }),
            session_secret: env::var("SESSION_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SESSION_SECRET not set, using empty value");
                    String::new()
                }),
            session_ttl_hours: parse_session_ttl_hours(env::var("SESSION_TTL_HOURS").ok()),
            seed_doctors: parse_seed_doctors(env::var("SEED_DOCTORS").ok()),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - SESSION_SECRET is required for sessions");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.session_secret.is_empty()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
            session_secret: String::new(),
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            seed_doctors: true,
        }
    }
}

fn parse_session_ttl_hours(raw: Option<String>) -> i64 {
    let Some(raw) = raw else {
        warn!("SESSION_TTL_HOURS not set, using default");
        return DEFAULT_SESSION_TTL_HOURS;
    };

    match raw.trim().parse::<i64>() {
        Ok(hours) if hours > MAX_SESSION_TTL_HOURS => {
            warn!(
                "SESSION_TTL_HOURS {} exceeds the maximum, capping at {}",
                hours, MAX_SESSION_TTL_HOURS
            );
            MAX_SESSION_TTL_HOURS
        }
        Ok(hours) if hours > 0 => hours,
        _ => {
            warn!("SESSION_TTL_HOURS is not a positive integer: {}", raw);
            DEFAULT_SESSION_TTL_HOURS
        }
    }
}

fn parse_seed_doctors(raw: Option<String>) -> bool {
    match raw {
        Some(raw) => !matches!(raw.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no"),
        None => {
            warn!("SEED_DOCTORS not set, using default");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ttl_is_capped_and_defaulted() {
        assert_eq!(parse_session_ttl_hours(None), DEFAULT_SESSION_TTL_HOURS);
        assert_eq!(parse_session_ttl_hours(Some("24".to_string())), 24);
        assert_eq!(
            parse_session_ttl_hours(Some(i64::MAX.to_string())),
            MAX_SESSION_TTL_HOURS
        );
        assert_eq!(
            parse_session_ttl_hours(Some("0".to_string())),
            DEFAULT_SESSION_TTL_HOURS
        );
        assert_eq!(
            parse_session_ttl_hours(Some("soon".to_string())),
            DEFAULT_SESSION_TTL_HOURS
        );
    }

    #[test]
    fn seed_doctors_defaults_to_true() {
        assert!(parse_seed_doctors(None));
        assert!(parse_seed_doctors(Some("true".to_string())));
        assert!(!parse_seed_doctors(Some("FALSE".to_string())));
        assert!(!parse_seed_doctors(Some("0".to_string())));
    }
}
