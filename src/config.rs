use chrono::Duration;

use crate::errors::{AppError, AppResult};
use crate::jwt::JwtConfig;

/// One year. Larger reminder windows are rejected at startup.
pub const MAX_DEADLINE_WINDOW_HOURS: i64 = 24 * 365;

/// Process configuration read from the environment. `DATABASE_URL` is read
/// separately by [`crate::db::init`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub jwt: JwtConfig,
    pub deadline_window_hours: i64,
    pub cookie_secure: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let port = parse_var("APP_PORT", 8000u16)?;
        let deadline_window_hours = parse_var("DEADLINE_WINDOW_HOURS", 24i64)?;
        if !(1..=MAX_DEADLINE_WINDOW_HOURS).contains(&deadline_window_hours) {
            return Err(AppError::configuration(format!(
                "DEADLINE_WINDOW_HOURS must be between 1 and {MAX_DEADLINE_WINDOW_HOURS}"
            )));
        }
        let cookie_secure = parse_var("SESSION_COOKIE_SECURE", false)?;

        Ok(Self {
            port,
            jwt: JwtConfig::from_env()?,
            deadline_window_hours,
            cookie_secure,
        })
    }

    pub fn deadline_window(&self) -> AppResult<Duration> {
        Duration::try_hours(self.deadline_window_hours)
            .ok_or_else(|| AppError::internal("deadline window is out of range"))
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::configuration(format!("{name} has an invalid value: {raw}"))),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both cases share one test so the env mutation cannot race another test.
    #[test]
    fn deadline_window_is_bounded() {
        std::env::set_var("JWT_SECRET", "config-test-secret");

        std::env::set_var("DEADLINE_WINDOW_HOURS", "3000000000");
        let err = AppConfig::from_env().unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));

        std::env::set_var("DEADLINE_WINDOW_HOURS", "0");
        assert!(matches!(AppConfig::from_env(), Err(AppError::Configuration(_))));

        std::env::set_var("DEADLINE_WINDOW_HOURS", MAX_DEADLINE_WINDOW_HOURS.to_string());
        let cfg = AppConfig::from_env().unwrap();
        assert_eq!(cfg.deadline_window().unwrap(), Duration::hours(MAX_DEADLINE_WINDOW_HOURS));

        std::env::remove_var("DEADLINE_WINDOW_HOURS");
    }
}
