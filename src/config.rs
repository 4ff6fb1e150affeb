use std::env;

use crate::error::{AppError, Result};

/// Per-IP rate limits for public endpoints, in requests per minute. 0 disables a tier.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Sign-up, sign-in and invite acceptance
    pub strict_rpm: u32,
    /// Invite validation, catalog, settings
    pub standard_rpm: u32,
}

impl RateLimitConfig {
    pub fn disabled() -> Self {
        Self {
            strict_rpm: 0,
            standard_rpm: 0,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            strict_rpm: 10,
            standard_rpm: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub base_url: String,
    pub dev_mode: bool,
    pub jwt_secret: String,
    pub session_ttl_hours: u64,
    pub invite_expiry_days: i64,
    pub resend_api_key: Option<String>,
    pub email_from: String,
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub ai_api_url: String,
    pub ai_api_key: Option<String>,
    pub ai_model: String,
    pub cors_origins: Vec<String>,
    pub rate_limit: RateLimitConfig,
    pub reminder_interval_secs: u64,
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("BROKERDESK_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env_parse("PORT", 3000);

        let base_url = env::var("BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let jwt_secret = match env_opt("JWT_SECRET") {
            Some(secret) => secret,
            None if dev_mode => {
                tracing::warn!("JWT_SECRET not set, using an insecure development secret");
                "brokerdesk-dev-secret-do-not-use-in-production".to_string()
            }
            None => {
                return Err(AppError::Internal(
                    "JWT_SECRET must be set outside of dev mode".into(),
                ));
            }
        };

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            strict_rpm: env_parse("RATE_LIMIT_STRICT_RPM", defaults.strict_rpm),
            standard_rpm: env_parse("RATE_LIMIT_STANDARD_RPM", defaults.standard_rpm),
        };

        Ok(Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "brokerdesk.db".to_string()),
            base_url,
            dev_mode,
            jwt_secret,
            session_ttl_hours: env_parse("SESSION_TTL_HOURS", 24),
            invite_expiry_days: env_parse("INVITE_EXPIRY_DAYS", 7),
            resend_api_key: env_opt("RESEND_API_KEY"),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "Brokerdesk <noreply@brokerdesk.local>".to_string()),
            stripe_secret_key: env_opt("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: env_opt("STRIPE_WEBHOOK_SECRET"),
            ai_api_url: env::var("AI_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string()),
            ai_api_key: env_opt("AI_API_KEY"),
            ai_model: env::var("AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            cors_origins,
            rate_limit,
            reminder_interval_secs: env_parse("REMINDER_INTERVAL_SECS", 900),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
