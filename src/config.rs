use std::env;

/// Per-endpoint-class rate limit budgets (requests per fixed window).
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub payment_rpm: u32,
    pub webhook_rpm: u32,
    pub api_rpm: u32,
    pub auth_rpm: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            payment_rpm: 10,
            webhook_rpm: 100,
            api_rpm: 100,
            auth_rpm: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Primary application origin (allow-listed for CSRF checks).
    pub app_url: String,
    /// Production origin (second allow-list entry; may equal `app_url`).
    pub production_url: String,
    /// Gateway API key id (basic auth user for order creation).
    pub gateway_key_id: String,
    /// Gateway shared secret: signs `order_id|payment_id` on client callbacks.
    pub gateway_key_secret: String,
    /// Upper bound on payment amounts, in currency minor units.
    pub max_amount_minor: i64,
    pub rate_limit: RateLimitConfig,
    pub dev_mode: bool,
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("TIPJAR_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let app_url =
            env::var("APP_URL").unwrap_or_else(|_| format!("http://{}:{}", host, port));
        let production_url = env::var("PRODUCTION_URL").unwrap_or_else(|_| app_url.clone());

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            payment_rpm: env_u32("RATE_LIMIT_PAYMENT_RPM", defaults.payment_rpm),
            webhook_rpm: env_u32("RATE_LIMIT_WEBHOOK_RPM", defaults.webhook_rpm),
            api_rpm: env_u32("RATE_LIMIT_API_RPM", defaults.api_rpm),
            auth_rpm: env_u32("RATE_LIMIT_AUTH_RPM", defaults.auth_rpm),
        };

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "tipjar.db".to_string()),
            app_url,
            production_url,
            gateway_key_id: env::var("GATEWAY_KEY_ID").unwrap_or_default(),
            gateway_key_secret: env::var("GATEWAY_KEY_SECRET").unwrap_or_default(),
            max_amount_minor: env::var("MAX_AMOUNT_MINOR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000_000),
            rate_limit,
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
