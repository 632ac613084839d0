use std::{env, time::Duration};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Contact handle the checkout deep link opens a chat with.
    pub whatsapp_phone: String,
    pub order_prefix: String,
    /// Quiet window after the last cart edit before the mirror writes.
    pub mirror_debounce: Duration,
    pub public_base_url: String,
    pub storefront_path: String,
    pub recovery_redirect: Duration,
    pub clear_cart_after_checkout: bool,
    pub tracking_buffer: usize,
}

impl AppConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            whatsapp_phone: "5492235416600".to_string(),
            order_prefix: "ECOM".to_string(),
            mirror_debounce: Duration::from_millis(2000),
            public_base_url: "https://banderasmdp.com".to_string(),
            storefront_path: "/tienda".to_string(),
            recovery_redirect: Duration::from_millis(2000),
            clear_cart_after_checkout: false,
            tracking_buffer: 256,
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::new(env::var("DATABASE_URL")?);

        if let Ok(host) = env::var("APP_HOST") {
            config.host = host;
        }
        if let Some(port) = parsed::<u16>("APP_PORT") {
            config.port = port;
        }
        if let Ok(phone) = env::var("WHATSAPP_PHONE") {
            config.whatsapp_phone = phone;
        }
        if let Ok(prefix) = env::var("ORDER_NUMBER_PREFIX") {
            config.order_prefix = prefix;
        }
        if let Some(ms) = parsed::<u64>("CART_MIRROR_DEBOUNCE_MS") {
            config.mirror_debounce = Duration::from_millis(ms);
        }
        if let Ok(base) = env::var("PUBLIC_BASE_URL") {
            config.public_base_url = base.trim_end_matches('/').to_string();
        }
        if let Ok(path) = env::var("STOREFRONT_PATH") {
            config.storefront_path = path;
        }
        if let Some(ms) = parsed::<u64>("RECOVERY_REDIRECT_MS") {
            config.recovery_redirect = Duration::from_millis(ms);
        }
        if let Some(clear) = parsed::<bool>("CLEAR_CART_AFTER_CHECKOUT") {
            config.clear_cart_after_checkout = clear;
        }
        if let Some(buffer) = parsed::<usize>("TRACKING_BUFFER") {
            config.tracking_buffer = buffer.max(1);
        }

        Ok(config)
    }

    /// The session id is percent-encoded into a single path segment.
    pub fn recovery_link(&self, session_id: &str) -> String {
        format!(
            "{}{}/recuperar-carrito/{}",
            self.public_base_url,
            self.storefront_path,
            urlencoding::encode(session_id)
        )
    }
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|value| value.trim().parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovery_link_keeps_the_session_in_one_segment() {
        let config = AppConfig::new("postgres://unused");

        assert_eq!(
            config.recovery_link("ecom_1720000000_ab12"),
            "https://banderasmdp.com/tienda/recuperar-carrito/ecom_1720000000_ab12"
        );
        assert_eq!(
            config.recovery_link("a/b?c#d"),
            "https://banderasmdp.com/tienda/recuperar-carrito/a%2Fb%3Fc%23d"
        );
    }
}
