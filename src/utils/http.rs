use reqwest::Client;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "BoostBizzBot/1.0";

/// HTTP client the bot talks to the Telegram API with, on top of teloxide's defaults.
pub fn create_telegram_client() -> Result<Client, reqwest::Error> {
    teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .pool_idle_timeout(Duration::from_secs(60))
        .tcp_keepalive(Duration::from_secs(30))
        .user_agent(DEFAULT_USER_AGENT)
        .build()
}
