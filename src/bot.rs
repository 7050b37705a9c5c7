use std::{sync::Arc, time::Duration};

use teloxide::{dptree, prelude::*, Bot};

use crate::{
    command::setup_user_commands,
    config::AppConfig,
    controller::BotController,
    error::{BotError, BotResult},
    handler::get_handler,
    state::AppState,
    utils::http,
};

pub struct BotService {
    pub bot: Bot,
    pub state: AppState,
    cleanup_interval: Duration,
}

impl BotService {
    pub async fn new(config: &AppConfig) -> BotResult<Self> {
        info!("Initializing AppState...");
        let state = AppState::new(config).await?;
        info!("AppState initialized");

        let client = http::create_telegram_client().map_err(|e| BotError::Other(e.into()))?;
        let bot = Bot::with_client(config.telegram.0.clone(), client);

        Ok(Self {
            bot,
            state,
            cleanup_interval: Duration::from_secs(config.session.cleanup_interval_secs),
        })
    }

    pub async fn start(&self) -> BotResult<()> {
        info!("Testing connection to Telegram API...");
        match self.bot.get_me().await {
            Ok(me) => info!("Successfully connected to Telegram API as @{}", me.username()),
            Err(e) => {
                error!("Failed to connect to Telegram API: {:?}", e);
                return Err(e.into());
            }
        }

        setup_user_commands(&self.bot).await?;

        start_cleanup_job(Arc::clone(&self.state.controller), self.cleanup_interval);

        Dispatcher::builder(self.bot.clone(), get_handler())
            .dependencies(dptree::deps![self.state.clone()])
            .error_handler(LoggingErrorHandler::with_custom_text(
                "An error has occurred in the dispatcher",
            ))
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        Ok(())
    }
}

fn start_cleanup_job(controller: Arc<BotController>, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let cleanup = controller.cleanup_stale(chrono::Utc::now());
            debug!(
                "Cleanup finished, {} conversations and {} payments evicted",
                cleanup.sessions, cleanup.payments
            );
        }
    });
}
