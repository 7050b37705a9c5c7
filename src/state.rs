use std::sync::Arc;

use crate::{
    config::AppConfig,
    controller::BotController,
    error::BotResult,
    service::{
        dialogue::DialogueService,
        payment::{MpesaPayment, PaymentProvider, PaymentService, TelegramPayment},
    },
    storage::open_user_store,
};

/// Shared by every handler through the dispatcher's dependency map.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<BotController>,
}

impl AppState {
    pub async fn new(config: &AppConfig) -> BotResult<Self> {
        let store = open_user_store(&config.storage).await?;

        let dialogue = DialogueService::new(
            config.session.cache_capacity,
            chrono::Duration::seconds(config.session.idle_timeout_secs),
        );

        let mut providers: Vec<Arc<dyn PaymentProvider>> = Vec::new();
        if config.payment.simulate {
            providers.push(Arc::new(TelegramPayment::simulated()));
        } else if let Some(provider_token) = &config.payment.provider_token {
            providers.push(Arc::new(TelegramPayment::new(provider_token.clone())));
        }
        if let Some(pay_url) = &config.payment.mpesa_pay_url {
            providers.push(Arc::new(MpesaPayment::new(pay_url.clone())));
        }

        let controller = BotController::new(
            store,
            dialogue,
            PaymentService::new(providers, chrono::Duration::seconds(config.payment.intent_ttl_secs)),
            config.dashboard.url.clone(),
        );

        Ok(Self {
            controller: Arc::new(controller),
        })
    }
}
