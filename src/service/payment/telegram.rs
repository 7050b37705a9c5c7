use async_trait::async_trait;

use crate::{reply::Invoice, service::subscription::CURRENCY};

use super::{Checkout, PaymentError, PaymentIntent, PaymentMethod, PaymentProvider};

/// Telegram amounts are in cents.
const CENTS_PER_SHILLING: u32 = 100;

enum Mode {
    Simulated,
    Invoice { provider_token: String },
}

/// Payment inside Telegram: an invoice settled through the pre-checkout and
/// `successful_payment` updates.
pub struct TelegramPayment {
    mode: Mode,
}

impl TelegramPayment {
    pub fn new(provider_token: impl Into<String>) -> Self {
        Self {
            mode: Mode::Invoice {
                provider_token: provider_token.into(),
            },
        }
    }

    pub fn simulated() -> Self {
        warn!("Telegram payments are simulated, every checkout settles immediately");
        Self { mode: Mode::Simulated }
    }
}

#[async_trait]
impl PaymentProvider for TelegramPayment {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Telegram
    }

    async fn checkout(&self, intent: &PaymentIntent) -> Result<Checkout, PaymentError> {
        let provider_token = match &self.mode {
            Mode::Simulated => {
                debug!("Simulating settlement of payment {}", intent.id);
                return Ok(Checkout::Settled);
            }
            Mode::Invoice { provider_token } => provider_token,
        };

        let amount = intent
            .amount
            .checked_mul(CENTS_PER_SHILLING)
            .ok_or_else(|| PaymentError::Checkout(format!("Amount {} out of range", intent.amount)))?;

        Ok(Checkout::Invoice(Invoice {
            title: t!("messages.subscription.invoice.title", tier = intent.tier.display_name()).to_string(),
            description: t!(
                "messages.subscription.invoice.description",
                tier = intent.tier.display_name(),
                currency = CURRENCY,
                price = intent.amount
            )
            .to_string(),
            payload: intent.reference(),
            provider_token: provider_token.clone(),
            currency: CURRENCY.to_string(),
            amount,
        }))
    }
}
