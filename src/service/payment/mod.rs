mod mpesa;
mod telegram;

pub use mpesa::MpesaPayment;
pub use telegram::TelegramPayment;

use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::{reply::Invoice, service::subscription::SubscriptionTier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Telegram,
    Mpesa,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 2] = [PaymentMethod::Telegram, PaymentMethod::Mpesa];
}

impl FromStr for PaymentMethod {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "telegram" => Ok(PaymentMethod::Telegram),
            "mpesa" => Ok(PaymentMethod::Mpesa),
            _ => Err(PaymentError::UnsupportedMethod(s.to_string())),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Telegram => f.write_str("telegram"),
            PaymentMethod::Mpesa => f.write_str("mpesa"),
        }
    }
}

/// A payment waiting for confirmation. Its id is the payload confirmations carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: Uuid,
    pub user_id: String,
    pub tier: SubscriptionTier,
    pub method: PaymentMethod,
    pub amount: u32,
    pub created_at: DateTime<Utc>,
}

impl PaymentIntent {
    pub fn new(user_id: &str, tier: SubscriptionTier, method: PaymentMethod) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            tier,
            method,
            amount: tier.price(),
            created_at: Utc::now(),
        }
    }

    pub fn reference(&self) -> String {
        self.id.to_string()
    }
}

/// What the provider did with a new intent.
#[derive(Debug, Clone, PartialEq)]
pub enum Checkout {
    /// Paid already, the confirmation can be fed right away.
    Settled,
    /// An invoice goes out to the user, the platform reports the payment later.
    Invoice(Invoice),
    /// The user has to finish paying on an external page.
    Redirect(Url),
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn method(&self) -> PaymentMethod;
    async fn checkout(&self, intent: &PaymentIntent) -> Result<Checkout, PaymentError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Unsupported payment method: {0}")]
    UnsupportedMethod(String),
    #[error("Unknown payment reference: {0}")]
    UnknownIntent(String),
    #[error("Payment {0} belongs to another user")]
    ForeignIntent(String),
    #[error("Checkout failed: {0}")]
    Checkout(String),
}

#[derive(Clone)]
pub struct PaymentService {
    providers: Arc<HashMap<PaymentMethod, Arc<dyn PaymentProvider>>>,
    pending: Arc<DashMap<Uuid, PaymentIntent>>,
    intent_ttl: Duration,
}

impl PaymentService {
    pub fn new(providers: Vec<Arc<dyn PaymentProvider>>, intent_ttl: Duration) -> Self {
        info!("Initializing PaymentService with {} providers", providers.len());
        let providers = providers
            .into_iter()
            .map(|provider| (provider.method(), provider))
            .collect();

        Self {
            providers: Arc::new(providers),
            pending: Arc::new(DashMap::new()),
            intent_ttl,
        }
    }

    /// Registered methods in menu order.
    pub fn methods(&self) -> Vec<PaymentMethod> {
        PaymentMethod::ALL
            .into_iter()
            .filter(|method| self.providers.contains_key(method))
            .collect()
    }

    pub fn supports(&self, method: PaymentMethod) -> bool {
        self.providers.contains_key(&method)
    }

    /// Registers the intent as pending and hands it to its provider.
    ///
    /// A user has at most one open intent: once the checkout starts, any earlier intent of
    /// the same user can no longer be confirmed.
    pub async fn begin(&self, intent: PaymentIntent) -> Result<(PaymentIntent, Checkout), PaymentError> {
        let provider = self
            .providers
            .get(&intent.method)
            .ok_or_else(|| PaymentError::UnsupportedMethod(intent.method.to_string()))?;

        self.pending.insert(intent.id, intent.clone());

        match provider.checkout(&intent).await {
            Ok(checkout) => {
                let mut replaced = 0;
                self.pending.retain(|id, pending| {
                    let keep = *id == intent.id || pending.user_id != intent.user_id;
                    replaced += usize::from(!keep);
                    keep
                });

                info!(
                    "Payment {} started: user={}, tier={}, method={}, amount={}, replaced={}",
                    intent.id, intent.user_id, intent.tier, intent.method, intent.amount, replaced
                );
                Ok((intent, checkout))
            }
            Err(e) => {
                self.pending.remove(&intent.id);
                Err(e)
            }
        }
    }

    /// Removes and returns the pending intent for `reference` if it belongs to `user_id`.
    pub fn take(&self, reference: &str, user_id: &str) -> Result<PaymentIntent, PaymentError> {
        let id = Uuid::parse_str(reference.trim()).map_err(|_| PaymentError::UnknownIntent(reference.to_string()))?;

        let (_, intent) = self
            .pending
            .remove_if(&id, |_, intent| intent.user_id == user_id)
            .ok_or_else(|| {
                if self.pending.contains_key(&id) {
                    PaymentError::ForeignIntent(reference.to_string())
                } else {
                    PaymentError::UnknownIntent(reference.to_string())
                }
            })?;

        Ok(intent)
    }

    /// Whether `reference` is a pending intent of `user_id`.
    #[cfg(test)]
    pub fn is_pending(&self, reference: &str, user_id: &str) -> bool {
        self.pending_tier(reference, user_id).is_some()
    }

    /// Tier of the pending intent `reference` when it belongs to `user_id`.
    pub fn pending_tier(&self, reference: &str, user_id: &str) -> Option<SubscriptionTier> {
        let id = Uuid::parse_str(reference.trim()).ok()?;
        self.pending
            .get(&id)
            .filter(|intent| intent.user_id == user_id)
            .map(|intent| intent.tier)
    }

    /// Puts an intent back so its confirmation can be retried.
    pub fn restore(&self, intent: PaymentIntent) {
        self.pending.insert(intent.id, intent);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drops intents opened longer than the intent TTL ago, returns how many went.
    pub fn cleanup_stale(&self, now: DateTime<Utc>) -> usize {
        let intent_ttl = self.intent_ttl;
        let mut expired = 0;
        self.pending.retain(|_, intent| {
            let keep = now - intent.created_at <= intent_ttl;
            expired += usize::from(!keep);
            keep
        });

        if expired > 0 {
            info!("Expired {} unconfirmed payments, {} pending", expired, self.pending.len());
        }

        expired
    }

    #[cfg(test)]
    pub fn pending_reference(&self, user_id: &str) -> Option<String> {
        self.pending
            .iter()
            .find(|entry| entry.user_id == user_id)
            .map(|entry| entry.reference())
    }
}
