mod model;

pub use model::{SubscriptionTier, CURRENCY};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use url::Url;

use crate::{
    context::UserContext,
    reply::{get_checkout_keyboard, get_dashboard_keyboard, get_payment_method_keyboard, get_tier_keyboard, Reply},
    service::{
        payment::{Checkout, PaymentIntent, PaymentMethod, PaymentService},
        user::{User, UserPatch},
        ServiceError,
    },
    storage::UserStore,
    utils::dashboard_url,
};

/// Outcome of picking a payment method.
#[derive(Debug)]
pub struct PaymentStep {
    pub replies: Vec<Reply>,
    /// Reference of a payment the provider settled on the spot. It still has to go through
    /// [`SubscriptionFlow::confirm_payment`].
    pub settled: Option<String>,
}

#[derive(Clone)]
pub struct SubscriptionFlow {
    store: Arc<dyn UserStore>,
    payments: PaymentService,
    dashboard_url: Url,
}

impl SubscriptionFlow {
    pub fn new(store: Arc<dyn UserStore>, payments: PaymentService, dashboard_url: Url) -> Self {
        Self {
            store,
            payments,
            dashboard_url,
        }
    }

    pub fn tier_menu(&self) -> Reply {
        Reply::text(t!("messages.subscription.choose_tier")).with_choices(get_tier_keyboard())
    }

    /// Quotes the price of a tier, or activates the free tier right away.
    pub async fn select_tier(&self, user: &UserContext, selection: &str) -> Result<Vec<Reply>, ServiceError> {
        let tier = SubscriptionTier::from_catalog(selection)
            .ok_or_else(|| ServiceError::InvalidSelection(format!("tier {}", selection)))?;

        let current = self.load_user(&user.user_id).await?;
        if is_on_tier(&current, tier) {
            return Ok(vec![self.already_subscribed(&user.user_id, tier)]);
        }

        if !tier.is_paid() {
            self.activate(&user.user_id, tier).await?;
            return Ok(vec![Reply::text(t!("messages.subscription.free_activated"))
                .with_choices(get_dashboard_keyboard(dashboard_url(&self.dashboard_url, &user.user_id)))]);
        }

        debug!("Quoting {} {} for tier {} to user {}", CURRENCY, tier.price(), tier, user.user_id);

        let text = t!(
            "messages.subscription.price",
            tier = tier.display_name(),
            currency = CURRENCY,
            price = tier.price()
        );

        Ok(vec![
            Reply::text(text).with_choices(get_payment_method_keyboard(tier, &self.payments.methods()))
        ])
    }

    /// Opens a payment intent for a paid tier with the chosen method.
    pub async fn select_payment(&self, user: &UserContext, method: &str, tier: &str) -> Result<PaymentStep, ServiceError> {
        let tier = SubscriptionTier::from_catalog(tier)
            .filter(SubscriptionTier::is_paid)
            .ok_or_else(|| ServiceError::InvalidSelection(format!("paid tier {}", tier)))?;

        let method: PaymentMethod = method.parse()?;
        if !self.payments.supports(method) {
            return Err(ServiceError::InvalidSelection(format!("payment method {}", method)));
        }

        let current = self.load_user(&user.user_id).await?;
        if is_on_tier(&current, tier) {
            return Ok(PaymentStep {
                replies: vec![self.already_subscribed(&user.user_id, tier)],
                settled: None,
            });
        }

        let (intent, checkout) = self
            .payments
            .begin(PaymentIntent::new(&user.user_id, tier, method))
            .await?;

        let step = match checkout {
            Checkout::Settled => PaymentStep {
                replies: vec![Reply::text(t!("messages.subscription.processing"))],
                settled: Some(intent.reference()),
            },
            Checkout::Invoice(invoice) => PaymentStep {
                replies: vec![Reply::text(t!(
                    "messages.subscription.awaiting_confirmation",
                    currency = CURRENCY,
                    price = intent.amount
                ))
                .with_invoice(invoice)],
                settled: None,
            },
            Checkout::Redirect(url) => PaymentStep {
                replies: vec![Reply::text(t!(
                    "messages.subscription.complete_on_page",
                    currency = CURRENCY,
                    price = intent.amount
                ))
                .with_choices(get_checkout_keyboard(method, url))],
                settled: None,
            },
        };

        Ok(step)
    }

    /// Settles a pending payment and unlocks the dashboard.
    ///
    /// Simulated and gateway confirmations both end up here. A confirmation for the tier the
    /// user already holds consumes the intent without writing.
    pub async fn confirm_payment(&self, user: &UserContext, reference: &str) -> Result<Vec<Reply>, ServiceError> {
        let intent = self.payments.take(reference, &user.user_id)?;

        let current = match self.load_user(&user.user_id).await {
            Ok(current) => current,
            Err(e) => {
                self.payments.restore(intent);
                return Err(e);
            }
        };
        if is_on_tier(&current, intent.tier) {
            warn!(
                "Payment {} confirmed for tier {} user {} already holds, not recorded",
                intent.id, intent.tier, user.user_id
            );
            return Ok(vec![self.already_subscribed(&user.user_id, intent.tier)]);
        }

        if let Err(e) = self.activate(&user.user_id, intent.tier).await {
            warn!("Payment {} confirmed but not recorded, keeping it pending", intent.id);
            self.payments.restore(intent);
            return Err(e);
        }

        info!(
            "Payment {} confirmed: user={}, tier={}, amount={} {}",
            intent.id, user.user_id, intent.tier, CURRENCY, intent.amount
        );

        Ok(vec![Reply::text(t!(
            "messages.subscription.payment_received",
            tier = intent.tier.display_name()
        ))
        .with_choices(get_dashboard_keyboard(dashboard_url(&self.dashboard_url, &user.user_id)))])
    }

    /// Read-only check behind `/continue`.
    pub async fn dashboard_access(&self, user: &UserContext) -> Result<Vec<Reply>, ServiceError> {
        let subscribed = self
            .store
            .get(&user.user_id)
            .await?
            .is_some_and(|current| current.is_subscribed());

        if !subscribed {
            return Err(ServiceError::UnauthorizedDashboardAccess(user.user_id.clone()));
        }

        Ok(vec![Reply::text(t!("messages.subscription.dashboard_ready"))
            .with_choices(get_dashboard_keyboard(dashboard_url(&self.dashboard_url, &user.user_id)))])
    }

    /// Whether a checkout for `reference` may still be paid by this user. Intents for a tier
    /// the user already holds are refused.
    pub async fn accepts_payment(&self, user: &UserContext, reference: &str) -> bool {
        let Some(tier) = self.payments.pending_tier(reference, &user.user_id) else {
            return false;
        };

        match self.store.get(&user.user_id).await {
            Ok(Some(current)) => !is_on_tier(&current, tier),
            Ok(None) => false,
            Err(e) => {
                error!("Cannot check checkout {} for user {}: {}", reference, user.user_id, e);
                false
            }
        }
    }

    pub fn pending_payments(&self) -> usize {
        self.payments.pending_count()
    }

    pub fn cleanup_stale_payments(&self, now: DateTime<Utc>) -> usize {
        self.payments.cleanup_stale(now)
    }

    #[cfg(test)]
    pub fn pending_reference(&self, user_id: &str) -> Option<String> {
        self.payments.pending_reference(user_id)
    }

    async fn activate(&self, user_id: &str, tier: SubscriptionTier) -> Result<(), ServiceError> {
        self.store.update(user_id, &UserPatch::subscription(tier)).await?;
        info!("User {} subscribed to tier {}", user_id, tier);
        Ok(())
    }

    async fn load_user(&self, user_id: &str) -> Result<User, ServiceError> {
        self.store
            .get(user_id)
            .await?
            .ok_or_else(|| ServiceError::UserNotFound(user_id.to_string()))
    }

    fn already_subscribed(&self, user_id: &str, tier: SubscriptionTier) -> Reply {
        Reply::text(t!(
            "messages.subscription.already_subscribed",
            tier = tier.display_name()
        ))
        .with_choices(get_dashboard_keyboard(dashboard_url(&self.dashboard_url, user_id)))
    }
}

fn is_on_tier(user: &User, tier: SubscriptionTier) -> bool {
    user.is_subscribed() && user.tier() == tier
}
