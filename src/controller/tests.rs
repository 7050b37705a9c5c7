use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use chrono::Duration;
use url::Url;

use super::*;
use crate::{
    reply::ChoiceSet,
    service::{
        payment::{MpesaPayment, TelegramPayment},
        subscription::SubscriptionTier,
        user::User,
    },
    storage::{MemoryUserStore, StorageError},
};

/// Memory store whose writes fail while `failing` is set.
struct FlakyStore {
    inner: MemoryUserStore,
    failing: AtomicBool,
}

impl FlakyStore {
    fn check(&self) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Redis("connection reset".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for FlakyStore {
    async fn upsert(&self, user_id: &str, patch: &UserPatch, strategy: MergeStrategy) -> Result<(), StorageError> {
        self.check()?;
        self.inner.upsert(user_id, patch, strategy).await
    }

    async fn get(&self, user_id: &str) -> Result<Option<User>, StorageError> {
        self.inner.get(user_id).await
    }

    async fn update(&self, user_id: &str, patch: &UserPatch) -> Result<(), StorageError> {
        self.check()?;
        self.inner.update(user_id, patch).await
    }
}

fn controller_with(store: Arc<dyn UserStore>, simulate: bool) -> BotController {
    let telegram = if simulate {
        TelegramPayment::simulated()
    } else {
        TelegramPayment::new("TEST:provider")
    };
    let payments = PaymentService::new(
        vec![
            Arc::new(telegram),
            Arc::new(MpesaPayment::new(Url::parse("https://pay.example.com/mpesa").unwrap())),
        ],
        Duration::hours(1),
    );

    BotController::new(
        store,
        DialogueService::new(8, Duration::minutes(30)),
        payments,
        Url::parse("https://dashboard.example.com/app").unwrap(),
    )
}

fn controller(simulate: bool) -> (BotController, Arc<MemoryUserStore>) {
    let store = Arc::new(MemoryUserStore::new(8));
    (controller_with(store.clone(), simulate), store)
}

fn joe() -> UserContext {
    UserContext {
        user_id: "42".to_string(),
        username: Some("joe".to_string()),
        first_name: Some("Joe".to_string()),
        last_name: None,
    }
}

async fn text(controller: &BotController, user: &UserContext, text: &str) -> Vec<Reply> {
    controller.handle(user, InboundEvent::Text(text.to_string())).await
}

async fn register(controller: &BotController, user: &UserContext) -> Vec<Reply> {
    controller.handle(user, InboundEvent::Command(Command::Start(String::new()))).await;
    text(controller, user, "Register Business").await;
    for answer in ["Joe's Salon", "Salon", "Nairobi", "0712345678"] {
        text(controller, user, answer).await;
    }
    text(controller, user, "✅ Confirm").await
}

async fn invoice_payload(controller: &BotController, user: &UserContext, action: &str) -> String {
    let replies = controller.handle(user, InboundEvent::Action(action.to_string())).await;
    replies[0].invoice.as_ref().unwrap().payload.clone()
}

fn step(controller: &BotController, user: &UserContext) -> RegistrationStep {
    controller.dialogue.get(&user.user_id).registration_step
}

#[tokio::test]
async fn test_end_to_end_registration_and_payment() {
    let (controller, store) = controller(false);
    let user = joe();

    let welcome = controller.handle(&user, InboundEvent::Command(Command::Start(String::new()))).await;
    assert_eq!(welcome.len(), 1);
    assert!(welcome[0].text.contains("BoostBizz"));
    assert_eq!(welcome[0].labels(), vec!["Register Business"]);

    let prompt = text(&controller, &user, "Register Business").await;
    assert_eq!(prompt[0].choices, ChoiceSet::RemoveKeyboard);
    assert_eq!(step(&controller, &user), RegistrationStep::BusinessName);

    let mut last = Vec::new();
    for answer in ["Joe's Salon", "Salon", "Nairobi", "0712345678"] {
        last = text(&controller, &user, answer).await;
    }
    assert!(last[0].text.contains("Joe's Salon"));
    assert!(last[0].text.contains("0712345678"));
    assert_eq!(last[0].labels(), vec!["✅ Confirm", "✏️ Edit"]);

    let confirmed = text(&controller, &user, "✅ Confirm").await;
    assert_eq!(confirmed.len(), 2);
    assert!(confirmed[1].labels().contains(&"Standard (KES 3000)"));
    assert_eq!(step(&controller, &user), RegistrationStep::Done);

    let quote = text(&controller, &user, "Standard (KES 3000)").await;
    assert!(quote[0].text.contains("3000"));
    assert_eq!(quote[0].actions(), vec!["pay_telegram_standard", "pay_mpesa_standard"]);

    let awaiting = controller
        .handle(&user, InboundEvent::Action("pay_telegram_standard".to_string()))
        .await;
    assert!(awaiting[0].web_apps().is_empty());
    assert!(!store.get("42").await.unwrap().unwrap().is_subscribed());

    let reference = awaiting[0].invoice.as_ref().unwrap().payload.clone();
    assert!(controller.accepts_payment(&user, &reference).await);
    assert!(!controller.accepts_payment(&UserContext::new("7"), &reference).await);
    let paid = controller.handle(&user, InboundEvent::PaymentConfirmed(reference.clone())).await;
    assert_eq!(paid[0].labels(), vec!["🚀 Open Dashboard"]);
    assert!(!controller.accepts_payment(&user, &reference).await);

    let stored = store.get("42").await.unwrap().unwrap();
    assert!(stored.is_subscribed());
    assert_eq!(stored.tier(), SubscriptionTier::Standard);
    assert_eq!(stored.name.as_deref(), Some("Joe's Salon"));
    assert_eq!(stored.business_type.as_deref(), Some("Salon"));
    assert_eq!(stored.location.as_deref(), Some("Nairobi"));
    assert_eq!(stored.contact.as_deref(), Some("0712345678"));
    assert_eq!(stored.first_name.as_deref(), Some("Joe"));

    let dashboard = controller.handle(&user, InboundEvent::Command(Command::Continue)).await;
    assert_eq!(
        dashboard[0].web_apps()[0].as_str(),
        "https://dashboard.example.com/app?userId=42"
    );
}

#[tokio::test]
async fn test_simulated_payment_settles_on_button_press() {
    let (controller, store) = controller(true);
    let user = joe();
    register(&controller, &user).await;

    let replies = controller
        .handle(&user, InboundEvent::Action("pay_telegram_starter".to_string()))
        .await;

    assert_eq!(replies.len(), 2);
    assert_eq!(replies[1].labels(), vec!["🚀 Open Dashboard"]);
    assert_eq!(store.get("42").await.unwrap().unwrap().tier(), SubscriptionTier::Starter);
    assert_eq!(controller.subscription.pending_payments(), 0);
}

#[tokio::test]
async fn test_failed_confirmation_keeps_collected_data() {
    let store = Arc::new(FlakyStore {
        inner: MemoryUserStore::new(8),
        failing: AtomicBool::new(false),
    });
    let controller = controller_with(store.clone(), false);
    let user = joe();

    controller.handle(&user, InboundEvent::Command(Command::Start(String::new()))).await;
    text(&controller, &user, "Register Business").await;
    for answer in ["Joe's Salon", "Salon", "Nairobi", "0712345678"] {
        text(&controller, &user, answer).await;
    }

    store.failing.store(true, Ordering::SeqCst);
    let failed = text(&controller, &user, "✅ Confirm").await;
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].labels(), vec!["✅ Confirm", "✏️ Edit"]);
    assert_eq!(step(&controller, &user), RegistrationStep::Confirm);
    assert_eq!(
        controller.dialogue.get("42").draft.name.as_deref(),
        Some("Joe's Salon")
    );

    store.failing.store(false, Ordering::SeqCst);
    let retried = text(&controller, &user, "✅ Confirm").await;
    assert_eq!(retried.len(), 2);
    assert_eq!(
        store.get("42").await.unwrap().unwrap().location.as_deref(),
        Some("Nairobi")
    );
}

#[tokio::test]
async fn test_menu_text_is_never_captured_as_an_answer() {
    let (controller, store) = controller(false);
    let user = joe();
    controller.handle(&user, InboundEvent::Command(Command::Start(String::new()))).await;
    text(&controller, &user, "Register Business").await;

    let replies = text(&controller, &user, "✅ Confirm").await;

    assert_eq!(replies[0].labels(), vec!["Register Business"]);
    assert_eq!(step(&controller, &user), RegistrationStep::BusinessName);
    assert!(controller.dialogue.get("42").draft.name.is_none());
    assert!(store.get("42").await.unwrap().unwrap().name.is_none());
}

#[tokio::test]
async fn test_command_wins_over_collection() {
    let (controller, _) = controller(false);
    let user = joe();
    controller.handle(&user, InboundEvent::Command(Command::Start(String::new()))).await;
    text(&controller, &user, "Register Business").await;

    let replies = controller.handle(&user, InboundEvent::Command(Command::Continue)).await;

    assert_eq!(replies.len(), 1);
    assert!(replies[0].text.contains("couldn’t verify your payment"));
    assert!(controller.dialogue.get("42").draft.name.is_none());
}

#[tokio::test]
async fn test_edit_restarts_with_cleared_fields() {
    let (controller, store) = controller(false);
    let user = joe();
    controller.handle(&user, InboundEvent::Command(Command::Start(String::new()))).await;
    text(&controller, &user, "Register Business").await;
    for answer in ["Wrong", "Salon", "Nairobi", "0712345678"] {
        text(&controller, &user, answer).await;
    }

    let replies = text(&controller, &user, "✏️ Edit").await;

    assert_eq!(replies.len(), 2);
    assert_eq!(step(&controller, &user), RegistrationStep::BusinessName);
    assert!(controller.dialogue.get("42").draft.location.is_none());
    assert!(store.get("42").await.unwrap().unwrap().name.is_none());

    for answer in ["Joe's Salon", "Salon", "Mombasa", "joe@example.com"] {
        text(&controller, &user, answer).await;
    }
    text(&controller, &user, "✅ Confirm").await;

    let stored = store.get("42").await.unwrap().unwrap();
    assert_eq!(stored.name.as_deref(), Some("Joe's Salon"));
    assert_eq!(stored.location.as_deref(), Some("Mombasa"));
}

#[tokio::test]
async fn test_unknown_tier_action_is_reported() {
    let (controller, store) = controller(false);
    let user = joe();
    register(&controller, &user).await;

    let replies = controller
        .handle(&user, InboundEvent::Action("subscribe_gold".to_string()))
        .await;

    assert_eq!(replies.len(), 1);
    assert!(replies[0].labels().is_empty());
    let stored = store.get("42").await.unwrap().unwrap();
    assert!(!stored.is_subscribed());
    assert_eq!(stored.tier(), SubscriptionTier::None);
}

#[tokio::test]
async fn test_free_tier_needs_no_payment() {
    let (controller, store) = controller(false);
    let user = joe();
    register(&controller, &user).await;

    let replies = text(&controller, &user, "Free").await;

    assert!(replies[0].actions().is_empty());
    assert_eq!(replies[0].labels(), vec!["🚀 Open Dashboard"]);
    let stored = store.get("42").await.unwrap().unwrap();
    assert!(stored.is_subscribed());
    assert_eq!(stored.tier(), SubscriptionTier::Free);
    assert_eq!(controller.subscription.pending_payments(), 0);
}

#[tokio::test]
async fn test_continue_is_denied_until_subscribed() {
    let (controller, store) = controller(true);
    let user = joe();
    register(&controller, &user).await;

    let denied = controller.handle(&user, InboundEvent::Command(Command::Continue)).await;
    assert!(denied[0].web_apps().is_empty());
    assert!(!store.get("42").await.unwrap().unwrap().is_subscribed());

    controller
        .handle(&user, InboundEvent::Action("subscribe_standard".to_string()))
        .await;
    controller
        .handle(&user, InboundEvent::Action("pay_telegram_standard".to_string()))
        .await;

    let granted = controller.handle(&user, InboundEvent::Command(Command::Continue)).await;
    assert_eq!(granted[0].labels(), vec!["🚀 Open Dashboard"]);
}

#[tokio::test]
async fn test_upgrade_keeps_a_single_record() {
    let (controller, store) = controller(true);
    let user = joe();
    register(&controller, &user).await;

    controller
        .handle(&user, InboundEvent::Action("pay_telegram_starter".to_string()))
        .await;
    controller
        .handle(&user, InboundEvent::Action("pay_telegram_premium".to_string()))
        .await;
    controller.handle(&user, InboundEvent::Command(Command::Start(String::new()))).await;

    assert_eq!(store.len(), 1);
    let stored = store.get("42").await.unwrap().unwrap();
    assert_eq!(stored.tier(), SubscriptionTier::Premium);
    assert!(stored.is_subscribed());
    assert_eq!(stored.name.as_deref(), Some("Joe's Salon"));
}

#[tokio::test]
async fn test_subscribing_before_start_asks_to_register() {
    let (controller, store) = controller(false);

    let replies = controller
        .handle(&joe(), InboundEvent::Action("subscribe_starter".to_string()))
        .await;

    assert!(replies[0].text.contains("/start"));
    assert_eq!(store.len(), 0);
}

#[tokio::test]
async fn test_cancel_drops_the_conversation() {
    let (controller, _) = controller(false);
    let user = joe();
    controller.handle(&user, InboundEvent::Command(Command::Start(String::new()))).await;
    text(&controller, &user, "Register Business").await;
    text(&controller, &user, "Joe's Salon").await;

    controller.handle(&user, InboundEvent::Command(Command::Cancel)).await;

    assert_eq!(step(&controller, &user), RegistrationStep::None);
    assert!(text(&controller, &user, "Salon").await.is_empty());
}

#[tokio::test]
async fn test_users_do_not_share_conversations() {
    let (controller, _) = controller(false);
    let joe = joe();
    let ann = UserContext::new("7");
    controller.handle(&joe, InboundEvent::Command(Command::Start(String::new()))).await;
    text(&controller, &joe, "Register Business").await;

    assert!(text(&controller, &ann, "Ann's Shop").await.is_empty());
    text(&controller, &joe, "Joe's Salon").await;

    assert_eq!(step(&controller, &joe), RegistrationStep::Type);
    assert_eq!(step(&controller, &ann), RegistrationStep::None);
}

#[tokio::test]
async fn test_cleanup_keeps_fresh_sessions() {
    let (controller, _) = controller(false);
    let user = joe();
    text(&controller, &user, "Register Business").await;

    assert_eq!(controller.cleanup_stale(chrono::Utc::now()), Cleanup::default());
    assert_eq!(step(&controller, &user), RegistrationStep::BusinessName);
}

#[tokio::test]
async fn test_only_the_latest_checkout_settles() {
    let (controller, store) = controller(false);
    let user = joe();
    register(&controller, &user).await;

    let first = invoice_payload(&controller, &user, "pay_telegram_premium").await;
    let second = invoice_payload(&controller, &user, "pay_telegram_premium").await;

    assert_eq!(controller.subscription.pending_payments(), 1);
    assert!(!controller.accepts_payment(&user, &first).await);
    assert!(controller.accepts_payment(&user, &second).await);

    let stale = controller.handle(&user, InboundEvent::PaymentConfirmed(first)).await;
    assert!(stale[0].text.contains("not available"));
    assert!(!store.get("42").await.unwrap().unwrap().is_subscribed());

    let paid = controller.handle(&user, InboundEvent::PaymentConfirmed(second.clone())).await;
    assert!(paid[0].text.contains("Payment received"));

    let replay = controller.handle(&user, InboundEvent::PaymentConfirmed(second.clone())).await;
    assert!(!replay[0].text.contains("Payment received"));
    assert!(!controller.accepts_payment(&user, &second).await);
    assert_eq!(store.get("42").await.unwrap().unwrap().tier(), SubscriptionTier::Premium);
}

#[tokio::test]
async fn test_abandoned_checkouts_expire() {
    let (controller, _) = controller(false);
    let user = joe();
    register(&controller, &user).await;

    for _ in 0..50 {
        controller
            .handle(&user, InboundEvent::Action("pay_mpesa_standard".to_string()))
            .await;
    }
    assert_eq!(controller.subscription.pending_payments(), 1);

    let cleanup = controller.cleanup_stale(chrono::Utc::now() + Duration::hours(2));

    assert_eq!(cleanup.payments, 1);
    assert_eq!(controller.subscription.pending_payments(), 0);
}

#[tokio::test]
async fn test_start_with_deep_link_payload_welcomes() {
    let (controller, store) = controller(false);
    let user = joe();

    let welcome = controller
        .handle(&user, InboundEvent::Command(Command::Start("promo42".to_string())))
        .await;

    assert!(welcome[0].text.contains("BoostBizz"));
    assert_eq!(store.len(), 1);
}
