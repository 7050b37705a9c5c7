mod event;

pub use event::{Action, InboundEvent, MenuButton};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use url::Url;

use crate::{
    command::Command,
    context::UserContext,
    reply::{get_confirm_keyboard, get_register_keyboard, Reply},
    service::{
        dialogue::{
            model::{ConversationState, RegistrationStep},
            DialogueService,
        },
        payment::PaymentService,
        registration::RegistrationFlow,
        subscription::SubscriptionFlow,
        user::UserPatch,
        ServiceError,
    },
    storage::{MergeStrategy, UserStore},
};

/// What one cleanup pass evicted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cleanup {
    pub sessions: usize,
    pub payments: usize,
}

/// Single entry point for inbound events.
///
/// Dispatch precedence: command, button payload or payment confirmation, exact menu text,
/// free text for the current registration step, then nothing. Events of one user must be
/// handled one at a time (the teloxide dispatcher serialises updates per chat), events of
/// different users may run concurrently.
#[derive(Clone)]
pub struct BotController {
    store: Arc<dyn UserStore>,
    dialogue: DialogueService,
    registration: RegistrationFlow,
    subscription: SubscriptionFlow,
}

impl BotController {
    pub fn new(store: Arc<dyn UserStore>, dialogue: DialogueService, payments: PaymentService, dashboard_url: Url) -> Self {
        info!("Initializing BotController...");
        Self {
            registration: RegistrationFlow::new(Arc::clone(&store)),
            subscription: SubscriptionFlow::new(Arc::clone(&store), payments, dashboard_url),
            store,
            dialogue,
        }
    }

    /// Handles one event and returns the replies for its sender. Failures are turned into
    /// replies, they never escape the sender's event.
    pub async fn handle(&self, user: &UserContext, event: InboundEvent) -> Vec<Reply> {
        debug!("User {} sent {:?}", user.user_id, event);

        let mut state = self.dialogue.get(&user.user_id);
        let result = self.dispatch(user, &mut state, event).await;
        let step = state.registration_step;
        self.dialogue.update(&user.user_id, state);

        match result {
            Ok(replies) => replies,
            Err(e) => vec![render_error(user, &e, step)],
        }
    }

    /// Pre-checkout gate: only intents opened by this user can be paid.
    pub async fn accepts_payment(&self, user: &UserContext, reference: &str) -> bool {
        self.subscription.accepts_payment(user, reference).await
    }

    /// Evicts abandoned conversations and expired payment intents.
    pub fn cleanup_stale(&self, now: DateTime<Utc>) -> Cleanup {
        let cleanup = Cleanup {
            sessions: self.dialogue.cleanup_stale(now),
            payments: self.subscription.cleanup_stale_payments(now),
        };
        debug!("{} payments pending confirmation", self.subscription.pending_payments());
        cleanup
    }

    async fn dispatch(
        &self,
        user: &UserContext,
        state: &mut ConversationState,
        event: InboundEvent,
    ) -> Result<Vec<Reply>, ServiceError> {
        match event {
            InboundEvent::Command(command) => self.handle_command(user, state, command).await,
            InboundEvent::Action(data) => self.handle_action(user, &data).await,
            InboundEvent::PaymentConfirmed(reference) => self.subscription.confirm_payment(user, &reference).await,
            InboundEvent::Text(text) => match MenuButton::match_text(&text) {
                Some(button) => self.handle_menu(user, state, button).await,
                None => Ok(self.registration.handle_text(state, &text).unwrap_or_else(|| {
                    debug!("Ignoring text from user {}, no step is waiting for it", user.user_id);
                    Vec::new()
                })),
            },
        }
    }

    async fn handle_command(
        &self,
        user: &UserContext,
        state: &mut ConversationState,
        command: Command,
    ) -> Result<Vec<Reply>, ServiceError> {
        match command {
            Command::Start(payload) => {
                if !payload.is_empty() {
                    debug!("User {} started with payload {:?}", user.user_id, payload);
                }

                self.store
                    .upsert(
                        &user.user_id,
                        &UserPatch::profile(user, Utc::now()),
                        MergeStrategy::KeepExisting,
                    )
                    .await
                    .map_err(ServiceError::Persistence)?;

                info!("User {} started the bot", user.user_id);

                Ok(vec![Reply::text(t!(
                    "commands.start",
                    first_name = user.display_name()
                ))
                .with_choices(get_register_keyboard())])
            }
            Command::Continue => self.subscription.dashboard_access(user).await,
            Command::Cancel => {
                let in_progress = state.registration_step != RegistrationStep::None;
                *state = ConversationState::default();

                let text = if in_progress {
                    t!("commands.cancel.cancelled")
                } else {
                    t!("commands.cancel.nothing")
                };
                Ok(vec![Reply::text(text).with_choices(get_register_keyboard())])
            }
            Command::Help => Ok(vec![Reply::text(t!("commands.help"))]),
        }
    }

    async fn handle_action(&self, user: &UserContext, data: &str) -> Result<Vec<Reply>, ServiceError> {
        match Action::parse(data) {
            Some(Action::Subscribe(tier)) => self.subscription.select_tier(user, &tier).await,
            Some(Action::Pay { method, tier }) => {
                let step = self.subscription.select_payment(user, &method, &tier).await?;
                let mut replies = step.replies;

                if let Some(reference) = step.settled {
                    replies.extend(self.subscription.confirm_payment(user, &reference).await?);
                }

                Ok(replies)
            }
            None => Err(ServiceError::InvalidSelection(format!("action {}", data))),
        }
    }

    async fn handle_menu(
        &self,
        user: &UserContext,
        state: &mut ConversationState,
        button: MenuButton,
    ) -> Result<Vec<Reply>, ServiceError> {
        match button {
            MenuButton::RegisterBusiness => Ok(self.registration.begin(state)),
            MenuButton::Confirm => {
                let before = state.registration_step;
                let mut replies = self.registration.confirm(user, state).await?;

                if before == RegistrationStep::Confirm && state.registration_step == RegistrationStep::Done {
                    replies.push(self.subscription.tier_menu());
                }

                Ok(replies)
            }
            MenuButton::Edit => Ok(self.registration.edit(state)),
            MenuButton::Tier(tier) => self.subscription.select_tier(user, &tier.to_string()).await,
        }
    }
}

fn render_error(user: &UserContext, e: &ServiceError, step: RegistrationStep) -> Reply {
    match e {
        ServiceError::Persistence(_) => {
            error!("Persistence failure for user {}: {}", user.user_id, e);
            let reply = Reply::text(t!("errors.persistence"));
            if step == RegistrationStep::Confirm {
                reply.with_choices(get_confirm_keyboard())
            } else {
                reply
            }
        }
        ServiceError::InvalidSelection(_) => {
            warn!("User {}: {}", user.user_id, e);
            Reply::text(t!("errors.invalid_selection"))
        }
        ServiceError::UnauthorizedDashboardAccess(_) => {
            info!("{}", e);
            Reply::text(t!("errors.unauthorized"))
        }
        ServiceError::UserNotFound(_) => Reply::text(t!("errors.not_registered")),
        ServiceError::Payment(_) => {
            error!("Payment failure for user {}: {}", user.user_id, e);
            Reply::text(t!("errors.payment"))
        }
    }
}

#[cfg(test)]
mod tests;
