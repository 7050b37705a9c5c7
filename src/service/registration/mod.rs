use std::sync::Arc;

use chrono::Utc;

use crate::{
    context::UserContext,
    reply::{get_confirm_keyboard, get_register_keyboard, ChoiceSet, Reply},
    service::{
        dialogue::model::{BusinessDraft, ConversationState, RegistrationStep},
        ServiceError,
    },
    storage::{MergeStrategy, UserStore},
};

/// Step-by-step collection of the business details.
///
/// Only [`RegistrationFlow::confirm`] writes to the store, and it leaves the state untouched
/// when the write fails.
#[derive(Clone)]
pub struct RegistrationFlow {
    store: Arc<dyn UserStore>,
}

impl RegistrationFlow {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Starts (or restarts) collection at the business name prompt.
    pub fn begin(&self, state: &mut ConversationState) -> Vec<Reply> {
        state.restart_registration();
        vec![Reply::text(prompt(RegistrationStep::BusinessName)).with_choices(ChoiceSet::RemoveKeyboard)]
    }

    /// Handles free text for the current step, `None` when no registration step is waiting
    /// for text.
    pub fn handle_text(&self, state: &mut ConversationState, text: &str) -> Option<Vec<Reply>> {
        let step = state.registration_step;

        if step == RegistrationStep::Confirm {
            return Some(vec![
                Reply::text(t!("messages.registration.choose_confirm_or_edit")).with_choices(get_confirm_keyboard())
            ]);
        }

        if !step.collects_text() {
            return None;
        }

        let answer = text.trim();
        if answer.is_empty() {
            return Some(vec![Reply::text(format!(
                "{}\n{}",
                t!("messages.registration.empty_answer"),
                prompt(step)
            ))]);
        }

        state.draft.set(step, answer.to_string());
        state.registration_step = step.next();

        let reply = match state.registration_step {
            RegistrationStep::Confirm => summary(&state.draft),
            next => Reply::text(prompt(next)),
        };

        Some(vec![reply])
    }

    /// Persists the collected business and finishes the registration.
    pub async fn confirm(&self, user: &UserContext, state: &mut ConversationState) -> Result<Vec<Reply>, ServiceError> {
        if state.registration_step != RegistrationStep::Confirm || !state.draft.is_complete() {
            return Ok(vec![nothing_to_confirm()]);
        }

        let patch = state.draft.to_patch(Utc::now());

        self.store
            .upsert(&user.user_id, &patch, MergeStrategy::Merge)
            .await
            .map_err(|e| {
                error!("Failed to save business for user {}: {}", user.user_id, e);
                ServiceError::Persistence(e)
            })?;

        info!("Business registered for user {}", user.user_id);

        let name = state.draft.name.clone().unwrap_or_default();
        state.registration_step = RegistrationStep::Done;

        Ok(vec![Reply::text(t!("messages.registration.saved", name = name))])
    }

    /// Goes back to the first prompt, discarding every collected field.
    pub fn edit(&self, state: &mut ConversationState) -> Vec<Reply> {
        if state.registration_step != RegistrationStep::Confirm {
            return vec![nothing_to_confirm()];
        }

        state.restart_registration();
        vec![
            Reply::text(t!("messages.registration.edit")),
            Reply::text(prompt(RegistrationStep::BusinessName)).with_choices(ChoiceSet::RemoveKeyboard),
        ]
    }
}

fn prompt(step: RegistrationStep) -> String {
    let key = match step {
        RegistrationStep::BusinessName => "messages.registration.prompt.business_name",
        RegistrationStep::Type => "messages.registration.prompt.type",
        RegistrationStep::Location => "messages.registration.prompt.location",
        RegistrationStep::Contact => "messages.registration.prompt.contact",
        _ => "messages.registration.prompt.business_name",
    };
    t!(key).to_string()
}

fn summary(draft: &BusinessDraft) -> Reply {
    let text = t!(
        "messages.registration.summary",
        name = draft.name.as_deref().unwrap_or_default(),
        business_type = draft.business_type.as_deref().unwrap_or_default(),
        location = draft.location.as_deref().unwrap_or_default(),
        contact = draft.contact.as_deref().unwrap_or_default()
    );

    Reply::text(text).with_choices(get_confirm_keyboard())
}

fn nothing_to_confirm() -> Reply {
    Reply::text(t!("messages.registration.nothing_to_confirm")).with_choices(get_register_keyboard())
}
