use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::service::user::UserPatch;

#[derive(Clone, Copy, Default, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStep {
    #[default]
    None,
    BusinessName,
    Type,
    Location,
    Contact,
    Confirm,
    Done,
}

impl RegistrationStep {
    pub fn next(self) -> Self {
        match self {
            RegistrationStep::None => RegistrationStep::BusinessName,
            RegistrationStep::BusinessName => RegistrationStep::Type,
            RegistrationStep::Type => RegistrationStep::Location,
            RegistrationStep::Location => RegistrationStep::Contact,
            RegistrationStep::Contact => RegistrationStep::Confirm,
            RegistrationStep::Confirm | RegistrationStep::Done => RegistrationStep::Done,
        }
    }

    /// Whether free text typed in this step is an answer to a registration prompt.
    pub fn collects_text(self) -> bool {
        matches!(
            self,
            RegistrationStep::BusinessName
                | RegistrationStep::Type
                | RegistrationStep::Location
                | RegistrationStep::Contact
        )
    }
}

#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessDraft {
    pub name: Option<String>,
    pub business_type: Option<String>,
    pub location: Option<String>,
    pub contact: Option<String>,
}

impl BusinessDraft {
    /// Stores `value` into the field collected by `step`, ignored for other steps.
    pub fn set(&mut self, step: RegistrationStep, value: String) {
        match step {
            RegistrationStep::BusinessName => self.name = Some(value),
            RegistrationStep::Type => self.business_type = Some(value),
            RegistrationStep::Location => self.location = Some(value),
            RegistrationStep::Contact => self.contact = Some(value),
            _ => {}
        }
    }

    pub fn is_complete(&self) -> bool {
        self.name.is_some() && self.business_type.is_some() && self.location.is_some() && self.contact.is_some()
    }

    pub fn to_patch(&self, created_at: DateTime<Utc>) -> UserPatch {
        UserPatch {
            name: self.name.clone(),
            business_type: self.business_type.clone(),
            location: self.location.clone(),
            contact: self.contact.clone(),
            created_at: Some(created_at),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    pub registration_step: RegistrationStep,
    pub draft: BusinessDraft,
    pub updated_at: DateTime<Utc>,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self {
            registration_step: RegistrationStep::None,
            draft: BusinessDraft::default(),
            updated_at: Utc::now(),
        }
    }
}

impl ConversationState {
    /// Fresh registration at the first prompt, discarding anything collected before.
    pub fn restart_registration(&mut self) {
        self.registration_step = RegistrationStep::BusinessName;
        self.draft = BusinessDraft::default();
    }
}
