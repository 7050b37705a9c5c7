mod keyboard;

pub use keyboard::*;

use std::fmt;

use url::Url;

/// Where an inline button leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineTarget {
    /// Callback payload routed back to the controller.
    Action(String),
    /// Page opened as a Telegram web app.
    WebApp(Url),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineChoice {
    pub label: String,
    pub target: InlineTarget,
}

impl InlineChoice {
    pub fn action(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target: InlineTarget::Action(payload.into()),
        }
    }

    pub fn web_app(label: impl Into<String>, url: Url) -> Self {
        Self {
            label: label.into(),
            target: InlineTarget::WebApp(url),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ChoiceSet {
    #[default]
    None,
    /// One-time reply keyboard, rows of button labels.
    Keyboard(Vec<Vec<String>>),
    RemoveKeyboard,
    Inline(Vec<Vec<InlineChoice>>),
}

/// Telegram invoice sent right after the reply text.
#[derive(Clone, PartialEq, Eq)]
pub struct Invoice {
    pub title: String,
    pub description: String,
    /// Comes back in the pre-checkout query and the `successful_payment` message.
    pub payload: String,
    pub provider_token: String,
    pub currency: String,
    /// Smallest currency unit.
    pub amount: u32,
}

impl fmt::Debug for Invoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invoice")
            .field("title", &self.title)
            .field("payload", &self.payload)
            .field("currency", &self.currency)
            .field("amount", &self.amount)
            .finish_non_exhaustive()
    }
}

/// One outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub choices: ChoiceSet,
    pub invoice: Option<Invoice>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choices: ChoiceSet::None,
            invoice: None,
        }
    }

    pub fn with_choices(mut self, choices: ChoiceSet) -> Self {
        self.choices = choices;
        self
    }

    pub fn with_invoice(mut self, invoice: Invoice) -> Self {
        self.invoice = Some(invoice);
        self
    }

    /// Labels of every button attached to the reply.
    #[cfg(test)]
    pub fn labels(&self) -> Vec<&str> {
        match &self.choices {
            ChoiceSet::Keyboard(rows) => rows.iter().flatten().map(String::as_str).collect(),
            ChoiceSet::Inline(rows) => rows.iter().flatten().map(|choice| choice.label.as_str()).collect(),
            ChoiceSet::None | ChoiceSet::RemoveKeyboard => Vec::new(),
        }
    }

    /// Callback payloads of the inline buttons.
    #[cfg(test)]
    pub fn actions(&self) -> Vec<&str> {
        match &self.choices {
            ChoiceSet::Inline(rows) => rows
                .iter()
                .flatten()
                .filter_map(|choice| match &choice.target {
                    InlineTarget::Action(payload) => Some(payload.as_str()),
                    InlineTarget::WebApp(_) => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Web-app URLs of the inline buttons.
    #[cfg(test)]
    pub fn web_apps(&self) -> Vec<&Url> {
        match &self.choices {
            ChoiceSet::Inline(rows) => rows
                .iter()
                .flatten()
                .filter_map(|choice| match &choice.target {
                    InlineTarget::WebApp(url) => Some(url),
                    InlineTarget::Action(_) => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}
