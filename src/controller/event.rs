use crate::{command::Command, service::subscription::SubscriptionTier};

/// Everything the messaging channel can deliver to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Command(Command),
    Text(String),
    /// Inline button press carrying its callback payload.
    Action(String),
    /// A payment settled, carrying the payment reference.
    PaymentConfirmed(String),
}

/// Structured button payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// `subscribe_<tier>`
    Subscribe(String),
    /// `pay_<method>_<tier>`
    Pay { method: String, tier: String },
}

impl Action {
    pub fn parse(data: &str) -> Option<Self> {
        if let Some(tier) = data.strip_prefix("subscribe_") {
            return Some(Action::Subscribe(tier.to_string()));
        }

        let (method, tier) = data.strip_prefix("pay_")?.split_once('_')?;
        Some(Action::Pay {
            method: method.to_string(),
            tier: tier.to_string(),
        })
    }
}

/// Reply keyboard buttons matched on their exact text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuButton {
    RegisterBusiness,
    Confirm,
    Edit,
    Tier(SubscriptionTier),
}

impl MenuButton {
    pub fn match_text(text: &str) -> Option<Self> {
        let text = text.trim();

        if text == t!("buttons.register_business") {
            return Some(MenuButton::RegisterBusiness);
        }
        if text == t!("buttons.confirm") {
            return Some(MenuButton::Confirm);
        }
        if text == t!("buttons.edit") {
            return Some(MenuButton::Edit);
        }

        SubscriptionTier::CATALOG
            .into_iter()
            .find(|tier| text == tier.label())
            .map(MenuButton::Tier)
    }
}
