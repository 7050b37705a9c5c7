use url::Url;

use crate::service::{payment::PaymentMethod, subscription::SubscriptionTier};

use super::{ChoiceSet, InlineChoice};

pub fn get_register_keyboard() -> ChoiceSet {
    ChoiceSet::Keyboard(vec![vec![t!("buttons.register_business").to_string()]])
}

pub fn get_confirm_keyboard() -> ChoiceSet {
    ChoiceSet::Keyboard(vec![vec![
        t!("buttons.confirm").to_string(),
        t!("buttons.edit").to_string(),
    ]])
}

pub fn get_tier_keyboard() -> ChoiceSet {
    ChoiceSet::Keyboard(
        SubscriptionTier::CATALOG
            .iter()
            .map(|tier| vec![tier.label()])
            .collect(),
    )
}

pub fn pay_action(method: PaymentMethod, tier: SubscriptionTier) -> String {
    format!("pay_{}_{}", method, tier)
}

pub fn get_payment_method_keyboard(tier: SubscriptionTier, methods: &[PaymentMethod]) -> ChoiceSet {
    ChoiceSet::Inline(
        methods
            .iter()
            .map(|method| {
                vec![InlineChoice::action(
                    t!(format!("buttons.pay.{}", method)),
                    pay_action(*method, tier),
                )]
            })
            .collect(),
    )
}

pub fn get_checkout_keyboard(method: PaymentMethod, url: Url) -> ChoiceSet {
    ChoiceSet::Inline(vec![vec![InlineChoice::web_app(
        t!(format!("buttons.pay.{}", method)),
        url,
    )]])
}

pub fn get_dashboard_keyboard(url: Url) -> ChoiceSet {
    ChoiceSet::Inline(vec![vec![InlineChoice::web_app(t!("buttons.open_dashboard"), url)]])
}
