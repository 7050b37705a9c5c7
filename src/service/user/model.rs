use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{context::UserContext, service::subscription::SubscriptionTier, storage::MergeStrategy};

/// The persisted user document. Field names are the wire contract with the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subscription_tier: Option<SubscriptionTier>,
    #[serde(default)]
    pub is_subscribed: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub business_type: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A partial user document, `None` fields are left alone by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_tier: Option<SubscriptionTier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_subscribed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "type")]
    pub business_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

macro_rules! apply_fields {
    ($target:expr, $patch:expr, $strategy:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$patch.$field {
                if $strategy == MergeStrategy::Merge || $target.$field.is_none() {
                    $target.$field = Some(value.clone());
                }
            }
        )+
    };
}

impl User {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            username: None,
            first_name: None,
            last_name: None,
            joined_at: None,
            subscription_tier: None,
            is_subscribed: None,
            name: None,
            business_type: None,
            location: None,
            contact: None,
            created_at: None,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.is_subscribed.unwrap_or(false)
    }

    pub fn tier(&self) -> SubscriptionTier {
        self.subscription_tier.unwrap_or_default()
    }

    pub fn apply(&mut self, patch: &UserPatch, strategy: MergeStrategy) {
        apply_fields!(
            self,
            patch,
            strategy,
            username,
            first_name,
            last_name,
            joined_at,
            subscription_tier,
            is_subscribed,
            name,
            business_type,
            location,
            contact,
            created_at,
        );
    }
}

impl UserPatch {
    /// Telegram profile written on `/start`, including the set-once defaults.
    pub fn profile(context: &UserContext, now: DateTime<Utc>) -> Self {
        Self {
            username: context.username.clone(),
            first_name: context.first_name.clone(),
            last_name: context.last_name.clone(),
            joined_at: Some(now),
            subscription_tier: Some(SubscriptionTier::None),
            is_subscribed: Some(false),
            ..Default::default()
        }
    }

    pub fn subscription(tier: SubscriptionTier) -> Self {
        Self {
            subscription_tier: Some(tier),
            is_subscribed: Some(tier != SubscriptionTier::None),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_serializes_wire_field_names() {
        let mut user = User::new("42");
        user.apply(&UserPatch::subscription(SubscriptionTier::Standard), MergeStrategy::Merge);
        user.business_type = Some("Salon".to_string());

        let json = serde_json::to_value(&user).unwrap();

        assert_eq!(json["userId"], "42");
        assert_eq!(json["isSubscribed"], true);
        assert_eq!(json["subscriptionTier"], "standard");
        assert_eq!(json["type"], "Salon");
    }

    #[test]
    fn test_patch_skips_absent_fields() {
        let json = serde_json::to_value(UserPatch::subscription(SubscriptionTier::Free)).unwrap();
        let object = json.as_object().unwrap();

        assert_eq!(object.len(), 2);
        assert_eq!(object["subscriptionTier"], "free");
    }

    #[test]
    fn test_defaults_for_fresh_document() {
        let user = User::new("42");
        assert!(!user.is_subscribed());
        assert_eq!(user.tier(), SubscriptionTier::None);
    }
}
