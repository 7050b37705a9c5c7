use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub const CURRENCY: &str = "KES";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    None,
    Free,
    Starter,
    Standard,
    Premium,
}

impl SubscriptionTier {
    /// Tiers a user can pick, in menu order.
    pub const CATALOG: [SubscriptionTier; 4] = [
        SubscriptionTier::Free,
        SubscriptionTier::Starter,
        SubscriptionTier::Standard,
        SubscriptionTier::Premium,
    ];

    pub fn price(&self) -> u32 {
        match self {
            SubscriptionTier::None | SubscriptionTier::Free => 0,
            SubscriptionTier::Starter => 1500,
            SubscriptionTier::Standard => 3000,
            SubscriptionTier::Premium => 5500,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.price() > 0
    }

    /// Looks a tier up in the selectable catalog.
    pub fn from_catalog(s: &str) -> Option<Self> {
        Self::from_str(s).ok().filter(|tier| Self::CATALOG.contains(tier))
    }

    pub fn display_name(&self) -> String {
        t!(format!("tiers.{}", self)).to_string()
    }

    /// Reply keyboard label, e.g. `Standard (KES 3000)`.
    pub fn label(&self) -> String {
        if self.is_paid() {
            t!(
                "buttons.tier_paid",
                name = self.display_name(),
                currency = CURRENCY,
                price = self.price()
            )
            .to_string()
        } else {
            self.display_name()
        }
    }
}

impl FromStr for SubscriptionTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(SubscriptionTier::None),
            "free" => Ok(SubscriptionTier::Free),
            "starter" => Ok(SubscriptionTier::Starter),
            "standard" => Ok(SubscriptionTier::Standard),
            "premium" => Ok(SubscriptionTier::Premium),
            _ => Err(format!("Unknown subscription tier: {}", s)),
        }
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubscriptionTier::None => "none",
            SubscriptionTier::Free => "free",
            SubscriptionTier::Starter => "starter",
            SubscriptionTier::Standard => "standard",
            SubscriptionTier::Premium => "premium",
        };
        f.write_str(name)
    }
}
