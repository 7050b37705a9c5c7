use async_trait::async_trait;
use url::Url;

use super::{Checkout, PaymentError, PaymentIntent, PaymentMethod, PaymentProvider};

/// M-Pesa checkout hosted on an external page, opened as a Telegram web app.
pub struct MpesaPayment {
    pay_url: Url,
}

impl MpesaPayment {
    pub fn new(pay_url: Url) -> Self {
        Self { pay_url }
    }

    fn checkout_url(&self, intent: &PaymentIntent) -> Url {
        let mut url = self.pay_url.clone();
        url.query_pairs_mut()
            .append_pair("userId", &intent.user_id)
            .append_pair("tier", &intent.tier.to_string())
            .append_pair("amount", &intent.amount.to_string())
            .append_pair("reference", &intent.reference());
        url
    }
}

#[async_trait]
impl PaymentProvider for MpesaPayment {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Mpesa
    }

    async fn checkout(&self, intent: &PaymentIntent) -> Result<Checkout, PaymentError> {
        if self.pay_url.cannot_be_a_base() {
            return Err(PaymentError::Checkout(format!("Invalid M-Pesa page: {}", self.pay_url)));
        }

        Ok(Checkout::Redirect(self.checkout_url(intent)))
    }
}
