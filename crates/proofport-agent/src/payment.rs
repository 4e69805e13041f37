use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// Price descriptor and payment URL minted for one signing request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub url: String,
    pub amount: String,
    pub currency: String,
    pub network: String,
    pub pay_to: String,
}

/// Payment collaborator: mints payment URLs and price descriptors. Completed
/// payments are recorded on the signing record by the external settlement
/// callback, not through this trait.
pub trait PaymentProvider: Send + Sync {
    fn enabled(&self) -> bool;
    fn payment_request(&self, request_id: &str) -> Result<PaymentRequest>;
}

/// x402-style provider: a static price descriptor plus a per-request URL
/// under the configured payment base.
#[derive(Clone, Debug)]
pub struct X402PaymentProvider {
    enabled: bool,
    base_url: String,
    amount: String,
    currency: String,
    network: String,
    pay_to: String,
}

impl X402PaymentProvider {
    pub fn new(
        enabled: bool,
        base_url: String,
        amount: String,
        currency: String,
        network: String,
        pay_to: String,
    ) -> Self {
        Self {
            enabled,
            base_url,
            amount,
            currency,
            network,
            pay_to,
        }
    }

    /// Payment mode switched off entirely.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            amount: String::new(),
            currency: String::new(),
            network: String::new(),
            pay_to: String::new(),
        }
    }
}

impl PaymentProvider for X402PaymentProvider {
    fn enabled(&self) -> bool {
        self.enabled
    }

    fn payment_request(&self, request_id: &str) -> Result<PaymentRequest> {
        if !self.enabled {
            return Err(AgentError::NotConfigured(
                "payment mode is not enabled".to_string(),
            ));
        }
        Ok(PaymentRequest {
            url: format!("{}/pay/{request_id}", self.base_url.trim_end_matches('/')),
            amount: self.amount.clone(),
            currency: self.currency.clone(),
            network: self.network.clone(),
            pay_to: self.pay_to.clone(),
        })
    }
}
