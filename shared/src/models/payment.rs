//! Payment Model
//!
//! A payment intent is one attempt against an appointment. Rejected or
//! pending outcomes leave the intent in place; a retry creates a new one.

use serde::{Deserialize, Serialize};

/// Payment status reported by the server or the payment provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
    InProcess,
    Cancelled,
    /// Any provider status this client does not know
    #[serde(other)]
    Unknown,
}

/// Payment method enabled by a business (`GET /paymethods/business/{id}/public`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    pub name: String,
    /// Provider backing the method, e.g. `mercadopago`; absent for manual methods
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl PaymentMethod {
    /// Name as sent in `payment_method_type`
    pub fn wire_name(&self) -> &str {
        self.name.trim()
    }
}

/// Payment intent entity (`POST /payments` response)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub appointment_id: String,
    pub amount: f64,
    #[serde(default)]
    pub payment_method_type: Option<String>,
    pub status: PaymentStatus,
    /// Provider-side reference, set once the provider knows the payment
    #[serde(default)]
    pub external_reference: Option<String>,
    /// Public key for mounting the embedded provider form
    #[serde(default)]
    pub public_key: Option<String>,
    /// Hosted checkout page, for providers that redirect instead
    #[serde(default)]
    pub checkout_url: Option<String>,
}

/// Create payment payload (`POST /payments`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub appointment_id: String,
    pub amount: f64,
    pub payment_method_type: String,
    pub description: String,
    pub status: PaymentStatus,
}

/// Provider confirmation payload (`POST /payments/{id}/confirm-mercadopago`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfirmationRequest {
    /// Card token issued by the embedded form
    pub token: String,
    pub provider_payment_method_id: String,
    #[serde(default)]
    pub issuer_id: Option<String>,
    pub installments: u32,
}

/// Provider confirmation outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfirmationResponse {
    pub status: PaymentStatus,
    #[serde(default)]
    pub status_detail: Option<String>,
    #[serde(default, alias = "id")]
    pub payment_id: Option<String>,
}
