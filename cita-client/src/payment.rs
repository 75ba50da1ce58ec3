//! Payment step
//!
//! ```text
//! SelectingMethod ──confirm(manual)──────────────────────▶ Done
//!        │                                                  ▲
//!        └─confirm(provider)─▶ AwaitingProviderConfirmation ─┘ approved
//!                 ▲                │ rejected / cancel_provider_form
//!                 └────────────────┘
//! ```
//!
//! The appointment is created at most once per step: retries after a
//! rejection or a network error reuse the memoized id and only create a
//! new payment intent.

use chrono::NaiveDate;
use shared::models::{
    Appointment, Business, CreatePaymentRequest, PaymentIntent, PaymentMethod, PaymentStatus,
    PlaceAppointmentRequest, ProviderConfirmationRequest, Service, Slot, UserProfile,
};
use shared::{money, time};

use crate::processing::ProcessingFlag;
use crate::selection::ScheduleHandoff;
use crate::transport::Transport;
use crate::{ApiGateway, ClientError, ClientResult};

/// Provider-side completion the user still has to go through
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderHandoff {
    /// Mount the provider's card form with this key and amount
    EmbeddedForm {
        payment_id: String,
        public_key: String,
        amount: f64,
    },
    /// Send the user to the provider's hosted checkout
    Redirect {
        payment_id: String,
        checkout_url: String,
    },
}

impl ProviderHandoff {
    pub fn payment_id(&self) -> &str {
        match self {
            Self::EmbeddedForm { payment_id, .. } | Self::Redirect { payment_id, .. } => payment_id,
        }
    }
}

/// Payment step state
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentState {
    SelectingMethod,
    AwaitingProviderConfirmation {
        handoff: ProviderHandoff,
        /// The provider answered with neither approval nor rejection
        pending: bool,
    },
    Done {
        appointment_id: String,
    },
}

/// Data issued by the provider's card form on submit
#[derive(Debug, Clone, PartialEq)]
pub struct CardFormSubmission {
    pub token: String,
    pub payment_method_id: String,
    pub issuer_id: Option<String>,
    pub installments: u32,
}

/// What `load` managed to fetch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub methods: usize,
    pub profile_loaded: bool,
    pub errors: Vec<String>,
}

impl LoadReport {
    pub fn is_degraded(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Appointment still to be placed
#[derive(Debug, Clone)]
struct NewBooking {
    service_id: String,
    staff_id: String,
    date: NaiveDate,
    slot: Slot,
}

/// Payment step for one appointment
pub struct PaymentStep<T: Transport> {
    gateway: ApiGateway<T>,
    processing: ProcessingFlag,
    business_id: String,
    service_name: String,
    booking: Option<NewBooking>,
    appointment_id: Option<String>,
    min_required: f64,
    amount: f64,
    methods: Vec<PaymentMethod>,
    profile: Option<UserProfile>,
    state: PaymentState,
    last_error: Option<String>,
    last_intent: Option<PaymentIntent>,
}

impl<T: Transport> PaymentStep<T> {
    /// Step for a fresh booking; the appointment is placed on first confirm
    pub fn for_new_booking(
        gateway: ApiGateway<T>,
        processing: ProcessingFlag,
        business: &Business,
        service: &Service,
        handoff: ScheduleHandoff,
    ) -> Self {
        let min_required = handoff.min_amount;
        Self {
            gateway,
            processing,
            business_id: business.id.clone(),
            service_name: service.name.clone(),
            booking: Some(NewBooking {
                service_id: service.id.clone(),
                staff_id: handoff.staff_id,
                date: handoff.date,
                slot: handoff.slot,
            }),
            appointment_id: None,
            min_required,
            amount: min_required,
            methods: Vec::new(),
            profile: None,
            state: PaymentState::SelectingMethod,
            last_error: None,
            last_intent: None,
        }
    }

    /// Step paying the outstanding deposit of an existing appointment
    pub fn for_existing(
        gateway: ApiGateway<T>,
        processing: ProcessingFlag,
        appointment: &Appointment,
    ) -> Self {
        let min_required = appointment.outstanding_deposit();
        Self {
            gateway,
            processing,
            business_id: appointment.business_id.clone(),
            service_name: appointment
                .service
                .as_ref()
                .map(|s| s.name.clone())
                .unwrap_or_else(|| "appointment".to_string()),
            booking: None,
            appointment_id: Some(appointment.id.clone()),
            min_required,
            amount: min_required,
            methods: Vec::new(),
            profile: None,
            state: PaymentState::SelectingMethod,
            last_error: None,
            last_intent: None,
        }
    }

    // ========== Accessors ==========

    pub fn state(&self) -> &PaymentState {
        &self.state
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn min_required(&self) -> f64 {
        self.min_required
    }

    pub fn methods(&self) -> &[PaymentMethod] {
        &self.methods
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    /// User-facing message of the last failed action
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn appointment_id(&self) -> Option<&str> {
        self.appointment_id.as_deref()
    }

    /// True once this step has placed (or was given) an appointment
    pub fn has_appointment(&self) -> bool {
        self.appointment_id.is_some()
    }

    /// True when this step placed the appointment itself
    pub fn created_appointment(&self) -> bool {
        self.booking.is_some() && self.appointment_id.is_some()
    }

    pub fn last_intent(&self) -> Option<&PaymentIntent> {
        self.last_intent.as_ref()
    }

    pub fn is_awaiting_provider(&self) -> bool {
        matches!(self.state, PaymentState::AwaitingProviderConfirmation { .. })
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, PaymentState::Done { .. })
    }

    // ========== Operations ==========

    /// Fetch payment methods and the user profile in parallel
    ///
    /// Failures are logged and leave the list empty or the profile unset;
    /// method selection still renders.
    pub async fn load(&mut self) -> LoadReport {
        let _busy = self.processing.begin();
        let (methods, profile) = tokio::join!(
            self.gateway.public_payment_methods(&self.business_id),
            self.gateway.me()
        );

        let mut report = LoadReport::default();
        match methods {
            Ok(methods) => self.methods = methods,
            Err(e) => {
                tracing::warn!(business_id = %self.business_id, error = %e, "Failed to load payment methods");
                self.methods.clear();
                report.errors.push(e.to_string());
            }
        }
        match profile {
            Ok(profile) => self.profile = Some(profile),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load user profile");
                report.errors.push(e.to_string());
            }
        }
        report.methods = self.methods.len();
        report.profile_loaded = self.profile.is_some();
        report
    }

    pub fn set_amount(&mut self, amount: f64) -> ClientResult<()> {
        if !matches!(self.state, PaymentState::SelectingMethod) {
            return Err(ClientError::InvalidState(
                "The amount can only change while choosing a method".into(),
            ));
        }
        if !amount.is_finite() || amount < 0.0 {
            return Err(ClientError::Validation(format!("Invalid amount: {}", amount)));
        }
        self.amount = amount;
        Ok(())
    }

    /// Pay `amount` with the method named `method_name`
    pub async fn confirm(&mut self, method_name: &str) -> ClientResult<&PaymentState> {
        if !matches!(self.state, PaymentState::SelectingMethod) {
            return Err(ClientError::InvalidState(
                "A payment is already waiting for the provider".into(),
            ));
        }

        if money::is_below(self.amount, self.min_required) {
            let err = ClientError::Validation(format!(
                "The minimum amount is {}",
                money::format_amount(self.min_required)
            ));
            self.last_error = Some(err.to_string());
            return Err(err);
        }
        let method_name = method_name.trim();
        if method_name.is_empty() {
            let err = ClientError::Validation("Choose a payment method".into());
            self.last_error = Some(err.to_string());
            return Err(err);
        }
        // Empty list: methods failed to load, the intent alone decides
        let provider = match self.methods.iter().find(|m| m.wire_name() == method_name) {
            Some(method) => method.provider.clone().filter(|p| !p.is_empty()),
            None if self.methods.is_empty() => None,
            None => {
                let err = ClientError::Validation(format!(
                    "{} is not accepted by this business",
                    method_name
                ));
                self.last_error = Some(err.to_string());
                return Err(err);
            }
        };

        let _busy = self.processing.try_begin_exclusive()?;
        self.last_error = None;

        match self.place_and_pay(method_name, provider.as_deref()).await {
            Ok(next) => {
                self.state = next;
                Ok(&self.state)
            }
            Err(e) => {
                tracing::warn!(
                    appointment_id = ?self.appointment_id,
                    method = method_name,
                    error = %e,
                    "Payment confirmation failed"
                );
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn place_and_pay(
        &mut self,
        method_name: &str,
        provider: Option<&str>,
    ) -> ClientResult<PaymentState> {
        let appointment_id = self.ensure_appointment().await?;

        let request = CreatePaymentRequest {
            appointment_id: appointment_id.clone(),
            amount: money::to_f64(money::to_decimal(self.amount)),
            payment_method_type: method_name.to_string(),
            description: format!("Booking payment: {}", self.service_name),
            status: PaymentStatus::Pending,
        };
        let intent = self.gateway.create_payment(&request).await?;
        tracing::info!(
            appointment_id = %appointment_id,
            payment_id = %intent.id,
            status = ?intent.status,
            "Payment intent created"
        );
        self.last_intent = Some(intent.clone());

        if intent.status == PaymentStatus::Rejected {
            return Err(ClientError::PaymentRejected(format!(
                "payment {} was rejected",
                intent.id
            )));
        }

        let next = match (
            intent.public_key.filter(|k| !k.is_empty()),
            intent.checkout_url.filter(|u| !u.is_empty()),
        ) {
            (Some(public_key), _) => PaymentState::AwaitingProviderConfirmation {
                handoff: ProviderHandoff::EmbeddedForm {
                    payment_id: intent.id,
                    public_key,
                    amount: intent.amount,
                },
                pending: false,
            },
            (None, Some(checkout_url)) => PaymentState::AwaitingProviderConfirmation {
                handoff: ProviderHandoff::Redirect {
                    payment_id: intent.id,
                    checkout_url,
                },
                pending: false,
            },
            (None, None) => match provider {
                // Provider-backed methods only finish through an approval
                Some(provider) => {
                    return Err(ClientError::InvalidResponse(format!(
                        "payment {} carries no {} checkout details",
                        intent.id, provider
                    )));
                }
                // Manual method, settled at the venue
                None => PaymentState::Done { appointment_id },
            },
        };
        Ok(next)
    }

    /// Memoized appointment id, placing the appointment on first use
    async fn ensure_appointment(&mut self) -> ClientResult<String> {
        if let Some(id) = &self.appointment_id {
            return Ok(id.clone());
        }
        let booking = self
            .booking
            .clone()
            .ok_or_else(|| ClientError::InvalidState("No appointment to pay".into()))?;

        if self.profile.is_none() {
            match self.gateway.me().await {
                Ok(profile) => self.profile = Some(profile),
                Err(ClientError::Unauthorized) => return Err(ClientError::Unauthorized),
                Err(e) => tracing::warn!(error = %e, "Placing appointment without a client id"),
            }
        }

        let request = PlaceAppointmentRequest {
            business_id: self.business_id.clone(),
            service_id: booking.service_id,
            client_id: self.profile.as_ref().map(|p| p.id.clone()),
            staff_id: booking.staff_id,
            start_time: time::format_start_time(booking.date, booking.slot.parsed_time()?),
            notes: String::new(),
        };
        let placed = self.gateway.place_appointment(&request).await?;
        tracing::info!(
            appointment_id = %placed.id,
            start_time = %request.start_time,
            staff_id = %request.staff_id,
            "Appointment placed"
        );
        self.appointment_id = Some(placed.id.clone());
        Ok(placed.id)
    }

    /// Forward the card form's submission to the provider confirmation
    pub async fn submit_provider_form(
        &mut self,
        submission: CardFormSubmission,
    ) -> ClientResult<&PaymentState> {
        let payment_id = match &self.state {
            PaymentState::AwaitingProviderConfirmation {
                handoff: ProviderHandoff::EmbeddedForm { payment_id, .. },
                ..
            } => payment_id.clone(),
            _ => {
                return Err(ClientError::InvalidState(
                    "No provider form is mounted".into(),
                ));
            }
        };

        let _busy = self.processing.try_begin_exclusive()?;
        let request = ProviderConfirmationRequest {
            token: submission.token,
            provider_payment_method_id: submission.payment_method_id,
            issuer_id: submission.issuer_id,
            installments: submission.installments,
        };

        let response = match self
            .gateway
            .confirm_provider_payment(&payment_id, &request)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(payment_id = %payment_id, error = %e, "Provider confirmation failed");
                self.last_error = Some(e.to_string());
                return Err(e);
            }
        };

        tracing::info!(
            payment_id = %payment_id,
            status = ?response.status,
            detail = ?response.status_detail,
            "Provider confirmation answered"
        );
        self.apply_provider_status(response.status, response.status_detail)
    }

    /// Apply the status the hosted checkout reported on return
    pub fn resume_from_redirect(&mut self, status: PaymentStatus) -> ClientResult<&PaymentState> {
        if !matches!(
            self.state,
            PaymentState::AwaitingProviderConfirmation {
                handoff: ProviderHandoff::Redirect { .. },
                ..
            }
        ) {
            return Err(ClientError::InvalidState(
                "No hosted checkout in progress".into(),
            ));
        }
        self.apply_provider_status(status, None)
    }

    fn apply_provider_status(
        &mut self,
        status: PaymentStatus,
        detail: Option<String>,
    ) -> ClientResult<&PaymentState> {
        match status {
            PaymentStatus::Approved => {
                let appointment_id = self
                    .appointment_id
                    .clone()
                    .ok_or_else(|| ClientError::Internal("Approved payment without appointment".into()))?;
                self.last_error = None;
                self.state = PaymentState::Done { appointment_id };
                Ok(&self.state)
            }
            PaymentStatus::Rejected => {
                let err =
                    ClientError::PaymentRejected(detail.unwrap_or_else(|| "rejected".to_string()));
                self.last_error = Some(err.to_string());
                self.state = PaymentState::SelectingMethod;
                Err(err)
            }
            _ => {
                if let PaymentState::AwaitingProviderConfirmation { pending, .. } = &mut self.state {
                    *pending = true;
                }
                self.last_error = None;
                Ok(&self.state)
            }
        }
    }

    /// Unmount the provider form and go back to choosing a method
    ///
    /// The appointment and intent stay on the server as pending; no
    /// cancellation is sent.
    pub fn cancel_provider_form(&mut self) -> ClientResult<()> {
        let PaymentState::AwaitingProviderConfirmation { handoff, .. } = &self.state else {
            return Err(ClientError::InvalidState(
                "No provider form is mounted".into(),
            ));
        };
        tracing::info!(
            payment_id = %handoff.payment_id(),
            appointment_id = ?self.appointment_id,
            "Provider form dismissed, intent left pending"
        );
        self.state = PaymentState::SelectingMethod;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, FakeBackend};
    use crate::transport::OneshotTransport;
    use http::StatusCode;
    use serde_json::json;
    use std::time::Duration;

    fn handoff(min_amount: f64) -> ScheduleHandoff {
        ScheduleHandoff {
            date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            slot: Slot {
                time: "09:00".into(),
                available_employees: vec![],
            },
            staff_id: "A".into(),
            min_amount,
        }
    }

    fn new_step(backend: &FakeBackend) -> PaymentStep<OneshotTransport> {
        let business = test_support::business();
        let service = business.service("s1").unwrap().clone();
        let min = service.minimum_deposit(&business);
        PaymentStep::for_new_booking(
            test_support::gateway(backend),
            ProcessingFlag::new(),
            &business,
            &service,
            handoff(min),
        )
    }

    fn card() -> CardFormSubmission {
        CardFormSubmission {
            token: "card-token".into(),
            payment_method_id: "visa".into(),
            issuer_id: Some("310".into()),
            installments: 1,
        }
    }

    #[tokio::test]
    async fn test_load_fetches_methods_and_profile() {
        let backend = test_support::booking_backend();
        let mut step = new_step(&backend);

        let report = step.load().await;

        assert_eq!(report.methods, 2);
        assert!(report.profile_loaded);
        assert!(!report.is_degraded());
        assert_eq!(step.profile().unwrap().id, "u1");
    }

    #[tokio::test]
    async fn test_load_degrades_on_failure() {
        let backend = test_support::booking_backend();
        backend.respond_status(
            "GET /paymethods/business/b1/public",
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"detail": "db down"}),
        );
        let mut step = new_step(&backend);

        let report = step.load().await;

        assert!(report.is_degraded());
        assert_eq!(report.methods, 0);
        assert!(report.profile_loaded);
        assert_eq!(step.state(), &PaymentState::SelectingMethod);
    }

    #[tokio::test]
    async fn test_amount_below_minimum_makes_no_call() {
        let backend = test_support::booking_backend();
        let mut step = new_step(&backend);
        assert_eq!(step.min_required(), 200.0);

        step.set_amount(150.0).unwrap();
        let result = step.confirm("Efectivo").await;

        assert!(matches!(result, Err(ClientError::Validation(_))));
        assert!(backend.calls().is_empty());
        assert_eq!(step.state(), &PaymentState::SelectingMethod);
        assert_eq!(step.last_error(), Some("Validation error: The minimum amount is $200.00"));
    }

    #[tokio::test]
    async fn test_manual_method_goes_straight_to_done() {
        let backend = test_support::booking_backend();
        backend.respond("POST /payments", test_support::manual_intent());
        let mut step = new_step(&backend);
        step.load().await;

        let state = step.confirm("Efectivo").await.unwrap().clone();

        assert_eq!(state, PaymentState::Done { appointment_id: "a1".into() });
        let placed = backend.calls_to("POST /appointments/place");
        assert_eq!(placed.len(), 1);
        assert_eq!(
            placed[0].json(),
            json!({
                "business_id": "b1",
                "service_id": "s1",
                "client_id": "u1",
                "staff_id": "A",
                "start_time": "2025-03-14T09:00:00",
                "notes": ""
            })
        );
        let payment = backend.calls_to("POST /payments")[0].json();
        assert_eq!(payment["appointment_id"], "a1");
        assert_eq!(payment["amount"], 200.0);
        assert_eq!(payment["payment_method_type"], "Efectivo");
        assert_eq!(payment["description"], "Booking payment: Corte");
    }

    #[tokio::test]
    async fn test_profile_is_fetched_when_missing() {
        let backend = test_support::booking_backend();
        backend.respond("POST /payments", test_support::manual_intent());
        let mut step = new_step(&backend);

        step.confirm("Efectivo").await.unwrap();

        assert_eq!(backend.count("GET /auth/me"), 1);
        assert_eq!(backend.calls_to("POST /appointments/place")[0].json()["client_id"], "u1");
    }

    #[tokio::test]
    async fn test_provider_method_requires_approval() {
        let backend = test_support::booking_backend();
        backend.respond("POST /payments", test_support::provider_intent());
        backend.respond(
            "POST /payments/p2/confirm-mercadopago",
            json!({"status": "approved", "status_detail": "accredited"}),
        );
        let mut step = new_step(&backend);
        step.load().await;

        let state = step.confirm("Mercado Pago").await.unwrap().clone();
        assert_eq!(
            state,
            PaymentState::AwaitingProviderConfirmation {
                handoff: ProviderHandoff::EmbeddedForm {
                    payment_id: "p2".into(),
                    public_key: "TEST-pk".into(),
                    amount: 200.0,
                },
                pending: false,
            }
        );
        assert!(!step.is_done());

        let state = step.submit_provider_form(card()).await.unwrap().clone();
        assert_eq!(state, PaymentState::Done { appointment_id: "a1".into() });
        let confirmation = backend.last_call().unwrap().json();
        assert_eq!(
            confirmation,
            json!({
                "token": "card-token",
                "provider_payment_method_id": "visa",
                "issuer_id": "310",
                "installments": 1
            })
        );
    }

    #[tokio::test]
    async fn test_rejection_keeps_appointment_for_retry() {
        let backend = test_support::booking_backend();
        backend.respond("POST /payments", test_support::provider_intent());
        backend.respond(
            "POST /payments/p2/confirm-mercadopago",
            json!({"status": "rejected", "status_detail": "cc_rejected_insufficient_amount"}),
        );
        let mut step = new_step(&backend);
        step.load().await;

        step.confirm("Mercado Pago").await.unwrap();
        let result = step.submit_provider_form(card()).await;

        match result {
            Err(ClientError::PaymentRejected(detail)) => {
                assert_eq!(detail, "cc_rejected_insufficient_amount")
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(step.state(), &PaymentState::SelectingMethod);
        assert_eq!(step.appointment_id(), Some("a1"));
        assert!(step.last_error().is_some());

        // Retry with a manual method: new intent, same appointment
        backend.respond("POST /payments", test_support::manual_intent());
        let state = step.confirm("Efectivo").await.unwrap().clone();

        assert_eq!(state, PaymentState::Done { appointment_id: "a1".into() });
        assert_eq!(backend.count("POST /appointments/place"), 1);
        assert_eq!(backend.count("POST /payments"), 2);
    }

    #[tokio::test]
    async fn test_in_process_status_stays_pending() {
        let backend = test_support::booking_backend();
        backend.respond("POST /payments", test_support::provider_intent());
        backend.respond(
            "POST /payments/p2/confirm-mercadopago",
            json!({"status": "in_process", "status_detail": "pending_contingency"}),
        );
        let mut step = new_step(&backend);

        step.confirm("Mercado Pago").await.unwrap();
        let state = step.submit_provider_form(card()).await.unwrap();

        assert!(matches!(
            state,
            PaymentState::AwaitingProviderConfirmation { pending: true, .. }
        ));
    }

    #[tokio::test]
    async fn test_cancelled_status_stays_pending() {
        let backend = test_support::booking_backend();
        backend.respond("POST /payments", test_support::provider_intent());
        backend.respond(
            "POST /payments/p2/confirm-mercadopago",
            json!({"status": "cancelled"}),
        );
        let mut step = new_step(&backend);
        step.load().await;

        step.confirm("Mercado Pago").await.unwrap();
        let state = step.submit_provider_form(card()).await.unwrap().clone();

        assert!(matches!(
            state,
            PaymentState::AwaitingProviderConfirmation { pending: true, .. }
        ));
        assert!(step.last_error().is_none());
        assert!(!step.is_done());
    }

    #[tokio::test]
    async fn test_provider_method_without_checkout_details_is_not_done() {
        let backend = test_support::booking_backend();
        // Intent of a provider-backed method with neither key nor checkout url
        backend.respond(
            "POST /payments",
            json!({"id": "p5", "appointment_id": "a1", "amount": 200, "status": "pending"}),
        );
        let mut step = new_step(&backend);
        step.load().await;

        let result = step.confirm("Mercado Pago").await;

        assert!(matches!(result, Err(ClientError::InvalidResponse(_))));
        assert_eq!(step.state(), &PaymentState::SelectingMethod);
        assert_eq!(step.appointment_id(), Some("a1"));
        assert!(step.last_error().is_some());
        assert_eq!(backend.count("POST /payments/p5/confirm-mercadopago"), 0);

        // Same payload for a manual method settles at the venue
        let state = step.confirm("Efectivo").await.unwrap().clone();
        assert_eq!(state, PaymentState::Done { appointment_id: "a1".into() });
        assert_eq!(backend.count("POST /appointments/place"), 1);
    }

    #[tokio::test]
    async fn test_method_not_offered_makes_no_call() {
        let backend = test_support::booking_backend();
        let mut step = new_step(&backend);
        step.load().await;
        let calls_before = backend.calls().len();

        let result = step.confirm("Bitcoin").await;

        assert!(matches!(result, Err(ClientError::Validation(_))));
        assert_eq!(backend.calls().len(), calls_before);
        assert_eq!(step.state(), &PaymentState::SelectingMethod);
    }

    #[tokio::test]
    async fn test_intent_failure_retains_appointment() {
        let backend = test_support::booking_backend();
        backend.respond_status(
            "POST /payments",
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"detail": "provider unreachable"}),
        );
        let mut step = new_step(&backend);

        assert!(step.confirm("Efectivo").await.is_err());
        assert_eq!(step.state(), &PaymentState::SelectingMethod);
        assert_eq!(step.appointment_id(), Some("a1"));
        assert_eq!(step.last_error(), Some("API error (500): provider unreachable"));

        backend.respond("POST /payments", test_support::manual_intent());
        step.confirm("Efectivo").await.unwrap();
        assert_eq!(backend.count("POST /appointments/place"), 1);
    }

    #[tokio::test]
    async fn test_placement_failure_is_retried_with_new_placement() {
        let backend = test_support::booking_backend();
        backend.respond_status(
            "POST /appointments/place",
            StatusCode::CONFLICT,
            json!({"detail": "Slot no longer available"}),
        );
        let mut step = new_step(&backend);
        step.load().await;

        let result = step.confirm("Efectivo").await;

        assert!(matches!(result, Err(ClientError::Conflict(_))));
        assert!(!step.has_appointment());
        assert_eq!(backend.count("POST /payments"), 0);
    }

    #[tokio::test]
    async fn test_cancel_form_returns_to_methods_without_calls() {
        let backend = test_support::booking_backend();
        backend.respond("POST /payments", test_support::provider_intent());
        let mut step = new_step(&backend);

        step.confirm("Mercado Pago").await.unwrap();
        let calls_before = backend.calls().len();
        step.cancel_provider_form().unwrap();

        assert_eq!(step.state(), &PaymentState::SelectingMethod);
        assert_eq!(backend.calls().len(), calls_before);
        assert_eq!(step.appointment_id(), Some("a1"));
        assert!(matches!(step.cancel_provider_form(), Err(ClientError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_checkout_redirect() {
        let backend = test_support::booking_backend();
        backend.respond(
            "POST /payments",
            json!({
                "id": "p3",
                "appointment_id": "a1",
                "amount": 200,
                "status": "pending",
                "checkout_url": "https://checkout.example/p3"
            }),
        );
        let mut step = new_step(&backend);

        let state = step.confirm("Mercado Pago").await.unwrap().clone();
        assert_eq!(
            state,
            PaymentState::AwaitingProviderConfirmation {
                handoff: ProviderHandoff::Redirect {
                    payment_id: "p3".into(),
                    checkout_url: "https://checkout.example/p3".into(),
                },
                pending: false,
            }
        );
        assert!(matches!(
            step.submit_provider_form(card()).await,
            Err(ClientError::InvalidState(_))
        ));

        let state = step.resume_from_redirect(PaymentStatus::Approved).unwrap();
        assert_eq!(state, &PaymentState::Done { appointment_id: "a1".into() });
    }

    #[tokio::test]
    async fn test_confirm_while_busy() {
        let backend = test_support::booking_backend();
        let flag = ProcessingFlag::new();
        let business = test_support::business();
        let service = business.service("s1").unwrap().clone();
        let mut step = PaymentStep::for_new_booking(
            test_support::gateway(&backend),
            flag.clone(),
            &business,
            &service,
            handoff(200.0),
        );

        let _other = flag.begin();
        assert!(matches!(step.confirm("Efectivo").await, Err(ClientError::Busy)));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_processing_flag_during_confirm() {
        let backend = test_support::booking_backend();
        backend.respond("POST /payments", test_support::manual_intent());
        backend.delay("POST /appointments/place", Duration::from_millis(100));
        let flag = ProcessingFlag::new();
        let business = test_support::business();
        let service = business.service("s1").unwrap().clone();
        let mut step = PaymentStep::for_new_booking(
            test_support::gateway(&backend),
            flag.clone(),
            &business,
            &service,
            handoff(200.0),
        );
        let mut rx = flag.subscribe();

        let (result, seen) = tokio::join!(step.confirm("Efectivo"), async {
            rx.changed().await.unwrap();
            *rx.borrow()
        });

        assert!(result.is_ok());
        assert!(seen);
        assert!(!flag.is_processing());
    }

    #[tokio::test]
    async fn test_existing_appointment_pays_outstanding_deposit() {
        let backend = FakeBackend::new();
        backend.respond("GET /paymethods/business/b1/public", test_support::methods_json());
        backend.respond("GET /auth/me", test_support::profile_json());
        backend.respond("POST /payments", json!({"id": "p4", "appointment_id": "a7", "amount": 50, "status": "pending"}));
        let appointment: Appointment = serde_json::from_value(json!({
            "id": "a7",
            "business_id": "b1",
            "service_id": "s1",
            "start_time": "2025-03-20T10:00:00",
            "status": "pending",
            "total_amount": 1000,
            "paid_amount": 150,
            "required_deposit": 200,
            "service": {"name": "Corte"}
        }))
        .unwrap();
        let mut step = PaymentStep::for_existing(
            test_support::gateway(&backend),
            ProcessingFlag::new(),
            &appointment,
        );
        step.load().await;

        assert_eq!(step.min_required(), 50.0);
        let state = step.confirm("Efectivo").await.unwrap().clone();

        assert_eq!(state, PaymentState::Done { appointment_id: "a7".into() });
        assert_eq!(backend.count("POST /appointments/place"), 0);
        assert_eq!(backend.calls_to("POST /payments")[0].json()["amount"], 50.0);
    }

    #[tokio::test]
    async fn test_confirm_outside_selecting_method() {
        let backend = test_support::booking_backend();
        backend.respond("POST /payments", test_support::manual_intent());
        let mut step = new_step(&backend);

        step.confirm("Efectivo").await.unwrap();

        assert!(matches!(step.confirm("Efectivo").await, Err(ClientError::InvalidState(_))));
        assert!(matches!(step.set_amount(300.0), Err(ClientError::InvalidState(_))));
    }

    #[test]
    fn test_set_amount_rejects_garbage() {
        let backend = FakeBackend::new();
        let mut step = new_step(&backend);
        assert!(step.set_amount(f64::NAN).is_err());
        assert!(step.set_amount(-1.0).is_err());
        step.set_amount(250.0).unwrap();
        assert_eq!(step.amount(), 250.0);
    }
}
