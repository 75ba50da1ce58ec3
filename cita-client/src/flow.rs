//! Booking flow controller
//!
//! Three stages: Schedule → Payment → Success. The only way back is
//! Payment → Schedule, and only before an appointment exists. Success is
//! terminal; `close` drops everything.

use chrono::NaiveDate;
use shared::models::{AvailabilityDay, Business, PaymentStatus, Service};
use tokio::sync::watch;

use crate::availability::{AvailabilityOutcome, AvailabilityResolver, Bucket, BucketPolicy, bucketize};
use crate::payment::{CardFormSubmission, LoadReport, PaymentState, PaymentStep};
use crate::processing::ProcessingFlag;
use crate::selection::{Selection, SlotSelector};
use crate::transport::Transport;
use crate::{ApiGateway, ClientConfig, ClientError, ClientResult};

/// Visible stage of the flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStage {
    Schedule,
    Payment,
    Success,
}

/// Flow state as one tagged value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    SelectingSlot,
    SelectingMethod,
    AwaitingProviderConfirmation,
    Done { appointment_id: String },
}

/// One booking of one service at one business
pub struct BookingFlow<T: Transport> {
    gateway: ApiGateway<T>,
    business: Business,
    service: Service,
    policy: BucketPolicy,
    processing: ProcessingFlag,
    resolver: AvailabilityResolver<T>,
    selector: SlotSelector,
    days: Vec<AvailabilityDay>,
    availability_error: Option<String>,
    payment: Option<PaymentStep<T>>,
    stage: BookingStage,
}

impl<T: Transport> BookingFlow<T> {
    pub fn new(
        gateway: ApiGateway<T>,
        business: Business,
        service_id: &str,
        config: &ClientConfig,
    ) -> ClientResult<Self> {
        let service = business
            .service(service_id)
            .cloned()
            .ok_or_else(|| {
                ClientError::NotFound(format!("Service {} at {}", service_id, business.name))
            })?;
        let processing = ProcessingFlag::new();
        let resolver = AvailabilityResolver::new(gateway.clone(), processing.clone());

        tracing::debug!(business_id = %business.id, service_id = %service.id, "Booking flow opened");
        Ok(Self {
            gateway,
            business,
            service,
            policy: config.bucket_policy,
            processing,
            resolver,
            selector: SlotSelector::new(),
            days: Vec::new(),
            availability_error: None,
            payment: None,
            stage: BookingStage::Schedule,
        })
    }

    /// Fetch the business by slug and open a flow for one of its services
    pub async fn open(
        gateway: ApiGateway<T>,
        slug: &str,
        service_id: &str,
        config: &ClientConfig,
    ) -> ClientResult<Self> {
        let business = gateway.business(slug).await?;
        Self::new(gateway, business, service_id, config)
    }

    // ========== State ==========

    pub fn stage(&self) -> BookingStage {
        self.stage
    }

    pub fn state(&self) -> FlowState {
        match (&self.stage, self.payment.as_ref().map(PaymentStep::state)) {
            (BookingStage::Schedule, _) => FlowState::SelectingSlot,
            (_, Some(PaymentState::Done { appointment_id })) => FlowState::Done {
                appointment_id: appointment_id.clone(),
            },
            (_, Some(PaymentState::AwaitingProviderConfirmation { .. })) => {
                FlowState::AwaitingProviderConfirmation
            }
            (_, _) => FlowState::SelectingMethod,
        }
    }

    pub fn business(&self) -> &Business {
        &self.business
    }

    pub fn service(&self) -> &Service {
        &self.service
    }

    pub fn selector(&self) -> &SlotSelector {
        &self.selector
    }

    pub fn payment(&self) -> Option<&PaymentStep<T>> {
        self.payment.as_ref()
    }

    pub fn days(&self) -> &[AvailabilityDay] {
        &self.days
    }

    /// Message of the last failed availability query
    pub fn availability_error(&self) -> Option<&str> {
        self.availability_error.as_deref()
    }

    pub fn is_processing(&self) -> bool {
        self.processing.is_processing()
    }

    pub fn processing_watch(&self) -> watch::Receiver<bool> {
        self.processing.subscribe()
    }

    pub fn gateway(&self) -> &ApiGateway<T> {
        &self.gateway
    }

    fn require(&self, stage: BookingStage, action: &str) -> ClientResult<()> {
        if self.stage == stage {
            Ok(())
        } else {
            Err(ClientError::InvalidState(format!(
                "Cannot {} during the {:?} stage",
                action, self.stage
            )))
        }
    }

    // ========== Schedule stage ==========

    /// (Re)load slots for the selected date, or the default window
    pub async fn load_availability(&mut self) -> ClientResult<&[AvailabilityDay]> {
        self.require(BookingStage::Schedule, "load availability")?;
        let outcome = self
            .resolver
            .resolve(&self.service.id, self.selector.date())
            .await;

        match outcome {
            AvailabilityOutcome::Days(days) => {
                self.days = days;
                self.availability_error = None;
            }
            AvailabilityOutcome::Empty => {
                self.days.clear();
                self.availability_error = None;
            }
            AvailabilityOutcome::Unavailable(e) => {
                self.days.clear();
                self.availability_error = Some(e.to_string());
                return Err(e);
            }
            // Exclusive borrow: no newer query from this flow can exist
            AvailabilityOutcome::Superseded => {}
        }
        Ok(&self.days)
    }

    /// Switch the date filter and reload
    pub async fn change_date(&mut self, date: Option<NaiveDate>) -> ClientResult<&[AvailabilityDay]> {
        self.require(BookingStage::Schedule, "change the date")?;
        self.selector.change_date(date);
        self.load_availability().await
    }

    /// Buckets of one loaded day under the configured policy
    pub fn buckets(&self, date: NaiveDate) -> Vec<Bucket> {
        self.days
            .iter()
            .find(|d| d.date == date)
            .map(|d| bucketize(&d.slots, self.policy))
            .unwrap_or_default()
    }

    pub fn toggle_bucket(&mut self, date: NaiveDate, label: &str) -> ClientResult<()> {
        self.require(BookingStage::Schedule, "open a time range")?;
        self.selector.toggle_bucket(date, label);
        Ok(())
    }

    /// Select the loaded slot at `time` on `date`
    pub fn select_slot(&mut self, date: NaiveDate, time: &str) -> ClientResult<&Selection> {
        self.require(BookingStage::Schedule, "select a time")?;
        let slot = self
            .days
            .iter()
            .find(|d| d.date == date)
            .and_then(|d| d.slot(time))
            .ok_or_else(|| ClientError::Validation(format!("No slot at {} on {}", time, date)))?;
        Ok(self.selector.select_slot(date, slot))
    }

    pub fn select_staff(&mut self, staff_id: &str) -> ClientResult<()> {
        self.require(BookingStage::Schedule, "select a staff member")?;
        self.selector.select_staff(staff_id)
    }

    pub fn can_continue(&self) -> bool {
        self.stage == BookingStage::Schedule && self.selector.can_continue()
    }

    /// Move to payment with the current selection
    pub async fn advance_to_payment(&mut self) -> ClientResult<LoadReport> {
        self.require(BookingStage::Schedule, "continue to payment")?;
        let handoff = self.selector.continue_booking(&self.service, &self.business)?;
        self.resolver.cancel();

        let mut step = PaymentStep::for_new_booking(
            self.gateway.clone(),
            self.processing.clone(),
            &self.business,
            &self.service,
            handoff,
        );
        let report = step.load().await;
        self.payment = Some(step);
        self.stage = BookingStage::Payment;
        tracing::info!(
            service_id = %self.service.id,
            min_amount = ?self.payment.as_ref().map(PaymentStep::min_required),
            "Booking moved to payment"
        );
        Ok(report)
    }

    // ========== Payment stage ==========

    fn payment_mut(&mut self, action: &str) -> ClientResult<&mut PaymentStep<T>> {
        self.require(BookingStage::Payment, action)?;
        self.payment
            .as_mut()
            .ok_or_else(|| ClientError::Internal("Payment stage without a payment step".into()))
    }

    fn sync_stage(&mut self) {
        if self.payment.as_ref().is_some_and(PaymentStep::is_done) {
            self.stage = BookingStage::Success;
            tracing::info!(
                appointment_id = ?self.payment.as_ref().and_then(PaymentStep::appointment_id),
                "Booking completed"
            );
        }
    }

    pub fn set_amount(&mut self, amount: f64) -> ClientResult<()> {
        self.payment_mut("change the amount")?.set_amount(amount)
    }

    pub async fn confirm(&mut self, method_name: &str) -> ClientResult<FlowState> {
        let result = self
            .payment_mut("confirm a payment")?
            .confirm(method_name)
            .await
            .map(|_| ());
        self.sync_stage();
        result.map(|_| self.state())
    }

    pub async fn submit_provider_form(
        &mut self,
        submission: CardFormSubmission,
    ) -> ClientResult<FlowState> {
        let result = self
            .payment_mut("submit the card form")?
            .submit_provider_form(submission)
            .await
            .map(|_| ());
        self.sync_stage();
        result.map(|_| self.state())
    }

    pub fn resume_from_redirect(&mut self, status: PaymentStatus) -> ClientResult<FlowState> {
        let result = self
            .payment_mut("resume a checkout")?
            .resume_from_redirect(status)
            .map(|_| ());
        self.sync_stage();
        result.map(|_| self.state())
    }

    pub fn cancel_provider_form(&mut self) -> ClientResult<FlowState> {
        self.payment_mut("dismiss the card form")?
            .cancel_provider_form()?;
        Ok(self.state())
    }

    /// Payment → Schedule, keeping the previous selection
    ///
    /// Refused once the appointment has been placed or while a provider
    /// form is mounted.
    pub fn back_to_schedule(&mut self) -> ClientResult<()> {
        let step = self.payment_mut("go back")?;
        if step.has_appointment() {
            return Err(ClientError::InvalidState(
                "The appointment has already been created".into(),
            ));
        }
        if step.is_awaiting_provider() {
            return Err(ClientError::InvalidState(
                "Finish or dismiss the card form first".into(),
            ));
        }
        self.payment = None;
        self.stage = BookingStage::Schedule;
        Ok(())
    }

    /// End the flow, returning the booked appointment id if it completed
    pub fn close(self) -> Option<String> {
        self.resolver.cancel();
        match self.state() {
            FlowState::Done { appointment_id } => Some(appointment_id),
            _ => None,
        }
    }
}
