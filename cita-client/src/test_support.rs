//! Fake booking API for tests
//!
//! An axum `Router` with a single fallback handler that records every call
//! and answers from a table keyed by `"METHOD /path"` (query excluded).
//! Unknown routes answer 404.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use http::{HeaderMap, Method, StatusCode, Uri};
use serde_json::{Value, json};
use shared::models::{
    Business, CreatePaymentRequest, LoginResponse, PaymentStatus, PlaceAppointmentRequest,
};

use crate::session::Session;
use crate::transport::OneshotTransport;
use crate::{ApiGateway, ClientConfig};

/// One recorded request
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    /// Path plus query
    pub uri: String,
    /// `"METHOD /path"`
    pub key: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

impl RecordedCall {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

#[derive(Clone)]
struct Canned {
    status: StatusCode,
    body: String,
}

#[derive(Default)]
struct BackendState {
    responses: HashMap<String, Canned>,
    delays: HashMap<String, Duration>,
    calls: Vec<RecordedCall>,
}

#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<BackendState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, key: &str, body: Value) {
        self.respond_status(key, StatusCode::OK, body);
    }

    pub fn respond_status(&self, key: &str, status: StatusCode, body: Value) {
        self.respond_raw(key, status, &body.to_string());
    }

    pub fn respond_raw(&self, key: &str, status: StatusCode, body: &str) {
        self.state.lock().unwrap().responses.insert(
            key.to_string(),
            Canned {
                status,
                body: body.to_string(),
            },
        );
    }

    pub fn delay(&self, key: &str, delay: Duration) {
        self.state
            .lock()
            .unwrap()
            .delays
            .insert(key.to_string(), delay);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        self.state.lock().unwrap().calls.last().cloned()
    }

    pub fn count(&self, key: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.key == key)
            .count()
    }

    pub fn calls_to(&self, key: &str) -> Vec<RecordedCall> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.key == key)
            .cloned()
            .collect()
    }

    pub fn router(&self) -> Router {
        Router::new().fallback(handle).with_state(self.clone())
    }
}

async fn handle(
    State(backend): State<FakeBackend>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let key = format!("{} {}", method, uri.path());
    let header = |name: http::header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let (canned, delay) = {
        let mut state = backend.state.lock().unwrap();
        state.calls.push(RecordedCall {
            method: method.clone(),
            uri: uri.to_string(),
            key: key.clone(),
            authorization: header(http::header::AUTHORIZATION),
            content_type: header(http::header::CONTENT_TYPE),
            body: String::from_utf8_lossy(&body).to_string(),
        });
        (
            state.responses.get(&key).cloned(),
            state.delays.get(&key).copied(),
        )
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let canned = canned.unwrap_or_else(|| Canned {
        status: StatusCode::NOT_FOUND,
        body: json!({"detail": format!("No fake response for {}", key)}).to_string(),
    });
    (
        canned.status,
        [(http::header::CONTENT_TYPE, "application/json")],
        canned.body,
    )
        .into_response()
}

// ============================================================================
// Gateways
// ============================================================================

pub fn login_response(token: &str) -> LoginResponse {
    LoginResponse {
        access_token: token.to_string(),
        token_type: Some("bearer".into()),
        user_email: Some("ana@example.com".into()),
        level: Some(3),
    }
}

pub fn gateway_with_timeout(backend: &FakeBackend, timeout: Duration) -> ApiGateway<OneshotTransport> {
    let config = ClientConfig::new("http://fake").with_request_timeout(timeout);
    let gateway = ApiGateway::new(
        OneshotTransport::new(backend.router()),
        Session::in_memory(),
        &config,
    );
    gateway
        .session()
        .sign_in(&login_response("t1"), "ana@example.com")
        .unwrap();
    gateway
}

/// Signed-in gateway (token `t1`)
pub fn gateway(backend: &FakeBackend) -> ApiGateway<OneshotTransport> {
    gateway_with_timeout(backend, Duration::from_secs(5))
}

pub fn anonymous_gateway(backend: &FakeBackend) -> ApiGateway<OneshotTransport> {
    ApiGateway::new(
        OneshotTransport::new(backend.router()),
        Session::in_memory(),
        &ClientConfig::new("http://fake"),
    )
}

// ============================================================================
// Fixtures
// ============================================================================

/// Barberia Norte: "Corte" costs 1000 with a 20% deposit, "Barba" has none
pub fn business_json() -> Value {
    json!({
        "id": "b1",
        "name": "Barberia Norte",
        "slug": "barberia-norte",
        "address": "Av. Siempre Viva 742",
        "schedules": [
            {"day_of_week": 0, "open_time": "09:00:00", "close_time": "13:00:00", "is_closed": false},
            {"day_of_week": 0, "open_time": "15:00:00", "close_time": "19:00:00", "is_closed": false},
            {"day_of_week": 6, "is_closed": true}
        ],
        "services": [
            {"id": "s1", "name": "Corte", "duration": 30, "price": 1000, "deposit_percentage": 20},
            {"id": "s2", "name": "Barba", "duration": 20, "price": 500}
        ]
    })
}

pub fn business() -> Business {
    serde_json::from_value(business_json()).unwrap()
}

/// Friday 2025-03-14: a single-staff morning slot, a two-staff afternoon slot
/// and an evening slot
pub fn availability_json() -> Value {
    json!([
        {
            "date": "2025-03-14",
            "day_name": "Friday",
            "slots": [
                {"time": "09:00", "available_employees": [{"id": "A", "name": "Ana"}]},
                {"time": "09:30", "available_employees": [{"id": "A", "name": "Ana"}]},
                {"time": "14:00", "available_employees": [{"id": "A", "name": "Ana"}, {"id": "B", "name": "Beto"}]},
                {"time": "18:30", "available_employees": [{"id": "B", "name": "Beto"}]}
            ]
        },
        {
            "date": "2025-03-15",
            "day_name": "Saturday",
            "slots": []
        }
    ])
}

pub fn profile_json() -> Value {
    json!({"id": "u1", "email": "ana@example.com", "full_name": "Ana Perez", "level": 3})
}

pub fn methods_json() -> Value {
    json!([
        {"id": "m1", "name": "Efectivo"},
        {"id": "m2", "name": "Mercado Pago", "provider": "mercadopago"}
    ])
}

pub fn place_request() -> PlaceAppointmentRequest {
    PlaceAppointmentRequest {
        business_id: "b1".into(),
        service_id: "s1".into(),
        client_id: Some("u1".into()),
        staff_id: "A".into(),
        start_time: "2025-03-14T09:00:00".into(),
        notes: String::new(),
    }
}

pub fn payment_request() -> CreatePaymentRequest {
    CreatePaymentRequest {
        appointment_id: "a1".into(),
        amount: 200.0,
        payment_method_type: "Efectivo".into(),
        description: "Booking payment: Corte".into(),
        status: PaymentStatus::Pending,
    }
}

/// Backend ready for a full booking: business, availability, methods,
/// profile and appointment creation
pub fn booking_backend() -> FakeBackend {
    let backend = FakeBackend::new();
    backend.respond("GET /businesses/barberia-norte", business_json());
    backend.respond("GET /services/s1/availability", availability_json());
    backend.respond("GET /services/s2/availability", availability_json());
    backend.respond("GET /paymethods/business/b1/public", methods_json());
    backend.respond("GET /auth/me", profile_json());
    backend.respond("POST /appointments/place", json!({"id": "a1", "status": "pending"}));
    backend
}

/// Intent for a manual method
pub fn manual_intent() -> Value {
    json!({"id": "p1", "appointment_id": "a1", "amount": 200, "payment_method_type": "Efectivo", "status": "pending"})
}

/// Intent for the embedded provider form
pub fn provider_intent() -> Value {
    json!({
        "id": "p2",
        "appointment_id": "a1",
        "amount": 200,
        "payment_method_type": "Mercado Pago",
        "status": "pending",
        "public_key": "TEST-pk"
    })
}
