//! API gateway - the single chokepoint for outbound calls
//!
//! Attaches the session token, bounds every call with the configured
//! timeout, normalizes error bodies and turns any 401 into a session
//! invalidation.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use http::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::models::{
    Appointment, AvailabilityDay, Business, BusinessSearchQuery, BusinessSearchResult,
    CreatePaymentRequest, LoginForm, LoginResponse, PaymentIntent, PaymentMethod,
    PlaceAppointmentRequest, PlacedAppointment, ProviderConfirmationRequest,
    ProviderConfirmationResponse, UserProfile,
};
use tokio_util::sync::CancellationToken;

use crate::session::{InvalidationReason, Session};
use crate::transport::{ApiRequest, NetworkTransport, RawResponse, RequestBody, Transport};
use crate::{ClientConfig, ClientError, ClientResult};

/// Error body of the API (FastAPI style)
#[derive(serde::Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

/// User-facing message for a non-2xx body
fn error_message(status: StatusCode, body: &[u8]) -> String {
    let fallback = || {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    };
    match serde_json::from_slice::<ApiErrorBody>(body) {
        Ok(ApiErrorBody {
            detail: Some(serde_json::Value::String(detail)),
            ..
        }) => detail,
        // Field-level validation list
        Ok(ApiErrorBody {
            detail: Some(serde_json::Value::Array(_) | serde_json::Value::Object(_)),
            ..
        }) => "Invalid data".to_string(),
        Ok(ApiErrorBody {
            message: Some(message),
            ..
        }) => message,
        _ => {
            let text = String::from_utf8_lossy(body).trim().to_string();
            if text.is_empty() || text.starts_with('{') || text.starts_with('<') {
                fallback()
            } else {
                text
            }
        }
    }
}

/// Per-call behavior
#[derive(Default, Clone, Copy)]
struct CallOptions<'a> {
    cancel: Option<&'a CancellationToken>,
    /// 401 means bad credentials, not a dead session
    credentials: bool,
}

/// API gateway
pub struct ApiGateway<T: Transport = NetworkTransport> {
    transport: Arc<T>,
    session: Session,
    timeout: Duration,
}

impl<T: Transport> Clone for ApiGateway<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            session: self.session.clone(),
            timeout: self.timeout,
        }
    }
}

impl<T: Transport> std::fmt::Debug for ApiGateway<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiGateway")
            .field("session", &self.session)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ApiGateway<NetworkTransport> {
    /// Gateway over HTTP
    pub fn network(config: &ClientConfig, session: Session) -> ClientResult<Self> {
        Ok(Self::new(NetworkTransport::new(config)?, session, config))
    }
}

impl<T: Transport> ApiGateway<T> {
    pub fn new(transport: T, session: Session, config: &ClientConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            session,
            timeout: config.request_timeout,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    // ========== Core ==========

    async fn call<R: DeserializeOwned>(
        &self,
        method: Method,
        path: String,
        body: Option<RequestBody>,
        options: CallOptions<'_>,
    ) -> ClientResult<R> {
        let request = ApiRequest::new(method, path)
            .with_bearer(self.session.token())
            .with_body(body);
        let method = request.method.clone();
        let path = request.path.clone();

        tracing::debug!(method = %method, path = %path, "API request");

        let send = tokio::time::timeout(self.timeout, self.transport.send(request));
        let result = match options.cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::debug!(method = %method, path = %path, "API request cancelled");
                    return Err(ClientError::Cancelled);
                }
                result = send => result,
            },
            None => send.await,
        };

        let response = match result {
            Ok(response) => response,
            Err(_) => {
                tracing::warn!(method = %method, path = %path, timeout = ?self.timeout, "API request timed out");
                return Err(ClientError::Timeout(self.timeout));
            }
        };

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(method = %method, path = %path, error = %e, "API request failed");
                return Err(e);
            }
        };

        self.handle_response(&method, &path, response, options)
    }

    fn handle_response<R: DeserializeOwned>(
        &self,
        method: &Method,
        path: &str,
        response: RawResponse,
        options: CallOptions<'_>,
    ) -> ClientResult<R> {
        let status = response.status;

        if status == StatusCode::UNAUTHORIZED {
            if options.credentials {
                return Err(ClientError::InvalidCredentials(error_message(
                    status,
                    &response.body,
                )));
            }
            tracing::warn!(method = %method, path = %path, "Unauthorized response, ending session");
            self.session.invalidate(InvalidationReason::Unauthorized);
            return Err(ClientError::Unauthorized);
        }

        if !status.is_success() {
            let message = error_message(status, &response.body);
            tracing::warn!(
                method = %method,
                path = %path,
                status = status.as_u16(),
                message = %message,
                "API error response"
            );
            return Err(match status {
                StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                    ClientError::Validation(message)
                }
                StatusCode::FORBIDDEN => ClientError::Forbidden(message),
                StatusCode::NOT_FOUND => ClientError::NotFound(message),
                StatusCode::CONFLICT => ClientError::Conflict(message),
                _ => ClientError::Api {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        // Empty 2xx bodies decode as `null`, which fits `()` and `Option<_>`
        let body: &[u8] = if response.body.iter().all(u8::is_ascii_whitespace) {
            b"null"
        } else {
            &response.body
        };
        serde_json::from_slice(body).map_err(|e| {
            tracing::warn!(method = %method, path = %path, error = %e, "Unparsable API response");
            ClientError::InvalidResponse(format!("JSON parse error: {}", e))
        })
    }

    pub async fn get<R: DeserializeOwned>(&self, path: impl Into<String>) -> ClientResult<R> {
        self.call(Method::GET, path.into(), None, CallOptions::default())
            .await
    }

    pub async fn post<R: DeserializeOwned, B: Serialize>(
        &self,
        path: impl Into<String>,
        body: &B,
    ) -> ClientResult<R> {
        let body = RequestBody::Json(serde_json::to_value(body)?);
        self.call(Method::POST, path.into(), Some(body), CallOptions::default())
            .await
    }

    // ========== Businesses ==========

    /// `GET /businesses/{slug}`
    pub async fn business(&self, slug: &str) -> ClientResult<Business> {
        self.get(format!("/businesses/{}", urlencoding::encode(slug)))
            .await
    }

    /// `GET /businesses/search?q&lat&lon`
    pub async fn search_businesses(
        &self,
        query: &BusinessSearchQuery,
    ) -> ClientResult<Vec<BusinessSearchResult>> {
        let mut params = Vec::new();
        if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            params.push(format!("q={}", urlencoding::encode(q)));
        }
        if let (Some(lat), Some(lon)) = (query.lat, query.lon) {
            params.push(format!("lat={}", lat));
            params.push(format!("lon={}", lon));
        }
        let path = if params.is_empty() {
            "/businesses/search".to_string()
        } else {
            format!("/businesses/search?{}", params.join("&"))
        };
        self.get(path).await
    }

    // ========== Availability ==========

    /// `GET /services/{id}/availability?date`
    pub async fn availability(
        &self,
        service_id: &str,
        date: Option<NaiveDate>,
        cancel: Option<&CancellationToken>,
    ) -> ClientResult<Vec<AvailabilityDay>> {
        let mut path = format!("/services/{}/availability", urlencoding::encode(service_id));
        if let Some(date) = date {
            path.push_str(&format!("?date={}", date.format("%Y-%m-%d")));
        }
        self.call(
            Method::GET,
            path,
            None,
            CallOptions {
                cancel,
                ..Default::default()
            },
        )
        .await
    }

    // ========== Appointments ==========

    /// `POST /appointments/place`
    pub async fn place_appointment(
        &self,
        request: &PlaceAppointmentRequest,
    ) -> ClientResult<PlacedAppointment> {
        self.post("/appointments/place", request).await
    }

    /// `GET /appointments/my-appointments`
    pub async fn my_appointments(&self) -> ClientResult<Vec<Appointment>> {
        self.get("/appointments/my-appointments").await
    }

    // ========== Payments ==========

    /// `POST /payments`
    pub async fn create_payment(&self, request: &CreatePaymentRequest) -> ClientResult<PaymentIntent> {
        self.post("/payments", request).await
    }

    /// `POST /payments/{id}/confirm-mercadopago`
    pub async fn confirm_provider_payment(
        &self,
        payment_id: &str,
        request: &ProviderConfirmationRequest,
    ) -> ClientResult<ProviderConfirmationResponse> {
        self.post(
            format!(
                "/payments/{}/confirm-mercadopago",
                urlencoding::encode(payment_id)
            ),
            request,
        )
        .await
    }

    /// `GET /paymethods/business/{id}/public`
    pub async fn public_payment_methods(&self, business_id: &str) -> ClientResult<Vec<PaymentMethod>> {
        self.get(format!(
            "/paymethods/business/{}/public",
            urlencoding::encode(business_id)
        ))
        .await
    }

    // ========== Auth ==========

    /// `POST /auth/login` (form-urlencoded) and store the session
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<LoginResponse> {
        let form = LoginForm {
            username: email.to_string(),
            password: password.to_string(),
        };
        let body = RequestBody::Form(vec![
            ("username".to_string(), form.username),
            ("password".to_string(), form.password),
        ]);
        let response: LoginResponse = self
            .call(
                Method::POST,
                "/auth/login".to_string(),
                Some(body),
                CallOptions {
                    credentials: true,
                    ..Default::default()
                },
            )
            .await?;
        self.session.sign_in(&response, email)?;
        Ok(response)
    }

    /// `GET /auth/me`
    pub async fn me(&self) -> ClientResult<UserProfile> {
        self.get("/auth/me").await
    }

    /// Local sign-out; the API keeps no server-side session to end
    pub fn logout(&self) -> String {
        self.session.sign_out()
    }
}
