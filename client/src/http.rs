//! `reqwest` implementation of [`RailwayService`]

use crate::config::ClientConfig;
use crate::error::ServiceError;
use crate::service::{
    CancelBody, CancelReceipt, ErrorBody, PayBody, PaymentReceipt, RailwayService,
    ReservationReceipt, ReserveBody,
};
use async_trait::async_trait;
use rail_tikit_core::{
    BookingId, CoachAvailability, CorrelationId, Money, PaymentMethod, PaymentStatus,
    ReservationRequest, TicketSummary, TrainId, VerificationRecord,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

const IDEMPOTENCY_KEY: &str = "Idempotency-Key";

/// Railway service over JSON/HTTP
#[derive(Clone)]
pub struct HttpRailwayService {
    client: Client,
    api_url: String,
    token: Option<String>,
}

impl HttpRailwayService {
    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Unreachable` if the HTTP client cannot be built
    /// (e.g. TLS backend initialisation failed).
    pub fn new(config: &ClientConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ServiceError::Unreachable(e.to_string()))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// Replace the bearer credential, e.g. after re-authentication
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, operation: &'static str, builder: RequestBuilder) -> Result<Response, ServiceError> {
        self.authorized(builder).send().await.map_err(|e| {
            if e.is_timeout() {
                ServiceError::Timeout { operation }
            } else {
                ServiceError::Unreachable(e.to_string())
            }
        })
    }

    async fn json<T: DeserializeOwned>(operation: &'static str, response: Response) -> Result<T, ServiceError> {
        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ServiceError::Timeout { operation }
            } else {
                ServiceError::Unreachable(e.to_string())
            }
        })?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ServiceError::InvalidResponse(format!("{operation}: {e}")))
    }
}

/// Reads an error body, keeping the raw text when it is not the expected JSON
async fn error_body(response: Response) -> ErrorBody {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str(&text).unwrap_or_else(|_| ErrorBody {
        reason: (!text.trim().is_empty()).then(|| text.trim().to_string()),
        ..ErrorBody::default()
    })
}

/// Maps a non-success status onto the error taxonomy
fn status_error(status: StatusCode, body: &ErrorBody, resource: impl FnOnce() -> String) -> ServiceError {
    let fallback = status.canonical_reason().unwrap_or("request failed");
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ServiceError::Unauthorized,
        StatusCode::NOT_FOUND => ServiceError::NotFound { resource: resource() },
        StatusCode::CONFLICT => ServiceError::Conflict {
            reason: body.reason_or(fallback),
        },
        StatusCode::PAYMENT_REQUIRED => ServiceError::PaymentDeclined {
            reason: body.reason_or(fallback),
        },
        other => ServiceError::Rejected {
            status: other.as_u16(),
            reason: body.reason_or(fallback),
        },
    }
}

#[async_trait]
impl RailwayService for HttpRailwayService {
    async fn reserve(
        &self,
        correlation_id: CorrelationId,
        request: &ReservationRequest,
    ) -> Result<ReservationReceipt, ServiceError> {
        let body = ReserveBody::new(correlation_id, request);
        let response = self
            .send(
                "reserve",
                self.client
                    .post(self.url("/reservations"))
                    .header(IDEMPOTENCY_KEY, correlation_id.to_string())
                    .json(&body),
            )
            .await?;

        let status = response.status();
        if status.is_success() {
            return Self::json("reserve", response).await;
        }
        let body = error_body(response).await;
        Err(status_error(status, &body, || format!("train {}", request.train_id())))
    }

    async fn find_reservation(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Option<ReservationReceipt>, ServiceError> {
        let response = self
            .send(
                "find_reservation",
                self.client
                    .get(self.url(&format!("/reservations/by-correlation/{correlation_id}"))),
            )
            .await?;

        match response.status() {
            status if status.is_success() => Self::json("find_reservation", response).await.map(Some),
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                let body = error_body(response).await;
                Err(status_error(status, &body, || format!("reservation {correlation_id}")))
            }
        }
    }

    async fn pay(
        &self,
        booking_id: BookingId,
        amount: Money,
        method: &PaymentMethod,
    ) -> Result<PaymentReceipt, ServiceError> {
        let body = PayBody {
            booking_id,
            amount,
            method: method.clone(),
        };
        let response = self
            .send(
                "pay",
                self.client
                    .post(self.url("/payments"))
                    .header(IDEMPOTENCY_KEY, booking_id.to_string())
                    .json(&body),
            )
            .await?;

        let status = response.status();
        if status.is_success() {
            return Self::json("pay", response).await;
        }

        let body = error_body(response).await;
        // A replay of an already settled payment is success, not a conflict.
        if status == StatusCode::CONFLICT && body.payment_status == Some(PaymentStatus::Settled) {
            tracing::debug!(%booking_id, "Payment replay answered with recorded settlement");
            return Ok(PaymentReceipt::settled());
        }
        Err(status_error(status, &body, || format!("booking {booking_id}")))
    }

    async fn cancel(&self, booking_id: BookingId) -> Result<(), ServiceError> {
        let response = self
            .send(
                "cancel",
                self.client
                    .post(self.url("/cancellations"))
                    .json(&CancelBody { booking_id }),
            )
            .await?;

        let status = response.status();
        if status.is_success() {
            let receipt: CancelReceipt = Self::json("cancel", response).await?;
            return if receipt.released {
                Ok(())
            } else {
                Err(ServiceError::Conflict {
                    reason: format!("booking {booking_id} was not released"),
                })
            };
        }
        let body = error_body(response).await;
        Err(status_error(status, &body, || format!("booking {booking_id}")))
    }

    async fn availability(&self, train_id: TrainId) -> Result<Vec<CoachAvailability>, ServiceError> {
        let response = self
            .send("availability", self.client.get(self.url(&format!("/availability/{train_id}"))))
            .await?;

        let status = response.status();
        if status.is_success() {
            return Self::json("availability", response).await;
        }
        let body = error_body(response).await;
        Err(status_error(status, &body, || format!("train {train_id}")))
    }

    async fn verify(&self, booking_id: BookingId) -> Result<VerificationRecord, ServiceError> {
        let response = self
            .send("verify", self.client.get(self.url(&format!("/verify/{booking_id}"))))
            .await?;

        let status = response.status();
        if status.is_success() {
            return Self::json("verify", response).await;
        }
        let body = error_body(response).await;
        Err(status_error(status, &body, || format!("booking {booking_id}")))
    }

    async fn my_tickets(&self) -> Result<Vec<TicketSummary>, ServiceError> {
        let response = self
            .send("my_tickets", self.client.get(self.url("/my-tickets")))
            .await?;

        let status = response.status();
        if status.is_success() {
            return Self::json("my_tickets", response).await;
        }
        let body = error_body(response).await;
        Err(status_error(status, &body, || "ticket history".to_string()))
    }
}
