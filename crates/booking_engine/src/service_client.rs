use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::session_manager::{SessionManager, SessionStats};
use crate::types::*;

/// Remote operations the engine needs from the booking service.
///
/// [`ServiceClient`] is the HTTP implementation; the poller and the
/// verification flow only see this trait.
#[async_trait]
pub trait BookingApi: Send + Sync {
    /// Obtain (or regenerate) the session cookies
    async fn establish_session(
        &self,
        code: &BookingCode,
        location: &str,
    ) -> Result<SessionStats, EngineError>;

    /// Ask the service to send a verification SMS
    async fn request_code(&self, request: &CodeRequest) -> Result<VerificationToken, ApiError>;

    /// Submit the SMS code; `Ok(false)` means the code was wrong
    async fn confirm_code(
        &self,
        token: &VerificationToken,
        pin: &SmsPin,
    ) -> Result<bool, ApiError>;

    /// Offers currently available at one location
    async fn probe_location(
        &self,
        code: &BookingCode,
        location: &str,
    ) -> Result<Vec<SlotOffer>, ApiError>;

    /// Book one offer for the contact
    async fn book(
        &self,
        code: &BookingCode,
        offer: &SlotOffer,
        contact: &ContactProfile,
    ) -> Result<BookedAppointment, ApiError>;

    /// Discard the session; called on cancellation
    async fn release_session(&self);
}

/// HTTP client for the booking service
pub struct ServiceClient {
    session: Arc<SessionManager>,
}

/// Response of the availability endpoint
#[derive(Debug, Deserialize)]
struct AvailabilityResponse {
    #[serde(rename = "termineVorhanden")]
    slots_available: bool,

    #[serde(rename = "termine", default)]
    offers: Vec<Vec<RemoteAppointment>>,

    #[serde(rename = "gesuchteLeistungsmerkmale", default)]
    qualifications: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RemoteAppointment {
    #[serde(rename = "slotId")]
    slot_id: String,

    /// Milliseconds since the epoch
    #[serde(rename = "begin")]
    begin: i64,

    #[serde(rename = "bsnr", default)]
    site_id: String,
}

#[derive(Debug, Serialize)]
struct CodeRequestPayload<'a> {
    email: &'a str,
    #[serde(rename = "leistungsmerkmal")]
    category: &'a str,
    phone: &'a str,
    plz: &'a str,
}

#[derive(Debug, Deserialize)]
struct CodeRequestResponse {
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct ConfirmPayload<'a> {
    token: &'a str,
    #[serde(rename = "smspin")]
    pin: &'a str,
}

#[derive(Debug, Serialize)]
struct BookingPayload<'a> {
    plz: &'a str,
    slots: Vec<&'a str>,
    #[serde(rename = "qualifikationen")]
    qualifications: &'a [String],
    contact: &'a ContactProfile,
}

impl ServiceClient {
    /// Create a client on top of a session manager
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    /// The underlying session manager
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.session.base_url(), path)
    }

    /// Adds the headers every REST call carries
    async fn prepare(&self, builder: RequestBuilder, location: &str) -> RequestBuilder {
        builder
            .header("User-Agent", self.session.user_agent().await)
            .header("Accept", "application/json, text/plain, */*")
            .header(
                "Referer",
                format!(
                    "{}/impftermine/service?plz={}",
                    self.session.base_url(),
                    urlencoding::encode(location)
                ),
            )
    }

    /// Turns a non-success response into an [`ApiError`]
    async fn classify_failure(&self, response: Response) -> ApiError {
        let status = response.status();

        if self.session.is_expired(&response).await {
            return ApiError::SessionExpired(status.as_u16());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());

        match status {
            StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited,
            StatusCode::CONFLICT => ApiError::Conflict(body),
            _ => ApiError::Rejected {
                status: status.as_u16(),
                message: body,
            },
        }
    }

    fn into_offers(location: &str, response: AvailabilityResponse) -> Result<Vec<SlotOffer>, ApiError> {
        if !response.slots_available {
            return Ok(Vec::new());
        }

        let mut offers = Vec::new();
        for remote in response.offers {
            if remote.is_empty() {
                continue;
            }

            let mut appointments = Vec::with_capacity(remote.len());
            for appointment in remote {
                let begin = DateTime::<Utc>::from_timestamp_millis(appointment.begin)
                    .ok_or_else(|| {
                        ApiError::UnexpectedResponse(format!(
                            "invalid slot timestamp {}",
                            appointment.begin
                        ))
                    })?;
                appointments.push(Appointment {
                    slot_id: appointment.slot_id,
                    begin,
                    site_id: appointment.site_id,
                });
            }

            offers.push(SlotOffer {
                location: location.to_string(),
                appointments,
                qualifications: response.qualifications.clone(),
            });
        }

        Ok(offers)
    }
}

#[async_trait]
impl BookingApi for ServiceClient {
    async fn establish_session(
        &self,
        code: &BookingCode,
        location: &str,
    ) -> Result<SessionStats, EngineError> {
        self.session.establish_session(code, location).await
    }

    async fn request_code(&self, request: &CodeRequest) -> Result<VerificationToken, ApiError> {
        debug!(
            "Requesting verification code for location {} ({})",
            request.location, request.category
        );

        let payload = CodeRequestPayload {
            email: &request.email,
            category: request.category.as_str(),
            phone: &request.phone,
            plz: &request.location,
        };

        let client = self.session.client().await;
        let response = self
            .prepare(
                client.post(self.url("/rest/smspin/anforderung")),
                &request.location,
            )
            .await
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.classify_failure(response).await);
        }

        let body: CodeRequestResponse = response.json().await.map_err(|e| {
            ApiError::UnexpectedResponse(format!("Failed to parse code request response: {}", e))
        })?;

        body.token
            .filter(|token| !token.is_empty())
            .map(VerificationToken::new)
            .ok_or_else(|| ApiError::UnexpectedResponse("response carried no token".to_string()))
    }

    async fn confirm_code(
        &self,
        token: &VerificationToken,
        pin: &SmsPin,
    ) -> Result<bool, ApiError> {
        let payload = ConfirmPayload {
            token: token.as_str(),
            pin: pin.as_str(),
        };

        let client = self.session.client().await;
        let response = client
            .put(self.url("/rest/smspin/verifikation"))
            .header("User-Agent", self.session.user_agent().await)
            .header("Accept", "application/json, text/plain, */*")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        if status == StatusCode::BAD_REQUEST {
            debug!("Verification code rejected by service");
            return Ok(false);
        }

        Err(self.classify_failure(response).await)
    }

    async fn probe_location(
        &self,
        code: &BookingCode,
        location: &str,
    ) -> Result<Vec<SlotOffer>, ApiError> {
        debug!("Probing availability for location {}", location);

        let client = self.session.client().await;
        let response = self
            .prepare(
                client.get(self.url("/rest/suche/impfterminsuche")),
                location,
            )
            .await
            .query(&[("plz", location)])
            .basic_auth("", Some(code.as_str()))
            .send()
            .await?;

        debug!("Availability response status: {}", response.status());

        if !response.status().is_success() {
            let error = self.classify_failure(response).await;
            warn!("Availability request for {} failed: {}", location, error);
            return Err(error);
        }

        let body: AvailabilityResponse = response.json().await.map_err(|e| {
            ApiError::UnexpectedResponse(format!("Failed to parse availability response: {}", e))
        })?;

        Self::into_offers(location, body)
    }

    async fn book(
        &self,
        code: &BookingCode,
        offer: &SlotOffer,
        contact: &ContactProfile,
    ) -> Result<BookedAppointment, ApiError> {
        let payload = BookingPayload {
            plz: &offer.location,
            slots: offer.slot_ids(),
            qualifications: &offer.qualifications,
            contact,
        };

        let client = self.session.client().await;
        let response = self
            .prepare(client.post(self.url("/rest/buchung")), &offer.location)
            .await
            .basic_auth("", Some(code.as_str()))
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.classify_failure(response).await);
        }

        Ok(BookedAppointment {
            location: offer.location.clone(),
            appointments: offer.appointments.clone(),
            booked_at: Utc::now(),
        })
    }

    async fn release_session(&self) {
        if let Err(e) = self.session.invalidate().await {
            warn!("Failed to release session: {}", e);
        }
    }
}
