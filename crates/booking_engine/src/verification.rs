use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::service_client::BookingApi;
use crate::types::*;

/// Where a pending verification stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationState {
    /// Code sent, waiting for confirmation
    Requested,
    /// Confirmed by the remote service
    Confirmed,
    /// Every attempt was used without success
    Failed,
}

/// Result of a single confirmation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// The code was accepted
    Confirmed,
    /// The code was wrong
    Rejected {
        /// Attempts left for this token
        remaining_attempts: u32,
    },
}

/// Requests verification codes bound to a contact and location
pub struct VerificationFlow {
    api: Arc<dyn BookingApi>,
}

impl VerificationFlow {
    /// Create a flow on top of a booking API
    pub fn new(api: Arc<dyn BookingApi>) -> Self {
        Self { api }
    }

    /// Asks the service to send a verification code.
    ///
    /// The session must already be established. Remote failures are not
    /// retried.
    pub async fn request_code(
        &self,
        request: &CodeRequest,
    ) -> Result<PendingVerification, EngineError> {
        info!(
            "Requesting verification code for {} at location {}",
            request.phone, request.location
        );

        let token = self.api.request_code(request).await.map_err(|e| {
            warn!("Verification code request failed: {}", e);
            EngineError::Request(e.to_string())
        })?;

        info!("Verification code requested; waiting for confirmation");

        Ok(PendingVerification {
            api: Arc::clone(&self.api),
            token,
            state: VerificationState::Requested,
            attempts_used: 0,
        })
    }
}

/// A requested verification code awaiting confirmation
pub struct PendingVerification {
    api: Arc<dyn BookingApi>,
    token: VerificationToken,
    state: VerificationState,
    attempts_used: u32,
}

impl PendingVerification {
    /// Submits the code the user received.
    ///
    /// Malformed input is rejected before an attempt is counted. Once the
    /// token is confirmed or every attempt is used, further calls fail
    /// without touching the network.
    pub async fn confirm(&mut self, raw_pin: &str) -> Result<ConfirmOutcome, EngineError> {
        match self.state {
            VerificationState::Confirmed => {
                return Err(ConfirmationError::AlreadyConfirmed.into());
            }
            VerificationState::Failed => {
                return Err(ConfirmationError::AttemptsExhausted.into());
            }
            VerificationState::Requested => {}
        }

        if self.attempts_used >= MAX_CONFIRMATION_ATTEMPTS {
            self.state = VerificationState::Failed;
            return Err(ConfirmationError::AttemptsExhausted.into());
        }

        let pin = SmsPin::parse(raw_pin)?;

        self.attempts_used += 1;
        debug!(
            "Confirmation attempt {}/{}",
            self.attempts_used, MAX_CONFIRMATION_ATTEMPTS
        );

        let verdict = self.api.confirm_code(&self.token, &pin).await;
        let remaining_attempts = self.remaining_attempts();

        match verdict {
            Ok(true) => {
                info!("Verification code confirmed");
                self.state = VerificationState::Confirmed;
                Ok(ConfirmOutcome::Confirmed)
            }
            Ok(false) => {
                if remaining_attempts == 0 {
                    warn!("Verification code rejected; no attempts left");
                    self.state = VerificationState::Failed;
                } else {
                    warn!(
                        "Verification code rejected; {} attempts left",
                        remaining_attempts
                    );
                }
                Ok(ConfirmOutcome::Rejected { remaining_attempts })
            }
            Err(e) => {
                warn!("Verification code confirmation failed: {}", e);
                if remaining_attempts == 0 {
                    self.state = VerificationState::Failed;
                }
                Err(ConfirmationError::Transport(e.to_string()).into())
            }
        }
    }

    /// Current state
    pub fn state(&self) -> VerificationState {
        self.state
    }

    /// Attempts consumed so far
    pub fn attempts_used(&self) -> u32 {
        self.attempts_used
    }

    /// Attempts left for this token
    pub fn remaining_attempts(&self) -> u32 {
        MAX_CONFIRMATION_ATTEMPTS.saturating_sub(self.attempts_used)
    }

    /// The token returned by the code request
    pub fn token(&self) -> &VerificationToken {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_manager::SessionStats;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Accepts a single PIN; counts confirmation calls
    struct MockVerificationApi {
        accepted_pin: &'static str,
        confirm_calls: AtomicU32,
        fail_request: bool,
        transport_failures: Mutex<u32>,
    }

    impl MockVerificationApi {
        fn new(accepted_pin: &'static str) -> Self {
            Self {
                accepted_pin,
                confirm_calls: AtomicU32::new(0),
                fail_request: false,
                transport_failures: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.confirm_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BookingApi for MockVerificationApi {
        async fn establish_session(
            &self,
            _code: &BookingCode,
            _location: &str,
        ) -> Result<SessionStats, EngineError> {
            unreachable!("verification does not establish sessions")
        }

        async fn request_code(
            &self,
            _request: &CodeRequest,
        ) -> Result<VerificationToken, ApiError> {
            if self.fail_request {
                return Err(ApiError::Rejected {
                    status: 400,
                    message: "invalid phone".to_string(),
                });
            }
            Ok(VerificationToken::new("tok-1"))
        }

        async fn confirm_code(
            &self,
            _token: &VerificationToken,
            pin: &SmsPin,
        ) -> Result<bool, ApiError> {
            self.confirm_calls.fetch_add(1, Ordering::SeqCst);

            let mut failures = self.transport_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(ApiError::Network("connection reset".to_string()));
            }
            Ok(pin.as_str() == self.accepted_pin)
        }

        async fn probe_location(
            &self,
            _code: &BookingCode,
            _location: &str,
        ) -> Result<Vec<SlotOffer>, ApiError> {
            unreachable!()
        }

        async fn book(
            &self,
            _code: &BookingCode,
            _offer: &SlotOffer,
            _contact: &ContactProfile,
        ) -> Result<BookedAppointment, ApiError> {
            unreachable!()
        }

        async fn release_session(&self) {}
    }

    fn request() -> CodeRequest {
        CodeRequest::new("a@b.de", "0151234567", "68163", CategorySelector::L921).unwrap()
    }

    async fn pending(api: Arc<MockVerificationApi>) -> PendingVerification {
        VerificationFlow::new(api).request_code(&request()).await.unwrap()
    }

    #[tokio::test]
    async fn test_confirm_with_correct_pin() {
        let api = Arc::new(MockVerificationApi::new("123456"));
        let mut pending = pending(api.clone()).await;

        assert_eq!(pending.state(), VerificationState::Requested);
        assert_eq!(pending.token().as_str(), "tok-1");

        let outcome = pending.confirm("123-456").await.unwrap();
        assert_eq!(outcome, ConfirmOutcome::Confirmed);
        assert_eq!(pending.state(), VerificationState::Confirmed);

        let again = pending.confirm("123-456").await;
        assert!(matches!(
            again,
            Err(EngineError::Confirmation(ConfirmationError::AlreadyConfirmed))
        ));
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn test_fourth_attempt_is_rejected_locally() {
        let api = Arc::new(MockVerificationApi::new("123456"));
        let mut pending = pending(api.clone()).await;

        for remaining in [2, 1, 0] {
            let outcome = pending.confirm("000-000").await.unwrap();
            assert_eq!(
                outcome,
                ConfirmOutcome::Rejected {
                    remaining_attempts: remaining
                }
            );
        }
        assert_eq!(pending.state(), VerificationState::Failed);

        let fourth = pending.confirm("123-456").await;
        assert!(matches!(
            fourth,
            Err(EngineError::Confirmation(ConfirmationError::AttemptsExhausted))
        ));
        assert_eq!(api.calls(), 3);
        assert_eq!(pending.attempts_used(), 3);
    }

    #[tokio::test]
    async fn test_malformed_pin_does_not_consume_attempt() {
        let api = Arc::new(MockVerificationApi::new("123456"));
        let mut pending = pending(api.clone()).await;

        let result = pending.confirm("12a-456").await;
        assert!(matches!(result, Err(EngineError::Configuration(_))));
        assert_eq!(pending.remaining_attempts(), 3);
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_consumes_attempt() {
        let api = Arc::new(MockVerificationApi::new("123456"));
        *api.transport_failures.lock().unwrap() = 1;
        let mut pending = pending(api.clone()).await;

        let result = pending.confirm("123-456").await;
        assert!(matches!(
            result,
            Err(EngineError::Confirmation(ConfirmationError::Transport(_)))
        ));
        assert_eq!(pending.remaining_attempts(), 2);
        assert_eq!(pending.state(), VerificationState::Requested);

        let outcome = pending.confirm("123-456").await.unwrap();
        assert_eq!(outcome, ConfirmOutcome::Confirmed);
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test]
    async fn test_request_failure_is_request_error() {
        let api = Arc::new(MockVerificationApi {
            fail_request: true,
            ..MockVerificationApi::new("123456")
        });

        let result = VerificationFlow::new(api).request_code(&request()).await;
        assert!(matches!(result, Err(EngineError::Request(_))));
    }
}
