use std::sync::Arc;

use tracing::info;

use crate::poller::{PollerConfig, SearchOutcome, SlotPoller, StopSignal};
use crate::service_client::{BookingApi, ServiceClient};
use crate::session_manager::{SessionConfig, SessionManager};
use crate::types::*;
use crate::verification::{PendingVerification, VerificationFlow};

/// Settings for a [`BookingEngine`]
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Session handling
    pub session: SessionConfig,
    /// Probe/book loop
    pub poller: PollerConfig,
}

/// Everything a search needs
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Booking code the search runs under
    pub code: BookingCode,
    /// Locations probed jointly
    pub locations: LocationSet,
    /// Person being booked
    pub contact: ContactProfile,
}

/// A started code generation: the synthetic code the session was seeded
/// with and the verification waiting for the SMS code
pub struct CodeGeneration {
    /// Code used only for the session handshake
    pub seed_code: BookingCode,
    /// Verification waiting for confirmation
    pub pending: PendingVerification,
}

/// Entry point for the "search" and "code" commands
pub struct BookingEngine {
    api: Arc<dyn BookingApi>,
    poller: SlotPoller,
    verification: VerificationFlow,
}

impl BookingEngine {
    /// Create an engine talking to the configured booking service
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let session = Arc::new(SessionManager::new(Some(config.session))?);
        let api: Arc<dyn BookingApi> = Arc::new(ServiceClient::new(session));
        Ok(Self::with_api(api, config.poller))
    }

    /// Create an engine on top of any [`BookingApi`] implementation
    pub fn with_api(api: Arc<dyn BookingApi>, poller_config: PollerConfig) -> Self {
        Self {
            poller: SlotPoller::new(Arc::clone(&api), Some(poller_config)),
            verification: VerificationFlow::new(Arc::clone(&api)),
            api,
        }
    }

    /// Establishes a session with the user's code and polls until an
    /// appointment is booked or the stop signal fires
    pub async fn search(
        &self,
        request: &SearchRequest,
        stop: &mut StopSignal,
    ) -> Result<SearchOutcome, EngineError> {
        let contact = request.contact.clone().normalized()?;

        info!(
            "Starting search for {} with code {}",
            contact.display_name(),
            request.code
        );

        tokio::select! {
            biased;
            _ = stop.stopped() => {
                self.api.release_session().await;
                return Ok(SearchOutcome::Cancelled { report: Default::default() });
            }
            established = self.api.establish_session(&request.code, request.locations.primary()) => {
                established?;
            }
        }

        self.poller
            .search(&request.code, &request.locations, &contact, stop)
            .await
    }

    /// Seeds a session with a synthetic code and requests a verification code
    pub async fn start_code_generation(
        &self,
        request: &CodeRequest,
    ) -> Result<CodeGeneration, EngineError> {
        let seed_code = BookingCode::generate();
        info!(
            "Starting code generation for location {} ({}) with seed code {}",
            request.location, request.category, seed_code
        );

        self.api
            .establish_session(&seed_code, &request.location)
            .await?;
        let pending = self.verification.request_code(request).await?;

        Ok(CodeGeneration { seed_code, pending })
    }

    /// Poller settings in use
    pub fn poller_config(&self) -> &PollerConfig {
        self.poller.config()
    }
}
