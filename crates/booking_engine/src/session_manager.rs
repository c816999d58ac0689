use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode, cookie::Jar};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::types::{BookingCode, EngineError};

/// Default base URL of the booking service
pub const DEFAULT_BASE_URL: &str = "https://001-iz.impfterminservice.de";

/// Manages the cookie-backed HTTP session against the booking service.
///
/// Every remote call goes through [`SessionManager::client`], so cookies
/// collected during the handshake are attached to all later requests.
pub struct SessionManager {
    client: RwLock<Client>,
    session_state: RwLock<SessionState>,
    config: SessionConfig,
}

#[derive(Debug, Clone)]
struct SessionState {
    /// When the handshake last succeeded
    last_refreshed: Option<DateTime<Utc>>,

    /// Whether the cookie jar is currently accepted by the service
    is_valid: bool,

    /// User agent sent with every request
    user_agent: String,

    /// Number of consecutive handshake failures
    failure_count: u32,
}

/// Settings for session handling
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL of the booking service
    pub base_url: String,

    /// Timeout applied to every request (default: 30 seconds)
    pub request_timeout: Duration,

    /// Handshake attempts before giving up (default: 3)
    pub max_handshake_attempts: u32,

    /// Pause between handshake attempts (default: 2 seconds)
    pub handshake_retry_delay: Duration,

    /// User agents to rotate through after failures
    pub user_agents: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            max_handshake_attempts: 3,
            handshake_retry_delay: Duration::from_secs(2),
            user_agents: vec![
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0".to_string(),
            ],
        }
    }
}

impl SessionConfig {
    /// Uses a different service base URL; a trailing slash is dropped
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

impl SessionManager {
    /// Create a new session manager with an empty cookie jar
    pub fn new(config: Option<SessionConfig>) -> Result<Self, EngineError> {
        let mut config = config.unwrap_or_default();
        if config.user_agents.is_empty() {
            config.user_agents = SessionConfig::default().user_agents;
        }
        config.base_url = config.base_url.trim_end_matches('/').to_string();

        let client = Self::build_client(&config)?;

        let initial_state = SessionState {
            last_refreshed: None,
            is_valid: false,
            user_agent: config.user_agents[0].clone(),
            failure_count: 0,
        };

        Ok(Self {
            client: RwLock::new(client),
            session_state: RwLock::new(initial_state),
            config,
        })
    }

    fn build_client(config: &SessionConfig) -> Result<Client, EngineError> {
        // A fresh jar per client; regenerating the session never reuses cookies
        let jar = Arc::new(Jar::default());

        Client::builder()
            .cookie_provider(jar)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| EngineError::Session(format!("Failed to create session client: {}", e)))
    }

    /// Performs the handshake, retrying a bounded number of times
    pub async fn establish_session(
        &self,
        code: &BookingCode,
        location: &str,
    ) -> Result<SessionStats, EngineError> {
        info!("Establishing session for location {}", location);

        self.invalidate().await?;

        let attempts = self.config.max_handshake_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.handshake(code, location).await {
                Ok(()) => {
                    info!("Session established on attempt {}/{}", attempt, attempts);
                    return Ok(self.stats().await);
                }
                Err(e) => {
                    let failures = {
                        let mut state = self.session_state.write().await;
                        state.failure_count += 1;
                        state.is_valid = false;
                        state.failure_count
                    };
                    warn!(
                        "Session handshake attempt {}/{} failed ({} consecutive failures): {}",
                        attempt, attempts, failures, e
                    );
                    last_error = e;

                    if attempt < attempts {
                        sleep(self.config.handshake_retry_delay).await;
                    }
                }
            }
        }

        Err(EngineError::Session(format!(
            "Could not establish a session after {} attempts: {}",
            attempts, last_error
        )))
    }

    /// Visits the booking page so the service hands out its session cookies
    async fn handshake(&self, code: &BookingCode, location: &str) -> Result<(), String> {
        // Rotate the user agent after failures
        let user_agent = {
            let state = self.session_state.read().await;
            let index = (state.failure_count as usize) % self.config.user_agents.len();
            self.config.user_agents[index].clone()
        };

        debug!("Using user agent: {}", user_agent);

        let url = format!(
            "{}/impftermine/suche/{}/{}",
            self.config.base_url,
            urlencoding::encode(code.as_str()),
            urlencoding::encode(location)
        );

        let response = self
            .client()
            .await
            .get(&url)
            .header("User-Agent", &user_agent)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            )
            .header("Accept-Language", "de-DE,de;q=0.9,en;q=0.5")
            .header("DNT", "1")
            .header("Upgrade-Insecure-Requests", "1")
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(format!("status {}: {}", status, error_text));
        }

        {
            let mut state = self.session_state.write().await;
            state.last_refreshed = Some(Utc::now());
            state.is_valid = true;
            state.user_agent = user_agent;
            state.failure_count = 0;
        }

        Ok(())
    }

    /// Whether a status code means the session is no longer accepted
    pub fn is_expiry_status(status: StatusCode) -> bool {
        matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
    }

    /// Classifies a response; marks the session stale when it signals expiry
    pub async fn is_expired(&self, response: &Response) -> bool {
        if !Self::is_expiry_status(response.status()) {
            return false;
        }

        let mut state = self.session_state.write().await;
        if state.is_valid {
            warn!(
                "Session expired (HTTP {}) for {}",
                response.status(),
                response.url().path()
            );
        }
        state.is_valid = false;
        true
    }

    /// Drops all cookies and marks the session stale
    pub async fn invalidate(&self) -> Result<(), EngineError> {
        let fresh = Self::build_client(&self.config)?;
        *self.client.write().await = fresh;

        let mut state = self.session_state.write().await;
        state.is_valid = false;
        state.last_refreshed = None;
        Ok(())
    }

    /// The HTTP client carrying the session cookies
    pub async fn client(&self) -> Client {
        self.client.read().await.clone()
    }

    /// User agent of the current session
    pub async fn user_agent(&self) -> String {
        self.session_state.read().await.user_agent.clone()
    }

    /// Base URL of the booking service
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Get current session statistics
    pub async fn stats(&self) -> SessionStats {
        let state = self.session_state.read().await;

        SessionStats {
            is_valid: state.is_valid,
            last_refreshed: state.last_refreshed,
            failure_count: state.failure_count,
            user_agent: state.user_agent.clone(),
        }
    }
}

/// Snapshot of the session state
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    /// Whether the cookie jar is currently accepted
    pub is_valid: bool,
    /// When the last handshake succeeded
    pub last_refreshed: Option<DateTime<Utc>>,
    /// Consecutive handshake failures
    pub failure_count: u32,
    /// User agent in use
    pub user_agent: String,
}
