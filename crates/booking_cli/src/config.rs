use booking_engine::{EngineConfig, PollerConfig, RunSettings, SessionConfig, SlotSelection};

/// Environment variable overriding the booking service base URL
pub const BASE_URL_ENV: &str = "SLOT_BOOKER_BASE_URL";

/// Builds the engine configuration for a run
pub fn engine_config(
    base_url: Option<String>,
    settings: &RunSettings,
    selection: SlotSelection,
) -> EngineConfig {
    let mut session = SessionConfig::default();
    if let Some(base_url) = base_url {
        log::info!("🌐 Using booking service at {}", base_url);
        session = session.with_base_url(base_url);
    }

    EngineConfig {
        session,
        poller: PollerConfig {
            wait_interval: settings.wait_interval(),
            selection,
            ..PollerConfig::default()
        },
    }
}

/// Like [`engine_config`], reading the base URL from the environment
pub fn engine_config_from_env(settings: &RunSettings, selection: SlotSelection) -> EngineConfig {
    let base_url = std::env::var(BASE_URL_ENV)
        .ok()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty());

    engine_config(base_url, settings, selection)
}
