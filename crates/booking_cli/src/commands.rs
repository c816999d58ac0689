use std::fmt;

use anyhow::{Context, bail};
use booking_engine::{
    BookedAppointment, BookingEngine, Command, ConfirmOutcome, ConfirmationError, EngineConfig,
    EngineError, RunSettings, SearchOutcome, StopSignal,
};
use contact_store::{ContactData, ContactDataError, ContactField, ContactStore};
use log::{info, warn};

use crate::prompt::{Prompter, ask_category, collect_missing};

/// Exit status for configuration errors
pub const CONFIGURATION_EXIT_CODE: u8 = 2;

/// Exit status for every other failure
pub const FAILURE_EXIT_CODE: u8 = 1;

/// What a run needs besides the user's answers
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Contact-data file
    pub store: ContactStore,
    /// Engine settings; the wait interval is taken from the run settings
    pub engine_config: EngineConfig,
}

impl RunContext {
    /// Create a context
    pub fn new(store: ContactStore, engine_config: EngineConfig) -> Self {
        Self {
            store,
            engine_config,
        }
    }
}

/// How a successful run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Contact data was saved; nothing else ran
    Configured,
    /// An appointment was booked
    Booked(BookedAppointment),
    /// The search was stopped
    Cancelled,
    /// The SMS code was confirmed; the booking code arrives by email
    CodeConfirmed {
        /// Address the booking code is sent to
        email: String,
    },
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Configured => f.write_str("contact data saved"),
            RunOutcome::Booked(appointment) => write!(f, "booked {}", appointment),
            RunOutcome::Cancelled => f.write_str("search stopped"),
            RunOutcome::CodeConfirmed { email } => {
                write!(f, "code confirmed, the booking code is sent to {}", email)
            }
        }
    }
}

/// Loads the contact data and, unless read-only, asks for what is missing
/// and saves the result
pub fn prepare_contact(
    store: &ContactStore,
    settings: &RunSettings,
    command: Command,
    prompter: &mut dyn Prompter,
) -> anyhow::Result<ContactData> {
    if settings.read_only {
        return store
            .load()
            .with_context(|| format!("Reading {}", store.path().display()));
    }

    let mut data = store.load_or_default()?;

    let mut changed = false;
    if data.is_legacy() {
        let codes = data.location_codes().join(",");
        data.set(ContactField::Locations, &codes)?;
        changed = true;
    }
    changed |= collect_missing(prompter, &mut data, command)?;

    if changed || settings.configure_only {
        store.save(&data)?;
    }

    Ok(data)
}

/// Runs one command with the given settings
pub async fn execute(
    command: Command,
    settings: RunSettings,
    ctx: &RunContext,
    prompter: &mut dyn Prompter,
    stop: &mut StopSignal,
) -> anyhow::Result<RunOutcome> {
    settings.validate()?;

    let data = prepare_contact(&ctx.store, &settings, command, prompter)?;

    if settings.configure_only {
        info!(
            "✅ Contact data for '{}' saved to {}",
            command,
            ctx.store.path().display()
        );
        return Ok(RunOutcome::Configured);
    }

    let mut config = ctx.engine_config.clone();
    config.poller.wait_interval = settings.wait_interval();
    let engine = BookingEngine::new(config)?;

    match command {
        Command::Search => search(&engine, &data, stop).await,
        Command::Code => generate_code(&engine, &data, prompter).await,
    }
}

async fn search(
    engine: &BookingEngine,
    data: &ContactData,
    stop: &mut StopSignal,
) -> anyhow::Result<RunOutcome> {
    let request = data.to_search_request()?;

    info!(
        "🔍 Searching at {} every {:?} while no appointment is available",
        request.locations,
        engine.poller_config().wait_interval
    );

    match engine.search(&request, stop).await? {
        SearchOutcome::Booked {
            appointment,
            report,
        } => {
            info!("🎉 Appointment booked: {}", appointment);
            info!(
                "📊 {} probe(s), {} booking attempt(s), {} session renewal(s)",
                report.probes, report.bookings_attempted, report.session_renewals
            );
            Ok(RunOutcome::Booked(appointment))
        }
        SearchOutcome::Cancelled { report } => {
            warn!("🛑 Search stopped after {} probe(s)", report.probes);
            Ok(RunOutcome::Cancelled)
        }
    }
}

async fn generate_code(
    engine: &BookingEngine,
    data: &ContactData,
    prompter: &mut dyn Prompter,
) -> anyhow::Result<RunOutcome> {
    let category = ask_category(prompter)?;
    let request = data.to_code_request(category)?;

    let mut generation = engine.start_code_generation(&request).await?;
    prompter.say(&format!("📱 An SMS code was sent to {}", request.phone));

    loop {
        let answer = prompter.ask("SMS code (e.g. 123-456)")?;
        let pending = &mut generation.pending;

        match pending.confirm(&answer).await {
            Ok(ConfirmOutcome::Confirmed) => {
                info!(
                    "✅ Verification confirmed; the booking code will be sent to {}",
                    request.email
                );
                return Ok(RunOutcome::CodeConfirmed {
                    email: request.email.clone(),
                });
            }
            Ok(ConfirmOutcome::Rejected { remaining_attempts }) if remaining_attempts > 0 => {
                prompter.say(&format!(
                    "⚠️ Wrong code, {} attempt(s) left",
                    remaining_attempts
                ));
            }
            Ok(ConfirmOutcome::Rejected { .. }) => {
                bail!(EngineError::from(ConfirmationError::AttemptsExhausted));
            }
            Err(EngineError::Configuration(reason)) => {
                prompter.say(&format!("⚠️ {}", reason));
            }
            Err(EngineError::Confirmation(ConfirmationError::Transport(reason)))
                if pending.remaining_attempts() > 0 =>
            {
                prompter.say(&format!(
                    "⚠️ Could not reach the service ({}); {} attempt(s) left",
                    reason,
                    pending.remaining_attempts()
                ));
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Exit status for an error returned by a run
pub fn exit_code(error: &anyhow::Error) -> u8 {
    if let Some(engine_error) = error.downcast_ref::<EngineError>() {
        if matches!(engine_error, EngineError::Configuration(_)) {
            return CONFIGURATION_EXIT_CODE;
        }
    }

    if let Some(contact_error) = error.downcast_ref::<ContactDataError>() {
        if matches!(
            contact_error,
            ContactDataError::Missing(_)
                | ContactDataError::Invalid(_)
                | ContactDataError::Malformed { .. }
        ) {
            return CONFIGURATION_EXIT_CODE;
        }
    }

    FAILURE_EXIT_CODE
}
