use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::service_client::BookingApi;
use crate::types::*;

/// How one offer is picked when a probe returns several
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SlotSelection {
    /// First offer of the first location, in location order
    #[default]
    FirstOffered,
    /// Offer whose first appointment starts earliest
    Earliest,
}

impl FromStr for SlotSelection {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first" | "first-offered" => Ok(SlotSelection::FirstOffered),
            "earliest" => Ok(SlotSelection::Earliest),
            other => Err(EngineError::Configuration(format!(
                "Unknown slot selection {:?}; expected 'first' or 'earliest'",
                other
            ))),
        }
    }
}

impl fmt::Display for SlotSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotSelection::FirstOffered => f.write_str("first"),
            SlotSelection::Earliest => f.write_str("earliest"),
        }
    }
}

/// Settings for the slot poller
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Pause after an empty or failed probe (default: 60 seconds)
    pub wait_interval: Duration,

    /// Offer selection when several are available (default: first offered)
    pub selection: SlotSelection,

    /// Probe iterations before giving up (default: unbounded)
    pub max_iterations: Option<u64>,

    /// Consecutive session renewals tolerated before aborting (default: 3)
    pub max_session_renewals: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            wait_interval: Duration::from_secs(60),
            selection: SlotSelection::FirstOffered,
            max_iterations: None,
            max_session_renewals: 3,
        }
    }
}

/// Counters collected over one search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchReport {
    /// Probe iterations executed
    pub probes: u64,
    /// Booking calls made
    pub bookings_attempted: u64,
    /// Sessions re-established after expiry
    pub session_renewals: u64,
    /// Probe or booking failures absorbed by the loop
    pub transient_failures: u64,
}

/// How a search ended, when it did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// An offer was booked
    Booked {
        /// The booked offer
        appointment: BookedAppointment,
        /// Loop counters
        report: SearchReport,
    },
    /// The stop signal fired
    Cancelled {
        /// Loop counters
        report: SearchReport,
    },
}

impl SearchOutcome {
    /// Counters of the finished search
    pub fn report(&self) -> &SearchReport {
        match self {
            SearchOutcome::Booked { report, .. } | SearchOutcome::Cancelled { report } => report,
        }
    }
}

/// Receiving side of a cancellation request
pub struct StopSignal {
    receiver: watch::Receiver<bool>,
}

/// Sending side of a cancellation request
pub struct StopHandle {
    sender: watch::Sender<bool>,
}

/// Creates a connected stop handle and signal
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (sender, receiver) = watch::channel(false);
    (StopHandle { sender }, StopSignal { receiver })
}

impl StopSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        stop_channel().1
    }

    /// Whether a stop was requested
    pub fn is_stopped(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once a stop is requested; stays pending if the handle is gone
    pub async fn stopped(&mut self) {
        let fired = self.receiver.wait_for(|stop| *stop).await.is_ok();
        if !fired {
            std::future::pending::<()>().await;
        }
    }
}

impl StopHandle {
    /// Requests the search to stop
    pub fn stop(&self) {
        self.sender.send_replace(true);
    }

    /// Whether [`StopHandle::stop`] was already called
    pub fn is_stopped(&self) -> bool {
        *self.sender.borrow()
    }
}

/// Outcome of probing every location once
enum Probe {
    Offers(Vec<SlotOffer>),
    Expired,
    Failed(EngineError),
}

/// Polls the location set for offers and books the first one it can
pub struct SlotPoller {
    api: Arc<dyn BookingApi>,
    config: PollerConfig,
}

impl SlotPoller {
    /// Create a poller
    pub fn new(api: Arc<dyn BookingApi>, config: Option<PollerConfig>) -> Self {
        Self {
            api,
            config: config.unwrap_or_default(),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Runs the probe/book loop until an offer is booked, the stop signal
    /// fires, or a fatal error occurs.
    ///
    /// The session must already be established. Expired sessions are renewed
    /// and probed again without waiting; empty or failed probes wait
    /// `wait_interval` before the next one, as do failed bookings unless the
    /// offer was taken. Expiries count as consecutive until a probe comes
    /// back empty or a booking fails for another reason, so a successful
    /// probe between two expired bookings does not reset the count. A
    /// booking is only attempted with an offer from the probe of the same
    /// iteration.
    pub async fn search(
        &self,
        code: &BookingCode,
        locations: &LocationSet,
        contact: &ContactProfile,
        stop: &mut StopSignal,
    ) -> Result<SearchOutcome, EngineError> {
        info!(
            "Searching for appointments at {} location(s): {}",
            locations.len(),
            locations
        );

        let mut report = SearchReport::default();
        let mut consecutive_expiries: u32 = 0;

        loop {
            if let Some(max) = self.config.max_iterations {
                if report.probes >= max {
                    warn!("Giving up after {} probe iterations", report.probes);
                    return Err(EngineError::SearchExhausted {
                        iterations: report.probes,
                    });
                }
            }

            debug!("Probe iteration {}", report.probes + 1);

            let probe = tokio::select! {
                biased;
                _ = stop.stopped() => return Ok(self.cancel(report).await),
                probe = self.probe(code, locations) => probe,
            };
            report.probes += 1;

            let offers = match probe {
                Probe::Expired => {
                    consecutive_expiries += 1;
                    if !self
                        .renew(code, locations, consecutive_expiries, &mut report, stop)
                        .await?
                    {
                        return Ok(self.cancel(report).await);
                    }
                    continue;
                }
                Probe::Failed(e) => {
                    consecutive_expiries = 0;
                    report.transient_failures += 1;
                    warn!("{}; retrying in {:?}", e, self.config.wait_interval);
                    if self.wait(stop).await {
                        return Ok(self.cancel(report).await);
                    }
                    continue;
                }
                Probe::Offers(offers) => offers,
            };

            let Some(offer) = self.choose(offers) else {
                consecutive_expiries = 0;
                info!(
                    "No appointments available; next probe in {:?}",
                    self.config.wait_interval
                );
                if self.wait(stop).await {
                    return Ok(self.cancel(report).await);
                }
                continue;
            };

            info!(
                "Found offer with {} appointment(s) at location {}; booking",
                offer.appointments.len(),
                offer.location
            );

            report.bookings_attempted += 1;
            let booking = tokio::select! {
                biased;
                _ = stop.stopped() => return Ok(self.cancel(report).await),
                booking = self.api.book(code, &offer, contact) => booking,
            };

            match booking {
                Ok(appointment) => {
                    info!("Booked appointment: {}", appointment);
                    return Ok(SearchOutcome::Booked {
                        appointment,
                        report,
                    });
                }
                Err(e) if e.is_session_expired() => {
                    consecutive_expiries += 1;
                    if !self
                        .renew(code, locations, consecutive_expiries, &mut report, stop)
                        .await?
                    {
                        return Ok(self.cancel(report).await);
                    }
                }
                Err(ApiError::Conflict(reason)) => {
                    consecutive_expiries = 0;
                    report.transient_failures += 1;
                    warn!("Offer was taken ({}); probing again", reason);
                }
                Err(e) => {
                    consecutive_expiries = 0;
                    report.transient_failures += 1;
                    let error = EngineError::TransientBooking(e.to_string());
                    warn!("{}; retrying in {:?}", error, self.config.wait_interval);
                    if self.wait(stop).await {
                        return Ok(self.cancel(report).await);
                    }
                }
            }
        }
    }

    /// Probes every location concurrently and merges the results in location order
    async fn probe(&self, code: &BookingCode, locations: &LocationSet) -> Probe {
        let results = join_all(locations.iter().map(|location| async move {
            (location, self.api.probe_location(code, location).await)
        }))
        .await;

        let mut offers = Vec::new();
        let mut failures = Vec::new();
        let mut expired = false;
        let mut answered = false;

        for (location, result) in results {
            match result {
                Ok(found) => {
                    debug!("Location {} returned {} offer(s)", location, found.len());
                    answered = true;
                    offers.extend(found);
                }
                Err(e) if e.is_session_expired() => {
                    expired = true;
                }
                Err(e) => {
                    warn!("Probe of location {} failed: {}", location, e);
                    failures.push(format!("{}: {}", location, e));
                }
            }
        }

        if expired {
            Probe::Expired
        } else if !answered {
            Probe::Failed(EngineError::TransientProbe(failures.join("; ")))
        } else {
            Probe::Offers(offers)
        }
    }

    fn choose(&self, offers: Vec<SlotOffer>) -> Option<SlotOffer> {
        let mut candidates = offers
            .into_iter()
            .filter(|offer| !offer.appointments.is_empty());

        match self.config.selection {
            SlotSelection::FirstOffered => candidates.next(),
            SlotSelection::Earliest => candidates.min_by_key(|offer| offer.earliest_begin()),
        }
    }

    /// Re-establishes the session; returns false when the stop signal fired
    async fn renew(
        &self,
        code: &BookingCode,
        locations: &LocationSet,
        consecutive_expiries: u32,
        report: &mut SearchReport,
        stop: &mut StopSignal,
    ) -> Result<bool, EngineError> {
        if consecutive_expiries > self.config.max_session_renewals {
            error!(
                "Session expired {} times in a row; aborting",
                consecutive_expiries
            );
            return Err(EngineError::Session(format!(
                "session expired {} consecutive times",
                consecutive_expiries
            )));
        }

        info!(
            "Session expired; re-establishing ({}/{})",
            consecutive_expiries, self.config.max_session_renewals
        );

        tokio::select! {
            biased;
            _ = stop.stopped() => return Ok(false),
            renewed = self.api.establish_session(code, locations.primary()) => {
                renewed?;
            }
        }

        report.session_renewals += 1;
        Ok(true)
    }

    /// Sleeps for the wait interval; returns true when the stop signal fired
    async fn wait(&self, stop: &mut StopSignal) -> bool {
        tokio::select! {
            biased;
            _ = stop.stopped() => true,
            _ = sleep(self.config.wait_interval) => false,
        }
    }

    async fn cancel(&self, report: SearchReport) -> SearchOutcome {
        info!("Search cancelled after {} probe(s)", report.probes);
        self.api.release_session().await;
        SearchOutcome::Cancelled { report }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_manager::SessionStats;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use tokio::time::Instant;

    type ProbeStep = Result<Vec<SlotOffer>, ApiError>;

    /// Replays scripted probe and booking results; an exhausted script
    /// answers with no offers and successful bookings
    #[derive(Default)]
    struct ScriptedApi {
        probes: Mutex<HashMap<String, VecDeque<ProbeStep>>>,
        bookings: Mutex<VecDeque<Result<(), ApiError>>>,
        probe_times: Mutex<Vec<Instant>>,
        booked_locations: Mutex<Vec<String>>,
        establish_calls: AtomicU32,
        released: AtomicBool,
    }

    impl ScriptedApi {
        fn with_probes(location: &str, steps: Vec<ProbeStep>) -> Self {
            let api = Self::default();
            api.script(location, steps);
            api
        }

        fn script(&self, location: &str, steps: Vec<ProbeStep>) {
            self.probes
                .lock()
                .unwrap()
                .insert(location.to_string(), steps.into());
        }

        fn script_bookings(&self, steps: Vec<Result<(), ApiError>>) {
            *self.bookings.lock().unwrap() = steps.into();
        }

        fn probe_times(&self) -> Vec<Instant> {
            self.probe_times.lock().unwrap().clone()
        }

        fn booked(&self) -> Vec<String> {
            self.booked_locations.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BookingApi for ScriptedApi {
        async fn establish_session(
            &self,
            _code: &BookingCode,
            _location: &str,
        ) -> Result<SessionStats, EngineError> {
            self.establish_calls.fetch_add(1, Ordering::SeqCst);
            Ok(SessionStats {
                is_valid: true,
                last_refreshed: Some(Utc::now()),
                failure_count: 0,
                user_agent: "test".to_string(),
            })
        }

        async fn request_code(
            &self,
            _request: &CodeRequest,
        ) -> Result<VerificationToken, ApiError> {
            unreachable!()
        }

        async fn confirm_code(
            &self,
            _token: &VerificationToken,
            _pin: &SmsPin,
        ) -> Result<bool, ApiError> {
            unreachable!()
        }

        async fn probe_location(
            &self,
            _code: &BookingCode,
            location: &str,
        ) -> Result<Vec<SlotOffer>, ApiError> {
            self.probe_times.lock().unwrap().push(Instant::now());
            self.probes
                .lock()
                .unwrap()
                .get_mut(location)
                .and_then(VecDeque::pop_front)
                .unwrap_or(Ok(Vec::new()))
        }

        async fn book(
            &self,
            _code: &BookingCode,
            offer: &SlotOffer,
            _contact: &ContactProfile,
        ) -> Result<BookedAppointment, ApiError> {
            self.booked_locations
                .lock()
                .unwrap()
                .push(offer.location.clone());
            let step = self.bookings.lock().unwrap().pop_front().unwrap_or(Ok(()));
            step.map(|()| BookedAppointment {
                location: offer.location.clone(),
                appointments: offer.appointments.clone(),
                booked_at: Utc::now(),
            })
        }

        async fn release_session(&self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    fn offer(location: &str, slot: &str, begin_secs: i64) -> SlotOffer {
        SlotOffer {
            location: location.to_string(),
            appointments: vec![Appointment {
                slot_id: slot.to_string(),
                begin: DateTime::from_timestamp(begin_secs, 0).unwrap(),
                site_id: "site".to_string(),
            }],
            qualifications: vec!["L921".to_string()],
        }
    }

    fn contact() -> ContactProfile {
        ContactProfile {
            salutation: "Frau".to_string(),
            given_name: "Erika".to_string(),
            family_name: "Mustermann".to_string(),
            street: "Hauptstrasse".to_string(),
            house_number: "1".to_string(),
            postal_code: "68163".to_string(),
            city: "Mannheim".to_string(),
            phone: "+49151234567".to_string(),
            notification_channel: NotificationChannel::Email,
            notification_receiver: "erika@example.org".to_string(),
        }
    }

    fn code() -> BookingCode {
        BookingCode::parse("ABCD-1234-EF56").unwrap()
    }

    fn poller(api: Arc<ScriptedApi>, config: PollerConfig) -> SlotPoller {
        SlotPoller::new(api, Some(config))
    }

    async fn run(
        api: Arc<ScriptedApi>,
        config: PollerConfig,
        locations: &str,
    ) -> Result<SearchOutcome, EngineError> {
        let locations = LocationSet::parse(locations).unwrap();
        poller(api, config)
            .search(&code(), &locations, &contact(), &mut StopSignal::never())
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_books_after_error_and_empty_probes() {
        let api = Arc::new(ScriptedApi::with_probes(
            "68163",
            vec![
                Err(ApiError::Rejected {
                    status: 502,
                    message: "bad gateway".to_string(),
                }),
                Ok(vec![]),
                Ok(vec![]),
                Ok(vec![offer("68163", "slot-1", 1_000)]),
            ],
        ));

        let outcome = run(api.clone(), PollerConfig::default(), "68163")
            .await
            .unwrap();

        let SearchOutcome::Booked {
            appointment,
            report,
        } = outcome
        else {
            panic!("expected a booking");
        };
        assert_eq!(appointment.location, "68163");
        assert_eq!(appointment.appointments[0].slot_id, "slot-1");
        assert_eq!(report.probes, 4);
        assert_eq!(report.bookings_attempted, 1);
        assert_eq!(report.transient_failures, 1);
        assert_eq!(api.booked().len(), 1);

        let times = api.probe_times();
        assert_eq!(times.len(), 4);
        for gap in times.windows(2) {
            assert!(gap[1] - gap[0] >= Duration::from_secs(60));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_probe_waits_full_interval() {
        let api = Arc::new(ScriptedApi::with_probes(
            "68163",
            vec![Ok(vec![]), Ok(vec![offer("68163", "slot-1", 1_000)])],
        ));
        let config = PollerConfig {
            wait_interval: Duration::from_secs(30),
            ..PollerConfig::default()
        };

        run(api.clone(), config, "68163").await.unwrap();

        let times = api.probe_times();
        assert_eq!(times.len(), 2);
        assert!(times[1] - times[0] >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_renews_and_reprobes_without_delay() {
        let api = Arc::new(ScriptedApi::with_probes(
            "68163",
            vec![
                Err(ApiError::SessionExpired(401)),
                Ok(vec![offer("68163", "slot-1", 1_000)]),
            ],
        ));

        let outcome = run(api.clone(), PollerConfig::default(), "68163")
            .await
            .unwrap();

        let times = api.probe_times();
        assert_eq!(times.len(), 2);
        assert_eq!(times[1] - times[0], Duration::ZERO);
        assert_eq!(api.establish_calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.report().session_renewals, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_expiry_is_fatal() {
        let api = Arc::new(ScriptedApi::with_probes(
            "68163",
            (0..10).map(|_| Err(ApiError::SessionExpired(403))).collect(),
        ));

        let result = run(api.clone(), PollerConfig::default(), "68163").await;

        assert!(matches!(result, Err(EngineError::Session(_))));
        assert_eq!(api.establish_calls.load(Ordering::SeqCst), 3);
        assert_eq!(api.probe_times().len(), 4);
        assert!(api.booked().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_booking_conflict_reprobes_immediately() {
        let api = Arc::new(ScriptedApi::with_probes(
            "68163",
            vec![
                Ok(vec![offer("68163", "slot-1", 1_000)]),
                Ok(vec![offer("68163", "slot-2", 2_000)]),
            ],
        ));
        api.script_bookings(vec![Err(ApiError::Conflict("taken".to_string()))]);

        let outcome = run(api.clone(), PollerConfig::default(), "68163")
            .await
            .unwrap();

        let times = api.probe_times();
        assert_eq!(times.len(), 2);
        assert_eq!(times[1] - times[0], Duration::ZERO);
        assert_eq!(outcome.report().bookings_attempted, 2);
        assert_eq!(outcome.report().transient_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_bookings_count_towards_renewal_limit() {
        let api = Arc::new(ScriptedApi::with_probes(
            "68163",
            (0..10)
                .map(|i| Ok(vec![offer("68163", &format!("slot-{}", i), 1_000)]))
                .collect(),
        ));
        api.script_bookings((0..10).map(|_| Err(ApiError::SessionExpired(403))).collect());
        let config = PollerConfig {
            max_iterations: Some(20),
            ..PollerConfig::default()
        };

        let result = run(api.clone(), config, "68163").await;

        assert!(matches!(result, Err(EngineError::Session(_))));
        assert_eq!(api.establish_calls.load(Ordering::SeqCst), 3);
        assert_eq!(api.booked().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_booking_waits_before_next_attempt() {
        let api = Arc::new(ScriptedApi::with_probes(
            "68163",
            vec![
                Ok(vec![offer("68163", "slot-1", 1_000)]),
                Ok(vec![offer("68163", "slot-2", 2_000)]),
            ],
        ));
        api.script_bookings(vec![Err(ApiError::RateLimited)]);
        let config = PollerConfig {
            wait_interval: Duration::from_secs(45),
            ..PollerConfig::default()
        };

        let outcome = run(api.clone(), config, "68163").await.unwrap();

        let times = api.probe_times();
        assert_eq!(times.len(), 2);
        assert!(times[1] - times[0] >= Duration::from_secs(45));
        assert!(matches!(outcome, SearchOutcome::Booked { .. }));
        assert_eq!(outcome.report().bookings_attempted, 2);
        assert_eq!(outcome.report().transient_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_booking_without_offers() {
        let api = Arc::new(ScriptedApi::with_probes(
            "68163",
            vec![
                Err(ApiError::RateLimited),
                Ok(vec![]),
                Err(ApiError::Network("reset".to_string())),
            ],
        ));
        let config = PollerConfig {
            max_iterations: Some(3),
            ..PollerConfig::default()
        };

        let result = run(api.clone(), config, "68163").await;

        assert!(matches!(
            result,
            Err(EngineError::SearchExhausted { iterations: 3 })
        ));
        assert!(api.booked().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_probe_failure_still_books() {
        let api = Arc::new(ScriptedApi::default());
        api.script("68163", vec![Err(ApiError::RateLimited)]);
        api.script("69124", vec![Ok(vec![offer("69124", "slot-9", 1_000)])]);

        let outcome = run(api.clone(), PollerConfig::default(), "68163, 69124")
            .await
            .unwrap();

        assert_eq!(outcome.report().probes, 1);
        assert_eq!(api.booked(), vec!["69124".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slot_selection() {
        for (selection, expected) in [
            (SlotSelection::FirstOffered, "68163"),
            (SlotSelection::Earliest, "69124"),
        ] {
            let api = Arc::new(ScriptedApi::default());
            api.script("68163", vec![Ok(vec![offer("68163", "late", 2_000)])]);
            api.script("69124", vec![Ok(vec![offer("69124", "early", 1_000)])]);
            let config = PollerConfig {
                selection,
                ..PollerConfig::default()
            };

            run(api.clone(), config, "69124, 68163").await.unwrap();

            assert_eq!(api.booked(), vec![expected.to_string()], "{}", selection);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_wait() {
        let api = Arc::new(ScriptedApi::default());
        let poller = poller(api.clone(), PollerConfig::default());
        let locations = LocationSet::parse("68163").unwrap();
        let contact = contact();
        let code = code();
        let (handle, mut signal) = stop_channel();

        let (outcome, ()) = tokio::join!(
            poller.search(&code, &locations, &contact, &mut signal),
            async {
                sleep(Duration::from_secs(90)).await;
                handle.stop();
            }
        );

        let outcome = outcome.unwrap();
        assert!(matches!(outcome, SearchOutcome::Cancelled { .. }));
        assert_eq!(outcome.report().probes, 2);
        assert!(api.released.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_before_start_makes_no_calls() {
        let api = Arc::new(ScriptedApi::default());
        let (handle, mut signal) = stop_channel();
        assert!(!handle.is_stopped());
        handle.stop();
        assert!(handle.is_stopped());
        assert!(signal.is_stopped());

        let outcome = poller(api.clone(), PollerConfig::default())
            .search(
                &code(),
                &LocationSet::parse("68163").unwrap(),
                &contact(),
                &mut signal,
            )
            .await
            .unwrap();

        assert!(matches!(outcome, SearchOutcome::Cancelled { .. }));
        assert!(api.probe_times().is_empty());
    }

    #[test]
    fn test_slot_selection_from_str() {
        assert_eq!(
            "first".parse::<SlotSelection>().unwrap(),
            SlotSelection::FirstOffered
        );
        assert_eq!(
            " Earliest ".parse::<SlotSelection>().unwrap(),
            SlotSelection::Earliest
        );
        assert!("random".parse::<SlotSelection>().is_err());
    }
}
