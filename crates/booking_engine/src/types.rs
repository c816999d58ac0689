use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Country prefix every phone number is normalized to
pub const COUNTRY_PREFIX: &str = "+49";

/// Maximum number of confirmation attempts for one verification token
pub const MAX_CONFIRMATION_ATTEMPTS: u32 = 3;

/// First group of every synthetic booking code
pub const SYNTHETIC_CODE_TAG: &str = "SLOT";

/// Constant stem of the second group of a synthetic booking code
pub const SYNTHETIC_CODE_STEM: &str = "BKR";

const CODE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

lazy_static! {
    static ref BOOKING_CODE_RE: Regex =
        Regex::new(r"^[A-Z0-9]{4}-[A-Z0-9]{4}-[A-Z0-9]{4}$").expect("booking code pattern");
    static ref POSTAL_CODE_RE: Regex = Regex::new(r"^[0-9]{5}$").expect("postal code pattern");
}

/// Errors surfaced by the booking engine
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// Missing or malformed input, never retried
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Session handshake or refresh failed after the bounded retries
    #[error("Session error: {0}")]
    Session(String),

    /// The verification code request was rejected
    #[error("Code request failed: {0}")]
    Request(String),

    /// The verification code confirmation failed
    #[error("Code confirmation failed: {0}")]
    Confirmation(#[from] ConfirmationError),

    /// A recoverable failure while probing for slots
    #[error("Availability probe failed: {0}")]
    TransientProbe(String),

    /// A recoverable failure while booking an offered slot
    #[error("Booking attempt failed: {0}")]
    TransientBooking(String),

    /// The configured iteration ceiling was reached without a booking
    #[error("No appointment booked after {iterations} probe iterations")]
    SearchExhausted {
        /// Number of probe iterations that were executed
        iterations: u64,
    },
}

impl EngineError {
    /// Whether the slot poller absorbs this error into its retry loop
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::TransientProbe(_) | EngineError::TransientBooking(_)
        )
    }
}

/// Reasons a verification code confirmation can fail without a verdict
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationError {
    /// Every allowed attempt for this token has been used
    #[error("all {max} confirmation attempts have been used", max = MAX_CONFIRMATION_ATTEMPTS)]
    AttemptsExhausted,

    /// The token was already confirmed successfully
    #[error("verification code was already confirmed")]
    AlreadyConfirmed,

    /// The confirmation call did not reach a verdict
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Classification of a single failed call against the remote service
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The session cookies are no longer accepted
    #[error("Session expired (HTTP {0})")]
    SessionExpired(u16),

    /// Too many requests
    #[error("Rate limited by remote service")]
    RateLimited,

    /// The service answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// The requested slot was taken by someone else
    #[error("Slot already taken: {0}")]
    Conflict(String),

    /// The request never produced a response
    #[error("Network error: {0}")]
    Network(String),

    /// The response did not have the expected shape
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl ApiError {
    /// Whether the session must be re-established before the next call
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Network(format!("request timed out: {}", e))
        } else if e.is_decode() {
            ApiError::UnexpectedResponse(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

/// Normalizes a phone number to `+49<digits>` without a trunk zero
pub fn normalize_phone(raw: &str) -> Result<String, EngineError> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '/' | '(' | ')'))
        .collect();

    let national = compact
        .strip_prefix(COUNTRY_PREFIX)
        .or_else(|| compact.strip_prefix("0049"))
        .unwrap_or(compact.as_str());
    let national = national.strip_prefix('0').unwrap_or(national);

    if national.is_empty() || !national.chars().all(|c| c.is_ascii_digit()) {
        return Err(EngineError::Configuration(format!(
            "Invalid phone number: {:?}",
            raw
        )));
    }

    Ok(format!("{}{}", COUNTRY_PREFIX, national))
}

/// Checks a single postal code identifier
pub fn validate_postal_code(code: &str) -> Result<(), EngineError> {
    if POSTAL_CODE_RE.is_match(code) {
        Ok(())
    } else {
        Err(EngineError::Configuration(format!(
            "Invalid postal code: {:?} (expected five digits)",
            code
        )))
    }
}

/// Notification channel for booking confirmations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    /// Confirmations are sent by email
    #[default]
    Email,
}

impl NotificationChannel {
    /// Wire name of the channel
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationChannel::Email => "email",
        }
    }
}

impl FromStr for NotificationChannel {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "email" => Ok(NotificationChannel::Email),
            other => Err(EngineError::Configuration(format!(
                "Unsupported notification channel: {:?}",
                other
            ))),
        }
    }
}

/// Identity and reachability data of the person being booked.
///
/// Serializes with the field names the booking endpoint expects, so the
/// profile is sent as-is in the booking payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactProfile {
    /// Salutation (e.g. "Frau", "Herr")
    #[serde(rename = "anrede")]
    pub salutation: String,

    /// Given name
    #[serde(rename = "vorname")]
    pub given_name: String,

    /// Family name
    #[serde(rename = "nachname")]
    pub family_name: String,

    /// Street without house number
    #[serde(rename = "strasse")]
    pub street: String,

    /// House number
    #[serde(rename = "hausnummer")]
    pub house_number: String,

    /// Postal code of the home address
    #[serde(rename = "plz")]
    pub postal_code: String,

    /// City of the home address
    #[serde(rename = "ort")]
    pub city: String,

    /// Phone number in canonical `+49…` form
    pub phone: String,

    /// Channel for notifications
    #[serde(rename = "notificationChannel")]
    pub notification_channel: NotificationChannel,

    /// Address notifications are sent to
    #[serde(rename = "notificationReceiver")]
    pub notification_receiver: String,
}

impl ContactProfile {
    /// Checks required fields and brings the phone number into canonical form
    pub fn normalized(mut self) -> Result<Self, EngineError> {
        let required = [
            ("salutation", &self.salutation),
            ("given name", &self.given_name),
            ("family name", &self.family_name),
            ("street", &self.street),
            ("house number", &self.house_number),
            ("postal code", &self.postal_code),
            ("city", &self.city),
            ("notification receiver", &self.notification_receiver),
        ];

        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(EngineError::Configuration(format!(
                    "Contact field '{}' must not be empty",
                    name
                )));
            }
        }

        self.phone = normalize_phone(&self.phone)?;
        Ok(self)
    }

    /// Full name for display
    pub fn display_name(&self) -> String {
        format!("{} {}", self.given_name, self.family_name)
    }
}

/// Deduplicated, non-empty set of location postal codes searched jointly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LocationSet(BTreeSet<String>);

impl LocationSet {
    /// Parses comma-separated input such as `"68163, 69124"`
    pub fn parse(input: &str) -> Result<Self, EngineError> {
        Self::from_codes(input.split(','))
    }

    /// Builds a set from individual codes; blanks are skipped, duplicates collapse
    pub fn from_codes<I, S>(codes: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for code in codes {
            let code = code.as_ref().trim();
            if code.is_empty() {
                continue;
            }
            validate_postal_code(code)?;
            set.insert(code.to_string());
        }

        if set.is_empty() {
            return Err(EngineError::Configuration(
                "At least one location postal code is required".to_string(),
            ));
        }

        Ok(Self(set))
    }

    /// Iterates the codes in ascending order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Lowest code of the set, used to seed the session
    pub fn primary(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or_default()
    }

    /// Number of locations
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a constructed set
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the set contains the given code
    pub fn contains(&self, code: &str) -> bool {
        self.0.contains(code)
    }
}

impl TryFrom<Vec<String>> for LocationSet {
    type Error = EngineError;

    fn try_from(codes: Vec<String>) -> Result<Self, Self::Error> {
        Self::from_codes(codes)
    }
}

impl From<LocationSet> for Vec<String> {
    fn from(set: LocationSet) -> Self {
        set.0.into_iter().collect()
    }
}

impl fmt::Display for LocationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes: Vec<&str> = self.iter().collect();
        write!(f, "{}", codes.join(", "))
    }
}

/// Access code of the form `XXXX-XXXX-XXXX`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BookingCode(String);

impl BookingCode {
    /// Parses a user-supplied code, case-insensitively
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        let code = raw.trim().to_uppercase();
        if BOOKING_CODE_RE.is_match(&code) {
            Ok(Self(code))
        } else {
            Err(EngineError::Configuration(format!(
                "Invalid booking code: {:?} (expected XXXX-XXXX-XXXX)",
                raw
            )))
        }
    }

    /// Generates a synthetic code used only to seed a session
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let mut pick = || CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char;

        let second = format!("{}{}", SYNTHETIC_CODE_STEM, pick());
        let third: String = (0..4).map(|_| pick()).collect();

        Self(format!("{}-{}-{}", SYNTHETIC_CODE_TAG, second, third))
    }

    /// Whether the code was produced by [`BookingCode::generate`]
    pub fn is_synthetic(&self) -> bool {
        self.0
            .starts_with(&format!("{}-{}", SYNTHETIC_CODE_TAG, SYNTHETIC_CODE_STEM))
    }

    /// The code as sent to the remote service
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BookingCode {
    type Error = EngineError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<BookingCode> for String {
    fn from(code: BookingCode) -> Self {
        code.0
    }
}

impl fmt::Display for BookingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Age/eligibility group a verification code is requested for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategorySelector {
    /// Group L920
    L920,
    /// Group L921
    L921,
    /// Group L922
    L922,
    /// Group L923
    L923,
}

impl CategorySelector {
    /// All recognized selectors
    pub const ALL: [CategorySelector; 4] = [
        CategorySelector::L920,
        CategorySelector::L921,
        CategorySelector::L922,
        CategorySelector::L923,
    ];

    /// Tag as sent to the remote service
    pub fn as_str(&self) -> &'static str {
        match self {
            CategorySelector::L920 => "L920",
            CategorySelector::L921 => "L921",
            CategorySelector::L922 => "L922",
            CategorySelector::L923 => "L923",
        }
    }
}

impl FromStr for CategorySelector {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_uppercase();
        CategorySelector::ALL
            .into_iter()
            .find(|category| category.as_str() == tag)
            .ok_or_else(|| {
                EngineError::Configuration(format!(
                    "Unknown category {:?}; expected one of L920, L921, L922, L923",
                    s
                ))
            })
    }
}

impl fmt::Display for CategorySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric code received by SMS, separators stripped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsPin(String);

impl SmsPin {
    /// Accepts input like `123-456`
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        let digits: String = raw
            .chars()
            .filter(|c| *c != '-' && !c.is_whitespace())
            .collect();

        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(EngineError::Configuration(format!(
                "Invalid SMS code: {:?} (expected digits, e.g. 123-456)",
                raw
            )));
        }

        Ok(Self(digits))
    }

    /// The normalized digits
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Opaque handle returned by a code request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationToken(String);

impl VerificationToken {
    /// Wraps a token returned by the remote service
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Input of the code request step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRequest {
    /// Notification email address
    pub email: String,
    /// Phone number receiving the SMS, canonical form
    pub phone: String,
    /// Location the code is bound to
    pub location: String,
    /// Eligibility group
    pub category: CategorySelector,
}

impl CodeRequest {
    /// Builds a request, normalizing the phone number and checking the location
    pub fn new(
        email: &str,
        phone: &str,
        location: &str,
        category: CategorySelector,
    ) -> Result<Self, EngineError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(EngineError::Configuration(
                "Email address must not be empty".to_string(),
            ));
        }
        validate_postal_code(location.trim())?;

        Ok(Self {
            email: email.to_string(),
            phone: normalize_phone(phone)?,
            location: location.trim().to_string(),
            category,
        })
    }
}

/// A single appointment within an offer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    /// Remote slot identifier
    pub slot_id: String,
    /// Start of the appointment
    pub begin: DateTime<Utc>,
    /// Remote site identifier
    pub site_id: String,
}

/// One bookable offer returned by a probe of a single location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotOffer {
    /// Location the offer belongs to
    pub location: String,
    /// Appointments booked together, in the order the service returned them
    pub appointments: Vec<Appointment>,
    /// Qualifications the probe was answered for
    pub qualifications: Vec<String>,
}

impl SlotOffer {
    /// Start of the first appointment of the offer
    pub fn earliest_begin(&self) -> Option<DateTime<Utc>> {
        self.appointments.iter().map(|a| a.begin).min()
    }

    /// Slot identifiers in booking order
    pub fn slot_ids(&self) -> Vec<&str> {
        self.appointments
            .iter()
            .map(|a| a.slot_id.as_str())
            .collect()
    }
}

/// A successfully booked offer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookedAppointment {
    /// Location of the booked appointments
    pub location: String,
    /// Booked appointments
    pub appointments: Vec<Appointment>,
    /// When the booking call succeeded
    pub booked_at: DateTime<Utc>,
}

impl fmt::Display for BookedAppointment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "location {}", self.location)?;
        for (index, appointment) in self.appointments.iter().enumerate() {
            write!(
                f,
                "; appointment {}: {} (site {})",
                index + 1,
                appointment.begin.format("%Y-%m-%d %H:%M UTC"),
                appointment.site_id
            )?;
        }
        Ok(())
    }
}
