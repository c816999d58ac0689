use std::fmt;

use booking_engine::{
    BookingCode, CategorySelector, CodeRequest, Command, ContactProfile, EngineError,
    LocationSet, NotificationChannel, SearchRequest, normalize_phone, validate_postal_code,
};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidateEmail, ValidationError, ValidationErrors};

/// Errors raised while reading or interpreting the contact-data file
#[derive(Debug, thiserror::Error)]
pub enum ContactDataError {
    /// The file could not be read or written
    #[error("Contact file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid JSON of the expected shape
    #[error("Contact file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A required field is absent
    #[error("Missing contact field '{0}'")]
    Missing(&'static str),

    /// One or more fields failed validation
    #[error("Invalid contact data: {0}")]
    Invalid(#[from] ValidationErrors),

    /// A single field has an unusable value
    #[error("Malformed contact field '{field}': {reason}")]
    Malformed {
        /// Key of the offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Contents of the contact-data file.
///
/// Every field may be absent so a partially filled file still loads; the
/// prompt layer asks for whatever [`ContactData::missing_fields`] reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ContactData {
    /// Postal codes of the locations to search
    #[serde(rename = "plz_impfzentren", default, skip_serializing_if = "Vec::is_empty")]
    #[validate(custom(function = "validate_locations"))]
    pub locations: Vec<String>,

    /// Single location of older files, superseded by `plz_impfzentren`
    #[serde(rename = "plz", default, skip_serializing_if = "Option::is_none")]
    pub legacy_location: Option<String>,

    /// Booking code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Contact details of the person being booked
    #[serde(rename = "kontakt", default)]
    #[validate(nested)]
    pub contact: ContactFields,
}

/// The `kontakt` block of the contact-data file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ContactFields {
    /// Salutation
    #[serde(rename = "anrede", default)]
    pub salutation: String,

    /// Given name
    #[serde(rename = "vorname", default)]
    pub given_name: String,

    /// Family name
    #[serde(rename = "nachname", default)]
    pub family_name: String,

    /// Street
    #[serde(rename = "strasse", default)]
    pub street: String,

    /// House number
    #[serde(rename = "hausnummer", default)]
    pub house_number: String,

    /// Postal code of the home address
    #[serde(rename = "plz", default)]
    #[validate(custom(function = "validate_postal"))]
    pub postal_code: String,

    /// City
    #[serde(rename = "ort", default)]
    pub city: String,

    /// Phone number
    #[serde(default)]
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,

    /// Notification channel, always `email`
    #[serde(rename = "notificationChannel", default = "default_channel")]
    #[validate(custom(function = "validate_channel"))]
    pub notification_channel: String,

    /// Email address receiving notifications
    #[serde(rename = "notificationReceiver", default)]
    #[validate(email(message = "Please enter a valid email"))]
    pub notification_receiver: String,
}

impl Default for ContactFields {
    fn default() -> Self {
        Self {
            salutation: String::new(),
            given_name: String::new(),
            family_name: String::new(),
            street: String::new(),
            house_number: String::new(),
            postal_code: String::new(),
            city: String::new(),
            phone: String::new(),
            notification_channel: default_channel(),
            notification_receiver: String::new(),
        }
    }
}

fn default_channel() -> String {
    NotificationChannel::Email.as_str().to_string()
}

#[allow(clippy::ptr_arg)]
fn validate_locations(codes: &Vec<String>) -> Result<(), ValidationError> {
    // Absent locations are reported by `missing_fields`
    if codes.is_empty() {
        return Ok(());
    }
    match LocationSet::from_codes(codes) {
        Ok(_) => Ok(()),
        Err(_) => Err(ValidationError::new("invalid_location")),
    }
}

fn validate_postal(code: &str) -> Result<(), ValidationError> {
    validate_postal_code(code).map_err(|_| ValidationError::new("invalid_postal_code"))
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    normalize_phone(phone)
        .map(|_| ())
        .map_err(|_| ValidationError::new("invalid_phone"))
}

fn validate_channel(channel: &str) -> Result<(), ValidationError> {
    channel
        .parse::<NotificationChannel>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("invalid_notification_channel"))
}

/// A single prompt-able field of the contact data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactField {
    /// `plz_impfzentren`
    Locations,
    /// `code`
    Code,
    /// `kontakt.anrede`
    Salutation,
    /// `kontakt.vorname`
    GivenName,
    /// `kontakt.nachname`
    FamilyName,
    /// `kontakt.strasse`
    Street,
    /// `kontakt.hausnummer`
    HouseNumber,
    /// `kontakt.plz`
    PostalCode,
    /// `kontakt.ort`
    City,
    /// `kontakt.phone`
    Phone,
    /// `kontakt.notificationReceiver`
    NotificationReceiver,
}

impl ContactField {
    /// Fields needed by the search command, in prompt order
    pub const SEARCH: [ContactField; 11] = [
        ContactField::Code,
        ContactField::Locations,
        ContactField::Salutation,
        ContactField::GivenName,
        ContactField::FamilyName,
        ContactField::Street,
        ContactField::HouseNumber,
        ContactField::PostalCode,
        ContactField::City,
        ContactField::Phone,
        ContactField::NotificationReceiver,
    ];

    /// Fields needed by the code command, in prompt order
    pub const CODE: [ContactField; 3] = [
        ContactField::Locations,
        ContactField::Phone,
        ContactField::NotificationReceiver,
    ];

    /// Fields a command needs
    pub fn required_for(command: Command) -> &'static [ContactField] {
        match command {
            Command::Search => &Self::SEARCH,
            Command::Code => &Self::CODE,
        }
    }

    /// Key in the contact-data file
    pub fn key(&self) -> &'static str {
        match self {
            ContactField::Locations => "plz_impfzentren",
            ContactField::Code => "code",
            ContactField::Salutation => "kontakt.anrede",
            ContactField::GivenName => "kontakt.vorname",
            ContactField::FamilyName => "kontakt.nachname",
            ContactField::Street => "kontakt.strasse",
            ContactField::HouseNumber => "kontakt.hausnummer",
            ContactField::PostalCode => "kontakt.plz",
            ContactField::City => "kontakt.ort",
            ContactField::Phone => "kontakt.phone",
            ContactField::NotificationReceiver => "kontakt.notificationReceiver",
        }
    }

    /// Human readable prompt label
    pub fn label(&self) -> &'static str {
        match self {
            ContactField::Locations => "Location postal codes (comma separated)",
            ContactField::Code => "Booking code (XXXX-XXXX-XXXX)",
            ContactField::Salutation => "Salutation",
            ContactField::GivenName => "Given name",
            ContactField::FamilyName => "Family name",
            ContactField::Street => "Street",
            ContactField::HouseNumber => "House number",
            ContactField::PostalCode => "Postal code",
            ContactField::City => "City",
            ContactField::Phone => "Mobile phone number",
            ContactField::NotificationReceiver => "Email address",
        }
    }
}

impl fmt::Display for ContactField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

fn malformed(field: ContactField, error: EngineError) -> ContactDataError {
    let reason = match error {
        EngineError::Configuration(reason) => reason,
        other => other.to_string(),
    };
    ContactDataError::Malformed {
        field: field.key(),
        reason,
    }
}

impl ContactData {
    /// Location codes, falling back to the single legacy `plz`
    pub fn location_codes(&self) -> Vec<String> {
        if !self.locations.is_empty() {
            return self.locations.clone();
        }
        self.legacy_location
            .iter()
            .filter(|code| !code.trim().is_empty())
            .cloned()
            .collect()
    }

    /// Whether the file still uses the single top-level `plz`
    pub fn is_legacy(&self) -> bool {
        self.locations.is_empty() && self.legacy_location.is_some()
    }

    /// Current value of a field, if present
    pub fn get(&self, field: ContactField) -> Option<String> {
        let value = match field {
            ContactField::Locations => self.location_codes().join(", "),
            ContactField::Code => self.code.clone().unwrap_or_default(),
            ContactField::Salutation => self.contact.salutation.clone(),
            ContactField::GivenName => self.contact.given_name.clone(),
            ContactField::FamilyName => self.contact.family_name.clone(),
            ContactField::Street => self.contact.street.clone(),
            ContactField::HouseNumber => self.contact.house_number.clone(),
            ContactField::PostalCode => self.contact.postal_code.clone(),
            ContactField::City => self.contact.city.clone(),
            ContactField::Phone => self.contact.phone.clone(),
            ContactField::NotificationReceiver => self.contact.notification_receiver.clone(),
        };

        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    }

    /// Stores a user-entered value after checking and normalizing it
    pub fn set(&mut self, field: ContactField, raw: &str) -> Result<(), ContactDataError> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(ContactDataError::Missing(field.key()));
        }

        match field {
            ContactField::Locations => {
                let set = LocationSet::parse(value).map_err(|e| malformed(field, e))?;
                self.locations = set.into();
                self.legacy_location = None;
            }
            ContactField::Code => {
                let code = BookingCode::parse(value).map_err(|e| malformed(field, e))?;
                self.code = Some(code.into());
            }
            ContactField::PostalCode => {
                validate_postal_code(value).map_err(|e| malformed(field, e))?;
                self.contact.postal_code = value.to_string();
            }
            ContactField::Phone => {
                self.contact.phone = normalize_phone(value).map_err(|e| malformed(field, e))?;
            }
            ContactField::NotificationReceiver => {
                if !value.validate_email() {
                    return Err(ContactDataError::Malformed {
                        field: field.key(),
                        reason: format!("{:?} is not a valid email address", value),
                    });
                }
                self.contact.notification_receiver = value.to_string();
                self.contact.notification_channel = default_channel();
            }
            ContactField::Salutation => self.contact.salutation = value.to_string(),
            ContactField::GivenName => self.contact.given_name = value.to_string(),
            ContactField::FamilyName => self.contact.family_name = value.to_string(),
            ContactField::Street => self.contact.street = value.to_string(),
            ContactField::HouseNumber => self.contact.house_number = value.to_string(),
            ContactField::City => self.contact.city = value.to_string(),
        }

        Ok(())
    }

    /// Fields a command needs that are absent, in prompt order
    pub fn missing_fields(&self, command: Command) -> Vec<ContactField> {
        ContactField::required_for(command)
            .iter()
            .copied()
            .filter(|field| self.get(*field).is_none())
            .collect()
    }

    fn ensure_complete(&self, command: Command) -> Result<(), ContactDataError> {
        match self.missing_fields(command).first() {
            Some(field) => Err(ContactDataError::Missing(field.key())),
            None => Ok(()),
        }
    }

    /// Everything the search command needs
    pub fn to_search_request(&self) -> Result<SearchRequest, ContactDataError> {
        self.ensure_complete(Command::Search)?;
        self.validate()?;

        let locations = LocationSet::from_codes(self.location_codes())
            .map_err(|e| malformed(ContactField::Locations, e))?;
        let code = BookingCode::parse(self.code.as_deref().unwrap_or_default())
            .map_err(|e| malformed(ContactField::Code, e))?;

        let contact = ContactProfile {
            salutation: self.contact.salutation.trim().to_string(),
            given_name: self.contact.given_name.trim().to_string(),
            family_name: self.contact.family_name.trim().to_string(),
            street: self.contact.street.trim().to_string(),
            house_number: self.contact.house_number.trim().to_string(),
            postal_code: self.contact.postal_code.trim().to_string(),
            city: self.contact.city.trim().to_string(),
            phone: self.contact.phone.clone(),
            notification_channel: NotificationChannel::Email,
            notification_receiver: self.contact.notification_receiver.trim().to_string(),
        }
        .normalized()
        .map_err(|e| malformed(ContactField::Phone, e))?;

        Ok(SearchRequest {
            code,
            locations,
            contact,
        })
    }

    /// Everything the code command needs; the code is bound to the first location
    pub fn to_code_request(
        &self,
        category: CategorySelector,
    ) -> Result<CodeRequest, ContactDataError> {
        self.ensure_complete(Command::Code)?;

        let receiver = self.contact.notification_receiver.trim();
        if !receiver.validate_email() {
            return Err(ContactDataError::Malformed {
                field: ContactField::NotificationReceiver.key(),
                reason: format!("{:?} is not a valid email address", receiver),
            });
        }

        let locations = LocationSet::from_codes(self.location_codes())
            .map_err(|e| malformed(ContactField::Locations, e))?;

        CodeRequest::new(receiver, &self.contact.phone, locations.primary(), category)
            .map_err(|e| malformed(ContactField::Phone, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> ContactData {
        let mut data = ContactData::default();
        data.set(ContactField::Locations, "69124, 68163").unwrap();
        data.set(ContactField::Code, "abcd-1234-ef56").unwrap();
        data.set(ContactField::Salutation, "Frau").unwrap();
        data.set(ContactField::GivenName, "Erika").unwrap();
        data.set(ContactField::FamilyName, "Mustermann").unwrap();
        data.set(ContactField::Street, "Hauptstrasse").unwrap();
        data.set(ContactField::HouseNumber, "1a").unwrap();
        data.set(ContactField::PostalCode, "68163").unwrap();
        data.set(ContactField::City, "Mannheim").unwrap();
        data.set(ContactField::Phone, "0151 234567").unwrap();
        data.set(ContactField::NotificationReceiver, "erika@example.org")
            .unwrap();
        data
    }

    #[test]
    fn test_set_normalizes_values() {
        let data = complete();
        assert_eq!(data.locations, vec!["68163", "69124"]);
        assert_eq!(data.code.as_deref(), Some("ABCD-1234-EF56"));
        assert_eq!(data.contact.phone, "+49151234567");
        assert_eq!(data.contact.notification_channel, "email");
        assert!(data.validate().is_ok());
    }

    #[test]
    fn test_set_rejects_malformed_values() {
        let mut data = ContactData::default();

        assert!(matches!(
            data.set(ContactField::Phone, "call me"),
            Err(ContactDataError::Malformed {
                field: "kontakt.phone",
                ..
            })
        ));
        assert!(matches!(
            data.set(ContactField::Locations, "6816"),
            Err(ContactDataError::Malformed { .. })
        ));
        assert!(matches!(
            data.set(ContactField::NotificationReceiver, "nobody"),
            Err(ContactDataError::Malformed { .. })
        ));
        assert!(matches!(
            data.set(ContactField::City, "   "),
            Err(ContactDataError::Missing("kontakt.ort"))
        ));
        assert_eq!(data, ContactData::default());
    }

    #[test]
    fn test_missing_fields_depend_on_command() {
        let mut data = ContactData::default();
        assert_eq!(data.missing_fields(Command::Code), ContactField::CODE.to_vec());
        assert_eq!(data.missing_fields(Command::Search).len(), 11);

        data.set(ContactField::Locations, "68163").unwrap();
        data.set(ContactField::Phone, "0151234567").unwrap();
        assert_eq!(
            data.missing_fields(Command::Code),
            vec![ContactField::NotificationReceiver]
        );

        assert!(complete().missing_fields(Command::Search).is_empty());
    }

    #[test]
    fn test_legacy_location_is_used() {
        let data: ContactData = serde_json::from_str(
            r#"{"plz": "68163", "code": "ABCD-1234-EF56", "kontakt": {}}"#,
        )
        .unwrap();

        assert!(data.is_legacy());
        assert_eq!(data.location_codes(), vec!["68163".to_string()]);
        assert!(!data.missing_fields(Command::Search).contains(&ContactField::Locations));
    }

    #[test]
    fn test_search_request_from_complete_data() {
        let request = complete().to_search_request().unwrap();

        assert_eq!(request.code.as_str(), "ABCD-1234-EF56");
        assert_eq!(request.locations.primary(), "68163");
        assert_eq!(request.locations.len(), 2);
        assert_eq!(request.contact.phone, "+49151234567");
        assert_eq!(request.contact.display_name(), "Erika Mustermann");
    }

    #[test]
    fn test_search_request_reports_missing_and_invalid() {
        let mut data = complete();
        data.contact.street.clear();
        assert!(matches!(
            data.to_search_request(),
            Err(ContactDataError::Missing("kontakt.strasse"))
        ));

        let mut data = complete();
        data.contact.notification_receiver = "not-an-email".to_string();
        assert!(matches!(
            data.to_search_request(),
            Err(ContactDataError::Invalid(_))
        ));
    }

    #[test]
    fn test_code_request_needs_only_reachability() {
        let mut data = ContactData::default();
        data.set(ContactField::Locations, "69124,68163").unwrap();
        data.set(ContactField::Phone, "0151234567").unwrap();
        data.set(ContactField::NotificationReceiver, "erika@example.org")
            .unwrap();

        let request = data.to_code_request(CategorySelector::L923).unwrap();
        assert_eq!(request.location, "68163");
        assert_eq!(request.phone, "+49151234567");
        assert_eq!(request.category, CategorySelector::L923);
    }
}
