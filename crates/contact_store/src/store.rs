use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::types::{ContactData, ContactDataError};

/// Location of the contact-data file when none is given
pub const DEFAULT_CONTACT_FILE: &str = "data/kontaktdaten.json";

/// Reads and writes the contact-data file
#[derive(Debug, Clone)]
pub struct ContactStore {
    path: PathBuf,
}

impl ContactStore {
    /// Store backed by the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file exists
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Reads the file; a missing file is an I/O error
    pub fn load(&self) -> Result<ContactData, ContactDataError> {
        let raw = fs::read_to_string(&self.path)?;
        let data: ContactData = serde_json::from_str(&raw)?;

        if data.is_legacy() {
            warn!(
                "⚠️ {} uses the single 'plz' key; it will be saved as 'plz_impfzentren'",
                self.path.display()
            );
        }

        info!("📂 Loaded contact data from {}", self.path.display());
        Ok(data)
    }

    /// Reads the file, or starts empty when it does not exist yet
    pub fn load_or_default(&self) -> Result<ContactData, ContactDataError> {
        if !self.exists() {
            info!(
                "No contact data at {}; starting with an empty profile",
                self.path.display()
            );
            return Ok(ContactData::default());
        }
        self.load()
    }

    /// Writes the data pretty-printed, creating parent directories
    pub fn save(&self, data: &ContactData) -> Result<(), ContactDataError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, json)?;

        info!("💾 Saved contact data to {}", self.path.display());
        Ok(())
    }
}

impl Default for ContactStore {
    fn default() -> Self {
        Self::new(DEFAULT_CONTACT_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContactField;
    use booking_engine::Command;
    use tempfile::TempDir;

    #[test]
    fn test_save_creates_parent_directory_and_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = ContactStore::new(dir.path().join("data").join("kontaktdaten.json"));
        assert!(!store.exists());

        let mut data = ContactData::default();
        data.set(ContactField::Locations, "68163").unwrap();
        data.set(ContactField::Phone, "0151234567").unwrap();
        data.set(ContactField::NotificationReceiver, "erika@example.org")
            .unwrap();

        store.save(&data).unwrap();
        assert!(store.exists());
        assert_eq!(store.load().unwrap(), data);
    }

    #[test]
    fn test_saved_file_uses_service_keys() {
        let dir = TempDir::new().unwrap();
        let store = ContactStore::new(dir.path().join("kontaktdaten.json"));

        let mut data = ContactData::default();
        data.set(ContactField::Locations, "68163").unwrap();
        data.set(ContactField::GivenName, "Erika").unwrap();
        store.save(&data).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["plz_impfzentren"], serde_json::json!(["68163"]));
        assert_eq!(raw["kontakt"]["vorname"], "Erika");
        assert_eq!(raw["kontakt"]["notificationChannel"], "email");
        assert!(raw.get("plz").is_none());
        assert!(raw.get("code").is_none());
    }

    #[test]
    fn test_load_legacy_file_and_migrate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kontaktdaten.json");
        fs::write(
            &path,
            r#"{
                "plz": "68163",
                "code": "ABCD-1234-EF56",
                "kontakt": {"phone": "+49151234567", "notificationReceiver": "a@b.de"}
            }"#,
        )
        .unwrap();

        let store = ContactStore::new(&path);
        let mut data = store.load().unwrap();
        assert!(data.is_legacy());
        assert!(data.missing_fields(Command::Code).is_empty());

        data.set(ContactField::Locations, &data.location_codes().join(","))
            .unwrap();
        store.save(&data).unwrap();

        let reloaded = store.load().unwrap();
        assert!(!reloaded.is_legacy());
        assert_eq!(reloaded.locations, vec!["68163"]);
    }

    #[test]
    fn test_load_errors_are_distinct() {
        let dir = TempDir::new().unwrap();

        let missing = ContactStore::new(dir.path().join("absent.json"));
        assert!(matches!(missing.load(), Err(ContactDataError::Io(_))));
        assert_eq!(missing.load_or_default().unwrap(), ContactData::default());

        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        let broken = ContactStore::new(&path);
        assert!(matches!(broken.load(), Err(ContactDataError::Json(_))));
        assert!(matches!(
            broken.load_or_default(),
            Err(ContactDataError::Json(_))
        ));

        let path = dir.path().join("wrong-shape.json");
        fs::write(&path, r#"{"plz_impfzentren": "68163"}"#).unwrap();
        assert!(matches!(
            ContactStore::new(&path).load(),
            Err(ContactDataError::Json(_))
        ));
    }

    #[test]
    fn test_default_path() {
        assert_eq!(
            ContactStore::default().path(),
            Path::new("data/kontaktdaten.json")
        );
    }
}
