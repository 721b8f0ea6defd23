//! The full dataset as exchanged with the remote mirror.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{deserialize_patients, Appointment, ClinicSettings, Patient, WhatsAppTemplate};

/// Complete in-memory dataset at one instant.
///
/// This is the body of `POST /sync` and the response of `GET /sync`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    #[serde(default, deserialize_with = "deserialize_patients")]
    pub patients: Vec<Patient>,
    #[serde(default)]
    pub appointments: Vec<Appointment>,
    #[serde(default)]
    pub templates: WhatsAppTemplate,
    #[serde(default)]
    pub settings: ClinicSettings,
}

impl Snapshot {
    /// SHA-256 of the canonical JSON encoding, hex encoded.
    pub fn content_hash(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&json);
        Ok(hex::encode(hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewPatient, Patient};

    #[test]
    fn test_content_hash_tracks_changes() {
        let mut snapshot = Snapshot::default();
        let empty = snapshot.content_hash().unwrap();
        assert_eq!(empty.len(), 64);
        assert_eq!(empty, Snapshot::default().content_hash().unwrap());

        snapshot.patients.push(Patient::new(NewPatient::new("Ana", "1199")));
        assert_ne!(snapshot.content_hash().unwrap(), empty);
    }

    #[test]
    fn test_missing_collections_default() {
        let snapshot: Snapshot = serde_json::from_str(r#"{"patients": []}"#).unwrap();
        assert!(snapshot.appointments.is_empty());
        assert_eq!(snapshot.templates, WhatsAppTemplate::default());
        assert_eq!(snapshot.settings, ClinicSettings::default());
    }

    #[test]
    fn test_wire_shape() {
        let snapshot = Snapshot::default();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json["patients"].is_array());
        assert!(json["appointments"].is_array());
        assert!(json["templates"]["appointmentReminder"].is_string());
        assert!(json["settings"]["clinicName"].is_string());
    }
}
