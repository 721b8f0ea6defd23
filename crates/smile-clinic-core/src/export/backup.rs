//! Backup file export and import.
//!
//! A backup is a single JSON document:
//! `{version: 1, exportedAt, patients, appointments, templates, settings}`.
//! Import is all-or-nothing: the document is fully validated before any
//! local state changes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::KeyValueStore;
use crate::models::{
    migrate_patient, Appointment, ClinicSettings, Patient, Snapshot, StoredPatient,
    WhatsAppTemplate,
};
use crate::store::DomainStore;

/// Format version written by [`Backup::from_snapshot`].
pub const BACKUP_VERSION: u32 = 1;

/// Backup import errors.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Malformed backup file: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Backup file has no version")]
    MissingVersion,

    #[error("Unsupported backup version: {0}")]
    UnsupportedVersion(u32),

    #[error("Backup file has no patients")]
    MissingPatients,
}

/// A validated backup document.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub version: u32,
    pub exported_at: String,
    pub patients: Vec<Patient>,
    pub appointments: Vec<Appointment>,
    pub templates: WhatsAppTemplate,
    /// Absent settings leave the current ones in place on import
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<ClinicSettings>,
}

/// Permissive decoding target; presence checks happen in [`Backup::parse`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBackup {
    version: Option<u32>,
    #[serde(default)]
    exported_at: Option<String>,
    patients: Option<Vec<StoredPatient>>,
    #[serde(default)]
    appointments: Option<Vec<Appointment>>,
    #[serde(default)]
    templates: Option<WhatsAppTemplate>,
    #[serde(default)]
    settings: Option<ClinicSettings>,
}

impl Backup {
    /// Build a backup of the given dataset, stamped now.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            version: BACKUP_VERSION,
            exported_at: chrono::Utc::now().to_rfc3339(),
            patients: snapshot.patients,
            appointments: snapshot.appointments,
            templates: snapshot.templates,
            settings: Some(snapshot.settings),
        }
    }

    /// Export to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Suggested file name: `backup-clinica-<YYYY-MM-DD>.json`.
    pub fn file_name(&self) -> String {
        let day = self.exported_at.get(..10).unwrap_or("undated");
        format!("backup-clinica-{day}.json")
    }

    /// Parse and validate a backup document.
    ///
    /// `version` and `patients` are required. Missing appointments import
    /// as empty and missing templates as the defaults.
    pub fn parse(json: &str) -> Result<Self, BackupError> {
        let raw: RawBackup = serde_json::from_str(json)?;

        let version = match raw.version {
            None | Some(0) => return Err(BackupError::MissingVersion),
            Some(BACKUP_VERSION) => BACKUP_VERSION,
            Some(other) => return Err(BackupError::UnsupportedVersion(other)),
        };
        let patients = raw.patients.ok_or(BackupError::MissingPatients)?;

        Ok(Self {
            version,
            exported_at: raw.exported_at.unwrap_or_default(),
            patients: patients.into_iter().map(migrate_patient).collect(),
            appointments: raw.appointments.unwrap_or_default(),
            templates: raw.templates.unwrap_or_default(),
            settings: raw.settings,
        })
    }

    /// Dataset to install, keeping `current_settings` when the backup has none.
    pub fn into_snapshot(self, current_settings: &ClinicSettings) -> Snapshot {
        Snapshot {
            patients: self.patients,
            appointments: self.appointments,
            templates: self.templates,
            settings: self.settings.unwrap_or_else(|| current_settings.clone()),
        }
    }
}

/// Export the store's dataset as backup JSON.
pub fn export_backup<S: KeyValueStore>(store: &DomainStore<S>) -> Result<String, serde_json::Error> {
    Backup::from_snapshot(store.snapshot()).to_json()
}

/// Validate `json` and, only if valid, replace the store's dataset with it.
pub fn import_backup<S: KeyValueStore>(
    store: &mut DomainStore<S>,
    json: &str,
) -> Result<(), BackupError> {
    let backup = Backup::parse(json)?;
    tracing::info!(
        version = backup.version,
        exported_at = %backup.exported_at,
        patients = backup.patients.len(),
        "Importing backup"
    );
    let snapshot = backup.into_snapshot(store.settings());
    store.replace_all(snapshot);
    Ok(())
}
