//! Smile Clinic Core Library
//!
//! Local-first practice management for a single dental clinic.
//!
//! # Architecture
//!
//! ```text
//!        UI command
//!            │
//!            ▼
//!   ┌─────────────────┐   mirror (sync)    ┌──────────────────────┐
//!   │   DomainStore   │ ─────────────────▶ │ Persistent Local KV  │
//!   │   (in memory)   │                    │  (SQLite, per key)   │
//!   └────────┬────────┘                    └──────────────────────┘
//!            │ full Snapshot after every mutation
//!            ▼
//!   SnapshotObserver ──▶ debounced push (smile-clinic-sync)
//! ```
//!
//! # Core Principle
//!
//! **The device is authoritative.** Local mutations always succeed; the
//! remote copy is a best-effort mirror.
//!
//! # Modules
//!
//! - [`db`]: SQLite key-value store and sync bookkeeping
//! - [`models`]: Domain types (Patient, Appointment, Snapshot, etc.)
//! - [`store`]: In-memory domain store
//! - [`outreach`]: Birthday and recall candidates with dedup sets
//! - [`messaging`]: Template rendering and WhatsApp deep links
//! - [`export`]: Backup and finance exports

pub mod db;
pub mod export;
pub mod messaging;
pub mod models;
pub mod outreach;
pub mod store;

// Re-export commonly used types
pub use db::{Database, KeyValueStore};
pub use export::{Backup, BackupError, FinanceReport};
pub use models::{
    Appointment, ClinicSettings, NewAppointment, NewPatient, NewPayment, Patient,
    PatientUpdate, Payment, Snapshot, Treatment, WhatsAppTemplate,
};
pub use store::{BookingPolicy, DomainStore, SnapshotObserver};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use outreach::{BirthdayNotifications, RecallNotifications};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ClinicError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Backup error: {0}")]
    BackupError(String),
}

impl From<db::DbError> for ClinicError {
    fn from(e: db::DbError) -> Self {
        ClinicError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for ClinicError {
    fn from(e: serde_json::Error) -> Self {
        ClinicError::SerializationError(e.to_string())
    }
}

impl From<BackupError> for ClinicError {
    fn from(e: BackupError) -> Self {
        ClinicError::BackupError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for ClinicError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ClinicError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create the clinic database at the given path.
#[uniffi::export]
pub fn open_clinic(path: String) -> Result<Arc<ClinicCore>, ClinicError> {
    let db = Database::open(&path)?;
    Ok(ClinicCore::wrap(DomainStore::load(db)))
}

/// Create an in-memory clinic (for testing).
#[uniffi::export]
pub fn open_clinic_in_memory() -> Result<Arc<ClinicCore>, ClinicError> {
    let db = Database::open_in_memory()?;
    Ok(ClinicCore::wrap(DomainStore::load(db)))
}

/// Build a `wa.me` deep link for a phone number and message.
#[uniffi::export]
pub fn whatsapp_link(phone: String, message: String) -> String {
    messaging::whatsapp_link(&phone, &message)
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe domain store wrapper for FFI.
#[derive(uniffi::Object)]
pub struct ClinicCore {
    store: Mutex<DomainStore>,
}

impl ClinicCore {
    fn wrap(store: DomainStore) -> Arc<Self> {
        Arc::new(Self {
            store: Mutex::new(store),
        })
    }

    /// Attach an observer (e.g. the sync scheduler) to the wrapped store.
    pub fn set_observer(&self, observer: Option<Arc<dyn SnapshotObserver>>) -> Result<(), ClinicError> {
        self.store.lock()?.set_observer(observer);
        Ok(())
    }

    /// Run `f` with exclusive access to the wrapped store.
    pub fn with_store<R>(&self, f: impl FnOnce(&mut DomainStore) -> R) -> Result<R, ClinicError> {
        let mut store = self.store.lock()?;
        Ok(f(&mut store))
    }
}

#[uniffi::export]
impl ClinicCore {
    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// Create a new patient. Name and phone must not be blank.
    pub fn add_patient(&self, input: FfiPatientInput) -> Result<FfiPatient, ClinicError> {
        let data = input.validate()?;
        let mut store = self.store.lock()?;
        Ok(store.add_patient(data).into())
    }

    /// Save the form fields of an existing patient. Returns false if absent.
    pub fn update_patient(&self, id: String, input: FfiPatientInput) -> Result<bool, ClinicError> {
        let data = input.validate()?;
        let mut store = self.store.lock()?;
        Ok(store.update_patient(
            &id,
            PatientUpdate {
                name: Some(data.name),
                phone: Some(data.phone),
                birth_date: Some(data.birth_date),
                is_insurance: Some(data.is_insurance),
                insurance_number: Some(data.insurance_number),
                treatments: None,
            },
        ))
    }

    /// Delete a patient and their appointments.
    pub fn delete_patient(&self, id: String) -> Result<bool, ClinicError> {
        let mut store = self.store.lock()?;
        Ok(store.delete_patient(&id))
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, id: String) -> Result<Option<FfiPatient>, ClinicError> {
        let store = self.store.lock()?;
        Ok(store.get_patient_by_id(&id).cloned().map(Into::into))
    }

    /// Search patients by name or phone.
    pub fn search_patients(&self, query: String) -> Result<Vec<FfiPatient>, ClinicError> {
        let store = self.store.lock()?;
        Ok(store
            .search_patients(&query)
            .into_iter()
            .cloned()
            .map(Into::into)
            .collect())
    }

    // =========================================================================
    // Treatment Operations
    // =========================================================================

    pub fn add_treatment(
        &self,
        patient_id: String,
        description: String,
    ) -> Result<Option<FfiTreatment>, ClinicError> {
        let mut store = self.store.lock()?;
        Ok(store
            .add_treatment(&patient_id, description.trim())
            .map(Into::into))
    }

    pub fn remove_treatment(&self, patient_id: String, treatment_id: String) -> Result<bool, ClinicError> {
        let mut store = self.store.lock()?;
        Ok(store.remove_treatment(&patient_id, &treatment_id))
    }

    /// Record a payment. Invalid amounts are stored as 0.
    pub fn add_payment(
        &self,
        patient_id: String,
        treatment_id: String,
        date: String,
        amount: f64,
        description: String,
    ) -> Result<Option<FfiPayment>, ClinicError> {
        let mut store = self.store.lock()?;
        let payment = store.add_payment(
            &patient_id,
            &treatment_id,
            NewPayment {
                date,
                amount,
                description,
            },
        );
        Ok(payment.map(Into::into))
    }

    pub fn remove_payment(
        &self,
        patient_id: String,
        treatment_id: String,
        payment_id: String,
    ) -> Result<bool, ClinicError> {
        let mut store = self.store.lock()?;
        Ok(store.remove_payment(&patient_id, &treatment_id, &payment_id))
    }

    // =========================================================================
    // Appointment Operations
    // =========================================================================

    /// Book an appointment. `None` if the booking policy rejects the slot.
    pub fn add_appointment(
        &self,
        patient_id: String,
        date: String,
        time: String,
    ) -> Result<Option<FfiAppointment>, ClinicError> {
        let mut store = self.store.lock()?;
        Ok(store
            .add_appointment(NewAppointment::new(patient_id, date, time))
            .map(Into::into))
    }

    pub fn delete_appointment(&self, id: String) -> Result<bool, ClinicError> {
        let mut store = self.store.lock()?;
        Ok(store.delete_appointment(&id))
    }

    /// Appointments on a date, ascending by time.
    pub fn appointments_for_date(&self, date: String) -> Result<Vec<FfiAppointment>, ClinicError> {
        let store = self.store.lock()?;
        Ok(store
            .get_appointments_for_date(&date)
            .into_iter()
            .cloned()
            .map(Into::into)
            .collect())
    }

    /// Appointments in an inclusive date range, ascending by date and time.
    pub fn appointments_for_range(
        &self,
        start: String,
        end: String,
    ) -> Result<Vec<FfiAppointment>, ClinicError> {
        let store = self.store.lock()?;
        Ok(store
            .get_appointments_for_date_range(&start, &end)
            .into_iter()
            .cloned()
            .map(Into::into)
            .collect())
    }

    pub fn last_appointment(&self, patient_id: String) -> Result<Option<FfiAppointment>, ClinicError> {
        let store = self.store.lock()?;
        Ok(store.get_last_appointment(&patient_id).cloned().map(Into::into))
    }

    // =========================================================================
    // Settings and Templates
    // =========================================================================

    pub fn get_settings(&self) -> Result<FfiSettings, ClinicError> {
        let store = self.store.lock()?;
        Ok(store.settings().clone().into())
    }

    /// Save settings, trimmed and with the default clinic name when blank.
    pub fn update_settings(&self, settings: FfiSettings) -> Result<(), ClinicError> {
        let settings = ClinicSettings::from(settings).normalized();
        let mut store = self.store.lock()?;
        store.update_settings(settings);
        Ok(())
    }

    pub fn get_templates(&self) -> Result<FfiTemplates, ClinicError> {
        let store = self.store.lock()?;
        Ok(store.templates().clone().into())
    }

    pub fn update_templates(&self, templates: FfiTemplates) -> Result<(), ClinicError> {
        let mut store = self.store.lock()?;
        store.update_templates(templates.into());
        Ok(())
    }

    // =========================================================================
    // Outreach
    // =========================================================================

    /// Patients with a birthday this month not yet greeted, by day.
    pub fn birthday_candidates(&self) -> Result<Vec<FfiBirthdayCandidate>, ClinicError> {
        let today = chrono::Local::now().date_naive();
        let store = self.store.lock()?;
        let notified = BirthdayNotifications::load(store.storage(), today);
        let candidates = outreach::birthday_candidates(store.patients(), &notified, today)
            .into_iter()
            .map(|c| FfiBirthdayCandidate {
                patient: c.patient.clone().into(),
                day: c.day,
            })
            .collect();
        Ok(candidates)
    }

    pub fn mark_birthday_notified(&self, patient_id: String) -> Result<(), ClinicError> {
        let today = chrono::Local::now().date_naive();
        let store = self.store.lock()?;
        let mut notified = BirthdayNotifications::load(store.storage(), today);
        notified.mark_notified(store.storage(), &patient_id, today);
        Ok(())
    }

    /// Patients overdue for a visit not yet reminded, most overdue first.
    pub fn recall_candidates(&self) -> Result<Vec<FfiRecallCandidate>, ClinicError> {
        let now = chrono::Local::now().naive_local();
        let store = self.store.lock()?;
        let notified = RecallNotifications::load(store.storage());
        let candidates = outreach::recall_candidates(&*store, &notified, now)
            .into_iter()
            .map(|c| FfiRecallCandidate {
                patient: c.patient.clone().into(),
                last_appointment: c.last_appointment.cloned().map(Into::into),
                months_since: c.months_since,
            })
            .collect();
        Ok(candidates)
    }

    pub fn mark_recall_notified(&self, patient_id: String) -> Result<(), ClinicError> {
        let store = self.store.lock()?;
        let mut notified = RecallNotifications::load(store.storage());
        notified.mark_notified(store.storage(), &patient_id);
        Ok(())
    }

    // =========================================================================
    // Export Operations
    // =========================================================================

    /// Export the dataset as backup JSON.
    pub fn export_backup(&self) -> Result<String, ClinicError> {
        let store = self.store.lock()?;
        Ok(export::export_backup(&*store)?)
    }

    /// Validate and install a backup; nothing changes if it is invalid.
    pub fn import_backup(&self, json: String) -> Result<(), ClinicError> {
        let mut store = self.store.lock()?;
        export::import_backup(&mut *store, &json)?;
        Ok(())
    }

    /// Payments of one month as CSV.
    pub fn finance_report_csv(&self, year: i32, month: u32) -> Result<String, ClinicError> {
        let store = self.store.lock()?;
        Ok(FinanceReport::for_month(store.patients(), year, month).to_csv())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe patient form input.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientInput {
    pub name: String,
    pub phone: String,
    pub birth_date: Option<String>,
    pub is_insurance: bool,
    pub insurance_number: Option<String>,
}

impl FfiPatientInput {
    /// Trim fields and reject blank name or phone.
    fn validate(self) -> Result<NewPatient, ClinicError> {
        let name = self.name.trim().to_string();
        let phone = self.phone.trim().to_string();
        if name.is_empty() {
            return Err(ClinicError::InvalidInput("name is required".into()));
        }
        if phone.is_empty() {
            return Err(ClinicError::InvalidInput("phone is required".into()));
        }

        let trimmed = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Ok(NewPatient {
            name,
            phone,
            birth_date: trimmed(self.birth_date),
            is_insurance: self.is_insurance,
            insurance_number: trimmed(self.insurance_number),
            treatments: Vec::new(),
        })
    }
}

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub birth_date: Option<String>,
    pub is_insurance: bool,
    pub insurance_number: Option<String>,
    pub treatments: Vec<FfiTreatment>,
    pub total_paid: f64,
    pub created_at: String,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            total_paid: patient.total_paid(),
            id: patient.id,
            name: patient.name,
            phone: patient.phone,
            birth_date: patient.birth_date,
            is_insurance: patient.is_insurance,
            insurance_number: patient.insurance_number,
            treatments: patient.treatments.into_iter().map(Into::into).collect(),
            created_at: patient.created_at,
        }
    }
}

/// FFI-safe treatment.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiTreatment {
    pub id: String,
    pub description: String,
    pub payments: Vec<FfiPayment>,
    pub created_at: String,
}

impl From<Treatment> for FfiTreatment {
    fn from(treatment: Treatment) -> Self {
        Self {
            id: treatment.id,
            description: treatment.description,
            payments: treatment.payments.into_iter().map(Into::into).collect(),
            created_at: treatment.created_at,
        }
    }
}

/// FFI-safe payment.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPayment {
    pub id: String,
    pub date: String,
    pub amount: f64,
    pub description: String,
}

impl From<Payment> for FfiPayment {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            date: payment.date,
            amount: payment.amount,
            description: payment.description,
        }
    }
}

/// FFI-safe appointment.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAppointment {
    pub id: String,
    pub patient_id: String,
    pub date: String,
    pub time: String,
    pub created_at: String,
}

impl From<Appointment> for FfiAppointment {
    fn from(appointment: Appointment) -> Self {
        Self {
            id: appointment.id,
            patient_id: appointment.patient_id,
            date: appointment.date,
            time: appointment.time,
            created_at: appointment.created_at,
        }
    }
}

/// FFI-safe clinic settings.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSettings {
    pub clinic_name: String,
    pub dentist_name: String,
}

impl From<ClinicSettings> for FfiSettings {
    fn from(settings: ClinicSettings) -> Self {
        Self {
            clinic_name: settings.clinic_name,
            dentist_name: settings.dentist_name,
        }
    }
}

impl From<FfiSettings> for ClinicSettings {
    fn from(settings: FfiSettings) -> Self {
        ClinicSettings {
            clinic_name: settings.clinic_name,
            dentist_name: settings.dentist_name,
        }
    }
}

/// FFI-safe message templates.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiTemplates {
    pub appointment_reminder: String,
    pub recall_reminder: String,
    pub birthday_greeting: String,
}

impl From<WhatsAppTemplate> for FfiTemplates {
    fn from(templates: WhatsAppTemplate) -> Self {
        Self {
            appointment_reminder: templates.appointment_reminder,
            recall_reminder: templates.recall_reminder,
            birthday_greeting: templates.birthday_greeting,
        }
    }
}

impl From<FfiTemplates> for WhatsAppTemplate {
    fn from(templates: FfiTemplates) -> Self {
        WhatsAppTemplate {
            appointment_reminder: templates.appointment_reminder,
            recall_reminder: templates.recall_reminder,
            birthday_greeting: templates.birthday_greeting,
        }
    }
}

/// FFI-safe birthday candidate.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBirthdayCandidate {
    pub patient: FfiPatient,
    pub day: u32,
}

/// FFI-safe recall candidate.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRecallCandidate {
    pub patient: FfiPatient,
    pub last_appointment: Option<FfiAppointment>,
    pub months_since: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, phone: &str) -> FfiPatientInput {
        FfiPatientInput {
            name: name.into(),
            phone: phone.into(),
            birth_date: None,
            is_insurance: false,
            insurance_number: None,
        }
    }

    #[test]
    fn test_blank_name_rejected() {
        let core = open_clinic_in_memory().unwrap();
        let result = core.add_patient(input("   ", "1199"));
        assert!(matches!(result, Err(ClinicError::InvalidInput(_))));

        let result = core.add_patient(input("Ana", ""));
        assert!(matches!(result, Err(ClinicError::InvalidInput(_))));
        assert!(core.search_patients(String::new()).unwrap().is_empty());
    }

    #[test]
    fn test_add_patient_trims() {
        let core = open_clinic_in_memory().unwrap();
        let mut data = input("  Ana  ", " 11999990000 ");
        data.is_insurance = true;
        data.insurance_number = Some("  ".into());

        let patient = core.add_patient(data).unwrap();
        assert_eq!(patient.name, "Ana");
        assert_eq!(patient.phone, "11999990000");
        assert_eq!(patient.insurance_number, None);
    }

    #[test]
    fn test_update_settings_normalizes() {
        let core = open_clinic_in_memory().unwrap();
        core.update_settings(FfiSettings {
            clinic_name: " ".into(),
            dentist_name: " Dra. Salles ".into(),
        })
        .unwrap();

        let settings = core.get_settings().unwrap();
        assert_eq!(settings.clinic_name, models::DEFAULT_CLINIC_NAME);
        assert_eq!(settings.dentist_name, "Dra. Salles");
    }

    #[test]
    fn test_backup_through_facade() {
        let source = open_clinic_in_memory().unwrap();
        let patient = source.add_patient(input("Ana", "1199")).unwrap();
        source
            .add_appointment(patient.id.clone(), "2024-06-10".into(), "09:00".into())
            .unwrap();
        let json = source.export_backup().unwrap();

        let target = open_clinic_in_memory().unwrap();
        target.import_backup(json).unwrap();
        assert!(target.get_patient(patient.id.clone()).unwrap().is_some());
        assert_eq!(target.appointments_for_date("2024-06-10".into()).unwrap().len(), 1);

        assert!(target.import_backup("{}".into()).is_err());
        assert!(target.get_patient(patient.id).unwrap().is_some());
    }

    #[test]
    fn test_whatsapp_link_export() {
        assert_eq!(
            whatsapp_link("(11) 99999-0000".into(), "Oi".into()),
            "https://wa.me/5511999990000?text=Oi"
        );
    }
}
