//! In-memory domain store.
//!
//! Single source of truth for the running process. Every mutation is
//! mirrored synchronously to the [`KeyValueStore`] (only the affected
//! collections) and then handed, as a full [`Snapshot`], to the registered
//! [`SnapshotObserver`] so it can schedule a remote push.

mod persist;

pub(crate) use persist::{load_json, load_or_default, save_json};

use std::sync::Arc;

use crate::db::{
    Database, KeyValueStore, APPOINTMENTS_KEY, PATIENTS_KEY, SETTINGS_KEY, TEMPLATES_KEY,
};
use crate::models::{
    migrate_patient, Appointment, ClinicSettings, NewAppointment, NewPatient, NewPayment,
    Patient, PatientUpdate, Payment, Snapshot, StoredPatient, Treatment, WhatsAppTemplate,
};

/// Receives the full dataset after every mutation.
pub trait SnapshotObserver: Send + Sync {
    fn on_change(&self, snapshot: &Snapshot);
}

/// What `add_appointment` does when the `(date, time)` slot is already taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BookingPolicy {
    /// Book anyway; the slot ends up with two appointments.
    #[default]
    AllowDuplicates,
    /// Refuse the booking.
    RejectOccupiedSlot,
}

/// The clinic dataset held in memory.
pub struct DomainStore<S: KeyValueStore = Database> {
    storage: S,
    patients: Vec<Patient>,
    appointments: Vec<Appointment>,
    templates: WhatsAppTemplate,
    settings: ClinicSettings,
    booking_policy: BookingPolicy,
    observer: Option<Arc<dyn SnapshotObserver>>,
}

impl<S: KeyValueStore> DomainStore<S> {
    /// Seed the store from persisted collections.
    ///
    /// Missing or malformed collections fall back to their defaults. Legacy
    /// patient records are migrated here, and written back once if any were
    /// found so later loads see the current shape.
    pub fn load(storage: S) -> Self {
        let stored: Vec<StoredPatient> = load_or_default(&storage, PATIENTS_KEY);
        let migrated = stored.iter().filter(|p| p.needs_migration()).count();
        let patients: Vec<Patient> = stored.into_iter().map(migrate_patient).collect();

        let store = Self {
            appointments: load_or_default(&storage, APPOINTMENTS_KEY),
            templates: load_or_default(&storage, TEMPLATES_KEY),
            settings: load_or_default(&storage, SETTINGS_KEY),
            patients,
            storage,
            booking_policy: BookingPolicy::default(),
            observer: None,
        };

        if migrated > 0 {
            tracing::info!(count = migrated, "Migrated legacy patient records");
            store.persist_patients();
        }

        tracing::debug!(
            patients = store.patients.len(),
            appointments = store.appointments.len(),
            "Domain store loaded"
        );
        store
    }

    /// Set the booking policy for double-booked slots.
    pub fn with_booking_policy(mut self, policy: BookingPolicy) -> Self {
        self.booking_policy = policy;
        self
    }

    pub fn booking_policy(&self) -> BookingPolicy {
        self.booking_policy
    }

    /// Register (or clear) the change observer.
    pub fn set_observer(&mut self, observer: Option<Arc<dyn SnapshotObserver>>) {
        self.observer = observer;
    }

    /// Underlying persistent store.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    // =========================================================================
    // Patients
    // =========================================================================

    /// Create and append a patient. Duplicate names and phones are allowed.
    pub fn add_patient(&mut self, data: NewPatient) -> Patient {
        let patient = Patient::new(data);
        self.patients.push(patient.clone());
        tracing::debug!(patient_id = %patient.id, "Patient added");

        self.persist_patients();
        self.notify();
        patient
    }

    /// Merge `update` into the patient with `id`. Returns false if absent.
    pub fn update_patient(&mut self, id: &str, update: PatientUpdate) -> bool {
        let Some(patient) = self.patients.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        patient.apply(update);

        self.persist_patients();
        self.notify();
        true
    }

    /// Remove the patient and every appointment referencing it.
    pub fn delete_patient(&mut self, id: &str) -> bool {
        let before = self.patients.len();
        self.patients.retain(|p| p.id != id);
        if self.patients.len() == before {
            return false;
        }

        let appointments_before = self.appointments.len();
        self.appointments.retain(|a| a.patient_id != id);
        tracing::debug!(
            patient_id = %id,
            cascaded = appointments_before - self.appointments.len(),
            "Patient deleted"
        );

        self.persist_patients();
        self.persist_appointments();
        self.notify();
        true
    }

    pub fn get_patient_by_id(&self, id: &str) -> Option<&Patient> {
        self.patients.iter().find(|p| p.id == id)
    }

    pub fn patients(&self) -> &[Patient] {
        &self.patients
    }

    /// Case-insensitive name match or raw phone match; blank returns all.
    pub fn search_patients(&self, query: &str) -> Vec<&Patient> {
        let query = query.trim();
        if query.is_empty() {
            return self.patients.iter().collect();
        }
        let lowered = query.to_lowercase();
        self.patients
            .iter()
            .filter(|p| p.name.to_lowercase().contains(&lowered) || p.phone.contains(query))
            .collect()
    }

    // =========================================================================
    // Treatments and payments
    // =========================================================================

    /// Append a new treatment to the patient.
    pub fn add_treatment(&mut self, patient_id: &str, description: &str) -> Option<Treatment> {
        let patient = self.patients.iter_mut().find(|p| p.id == patient_id)?;
        let treatment = Treatment::new(description);
        patient.treatments.push(treatment.clone());

        self.persist_patients();
        self.notify();
        Some(treatment)
    }

    /// Remove a treatment along with its payments.
    pub fn remove_treatment(&mut self, patient_id: &str, treatment_id: &str) -> bool {
        let Some(patient) = self.patients.iter_mut().find(|p| p.id == patient_id) else {
            return false;
        };
        let before = patient.treatments.len();
        patient.treatments.retain(|t| t.id != treatment_id);
        if patient.treatments.len() == before {
            return false;
        }

        self.persist_patients();
        self.notify();
        true
    }

    /// Append a payment to a treatment. Invalid amounts are stored as 0.
    pub fn add_payment(
        &mut self,
        patient_id: &str,
        treatment_id: &str,
        data: NewPayment,
    ) -> Option<Payment> {
        let treatment = self
            .patients
            .iter_mut()
            .find(|p| p.id == patient_id)?
            .find_treatment_mut(treatment_id)?;
        let payment = Payment::new(data);
        treatment.payments.push(payment.clone());

        self.persist_patients();
        self.notify();
        Some(payment)
    }

    pub fn remove_payment(&mut self, patient_id: &str, treatment_id: &str, payment_id: &str) -> bool {
        let Some(treatment) = self
            .patients
            .iter_mut()
            .find(|p| p.id == patient_id)
            .and_then(|p| p.find_treatment_mut(treatment_id))
        else {
            return false;
        };
        let before = treatment.payments.len();
        treatment.payments.retain(|p| p.id != payment_id);
        if treatment.payments.len() == before {
            return false;
        }

        self.persist_patients();
        self.notify();
        true
    }

    // =========================================================================
    // Appointments
    // =========================================================================

    /// Book an appointment.
    ///
    /// Returns `None` only under [`BookingPolicy::RejectOccupiedSlot`] when
    /// the slot is already taken.
    pub fn add_appointment(&mut self, data: NewAppointment) -> Option<Appointment> {
        if self.booking_policy == BookingPolicy::RejectOccupiedSlot
            && self.is_slot_taken(&data.date, &data.time)
        {
            tracing::info!(date = %data.date, time = %data.time, "Slot already booked, rejecting");
            return None;
        }

        let appointment = Appointment::new(data);
        self.appointments.push(appointment.clone());
        tracing::debug!(appointment_id = %appointment.id, "Appointment added");

        self.persist_appointments();
        self.notify();
        Some(appointment)
    }

    pub fn delete_appointment(&mut self, id: &str) -> bool {
        let before = self.appointments.len();
        self.appointments.retain(|a| a.id != id);
        if self.appointments.len() == before {
            return false;
        }

        self.persist_appointments();
        self.notify();
        true
    }

    pub fn appointments(&self) -> &[Appointment] {
        &self.appointments
    }

    pub fn is_slot_taken(&self, date: &str, time: &str) -> bool {
        self.appointments.iter().any(|a| a.slot() == (date, time))
    }

    /// Appointments on `date`, ascending by time.
    pub fn get_appointments_for_date(&self, date: &str) -> Vec<&Appointment> {
        let mut found: Vec<&Appointment> =
            self.appointments.iter().filter(|a| a.date == date).collect();
        found.sort_by(|a, b| a.time.cmp(&b.time));
        found
    }

    /// Appointments with `start <= date <= end`, ascending by `(date, time)`.
    pub fn get_appointments_for_date_range(&self, start: &str, end: &str) -> Vec<&Appointment> {
        let mut found: Vec<&Appointment> = self
            .appointments
            .iter()
            .filter(|a| a.date.as_str() >= start && a.date.as_str() <= end)
            .collect();
        found.sort_by(|a, b| a.slot().cmp(&b.slot()));
        found
    }

    /// The patient's appointment with the greatest `(date, time)`.
    pub fn get_last_appointment(&self, patient_id: &str) -> Option<&Appointment> {
        self.appointments
            .iter()
            .filter(|a| a.patient_id == patient_id)
            .max_by(|a, b| a.slot().cmp(&b.slot()))
    }

    // =========================================================================
    // Templates and settings
    // =========================================================================

    pub fn templates(&self) -> &WhatsAppTemplate {
        &self.templates
    }

    pub fn settings(&self) -> &ClinicSettings {
        &self.settings
    }

    pub fn update_templates(&mut self, templates: WhatsAppTemplate) {
        self.templates = templates;
        save_json(&self.storage, TEMPLATES_KEY, &self.templates);
        self.notify();
    }

    pub fn update_settings(&mut self, settings: ClinicSettings) {
        self.settings = settings;
        save_json(&self.storage, SETTINGS_KEY, &self.settings);
        self.notify();
    }

    // =========================================================================
    // Whole dataset
    // =========================================================================

    /// Copy of the full dataset.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            patients: self.patients.clone(),
            appointments: self.appointments.clone(),
            templates: self.templates.clone(),
            settings: self.settings.clone(),
        }
    }

    /// Replace every collection wholesale (last write wins, no merge).
    pub fn replace_all(&mut self, snapshot: Snapshot) {
        self.patients = snapshot.patients;
        self.appointments = snapshot.appointments;
        self.templates = snapshot.templates;
        self.settings = snapshot.settings;
        tracing::info!(
            patients = self.patients.len(),
            appointments = self.appointments.len(),
            "Replaced local dataset"
        );

        self.persist_patients();
        self.persist_appointments();
        save_json(&self.storage, TEMPLATES_KEY, &self.templates);
        save_json(&self.storage, SETTINGS_KEY, &self.settings);
        self.notify();
    }

    fn persist_patients(&self) {
        save_json(&self.storage, PATIENTS_KEY, &self.patients);
    }

    fn persist_appointments(&self) {
        save_json(&self.storage, APPOINTMENTS_KEY, &self.appointments);
    }

    fn notify(&self) {
        if let Some(observer) = &self.observer {
            observer.on_change(&self.snapshot());
        }
    }
}
