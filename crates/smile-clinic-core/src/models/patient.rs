//! Patient models, including the treatment/payment ledger and the
//! migration from the legacy flat shape.

use serde::{Deserialize, Deserializer, Serialize};

/// A patient record.
///
/// Serialized with camelCase keys so the on-device JSON and the remote
/// sync payload share one shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    /// Opaque unique ID, generated locally and never changed
    pub id: String,
    /// Display name
    pub name: String,
    /// Free-text phone, also used to derive the messaging address
    pub phone: String,
    /// Birth date (`YYYY-MM-DD`); only month/day matter for birthdays
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    /// Whether the patient is covered by an insurance plan
    #[serde(default)]
    pub is_insurance: bool,
    /// Insurance card number, present only when `is_insurance` is true
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insurance_number: Option<String>,
    /// Treatments in insertion (display) order
    #[serde(default)]
    pub treatments: Vec<Treatment>,
    /// Creation timestamp
    pub created_at: String,
}

/// A treatment owned by exactly one patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Treatment {
    pub id: String,
    pub description: String,
    /// Payments in insertion (display) order
    #[serde(default)]
    pub payments: Vec<Payment>,
    pub created_at: String,
}

/// A single payment towards a treatment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    /// Payment date (`YYYY-MM-DD`)
    pub date: String,
    /// Non-negative amount, rounded to cents
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub description: String,
}

/// Input for creating a patient.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPatient {
    pub name: String,
    pub phone: String,
    pub birth_date: Option<String>,
    pub is_insurance: bool,
    pub insurance_number: Option<String>,
    pub treatments: Vec<Treatment>,
}

impl NewPatient {
    /// Create input with the required fields.
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            ..Default::default()
        }
    }
}

/// Partial update with merge semantics: `None` leaves a field untouched.
///
/// Optional fields use a nested `Option` so a caller can clear them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<Option<String>>,
    pub is_insurance: Option<bool>,
    pub insurance_number: Option<Option<String>>,
    pub treatments: Option<Vec<Treatment>>,
}

/// Input for recording a payment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPayment {
    pub date: String,
    pub amount: f64,
    pub description: String,
}

impl Patient {
    /// Create a new patient with a fresh ID and creation timestamp.
    pub fn new(data: NewPatient) -> Self {
        let mut patient = Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: data.name,
            phone: data.phone,
            birth_date: data.birth_date,
            is_insurance: data.is_insurance,
            insurance_number: data.insurance_number,
            treatments: data.treatments,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        patient.enforce_insurance_invariant();
        patient
    }

    /// Merge the supplied fields into this record.
    pub fn apply(&mut self, update: PatientUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(phone) = update.phone {
            self.phone = phone;
        }
        if let Some(birth_date) = update.birth_date {
            self.birth_date = birth_date;
        }
        if let Some(is_insurance) = update.is_insurance {
            self.is_insurance = is_insurance;
        }
        if let Some(insurance_number) = update.insurance_number {
            self.insurance_number = insurance_number;
        }
        if let Some(treatments) = update.treatments {
            self.treatments = treatments;
        }
        self.enforce_insurance_invariant();
    }

    /// Insurance number is only kept for insured patients, and never blank.
    fn enforce_insurance_invariant(&mut self) {
        let blank = self
            .insurance_number
            .as_deref()
            .is_some_and(|n| n.trim().is_empty());
        if !self.is_insurance || blank {
            self.insurance_number = None;
        }
    }

    /// Month (1-12) and day of the birth date, if it parses.
    pub fn birth_month_day(&self) -> Option<(u32, u32)> {
        let date = self.birth_date.as_deref()?;
        let mut parts = date.split('-').skip(1);
        let month = leading_number(parts.next()?)?;
        let day = leading_number(parts.next()?)?;
        Some((month, day))
    }

    /// Sum of every payment across all treatments.
    pub fn total_paid(&self) -> f64 {
        round_cents(self.treatments.iter().map(Treatment::total_paid).sum())
    }

    pub fn find_treatment_mut(&mut self, treatment_id: &str) -> Option<&mut Treatment> {
        self.treatments.iter_mut().find(|t| t.id == treatment_id)
    }
}

impl Treatment {
    /// Create a new treatment with no payments.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            description: description.into(),
            payments: Vec::new(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn total_paid(&self) -> f64 {
        round_cents(self.payments.iter().map(|p| p.amount).sum())
    }
}

impl Payment {
    /// Create a payment, coercing invalid amounts to zero.
    pub fn new(data: NewPayment) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            date: data.date,
            amount: sanitize_amount(data.amount),
            description: data.description,
        }
    }
}

/// Negative or non-finite amounts become 0; everything else is rounded to cents.
pub fn sanitize_amount(amount: f64) -> f64 {
    if !amount.is_finite() || amount < 0.0 {
        return 0.0;
    }
    round_cents(amount)
}

/// Parse the run of ASCII digits at the start of `s`, ignoring the rest.
fn leading_number(s: &str) -> Option<u32> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s[..end].parse().ok()
}

pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

// =========================================================================
// Legacy shape
// =========================================================================

/// A patient as found in storage: either the current shape or the legacy
/// one with a flat `treatment` string and `payments` list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredPatient {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub is_insurance: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insurance_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treatments: Option<Vec<Treatment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treatment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payments: Option<Vec<Payment>>,
    #[serde(default)]
    pub created_at: String,
}

impl From<Patient> for StoredPatient {
    fn from(patient: Patient) -> Self {
        Self {
            id: patient.id,
            name: patient.name,
            phone: patient.phone,
            birth_date: patient.birth_date,
            is_insurance: patient.is_insurance,
            insurance_number: patient.insurance_number,
            treatments: Some(patient.treatments),
            treatment: None,
            payments: None,
            created_at: patient.created_at,
        }
    }
}

impl StoredPatient {
    /// Whether migration would synthesize a treatment for this record.
    pub fn needs_migration(&self) -> bool {
        let has_treatments = self.treatments.as_ref().is_some_and(|t| !t.is_empty());
        let has_legacy_text = self
            .treatment
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());
        let has_legacy_payments = self.payments.as_ref().is_some_and(|p| !p.is_empty());
        !has_treatments && (has_legacy_text || has_legacy_payments)
    }
}

/// Convert a stored record into the current shape.
///
/// When `treatments` is empty or absent and legacy data exists, exactly one
/// treatment is synthesized from it, inheriting the patient's creation time.
/// Its ID is derived from the patient ID so repeated loads of the same
/// legacy record agree. Records already carrying treatments pass through.
pub fn migrate_patient(stored: StoredPatient) -> Patient {
    let needs_migration = stored.needs_migration();
    let treatments = if needs_migration {
        vec![Treatment {
            id: format!("legacy-{}", stored.id),
            description: stored.treatment.unwrap_or_default(),
            payments: stored.payments.unwrap_or_default(),
            created_at: stored.created_at.clone(),
        }]
    } else {
        stored.treatments.unwrap_or_default()
    };
    let treatments = treatments.into_iter().map(sanitize_treatment).collect();

    Patient {
        id: stored.id,
        name: stored.name,
        phone: stored.phone,
        birth_date: stored.birth_date,
        is_insurance: stored.is_insurance,
        insurance_number: stored.insurance_number,
        treatments,
        created_at: stored.created_at,
    }
}

fn sanitize_treatment(mut treatment: Treatment) -> Treatment {
    for payment in &mut treatment.payments {
        payment.amount = sanitize_amount(payment.amount);
    }
    treatment
}

/// Deserialize a patient list in either shape, migrating legacy records.
pub fn deserialize_patients<'de, D>(deserializer: D) -> Result<Vec<Patient>, D::Error>
where
    D: Deserializer<'de>,
{
    let stored = Vec::<StoredPatient>::deserialize(deserializer)?;
    Ok(stored.into_iter().map(migrate_patient).collect())
}
