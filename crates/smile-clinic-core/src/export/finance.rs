//! Monthly finance report over treatment payments.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{round_cents, Patient};

/// One payment line in the report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinanceEntry {
    pub patient_id: String,
    pub patient_name: String,
    pub treatment: String,
    /// Payment date (`YYYY-MM-DD`)
    pub date: String,
    pub amount: f64,
    pub description: String,
}

/// Payments received in one calendar month.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinanceReport {
    pub year: i32,
    /// Month, 1-12
    pub month: u32,
    /// Entries ascending by date
    pub entries: Vec<FinanceEntry>,
    pub total: f64,
}

impl FinanceReport {
    /// Collect every payment dated inside the month across all treatments.
    ///
    /// Payments whose date does not parse are left out.
    pub fn for_month(patients: &[Patient], year: i32, month: u32) -> Self {
        let mut entries: Vec<FinanceEntry> = patients
            .iter()
            .flat_map(|patient| {
                patient.treatments.iter().flat_map(move |treatment| {
                    treatment.payments.iter().map(move |payment| (patient, treatment, payment))
                })
            })
            .filter(|(_, _, payment)| in_month(&payment.date, year, month))
            .map(|(patient, treatment, payment)| FinanceEntry {
                patient_id: patient.id.clone(),
                patient_name: patient.name.clone(),
                treatment: treatment.description.clone(),
                date: payment.date.clone(),
                amount: payment.amount,
                description: payment.description.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.date.cmp(&b.date));

        let total = round_cents(entries.iter().map(|e| e.amount).sum());
        Self {
            year,
            month,
            entries,
            total,
        }
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV format.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        // Header
        csv.push_str("date,patient_id,patient_name,treatment,description,amount\n");

        // Lines
        for entry in &self.entries {
            csv.push_str(&format!(
                "{},{},{},{},{},{:.2}\n",
                escape_csv(&entry.date),
                escape_csv(&entry.patient_id),
                escape_csv(&entry.patient_name),
                escape_csv(&entry.treatment),
                escape_csv(&entry.description),
                entry.amount,
            ));
        }

        csv
    }
}

fn in_month(date: &str, year: i32, month: u32) -> bool {
    use chrono::Datelike;

    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d.year() == year && d.month() == month)
        .unwrap_or(false)
}

/// Escape a field for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
