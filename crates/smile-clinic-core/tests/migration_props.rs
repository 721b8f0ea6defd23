//! Legacy patient migration properties.

use proptest::prelude::*;
use smile_clinic_core::models::{migrate_patient, Payment, StoredPatient, Treatment};
use smile_clinic_core::Snapshot;

fn payment() -> impl Strategy<Value = Payment> {
    ("[a-f0-9]{8}", 1u32..=28, 0u32..100_000).prop_map(|(id, day, cents)| Payment {
        id,
        date: format!("2023-05-{day:02}"),
        amount: f64::from(cents) / 100.0,
        description: String::new(),
    })
}

fn treatment() -> impl Strategy<Value = Treatment> {
    ("[a-f0-9]{8}", "[A-Za-z ]{1,20}", prop::collection::vec(payment(), 0..4)).prop_map(
        |(id, description, payments)| Treatment {
            id,
            description,
            payments,
            created_at: "2023-01-01T00:00:00.000Z".into(),
        },
    )
}

fn stored(
    treatments: Option<Vec<Treatment>>,
    treatment: Option<String>,
    payments: Option<Vec<Payment>>,
) -> StoredPatient {
    StoredPatient {
        id: "p-1".into(),
        name: "Ana".into(),
        phone: "11999990000".into(),
        birth_date: None,
        is_insurance: false,
        insurance_number: None,
        treatments,
        treatment,
        payments,
        created_at: "2023-01-01T00:00:00.000Z".into(),
    }
}

proptest! {
    #[test]
    fn prop_legacy_becomes_single_treatment(
        text in "[A-Za-z]{1,20}",
        payments in prop::collection::vec(payment(), 0..5),
    ) {
        let patient = migrate_patient(stored(None, Some(text.clone()), Some(payments.clone())));

        prop_assert_eq!(patient.treatments.len(), 1);
        prop_assert_eq!(&patient.treatments[0].description, &text);
        prop_assert_eq!(&patient.treatments[0].payments, &payments);
        prop_assert_eq!(&patient.treatments[0].created_at, &patient.created_at);
    }

    #[test]
    fn prop_current_records_pass_through(
        treatments in prop::collection::vec(treatment(), 1..4),
        legacy_text in proptest::option::of("[A-Za-z]{1,10}"),
    ) {
        let patient = migrate_patient(stored(Some(treatments.clone()), legacy_text, None));
        prop_assert_eq!(patient.treatments, treatments);
    }

    #[test]
    fn prop_migration_is_idempotent(
        text in "[A-Za-z]{1,20}",
        payments in prop::collection::vec(payment(), 0..5),
    ) {
        let once = migrate_patient(stored(None, Some(text), Some(payments)));
        let twice = migrate_patient(StoredPatient::from(once.clone()));
        prop_assert_eq!(&twice, &once);

        // Serialized and re-read, as on every load
        let snapshot = Snapshot { patients: vec![once.clone()], ..Default::default() };
        let json = serde_json::to_string(&snapshot).unwrap();
        let reloaded: Snapshot = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(reloaded.patients, vec![once]);
    }
}
