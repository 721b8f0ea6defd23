//! Backup round-trip tests.

use smile_clinic_core::db::Database;
use smile_clinic_core::export::{export_backup, import_backup, Backup, BackupError};
use smile_clinic_core::models::{ClinicSettings, NewAppointment, NewPatient, NewPayment};
use smile_clinic_core::DomainStore;

fn populated_store() -> DomainStore {
    let mut store = DomainStore::load(Database::open_in_memory().unwrap());

    let ana = store.add_patient(NewPatient::new("Ana", "11999990000"));
    let bruno = store.add_patient(NewPatient::new("Bruno", "21988887777"));
    let canal = store.add_treatment(&ana.id, "Canal").unwrap();
    store.add_payment(
        &ana.id,
        &canal.id,
        NewPayment {
            date: "2024-06-10".into(),
            amount: 250.0,
            description: "Entrada".into(),
        },
    );
    store.add_appointment(NewAppointment::new(&ana.id, "2024-06-10", "09:00"));
    store.add_appointment(NewAppointment::new(&bruno.id, "2024-06-09", "14:30"));
    store.update_settings(ClinicSettings {
        clinic_name: "Salles Ateliê".into(),
        dentist_name: "Dra. Salles".into(),
    });
    store
}

#[test]
fn test_export_import_round_trip_through_file() {
    let source = populated_store();
    let dir = tempfile::tempdir().unwrap();

    let backup = Backup::from_snapshot(source.snapshot());
    let path = dir.path().join(backup.file_name());
    std::fs::write(&path, backup.to_json().unwrap()).unwrap();

    let mut target = DomainStore::load(Database::open_in_memory().unwrap());
    let json = std::fs::read_to_string(&path).unwrap();
    import_backup(&mut target, &json).unwrap();

    assert_eq!(target.snapshot(), source.snapshot());
}

#[test]
fn test_import_persists_to_local_store() {
    let source = populated_store();
    let json = export_backup(&source).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clinic.db");
    {
        let mut target = DomainStore::load(Database::open(&path).unwrap());
        import_backup(&mut target, &json).unwrap();
    }

    let reloaded = DomainStore::load(Database::open(&path).unwrap());
    assert_eq!(reloaded.snapshot(), source.snapshot());
}

#[test]
fn test_invalid_import_changes_nothing() {
    let mut store = populated_store();
    let before = store.snapshot();

    let err = import_backup(&mut store, r#"{"version": 1, "appointments": []}"#).unwrap_err();
    assert!(matches!(err, BackupError::MissingPatients));

    let err = import_backup(&mut store, "{").unwrap_err();
    assert!(matches!(err, BackupError::Malformed(_)));

    assert_eq!(store.snapshot(), before);
}

#[test]
fn test_import_legacy_backup_migrates() {
    let json = r#"{
        "version": 1,
        "exportedAt": "2023-12-01T10:00:00.000Z",
        "patients": [{
            "id": "p-1", "name": "Ana", "phone": "1199", "isInsurance": false,
            "treatment": "Prótese",
            "payments": [{"id": "pay-1", "date": "2023-11-20", "amount": 300, "description": ""}],
            "createdAt": "2023-01-01T00:00:00.000Z"
        }],
        "appointments": [],
        "templates": {}
    }"#;

    let mut store = DomainStore::load(Database::open_in_memory().unwrap());
    import_backup(&mut store, json).unwrap();

    let patient = store.get_patient_by_id("p-1").unwrap();
    assert_eq!(patient.treatments.len(), 1);
    assert_eq!(patient.treatments[0].description, "Prótese");
    assert_eq!(patient.total_paid(), 300.0);
    assert_eq!(store.settings(), &ClinicSettings::default());
}
