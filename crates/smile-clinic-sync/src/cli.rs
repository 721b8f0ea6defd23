//! `clinic-sync` command line interface.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use smile_clinic_core::export::{import_backup, Backup, FinanceReport};
use smile_clinic_core::{Database, DomainStore};

use crate::config::SyncConfig;
use crate::service::SyncService;
use crate::synced::{force_pull, force_push, sync_report};
use crate::transport::HttpTransport;

/// Clinic dataset sync and backup tool
#[derive(Parser, Debug)]
#[command(name = "clinic-sync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the local clinic database
    #[arg(long, global = true, default_value = "clinic.db", env = "CLINIC_DB")]
    pub db: PathBuf,

    /// Path to the sync configuration file
    #[arg(long, global = true, env = "CLINIC_SYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level when RUST_LOG is not set (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Send the local dataset to the server now
    Push,

    /// Replace the local dataset with the server copy
    Pull,

    /// Show local counts and sync bookkeeping
    Status,

    /// Write a backup file (defaults to backup-clinica-<date>.json)
    ExportBackup { file: Option<PathBuf> },

    /// Replace the local dataset with a backup file
    ImportBackup { file: PathBuf },

    /// Print the payments received in a month as CSV
    Finance {
        year: i32,
        #[arg(value_parser = clap::value_parser!(u32).range(1..=12))]
        month: u32,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let mut store = open_store(&self.db)?;

        match self.command {
            Commands::Push => {
                let service = connect(self.config.as_deref())?;
                if !force_push(&store, &service).await {
                    bail!("push to {} failed", service.config().sync_url());
                }
                println!("Pushed {} patients", store.patients().len());
            }
            Commands::Pull => {
                let service = connect(self.config.as_deref())?;
                if !force_pull(&mut store, &service).await {
                    bail!("pull from {} failed", service.config().sync_url());
                }
                println!(
                    "Pulled {} patients, {} appointments",
                    store.patients().len(),
                    store.appointments().len()
                );
            }
            Commands::Status => {
                let report = sync_report(&store)?;
                println!("Patients:      {}", report.patients);
                println!("Appointments:  {}", report.appointments);
                println!(
                    "Last push:     {}",
                    report.last_push_at.as_deref().unwrap_or("never")
                );
                println!(
                    "Last pull:     {}",
                    report.last_pull_at.as_deref().unwrap_or("never")
                );
                println!(
                    "Unsynced:      {}",
                    if report.unsynced_changes { "yes" } else { "no" }
                );
            }
            Commands::ExportBackup { file } => {
                let backup = Backup::from_snapshot(store.snapshot());
                let path = file.unwrap_or_else(|| PathBuf::from(backup.file_name()));
                std::fs::write(&path, backup.to_json()?)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Backup written to {}", path.display());
            }
            Commands::ImportBackup { file } => {
                let json = std::fs::read_to_string(&file)
                    .with_context(|| format!("failed to read {}", file.display()))?;
                import_backup(&mut store, &json)
                    .with_context(|| format!("invalid backup {}", file.display()))?;
                println!("Imported {} patients", store.patients().len());
            }
            Commands::Finance { year, month } => {
                let report = FinanceReport::for_month(store.patients(), year, month);
                print!("{}", report.to_csv());
            }
        }

        Ok(())
    }
}

fn open_store(path: &Path) -> anyhow::Result<DomainStore> {
    let db = Database::open(path)
        .with_context(|| format!("failed to open database {}", path.display()))?;
    Ok(DomainStore::load(db))
}

fn connect(config_path: Option<&Path>) -> anyhow::Result<SyncService> {
    let config = match config_path {
        Some(path) => SyncConfig::from_toml_file(path)?,
        None => SyncConfig::from_env()?,
    };
    let transport = HttpTransport::new(&config)?;
    tracing::info!(url = transport.url(), "Connecting to sync server");
    Ok(SyncService::new(Arc::new(transport), config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_push_with_globals() {
        let cli = Cli::parse_from(["clinic-sync", "push", "--db", "/tmp/x.db", "--config", "sync.toml"]);
        assert_eq!(cli.command, Commands::Push);
        assert_eq!(cli.db, PathBuf::from("/tmp/x.db"));
        assert_eq!(cli.config, Some(PathBuf::from("sync.toml")));
    }

    #[test]
    fn test_parse_export_backup_default_file() {
        let cli = Cli::parse_from(["clinic-sync", "export-backup"]);
        assert_eq!(cli.command, Commands::ExportBackup { file: None });
    }

    #[test]
    fn test_parse_finance() {
        let cli = Cli::parse_from(["clinic-sync", "finance", "2024", "6"]);
        assert_eq!(cli.command, Commands::Finance { year: 2024, month: 6 });
    }

    #[test]
    fn test_finance_rejects_bad_month() {
        assert!(Cli::try_parse_from(["clinic-sync", "finance", "2024", "13"]).is_err());
    }

    #[tokio::test]
    async fn test_backup_commands_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let source_db = dir.path().join("source.db");
        let target_db = dir.path().join("target.db");
        let backup = dir.path().join("backup.json");

        {
            let mut store = open_store(&source_db).unwrap();
            store.add_patient(smile_clinic_core::NewPatient::new("Ana", "11999990000"));
        }

        Cli {
            db: source_db.clone(),
            config: None,
            log_level: "info".into(),
            command: Commands::ExportBackup { file: Some(backup.clone()) },
        }
        .run()
        .await
        .unwrap();

        Cli {
            db: target_db.clone(),
            config: None,
            log_level: "info".into(),
            command: Commands::ImportBackup { file: backup },
        }
        .run()
        .await
        .unwrap();

        let source = open_store(&source_db).unwrap();
        let target = open_store(&target_db).unwrap();
        assert_eq!(target.snapshot(), source.snapshot());
    }

    #[tokio::test]
    async fn test_import_rejects_invalid_backup() {
        let dir = tempfile::tempdir().unwrap();
        let backup = dir.path().join("backup.json");
        std::fs::write(&backup, r#"{"patients": []}"#).unwrap();

        let result = Cli {
            db: dir.path().join("clinic.db"),
            config: None,
            log_level: "info".into(),
            command: Commands::ImportBackup { file: backup },
        }
        .run()
        .await;
        assert!(result.is_err());
    }
}
