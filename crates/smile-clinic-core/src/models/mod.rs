//! Domain models for the clinic.

mod appointment;
mod patient;
mod settings;
mod snapshot;

pub use appointment::*;
pub use patient::*;
pub use settings::*;
pub use snapshot::*;
