//! Backup and finance exports.

mod backup;
mod finance;

pub use backup::*;
pub use finance::*;
