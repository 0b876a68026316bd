#![forbid(unsafe_code)]

mod engine;
mod error;
mod migration;
mod operation;
mod session;

pub use engine::*;
pub use error::*;
pub use migration::*;
pub use operation::*;
pub use pgshift_store::{MigrationRecord, MigrationStatus, StateStore, StoreError};
pub use session::*;
