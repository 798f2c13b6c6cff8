//! Audit workflow on top of the data store.

pub mod audit;
pub mod user;

pub use audit::AuditService;
pub use user::{JoinCheck, UserService};
