//! Service layer: policy around the store.
//!
//! [`Scheduler`] owns expression/task policy (planning, operation
//! durations, ownership checks, the expiry sweep); [`Accounts`] owns
//! registration and login. Both translate store errors into the
//! user-facing [`ServiceError`] kinds consumed by the transports.

mod accounts;
mod error;
mod scheduler;

pub use accounts::Accounts;
pub use error::ServiceError;
pub use scheduler::Scheduler;
