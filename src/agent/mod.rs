//! Agent: the stateless compute side.
//!
//! [`client`] wraps the dispatch gRPC client, [`compute`] evaluates leased
//! tasks (honoring the declared operation deadline), and [`pool`] runs the
//! fixed-width worker loop driving both.

pub mod client;
pub mod compute;
pub mod pool;

pub use client::{AgentError, DispatchClient};
