//! Cycle-accurate functional simulation for synchronous digital designs,
//! plus the cooperative, fork/join test-harness scheduler layered on top of
//! it. See `SPEC_FULL.md` in the repository root for the full component
//! breakdown; each module below corresponds to one of its sections.

pub mod access;
pub mod backend;
pub mod config;
pub mod error;
pub mod ids;
pub mod sched;
pub mod sim;
pub mod simulator;
pub mod storage;
pub mod telemetry;

pub use error::{SimError, SimResult};
