//! RMA Common - Shared types for the RMA workflow engine
//!
//! The typed heart of the engine: case records, the stage state machine,
//! workflow rules, and the wire contract. Everything here is pure; all
//! persistence and notification happens in rmad around these types.

pub mod case;
pub mod config;
pub mod error;
pub mod rules;
pub mod wire;
pub mod workflow;

pub use case::*;
pub use config::*;
pub use error::*;
pub use rules::*;
pub use wire::*;
