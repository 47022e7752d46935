//! RMA Daemon - workflow engine for return merchandise authorization cases
//!
//! Owns the case store, drives stage transitions through the shared workflow
//! core, sweeps for SLA breaches, and serves the HTTP API that rmactl and
//! site integrations talk to.

pub mod engine;
pub mod notifier;
pub mod routes;
pub mod server;
pub mod store;
pub mod sweeper;
