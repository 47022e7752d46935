//! RMA Control - CLI client library for the RMA Workflow Engine

pub mod cli;
pub mod client;
pub mod commands;
pub mod display;
