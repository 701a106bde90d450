//! Environment setup builders for testing Plate flows.
//!
//! Wires a real message bus and locator to a loopback navigation host so
//! scenario tests can drive flows end to end.

mod flow_services;

// Re-export all builders for easy access
pub use flow_services::*;
