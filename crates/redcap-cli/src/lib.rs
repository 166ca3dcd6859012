//! Library surface of the dashboard CLI.
//!
//! The binary wires argument parsing and rendering around these modules;
//! integration tests drive the pipeline directly.

pub mod logging;
pub mod pipeline;
