// src/core/mod.rs

// The `core` module is the scan engine: it knows nothing about terminals or
// HTTP. Front-ends open sessions through the `Orchestrator` and read back
// job states and reports.

/// Address classification (URL / IPv4 / IPv6 / empty / invalid).
pub mod address;

/// The job catalogue and the `Probe` trait every check implements.
pub mod catalogue;

pub mod error;

/// Runs a single probe behind the remote deadline.
pub mod executor;

/// Data structures shared across the engine: addresses, statuses, outcomes, job states.
pub mod models;

pub mod orchestrator;

/// Built-in probes backing the default catalogue.
pub mod probes;

/// Progress statistics and the human-facing summary.
pub mod report;

pub mod retry;

pub mod store;

pub mod timeout;

pub mod watchdog;
