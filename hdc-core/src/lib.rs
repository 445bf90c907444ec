//! Core types and integration wiring for Harborough District Council bin collection sensors.

/// Config flow validating a UPRN before an entry is created.
pub mod config_flow;
/// Interval-driven, single-flight refresh coordinator.
pub mod coordinator;
/// Setup and teardown of config entries against a host context.
pub mod integration;
/// Domain models and identifiers.
pub mod model;
/// Traits describing the council API.
pub mod ports;
/// In-memory entity registry owned by the host.
pub mod registry;
/// Timestamp sensors projecting the coordinator's snapshot.
pub mod sensor;
/// JSON persistence for config entries.
pub mod store;

pub use config_flow::*;
pub use coordinator::*;
pub use integration::*;
pub use model::*;
pub use ports::*;
pub use registry::*;
pub use sensor::*;
pub use store::*;

/// Domain name the integration registers under.
pub const DOMAIN: &str = "hdc";
