//! Loaders for the endpoint, model and room registries.
//!
//! Every registry is a plain JSON document owned by the operator. A missing or
//! malformed file never fails the caller: loaders log the reason and hand back
//! `None`, and the command that actually needs the data reports it.

pub mod config;
pub mod endpoints;
mod json;
pub mod models;
pub mod rooms;

pub use config::{ConfigOverrides, LabConfig};
pub use endpoints::{load_endpoints, EndpointConfig, EndpointKind};
pub use models::{load_models, ModelMetadata, ModelRegistry, ModelSpeeds};
pub use rooms::{ResolvedRoom, RoomConfig, RoomDirectory};
