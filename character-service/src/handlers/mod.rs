//! HTTP handlers for the character service.

pub mod generation;
pub mod health;

pub use generation::{generate_character, generate_expressions};
pub use health::{health_check, metrics, readiness_check, service_status};
