//! Scan orchestration domain: models, pure services, and policies
pub mod domain;
pub mod policies;
pub mod services;
