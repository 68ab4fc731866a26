//! SonarQube quality-gate resolution for CI builds.
//!
//! Builds record the analyses they submitted to SonarQube. This crate turns
//! those records into displayable project information (quality-gate status,
//! Compute Engine task state, dashboard links), caches the results per build,
//! and reacts to SonarQube webhooks.

pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod routes;
pub mod services;
