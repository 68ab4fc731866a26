//! Quality-gate services: SonarQube client, resolution, caching and
//! webhook-driven waiting.

pub mod build_registry;
pub mod legacy_resolver;
pub mod project_resolver;
pub mod protocol;
pub mod quality_gate_waiter;
pub mod resolution_cache;
pub mod transport;
pub mod webhook_service;
pub mod ws_client;
