//! Maintenance tracking for biomedical-equipment service teams: accounts
//! with `client` and `staff` roles, owner-scoped job cards and service
//! orders, equipment manuals and a manual-backed Q&A assistant.

pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware_layer;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod validation;
