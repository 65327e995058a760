//! # Glou Backend Library
//!
//! Glou is a self-hosted cellar manager for wines and spirits. This crate holds the
//! REST backend: accounts and sessions, the first-run setup wizard, the wine inventory
//! with its caves and tasting history, drinking-window alerts and the admin surface.
//!
//! ## Architecture
//!
//! The application is built using:
//! - **Axum**: HTTP server, routing and per-route middleware chains
//! - **SQLx**: Asynchronous database operations with SQLite
//! - **Tokio**: Async runtime for the server and the alert generator
//! - **Serde**: Serialization/deserialization for JSON APIs
//!
//! ## Core Components
//!
//! - [`config`]: Application configuration management
//! - [`db`]: Database schema initialization
//! - [`error`]: Centralized error handling and HTTP error responses
//! - [`session`]: Signed session tokens and the session/CSRF cookies
//! - [`middleware`]: The request stages and the chain presets that order them
//! - [`routes`]: HTTP API endpoint handlers
//! - [`server`]: Route registration
//! - [`store`]: Queries, one module per table
//! - [`alerts`]: Periodic generation of stock and drinking-window alerts
//! - [`state`]: Shared application state

pub mod alerts;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod notifier;
pub mod password;
pub mod routes;
pub mod server;
pub mod session;
pub mod state;
pub mod store;

#[cfg(test)]
mod tests;
