//! Integration tests for the Glou backend.
//!
//! ## Test Modules
//!
//! - **support**: in-memory state, request builders and response helpers
//! - **middleware_tests**: the stage chains end to end through the real router
//! - **api_tests**: setup, accounts, inventory, settings and export flows
//! - **db_tests**: schema creation and alert generation against SQLite
//!
//! Individual test modules can be run with:
//! ```bash
//! cargo test middleware_tests
//! ```

mod support;

mod middleware_tests;
