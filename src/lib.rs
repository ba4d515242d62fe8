// Core infrastructure modules
pub mod config;
pub mod core;

// Execution bridge
pub mod conn;
pub mod executor;
pub mod query;
pub mod registry;
pub mod resultset;

// Backends
pub mod memstore;
pub mod sqlite;

// Serving
pub mod auth;
pub mod console;
pub mod server;
pub mod session;

#[cfg(test)]
#[macro_use]
mod test_utils;

#[cfg(test)]
mod integration_tests;
