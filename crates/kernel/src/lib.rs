//! Canopy Kernel Library
//!
//! This library exposes the content tree core and the HTTP application for
//! integration testing. The main entry point for running the server is the
//! `canopy` binary.

pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod permissions;
pub mod routes;
pub mod search;
pub mod services;
pub mod sites;
pub mod state;
pub mod store;

pub use config::Config;
pub use state::AppState;
