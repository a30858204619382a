// Shared library for the article publication api and scheduler binaries

pub mod bootstrap;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod publisher;
pub mod schedule;
pub mod store;
pub mod telemetry;
