//! Wiring for the `parley` binary: environment config and the HTTP router.

pub mod app;
pub mod config;
