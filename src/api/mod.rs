//! The read-only HTTP API for browsing the loaded CTD tables.

pub mod route;
