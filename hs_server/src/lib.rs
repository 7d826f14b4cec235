//! HTTP server for the Hydraulisc blog's identity and admission layer.

pub mod api;
pub mod config;
pub mod logging;
pub mod maintenance;
pub mod metrics;
pub mod reload;
