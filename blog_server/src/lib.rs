//! HTTP server for the blog backend.
//!
//! Wraps the managers of `blog_core` in an axum router, loads configuration
//! from the environment and sets up logging and metrics.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
