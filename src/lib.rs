//! De-identification dashboard — session orchestration and resource sync core.

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod mutations;
pub mod onboarding;
pub mod resources;
pub mod routing;
