//! A web service with a single greeting endpoint, built on axum.

pub mod api;
pub mod app;
pub mod infra;
