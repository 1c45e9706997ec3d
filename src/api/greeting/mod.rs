//! The greeting feature.

pub mod greeting_api;
