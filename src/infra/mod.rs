//! The infrastructure module.
//!
//! Contains common modules that help with non-functional requirements.

pub mod config;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod openapi;
pub mod shutdown;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;
