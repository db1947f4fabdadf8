//! services/studio/src/lib.rs
//!
//! The studio service: adapters for the hosted backend and the speech
//! provider, configuration, and the HTTP surface over the core view models.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
