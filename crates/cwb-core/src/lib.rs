//! Core domain + application logic for the coffee-shop WhatsApp assistant.
//!
//! This crate is intentionally framework-agnostic. Twilio / Clover / OpenAI
//! live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod intent;
pub mod logging;
pub mod ports;
pub mod processor;
pub mod refresh;
pub mod respond;
pub mod sales;
pub mod store;

pub use errors::{Error, Result};
