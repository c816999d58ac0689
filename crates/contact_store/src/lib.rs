//! # Contact Store
//!
//! This crate reads, validates and writes the contact-data file that holds
//! the location postal codes, the booking code and the contact details of
//! the person being booked.

/// Contact-data model, field access and validation
mod types;
pub use types::*;

/// Loading and saving the contact-data file
mod store;
pub use store::*;
