//! Core data model types: the parsed message, recipients, and addresses.

pub mod address;
pub mod message;
