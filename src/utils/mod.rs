//! Serde helpers.

pub mod time;
