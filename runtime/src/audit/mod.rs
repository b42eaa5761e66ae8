//! Append-only record of forwarded alerts.

pub mod logger;
