//! pod-alert: watches a trading terminal's alert grid, resolves each alert's
//! event id from the network traffic its click triggers, and forwards the
//! enriched record to an HTTP sink.

pub mod audit;
pub mod cli;
pub mod config;
pub mod extraction;
pub mod forward;
pub mod live;
pub mod renderer;
