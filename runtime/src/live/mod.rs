//! Live watching of the terminal page: observer, sniffer, correlator,
//! deduplication and the pipeline that strings them together.

pub mod agent;
pub mod correlate;
pub mod dedup;
pub mod observer;
pub mod pipeline;
pub mod sniffer;
pub mod throttle;
