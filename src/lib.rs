//! Feedback aggregator
//!
//! HTTP service that takes feedback on model predictions and forwards each
//! record to a log collector.

pub mod config;
pub mod http;
pub mod server;
pub mod sink;
