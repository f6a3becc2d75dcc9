//! Live decoder and viewer for device trace reports.
//!
//! Reports arrive over a server-sent event feed as batches of fixed-size
//! 12-byte records. They are decoded into [`types::LogEntry`] values,
//! appended to a [`trace_log::TraceLog`] and can then be filtered by layer
//! and level and searched by event id or payload bytes.

pub mod config;
pub mod console;
pub mod decoder;
pub mod error;
pub mod feed;
pub mod filter;
pub mod ingest;
pub mod monitor;
pub mod search;
pub mod sse;
pub mod trace_log;
pub mod types;
pub mod view;
