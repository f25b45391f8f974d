//! Audit logging adapters

pub mod jsonl_sink;

pub use jsonl_sink::JsonlEventSink;
