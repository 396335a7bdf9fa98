//! Middleware adapters for the extraction engine.

pub mod adapter;
