//! Core engine — the poll → detect → execute loop.

pub mod detector;
pub mod executor;
pub mod feed;
