//! Offline replay over recorded price history.

pub mod runner;
