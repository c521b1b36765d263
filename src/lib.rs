//! ARBWATCH — Cross-Exchange Crypto Arbitrage Monitor
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry points.

pub mod config;
pub mod types;
pub mod exchanges;
pub mod engine;
pub mod notify;
pub mod storage;
pub mod dashboard;
pub mod backtest;
