//! BOB — Autonomous Blackjack Agent decision core
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod counting;
pub mod strategy;
pub mod learning;
pub mod storage;
pub mod engine;
pub mod dashboard;
