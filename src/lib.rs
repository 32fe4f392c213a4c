//! papertrader — single-player simulated stock trading game.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`]. [`engine`] exposes the trading and
//! valuation services consumed by the presentation layer, and [`runtime`] hosts
//! the background quote poller and valuation timer.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod engine;
pub mod ports;
pub mod runtime;
