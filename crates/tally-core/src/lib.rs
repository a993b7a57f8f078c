//! tally-core library.
//!
//! T&M tickets, the change orders they are billed under, and the
//! reconciliation reports built over both.
//!
//! - [`store::TicketStore`] writes tickets and projects.
//! - [`engine::ChangeOrderEngine`] owns change order status, amounts, and
//!   ticket membership.
//! - [`report`] derives variance, rollups, and value-at-risk without writing.
//! - [`capture`] turns extractor JSON into tickets.
//!
//! # Conventions
//!
//! - **Errors**: Domain operations return [`error::Result`]; setup paths
//!   (opening the database, reading config) use `anyhow::Result`.
//! - **Logging**: `tracing` macros; `info!` on state changes, `warn!` on
//!   refused operations.
//! - **Money**: `rust_decimal::Decimal`, stored as text.

pub mod capture;
pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod model;
pub mod report;
pub mod store;
