//! # Validated — Feedback Marketplace Settlement Backend
//!
//! Core workflow for the "Validated by Users" marketplace: once a feedback
//! round's deadline passes, count eligible entries, extend the round if its
//! engagement guarantee is unmet, deterministically split the prize pool
//! across ranked winners, and drive payouts with per-winner failure
//! tracking.
//!
//! ## Components
//!
//! - [`db`] — PostgreSQL storage layer; `db::entries` is the entry ledger
//!   (the single home of the prize-eligibility rule and the boost guards).
//! - [`guarantee`] — the guarantee monitor sweep: bounded deadline
//!   extensions for under-subscribed rounds.
//! - [`selection`] — idempotent winner selection with the fixed prize-split
//!   table and exact decimal arithmetic.
//! - [`payout`] — the payout settler over an injected transfer provider.
//! - [`api`] — Axum HTTP surface: the three settlement operations, boost,
//!   retry, round inspection, health probes, and Prometheus metrics.
//!
//! All operations are stateless request/response units invoked over HTTP or
//! by a scheduler; concurrency control lives in the database (conditional
//! updates, row locks, uniqueness constraints).

pub mod api;
pub mod db;
pub mod error;
pub mod guarantee;
pub mod payout;
pub mod prom_metrics;
pub mod selection;
