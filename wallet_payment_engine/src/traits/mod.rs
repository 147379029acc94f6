//! # Database management and control.
//!
//! This module defines the interface contracts of the wallet engine database *backends*.
//!
//! ## Accounts and the ledger
//! Every customer (students, tutors, organizations, and the platform itself) gets a wallet account. Value never moves
//! by mutating a balance; it moves by appending [`crate::db_types::LedgerEntry`] rows, from which balances are derived.
//!
//! The [`WalletLedgerDatabase`] trait owns every multi-step atomic flow: reconciling an external gateway transaction
//! into its ledger effects, materializing legacy balances, settling wallet purchases and renewing subscriptions.
//! Each of those is a single database transaction in the backend; partial effects are never visible.
//!
//! The [`AccountManagement`] trait provides read-side queries over accounts, their entries and payment history.
//!
//! [`RateProvider`] defines the seam for fetching live currency conversion rates, so that the FX policy layer can be
//! tested without the network.
mod account_management;
mod data_objects;
mod exchange_rates;
mod ledger_database;

pub use account_management::{AccountApiError, AccountManagement};
pub use data_objects::{BalanceSummary, ExpectedEffect, PurchaseResult, ReconcileOutcome, RenewalResult};
pub use exchange_rates::{ExchangeRateError, RateProvider};
pub use ledger_database::{WalletLedgerDatabase, WalletLedgerError};
