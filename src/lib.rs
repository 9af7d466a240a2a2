//! Toto Bot
//!
//! A pari-mutuel betting ledger for group chats: members create polls, stake
//! play-money on outcomes, and split the pool when a poll is settled. Served
//! over a Telegram bot and an HTTP API for the companion mini-app.
//!
//! ## Architecture
//!
//! ```text
//! Telegram listener ─┐
//!                    ├→ CommandHandler ─┐
//! Mini-app API ──────┘                  ├→ Accounts / PollEngine / ChestShop
//! Deadline sweep ────────────────────────┘            ↓
//!                                              SQLite ledger
//! ```
//!
//! All balance mutations go through single-writer SQLite transactions; the
//! surfaces above never touch the ledger directly.

pub mod account;
pub mod chests;
pub mod config;
pub mod error;
pub mod notify;
pub mod polls;
pub mod rating;
pub mod scheduler;
pub mod server;
pub mod storage;
pub mod telegram;
pub mod types;

#[cfg(test)]
mod config_tests;
#[cfg(test)]
mod ledger_tests;
