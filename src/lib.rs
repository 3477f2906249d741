//! # fieldval
//!
//! A local-first field-assessment capture and sync tool for property
//! valuation. Assessment records (multi-section valuation forms with image
//! references) are stored in a local SQLite database and pushed to a remote
//! document store on demand, with local image paths normalized to uploaded
//! URLs along the way.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ JSON capture │──▶│ LocalRecord  │──▶│ SyncManager    │
//! │ (import)     │   │ Store (SQLite)│  │ image normalize│
//! └──────────────┘   └──────────────┘   └───────┬───────┘
//!                                               │
//!                              ┌────────────────┴───────┐
//!                              ▼                        ▼
//!                       ┌────────────┐          ┌────────────┐
//!                       │ Document   │          │ File       │
//!                       │ Store (HTTP)│         │ Store (HTTP)│
//!                       └────────────┘          └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Assessment record and section types |
//! | [`store`] | Local record store and persisted settings |
//! | [`remote`] | Remote document/file store traits and HTTP adapter |
//! | [`sync`] | Sync manager and image normalization |
//! | [`progress`] | Sync progress reporting |
//! | [`drawing`] | Floor-plan drawing model and serialization |
//! | [`records`] | Record-level CLI commands |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod drawing;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod records;
pub mod remote;
pub mod store;
pub mod sync;
