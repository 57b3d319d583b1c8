//! # Diakit Core Library
//!
//! This library provides the core business logic for Diakit, a personal
//! inventory and usage tracker for diabetes supplies. It implements a
//! CLI-first philosophy where all operations are available via a
//! standalone CLI binary, with any GUI shell being a thin layer over the
//! same core library.
//!
//! ## Architecture
//!
//! - **Records**: supplies, replacement timers, and in-use items stored
//!   as JSON blobs in local SQLite
//! - **Derived state**: pure calculators that turn records plus the
//!   current instant into countdown/warning fields, recomputed on read
//! - **Reminders**: a policy engine that recomputes due alerts after
//!   every record change and drives a pluggable notification delivery
//!   seam, with persisted dedup tracking for immediate alerts
//! - **History**: a capped append-only log of user actions
//!
//! ## Key Components
//!
//! - [`SupplyStore`]: record CRUD and in-use lifecycle
//! - [`ReminderEngine`]: due-alert computation and scheduling
//! - [`SentAlerts`]: dedup tracking with staleness-based reset
//! - [`Database`]: SQLite-backed kv and history persistence

pub mod error;
pub mod history;
pub mod notify;
pub mod storage;
pub mod supply;

pub use error::{CoreError, StorageError, ValidationError};
pub use history::{HistoryEvent, HistoryEventKind, HistoryLog, HistoryMetadata};
pub use notify::{
    AlertKey, DueAlert, NoopDelivery, NotificationDelivery, ReminderEngine, ReminderSettings,
    SentAlerts, SettingsPatch, Trigger,
};
pub use storage::Database;
pub use supply::{
    InUseItem, InUseStatus, ItemDetails, Supply, SupplyCategory, SupplyDraft, SupplyPatch,
    SupplyStore, SupplyUpdate, TimerDraft, TimerKind, TimerPatch, TimerStatus, UsageTimer,
    VolumeUnit,
};
