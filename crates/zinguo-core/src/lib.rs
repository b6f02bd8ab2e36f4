//! State synchronization between a Zinguo bath heater and its consumers.
//!
//! This crate sits on top of `zinguo-api` and owns everything stateful:
//!
//! - **[`Coordinator`]** -- follows one device. [`refresh()`](Coordinator::refresh)
//!   fetches and normalizes its state, [`start()`](Coordinator::start) adds a
//!   periodic refresh task, and
//!   [`send_control_command()`](Coordinator::send_control_command) performs
//!   the merged write: cached switch state + requested changes, token-expiry
//!   retry, optimistic update, confirming refresh.
//!
//! - **[`ChangeSet`]** -- a partial write, validated and classified as a
//!   switch or parameter command, turned into a full vendor payload by
//!   [`command::payload::build`].
//!
//! - **Domain model** ([`model`]) -- [`DeviceState`] with plain booleans.
//!   Vendor switch codes (1 = on, 2 = off) exist only in [`convert`].

pub mod command;
pub mod config;
pub mod convert;
pub mod coordinator;
pub mod error;
pub mod model;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{ChangeSet, CommandKind, ControlKey, ControlValue};
pub use config::{CoordinatorConfig, TlsVerification};
pub use coordinator::{Coordinator, MAX_SEND_ATTEMPTS, RefreshPhase, StateUpdate, UpdateKind};
pub use error::CoreError;
pub use model::{
    AutoCloseSchedule, DeviceState, FanPreset, LightAutoClose, ScreenProtection, Switch,
};

pub use zinguo_api::DeviceSummary;
