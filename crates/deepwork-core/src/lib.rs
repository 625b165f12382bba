//! # DeepWork Core Library
//!
//! Business logic for the DeepWork session tracker. Every operation is
//! available to the standalone `deepwork` CLI; any other front end is a thin
//! rendering layer over the same engine.
//!
//! ## Architecture
//!
//! - **Session lifecycle**: a pure state machine over one focus session
//!   (`scheduled -> active -> paused -> completed/interrupted/abandoned/overdue`)
//!   computing elapsed time, progress and over-schedule annotations
//! - **Controller**: drives the lifecycle against a repository with optimistic
//!   apply, reconcile-or-rollback and an in-flight guard per session
//! - **Timer**: a cooperative countdown driver plus a tokio ticker whose
//!   handle stops the periodic source on drop
//! - **Repository**: the persistence boundary; an HTTP client for the REST
//!   backend and an in-memory implementation
//! - **Pause store**: locally measured pause intervals kept between runs
//! - **Config**: TOML settings loaded at startup and saved on change
//!
//! ## Key Components
//!
//! - [`SessionLifecycle`]: session state machine
//! - [`SessionEngine`] / [`SessionController`]: command execution
//! - [`CountdownTimer`]: per-session tick logic
//! - [`SessionRepository`]: trait for the backend
//! - [`Config`]: application configuration management

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod pause_store;
pub mod repository;
pub mod session;
pub mod stats;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, ScheduleElapsedPolicy};
pub use engine::{EnginePolicy, SessionController, SessionEngine};
pub use error::{ConfigError, CoreError, RepositoryError, Result, ValidationError};
pub use events::Event;
pub use pause_store::{FilePauseStore, InMemoryPauseStore, PauseStore};
pub use repository::{
    HttpSessionRepository, InMemorySessionRepository, SessionPatch, SessionRepository,
};
pub use session::{
    BackendTimezone, HistoryEntry, Interruption, NewSession, PauseInterval, Session,
    SessionCommand, SessionLifecycle, SessionSnapshot, SessionStatus, StatusColor,
};
pub use stats::SessionStats;
pub use timer::{CountdownTimer, TickerHandle, TimerTick};
