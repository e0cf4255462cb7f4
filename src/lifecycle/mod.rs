//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → every subscribed task stops → server drains connections
//!
//! Background work (tasks.rs, scheduler.rs):
//!     TaskRunner::spawn → task races the shutdown signal
//!     Scheduler::schedule / schedule_periodic → cancellable Timeout
//! ```
//!
//! # Design Decisions
//! - One broadcast channel for shutdown, subscribed before a task is spawned
//! - Periodic tasks skip missed ticks instead of bursting

pub mod scheduler;
pub mod shutdown;
pub mod signals;
pub mod tasks;

pub use scheduler::{Scheduler, Timeout};
pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
pub use tasks::TaskRunner;
