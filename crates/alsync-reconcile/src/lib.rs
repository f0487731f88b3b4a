//! alsync-reconcile
//!
//! Alarm reconciliation core.
//!
//! Architectural decisions:
//! - The registry holds exactly the ids the scheduler was told to add and not yet told to remove
//! - One record yields at most one scheduler notification
//! - Records are processed in delivered order; one bad record never aborts a snapshot
//! - Scheduler failures propagate; the registry is only mutated after a successful call
//!
//! No IO. The scheduler is reached through the [`AlarmScheduler`] trait.

mod engine;
mod registry;
pub mod ring_time;
mod scheduler;
pub mod simulate;
mod types;

pub use engine::Reconciler;
pub use registry::AlarmRegistry;
pub use ring_time::{FallbackZone, RingTimeError, RingTimeParser};
pub use scheduler::{AlarmScheduler, SchedulerError};
pub use simulate::{
    schedule_simulated_alarms, schedule_simulated_alarms_now, SimulatedAlarm, SIMULATED_ALARM_ID,
};
pub use types::*;
