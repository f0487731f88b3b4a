//! Synthetic alarms for manual testing.
//!
//! Two alarms are sent straight to the scheduler under one fixed id; the
//! registry is never involved. Simulation and registry-backed operation are
//! exclusive and chosen once, when the sync service is constructed.

use std::ops::Range;

use rand::Rng;
use tracing::info;

use crate::{AlarmScheduler, SchedulerError};

/// Identity shared by both simulated alarms.
pub const SIMULATED_ALARM_ID: &str = "org.alsync.Simulated";

/// Offset window (seconds from now) of the first simulated alarm.
pub const FIRST_OFFSET_SECS: Range<i64> = 30..60;

/// Offset window (seconds from now) of the second simulated alarm.
pub const SECOND_OFFSET_SECS: Range<i64> = 80..120;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulatedAlarm {
    pub id: &'static str,
    pub offset_secs: i64,
    pub epoch_seconds: i64,
}

/// Schedule the two simulated alarms relative to `now_epoch_seconds`.
///
/// The windows do not overlap, so the second alarm always fires after the
/// first.
pub fn schedule_simulated_alarms<S, R>(
    scheduler: &mut S,
    now_epoch_seconds: i64,
    rng: &mut R,
) -> Result<[SimulatedAlarm; 2], SchedulerError>
where
    S: AlarmScheduler + ?Sized,
    R: Rng,
{
    let first = rng.gen_range(FIRST_OFFSET_SECS);
    let second = rng.gen_range(SECOND_OFFSET_SECS);

    let alarms = [first, second].map(|offset_secs| SimulatedAlarm {
        id: SIMULATED_ALARM_ID,
        offset_secs,
        epoch_seconds: now_epoch_seconds + offset_secs,
    });

    for alarm in &alarms {
        scheduler.add_alarm(alarm.id, alarm.epoch_seconds)?;
        info!(
            alarm_id = alarm.id,
            offset_secs = alarm.offset_secs,
            epoch_seconds = alarm.epoch_seconds,
            "scheduled simulated alarm"
        );
    }

    Ok(alarms)
}

/// [`schedule_simulated_alarms`] against the wall clock and the thread RNG.
pub fn schedule_simulated_alarms_now<S>(scheduler: &mut S) -> Result<[SimulatedAlarm; 2], SchedulerError>
where
    S: AlarmScheduler + ?Sized,
{
    let now = chrono::Utc::now().timestamp();
    schedule_simulated_alarms(scheduler, now, &mut rand::thread_rng())
}
