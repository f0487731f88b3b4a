use tracing::{debug, info, warn};

use crate::{
    AlarmRecord, AlarmRegistry, AlarmScheduler, RawAlarmRecord, ReconcileReport, RingTimeParser,
    SchedulerError, SkipReason, Transition,
};

/// Diffs incoming alarm records against the registry and forwards the
/// resulting add/remove decisions to the scheduler.
///
/// Decision table (per record):
///
/// | known | ring_time | action |
/// |-------|-----------|--------|
/// | no    | present   | parse, `add_alarm`, register |
/// | yes   | absent    | `remove_alarm`, unregister |
/// | no    | absent    | nothing |
/// | yes   | present   | nothing (a changed time is not re-sent) |
///
/// The scheduler is called before the registry is touched; a failed call
/// leaves the registry as it was.
#[derive(Debug)]
pub struct Reconciler<S> {
    registry: AlarmRegistry,
    scheduler: S,
    parser: RingTimeParser,
}

impl<S: AlarmScheduler> Reconciler<S> {
    pub fn new(scheduler: S) -> Self {
        Self::with_registry(AlarmRegistry::new(), scheduler)
    }

    /// Start from an already-populated registry (tests, warm restarts of the loop).
    pub fn with_registry(registry: AlarmRegistry, scheduler: S) -> Self {
        Self {
            registry,
            scheduler,
            parser: RingTimeParser::default(),
        }
    }

    pub fn with_parser(mut self, parser: RingTimeParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn registry(&self) -> &AlarmRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn into_parts(self) -> (AlarmRegistry, S) {
        (self.registry, self.scheduler)
    }

    /// Process one raw snapshot entry.
    ///
    /// Malformed entries yield [`Transition::Skipped`]; only a scheduler
    /// failure is returned as `Err`.
    pub fn process_record(&mut self, raw: &RawAlarmRecord) -> Result<Transition, SchedulerError> {
        match AlarmRecord::from_raw(raw) {
            Ok(record) => self.apply(record),
            Err(reason) => {
                match &reason {
                    SkipReason::MissingId => debug!("skipping alarm record without id"),
                    SkipReason::MalformedRingTime { id, error, .. } => {
                        warn!(alarm_id = %id, %error, "skipping alarm record with malformed ring_time")
                    }
                }
                Ok(Transition::Skipped(reason))
            }
        }
    }

    /// Apply an already-parsed record.
    pub fn apply(&mut self, record: AlarmRecord) -> Result<Transition, SchedulerError> {
        let AlarmRecord { id, ring_time } = record;
        let exists = self.registry.contains(&id);

        match (exists, ring_time) {
            (false, Some(ring_time)) => {
                let epoch_seconds = match self.parser.parse_epoch_seconds(&ring_time) {
                    Ok(secs) => secs,
                    Err(err) => {
                        warn!(alarm_id = %id, ring_time = %ring_time, error = %err, "skipping alarm with malformed ring_time");
                        return Ok(Transition::Skipped(SkipReason::MalformedRingTime {
                            id,
                            value: ring_time,
                            error: err.to_string(),
                        }));
                    }
                };

                self.scheduler.add_alarm(&id, epoch_seconds)?;
                self.registry.add(id.clone());
                info!(alarm_id = %id, epoch_seconds, "adding alarm");
                Ok(Transition::Added { id, epoch_seconds })
            }
            (true, None) => {
                self.scheduler.remove_alarm(&id)?;
                self.registry.remove(&id);
                info!(alarm_id = %id, "removing alarm");
                Ok(Transition::Removed { id })
            }
            (false, None) => Ok(Transition::NotKnown { id }),
            (true, Some(_)) => Ok(Transition::AlreadyKnown { id }),
        }
    }

    /// Process a full snapshot in delivered order.
    ///
    /// `None` (store holds no list) and an empty snapshot both produce an
    /// empty report. Stops at the first scheduler failure; transitions decided
    /// before it have already been applied.
    pub fn apply_snapshot(
        &mut self,
        snapshot: Option<&[RawAlarmRecord]>,
    ) -> Result<ReconcileReport, SchedulerError> {
        let mut report = ReconcileReport::empty();
        let Some(records) = snapshot else {
            return Ok(report);
        };

        for raw in records {
            let transition = self.process_record(raw)?;
            report.transitions.push(transition);
        }

        Ok(report)
    }
}
