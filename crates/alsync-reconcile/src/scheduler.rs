/// Outbound seam toward the service that actually fires alarms.
///
/// # Contract
/// The reconciler calls `add_alarm` at most once per unknown -> known
/// transition and `remove_alarm` at most once per known -> unknown transition,
/// in decision order. Implementations must not reorder calls.
pub trait AlarmScheduler {
    fn add_alarm(&mut self, id: &str, epoch_seconds: i64) -> Result<(), SchedulerError>;
    fn remove_alarm(&mut self, id: &str) -> Result<(), SchedulerError>;
}

impl<S: AlarmScheduler + ?Sized> AlarmScheduler for &mut S {
    fn add_alarm(&mut self, id: &str, epoch_seconds: i64) -> Result<(), SchedulerError> {
        (**self).add_alarm(id, epoch_seconds)
    }

    fn remove_alarm(&mut self, id: &str) -> Result<(), SchedulerError> {
        (**self).remove_alarm(id)
    }
}

impl<S: AlarmScheduler + ?Sized> AlarmScheduler for Box<S> {
    fn add_alarm(&mut self, id: &str, epoch_seconds: i64) -> Result<(), SchedulerError> {
        (**self).add_alarm(id, epoch_seconds)
    }

    fn remove_alarm(&mut self, id: &str) -> Result<(), SchedulerError> {
        (**self).remove_alarm(id)
    }
}

/// A scheduler call that did not go through. Never retried by the core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchedulerError {
    /// The scheduler could not be reached (transport closed, service gone).
    Unavailable { detail: String },
    /// The scheduler answered but refused the request.
    Rejected { id: String, detail: String },
}

impl std::fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerError::Unavailable { detail } => {
                write!(f, "SCHEDULER_UNAVAILABLE: {detail}")
            }
            SchedulerError::Rejected { id, detail } => {
                write!(f, "SCHEDULER_REJECTED alarm={id}: {detail}")
            }
        }
    }
}

impl std::error::Error for SchedulerError {}
