use crate::transition::TransitionType;

/// Identifies the exposure that generated an event
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScheduleId(pub u64);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    Transition(TransitionType),
    /// A potentially infectious contact with someone in `to_cell`
    Contact,
}

/// A pending event in a node's queue
///
/// The queue orders events by `time`; events with equal times fire in the
/// order they were queued.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StochasticEvent {
    /// Time of the previous event in the same chain
    pub initialization_time: f64,
    pub time: f64,
    pub kind: EventKind,
    pub from_cell: usize,
    pub to_cell: usize,
    pub schedule: ScheduleId,
}

impl StochasticEvent {
    #[must_use]
    pub fn transition(
        schedule: ScheduleId,
        transition: TransitionType,
        initialization_time: f64,
        time: f64,
        cell: usize,
    ) -> Self {
        StochasticEvent {
            initialization_time,
            time,
            kind: EventKind::Transition(transition),
            from_cell: cell,
            to_cell: cell,
            schedule,
        }
    }

    #[must_use]
    pub fn contact(
        schedule: ScheduleId,
        initialization_time: f64,
        time: f64,
        from_cell: usize,
        to_cell: usize,
    ) -> Self {
        StochasticEvent {
            initialization_time,
            time,
            kind: EventKind::Contact,
            from_cell,
            to_cell,
            schedule,
        }
    }

    /// The simulated day on which this event fires
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn day(&self) -> usize {
        self.time.floor() as usize
    }
}
