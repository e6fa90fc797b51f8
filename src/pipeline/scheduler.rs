/// Timed events for one track, fired in tick order as the transport sweeps
/// over them.
///
/// The scheduler keeps a cursor into its sorted events and remembers where
/// the last scan ended. A scan that does not continue from there (loop wrap,
/// rewind) re-seeks the cursor by binary search, so no event is skipped or
/// fired twice across a wrap.
#[derive(Clone, Debug)]
pub struct TrackScheduler<E> {
    events: Vec<(u64, E)>,
    cursor: usize,
    expected_from: Option<u64>,
    loop_end: Option<u64>,
    running: bool,
}

impl<E> Default for TrackScheduler<E> {
    fn default() -> Self {
        Self { events: Vec::new(), cursor: 0, expected_from: None, loop_end: None, running: false }
    }
}

impl<E> TrackScheduler<E> {
    pub fn new(events: Vec<(u64, E)>) -> Self {
        let mut scheduler = Self::default();
        scheduler.schedule(events);
        scheduler
    }

    /// Replace the events. Input order is not trusted; equal ticks keep
    /// their input order.
    pub fn schedule(&mut self, mut events: Vec<(u64, E)>) {
        events.sort_by_key(|(tick, _)| *tick);
        self.events = events;
        self.cursor = 0;
        self.expected_from = None;
    }

    /// Returns false if already running.
    pub fn start(&mut self) -> bool {
        let changed = !self.running;
        self.running = true;
        changed
    }

    /// Stops and rewinds. Returns false if already stopped.
    pub fn stop(&mut self) -> bool {
        let changed = self.running;
        self.running = false;
        self.cursor = 0;
        self.expected_from = None;
        changed
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// With a loop set, events at or after `end` never fire.
    pub fn set_loop(&mut self, end: Option<u64>) {
        self.loop_end = end;
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn event(&self, index: usize) -> Option<&(u64, E)> {
        self.events.get(index)
    }

    /// Fire every event with `from <= tick < to`, in order, as `(tick, index)`.
    pub fn fire(&mut self, from: u64, to: u64, mut dispatch: impl FnMut(u64, usize)) {
        if !self.running {
            return;
        }
        if self.expected_from != Some(from) {
            self.cursor = self.events.partition_point(|(tick, _)| *tick < from);
        }
        while let Some((tick, _)) = self.events.get(self.cursor) {
            let tick = *tick;
            if tick >= to {
                break;
            }
            if self.loop_end.is_none_or(|end| tick < end) {
                dispatch(tick, self.cursor);
            }
            self.cursor += 1;
        }
        self.expected_from = Some(to);
    }
}
