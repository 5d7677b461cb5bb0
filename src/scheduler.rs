use std::time::Duration;

/// Deadline queue for the engine's delayed steps (countdown ticks, sequence
/// reveals, verdict banners). Replaces nested timer callbacks with a
/// structure the engine can cancel or shift in one operation.
#[derive(Debug, Clone)]
pub struct Scheduler<T> {
    pending: Vec<(Duration, T)>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    pub fn schedule_at(&mut self, at: Duration, token: T) {
        self.pending.push((at, token));
    }

    pub fn schedule_in(&mut self, now: Duration, delay: Duration, token: T) {
        self.schedule_at(now + delay, token);
    }

    /// Drops every pending step. The single cancellation point for restart
    /// and round transitions.
    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }

    /// Pushes every deadline out by `delta` (resume after pause).
    pub fn shift_by(&mut self, delta: Duration) {
        for (at, _) in &mut self.pending {
            *at += delta;
        }
    }

    /// Removes and returns the steps due at `now`, earliest first. Ties keep
    /// insertion order so a tick scheduled before a reveal fires before it.
    pub fn pop_due(&mut self, now: Duration) -> Vec<T> {
        let mut due = Vec::new();
        let mut keep = Vec::new();
        for (index, (at, token)) in self.pending.drain(..).enumerate() {
            if at <= now {
                due.push((at, index, token));
            } else {
                keep.push((at, token));
            }
        }
        self.pending = keep;

        due.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        due.into_iter().map(|(_, _, token)| token).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}
