use crate::reminder::Reminder;
use chrono::{DateTime, Duration, Utc};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// One queued due-check. Ordered by deadline, then id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Slot {
    at: DateTime<Utc>,
    id: i64,
    generation: u64,
}

/// Due-checks for every armed reminder, kept in a single min-heap of deadlines.
///
/// Disarming only forgets the id's generation; the stale heap slot is skipped when it
/// surfaces. This keeps arm/disarm O(log n) and guarantees at most one live check per id.
#[derive(Debug)]
pub struct Scheduler {
    tick: Duration,
    queue: BinaryHeap<Reverse<Slot>>,
    armed: HashMap<i64, u64>,
    next_generation: u64,
}

impl Scheduler {
    pub fn new(tick: Duration) -> Self {
        Self {
            tick,
            queue: BinaryHeap::new(),
            armed: HashMap::new(),
            next_generation: 0,
        }
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Arm a check that fires once `due_time` has passed. Completed reminders are not
    /// armed; returns whether a check is now live.
    pub fn arm(&mut self, reminder: &Reminder, now: DateTime<Utc>) -> bool {
        if reminder.is_completed {
            self.disarm(reminder.id);
            return false;
        }
        self.schedule(reminder.id, reminder.due_time.max(now));
        true
    }

    /// Arm a check for the next tick, used after a failed or deferred trigger.
    pub fn arm_retry(&mut self, id: i64, now: DateTime<Utc>) {
        self.schedule(id, now + self.tick);
    }

    /// Cancel the check for `id`; no-op when none is armed.
    pub fn disarm(&mut self, id: i64) -> bool {
        self.armed.remove(&id).is_some()
    }

    pub fn disarm_all(&mut self) {
        self.armed.clear();
        self.queue.clear();
    }

    /// Drop every check and arm one per reminder that is neither completed nor in flight.
    pub fn rearm_all<'a, I>(&mut self, reminders: I, in_flight: &HashSet<i64>, now: DateTime<Utc>)
    where
        I: IntoIterator<Item = &'a Reminder>,
    {
        self.disarm_all();
        for reminder in reminders {
            if !in_flight.contains(&reminder.id) {
                self.arm(reminder, now);
            }
        }
        log::debug!("Re-armed {} due checks", self.armed.len());
    }

    /// Pop every check whose deadline has passed. Returned ids are disarmed.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Vec<i64> {
        let mut expired = Vec::new();
        while let Some(Reverse(slot)) = self.queue.peek().copied() {
            if slot.at > now {
                break;
            }
            self.queue.pop();
            if self.armed.get(&slot.id) == Some(&slot.generation) {
                self.armed.remove(&slot.id);
                expired.push(slot.id);
            }
        }
        expired
    }

    pub fn is_armed(&self, id: i64) -> bool {
        self.armed.contains_key(&id)
    }

    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }

    /// Earliest live deadline, if any check is armed.
    pub fn next_deadline(&mut self) -> Option<DateTime<Utc>> {
        while let Some(Reverse(slot)) = self.queue.peek().copied() {
            if self.armed.get(&slot.id) == Some(&slot.generation) {
                return Some(slot.at);
            }
            self.queue.pop();
        }
        None
    }

    fn schedule(&mut self, id: i64, at: DateTime<Utc>) {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.armed.insert(id, generation);
        self.queue.push(Reverse(Slot { at, id, generation }));
    }
}
