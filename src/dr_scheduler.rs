//! Virtual-clock event scheduler
//!
//! Pending actions are kept in a `BTreeMap` ordered by [`EventKey`]: due time
//! first, then insertion sequence, so actions due at the same instant run in
//! the order they were scheduled. Cancellation never touches the queue. Each
//! scheduled action owns a slot in an arena; a [`EventHandle`] names the slot
//! and the slot's generation at scheduling time. Canceling marks the slot,
//! and the queue skips marked entries when they come due. Slots are recycled
//! with a bumped generation once their entry leaves the queue, so stale
//! handles can never reach a newer action.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::dr_interface::SimTime;

/// Key for ordering actions in the queue.
#[derive(Debug, Clone, Copy)]
pub struct EventKey {
    pub due: SimTime,
    pub sequence: u64,
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.due.total_cmp(&other.due) {
            Ordering::Equal => {}
            ord => return ord,
        }
        self.sequence.cmp(&other.sequence)
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for EventKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EventKey {}

/// Opaque reference to a scheduled action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventHandle {
    slot: usize,
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Pending,
    Canceled,
    Free,
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    state: SlotState,
}

struct Entry<A> {
    handle: EventHandle,
    action: A,
}

pub struct Scheduler<A> {
    now: SimTime,
    next_sequence: u64,
    queue: BTreeMap<EventKey, Entry<A>>,
    slots: Vec<Slot>,
    free_slots: Vec<usize>,
    halted: bool,
    dispatched: u64,
    skipped: u64,
}

impl<A> Default for Scheduler<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Scheduler<A> {
    pub fn new() -> Self {
        Self {
            now: 0.0,
            next_sequence: 0,
            queue: BTreeMap::new(),
            slots: Vec::new(),
            free_slots: Vec::new(),
            halted: false,
            dispatched: 0,
            skipped: 0,
        }
    }

    /// Current virtual time
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Actions dispatched so far
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Canceled entries discarded when they came due
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Queue entries, including canceled ones not yet discarded
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Stop dispatching; whatever is still queued stays undelivered
    pub fn halt(&mut self) {
        self.halted = true;
    }

    /// Schedule `action` to run `delay` seconds from now.
    ///
    /// Negative or NaN delays are treated as zero.
    pub fn schedule(&mut self, delay: SimTime, action: A) -> EventHandle {
        debug_assert!(delay >= 0.0, "negative delay {}", delay);
        let due = self.now + delay.max(0.0);

        let handle = self.allocate_slot();
        let key = EventKey {
            due,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;
        self.queue.insert(key, Entry { handle, action });
        handle
    }

    /// Mark a pending action inert. Returns `false` (and does nothing) if the
    /// action already ran, was already canceled, or is being dispatched.
    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        match self.slots.get_mut(handle.slot) {
            Some(slot) if slot.generation == handle.generation && slot.state == SlotState::Pending => {
                slot.state = SlotState::Canceled;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self, handle: EventHandle) -> bool {
        matches!(
            self.slots.get(handle.slot),
            Some(slot) if slot.generation == handle.generation && slot.state == SlotState::Pending
        )
    }

    /// Due time of the earliest queued entry
    pub fn peek_due(&self) -> Option<SimTime> {
        self.queue.first_key_value().map(|(key, _)| key.due)
    }

    /// Remove and return the next live action due at or before `horizon`,
    /// advancing the clock to its due time. Canceled entries met on the way
    /// are discarded.
    pub fn pop_due(&mut self, horizon: SimTime) -> Option<A> {
        loop {
            if self.halted {
                return None;
            }
            let due = self.peek_due()?;
            if due > horizon {
                return None;
            }
            let (key, entry) = self.queue.pop_first()?;
            let canceled = self.release_slot(entry.handle);
            if canceled {
                self.skipped += 1;
                continue;
            }
            self.now = key.due;
            self.dispatched += 1;
            return Some(entry.action);
        }
    }

    /// Dispatch actions in (time, sequence) order until the queue is empty,
    /// the next action lies beyond `horizon`, or the scheduler is halted.
    /// The handler may schedule and cancel further actions.
    pub fn run_until<F>(&mut self, horizon: SimTime, mut handler: F) -> u64
    where
        F: FnMut(&mut Self, A),
    {
        let before = self.dispatched;
        while let Some(action) = self.pop_due(horizon) {
            handler(self, action);
        }
        self.dispatched - before
    }

    fn allocate_slot(&mut self) -> EventHandle {
        if let Some(index) = self.free_slots.pop() {
            let slot = &mut self.slots[index];
            slot.state = SlotState::Pending;
            return EventHandle {
                slot: index,
                generation: slot.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            state: SlotState::Pending,
        });
        EventHandle {
            slot: self.slots.len() - 1,
            generation: 0,
        }
    }

    // returns true when the entry had been canceled
    fn release_slot(&mut self, handle: EventHandle) -> bool {
        let Some(slot) = self.slots.get_mut(handle.slot) else {
            return false;
        };
        let canceled = slot.state == SlotState::Canceled;
        slot.state = SlotState::Free;
        slot.generation += 1;
        self.free_slots.push(handle.slot);
        canceled
    }
}
