//! Partition of host queues into READY, HELD and SNOOZED
//!
//! The router owns every host queue by value. Each queue is a member of
//! exactly one of the three sets, and its state flag names that set.

use crate::frontier::host_queue::HostQueue;
use crate::state::StoreState;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

#[derive(Debug, Default)]
pub struct QueueRouter {
    queues: HashMap<String, HostQueue>,
    /// Emission order; queues rejoin at the back
    ready: VecDeque<String>,
    held: HashSet<String>,
    /// Ordered by wake time, ties broken by classKey
    snoozed: BTreeSet<(i64, String)>,
}

impl QueueRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, class_key: &str) -> bool {
        self.queues.contains_key(class_key)
    }

    pub fn get(&self, class_key: &str) -> Option<&HostQueue> {
        self.queues.get(class_key)
    }

    pub fn get_mut(&mut self, class_key: &str) -> Option<&mut HostQueue> {
        self.queues.get_mut(class_key)
    }

    /// Adds a new queue in the HELD set, replacing nothing
    ///
    /// Returns false (and drops `queue`) if the classKey already has a queue.
    pub fn insert_held(&mut self, mut queue: HostQueue) -> bool {
        let key = queue.class_key().to_string();
        if self.queues.contains_key(&key) {
            return false;
        }
        queue.set_state(StoreState::Held, None);
        self.held.insert(key.clone());
        self.queues.insert(key, queue);
        true
    }

    fn detach(&mut self, class_key: &str) {
        let Some(queue) = self.queues.get(class_key) else {
            return;
        };
        match queue.state() {
            StoreState::Ready => self.ready.retain(|k| k != class_key),
            StoreState::Held => {
                self.held.remove(class_key);
            }
            StoreState::Snoozed => {
                if let Some(wake) = queue.wake_time() {
                    self.snoozed.remove(&(wake, class_key.to_string()));
                }
            }
            _ => {}
        }
    }

    pub fn mark_ready(&mut self, class_key: &str) {
        if !self.queues.contains_key(class_key) {
            return;
        }
        self.detach(class_key);
        self.ready.push_back(class_key.to_string());
        if let Some(queue) = self.queues.get_mut(class_key) {
            queue.set_state(StoreState::Ready, None);
        }
    }

    pub fn mark_held(&mut self, class_key: &str) {
        if !self.queues.contains_key(class_key) {
            return;
        }
        self.detach(class_key);
        self.held.insert(class_key.to_string());
        if let Some(queue) = self.queues.get_mut(class_key) {
            queue.set_state(StoreState::Held, None);
        }
    }

    pub fn snooze(&mut self, class_key: &str, wake_time: i64) {
        if !self.queues.contains_key(class_key) {
            return;
        }
        self.detach(class_key);
        self.snoozed.insert((wake_time, class_key.to_string()));
        if let Some(queue) = self.queues.get_mut(class_key) {
            queue.set_state(StoreState::Snoozed, Some(wake_time));
        }
    }

    /// Removes the queue from the router entirely
    pub fn discard(&mut self, class_key: &str) -> Option<HostQueue> {
        self.detach(class_key);
        self.queues.remove(class_key)
    }

    /// ClassKey at the front of the READY set
    pub fn first_ready(&self) -> Option<String> {
        self.ready.front().cloned()
    }

    /// Removes and returns the classKeys of queues whose wake time has passed
    pub fn take_due(&mut self, now: i64) -> Vec<String> {
        let mut due = Vec::new();
        while let Some((wake, _)) = self.snoozed.first() {
            if *wake > now {
                break;
            }
            if let Some((_, key)) = self.snoozed.pop_first() {
                due.push(key);
            }
        }
        // detached already; park them in HELD until the caller decides
        for key in &due {
            self.held.insert(key.clone());
            if let Some(queue) = self.queues.get_mut(key) {
                queue.set_state(StoreState::Held, None);
            }
        }
        due
    }

    pub fn earliest_wake(&self) -> Option<i64> {
        self.snoozed.first().map(|(wake, _)| *wake)
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    pub fn snoozed_count(&self) -> usize {
        self.snoozed.len()
    }

    /// Total URIs across every host queue
    pub fn queued_uris(&self) -> usize {
        self.queues.values().map(HostQueue::len).sum()
    }

    /// ClassKeys of every queue, sorted
    pub fn sorted_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.queues.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn queues_mut(&mut self) -> impl Iterator<Item = &mut HostQueue> {
        self.queues.values_mut()
    }

    /// Verifies that every queue sits in exactly the set its state names
    pub fn check_partition(&self) -> Result<(), String> {
        let members = self.ready.len() + self.held.len() + self.snoozed.len();
        if members != self.queues.len() {
            return Err(format!(
                "{} queues but {} set memberships",
                self.queues.len(),
                members
            ));
        }
        for (key, queue) in &self.queues {
            let ok = match queue.state() {
                StoreState::Ready => self.ready.iter().any(|k| k == key),
                StoreState::Held => self.held.contains(key),
                StoreState::Snoozed => queue
                    .wake_time()
                    .is_some_and(|w| self.snoozed.contains(&(w, key.clone()))),
                other => return Err(format!("queue {} has state {}", key, other)),
            };
            if !ok {
                return Err(format!("queue {} missing from {} set", key, queue.state()));
            }
        }
        Ok(())
    }
}
