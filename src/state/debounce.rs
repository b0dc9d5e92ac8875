//! Trailing-edge debounce bookkeeping.
//!
//! The [`Debouncer`] owns no timer: the caller sleeps until
//! [`Debouncer::next_deadline`] and then drains [`Debouncer::take_due`].

use std::{collections::HashMap, hash::Hash, time::Duration};

use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Pending<C> {
    deadline: Instant,
    context: C,
    superseded: usize,
}

/// A task whose quiet period has elapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<K, C> {
    pub key: K,
    pub context: C,
    /// Number of earlier events this one replaced.
    pub superseded: usize,
}

/// At most one pending task per key; scheduling again supersedes it.
#[derive(Debug, Clone)]
pub struct Debouncer<K, C> {
    pending: HashMap<K, Pending<C>>,
}

impl<K, C> Default for Debouncer<K, C> {
    fn default() -> Self {
        Self {
            pending: HashMap::new(),
        }
    }
}

impl<K, C> Debouncer<K, C>
where
    K: Copy + Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Supersede any pending task for `key` and reschedule it `delay` after `now`.
    ///
    /// Returns `true` when a pending task was replaced.
    pub fn schedule(&mut self, key: K, context: C, delay: Duration, now: Instant) -> bool {
        let deadline = now + delay;
        match self.pending.get_mut(&key) {
            Some(pending) => {
                pending.deadline = deadline;
                pending.context = context;
                pending.superseded += 1;
                true
            }
            None => {
                self.pending.insert(
                    key,
                    Pending {
                        deadline,
                        context,
                        superseded: 0,
                    },
                );
                false
            }
        }
    }

    /// Earliest deadline among pending tasks.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|pending| pending.deadline).min()
    }

    /// Remove and return every task due at `now`, earliest deadline first.
    pub fn take_due(&mut self, now: Instant) -> Vec<Fired<K, C>> {
        let due: Vec<K> = self
            .pending
            .iter()
            .filter(|(_, pending)| pending.deadline <= now)
            .map(|(key, _)| *key)
            .collect();

        let mut fired: Vec<(Instant, Fired<K, C>)> = due
            .into_iter()
            .filter_map(|key| {
                self.pending.remove(&key).map(|pending| {
                    (
                        pending.deadline,
                        Fired {
                            key,
                            context: pending.context,
                            superseded: pending.superseded,
                        },
                    )
                })
            })
            .collect();
        fired.sort_by_key(|(deadline, _)| *deadline);
        fired.into_iter().map(|(_, fired)| fired).collect()
    }

    /// Drop every pending task, returning how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }
}
