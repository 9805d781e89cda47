use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tracing::{debug, trace};
use vidpace_contracts::command::SpeedOutcome;
use vidpace_contracts::media::{ElementId, MediaElement};

/// Identity-deduplicated set of media elements a page agent controls.
///
/// Entries are weak: the page owns its elements, and an element the page
/// has dropped disappears from the set on the next pass over it.
#[derive(Debug, Default)]
pub struct TrackedMedia {
    elements: HashMap<ElementId, Weak<dyn MediaElement>>,
}

impl TrackedMedia {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the element was not tracked yet.
    pub fn track(&mut self, element: &Arc<dyn MediaElement>) -> bool {
        let id = element.id();
        let fresh = match self.elements.get(&id) {
            Some(existing) => existing.upgrade().is_none(),
            None => true,
        };
        if fresh {
            trace!(target: "vidpace::page", element = %id, "tracking media element");
            self.elements.insert(id, Arc::downgrade(element));
        }
        fresh
    }

    pub fn untrack(&mut self, id: ElementId) -> bool {
        self.elements.remove(&id).is_some()
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.elements
            .get(&id)
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Number of live tracked elements.
    pub fn len(&self) -> usize {
        self.elements
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops entries whose element is gone and returns the live ones.
    fn live(&mut self) -> Vec<Arc<dyn MediaElement>> {
        let mut live = Vec::with_capacity(self.elements.len());
        self.elements.retain(|id, weak| match weak.upgrade() {
            Some(element) => {
                live.push(element);
                true
            }
            None => {
                trace!(target: "vidpace::page", element = %id, "pruned dropped media element");
                false
            }
        });
        live
    }

    /// Moves every element with a finite duration by `delta` seconds,
    /// clamped to `[0, duration]`. Returns how many elements moved.
    pub fn seek(&mut self, delta: f64) -> usize {
        let mut moved = 0;
        for element in self.live() {
            let duration = element.duration();
            if !duration.is_finite() {
                debug!(target: "vidpace::page", element = %element.id(), "skipping seek on element without finite duration");
                continue;
            }
            let target = (element.current_time() + delta).clamp(0.0, duration.max(0.0));
            element.set_current_time(target);
            moved += 1;
        }
        moved
    }

    /// Sets the playback rate of every element that has metadata.
    pub fn set_speed(&mut self, rate: f64) -> SpeedOutcome {
        let live = self.live();
        if live.is_empty() {
            return SpeedOutcome::NoMedia;
        }
        let mut count = 0;
        for element in &live {
            if element.ready_state().has_metadata() {
                element.set_playback_rate(rate);
                count += 1;
            } else {
                debug!(target: "vidpace::page", element = %element.id(), ready_state = ?element.ready_state(), "element not ready for a rate change");
            }
        }
        if count == 0 {
            SpeedOutcome::NotReady {
                tracked: live.len(),
            }
        } else {
            SpeedOutcome::Applied { count }
        }
    }
}
