use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use vidpace_contracts::dom::FeedbackSurface;

use super::agent::PageEvent;

/// Single transient overlay with generation-checked expiry.
///
/// Every `show` bumps the generation and schedules a `FeedbackExpired`
/// event carrying it; an expiry for an older generation is ignored, so a
/// replaced message never hides its successor.
pub(crate) struct FeedbackOverlay {
    surface: Arc<dyn FeedbackSurface>,
    interval: Duration,
    generation: u64,
    visible: bool,
    events: mpsc::UnboundedSender<PageEvent>,
}

impl fmt::Debug for FeedbackOverlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedbackOverlay")
            .field("interval", &self.interval)
            .field("generation", &self.generation)
            .field("visible", &self.visible)
            .finish()
    }
}

impl FeedbackOverlay {
    pub(crate) fn new(
        surface: Arc<dyn FeedbackSurface>,
        interval: Duration,
        events: mpsc::UnboundedSender<PageEvent>,
    ) -> Self {
        Self {
            surface,
            interval,
            generation: 0,
            visible: false,
            events,
        }
    }

    pub(crate) fn show(&mut self, text: &str) {
        self.generation += 1;
        self.visible = true;
        self.surface.show(text);

        let generation = self.generation;
        let interval = self.interval;
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            let _ = events.send(PageEvent::FeedbackExpired(generation));
        });
    }

    /// Hides the overlay if `generation` is still the one on screen.
    pub(crate) fn expire(&mut self, generation: u64) -> bool {
        if generation != self.generation || !self.visible {
            return false;
        }
        self.visible = false;
        self.surface.hide();
        true
    }

    pub(crate) fn clear(&mut self) {
        if self.visible {
            self.visible = false;
            self.surface.hide();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::dom::Document;

    #[tokio::test(start_paused = true)]
    async fn stale_timer_does_not_hide_successor() {
        let doc = Arc::new(Document::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut overlay = FeedbackOverlay::new(doc.clone(), Duration::from_secs(1), tx);

        overlay.show("-30s");
        tokio::time::advance(Duration::from_millis(600)).await;
        overlay.show("+10s");

        let Some(PageEvent::FeedbackExpired(first)) = rx.recv().await else {
            panic!("expected first expiry");
        };
        assert!(!overlay.expire(first));
        assert_eq!(doc.overlay_text().as_deref(), Some("+10s"));

        let Some(PageEvent::FeedbackExpired(second)) = rx.recv().await else {
            panic!("expected second expiry");
        };
        assert!(overlay.expire(second));
        assert_eq!(doc.overlay_text(), None);
    }
}
