//! Bounded, deduplicated chat render buffers.

use indexmap::IndexMap;

use crate::{
    dao::models::{ConversationScope, MessageId},
    dto::{chat::RenderedMessage, surfaces::ViewportReport},
};

pub const MESSAGE_BUFFER_LIMIT: usize = 120;
pub const SCROLL_ANCHOR_THRESHOLD_PX: f64 = 48.0;

/// Scroll metrics of a scrollable region, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Viewport {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl Viewport {
    pub fn distance_from_bottom(&self) -> f64 {
        (self.scroll_height - self.client_height - self.scroll_top).max(0.0)
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_top = (self.scroll_height - self.client_height).max(0.0);
    }
}

impl From<ViewportReport> for Viewport {
    fn from(report: ViewportReport) -> Self {
        Self {
            scroll_top: report.scroll_top,
            scroll_height: report.scroll_height,
            client_height: report.client_height,
        }
    }
}

/// Rendering surface a [`MessageStream`] writes into.
pub trait RenderTarget {
    /// Distance between the viewport and the bottom of the scrollable region.
    fn distance_from_bottom(&self) -> f64;
    fn append(&mut self, message: &RenderedMessage);
    fn evict(&mut self, id: MessageId);
    fn scroll_to_bottom(&mut self);
}

/// Last viewport metrics reported by a remote view.
///
/// Rendering happens on the other side; only the scroll position is mirrored.
/// Without a report the view is assumed to follow the newest message.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportedViewport {
    viewport: Option<Viewport>,
}

impl ReportedViewport {
    pub fn report(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }
}

impl RenderTarget for ReportedViewport {
    fn distance_from_bottom(&self) -> f64 {
        self.viewport
            .map(|viewport| viewport.distance_from_bottom())
            .unwrap_or(0.0)
    }

    fn append(&mut self, _message: &RenderedMessage) {}

    fn evict(&mut self, _id: MessageId) {}

    fn scroll_to_bottom(&mut self) {
        if let Some(viewport) = self.viewport.as_mut() {
            viewport.scroll_to_bottom();
        }
    }
}

/// Arrival-ordered buffer keyed by message id.
#[derive(Debug, Clone)]
pub struct MessageBuffer {
    limit: usize,
    entries: IndexMap<MessageId, RenderedMessage>,
}

impl MessageBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            entries: IndexMap::new(),
        }
    }

    pub fn messages(&self) -> impl Iterator<Item = &RenderedMessage> {
        self.entries.values()
    }

    pub fn ids(&self) -> Vec<MessageId> {
        self.entries.keys().copied().collect()
    }

    /// Append `message` unless its id is already present.
    ///
    /// Returns `None` for duplicates, otherwise the ids evicted to honor the limit.
    pub fn insert(&mut self, message: RenderedMessage) -> Option<Vec<MessageId>> {
        if self.entries.contains_key(&message.id) {
            return None;
        }
        self.entries.insert(message.id, message);
        Some(self.evict_overflow())
    }

    /// Merge a bulk history fetch.
    ///
    /// History comes first in server order; messages pushed before the fetch
    /// completed and missing from it are kept after it, in arrival order.
    pub fn seed(&mut self, history: Vec<RenderedMessage>) -> Vec<MessageId> {
        let pushed = std::mem::take(&mut self.entries);
        for message in history {
            self.entries.entry(message.id).or_insert(message);
        }
        for (id, message) in pushed {
            self.entries.entry(id).or_insert(message);
        }
        self.evict_overflow()
    }

    fn evict_overflow(&mut self) -> Vec<MessageId> {
        let excess = self.entries.len().saturating_sub(self.limit);
        self.entries.drain(..excess).map(|(id, _)| id).collect()
    }
}

/// Result of a single insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertOutcome {
    /// `false` when the id was already rendered.
    pub inserted: bool,
    pub evicted: Vec<MessageId>,
    /// Whether the viewport was re-anchored to the bottom.
    pub anchored: bool,
}

/// Render buffer of one conversation surface.
#[derive(Debug, Clone)]
pub struct MessageStream {
    scope: ConversationScope,
    buffer: MessageBuffer,
    anchor_threshold_px: f64,
    loaded: bool,
}

impl MessageStream {
    pub fn new(scope: ConversationScope, limit: usize, anchor_threshold_px: f64) -> Self {
        Self {
            scope,
            buffer: MessageBuffer::new(limit),
            anchor_threshold_px,
            loaded: false,
        }
    }

    pub fn scope(&self) -> ConversationScope {
        self.scope
    }

    pub fn buffer(&self) -> &MessageBuffer {
        &self.buffer
    }

    /// Whether the initial history fetch has been merged.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Insert one message and keep `target` in sync with the buffer.
    pub fn insert<T>(&mut self, message: RenderedMessage, target: &mut T) -> InsertOutcome
    where
        T: RenderTarget + ?Sized,
    {
        let near_bottom = target.distance_from_bottom() <= self.anchor_threshold_px;

        let Some(evicted) = self.buffer.insert(message.clone()) else {
            return InsertOutcome {
                inserted: false,
                evicted: Vec::new(),
                anchored: false,
            };
        };

        target.append(&message);
        for id in &evicted {
            target.evict(*id);
        }
        if near_bottom {
            target.scroll_to_bottom();
        }

        InsertOutcome {
            inserted: true,
            evicted,
            anchored: near_bottom,
        }
    }

    /// Merge the bulk history fetch and mark the stream loaded.
    pub fn seed(&mut self, history: Vec<RenderedMessage>) -> Vec<MessageId> {
        self.loaded = true;
        self.buffer.seed(history)
    }

    pub fn snapshot(&self) -> Vec<RenderedMessage> {
        self.buffer.messages().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROW_HEIGHT: f64 = 40.0;

    fn message(id: MessageId) -> RenderedMessage {
        RenderedMessage {
            id,
            sender: "jane".into(),
            content: format!("message {id}"),
            created_at: None,
        }
    }

    /// Scrollable list where every row is 40 px tall.
    struct FakeList {
        rows: Vec<MessageId>,
        viewport: Viewport,
    }

    impl FakeList {
        fn new(rows: usize, client_height: f64) -> Self {
            let mut list = Self {
                rows: (0..rows as MessageId).map(|id| -id - 1).collect(),
                viewport: Viewport {
                    scroll_top: 0.0,
                    scroll_height: 0.0,
                    client_height,
                },
            };
            list.viewport.scroll_height = list.rows.len() as f64 * ROW_HEIGHT;
            list
        }

        fn scroll_to_distance(&mut self, distance: f64) {
            self.viewport.scroll_top =
                self.viewport.scroll_height - self.viewport.client_height - distance;
        }
    }

    impl RenderTarget for FakeList {
        fn distance_from_bottom(&self) -> f64 {
            self.viewport.distance_from_bottom()
        }

        fn append(&mut self, message: &RenderedMessage) {
            self.rows.push(message.id);
            self.viewport.scroll_height += ROW_HEIGHT;
        }

        fn evict(&mut self, id: MessageId) {
            self.rows.retain(|row| *row != id);
            self.viewport.scroll_height -= ROW_HEIGHT;
        }

        fn scroll_to_bottom(&mut self) {
            self.viewport.scroll_to_bottom();
        }
    }

    impl MessageBuffer {
        fn len(&self) -> usize {
            self.entries.len()
        }
    }

    fn stream() -> MessageStream {
        MessageStream::new(
            ConversationScope::Court(1),
            MESSAGE_BUFFER_LIMIT,
            SCROLL_ANCHOR_THRESHOLD_PX,
        )
    }

    #[test]
    fn fetched_then_pushed_message_renders_once() {
        let mut stream = stream();
        let mut target = ReportedViewport::default();
        stream.seed(vec![message(41), message(42)]);

        let outcome = stream.insert(message(42), &mut target);
        assert!(!outcome.inserted);
        assert_eq!(stream.buffer().ids(), vec![41, 42]);
    }

    #[test]
    fn keeps_the_most_recent_messages_in_arrival_order() {
        let mut stream = stream();
        let mut target = ReportedViewport::default();
        let mut evicted = Vec::new();
        for id in 1..=125 {
            evicted.extend(stream.insert(message(id), &mut target).evicted);
        }

        assert_eq!(stream.buffer().len(), 120);
        assert_eq!(stream.buffer().ids(), (6..=125).collect::<Vec<_>>());
        assert_eq!(evicted, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn arrival_order_is_not_resorted() {
        let mut buffer = MessageBuffer::new(10);
        buffer.insert(message(9));
        buffer.insert(message(3));
        buffer.insert(message(7));
        assert_eq!(buffer.ids(), vec![9, 3, 7]);
    }

    #[test]
    fn viewport_near_bottom_is_reanchored() {
        let mut stream = stream();
        let mut list = FakeList::new(30, 400.0);
        list.scroll_to_distance(10.0);

        let outcome = stream.insert(message(1), &mut list);
        assert!(outcome.anchored);
        assert_eq!(list.distance_from_bottom(), 0.0);
    }

    #[test]
    fn scrolled_up_viewport_is_left_alone() {
        let mut stream = stream();
        let mut list = FakeList::new(30, 400.0);
        list.scroll_to_distance(500.0);
        let before = list.viewport.scroll_top;

        let outcome = stream.insert(message(1), &mut list);
        assert!(outcome.inserted);
        assert!(!outcome.anchored);
        assert_eq!(list.viewport.scroll_top, before);
        assert_eq!(list.rows.last(), Some(&1));
    }

    #[test]
    fn eviction_is_mirrored_into_the_target() {
        let mut stream = MessageStream::new(ConversationScope::Session(2), 3, 48.0);
        let mut list = FakeList::new(0, 400.0);
        for id in 1..=5 {
            stream.insert(message(id), &mut list);
        }
        assert_eq!(list.rows, vec![3, 4, 5]);
    }

    #[test]
    fn seed_keeps_messages_pushed_before_history_arrived() {
        let mut stream = stream();
        let mut target = ReportedViewport::default();
        stream.insert(message(50), &mut target);
        stream.insert(message(42), &mut target);
        assert!(!stream.is_loaded());

        stream.seed(vec![message(40), message(41), message(42)]);
        assert!(stream.is_loaded());
        assert_eq!(stream.buffer().ids(), vec![40, 41, 42, 50]);
    }

    #[test]
    fn seed_respects_the_limit() {
        let mut buffer = MessageBuffer::new(2);
        let evicted = buffer.seed(vec![message(1), message(2), message(3)]);
        assert_eq!(evicted, vec![1]);
        assert_eq!(buffer.ids(), vec![2, 3]);
    }

    #[test]
    fn unreported_viewport_follows_newest() {
        let mut stream = stream();
        let mut target = ReportedViewport::default();
        assert!(stream.insert(message(1), &mut target).anchored);

        target.report(Viewport {
            scroll_top: 0.0,
            scroll_height: 2_000.0,
            client_height: 400.0,
        });
        assert!(!stream.insert(message(2), &mut target).anchored);
    }
}
