//! Events emitted to the host UI.

use crate::camera::ZoomLimits;
use crate::graph::{NodeId, RelationshipId};
use kurbo::Point;
use std::collections::HashMap;

/// High-level events produced by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    NodeClicked(NodeId),
    NodeDblClicked(NodeId),
    NodeMouseOver(NodeId),
    NodeMouseOut(NodeId),
    RelationshipClicked(RelationshipId),
    RelMouseOver(RelationshipId),
    RelMouseOut(RelationshipId),
    /// Click on empty canvas, at the given world position.
    CanvasClicked(Point),
    /// The visible graph was redrawn after an update.
    Updated,
    ZoomLimitsChanged(ZoomLimits),
}

/// Subscription key for [`GraphEvent`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NodeClicked,
    NodeDblClicked,
    NodeMouseOver,
    NodeMouseOut,
    RelationshipClicked,
    RelMouseOver,
    RelMouseOut,
    CanvasClicked,
    Updated,
    ZoomLimitsChanged,
}

impl GraphEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GraphEvent::NodeClicked(_) => EventKind::NodeClicked,
            GraphEvent::NodeDblClicked(_) => EventKind::NodeDblClicked,
            GraphEvent::NodeMouseOver(_) => EventKind::NodeMouseOver,
            GraphEvent::NodeMouseOut(_) => EventKind::NodeMouseOut,
            GraphEvent::RelationshipClicked(_) => EventKind::RelationshipClicked,
            GraphEvent::RelMouseOver(_) => EventKind::RelMouseOver,
            GraphEvent::RelMouseOut(_) => EventKind::RelMouseOut,
            GraphEvent::CanvasClicked(_) => EventKind::CanvasClicked,
            GraphEvent::Updated => EventKind::Updated,
            GraphEvent::ZoomLimitsChanged(_) => EventKind::ZoomLimitsChanged,
        }
    }
}

/// Event listener callback.
pub type Listener = Box<dyn FnMut(&GraphEvent)>;

/// Per-renderer publish/subscribe hub.
#[derive(Default)]
pub struct EventBus {
    listeners: HashMap<EventKind, Vec<Listener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for one event kind.
    pub fn on(&mut self, kind: EventKind, listener: Listener) {
        self.listeners.entry(kind).or_default().push(listener);
    }

    /// Deliver an event to every listener of its kind, in registration order.
    pub fn trigger(&mut self, event: &GraphEvent) {
        log::trace!("event {event:?}");
        if let Some(listeners) = self.listeners.get_mut(&event.kind()) {
            for listener in listeners.iter_mut() {
                listener(event);
            }
        }
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("kinds", &self.listeners.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_trigger_routes_by_kind() {
        let mut bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        bus.on(
            EventKind::NodeClicked,
            Box::new(move |event| sink.borrow_mut().push(event.clone())),
        );

        bus.trigger(&GraphEvent::NodeClicked(NodeId::from("a")));
        bus.trigger(&GraphEvent::NodeMouseOver(NodeId::from("a")));

        assert_eq!(*seen.borrow(), vec![GraphEvent::NodeClicked(NodeId::from("a"))]);
    }

    #[test]
    fn test_multiple_listeners_in_order() {
        let mut bus = EventBus::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let order = Rc::clone(&order);
            bus.on(EventKind::Updated, Box::new(move |_| order.borrow_mut().push(i)));
        }
        bus.trigger(&GraphEvent::Updated);
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }
}
