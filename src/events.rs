//! Pointer and wheel event dispatch.
//!
//! The event manager keeps per-category registries of listening nodes (never
//! walking the tree to find them), resolves device coordinates into each
//! node's local space through a per-dispatch composed-transform cache, picks
//! the topmost contained node by traversal index, and runs the hover, click
//! and drag state machines. Dispatch is two-phase: the manager plans every
//! listener invocation while it holds the scene, then the graph fires the
//! plan with no internal borrows outstanding, so listeners are free to call
//! back into the graph.

use std::collections::{HashMap, HashSet};
use std::mem;
use std::rc::Rc;

use bitflags::bitflags;
use kurbo::{Affine, Point, Vec2};

use crate::graph::Graph;
use crate::scene::{NodeId, Scene};

/// Event categories a node can listen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PointerOver,
    PointerOut,
    PointerEnter,
    PointerLeave,
    PointerMove,
    PointerMoveGlobal,
    PointerDown,
    PointerUp,
    PointerClick,
    DragStart,
    DragMove,
    DragEnd,
    Wheel,
}

impl EventKind {
    pub(crate) const COUNT: usize = 13;

    fn slot(self) -> usize {
        self as usize
    }

    fn move_bit(self) -> Option<EventMask> {
        match self {
            EventKind::PointerOut => Some(EventMask::POINTER_OUT),
            EventKind::PointerOver => Some(EventMask::POINTER_OVER),
            EventKind::PointerEnter => Some(EventMask::POINTER_ENTER),
            EventKind::PointerLeave => Some(EventMask::POINTER_LEAVE),
            EventKind::PointerMove => Some(EventMask::POINTER_MOVE),
            EventKind::PointerMoveGlobal => Some(EventMask::POINTER_MOVE_GLOBAL),
            _ => None,
        }
    }

    fn contact_slot(self) -> Option<usize> {
        match self {
            EventKind::PointerDown => Some(0),
            EventKind::PointerUp => Some(1),
            EventKind::PointerClick => Some(2),
            EventKind::DragMove => Some(3),
            EventKind::Wheel => Some(4),
            _ => None,
        }
    }
}

const CONTACT_DOWN: usize = 0;
const CONTACT_UP: usize = 1;
const CONTACT_CLICK: usize = 2;
const CONTACT_DRAG: usize = 3;
const CONTACT_WHEEL: usize = 4;
const CONTACT_COUNT: usize = 5;

bitflags! {
    /// Move-family subscription bits for one node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub(crate) struct EventMask: u8 {
        const POINTER_OUT = 1 << 0;
        const POINTER_OVER = 1 << 1;
        const POINTER_ENTER = 1 << 2;
        const POINTER_LEAVE = 1 << 3;
        const POINTER_MOVE = 1 << 4;
        const POINTER_MOVE_GLOBAL = 1 << 5;
    }
}

/// Cursor the host should display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorIcon {
    #[default]
    Default,
    Pointer,
    Move,
    Grab,
    Grabbing,
    Text,
    Crosshair,
    NotAllowed,
}

/// Raw input fed by the host, in device coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerMove { x: f64, y: f64 },
    PointerDown { x: f64, y: f64 },
    PointerUp { x: f64, y: f64 },
    Wheel { x: f64, y: f64, delta: WheelDelta },
    /// Touch contact; answered `Handled` during an active drag so the host
    /// can suppress the synthetic click that follows.
    TouchStart,
}

/// Wheel scroll amounts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelDelta {
    pub x: f64,
    pub y: f64,
}

impl WheelDelta {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Whether the dominant scroll axis is horizontal.
    pub fn is_horizontal(&self) -> bool {
        self.x.abs() > self.y.abs()
    }
}

/// Whether a dispatched input event found a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResponse {
    Ignored,
    Handled,
}

/// Payload delivered to node listeners.
#[derive(Debug, Clone, Copy)]
pub struct NodeEvent {
    /// Node the listener was registered on.
    pub node: NodeId,
    pub kind: EventKind,
    /// Pointer position in the node's local space; for `DragMove` and
    /// `DragEnd` it is in the parent's space, matching the drag origin.
    pub position: Point,
    detail: Detail,
}

#[derive(Debug, Clone, Copy)]
enum Detail {
    Pointer,
    Drag { origin: Point, offset: Vec2 },
    Wheel(WheelDelta),
}

impl NodeEvent {
    fn pointer(node: NodeId, kind: EventKind, position: Point) -> Self {
        Self {
            node,
            kind,
            position,
            detail: Detail::Pointer,
        }
    }

    fn drag(node: NodeId, kind: EventKind, position: Point, origin: Point, offset: Vec2) -> Self {
        Self {
            node,
            kind,
            position,
            detail: Detail::Drag { origin, offset },
        }
    }

    fn wheel(node: NodeId, position: Point, delta: WheelDelta) -> Self {
        Self {
            node,
            kind: EventKind::Wheel,
            position,
            detail: Detail::Wheel(delta),
        }
    }

    /// Where the drag started, in the dragged node's parent space.
    pub fn origin(&self) -> Option<Point> {
        match self.detail {
            Detail::Drag { origin, .. } => Some(origin),
            _ => None,
        }
    }

    /// Motion since the previous drag sample.
    pub fn offset(&self) -> Option<Vec2> {
        match self.detail {
            Detail::Drag { offset, .. } => Some(offset),
            _ => None,
        }
    }

    /// Scroll amounts, for wheel events.
    pub fn wheel_delta(&self) -> Option<WheelDelta> {
        match self.detail {
            Detail::Wheel(delta) => Some(delta),
            _ => None,
        }
    }
}

/// Listener callback. Receives the graph handle, so it can mutate nodes,
/// render, or register further listeners.
pub type EventCallback = Rc<dyn Fn(&Graph, &NodeEvent)>;

/// Handle to one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId {
    kind: EventKind,
    seq: u32,
}

/// Per-node listener table, created lazily on first registration.
pub(crate) struct EventMeta {
    listeners: [Vec<(u32, EventCallback)>; EventKind::COUNT],
    next_seq: u32,
    pub(crate) cursor: CursorIcon,
    pub(crate) move_mask: EventMask,
}

impl EventMeta {
    pub(crate) fn new() -> Self {
        Self {
            listeners: Default::default(),
            next_seq: 0,
            cursor: CursorIcon::Default,
            move_mask: EventMask::empty(),
        }
    }

    pub(crate) fn add(&mut self, kind: EventKind, callback: EventCallback) -> ListenerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.listeners[kind.slot()].push((seq, callback));
        if let Some(bit) = kind.move_bit() {
            self.move_mask |= bit;
        }
        ListenerId { kind, seq }
    }

    /// Remove one listener; returns whether it was present.
    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let list = &mut self.listeners[id.kind.slot()];
        let before = list.len();
        list.retain(|(seq, _)| *seq != id.seq);
        let removed = list.len() != before;
        if removed && list.is_empty() {
            if let Some(bit) = id.kind.move_bit() {
                self.move_mask.remove(bit);
            }
        }
        removed
    }

    pub(crate) fn has(&self, kind: EventKind) -> bool {
        !self.listeners[kind.slot()].is_empty()
    }

    fn wants(&self, bit: EventMask) -> bool {
        self.move_mask.contains(bit)
    }

    fn push_fires(&self, fires: &mut Vec<Fire>, event: NodeEvent) {
        for (_, callback) in &self.listeners[event.kind.slot()] {
            fires.push(Fire {
                callback: callback.clone(),
                event,
            });
        }
    }
}

/// One planned listener invocation.
pub(crate) struct Fire {
    pub(crate) callback: EventCallback,
    pub(crate) event: NodeEvent,
}

#[derive(Clone, Copy)]
struct DragState {
    node: NodeId,
    origin: Point,
    previous: Point,
}

pub(crate) struct EventManager {
    /// Nodes listening for at least one move-family kind, insertion order.
    move_nodes: Vec<NodeId>,
    /// Nodes listening per contact kind, insertion order.
    contact_nodes: [Vec<NodeId>; CONTACT_COUNT],
    hover_node: Option<NodeId>,
    entered: HashSet<NodeId>,
    entered_scratch: HashSet<NodeId>,
    down_node: Option<NodeId>,
    drag: Option<DragState>,
    drag_occurred: bool,
    /// Composed transforms for the current dispatch only.
    transform_cache: HashMap<NodeId, Affine>,
    pub(crate) cursor: CursorIcon,
    scratch: Vec<NodeId>,
    walk_scratch: Vec<NodeId>,
}

impl EventManager {
    pub(crate) fn new() -> Self {
        Self {
            move_nodes: Vec::new(),
            contact_nodes: Default::default(),
            hover_node: None,
            entered: HashSet::new(),
            entered_scratch: HashSet::new(),
            down_node: None,
            drag: None,
            drag_occurred: false,
            transform_cache: HashMap::new(),
            cursor: CursorIcon::Default,
            scratch: Vec::new(),
            walk_scratch: Vec::new(),
        }
    }

    /// Reconcile a node's registry membership with its listener table.
    pub(crate) fn sync_node(&mut self, node: NodeId, meta: &EventMeta) {
        sync_membership(&mut self.move_nodes, node, !meta.move_mask.is_empty());
        for kind in [
            EventKind::PointerDown,
            EventKind::PointerUp,
            EventKind::PointerClick,
            EventKind::DragMove,
            EventKind::Wheel,
        ] {
            let slot = kind.contact_slot().expect("contact kind without slot");
            sync_membership(&mut self.contact_nodes[slot], node, meta.has(kind));
        }
    }

    /// Drop a node from every registry (detach or destroy).
    pub(crate) fn remove_node(&mut self, node: NodeId) {
        self.move_nodes.retain(|&n| n != node);
        for list in &mut self.contact_nodes {
            list.retain(|&n| n != node);
        }
    }

    /// Forget all registrations and dispatch state.
    pub(crate) fn clear(&mut self) {
        self.move_nodes.clear();
        for list in &mut self.contact_nodes {
            list.clear();
        }
        self.hover_node = None;
        self.entered.clear();
        self.down_node = None;
        self.drag = None;
        self.drag_occurred = false;
        self.transform_cache.clear();
        self.cursor = CursorIcon::Default;
    }

    /// Rendering replaces node transforms wholesale, so drop the cache.
    pub(crate) fn on_render(&mut self) {
        self.transform_cache.clear();
    }

    pub(crate) fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Plan the listener invocations for one input event. The plan is fired
    /// by the graph after every internal borrow is released.
    pub(crate) fn plan(
        &mut self,
        scene: &mut Scene,
        input: &InputEvent,
        fires: &mut Vec<Fire>,
    ) -> EventResponse {
        scene.ensure_indexes();
        self.transform_cache.clear();
        let response = match *input {
            InputEvent::PointerMove { x, y } => self.plan_move(scene, Point::new(x, y), fires),
            InputEvent::PointerDown { x, y } => self.plan_down(scene, Point::new(x, y), fires),
            InputEvent::PointerUp { x, y } => self.plan_up(scene, Point::new(x, y), fires),
            InputEvent::Wheel { x, y, delta } => {
                self.plan_wheel(scene, Point::new(x, y), delta, fires)
            }
            InputEvent::TouchStart => {
                if self.drag.is_some() {
                    EventResponse::Handled
                } else {
                    EventResponse::Ignored
                }
            }
        };
        if !fires.is_empty() {
            log::trace!("{input:?}: {} listener call(s) planned", fires.len());
        }
        response
    }

    fn plan_move(&mut self, scene: &Scene, device: Point, fires: &mut Vec<Fire>) -> EventResponse {
        let mut nodes = mem::take(&mut self.scratch);
        nodes.clear();
        nodes.extend_from_slice(&self.move_nodes);

        let mut entered_next = mem::take(&mut self.entered_scratch);
        entered_next.clear();
        let mut winner: Option<(NodeId, u32)> = None;

        for &node in &nodes {
            let data = scene.node(node);
            let meta = data
                .events
                .as_ref()
                .expect("indexed node without a listener table");
            let local = self.resolve_local(scene, node, device);
            if scene.contains(node, local) {
                entered_next.insert(node);
                if meta.wants(EventMask::POINTER_ENTER) && !self.entered.contains(&node) {
                    meta.push_fires(
                        fires,
                        NodeEvent::pointer(node, EventKind::PointerEnter, local),
                    );
                }
                if meta.wants(EventMask::POINTER_MOVE) {
                    meta.push_fires(fires, NodeEvent::pointer(node, EventKind::PointerMove, local));
                }
                let index = data.index;
                if winner.map_or(true, |(_, top)| index > top) {
                    winner = Some((node, index));
                }
            } else if self.entered.contains(&node) && meta.wants(EventMask::POINTER_LEAVE) {
                meta.push_fires(
                    fires,
                    NodeEvent::pointer(node, EventKind::PointerLeave, local),
                );
            }
            if meta.wants(EventMask::POINTER_MOVE_GLOBAL) {
                meta.push_fires(
                    fires,
                    NodeEvent::pointer(node, EventKind::PointerMoveGlobal, local),
                );
            }
        }

        nodes.clear();
        self.scratch = nodes;
        self.entered_scratch = mem::replace(&mut self.entered, entered_next);

        let new_hover = winner.map(|(node, _)| node);
        if new_hover != self.hover_node {
            if let Some(old) = self.hover_node {
                if let Some(data) = scene.get(old) {
                    let local = self.resolve_local(scene, old, device);
                    if let Some(meta) = data.events.as_ref() {
                        meta.push_fires(
                            fires,
                            NodeEvent::pointer(old, EventKind::PointerOut, local),
                        );
                    }
                }
                self.cursor = CursorIcon::Default;
            }
            if let Some(new) = new_hover {
                let local = self.resolve_local(scene, new, device);
                let meta = scene
                    .node(new)
                    .events
                    .as_ref()
                    .expect("hover winner without a listener table");
                meta.push_fires(fires, NodeEvent::pointer(new, EventKind::PointerOver, local));
                self.cursor = meta.cursor;
            }
            self.hover_node = new_hover;
        }

        if self.drag.is_some() {
            self.plan_drag_step(scene, device, EventKind::DragMove, fires);
        }

        if new_hover.is_some() || self.drag.is_some() {
            EventResponse::Handled
        } else {
            EventResponse::Ignored
        }
    }

    fn plan_down(&mut self, scene: &Scene, device: Point, fires: &mut Vec<Fire>) -> EventResponse {
        let winner = self.topmost_contact(
            scene,
            device,
            &[CONTACT_DOWN, CONTACT_CLICK, CONTACT_DRAG],
        );
        let Some((node, local)) = winner else {
            self.down_node = None;
            return EventResponse::Ignored;
        };
        self.down_node = Some(node);
        self.drag_occurred = false;
        let meta = scene
            .node(node)
            .events
            .as_ref()
            .expect("contact winner without a listener table");
        meta.push_fires(fires, NodeEvent::pointer(node, EventKind::PointerDown, local));
        if meta.has(EventKind::DragMove) {
            let origin = self.resolve_in_parent(scene, node, device);
            self.drag = Some(DragState {
                node,
                origin,
                previous: origin,
            });
            log::debug!("drag start on {node:?}");
            meta.push_fires(
                fires,
                NodeEvent::drag(node, EventKind::DragStart, local, origin, Vec2::ZERO),
            );
        }
        EventResponse::Handled
    }

    fn plan_up(&mut self, scene: &Scene, device: Point, fires: &mut Vec<Fire>) -> EventResponse {
        let winner = self.topmost_contact(scene, device, &[CONTACT_UP, CONTACT_CLICK]);
        if let Some((node, local)) = winner {
            let meta = scene
                .node(node)
                .events
                .as_ref()
                .expect("contact winner without a listener table");
            meta.push_fires(fires, NodeEvent::pointer(node, EventKind::PointerUp, local));
            if self.down_node == Some(node) && !self.drag_occurred {
                meta.push_fires(
                    fires,
                    NodeEvent::pointer(node, EventKind::PointerClick, local),
                );
            }
        }
        // The press cycle ends here either way.
        self.down_node = None;
        let dragged = self.drag.is_some();
        if dragged {
            self.plan_drag_step(scene, device, EventKind::DragEnd, fires);
            if let Some(drag) = self.drag.take() {
                log::debug!("drag end on {:?}", drag.node);
            }
        }
        if winner.is_some() || dragged {
            EventResponse::Handled
        } else {
            EventResponse::Ignored
        }
    }

    fn plan_wheel(
        &mut self,
        scene: &Scene,
        device: Point,
        delta: WheelDelta,
        fires: &mut Vec<Fire>,
    ) -> EventResponse {
        let winner = self.topmost_contact(scene, device, &[CONTACT_WHEEL]);
        let Some((node, local)) = winner else {
            return EventResponse::Ignored;
        };
        let meta = scene
            .node(node)
            .events
            .as_ref()
            .expect("contact winner without a listener table");
        meta.push_fires(fires, NodeEvent::wheel(node, local, delta));
        EventResponse::Handled
    }

    /// One drag sample: position and step offset in the parent's space.
    fn plan_drag_step(
        &mut self,
        scene: &Scene,
        device: Point,
        kind: EventKind,
        fires: &mut Vec<Fire>,
    ) {
        let drag = *self
            .drag
            .as_ref()
            .expect("drag step with no active drag state");
        if scene.get(drag.node).is_none() {
            // The dragged node was destroyed mid-drag.
            self.drag = None;
            return;
        }
        let current = self.resolve_in_parent(scene, drag.node, device);
        let offset = current - drag.previous;
        let meta = scene
            .node(drag.node)
            .events
            .as_ref()
            .expect("dragged node without a listener table");
        meta.push_fires(
            fires,
            NodeEvent::drag(drag.node, kind, current, drag.origin, offset),
        );
        self.drag = Some(DragState {
            previous: current,
            ..drag
        });
        if kind == EventKind::DragMove {
            self.drag_occurred = true;
        }
    }

    /// Topmost contained node among the given contact registries.
    fn topmost_contact(
        &mut self,
        scene: &Scene,
        device: Point,
        slots: &[usize],
    ) -> Option<(NodeId, Point)> {
        let mut candidates = mem::take(&mut self.scratch);
        candidates.clear();
        for &slot in slots {
            for &node in &self.contact_nodes[slot] {
                if !candidates.contains(&node) {
                    candidates.push(node);
                }
            }
        }
        let mut winner: Option<(NodeId, u32, Point)> = None;
        for &node in &candidates {
            let local = self.resolve_local(scene, node, device);
            if !scene.contains(node, local) {
                continue;
            }
            let index = scene.node(node).index;
            if winner.map_or(true, |(_, top, _)| index > top) {
                winner = Some((node, index, local));
            }
        }
        candidates.clear();
        self.scratch = candidates;
        winner.map(|(node, _, local)| (node, local))
    }

    /// Resolve a device point into `node`'s local space.
    fn resolve_local(&mut self, scene: &Scene, node: NodeId, device: Point) -> Point {
        self.composed_cached(scene, node).inverse() * device
    }

    /// Resolve a device point into `node`'s parent space.
    fn resolve_in_parent(&mut self, scene: &Scene, node: NodeId, device: Point) -> Point {
        match scene.node(node).parent {
            Some(parent) => self.composed_cached(scene, parent).inverse() * device,
            None => device,
        }
    }

    /// Composed ancestor transform for `node`, memoized for this dispatch.
    ///
    /// Walks up only to the nearest cached ancestor, then composes downward,
    /// caching every intermediate so sibling lookups amortize the walk.
    fn composed_cached(&mut self, scene: &Scene, node: NodeId) -> Affine {
        if let Some(&transform) = self.transform_cache.get(&node) {
            return transform;
        }
        let mut walk = mem::take(&mut self.walk_scratch);
        walk.clear();
        let mut base = Affine::IDENTITY;
        let mut current = Some(node);
        while let Some(id) = current {
            if let Some(&cached) = self.transform_cache.get(&id) {
                base = cached;
                break;
            }
            walk.push(id);
            current = scene.node(id).parent;
        }
        let mut transform = base;
        for &id in walk.iter().rev() {
            let data = scene.node(id);
            if data.has_transform() {
                transform = transform * data.local_transform();
            }
            self.transform_cache.insert(id, transform);
        }
        walk.clear();
        self.walk_scratch = walk;
        transform
    }
}

fn sync_membership(list: &mut Vec<NodeId>, node: NodeId, member: bool) {
    let present = list.contains(&node);
    if member && !present {
        list.push(node);
    } else if !member && present {
        list.retain(|&n| n != node);
    }
}
