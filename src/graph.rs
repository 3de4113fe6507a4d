//! The scene graph handle.
//!
//! [`Graph`] owns the node arena, the style cache, the renderer, the event
//! manager and the frame scheduler behind one cheaply clonable handle.
//! Everything flows through it: nodes are created, linked and mutated via
//! graph methods, `render` walks the tree onto the canvas, and `dispatch`
//! feeds host input through the event manager. Listener callbacks receive a
//! `&Graph` and may re-enter freely; no internal borrow is held while they
//! run.

use std::cell::RefCell;
use std::rc::Rc;

use kurbo::{Point, Rect};

use crate::canvas::{Canvas, TextMetrics};
use crate::events::{
    CursorIcon, EventKind, EventManager, EventMeta, EventResponse, Fire, InputEvent, ListenerId,
    NodeEvent,
};
use crate::pencil::Pencil;
use crate::scene::{Drawable, NodeId, Scene};
use crate::scheduler::{FrameId, Scheduler};
use crate::shape::Shape;
use crate::style::{Style, StyleOptions, Styles, TextStyle, TextStyleOptions};

/// Construction options for a [`Graph`].
#[derive(Debug, Clone, Copy)]
pub struct GraphOptions {
    /// Surface width in logical units.
    pub width: f64,
    /// Surface height in logical units.
    pub height: f64,
    /// Device pixels per logical unit.
    pub pixel_ratio: f64,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            pixel_ratio: 1.0,
        }
    }
}

impl GraphOptions {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn width(mut self, width: f64) -> Self {
        self.width = width;
        self
    }

    pub fn height(mut self, height: f64) -> Self {
        self.height = height;
        self
    }

    pub fn pixel_ratio(mut self, pixel_ratio: f64) -> Self {
        self.pixel_ratio = pixel_ratio;
        self
    }
}

struct GraphInner {
    scene: Scene,
    styles: Styles,
    pencil: Pencil,
    events: EventManager,
    scheduler: Scheduler,
    options: GraphOptions,
    backdrop: NodeId,
    render_frame: Option<FrameId>,
    destroyed: bool,
}

/// Shared handle to one scene graph.
#[derive(Clone)]
pub struct Graph {
    inner: Rc<RefCell<GraphInner>>,
}

impl Graph {
    pub fn new(canvas: Box<dyn Canvas>, options: GraphOptions) -> Self {
        let mut scene = Scene::new();
        let mut styles = Styles::new();
        // Full-surface backdrop for surface-wide listeners; its style has no
        // paints, so it never draws.
        let backdrop_style = styles.style(StyleOptions::default());
        let backdrop = scene.create(Some(Drawable::Shape(
            Shape::from(Rect::new(0.0, 0.0, options.width, options.height)),
            backdrop_style,
        )));
        let root = scene.root();
        scene.link(root, backdrop);
        scene.node_mut(backdrop).live = true;
        log::info!(
            "graph created: {}x{} at pixel ratio {}",
            options.width,
            options.height,
            options.pixel_ratio
        );
        Self {
            inner: Rc::new(RefCell::new(GraphInner {
                scene,
                styles,
                pencil: Pencil::new(canvas),
                events: EventManager::new(),
                scheduler: Scheduler::default(),
                options,
                backdrop,
                render_frame: None,
                destroyed: false,
            })),
        }
    }

    /// The tree root. Nodes added under it (or under any live node) become
    /// live and start receiving events.
    pub fn root(&self) -> NodeId {
        self.inner.borrow().scene.root()
    }

    /// The full-surface backdrop node, bottom-most child of the root.
    pub fn backdrop(&self) -> NodeId {
        self.inner.borrow().backdrop
    }

    /// The scheduler driving this graph's frames; clone-shareable.
    pub fn scheduler(&self) -> Scheduler {
        self.inner.borrow().scheduler.clone()
    }

    /// Run one scheduler tick with the host's frame timestamp.
    pub fn run_frame(&self, timestamp: f64) {
        let scheduler = self.inner.borrow().scheduler.clone();
        scheduler.run_frame(timestamp);
    }

    // ---- styles ----

    /// Intern a style; equal options return the identical instance.
    pub fn style(&self, options: StyleOptions) -> Style {
        self.inner.borrow_mut().styles.style(options)
    }

    /// Intern a text style; equal options return the identical instance.
    pub fn text_style(&self, options: TextStyleOptions) -> TextStyle {
        self.inner.borrow_mut().styles.text_style(options)
    }

    // ---- node lifecycle ----

    /// Allocate a detached node drawing `shape` with `style`.
    pub fn create_node(&self, shape: Shape, style: &Style) -> NodeId {
        self.inner
            .borrow_mut()
            .scene
            .create(Some(Drawable::Shape(shape, style.clone())))
    }

    /// Allocate a detached node with no drawable.
    pub fn create_container(&self) -> NodeId {
        self.inner.borrow_mut().scene.create(None)
    }

    /// Allocate a detached text node.
    pub fn create_text_node(
        &self,
        text: impl Into<String>,
        position: Point,
        style: &Style,
        text_style: &TextStyle,
    ) -> NodeId {
        self.inner.borrow_mut().scene.create(Some(Drawable::Text {
            text: text.into(),
            position,
            style: style.clone(),
            text_style: text_style.clone(),
        }))
    }

    /// Link `child` under `parent`, topmost among its siblings. The child
    /// subtree takes the parent's liveness: under a live parent its
    /// listeners are indexed, under a detached one they are dropped.
    pub fn add(&self, parent: NodeId, child: NodeId) {
        let inner = &mut *self.inner.borrow_mut();
        let GraphInner { scene, events, .. } = inner;
        scene.link(parent, child);
        if scene.node(parent).live {
            attach_subtree(scene, events, child);
        } else if scene.node(child).live {
            detach_subtree(scene, events, child);
        }
    }

    /// Detach `child` from `parent`, keeping it alive for re-insertion.
    /// Returns whether anything was detached.
    pub fn remove(&self, parent: NodeId, child: NodeId) -> bool {
        let inner = &mut *self.inner.borrow_mut();
        let GraphInner { scene, events, .. } = inner;
        let was_live = scene.node(child).live;
        let detached = scene.unlink(parent, child);
        if detached && was_live {
            detach_subtree(scene, events, child);
        }
        detached
    }

    /// Detach and free every child of `parent`.
    pub fn clear(&self, parent: NodeId) {
        let inner = &mut *self.inner.borrow_mut();
        let GraphInner { scene, events, .. } = inner;
        for child in scene.take_children(parent) {
            if scene.node(child).live {
                detach_subtree(scene, events, child);
            }
            scene.destroy(child);
        }
    }

    /// Detach `node` from its parent (if any) and free its whole subtree.
    /// The node's id, and every descendant id, goes stale.
    pub fn destroy_node(&self, node: NodeId) {
        let inner = &mut *self.inner.borrow_mut();
        let GraphInner { scene, events, .. } = inner;
        if scene.get(node).is_none() {
            return;
        }
        if scene.node(node).live {
            detach_subtree(scene, events, node);
        }
        scene.destroy(node);
    }

    /// Mark `node`'s subtree live and index its listeners, for subtrees
    /// wired outside the normal `add` path.
    pub fn attach(&self, node: NodeId) {
        let inner = &mut *self.inner.borrow_mut();
        let GraphInner { scene, events, .. } = inner;
        attach_subtree(scene, events, node);
    }

    /// Mark `node`'s subtree dead and drop its listeners from the indexes.
    pub fn detach(&self, node: NodeId) {
        let inner = &mut *self.inner.borrow_mut();
        let GraphInner { scene, events, .. } = inner;
        detach_subtree(scene, events, node);
    }

    /// Whether `node` still refers to an allocated node.
    pub fn alive(&self, node: NodeId) -> bool {
        self.inner.borrow().scene.get(node).is_some()
    }

    /// The node's parent; `None` for the root, detached or dead nodes.
    pub fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.inner.borrow().scene.get(node).and_then(|data| data.parent)
    }

    /// The node's children, in paint order.
    pub fn children_of(&self, node: NodeId) -> Vec<NodeId> {
        self.inner.borrow().scene.node(node).children.clone()
    }

    // ---- node properties ----

    pub fn position(&self, node: NodeId) -> Point {
        let inner = self.inner.borrow();
        let data = inner.scene.node(node);
        Point::new(data.x, data.y)
    }

    pub fn set_position(&self, node: NodeId, x: f64, y: f64) {
        let mut inner = self.inner.borrow_mut();
        let data = inner.scene.node_mut(node);
        data.x = x;
        data.y = y;
        data.invalidate_transform();
    }

    /// Rotation in radians.
    pub fn rotation(&self, node: NodeId) -> f64 {
        self.inner.borrow().scene.node(node).rotation
    }

    pub fn set_rotation(&self, node: NodeId, rotation: f64) {
        let mut inner = self.inner.borrow_mut();
        let data = inner.scene.node_mut(node);
        data.rotation = rotation;
        data.invalidate_transform();
    }

    /// Uniform scale factor.
    pub fn scale(&self, node: NodeId) -> f64 {
        self.inner.borrow().scene.node(node).scale
    }

    pub fn set_scale(&self, node: NodeId, scale: f64) {
        let mut inner = self.inner.borrow_mut();
        let data = inner.scene.node_mut(node);
        data.scale = scale;
        data.invalidate_transform();
    }

    pub fn visible(&self, node: NodeId) -> bool {
        self.inner.borrow().scene.node(node).visible
    }

    /// Hiding a node skips it and its whole subtree during rendering;
    /// hit-testing is unaffected.
    pub fn set_visible(&self, node: NodeId, visible: bool) {
        self.inner.borrow_mut().scene.node_mut(node).visible = visible;
    }

    pub fn alpha(&self, node: NodeId) -> f64 {
        self.inner.borrow().scene.node(node).alpha
    }

    /// Opacity in `[0, 1]`, multiplied down the subtree.
    pub fn set_alpha(&self, node: NodeId, alpha: f64) {
        self.inner.borrow_mut().scene.node_mut(node).alpha = alpha;
    }

    pub fn mask(&self, node: NodeId) -> Option<Shape> {
        self.inner.borrow().scene.node(node).mask.clone()
    }

    /// Clip the node's subtree to `mask`, in the node's local space.
    pub fn set_mask(&self, node: NodeId, mask: Option<Shape>) {
        self.inner.borrow_mut().scene.node_mut(node).mask = mask;
    }

    pub fn drawable(&self, node: NodeId) -> Option<Drawable> {
        self.inner.borrow().scene.node(node).drawable.clone()
    }

    pub fn set_drawable(&self, node: NodeId, drawable: Option<Drawable>) {
        self.inner.borrow_mut().scene.node_mut(node).drawable = drawable;
    }

    // ---- tags ----

    pub fn add_tag(&self, node: NodeId, tag: impl Into<String>) -> bool {
        self.inner
            .borrow_mut()
            .scene
            .node_mut(node)
            .tags
            .insert(tag.into())
    }

    pub fn remove_tag(&self, node: NodeId, tag: &str) -> bool {
        self.inner.borrow_mut().scene.node_mut(node).tags.remove(tag)
    }

    /// First node in `node`'s subtree (pre-order, inclusive) carrying `tag`.
    pub fn query(&self, node: NodeId, tag: &str) -> Option<NodeId> {
        self.inner.borrow().scene.query(node, tag)
    }

    /// Every node in `node`'s subtree (pre-order, inclusive) carrying `tag`.
    pub fn query_all(&self, node: NodeId, tag: &str) -> Vec<NodeId> {
        self.inner.borrow().scene.query_all(node, tag)
    }

    // ---- events ----

    /// Register a listener; the returned id removes exactly this listener.
    pub fn on(
        &self,
        node: NodeId,
        kind: EventKind,
        callback: impl Fn(&Graph, &NodeEvent) + 'static,
    ) -> ListenerId {
        let inner = &mut *self.inner.borrow_mut();
        let GraphInner { scene, events, .. } = inner;
        let data = scene.node_mut(node);
        let live = data.live;
        let meta = data
            .events
            .get_or_insert_with(|| Box::new(EventMeta::new()));
        let id = meta.add(kind, Rc::new(callback));
        if live {
            events.sync_node(node, meta);
        }
        id
    }

    /// Remove one listener; returns whether it was present.
    pub fn off(&self, node: NodeId, id: ListenerId) -> bool {
        let inner = &mut *self.inner.borrow_mut();
        let GraphInner { scene, events, .. } = inner;
        let Some(data) = scene.get_mut(node) else {
            return false;
        };
        let live = data.live;
        let Some(meta) = data.events.as_mut() else {
            return false;
        };
        let removed = meta.remove(id);
        if removed && live {
            events.sync_node(node, meta);
        }
        removed
    }

    /// Cursor icon shown while this node is hovered.
    pub fn set_cursor(&self, node: NodeId, cursor: CursorIcon) {
        let mut inner = self.inner.borrow_mut();
        inner
            .scene
            .node_mut(node)
            .events
            .get_or_insert_with(|| Box::new(EventMeta::new()))
            .cursor = cursor;
    }

    /// The cursor the host should currently display.
    pub fn cursor(&self) -> CursorIcon {
        self.inner.borrow().events.cursor
    }

    /// Feed one raw input event through the event machinery. Listener
    /// callbacks run after all internal borrows are released, so they may
    /// re-enter the graph freely.
    pub fn dispatch(&self, input: &InputEvent) -> EventResponse {
        let mut fires: Vec<Fire> = Vec::new();
        let response = {
            let inner = &mut *self.inner.borrow_mut();
            if inner.destroyed {
                EventResponse::Ignored
            } else {
                let GraphInner { scene, events, .. } = inner;
                events.plan(scene, input, &mut fires)
            }
        };
        for fire in &fires {
            (fire.callback)(self, &fire.event);
        }
        response
    }

    // ---- rendering ----

    /// Redraw the whole tree immediately.
    pub fn render(&self) {
        let inner = &mut *self.inner.borrow_mut();
        if inner.destroyed {
            log::warn!("render on a destroyed graph");
            return;
        }
        let GraphInner {
            scene,
            pencil,
            events,
            options,
            ..
        } = inner;
        pencil.begin_frame(options.width, options.height, options.pixel_ratio);
        render_node(pencil, scene, scene.root());
        events.on_render();
        log::trace!("frame rendered");
    }

    /// Schedule one `render()` on the next frame tick; collapses repeated
    /// requests into a single redraw.
    pub fn request_render(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.destroyed || inner.render_frame.is_some() {
            return;
        }
        let weak = Rc::downgrade(&self.inner);
        let id = inner.scheduler.request_render_frame(move |_| {
            if let Some(strong) = weak.upgrade() {
                strong.borrow_mut().render_frame = None;
                Graph { inner: strong }.render();
            }
        });
        inner.render_frame = Some(id);
    }

    /// Measure a text run with the canvas backend.
    pub fn measure_text(&self, text: &str, text_style: &TextStyle) -> TextMetrics {
        self.inner.borrow_mut().pencil.measure_text(text, text_style)
    }

    /// Tear down the graph: cancel its pending frame and drop every listener
    /// table, breaking listener-to-graph reference cycles. Further renders
    /// and dispatches are no-ops.
    pub fn destroy(&self) {
        let inner = &mut *self.inner.borrow_mut();
        if inner.destroyed {
            return;
        }
        inner.destroyed = true;
        if let Some(frame) = inner.render_frame.take() {
            inner.scheduler.cancel_render_frame(frame);
        }
        inner.events.clear();
        inner.scene.clear_listeners();
        log::info!("graph destroyed");
    }
}

fn attach_subtree(scene: &mut Scene, events: &mut EventManager, node: NodeId) {
    let mut subtree = Vec::new();
    scene.collect_subtree(node, &mut subtree);
    for &id in &subtree {
        let data = scene.node_mut(id);
        data.live = true;
        if let Some(meta) = data.events.as_ref() {
            events.sync_node(id, meta);
        }
    }
    log::debug!("attached {} nodes under {node:?}", subtree.len());
}

fn detach_subtree(scene: &mut Scene, events: &mut EventManager, node: NodeId) {
    let mut subtree = Vec::new();
    scene.collect_subtree(node, &mut subtree);
    for &id in &subtree {
        scene.node_mut(id).live = false;
        events.remove_node(id);
    }
    log::debug!("detached {} nodes under {node:?}", subtree.len());
}

/// Depth-first paint. Identity-transform, full-alpha, unmasked nodes skip
/// the save/restore bracket.
fn render_node(pencil: &mut Pencil, scene: &Scene, node: NodeId) {
    let data = scene.node(node);
    if !data.visible {
        return;
    }
    let bracket = data.has_transform() || data.mask.is_some() || data.alpha != 1.0;
    if bracket {
        pencil.save();
        if data.has_transform() {
            pencil.transform(data.local_transform());
        }
        if data.alpha != 1.0 {
            pencil.multiply_alpha(data.alpha);
        }
        if let Some(mask) = &data.mask {
            pencil.mask(mask);
        }
    }
    match &data.drawable {
        Some(Drawable::Shape(shape, style)) => pencil.draw(shape, style),
        Some(Drawable::Text {
            text,
            position,
            style,
            text_style,
        }) => pencil.draw_text(text, *position, style, text_style),
        None => {}
    }
    for &child in &data.children {
        render_node(pencil, scene, child);
    }
    if bracket {
        pencil.restore();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Command, Recorder};
    use crate::style::Color;
    use std::cell::Cell;

    fn test_graph() -> (Graph, Recorder) {
        let recorder = Recorder::new();
        let graph = Graph::new(
            Box::new(recorder.clone()),
            GraphOptions::new(200.0, 200.0),
        );
        (graph, recorder)
    }

    fn filled_circle(graph: &Graph, center: (f64, f64), radius: f64) -> NodeId {
        let style = graph.style(StyleOptions::default().fill(Color::BLACK));
        graph.create_node(Shape::circle(center, radius), &style)
    }

    #[test]
    fn test_backdrop_is_bottom_most_and_live() {
        let (graph, _) = test_graph();
        let backdrop = graph.backdrop();
        assert_eq!(graph.parent_of(backdrop), Some(graph.root()));
        assert_eq!(graph.children_of(graph.root())[0], backdrop);

        let hits = Rc::new(Cell::new(0));
        let count = hits.clone();
        graph.on(backdrop, EventKind::PointerDown, move |_, _| {
            count.set(count.get() + 1);
        });
        // Backdrop catches presses anywhere on the surface.
        let response = graph.dispatch(&InputEvent::PointerDown { x: 5.0, y: 195.0 });
        assert_eq!(response, EventResponse::Handled);
        assert_eq!(hits.get(), 1);
        // But loses to any node stacked above it.
        let node = filled_circle(&graph, (50.0, 50.0), 10.0);
        graph.on(node, EventKind::PointerDown, |_, _| {});
        graph.add(graph.root(), node);
        graph.dispatch(&InputEvent::PointerDown { x: 50.0, y: 50.0 });
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_backdrop_never_draws() {
        let (graph, log) = test_graph();
        graph.render();
        let commands = log.take();
        assert!(!commands.iter().any(|c| matches!(c, Command::Rect(_))));
    }

    #[test]
    fn test_detached_nodes_receive_no_events() {
        let (graph, _) = test_graph();
        let node = filled_circle(&graph, (50.0, 50.0), 10.0);
        let hits = Rc::new(Cell::new(0));
        let count = hits.clone();
        graph.on(node, EventKind::PointerDown, move |_, _| {
            count.set(count.get() + 1);
        });
        graph.dispatch(&InputEvent::PointerDown { x: 50.0, y: 50.0 });
        assert_eq!(hits.get(), 0);

        graph.add(graph.root(), node);
        graph.dispatch(&InputEvent::PointerDown { x: 50.0, y: 50.0 });
        assert_eq!(hits.get(), 1);

        assert!(graph.remove(graph.root(), node));
        graph.dispatch(&InputEvent::PointerDown { x: 50.0, y: 50.0 });
        assert_eq!(hits.get(), 1);

        // Re-adding restores the same listener registration.
        graph.add(graph.root(), node);
        graph.dispatch(&InputEvent::PointerDown { x: 50.0, y: 50.0 });
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_moving_under_detached_parent_takes_subtree_dead() {
        let (graph, _) = test_graph();
        let node = filled_circle(&graph, (50.0, 50.0), 10.0);
        let hits = Rc::new(Cell::new(0));
        let count = hits.clone();
        graph.on(node, EventKind::PointerDown, move |_, _| {
            count.set(count.get() + 1);
        });
        graph.add(graph.root(), node);
        graph.dispatch(&InputEvent::PointerDown { x: 50.0, y: 50.0 });
        assert_eq!(hits.get(), 1);

        // Re-parenting under a container that was never attached takes
        // the node out of dispatch entirely.
        let holder = graph.create_container();
        graph.add(holder, node);
        let response = graph.dispatch(&InputEvent::PointerDown { x: 50.0, y: 50.0 });
        assert_eq!(hits.get(), 1);
        assert_eq!(response, EventResponse::Ignored);

        // Attaching the container brings the whole subtree back.
        graph.add(graph.root(), holder);
        graph.dispatch(&InputEvent::PointerDown { x: 50.0, y: 50.0 });
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_render_walks_visible_nodes_only() {
        let (graph, log) = test_graph();
        let node = filled_circle(&graph, (50.0, 50.0), 10.0);
        graph.add(graph.root(), node);
        graph.render();
        assert!(log
            .take()
            .iter()
            .any(|c| matches!(c, Command::Ellipse { .. })));

        graph.set_visible(node, false);
        graph.render();
        assert!(!log
            .take()
            .iter()
            .any(|c| matches!(c, Command::Ellipse { .. })));
    }

    #[test]
    fn test_render_fast_path_skips_save_restore() {
        let (graph, log) = test_graph();
        let node = filled_circle(&graph, (50.0, 50.0), 10.0);
        graph.add(graph.root(), node);
        graph.render();
        let plain = log.take();
        assert!(!plain.iter().any(|c| matches!(c, Command::Save)));

        graph.set_position(node, 10.0, 0.0);
        graph.render();
        let bracketed = log.take();
        assert!(bracketed.iter().any(|c| matches!(c, Command::Save)));
        assert!(bracketed.iter().any(|c| matches!(c, Command::Transform(_))));
        assert!(bracketed.iter().any(|c| matches!(c, Command::Restore)));
    }

    #[test]
    fn test_render_applies_mask_and_alpha_bracket() {
        let (graph, log) = test_graph();
        let group = graph.create_container();
        let node = filled_circle(&graph, (50.0, 50.0), 10.0);
        graph.add(graph.root(), group);
        graph.add(group, node);
        graph.set_alpha(group, 0.5);
        graph.set_mask(group, Some(Shape::from(Rect::new(0.0, 0.0, 60.0, 60.0))));
        graph.render();
        let commands = log.take();
        let alpha_at = commands
            .iter()
            .position(|c| matches!(c, Command::SetAlpha(_)))
            .expect("alpha write");
        let clip_at = commands
            .iter()
            .position(|c| matches!(c, Command::Clip))
            .expect("mask clip");
        let draw_at = commands
            .iter()
            .position(|c| matches!(c, Command::Fill(_)))
            .expect("child fill");
        assert!(alpha_at < clip_at && clip_at < draw_at);
        assert_eq!(commands[alpha_at], Command::SetAlpha(0.5));
    }

    #[test]
    fn test_listeners_can_reenter_the_graph() {
        let (graph, _) = test_graph();
        let node = filled_circle(&graph, (50.0, 50.0), 10.0);
        graph.add(graph.root(), node);
        graph.on(node, EventKind::PointerDown, |graph, event| {
            let position = graph.position(event.node);
            graph.set_position(event.node, position.x + 1.0, position.y);
            graph.render();
        });
        graph.dispatch(&InputEvent::PointerDown { x: 50.0, y: 50.0 });
        assert_eq!(graph.position(node), Point::new(1.0, 0.0));
    }

    #[test]
    fn test_request_render_batches_into_one_frame() {
        let (graph, log) = test_graph();
        graph.request_render();
        graph.request_render();
        assert!(log.take().is_empty());
        graph.run_frame(16.0);
        let frames = log
            .take()
            .iter()
            .filter(|c| matches!(c, Command::SetTransform(_)))
            .count();
        assert_eq!(frames, 1);
        // The slot frees up for the next batch.
        graph.request_render();
        graph.run_frame(32.0);
        assert_eq!(
            log.take()
                .iter()
                .filter(|c| matches!(c, Command::SetTransform(_)))
                .count(),
            1
        );
    }

    #[test]
    fn test_off_removes_exactly_one_listener() {
        let (graph, _) = test_graph();
        let node = filled_circle(&graph, (50.0, 50.0), 10.0);
        graph.add(graph.root(), node);
        let hits = Rc::new(Cell::new(0));
        let first = hits.clone();
        let id = graph.on(node, EventKind::PointerDown, move |_, _| {
            first.set(first.get() + 1);
        });
        let second = hits.clone();
        graph.on(node, EventKind::PointerDown, move |_, _| {
            second.set(second.get() + 10);
        });
        assert!(graph.off(node, id));
        assert!(!graph.off(node, id));
        graph.dispatch(&InputEvent::PointerDown { x: 50.0, y: 50.0 });
        assert_eq!(hits.get(), 10);
    }

    #[test]
    fn test_query_finds_tagged_nodes() {
        let (graph, _) = test_graph();
        let group = graph.create_container();
        let a = filled_circle(&graph, (10.0, 10.0), 5.0);
        let b = filled_circle(&graph, (30.0, 10.0), 5.0);
        graph.add(graph.root(), group);
        graph.add(group, a);
        graph.add(group, b);
        graph.add_tag(a, "dot");
        graph.add_tag(b, "dot");
        assert_eq!(graph.query(graph.root(), "dot"), Some(a));
        assert_eq!(graph.query_all(group, "dot"), vec![a, b]);
        assert!(graph.remove_tag(a, "dot"));
        assert_eq!(graph.query(graph.root(), "dot"), Some(b));
    }

    #[test]
    fn test_destroy_node_makes_ids_stale() {
        let (graph, _) = test_graph();
        let group = graph.create_container();
        let child = filled_circle(&graph, (10.0, 10.0), 5.0);
        graph.add(graph.root(), group);
        graph.add(group, child);
        graph.destroy_node(group);
        assert!(!graph.alive(group));
        assert!(!graph.alive(child));
        // Dispatch afterwards finds nothing and does not panic.
        let response = graph.dispatch(&InputEvent::PointerMove { x: 10.0, y: 10.0 });
        let _ = response;
    }

    #[test]
    fn test_destroy_releases_listener_cycles() {
        let (graph, _) = test_graph();
        let node = filled_circle(&graph, (50.0, 50.0), 10.0);
        graph.add(graph.root(), node);
        let captured = graph.clone();
        graph.on(node, EventKind::PointerDown, move |_, _| {
            captured.render();
        });
        let weak = Rc::downgrade(&graph.inner);
        graph.destroy();
        assert_eq!(graph.dispatch(&InputEvent::PointerDown { x: 50.0, y: 50.0 }),
            EventResponse::Ignored);
        drop(graph);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_measure_text_round_trips_the_backend() {
        let (graph, _) = test_graph();
        let text_style = graph.text_style(Default::default());
        assert_eq!(graph.measure_text("hello", &text_style).width, 30.0);
    }
}
