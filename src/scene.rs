//! The node arena and tree structure behind a graph.
//!
//! Nodes live in a generational arena and are addressed by [`NodeId`];
//! freeing a node bumps its slot generation so stale ids can never alias a
//! later node. The scene owns pure structure and geometry: parent/child
//! links, lazily composed local transforms, z-order traversal indexes,
//! containment and tag queries. Listener bookkeeping and liveness
//! propagation are driven from the graph, which owns both the scene and the
//! event manager.

use std::cell::Cell;
use std::collections::HashSet;

use kurbo::{Affine, Point};

use crate::events::EventMeta;
use crate::shape::Shape;
use crate::style::{Style, TextStyle};

/// Generational handle to a node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

/// What a node draws, if anything.
#[derive(Debug, Clone)]
pub enum Drawable {
    Shape(Shape, Style),
    Text {
        text: String,
        position: Point,
        style: Style,
        text_style: TextStyle,
    },
}

pub(crate) struct NodeData {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) x: f64,
    pub(crate) y: f64,
    /// Rotation in radians.
    pub(crate) rotation: f64,
    /// Uniform scale.
    pub(crate) scale: f64,
    /// Cached local transform; empty means dirty.
    transform: Cell<Option<Affine>>,
    pub(crate) visible: bool,
    pub(crate) alpha: f64,
    pub(crate) mask: Option<Shape>,
    pub(crate) drawable: Option<Drawable>,
    pub(crate) tags: HashSet<String>,
    pub(crate) events: Option<Box<EventMeta>>,
    /// Pre-order traversal index; higher is topmost. 0 = unassigned.
    pub(crate) index: u32,
    /// Reachable from the scene root.
    pub(crate) live: bool,
}

impl NodeData {
    fn new(drawable: Option<Drawable>) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale: 1.0,
            transform: Cell::new(None),
            visible: true,
            alpha: 1.0,
            mask: None,
            drawable,
            tags: HashSet::new(),
            events: None,
            index: 0,
            live: false,
        }
    }

    /// Whether the local transform is anything but the identity.
    pub(crate) fn has_transform(&self) -> bool {
        self.x != 0.0 || self.y != 0.0 || self.rotation != 0.0 || self.scale != 1.0
    }

    /// The local transform, recomposed on demand after any setter.
    pub(crate) fn local_transform(&self) -> Affine {
        if let Some(transform) = self.transform.get() {
            return transform;
        }
        let transform = Affine::translate((self.x, self.y))
            * Affine::rotate(self.rotation)
            * Affine::scale(self.scale);
        self.transform.set(Some(transform));
        transform
    }

    pub(crate) fn invalidate_transform(&self) {
        self.transform.set(None);
    }
}

struct Slot {
    generation: u32,
    node: Option<NodeData>,
}

pub(crate) struct Scene {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    index_dirty: bool,
}

impl Scene {
    pub(crate) fn new() -> Self {
        let mut scene = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            index_dirty: true,
        };
        let mut root = NodeData::new(None);
        root.live = true;
        scene.slots.push(Slot {
            generation: 0,
            node: Some(root),
        });
        scene
    }

    pub(crate) fn root(&self) -> NodeId {
        self.root
    }

    pub(crate) fn create(&mut self, drawable: Option<Drawable>) -> NodeId {
        let node = NodeData::new(drawable);
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&NodeData> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    /// Immutable access that treats a stale id as a programming error.
    pub(crate) fn node(&self, id: NodeId) -> &NodeData {
        self.get(id).expect("stale NodeId: node was destroyed")
    }

    /// Mutable access that treats a stale id as a programming error.
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        self.get_mut(id).expect("stale NodeId: node was destroyed")
    }

    /// Link `child` under `parent`, reparenting if it was attached elsewhere.
    /// Appends at the end of the sibling list, making `child` topmost there;
    /// re-linking under the same parent moves it to the top of the stack.
    pub(crate) fn link(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(
            !self.is_ancestor_of(child, parent),
            "linking a node under its own descendant"
        );
        if let Some(previous) = self.node(child).parent {
            self.unlink(previous, child);
        }
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children.push(child);
        self.index_dirty = true;
    }

    /// Detach `child` from `parent`; a no-op when `child` is not its child.
    /// Returns whether anything was detached.
    pub(crate) fn unlink(&mut self, parent: NodeId, child: NodeId) -> bool {
        if self.node(child).parent != Some(parent) {
            return false;
        }
        let children = &mut self.node_mut(parent).children;
        if let Some(position) = children.iter().position(|&c| c == child) {
            children.remove(position);
        }
        self.node_mut(child).parent = None;
        self.index_dirty = true;
        true
    }

    /// Detach every child of `parent`, returning them in order.
    pub(crate) fn take_children(&mut self, parent: NodeId) -> Vec<NodeId> {
        let children = std::mem::take(&mut self.node_mut(parent).children);
        for &child in &children {
            self.node_mut(child).parent = None;
        }
        if !children.is_empty() {
            self.index_dirty = true;
        }
        children
    }

    /// Free `id` and its whole subtree. The root cannot be destroyed.
    pub(crate) fn destroy(&mut self, id: NodeId) {
        assert!(id != self.root, "cannot destroy the root node");
        if self.get(id).is_none() {
            return;
        }
        if let Some(parent) = self.node(id).parent {
            self.unlink(parent, id);
        }
        let mut subtree = Vec::new();
        self.collect_subtree(id, &mut subtree);
        for node in subtree {
            let slot = &mut self.slots[node.index as usize];
            slot.node = None;
            slot.generation += 1;
            self.free.push(node.index);
        }
    }

    /// Append `id` and all its descendants to `out`, pre-order.
    pub(crate) fn collect_subtree(&self, id: NodeId, out: &mut Vec<NodeId>) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            for &child in self.node(current).children.iter().rev() {
                stack.push(child);
            }
        }
    }

    /// Drop every node's listener table, attached or not.
    pub(crate) fn clear_listeners(&mut self) {
        for slot in &mut self.slots {
            if let Some(node) = slot.node.as_mut() {
                node.events = None;
            }
        }
    }

    /// Reassign z-order traversal indexes if the structure changed.
    pub(crate) fn ensure_indexes(&mut self) {
        if !self.index_dirty {
            return;
        }
        let mut next = 1u32;
        let mut stack = vec![self.root];
        while let Some(current) = stack.pop() {
            self.node_mut(current).index = next;
            next += 1;
            for &child in self.node(current).children.iter().rev() {
                stack.push(child);
            }
        }
        self.index_dirty = false;
        log::trace!("reassigned z-order indexes for {} nodes", next - 1);
    }

    /// Hit-test `point`, given in the node's own local space.
    pub(crate) fn contains(&self, id: NodeId, point: Point) -> bool {
        let node = self.node(id);
        if let Some(Drawable::Shape(shape, _)) = &node.drawable {
            if shape.contains(point) {
                return true;
            }
        }
        node.children.iter().any(|&child| {
            let data = self.node(child);
            let local = if data.has_transform() {
                data.local_transform().inverse() * point
            } else {
                point
            };
            self.contains(child, local)
        })
    }

    /// Naive composed transform, root-to-node product of local transforms.
    pub(crate) fn composed_transform(&self, id: NodeId) -> Affine {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            chain.push(node);
            current = self.node(node).parent;
        }
        let mut transform = Affine::IDENTITY;
        for node in chain.into_iter().rev() {
            let data = self.node(node);
            if data.has_transform() {
                transform = transform * data.local_transform();
            }
        }
        transform
    }

    /// First node in `root`'s subtree (pre-order, including `root`) with `tag`.
    pub(crate) fn query(&self, root: NodeId, tag: &str) -> Option<NodeId> {
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            if self.node(current).tags.contains(tag) {
                return Some(current);
            }
            for &child in self.node(current).children.iter().rev() {
                stack.push(child);
            }
        }
        None
    }

    /// Every node in `root`'s subtree (pre-order, including `root`) with `tag`.
    pub(crate) fn query_all(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            if self.node(current).tags.contains(tag) {
                found.push(current);
            }
            for &child in self.node(current).children.iter().rev() {
                stack.push(child);
            }
        }
        found
    }

    fn is_ancestor_of(&self, candidate: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.node(id).parent;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene_with_child() -> (Scene, NodeId) {
        let mut scene = Scene::new();
        let child = scene.create(None);
        let root = scene.root();
        scene.link(root, child);
        (scene, child)
    }

    #[test]
    fn test_create_and_link() {
        let (scene, child) = scene_with_child();
        assert_eq!(scene.node(child).parent, Some(scene.root()));
        assert_eq!(scene.node(scene.root()).children, vec![child]);
    }

    #[test]
    fn test_destroy_invalidates_ids() {
        let (mut scene, child) = scene_with_child();
        scene.destroy(child);
        assert!(scene.get(child).is_none());
        let replacement = scene.create(None);
        assert!(scene.get(child).is_none());
        assert!(scene.get(replacement).is_some());
    }

    #[test]
    fn test_destroy_frees_whole_subtree() {
        let (mut scene, child) = scene_with_child();
        let grandchild = scene.create(None);
        scene.link(child, grandchild);
        scene.destroy(child);
        assert!(scene.get(grandchild).is_none());
        assert!(scene.node(scene.root()).children.is_empty());
    }

    #[test]
    fn test_unlink_foreign_child_is_noop() {
        let (mut scene, child) = scene_with_child();
        let stranger = scene.create(None);
        assert!(!scene.unlink(child, stranger));
        assert_eq!(scene.node(child).parent, Some(scene.root()));
    }

    #[test]
    fn test_link_reparents() {
        let (mut scene, child) = scene_with_child();
        let other = scene.create(None);
        let root = scene.root();
        scene.link(root, other);
        scene.link(other, child);
        assert_eq!(scene.node(child).parent, Some(other));
        assert_eq!(scene.node(root).children, vec![other]);
    }

    #[test]
    fn test_relink_same_parent_raises_to_top() {
        let mut scene = Scene::new();
        let root = scene.root();
        let below = scene.create(None);
        let above = scene.create(None);
        scene.link(root, below);
        scene.link(root, above);
        scene.link(root, below);
        assert_eq!(scene.node(root).children, vec![above, below]);
        scene.ensure_indexes();
        assert!(scene.node(below).index > scene.node(above).index);
    }

    #[test]
    fn test_indexes_follow_document_order() {
        let mut scene = Scene::new();
        let root = scene.root();
        let first = scene.create(None);
        let second = scene.create(None);
        let nested = scene.create(None);
        scene.link(root, first);
        scene.link(first, nested);
        scene.link(root, second);
        scene.ensure_indexes();
        assert_eq!(scene.node(root).index, 1);
        assert_eq!(scene.node(first).index, 2);
        assert_eq!(scene.node(nested).index, 3);
        assert_eq!(scene.node(second).index, 4);
    }

    #[test]
    fn test_indexes_recompute_after_structure_change() {
        let mut scene = Scene::new();
        let root = scene.root();
        let first = scene.create(None);
        let second = scene.create(None);
        scene.link(root, first);
        scene.link(root, second);
        scene.ensure_indexes();
        assert!(scene.node(first).index < scene.node(second).index);
        scene.unlink(root, first);
        scene.link(root, first);
        scene.ensure_indexes();
        assert!(scene.node(first).index > scene.node(second).index);
    }

    #[test]
    fn test_local_transform_recomposes_after_setter() {
        let mut scene = Scene::new();
        let node = scene.create(None);
        let data = scene.node_mut(node);
        data.x = 10.0;
        data.invalidate_transform();
        let before = data.local_transform();
        assert_eq!(before * Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        let data = scene.node_mut(node);
        data.scale = 2.0;
        data.invalidate_transform();
        let after = data.local_transform();
        assert_eq!(after * Point::new(1.0, 0.0), Point::new(12.0, 0.0));
    }

    #[test]
    fn test_contains_recurses_through_child_transforms() {
        let mut scene = Scene::new();
        let root = scene.root();
        let group = scene.create(None);
        let leaf = scene.create(Some(Drawable::Shape(
            Shape::circle((0.0, 0.0), 10.0),
            test_style(),
        )));
        scene.link(root, group);
        scene.link(group, leaf);
        let data = scene.node_mut(group);
        data.x = 200.0;
        data.y = 200.0;
        data.invalidate_transform();
        // Point given in root space must be resolved through the group.
        let local = scene.node(group).local_transform().inverse() * Point::new(205.0, 200.0);
        assert!(scene.contains(group, local));
        assert!(!scene.contains(group, Point::new(205.0, 200.0)));
    }

    #[test]
    fn test_composed_transform_chains_ancestors() {
        let mut scene = Scene::new();
        let root = scene.root();
        let outer = scene.create(None);
        let inner = scene.create(None);
        scene.link(root, outer);
        scene.link(outer, inner);
        {
            let data = scene.node_mut(outer);
            data.x = 100.0;
            data.invalidate_transform();
        }
        {
            let data = scene.node_mut(inner);
            data.scale = 2.0;
            data.invalidate_transform();
        }
        let composed = scene.composed_transform(inner);
        assert_eq!(composed * Point::new(5.0, 0.0), Point::new(110.0, 0.0));
    }

    #[test]
    fn test_query_all_finds_tagged_descendants() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.create(None);
        let b = scene.create(None);
        let c = scene.create(None);
        scene.link(root, a);
        scene.link(a, b);
        scene.link(root, c);
        scene.node_mut(a).tags.insert("pick".to_string());
        scene.node_mut(c).tags.insert("pick".to_string());
        assert_eq!(scene.query(root, "pick"), Some(a));
        assert_eq!(scene.query_all(root, "pick"), vec![a, c]);
        assert_eq!(scene.query_all(b, "pick"), Vec::new());
    }

    #[test]
    #[should_panic(expected = "stale NodeId")]
    fn test_stale_id_access_panics() {
        let (mut scene, child) = scene_with_child();
        scene.destroy(child);
        scene.node(child);
    }

    fn test_style() -> Style {
        crate::style::Styles::new().style(crate::style::StyleOptions::default())
    }
}
