use std::collections::HashMap;

use crate::collate::NameCollator;
use crate::error::{FuseError, FuseResult};
use crate::model::{PartNode, SpriteRenderer, Transform};

/// Stable index of a node within a [`PartTree`], assigned at load time in
/// depth-first document order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Flattened node payload. Children are modeled as index lists rather than
/// owned subtrees so traversal stays iterative and parent references stay
/// non-owning.
#[derive(Debug)]
pub struct Part {
    key: String,
    name: String,
    parent: Option<NodeId>,
    /// Child ids in document order.
    children: Vec<NodeId>,
    /// Child ids in display order: collation by child name, ties keep
    /// document order.
    ordered: Vec<NodeId>,
    transform: Option<Transform>,
    renderer: Option<SpriteRenderer>,
    leaf_sprite: bool,
    drawable: bool,
}

impl Part {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn renderer(&self) -> Option<&SpriteRenderer> {
        self.renderer.as_ref()
    }

    pub fn transform(&self) -> Option<&Transform> {
        self.transform.as_ref()
    }

    pub fn sprite_name(&self) -> Option<&str> {
        self.renderer
            .as_ref()
            .and_then(|r| r.sprite.as_ref())
            .and_then(|s| s.name.as_deref())
    }

    /// Leaf sprite: no children and a named sprite attached.
    pub fn is_leaf_sprite(&self) -> bool {
        self.leaf_sprite
    }

    /// True when this node or any descendant is a leaf sprite.
    pub fn has_drawable_descendant(&self) -> bool {
        self.drawable
    }
}

/// Same-named leaves linked to one clicked name: plain substring matches are
/// mirrored directly; `<prefix>_<digits>` matches act as one switch per
/// prefix group.
#[derive(Debug, Default)]
pub(crate) struct LinkSet {
    /// Matches without a numeric suffix; mirrored to the clicked value.
    pub(crate) direct: Vec<NodeId>,
    /// Suffix groups, each ordered by numeric index (ties keep load order).
    /// The first member of a group receives the clicked value, the rest are
    /// forced off.
    pub(crate) groups: Vec<Vec<NodeId>>,
}

/// Immutable-shape part hierarchy for one character.
///
/// Built once per character load: the recursive definition is flattened into
/// an indexed vector, display order and the linked-name index are
/// precomputed, and all shape queries afterwards are cheap lookups.
pub struct PartTree {
    parts: Vec<Part>,
    links: HashMap<String, LinkSet>,
}

impl PartTree {
    pub fn new(root: PartNode) -> FuseResult<Self> {
        let collator = NameCollator::new()?;
        let mut parts: Vec<Part> = Vec::new();

        // Depth-first flatten in document order; children always get larger
        // ids than their parent.
        let mut stack: Vec<(PartNode, Option<NodeId>, String)> = vec![(root, None, String::new())];
        while let Some((mut node, parent, key)) = stack.pop() {
            let id = NodeId(
                u32::try_from(parts.len())
                    .map_err(|_| FuseError::validation("part tree too large"))?,
            );
            let children = node.children.take();
            let leaf_sprite = children.as_ref().is_none_or(|c| c.is_empty())
                && node.sprite_name().is_some();
            parts.push(Part {
                key,
                name: node.name.unwrap_or_default(),
                parent,
                children: Vec::new(),
                ordered: Vec::new(),
                transform: node.transform,
                renderer: node.sprite_renderer,
                leaf_sprite,
                drawable: false,
            });
            if let Some(p) = parent {
                parts[p.index()].children.push(id);
            }
            if let Some(children) = children {
                // Reverse so the pop order restores document order.
                for (k, child) in children.into_iter().rev() {
                    stack.push((child, Some(id), k));
                }
            }
        }

        // Document order pushes parents before children, so a reverse sweep
        // sees every child's flag before its parent needs it.
        for i in (0..parts.len()).rev() {
            let drawable = parts[i].leaf_sprite
                || parts[i]
                    .children
                    .iter()
                    .any(|c| parts[c.index()].drawable);
            parts[i].drawable = drawable;
        }

        for i in 0..parts.len() {
            let mut ordered = parts[i].children.clone();
            ordered.sort_by(|a, b| collator.compare(&parts[a.index()].name, &parts[b.index()].name));
            parts[i].ordered = ordered;
        }

        let links = build_link_index(&parts);
        Ok(Self { parts, links })
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn part(&self, id: NodeId) -> &Part {
        &self.parts[id.index()]
    }

    /// Child ids in document order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.parts[id.index()].children
    }

    /// Child ids sorted for display: locale collation on name, ties keep the
    /// original key order. Pure and stable for the life of the tree.
    pub fn ordered_children(&self, id: NodeId) -> &[NodeId] {
        &self.parts[id.index()].ordered
    }

    /// Direct leaf-sprite children in display order.
    pub fn ordered_leaf_children(&self, id: NodeId) -> Vec<NodeId> {
        self.ordered_children(id)
            .iter()
            .copied()
            .filter(|c| self.part(*c).is_leaf_sprite())
            .collect()
    }

    /// Direct leaf-sprite children in document order.
    pub fn leaf_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.part(*c).is_leaf_sprite())
            .collect()
    }

    /// Iterate `id` and all its descendants, depth-first in document order.
    pub fn walk(&self, id: NodeId) -> Walk<'_> {
        Walk {
            tree: self,
            stack: vec![id],
        }
    }

    /// First node (document order) with the given name.
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.walk(self.root())
            .find(|id| self.part(*id).name() == name)
    }

    /// Slash-joined name path from the root, used to key presentation state.
    pub fn header_path(&self, id: NodeId) -> String {
        let mut names = Vec::new();
        let mut cur = Some(id);
        while let Some(c) = cur {
            names.push(self.part(c).name());
            cur = self.part(c).parent();
        }
        names.reverse();
        names.join("/")
    }

    pub(crate) fn link_set(&self, name: &str) -> Option<&LinkSet> {
        self.links.get(name)
    }
}

/// Iterative depth-first traversal; no recursion, explicit stack.
pub struct Walk<'t> {
    tree: &'t PartTree,
    stack: Vec<NodeId>,
}

impl Iterator for Walk<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        let children = self.tree.children(id);
        self.stack.extend(children.iter().rev().copied());
        Some(id)
    }
}

/// Split a trailing `_<digits>` suffix. Returns the prefix and parsed index.
fn split_numeric_suffix(name: &str) -> Option<(&str, u32)> {
    let (prefix, digits) = name.rsplit_once('_')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(|idx| (prefix, idx))
}

/// Pre-index linked-name synchronization: for every distinct leaf-sprite
/// name, every other leaf sprite whose name strictly contains it, split into
/// direct matches and numeric-suffix groups. Names are data-driven, so the
/// index covers the whole tree, not just siblings.
fn build_link_index(parts: &[Part]) -> HashMap<String, LinkSet> {
    let leaves: Vec<(NodeId, &str)> = parts
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_leaf_sprite() && !p.name().is_empty())
        .map(|(i, p)| (NodeId(i as u32), p.name()))
        .collect();

    let mut links: HashMap<String, LinkSet> = HashMap::new();
    for &(_, name) in &leaves {
        if links.contains_key(name) {
            continue;
        }

        let mut set = LinkSet::default();
        let mut groups: Vec<(String, Vec<(u32, NodeId)>)> = Vec::new();
        for &(other_id, other_name) in &leaves {
            if other_name == name || !other_name.contains(name) {
                continue;
            }
            match split_numeric_suffix(other_name) {
                Some((prefix, idx)) => {
                    match groups.iter_mut().find(|(p, _)| p == prefix) {
                        Some((_, members)) => members.push((idx, other_id)),
                        None => groups.push((prefix.to_string(), vec![(idx, other_id)])),
                    }
                }
                None => set.direct.push(other_id),
            }
        }
        for (_, mut members) in groups {
            // Stable: equal indices keep discovery (document) order.
            members.sort_by_key(|(idx, _)| *idx);
            set.groups.push(members.into_iter().map(|(_, id)| id).collect());
        }

        if !set.direct.is_empty() || !set.groups.is_empty() {
            links.insert(name.to_string(), set);
        }
    }
    links
}
