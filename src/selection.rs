use crate::tree::{NodeId, PartTree};

/// Groups where at most one direct leaf child may be selected. Fixed set,
/// matched by node name.
pub const SINGLE_SELECT_GROUPS: [&str; 7] = [
    "ArmL", "ArmR", "Arms", "Eyes", "Mouth", "Eyes01", "Mouth01",
];

pub fn is_single_select_group(name: &str) -> bool {
    SINGLE_SELECT_GROUPS.contains(&name)
}

/// Per-session selection flags, dense over [`NodeId`]. Kept outside the tree:
/// shape is loaded once and read-only, selection mutates continuously and is
/// what gets persisted.
#[derive(Clone, Debug)]
pub struct Selection {
    flags: Vec<bool>,
}

impl Selection {
    pub fn new(tree: &PartTree) -> Self {
        Self {
            flags: vec![false; tree.len()],
        }
    }

    pub fn is_selected(&self, id: NodeId) -> bool {
        self.flags.get(id.index()).copied().unwrap_or(false)
    }

    fn set(&mut self, id: NodeId, on: bool) {
        if let Some(slot) = self.flags.get_mut(id.index()) {
            *slot = on;
        }
    }

    /// Raw flag write for snapshot restore; never runs link synchronization.
    pub(crate) fn set_raw(&mut self, id: NodeId, on: bool) {
        self.set(id, on);
    }
}

/// Explicit first-use marker, carried by the caller instead of ambient
/// global state. Defaults are applied once per session unless a persisted
/// snapshot was restored.
#[derive(Clone, Copy, Debug, Default)]
pub struct SessionState {
    pub initialized: bool,
}

/// Maintains the selection invariants over one [`PartTree`]: single-select
/// groups, linked-name synchronization, and the Arms / ArmL / ArmR coupled
/// exclusivity rules.
pub struct SelectionEngine<'t> {
    tree: &'t PartTree,
}

impl<'t> SelectionEngine<'t> {
    pub fn new(tree: &'t PartTree) -> Self {
        Self { tree }
    }

    /// Depth-first collection of every selected leaf sprite. Unsorted;
    /// composition applies its own paint order.
    pub fn collect_selected_leaves(&self, sel: &Selection) -> Vec<NodeId> {
        self.tree
            .walk(self.tree.root())
            .filter(|id| self.tree.part(*id).is_leaf_sprite() && sel.is_selected(*id))
            .collect()
    }

    /// Set one leaf's flag, then synchronize linked same-named leaves from
    /// the index built at load: direct substring matches mirror `on`; in each
    /// numeric-suffix group the minimum-index member receives `on` and every
    /// other member is forced off.
    ///
    /// Refused (no-op, returns false) outside leaf-sprite nodes, so selection
    /// can never land on structural nodes.
    pub fn set_leaf_selected(&self, sel: &mut Selection, id: NodeId, on: bool) -> bool {
        let part = self.tree.part(id);
        if !part.is_leaf_sprite() {
            return false;
        }
        sel.set(id, on);

        if let Some(set) = self.tree.link_set(part.name()) {
            for &d in &set.direct {
                sel.set(d, on);
            }
            for group in &set.groups {
                let mut members = group.iter();
                if let Some(&first) = members.next() {
                    sel.set(first, on);
                }
                for &rest in members {
                    sel.set(rest, false);
                }
            }
        }
        true
    }

    /// If none of `leaves` is selected, select the first one whose
    /// author-time `Enabled` flag is set (none when no leaf is enabled).
    /// Every member is written through [`Self::set_leaf_selected`] so linked
    /// names stay consistent.
    pub fn select_default_if_none_selected(&self, sel: &mut Selection, leaves: &[NodeId]) {
        if leaves.is_empty() || leaves.iter().any(|l| sel.is_selected(*l)) {
            return;
        }
        let enabled_idx = leaves
            .iter()
            .position(|l| self.tree.part(*l).renderer().is_some_and(|r| r.enabled()));
        for (i, &leaf) in leaves.iter().enumerate() {
            self.set_leaf_selected(sel, leaf, Some(i) == enabled_idx);
        }
    }

    fn clear_group(&self, sel: &mut Selection, group: Option<NodeId>) {
        let Some(group) = group else { return };
        for leaf in self.tree.leaf_children(group) {
            self.set_leaf_selected(sel, leaf, false);
        }
    }

    fn backfill_group(&self, sel: &mut Selection, group: Option<NodeId>) {
        let Some(group) = group else { return };
        let leaves = self.tree.leaf_children(group);
        self.select_default_if_none_selected(sel, &leaves);
    }

    /// Top-level click transition for a leaf under `group`. Returns whether
    /// any state changed (an already-selected arm-slot leaf rejects
    /// deselection: those groups hold exactly one selection once populated).
    pub fn on_leaf_clicked(&self, sel: &mut Selection, group: NodeId, leaf: NodeId) -> bool {
        let group_name = self.tree.part(group).name().to_string();
        let arms = self.tree.find_by_name("Arms");
        let arm_l = self.tree.find_by_name("ArmL");
        let arm_r = self.tree.find_by_name("ArmR");

        // Arms vs ArmL/ArmR exclusivity. Selecting a combined-arms leaf
        // clears the per-arm slots; deselecting one restores their defaults
        // so the figure is never left armless.
        if group_name == "Arms" && !sel.is_selected(leaf) {
            self.clear_group(sel, arm_l);
            self.clear_group(sel, arm_r);
        } else if group_name == "Arms" && sel.is_selected(leaf) {
            self.backfill_group(sel, arm_l);
            self.backfill_group(sel, arm_r);
        }

        if (group_name == "ArmL" || group_name == "ArmR") && !sel.is_selected(leaf) {
            self.clear_group(sel, arms);
            let other = if group_name == "ArmL" { arm_r } else { arm_l };
            self.backfill_group(sel, other);
        }

        if is_single_select_group(&group_name) {
            if (group_name == "ArmL" || group_name == "ArmR") && sel.is_selected(leaf) {
                return false;
            }

            if sel.is_selected(leaf) {
                self.set_leaf_selected(sel, leaf, false);
            } else {
                for sibling in self.tree.ordered_leaf_children(group) {
                    if sel.is_selected(sibling) {
                        self.set_leaf_selected(sel, sibling, false);
                    }
                }
                self.set_leaf_selected(sel, leaf, true);
            }
        } else {
            let on = !sel.is_selected(leaf);
            self.set_leaf_selected(sel, leaf, on);
        }
        true
    }

    /// Author-time defaults for a fresh session: for every group with direct
    /// leaf children (display order), single-select groups turn on the first
    /// `Enabled` leaf, multi-select groups turn on every `Enabled` leaf.
    /// Raw flag writes, no link synchronization — this seeds state, it does
    /// not transition it.
    pub fn init_default_selection(&self, sel: &mut Selection) {
        for id in self.tree.walk(self.tree.root()) {
            let part = self.tree.part(id);
            if part.is_leaf_sprite() || !part.has_drawable_descendant() {
                continue;
            }
            let leaves = self.tree.ordered_leaf_children(id);
            if leaves.is_empty() {
                continue;
            }

            let enabled =
                |l: &NodeId| self.tree.part(*l).renderer().is_some_and(|r| r.enabled());
            let has_enabled = leaves.iter().any(enabled);

            if is_single_select_group(part.name()) {
                let idx = leaves.iter().position(enabled);
                for (i, &leaf) in leaves.iter().enumerate() {
                    sel.set(leaf, has_enabled && Some(i) == idx);
                }
            } else {
                for &leaf in &leaves {
                    sel.set(leaf, enabled(&leaf));
                }
            }
        }
    }

    /// Apply defaults exactly once per session, skipped when a persisted
    /// snapshot already populated the selection.
    pub fn ensure_initialized(
        &self,
        sel: &mut Selection,
        session: &mut SessionState,
        restored_from_snapshot: bool,
    ) {
        if session.initialized {
            return;
        }
        session.initialized = true;
        if !restored_from_snapshot {
            self.init_default_selection(sel);
        }
    }
}
