use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Context as _;
use serde_json::{Map, Value};

use crate::error::FuseResult;
use crate::selection::Selection;
use crate::tree::{NodeId, PartTree};

/// Reserved key holding a node's selection flag inside a snapshot. Distinct
/// from any child key the extractor emits.
pub const SELECTED_KEY: &str = "__selected";

/// Serialize the selection as a nested object mirroring the tree's child-key
/// structure, with each sprite node's flag under [`SELECTED_KEY`].
pub fn selection_snapshot(tree: &PartTree, sel: &Selection) -> Value {
    fn build(tree: &PartTree, sel: &Selection, id: NodeId) -> Value {
        let mut obj = Map::new();
        for &child in tree.children(id) {
            obj.insert(
                tree.part(child).key().to_string(),
                build(tree, sel, child),
            );
        }
        if tree.part(id).sprite_name().is_some() {
            obj.insert(SELECTED_KEY.to_string(), Value::Bool(sel.is_selected(id)));
        }
        Value::Object(obj)
    }
    build(tree, sel, tree.root())
}

/// Restore flags from a snapshot. Entries that do not line up with the
/// current tree shape are ignored; nodes absent from the snapshot keep their
/// flags. Raw writes — restoring replays stored state, it does not replay
/// transitions.
pub fn restore_selection(tree: &PartTree, sel: &mut Selection, snapshot: &Value) {
    let Some(root_obj) = snapshot.as_object() else {
        return;
    };
    let mut stack: Vec<(NodeId, &Map<String, Value>)> = vec![(tree.root(), root_obj)];
    while let Some((id, obj)) = stack.pop() {
        if tree.part(id).is_leaf_sprite()
            && let Some(flag) = obj.get(SELECTED_KEY).and_then(Value::as_bool)
        {
            sel.set_raw(id, flag);
        }
        for &child in tree.children(id) {
            if let Some(child_obj) = obj
                .get(tree.part(child).key())
                .and_then(Value::as_object)
            {
                stack.push((child, child_obj));
            }
        }
    }
}

/// Which subtree headers are collapsed in the selector UI, keyed by header
/// path. Purely cosmetic; never consulted by composition.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CollapseState(HashMap<String, bool>);

impl CollapseState {
    pub fn is_collapsed(&self, key: &str) -> bool {
        self.0.get(key).copied().unwrap_or(false)
    }

    pub fn set(&mut self, key: impl Into<String>, collapsed: bool) {
        self.0.insert(key.into(), collapsed);
    }

    pub fn toggle(&mut self, key: &str) -> bool {
        let next = !self.is_collapsed(key);
        self.0.insert(key.to_string(), next);
        next
    }
}

/// Persistence collaborator for per-character UI state. Loads never fail:
/// missing, unreadable, or corrupt payloads are "no cache".
pub trait StateStore {
    fn load_selection(&self, character: &str) -> Option<Value>;
    fn save_selection(&self, character: &str, snapshot: &Value) -> FuseResult<()>;
    fn clear_selection(&self, character: &str) -> FuseResult<()>;

    fn load_collapse(&self, character: &str) -> CollapseState;
    fn save_collapse(&self, character: &str, state: &CollapseState) -> FuseResult<()>;
}

/// JSON files under one directory, one pair per character.
pub struct DirStateStore {
    root: PathBuf,
}

impl DirStateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn selection_path(&self, character: &str) -> PathBuf {
        self.root.join(format!("{character}.selection.json"))
    }

    fn collapse_path(&self, character: &str) -> PathBuf {
        self.root.join(format!("{character}.collapse.json"))
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, path: &std::path::Path) -> Option<T> {
        let bytes = std::fs::read(path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(v) => Some(v),
            Err(err) => {
                tracing::debug!(path = %path.display(), %err, "ignoring corrupt state file");
                None
            }
        }
    }

    fn write_json<T: serde::Serialize>(&self, path: &std::path::Path, value: &T) -> FuseResult<()> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("create state dir '{}'", self.root.display()))?;
        let bytes = serde_json::to_vec_pretty(value)
            .map_err(|e| crate::error::FuseError::serde(e.to_string()))?;
        std::fs::write(path, bytes)
            .with_context(|| format!("write '{}'", path.display()))?;
        Ok(())
    }
}

impl StateStore for DirStateStore {
    fn load_selection(&self, character: &str) -> Option<Value> {
        self.read_json(&self.selection_path(character))
    }

    fn save_selection(&self, character: &str, snapshot: &Value) -> FuseResult<()> {
        self.write_json(&self.selection_path(character), snapshot)
    }

    fn clear_selection(&self, character: &str) -> FuseResult<()> {
        let path = self.selection_path(character);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("remove '{}'", path.display()))
                .into()),
        }
    }

    fn load_collapse(&self, character: &str) -> CollapseState {
        self.read_json(&self.collapse_path(character)).unwrap_or_default()
    }

    fn save_collapse(&self, character: &str, state: &CollapseState) -> FuseResult<()> {
        self.write_json(&self.collapse_path(character), state)
    }
}
