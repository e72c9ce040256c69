use indexmap::IndexMap;

use crate::error::{FuseError, FuseResult};

/// One node of a character definition tree.
///
/// The on-disk shape is the JSON emitted by the asset extractor: PascalCase
/// keys, every field nullable, child keys unique within a node. Shape is
/// fixed for the session once loaded; user selection state lives outside the
/// tree (see [`crate::selection::Selection`]).
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct PartNode {
    pub name: Option<String>,
    /// Child nodes keyed by object key. Key order is the file order; display
    /// order is derived separately by name collation.
    pub children: Option<IndexMap<String, PartNode>>,
    pub transform: Option<Transform>,
    pub sprite_renderer: Option<SpriteRenderer>,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Transform {
    pub position: Option<Position>,
    pub scale: Option<Scale>,
}

#[derive(Clone, Copy, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Per-axis sprite scale. The data also carries a `z` component; it is
/// meaningless for 2D sprites and ignored here.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Scale {
    pub x: f32,
    pub y: f32,
}

impl Default for Scale {
    fn default() -> Self {
        Self { x: 1.0, y: 1.0 }
    }
}

/// Fractional anchor point within the sprite bounds.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Pivot {
    pub x: f32,
    pub y: f32,
}

impl Default for Pivot {
    fn default() -> Self {
        Self { x: 0.5, y: 0.5 }
    }
}

/// RGBA multiplier in 0..1 per channel.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for Rgba {
    fn default() -> Self {
        Self {
            r: 1.0,
            g: 1.0,
            b: 1.0,
            a: 1.0,
        }
    }
}

impl Rgba {
    /// Opaque white is the identity tint.
    pub fn is_opaque_white(self) -> bool {
        self.r == 1.0 && self.g == 1.0 && self.b == 1.0 && self.a == 1.0
    }
}

/// Drawable capability. Present only on nodes that carry a sprite.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct SpriteRenderer {
    pub sprite: Option<Sprite>,
    /// Author-time default on/off flag.
    pub enabled: Option<bool>,
    pub color: Option<Rgba>,
    /// Integer paint-order key; higher draws later (on top).
    pub sorting_order: Option<i32>,
    pub materials: Option<Vec<Material>>,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Sprite {
    pub name: Option<String>,
    pub pixels_to_units: Option<f32>,
    pub pivot: Option<Pivot>,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Material {
    pub name: Option<String>,
    /// Shader float properties. `_StencilRef` and `_StencilComp` select the
    /// stencil mask role of the layer.
    pub floats: Option<std::collections::BTreeMap<String, f64>>,
}

pub const STENCIL_REF_KEY: &str = "_StencilRef";
pub const STENCIL_COMP_KEY: &str = "_StencilComp";

impl PartNode {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn has_children(&self) -> bool {
        self.children.as_ref().is_some_and(|c| !c.is_empty())
    }

    /// A leaf sprite is a childless node that carries a drawable sprite.
    pub fn is_leaf_sprite(&self) -> bool {
        !self.has_children() && self.sprite_name().is_some()
    }

    pub fn sprite_name(&self) -> Option<&str> {
        self.sprite_renderer
            .as_ref()
            .and_then(|r| r.sprite.as_ref())
            .and_then(|s| s.name.as_deref())
    }

    pub fn validate(&self) -> FuseResult<()> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if let Some(r) = &node.sprite_renderer {
                if let Some(s) = &r.sprite {
                    if s.name.as_deref().is_none_or(str::is_empty) {
                        return Err(FuseError::validation(format!(
                            "node '{}' carries a sprite without a name",
                            node.name()
                        )));
                    }
                    if let Some(ppu) = s.pixels_to_units
                        && !(ppu.is_finite() && ppu > 0.0)
                    {
                        return Err(FuseError::validation(format!(
                            "node '{}' has non-positive PixelsToUnits",
                            node.name()
                        )));
                    }
                }
                if let Some(c) = r.color
                    && ![c.r, c.g, c.b, c.a].iter().all(|v| v.is_finite())
                {
                    return Err(FuseError::validation(format!(
                        "node '{}' has a non-finite color",
                        node.name()
                    )));
                }
            }
            if let Some(t) = &node.transform {
                if let Some(p) = t.position
                    && !(p.x.is_finite() && p.y.is_finite())
                {
                    return Err(FuseError::validation(format!(
                        "node '{}' has a non-finite position",
                        node.name()
                    )));
                }
                if let Some(s) = t.scale
                    && !(s.x.is_finite() && s.y.is_finite())
                {
                    return Err(FuseError::validation(format!(
                        "node '{}' has a non-finite scale",
                        node.name()
                    )));
                }
            }
            if let Some(children) = &node.children {
                stack.extend(children.values());
            }
        }
        Ok(())
    }
}

impl SpriteRenderer {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    pub fn color(&self) -> Rgba {
        self.color.unwrap_or_default()
    }

    pub fn sorting_order(&self) -> i32 {
        self.sorting_order.unwrap_or(0)
    }

    /// Name of the first material, used to derive the blend mode.
    pub fn material_name(&self) -> &str {
        self.materials
            .as_ref()
            .and_then(|m| m.first())
            .and_then(|m| m.name.as_deref())
            .unwrap_or("")
    }

    /// Stencil parameters from the first material's floats, defaulting to 0.
    pub fn stencil(&self) -> (i64, i64) {
        let floats = self
            .materials
            .as_ref()
            .and_then(|m| m.first())
            .and_then(|m| m.floats.as_ref());
        let get = |key: &str| {
            floats
                .and_then(|f| f.get(key))
                .copied()
                .unwrap_or(0.0)
                .round() as i64
        };
        (get(STENCIL_REF_KEY), get(STENCIL_COMP_KEY))
    }
}

impl Sprite {
    pub fn pivot(&self) -> Pivot {
        self.pivot.unwrap_or_default()
    }

    pub fn pixels_to_units(&self) -> f32 {
        self.pixels_to_units.unwrap_or(100.0)
    }
}

impl Transform {
    pub fn position(&self) -> Position {
        self.position.unwrap_or_default()
    }

    pub fn scale(&self) -> Scale {
        self.scale.unwrap_or_default()
    }
}

/// Parse a character definition file.
///
/// The file is a JSON object whose first value is the root node; any further
/// top-level entries are ignored.
pub fn parse_character(json: &str) -> FuseResult<PartNode> {
    let doc: IndexMap<String, PartNode> = serde_json::from_str(json)
        .map_err(|e| FuseError::serde(format!("character definition: {e}")))?;
    let root = doc
        .into_iter()
        .next()
        .map(|(_, node)| node)
        .ok_or_else(|| FuseError::serde("character definition has no root node"))?;
    root.validate()?;
    Ok(root)
}
