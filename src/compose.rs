use std::collections::HashMap;

use kurbo::Rect;

use crate::assets::{SpriteImage, SpriteSource};
use crate::blend::{self, BlendMode};
use crate::error::FuseResult;
use crate::model::Rgba;
use crate::selection::{Selection, SelectionEngine};
use crate::tree::{NodeId, PartTree};

/// `_StencilComp` value marking a layer that writes its pixels into the mask
/// for its `_StencilRef` (and is drawn itself).
pub const STENCIL_COMP_WRITE: i64 = 8;
/// `_StencilComp` value marking a layer clipped by a previously written mask.
pub const STENCIL_COMP_READ: i64 = 4;

/// Finished composite: premultiplied RGBA8, cropped to the union bounding
/// box of the painted layers.
#[derive(Clone, Debug)]
pub struct Composite {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// One selected leaf with its resolved image and world-space placement.
///
/// World coordinates are math-convention (y up); `bounds` is
/// `[left, bottom, right, top]`. The paint loop flips into row-major buffer
/// space against the shared union box.
struct Layer {
    id: NodeId,
    image: SpriteImage,
    scaled_w: f64,
    scaled_h: f64,
    anchor_x: f64,
    anchor_y: f64,
    pivot_off_x: f64,
    pivot_off_y: f64,
    color: Rgba,
    blend: BlendMode,
    stencil_ref: i64,
    stencil_comp: i64,
    bounds: Rect,
}

/// Paints the current selection into one pixel buffer.
///
/// Owns nothing between calls: the output buffer and the stencil mask cache
/// are rebuilt per [`Compositor::compose`] call, so concurrent selections can
/// never alias a render in flight.
pub struct Compositor<'s> {
    source: &'s dyn SpriteSource,
}

impl<'s> Compositor<'s> {
    pub fn new(source: &'s dyn SpriteSource) -> Self {
        Self { source }
    }

    /// Compose every selected leaf sprite, in ascending `SortingOrder`
    /// (stable: ties keep collection order), into a buffer cropped to the
    /// union of the layers' bounds.
    ///
    /// Sprites that fail to resolve are dropped from the layer list after
    /// the whole resolve pass settles; zero resolved layers yield `Ok(None)`
    /// and the caller keeps whatever it was displaying.
    #[tracing::instrument(skip(self, tree, sel))]
    pub fn compose(
        &self,
        tree: &PartTree,
        sel: &Selection,
        character: &str,
    ) -> FuseResult<Option<Composite>> {
        let engine = SelectionEngine::new(tree);
        let mut selected = engine.collect_selected_leaves(sel);
        selected.sort_by_key(|id| tree.part(*id).renderer().map_or(0, |r| r.sorting_order()));

        // Fan-out: every sprite is requested; the layer list is only built
        // once all requests have settled, successes and failures alike.
        let mut resolved: Vec<(NodeId, FuseResult<SpriteImage>)> = Vec::new();
        for id in selected {
            let Some(sprite) = tree.part(id).sprite_name() else {
                continue;
            };
            resolved.push((id, self.source.load(character, sprite)));
        }

        let mut layers: Vec<Layer> = Vec::new();
        for (id, result) in resolved {
            match result {
                Ok(image) => layers.push(place_layer(tree, id, image)),
                Err(err) => {
                    tracing::warn!(
                        node = tree.part(id).name(),
                        sprite = tree.part(id).sprite_name(),
                        %err,
                        "sprite failed to resolve; layer dropped"
                    );
                }
            }
        }
        if layers.is_empty() {
            return Ok(None);
        }

        let union = layers
            .iter()
            .skip(1)
            .fold(layers[0].bounds, |acc, l| acc.union(l.bounds));
        let (min_x, max_y) = (union.x0, union.y1);
        let width = ((union.x1 - union.x0).ceil() as u32).max(1);
        let height = ((union.y1 - union.y0).ceil() as u32).max(1);

        let mut out = vec![0u8; blend::buffer_len(width, height)?];
        let mut masks: HashMap<i64, Vec<u8>> = HashMap::new();

        for layer in &layers {
            let target_w = (layer.scaled_w.ceil() as u32).max(1);
            let target_h = (layer.scaled_h.ceil() as u32).max(1);
            let mut pixels = layer.image.resample_premul(target_w, target_h);
            if !layer.color.is_opaque_white() {
                blend::tint_in_place(&mut pixels, layer.color);
            }

            let paste_x = (layer.anchor_x - layer.pivot_off_x - min_x).round() as i64;
            let paste_y =
                (max_y - layer.anchor_y - (layer.scaled_h - layer.pivot_off_y)).round() as i64;

            if layer.stencil_ref != 0 && layer.stencil_comp == STENCIL_COMP_WRITE {
                let mask = masks
                    .entry(layer.stencil_ref)
                    .or_insert_with(|| vec![0u8; out.len()]);
                blend::paste_in_place(
                    mask,
                    width,
                    height,
                    &pixels,
                    target_w,
                    target_h,
                    paste_x,
                    paste_y,
                    BlendMode::Normal,
                )?;
                blend::paste_in_place(
                    &mut out,
                    width,
                    height,
                    &pixels,
                    target_w,
                    target_h,
                    paste_x,
                    paste_y,
                    layer.blend,
                )?;
            } else if layer.stencil_ref != 0 && layer.stencil_comp == STENCIL_COMP_READ {
                match masks.get(&layer.stencil_ref) {
                    Some(mask) => {
                        let clipped = blend::clip_to_mask(
                            &pixels, target_w, target_h, mask, width, height, paste_x, paste_y,
                        )?;
                        blend::paste_in_place(
                            &mut out,
                            width,
                            height,
                            &clipped,
                            target_w,
                            target_h,
                            paste_x,
                            paste_y,
                            layer.blend,
                        )?;
                    }
                    None => {
                        // Ordering issue in the source data, not a fault.
                        tracing::debug!(
                            node = tree.part(layer.id).name(),
                            stencil_ref = layer.stencil_ref,
                            "mask reader before any writer; layer skipped"
                        );
                    }
                }
            } else {
                blend::paste_in_place(
                    &mut out,
                    width,
                    height,
                    &pixels,
                    target_w,
                    target_h,
                    paste_x,
                    paste_y,
                    layer.blend,
                )?;
            }
        }

        Ok(Some(Composite {
            width,
            height,
            data: out,
        }))
    }
}

fn place_layer(tree: &PartTree, id: NodeId, image: SpriteImage) -> Layer {
    let part = tree.part(id);
    let renderer = part.renderer();
    let sprite = renderer.and_then(|r| r.sprite.as_ref());

    let transform = part.transform();
    let position = transform.map(|t| t.position()).unwrap_or_default();
    let scale = transform.map(|t| t.scale()).unwrap_or_default();
    let pivot = sprite.map(|s| s.pivot()).unwrap_or_default();
    let pixels_per_unit = sprite.map_or(100.0, |s| s.pixels_to_units());

    let scaled_w = (f64::from(image.width()) * f64::from(scale.x)).max(0.0);
    let scaled_h = (f64::from(image.height()) * f64::from(scale.y)).max(0.0);
    let anchor_x = f64::from(position.x) * f64::from(pixels_per_unit);
    let anchor_y = f64::from(position.y) * f64::from(pixels_per_unit);
    let pivot_off_x = f64::from(pivot.x) * scaled_w;
    let pivot_off_y = f64::from(pivot.y) * scaled_h;

    let left = anchor_x - pivot_off_x;
    let top = anchor_y + (scaled_h - pivot_off_y);
    let bounds = Rect::new(left, top - scaled_h, left + scaled_w, top);

    let (stencil_ref, stencil_comp) = renderer.map_or((0, 0), |r| r.stencil());
    Layer {
        id,
        image,
        scaled_w,
        scaled_h,
        anchor_x,
        anchor_y,
        pivot_off_x,
        pivot_off_y,
        color: renderer.map(|r| r.color()).unwrap_or_default(),
        blend: BlendMode::for_material(renderer.map_or("", |r| r.material_name())),
        stencil_ref,
        stencil_comp,
        bounds,
    }
}
