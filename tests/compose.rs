use std::collections::HashMap;

use spritefuse::error::{FuseError, FuseResult};
use spritefuse::{Compositor, PartTree, Selection, SpriteImage, SpriteSource};

/// In-memory sprite source keyed by sprite name; anything absent fails to
/// resolve.
struct MemorySource {
    sprites: HashMap<String, SpriteImage>,
}

impl MemorySource {
    fn new() -> Self {
        Self {
            sprites: HashMap::new(),
        }
    }

    fn insert(&mut self, name: &str, width: u32, height: u32, rgba: [u8; 4]) {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
        self.sprites
            .insert(name.to_string(), SpriteImage::from_rgba(img));
    }
}

impl SpriteSource for MemorySource {
    fn load(&self, _character: &str, sprite: &str) -> FuseResult<SpriteImage> {
        self.sprites
            .get(sprite)
            .cloned()
            .ok_or_else(|| FuseError::composition(format!("no sprite '{sprite}'")))
    }
}

/// Leaf JSON with bottom-left pivot so its bounding box is
/// `[x, y, x+w, y+h]` in world pixels (PixelsToUnits = 1, so Position is in
/// pixels directly).
#[allow(clippy::too_many_arguments)]
fn leaf_at(
    name: &str,
    x: f32,
    y: f32,
    sorting: i32,
    material: &str,
    stencil_ref: i64,
    stencil_comp: i64,
    color: Option<[f32; 4]>,
) -> String {
    let color = match color {
        Some([r, g, b, a]) => {
            format!(r#", "Color": {{"r": {r}, "g": {g}, "b": {b}, "a": {a}}}"#)
        }
        None => String::new(),
    };
    let materials = if material.is_empty() && stencil_ref == 0 {
        String::new()
    } else {
        format!(
            r#", "Materials": [{{"Name": "{material}", "Floats": {{"_StencilRef": {stencil_ref}.0, "_StencilComp": {stencil_comp}.0}}}}]"#
        )
    };
    format!(
        r#"{{"Name": "{name}",
            "Transform": {{"Position": {{"x": {x}, "y": {y}, "z": 0.0}}, "Scale": {{"x": 1.0, "y": 1.0}}}},
            "SpriteRenderer": {{
                "Sprite": {{"Name": "{name}", "PixelsToUnits": 1.0, "Pivot": {{"x": 0.0, "y": 0.0}}}},
                "Enabled": true, "SortingOrder": {sorting}{color}{materials}
            }}}}"#
    )
}

fn tree_of(leaves: &[String]) -> PartTree {
    let children: Vec<String> = leaves
        .iter()
        .enumerate()
        .map(|(i, l)| format!(r#""k{i}": {l}"#))
        .collect();
    let json = format!(
        r#"{{"r": {{"Name": "Root", "Children": {{"g": {{"Name": "Parts", "Children": {{{}}}}}}}}}}}"#,
        children.join(", ")
    );
    PartTree::new(spritefuse::parse_character(&json).unwrap()).unwrap()
}

fn select_all_leaves(tree: &PartTree) -> Selection {
    let mut sel = Selection::new(tree);
    let engine = spritefuse::SelectionEngine::new(tree);
    for id in tree.walk(tree.root()).collect::<Vec<_>>() {
        if tree.part(id).is_leaf_sprite() {
            engine.set_leaf_selected(&mut sel, id, true);
        }
    }
    sel
}

fn pixel(data: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
    let i = ((y * width + x) * 4) as usize;
    [data[i], data[i + 1], data[i + 2], data[i + 3]]
}

#[test]
fn output_is_cropped_to_the_union_bounding_box() {
    // Two 10x10 layers at [0,0,10,10] and [20,20,30,30]: the union is 30x30,
    // not either layer's box.
    let tree = tree_of(&[
        leaf_at("low", 0.0, 0.0, 0, "", 0, 0, None),
        leaf_at("high", 20.0, 20.0, 1, "", 0, 0, None),
    ]);
    let mut source = MemorySource::new();
    source.insert("low", 10, 10, [255, 0, 0, 255]);
    source.insert("high", 10, 10, [0, 255, 0, 255]);

    let sel = select_all_leaves(&tree);
    let out = Compositor::new(&source)
        .compose(&tree, &sel, "test")
        .unwrap()
        .unwrap();

    assert_eq!((out.width, out.height), (30, 30));
    // World y is up; buffer rows grow down. "low" sits bottom-left, "high"
    // top-right, and the middle stays empty.
    assert_eq!(pixel(&out.data, 30, 0, 29), [255, 0, 0, 255]);
    assert_eq!(pixel(&out.data, 30, 25, 0), [0, 255, 0, 255]);
    assert_eq!(pixel(&out.data, 30, 15, 15), [0, 0, 0, 0]);
}

#[test]
fn unresolved_sprites_are_dropped_best_effort() {
    let tree = tree_of(&[
        leaf_at("present", 0.0, 0.0, 0, "", 0, 0, None),
        leaf_at("missing", 20.0, 20.0, 1, "", 0, 0, None),
    ]);
    let mut source = MemorySource::new();
    source.insert("present", 10, 10, [9, 9, 9, 255]);

    let sel = select_all_leaves(&tree);
    let out = Compositor::new(&source)
        .compose(&tree, &sel, "test")
        .unwrap()
        .unwrap();

    // The dropped layer no longer contributes to the union box.
    assert_eq!((out.width, out.height), (10, 10));
}

#[test]
fn zero_selected_layers_compose_to_none() {
    let tree = tree_of(&[leaf_at("part", 0.0, 0.0, 0, "", 0, 0, None)]);
    let mut source = MemorySource::new();
    source.insert("part", 4, 4, [1, 2, 3, 255]);

    let sel = Selection::new(&tree);
    let out = Compositor::new(&source).compose(&tree, &sel, "test").unwrap();
    assert!(out.is_none());
}

#[test]
fn all_sprites_unresolved_composes_to_none() {
    let tree = tree_of(&[leaf_at("ghost", 0.0, 0.0, 0, "", 0, 0, None)]);
    let source = MemorySource::new();

    let sel = select_all_leaves(&tree);
    let out = Compositor::new(&source).compose(&tree, &sel, "test").unwrap();
    assert!(out.is_none());
}

#[test]
fn higher_sorting_order_paints_on_top() {
    let tree = tree_of(&[
        leaf_at("top", 0.0, 0.0, 10, "", 0, 0, None),
        leaf_at("bottom", 0.0, 0.0, 0, "", 0, 0, None),
    ]);
    let mut source = MemorySource::new();
    source.insert("bottom", 8, 8, [0, 0, 255, 255]);
    source.insert("top", 8, 8, [255, 0, 0, 255]);

    let sel = select_all_leaves(&tree);
    let out = Compositor::new(&source)
        .compose(&tree, &sel, "test")
        .unwrap()
        .unwrap();
    assert_eq!(pixel(&out.data, 8, 4, 4), [255, 0, 0, 255]);
}

#[test]
fn mask_reader_is_clipped_to_the_writer_region() {
    // Writer: 10x10 at x=0 (stencil ref 1, comp 8). Reader: 20x10 with the
    // same ref (comp 4) painted after it. Reader pixels survive only inside
    // the writer's coverage.
    let tree = tree_of(&[
        leaf_at("writer", 0.0, 0.0, 0, "", 1, 8, None),
        leaf_at("reader", 0.0, 0.0, 1, "", 1, 4, None),
    ]);
    let mut source = MemorySource::new();
    source.insert("writer", 10, 10, [255, 0, 0, 255]);
    source.insert("reader", 20, 10, [0, 255, 0, 255]);

    let sel = select_all_leaves(&tree);
    let out = Compositor::new(&source)
        .compose(&tree, &sel, "test")
        .unwrap()
        .unwrap();

    assert_eq!((out.width, out.height), (20, 10));
    // Inside the mask the reader wins; outside it nothing was painted (the
    // writer itself is also visible inside its own box).
    assert_eq!(pixel(&out.data, 20, 5, 5), [0, 255, 0, 255]);
    assert_eq!(pixel(&out.data, 20, 15, 5), [0, 0, 0, 0]);
}

#[test]
fn mask_reader_before_any_writer_is_invisible() {
    let tree = tree_of(&[leaf_at("reader", 0.0, 0.0, 0, "", 1, 4, None)]);
    let mut source = MemorySource::new();
    source.insert("reader", 10, 10, [0, 255, 0, 255]);

    let sel = select_all_leaves(&tree);
    let out = Compositor::new(&source)
        .compose(&tree, &sel, "test")
        .unwrap()
        .unwrap();

    // The layer still sizes the output but paints nothing.
    assert_eq!((out.width, out.height), (10, 10));
    assert!(out.data.iter().all(|&b| b == 0));
}

#[test]
fn opaque_white_tint_is_the_identity() {
    let tinted = tree_of(&[leaf_at(
        "part",
        0.0,
        0.0,
        0,
        "",
        0,
        0,
        Some([1.0, 1.0, 1.0, 1.0]),
    )]);
    let plain = tree_of(&[leaf_at("part", 0.0, 0.0, 0, "", 0, 0, None)]);

    let mut source = MemorySource::new();
    source.insert("part", 6, 6, [120, 90, 60, 200]);

    let a = Compositor::new(&source)
        .compose(&tinted, &select_all_leaves(&tinted), "test")
        .unwrap()
        .unwrap();
    let b = Compositor::new(&source)
        .compose(&plain, &select_all_leaves(&plain), "test")
        .unwrap()
        .unwrap();
    assert_eq!(a.data, b.data);
}

#[test]
fn tint_multiplies_color_channels() {
    let tree = tree_of(&[leaf_at(
        "part",
        0.0,
        0.0,
        0,
        "",
        0,
        0,
        Some([1.0, 0.0, 0.0, 1.0]),
    )]);
    let mut source = MemorySource::new();
    source.insert("part", 4, 4, [200, 200, 200, 255]);

    let sel = select_all_leaves(&tree);
    let out = Compositor::new(&source)
        .compose(&tree, &sel, "test")
        .unwrap()
        .unwrap();
    let px = pixel(&out.data, 4, 2, 2);
    assert_eq!(px[3], 255);
    assert!(px[0] >= 199);
    assert_eq!(px[1], 0);
    assert_eq!(px[2], 0);
}

#[test]
fn multiply_material_darkens_the_backdrop() {
    let tree = tree_of(&[
        leaf_at("base", 0.0, 0.0, 0, "", 0, 0, None),
        leaf_at("shade", 0.0, 0.0, 1, "Naninovel_Multiply_Stencil", 0, 0, None),
    ]);
    let mut source = MemorySource::new();
    source.insert("base", 6, 6, [200, 200, 200, 255]);
    source.insert("shade", 6, 6, [128, 128, 128, 255]);

    let sel = select_all_leaves(&tree);
    let out = Compositor::new(&source)
        .compose(&tree, &sel, "test")
        .unwrap()
        .unwrap();
    let px = pixel(&out.data, 6, 3, 3);
    // 200 * 128/255 ~= 100.
    assert!(px[0].abs_diff(100) <= 2, "got {}", px[0]);
    assert_eq!(px[3], 255);
}

#[test]
fn compose_is_deterministic() {
    let tree = tree_of(&[
        leaf_at("a", 0.0, 0.0, 0, "", 0, 0, None),
        leaf_at("b", 3.0, 3.0, 1, "Naninovel_Softlight", 0, 0, None),
    ]);
    let mut source = MemorySource::new();
    source.insert("a", 8, 8, [10, 80, 160, 255]);
    source.insert("b", 8, 8, [200, 40, 90, 180]);

    let sel = select_all_leaves(&tree);
    let first = Compositor::new(&source)
        .compose(&tree, &sel, "test")
        .unwrap()
        .unwrap();
    let second = Compositor::new(&source)
        .compose(&tree, &sel, "test")
        .unwrap()
        .unwrap();
    assert_eq!(first.data, second.data);
    assert_eq!((first.width, first.height), (second.width, second.height));
}
