use std::path::PathBuf;

use anyhow::Context as _;
use image::imageops::FilterType;

use crate::error::{FuseError, FuseResult};

/// File extension of sprite assets on disk.
pub const SPRITE_IMAGE_EXT: &str = "webp";

/// Decoded sprite raster, straight (non-premultiplied) RGBA8.
///
/// Kept straight so resampling and tinting happen before premultiplication;
/// the compositor premultiplies exactly once per layer.
#[derive(Clone, Debug)]
pub struct SpriteImage {
    rgba: image::RgbaImage,
}

impl SpriteImage {
    pub fn decode(bytes: &[u8]) -> FuseResult<Self> {
        let dyn_img = image::load_from_memory(bytes).context("decode sprite image")?;
        Ok(Self {
            rgba: dyn_img.to_rgba8(),
        })
    }

    pub fn from_rgba(rgba: image::RgbaImage) -> Self {
        Self { rgba }
    }

    pub fn width(&self) -> u32 {
        self.rgba.width()
    }

    pub fn height(&self) -> u32 {
        self.rgba.height()
    }

    /// Resample to the target size in one pass (no intermediate scale, which
    /// would compound blur), then premultiply for compositing.
    pub fn resample_premul(&self, width: u32, height: u32) -> Vec<u8> {
        let mut data = if (width, height) == self.rgba.dimensions() {
            self.rgba.as_raw().clone()
        } else {
            image::imageops::resize(&self.rgba, width.max(1), height.max(1), FilterType::Triangle)
                .into_raw()
        };
        crate::blend::premultiply_rgba8_in_place(&mut data);
        data
    }
}

/// Image resolution collaborator: decoded raster for `(character, sprite)`.
///
/// Failures are per-sprite; the compositor drops unresolved layers and keeps
/// going, so implementations should fail fast rather than retry forever.
pub trait SpriteSource {
    fn load(&self, character: &str, sprite: &str) -> FuseResult<SpriteImage>;
}

/// Directory-backed sprite source following the extractor layout:
/// `{root}/{character}/{sprite}.webp`.
pub struct DirSpriteSource {
    root: PathBuf,
}

impl DirSpriteSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn sprite_path(&self, character: &str, sprite: &str) -> FuseResult<PathBuf> {
        validate_path_segment(character)?;
        validate_path_segment(sprite)?;
        Ok(self
            .root
            .join(character)
            .join(format!("{sprite}.{SPRITE_IMAGE_EXT}")))
    }
}

impl SpriteSource for DirSpriteSource {
    fn load(&self, character: &str, sprite: &str) -> FuseResult<SpriteImage> {
        let path = self.sprite_path(character, sprite)?;
        let bytes = std::fs::read(&path)
            .with_context(|| format!("read sprite '{}'", path.display()))?;
        SpriteImage::decode(&bytes)
    }
}

/// Ids and sprite names address files; they must stay single path segments.
fn validate_path_segment(s: &str) -> FuseResult<()> {
    if s.is_empty() {
        return Err(FuseError::validation("path segment must be non-empty"));
    }
    if s.contains('/') || s.contains('\\') || s == "." || s == ".." {
        return Err(FuseError::validation(format!(
            "'{s}' is not a valid path segment"
        )));
    }
    Ok(())
}
