use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::blend;
use crate::compose::Composite;
use crate::error::FuseResult;

/// Lossless single-frame WebP encode of a composed buffer. Pure function of
/// the compose result.
pub fn encode_webp(composite: &Composite) -> FuseResult<Vec<u8>> {
    let mut straight = composite.data.clone();
    blend::unpremultiply_rgba8_in_place(&mut straight);

    let mut out = Vec::new();
    image::codecs::webp::WebPEncoder::new_lossless(&mut out)
        .encode(
            &straight,
            composite.width,
            composite.height,
            image::ExtendedColorType::Rgba8,
        )
        .context("encode webp")?;
    Ok(out)
}

/// Write the composite into `dir`, named by character id.
pub fn write_webp(composite: &Composite, dir: &Path, character: &str) -> FuseResult<PathBuf> {
    let bytes = encode_webp(composite)?;
    let path = dir.join(format!("{character}.{}", crate::assets::SPRITE_IMAGE_EXT));
    std::fs::write(&path, bytes)
        .with_context(|| format!("write '{}'", path.display()))?;
    Ok(path)
}
