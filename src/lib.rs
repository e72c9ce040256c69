//! Spritefuse assembles 2D character portraits from hierarchical sprite
//! parts.
//!
//! A character is a fixed-shape [`PartTree`] of interchangeable parts; a
//! [`SelectionEngine`] decides which leaf sprites are on (group exclusivity,
//! linked numbered variants, the Arms/ArmL/ArmR coupling); a [`Compositor`]
//! paints the selected layers — sorting order, tint, stencil masks, blend
//! modes — into one buffer cropped to the union of the visible content.
#![forbid(unsafe_code)]

pub mod assets;
pub mod blend;
pub mod collate;
pub mod compose;
pub mod error;
pub mod export;
pub mod model;
pub mod persist;
pub mod selection;
pub mod tree;
pub mod viewport;

pub use assets::{DirSpriteSource, SpriteImage, SpriteSource};
pub use blend::BlendMode;
pub use compose::{Composite, Compositor};
pub use error::{FuseError, FuseResult};
pub use model::{PartNode, parse_character};
pub use persist::{CollapseState, DirStateStore, StateStore};
pub use selection::{Selection, SelectionEngine, SessionState};
pub use tree::{NodeId, PartTree};
pub use viewport::ViewState;
