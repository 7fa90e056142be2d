//! Writers that put the sprite and the rewritten stylesheet and script assets back into the build.

pub mod script;
pub mod sprite;
pub mod styles;

pub use script::{
  ImageModule, ModuleMarker, ScriptFragment, ScriptOutcome, ScriptRewriter, SpliceError, SpliceList,
  encode_fragment, extract_fragments,
};
pub use sprite::{SpriteLocation, emit_sprite};
pub use styles::StyleRewriter;
