//! Helpers for resolving background image URLs to emitted build assets.
//!
//! Collection and rewriting both resolve URLs through [`resolve_image_url`], so a rewritten
//! declaration looks up the same coordinate key its image was packed under.

mod bundle;
mod filters;

pub use bundle::{ResolvedImage, extract_url, resolve_image_url, sprite_url};
pub use filters::should_ignore_image_reference;
