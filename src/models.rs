//! Data structures produced while building a sprite and rewriting references to it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Image bytes collected from the build, identified by their resolved local path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
  /// Output directory joined with the asset name.
  pub path: PathBuf,
  /// Encoded image content.
  pub bytes: Vec<u8>,
}

impl ImageAsset {
  /// Create an asset from its path and content.
  pub fn new(path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) -> Self {
    Self {
      path: path.into(),
      bytes: bytes.into(),
    }
  }
}

/// Placement of a source image inside the sprite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
  /// Horizontal offset from the left edge.
  pub x: u32,
  /// Vertical offset from the top edge.
  pub y: u32,
  /// Width of the source image.
  pub width: u32,
  /// Height of the source image.
  pub height: u32,
}

impl Rect {
  /// Create a rectangle.
  pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }
}

/// Coordinates of every packed image keyed by its resolved local path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinateMap {
  entries: BTreeMap<PathBuf, Rect>,
}

impl CoordinateMap {
  /// Create an empty map.
  pub fn new() -> Self {
    Self::default()
  }

  /// Record the placement of an image.
  pub fn insert(&mut self, path: impl Into<PathBuf>, rect: Rect) {
    self.entries.insert(path.into(), rect);
  }

  /// Placement of the image at `path`, if it was packed.
  pub fn get(&self, path: &Path) -> Option<&Rect> {
    self.entries.get(path)
  }

  /// Number of packed images.
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// Returns true when nothing was packed.
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Iterate over every packed image in path order.
  pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &Rect)> {
    self.entries.iter()
  }
}

impl FromIterator<(PathBuf, Rect)> for CoordinateMap {
  fn from_iter<I: IntoIterator<Item = (PathBuf, Rect)>>(iter: I) -> Self {
    Self {
      entries: iter.into_iter().collect(),
    }
  }
}

/// Composite image produced by the packer together with the placement of its sources.
#[derive(Debug, Clone)]
pub struct PackedSprite {
  /// Encoded PNG bytes of the sprite.
  pub image: Vec<u8>,
  /// Sprite width in pixels.
  pub width: u32,
  /// Sprite height in pixels.
  pub height: u32,
  /// Placement of every source image.
  pub coordinates: CoordinateMap,
}

/// How images were discovered for the current build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionMode {
  /// Images are imported by script modules and CSS lives inside script chunks.
  Inline,
  /// Images are referenced from emitted stylesheet assets.
  Extracted,
}

/// Emitted text asset that has to be rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformTarget {
  /// Name of the asset in the compilation.
  pub asset_name: String,
}

/// Sprite written for a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteSummary {
  /// Resolved output filename of the sprite.
  pub file_name: String,
  /// Public URL used in rewritten declarations.
  pub url: String,
  /// Size of the encoded sprite.
  pub byte_len: usize,
  /// Number of packed images.
  pub image_count: usize,
}

/// Outcome of one plugin run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
  /// Discovery mode used for the build.
  pub mode: CollectionMode,
  /// Sprite produced for the build, if any.
  pub sprite: Option<SpriteSummary>,
  /// Assets whose content was replaced.
  pub rewritten_assets: Vec<String>,
  /// Number of rewritten background declarations.
  pub rewritten_declarations: usize,
}

impl BuildReport {
  pub(crate) fn empty(mode: CollectionMode) -> Self {
    Self {
      mode,
      sprite: None,
      rewritten_assets: Vec::new(),
      rewritten_declarations: 0,
    }
  }
}
