//! Pack collected images into one PNG sprite.
//!
//! The [`Packer`] trait is the seam the plugin calls through; [`BinaryTreePacker`] is the
//! default implementation. Packing is synchronous and either yields a complete
//! [`PackedSprite`] or a [`PackError`] that the caller reports without retrying.

mod binary_tree;

use std::io::Cursor;
use std::path::PathBuf;

use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
use thiserror::Error;

use crate::models::{CoordinateMap, ImageAsset, PackedSprite, Rect};

use binary_tree::{Block, layout};

/// Transparent canvas background.
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Errors raised while packing a sprite.
#[derive(Debug, Error)]
pub enum PackError {
  /// No image was supplied.
  #[error("no images to pack")]
  Empty,
  /// A source image could not be decoded.
  #[error("failed to decode {}: {source}", path.display())]
  Decode {
    /// Resolved path of the image.
    path: PathBuf,
    /// Decoder error.
    #[source]
    source: image::ImageError,
  },
  /// The layout could not place every image.
  #[error("failed to lay out {count} images")]
  Layout {
    /// Number of images that were being packed.
    count: usize,
  },
  /// The composite image could not be encoded.
  #[error("failed to encode sprite: {0}")]
  Encode(#[source] image::ImageError),
}

/// Combines images into a sprite and reports where each one landed.
pub trait Packer {
  /// Pack `images`, leaving `padding` pixels between neighbours.
  fn pack(&self, images: &[ImageAsset], padding: u32) -> Result<PackedSprite, PackError>;
}

/// Packs images with a growing binary tree, largest first.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryTreePacker;

impl Packer for BinaryTreePacker {
  fn pack(&self, images: &[ImageAsset], padding: u32) -> Result<PackedSprite, PackError> {
    if images.is_empty() {
      return Err(PackError::Empty);
    }

    let decoded = images
      .iter()
      .map(|asset| {
        image::load_from_memory(&asset.bytes)
          .map(|image| (asset, image.to_rgba8()))
          .map_err(|source| PackError::Decode {
            path: asset.path.clone(),
            source,
          })
      })
      .collect::<Result<Vec<_>, _>>()?;

    let mut order: Vec<usize> = (0..decoded.len()).collect();
    order.sort_by(|&a, &b| {
      let (a, b) = (&decoded[a].1, &decoded[b].1);
      let key = |image: &RgbaImage| {
        let (w, h) = image.dimensions();
        (w.max(h), w.min(h), h, w)
      };
      key(b).cmp(&key(a))
    });

    let blocks: Vec<Block> = order
      .iter()
      .map(|&index| {
        let (width, height) = decoded[index].1.dimensions();
        Block {
          width: width + padding,
          height: height + padding,
        }
      })
      .collect();
    let placed = layout(&blocks).ok_or(PackError::Layout { count: blocks.len() })?;

    let width = placed.width.saturating_sub(padding).max(1);
    let height = placed.height.saturating_sub(padding).max(1);
    let mut canvas = RgbaImage::from_pixel(width, height, TRANSPARENT);
    let mut coordinates = CoordinateMap::new();

    for (&index, &(x, y)) in order.iter().zip(&placed.positions) {
      let (asset, image) = &decoded[index];
      image::imageops::replace(&mut canvas, image, i64::from(x), i64::from(y));
      coordinates.insert(
        asset.path.clone(),
        Rect::new(x, y, image.width(), image.height()),
      );
    }

    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(canvas)
      .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
      .map_err(PackError::Encode)?;

    Ok(PackedSprite {
      image: bytes,
      width,
      height,
      coordinates,
    })
  }
}
