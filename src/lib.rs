#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![allow(clippy::module_inception)]

pub mod asset_paths;
pub mod bundle;
pub mod collect;
pub mod compilation;
pub mod config;
pub mod declarations;
pub mod diagnostics;
pub mod models;
pub mod output_name;
pub mod packing;
pub mod plugin;
pub mod rewrite;
pub mod selection;
pub mod stylesheet;

pub use compilation::{AssetKind, AssetSource, BuildStats, ChunkRecord, Compilation, ModuleRecord};
pub use config::SpriteConfig;
pub use diagnostics::{
  Diagnostic, DiagnosticKind, Diagnostics, NoopDiagnostics, RecordingDiagnostics, Severity,
  TracingDiagnostics,
};
pub use models::{BuildReport, CollectionMode, CoordinateMap, ImageAsset, PackedSprite, Rect, SpriteSummary};
pub use packing::{BinaryTreePacker, PackError, Packer};
pub use plugin::SpritePlugin;
pub use selection::{AssetInclusion, ImageSelection};
