//! Plugin configuration loader describing how sprites are built and referenced.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::selection::ImageSelection;

const DEFAULT_CONFIG_FILE: &str = "sprite.config.json";

const DEFAULT_INDENT: &str = "  ";

/// Discoverable sprite configuration. Every field falls back to its default when omitted.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpriteConfig {
  /// Image suffixes eligible for packing, with or without a leading dot.
  pub extensions: Vec<String>,
  /// Pixels inserted between packed images.
  pub padding: u32,
  /// String appended to the generated sprite URL, e.g. a cache-busting query.
  pub suffix: String,
  /// Directory the sprite is written to instead of being emitted into the build.
  pub output_path: Option<PathBuf>,
  /// Sprite filename template. `[hash]` is replaced with the sprite digest.
  pub output_filename: String,
  /// Serialize rewritten stylesheets without whitespace or comments.
  pub compress: bool,
  /// Indentation used when serializing rewritten stylesheets.
  pub indent: String,
  /// Keep the original declaration next to each rewritten one as a comment.
  pub comment_origin: bool,
  /// Enable diagnostics output.
  pub log: bool,
  /// Runtime function bundled scripts use to reference modules.
  pub require_function: String,
}

impl Default for SpriteConfig {
  fn default() -> Self {
    Self {
      extensions: vec!["png".into(), "jpg".into(), "jpeg".into(), "gif".into()],
      padding: 0,
      suffix: String::new(),
      output_path: None,
      output_filename: "/sprite/sprite-[hash].png".into(),
      compress: false,
      indent: DEFAULT_INDENT.into(),
      comment_origin: false,
      log: true,
      require_function: "__webpack_require__".into(),
    }
  }
}

impl SpriteConfig {
  /// Attempt to load configuration from the provided directory.
  ///
  /// When the configuration file does not exist or fails to parse we fallback to default
  /// values so the build can continue with the documented behaviour.
  pub fn discover(project_dir: &Path) -> Self {
    let candidate = project_dir.join(DEFAULT_CONFIG_FILE);
    Self::from_path(&candidate).unwrap_or_default()
  }

  /// Read configuration from a specific JSON file.
  pub fn from_path(path: &Path) -> Option<Self> {
    let content = fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
  }

  /// Image selection built from the configured extension allow-list.
  pub fn image_selection(&self) -> ImageSelection {
    ImageSelection::from_extensions(self.extensions.iter().cloned())
  }

  /// Indentation actually used by the serializer.
  ///
  /// Only whitespace is accepted; anything else falls back to two spaces.
  pub fn effective_indent(&self) -> &str {
    if self.indent.trim().is_empty() {
      &self.indent
    } else {
      DEFAULT_INDENT
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn defaults_match_documented_options() {
    let config = SpriteConfig::default();
    assert_eq!(config.extensions, vec!["png", "jpg", "jpeg", "gif"]);
    assert_eq!(config.padding, 0);
    assert_eq!(config.suffix, "");
    assert!(config.output_path.is_none());
    assert_eq!(config.output_filename, "/sprite/sprite-[hash].png");
    assert!(!config.compress);
    assert_eq!(config.indent, "  ");
    assert!(!config.comment_origin);
    assert!(config.log);
  }

  #[test]
  fn partial_json_keeps_remaining_defaults() {
    let config: SpriteConfig =
      serde_json::from_str(r#"{"padding": 4, "commentOrigin": true, "suffix": "?v=1"}"#).unwrap();
    assert_eq!(config.padding, 4);
    assert!(config.comment_origin);
    assert_eq!(config.suffix, "?v=1");
    assert_eq!(config.output_filename, "/sprite/sprite-[hash].png");
    assert!(config.log);
  }

  #[test]
  fn discover_falls_back_to_defaults() {
    let temp = tempdir().unwrap();
    let config = SpriteConfig::discover(temp.path());
    assert_eq!(config.padding, 0);
  }

  #[test]
  fn discover_reads_config_file() {
    let temp = tempdir().unwrap();
    fs::write(
      temp.path().join(DEFAULT_CONFIG_FILE),
      r#"{"extensions": ["svg", ".webp"], "outputFilename": "css/sprite-[hash].png"}"#,
    )
    .unwrap();

    let config = SpriteConfig::discover(temp.path());
    assert_eq!(config.output_filename, "css/sprite-[hash].png");
    let selection = config.image_selection();
    assert!(selection.is_image("icons/a.svg"));
    assert!(selection.is_image("icons/a.webp"));
    assert!(!selection.is_image("icons/a.png"));
  }

  #[test]
  fn indent_accepts_only_whitespace() {
    let mut config = SpriteConfig::default();
    config.indent = "\t".into();
    assert_eq!(config.effective_indent(), "\t");
    config.indent = "xx".into();
    assert_eq!(config.effective_indent(), "  ");
  }
}
