//! Helpers used to decide which emitted assets take part in sprite generation.

use std::collections::BTreeSet;
use std::path::Path;

/// Trait describing selection filters for emitted build assets.
pub trait AssetInclusion {
  /// Returns `true` when the asset should be packed into the sprite.
  fn is_included(&self, asset_name: &str) -> bool;
}

/// Extension allow-list selecting image assets by their file suffix.
#[derive(Debug, Clone, Default)]
pub struct ImageSelection {
  extensions: BTreeSet<String>,
}

impl ImageSelection {
  /// Build a selection from raw suffixes such as `png` or `.png`.
  pub fn from_extensions(values: impl IntoIterator<Item = String>) -> Self {
    Self {
      extensions: normalise_list(values),
    }
  }

  /// Determine whether a path or module request names an allowed image.
  pub fn is_image(&self, name: &str) -> bool {
    extension_of(name).is_some_and(|extension| self.extensions.contains(&extension))
  }

  /// Returns true when no extension is allowed.
  pub fn is_empty(&self) -> bool {
    self.extensions.is_empty()
  }
}

impl AssetInclusion for ImageSelection {
  fn is_included(&self, asset_name: &str) -> bool {
    self.is_image(asset_name)
  }
}

/// Whether an emitted asset is an extracted stylesheet.
pub fn is_stylesheet(asset_name: &str) -> bool {
  extension_of(asset_name).is_some_and(|extension| extension == "css")
}

/// Whether an emitted asset is a script chunk that may embed stylesheet text.
///
/// Hot-update chunks only carry patches for a running page and are never rewritten.
pub fn is_script(asset_name: &str) -> bool {
  let is_hot_update = Path::new(asset_name)
    .file_name()
    .and_then(|name| name.to_str())
    .is_some_and(|name| name.contains(".hot-update.js"));
  !is_hot_update
    && extension_of(asset_name).is_some_and(|extension| matches!(extension.as_str(), "js" | "mjs" | "cjs"))
}

/// Lowercased extension of a name, ignoring any query string or fragment.
fn extension_of(name: &str) -> Option<String> {
  let request = name.split(['?', '#']).next().unwrap_or(name);
  Path::new(request)
    .extension()
    .and_then(|extension| extension.to_str())
    .map(str::to_ascii_lowercase)
}

/// Convert a list of raw suffixes into a sorted, de-duplicated set.
///
/// Values are trimmed, lowercased and stripped of a leading dot; empty entries are discarded.
fn normalise_list(values: impl IntoIterator<Item = String>) -> BTreeSet<String> {
  values
    .into_iter()
    .map(|value| value.trim().trim_start_matches('.').to_ascii_lowercase())
    .filter(|value| !value.is_empty())
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::SpriteConfig;

  #[test]
  fn default_extensions_select_common_images() {
    let selection = SpriteConfig::default().image_selection();
    assert!(selection.is_image("test.png"));
    assert!(selection.is_image("test.jpg"));
    assert!(selection.is_image("test.jpeg"));
    assert!(selection.is_image("test.gif"));
  }

  #[test]
  fn rejects_non_images_and_unlisted_types() {
    let selection = SpriteConfig::default().image_selection();
    assert!(!selection.is_image("test.css"));
    assert!(!selection.is_image("test.js"));
    assert!(!selection.is_image("test.svg"));
    assert!(!selection.is_image("png"));
  }

  #[test]
  fn custom_extensions_replace_defaults() {
    let selection = ImageSelection::from_extensions(vec!["svg".into(), ".webp".into()]);
    assert!(selection.is_included("a.svg"));
    assert!(selection.is_included("a.webp"));
    assert!(!selection.is_included("a.png"));
  }

  #[test]
  fn ignores_query_strings_and_case() {
    let selection = ImageSelection::from_extensions(vec!["png".into()]);
    assert!(selection.is_image("./img/Logo.PNG?inline"));
    assert!(selection.is_image("img/a.png#frag"));
  }

  #[test]
  fn classifies_text_assets() {
    assert!(is_stylesheet("css/main.CSS"));
    assert!(!is_stylesheet("main.css.map"));
    assert!(is_script("js/app.js"));
    assert!(is_script("chunk.mjs?v=1"));
    assert!(!is_script("app.0ab1.hot-update.js"));
    assert!(!is_script("app.js.map"));
  }

  #[test]
  fn normalises_whitespace_and_duplicates() {
    let normalised: Vec<String> =
      normalise_list(vec!["  PNG ".into(), ".png".into(), String::new(), "gif".into()])
        .into_iter()
        .collect();

    assert_eq!(normalised, vec![String::from("gif"), String::from("png")]);
  }
}
