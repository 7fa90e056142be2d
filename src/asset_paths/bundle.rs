use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

fn url_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r"url\(([^)]+)\)").expect("invalid url() regex"))
}

/// Extract the first `url(...)` reference of a declaration value, without quotes.
pub fn extract_url(value: &str) -> Option<String> {
  let captured = url_pattern().captures(value)?.get(1)?.as_str().trim();
  let unquoted = captured
    .strip_prefix('"')
    .and_then(|rest| rest.strip_suffix('"'))
    .or_else(|| {
      captured
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    })
    .unwrap_or(captured);
  Some(unquoted.to_string())
}

/// A background URL mapped back onto the build output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
  /// Public URL of the image, always prefixed with the public path.
  pub url: String,
  /// Name of the emitted asset the URL refers to.
  pub asset_name: String,
  /// Output directory joined with the asset name; the coordinate map key.
  pub local: PathBuf,
}

/// Resolve a URL found in a stylesheet against the public path and output directory.
///
/// The public path prefix is stripped when present; query strings and fragments do not
/// take part in the asset name. The local path always uses the output directory as its
/// base, even for URLs written with a leading slash.
pub fn resolve_image_url(url: &str, public_path: &str, output_dir: &Path) -> ResolvedImage {
  let relative = url.strip_prefix(public_path).unwrap_or(url);
  let asset_name = relative
    .split(['?', '#'])
    .next()
    .unwrap_or(relative)
    .trim_start_matches("./")
    .trim_start_matches('/')
    .replace('\\', "/");

  ResolvedImage {
    url: format!("{public_path}{relative}"),
    local: output_dir.join(&asset_name),
    asset_name,
  }
}

/// Public URL of the sprite: public path, output filename and suffix.
///
/// A slash shared by the end of the public path and the start of the filename is
/// written once.
pub fn sprite_url(public_path: &str, file_name: &str, suffix: &str) -> String {
  let file_name = if public_path.ends_with('/') {
    file_name.trim_start_matches('/')
  } else {
    file_name
  };
  format!("{public_path}{file_name}{suffix}")
}
