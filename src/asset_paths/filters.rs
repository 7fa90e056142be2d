use regex::Regex;

fn image_reference_ignores() -> &'static [Regex] {
  use std::sync::OnceLock;

  static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
  PATTERNS
    .get_or_init(|| {
      vec![
        Regex::new(r"(?i)^https?://").expect("invalid http(s) regex"),
        Regex::new(r"^//").expect("invalid protocol-relative regex"),
        Regex::new(r"(?i)^data:").expect("invalid data URI regex"),
      ]
    })
    .as_slice()
}

/// Determine whether a `url(...)` reference can never be part of the sprite.
///
/// Remote URLs and data URIs are not emitted by the build, so there is nothing to pack.
pub fn should_ignore_image_reference(value: &str) -> bool {
  image_reference_ignores()
    .iter()
    .any(|pattern| pattern.is_match(value))
}

#[cfg(test)]
mod tests {
  use super::should_ignore_image_reference;

  #[test]
  fn ignores_remote_urls() {
    assert!(should_ignore_image_reference("https://cdn.example.com/a.png"));
    assert!(should_ignore_image_reference("HTTP://example.com/a.png"));
    assert!(should_ignore_image_reference("//cdn.example.com/a.png"));
  }

  #[test]
  fn ignores_data_uris() {
    assert!(should_ignore_image_reference("data:image/png;base64,abc"));
  }

  #[test]
  fn keeps_build_relative_paths() {
    assert!(!should_ignore_image_reference("/assets/img/a.png"));
    assert!(!should_ignore_image_reference("img/a.png"));
  }
}
