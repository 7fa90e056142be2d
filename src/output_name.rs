//! Resolve the sprite filename template.

use md5::{Digest, Md5};

/// Placeholder replaced by the content hash of the sprite.
pub const HASH_PLACEHOLDER: &str = "[hash]";

/// Sprite filename template with a lazily computed, cached resolution.
#[derive(Debug, Clone)]
pub struct OutputName {
  template: String,
  cached: Option<String>,
}

impl OutputName {
  /// Create a resolver for `template`, e.g. `/sprite/sprite-[hash].png`.
  pub fn new(template: impl Into<String>) -> Self {
    Self {
      template: template.into(),
      cached: None,
    }
  }

  /// The unresolved template.
  pub fn template(&self) -> &str {
    &self.template
  }

  /// Filename for `sprite`, computed on first use and reused until [`OutputName::invalidate`].
  pub fn resolve(&mut self, sprite: &[u8]) -> &str {
    let template = &self.template;
    self.cached.get_or_insert_with(|| {
      if template.contains(HASH_PLACEHOLDER) {
        template.replace(HASH_PLACEHOLDER, &content_hash(sprite))
      } else {
        template.clone()
      }
    })
  }

  /// Forget the cached filename; the next [`OutputName::resolve`] hashes again.
  pub fn invalidate(&mut self) {
    self.cached = None;
  }

  /// Whether a resolved filename is cached.
  pub fn is_resolved(&self) -> bool {
    self.cached.is_some()
  }
}

/// Lowercase hex MD5 of the lowercase hex encoding of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
  let hex: String = bytes.iter().map(|byte| format!("{byte:02x}")).collect();

  let mut hasher = Md5::new();
  hasher.update(hex.as_bytes());
  format!("{:x}", hasher.finalize())
}
