//! Write the packed sprite into the build output.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::compilation::{AssetSource, Compilation};

/// Where the sprite ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpriteLocation {
  /// Emitted into the compilation under this asset name.
  Asset(String),
  /// Written straight to disk at this path.
  File(PathBuf),
}

/// Emit `bytes` under `file_name`, or write them below `output_path` when one is configured.
///
/// A leading `/` of the filename is dropped in both cases.
pub fn emit_sprite(
  compilation: &mut Compilation,
  file_name: &str,
  bytes: &[u8],
  output_path: Option<&Path>,
) -> Result<SpriteLocation> {
  let relative = file_name.trim_start_matches('/');

  let Some(dir) = output_path else {
    compilation.emit_asset(relative, AssetSource::Plain(bytes.to_vec()));
    return Ok(SpriteLocation::Asset(relative.to_string()));
  };

  let target = dir.join(relative);
  if let Some(parent) = target.parent() {
    fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  fs::write(&target, bytes).with_context(|| format!("failed to write {}", target.display()))?;
  Ok(SpriteLocation::File(target))
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn emits_into_compilation_without_leading_slash() {
    let mut compilation = Compilation::new("/out", "/");
    let location = emit_sprite(&mut compilation, "/sprite/s.png", &[1, 2], None).unwrap();

    assert_eq!(location, SpriteLocation::Asset("sprite/s.png".into()));
    assert_eq!(
      compilation.asset("sprite/s.png"),
      Some(&AssetSource::Plain(vec![1, 2]))
    );
    assert_eq!(compilation.changed_assets().collect::<Vec<_>>(), vec!["sprite/s.png"]);
  }

  #[test]
  fn writes_to_configured_directory() {
    let dir = tempdir().unwrap();
    let mut compilation = Compilation::new("/out", "/");
    let location =
      emit_sprite(&mut compilation, "/sprite/s.png", &[7], Some(dir.path())).unwrap();

    let expected = dir.path().join("sprite/s.png");
    assert_eq!(location, SpriteLocation::File(expected.clone()));
    assert_eq!(fs::read(expected).unwrap(), vec![7]);
    assert!(compilation.asset("sprite/s.png").is_none());
  }
}
