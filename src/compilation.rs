//! In-memory view of a bundler compilation: emitted assets, module graph and chunk hashes.
//!
//! The bundler integration fills a [`Compilation`] once per build. Asset capabilities are
//! resolved here, at the adapter boundary, through [`AssetSource`] so the rest of the crate
//! never has to guess what kind of source it was handed.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

/// Capability tag of an emitted asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
  /// Raw bytes without further structure.
  Plain,
  /// Text with an optional source map attached.
  SourceMapped,
  /// Ordered concatenation of child sources.
  Concatenated,
}

/// Content of an emitted asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
  /// Raw bytes.
  Plain(Vec<u8>),
  /// Text with its source map.
  SourceMapped {
    /// Asset text.
    text: String,
    /// Serialized source map, when one was produced.
    map: Option<String>,
  },
  /// Children concatenated in order.
  Concatenated(Vec<AssetSource>),
}

impl AssetSource {
  /// Text asset without a source map.
  pub fn text(text: impl Into<String>) -> Self {
    Self::SourceMapped {
      text: text.into(),
      map: None,
    }
  }

  /// Capability tag of this source.
  pub fn kind(&self) -> AssetKind {
    match self {
      Self::Plain(_) => AssetKind::Plain,
      Self::SourceMapped { .. } => AssetKind::SourceMapped,
      Self::Concatenated(_) => AssetKind::Concatenated,
    }
  }

  /// Full content as bytes; concatenated children are joined in order.
  pub fn bytes(&self) -> Cow<'_, [u8]> {
    match self {
      Self::Plain(bytes) => Cow::Borrowed(bytes),
      Self::SourceMapped { text, .. } => Cow::Borrowed(text.as_bytes()),
      Self::Concatenated(children) => Cow::Owned(
        children
          .iter()
          .flat_map(|child| child.bytes().into_owned())
          .collect(),
      ),
    }
  }

  /// Full content decoded as UTF-8, replacing invalid sequences.
  pub fn content(&self) -> Cow<'_, str> {
    match self {
      Self::Plain(bytes) => String::from_utf8_lossy(bytes),
      Self::SourceMapped { text, .. } => Cow::Borrowed(text),
      Self::Concatenated(children) => {
        Cow::Owned(children.iter().map(|child| child.content()).collect())
      }
    }
  }

  /// Source map attached to this source, if any.
  pub fn source_map(&self) -> Option<&str> {
    match self {
      Self::SourceMapped { map, .. } => map.as_deref(),
      _ => None,
    }
  }
}

/// Module of the build's module graph.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRecord {
  /// Build-assigned module identifier as it appears in bundled scripts.
  #[serde(deserialize_with = "string_or_number")]
  pub id: String,
  /// Raw import request, e.g. `./img/logo.png`.
  pub request: String,
  /// Assets emitted by the module.
  #[serde(default)]
  pub assets: Vec<String>,
}

/// Output chunk with its content hash.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChunkRecord {
  /// Chunk name.
  #[serde(default)]
  pub name: String,
  /// Content hash of the chunk for this build.
  pub hash: String,
  /// Files emitted for the chunk.
  #[serde(default)]
  pub files: Vec<String>,
}

/// Module graph and chunk metadata as written by the bundler's stats output.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BuildStats {
  /// Modules of the build.
  pub modules: Vec<ModuleRecord>,
  /// Chunks of the build.
  pub chunks: Vec<ChunkRecord>,
}

impl BuildStats {
  /// Read stats from a JSON file.
  pub fn from_path(path: &Path) -> Result<Self> {
    let content = fs::read_to_string(path)
      .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
  }
}

/// Mutable asset set of one build plus the metadata the sprite plugin consults.
#[derive(Debug, Clone)]
pub struct Compilation {
  output_dir: PathBuf,
  public_path: String,
  assets: BTreeMap<String, AssetSource>,
  modules: Vec<ModuleRecord>,
  chunks: Vec<ChunkRecord>,
  changed: BTreeSet<String>,
}

impl Compilation {
  /// Create an empty compilation. An empty public path keeps URLs relative.
  pub fn new(output_dir: impl Into<PathBuf>, public_path: impl Into<String>) -> Self {
    Self {
      output_dir: output_dir.into(),
      public_path: public_path.into(),
      assets: BTreeMap::new(),
      modules: Vec::new(),
      chunks: Vec::new(),
      changed: BTreeSet::new(),
    }
  }

  /// Directory the build writes its output to.
  pub fn output_dir(&self) -> &Path {
    &self.output_dir
  }

  /// Public URL prefix of emitted assets.
  pub fn public_path(&self) -> &str {
    &self.public_path
  }

  /// Register an asset produced by the bundler without marking it as changed.
  pub fn insert_asset(&mut self, name: impl Into<String>, source: AssetSource) {
    self.assets.insert(normalise_name(&name.into()), source);
  }

  /// Add a new asset to the build.
  pub fn emit_asset(&mut self, name: impl Into<String>, source: AssetSource) {
    let name = normalise_name(&name.into());
    self.changed.insert(name.clone());
    self.assets.insert(name, source);
  }

  /// Replace the content of an existing asset.
  pub fn update_asset(&mut self, name: &str, source: AssetSource) {
    self.emit_asset(name, source);
  }

  /// Asset stored under `name`.
  pub fn asset(&self, name: &str) -> Option<&AssetSource> {
    self.assets.get(name)
  }

  /// Every asset in name order.
  pub fn assets(&self) -> impl Iterator<Item = (&str, &AssetSource)> {
    self
      .assets
      .iter()
      .map(|(name, source)| (name.as_str(), source))
  }

  /// Names of assets emitted or updated since the compilation was created.
  pub fn changed_assets(&self) -> impl Iterator<Item = &str> {
    self.changed.iter().map(String::as_str)
  }

  /// Add a module to the module graph.
  pub fn add_module(&mut self, module: ModuleRecord) {
    self.modules.push(module);
  }

  /// Add a chunk with its current hash.
  pub fn add_chunk(&mut self, chunk: ChunkRecord) {
    self.chunks.push(chunk);
  }

  /// Attach modules and chunks from a stats document.
  pub fn with_stats(mut self, stats: BuildStats) -> Self {
    self.modules.extend(stats.modules);
    self.chunks.extend(stats.chunks);
    self
  }

  /// Module graph of the build.
  pub fn modules(&self) -> &[ModuleRecord] {
    &self.modules
  }

  /// Chunks of the build.
  pub fn chunks(&self) -> &[ChunkRecord] {
    &self.chunks
  }

  /// Load every file below `output_dir` as an asset.
  ///
  /// Text assets with a sibling `.map` file carry that map as their source map.
  pub fn load_dir(output_dir: &Path, public_path: &str) -> Result<Self> {
    let mut compilation = Self::new(output_dir, public_path);
    let mut files = Vec::new();
    collect_files(output_dir, Path::new(""), &mut files)?;

    for relative in files {
      let path = output_dir.join(&relative);
      let name = relative.to_string_lossy().replace('\\', "/");
      let bytes = fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
      let source = if is_text_asset(&name) {
        let map_path = output_dir.join(format!("{name}.map"));
        let map = fs::read_to_string(&map_path).ok();
        match String::from_utf8(bytes) {
          Ok(text) => AssetSource::SourceMapped { text, map },
          Err(err) => AssetSource::Plain(err.into_bytes()),
        }
      } else {
        AssetSource::Plain(bytes)
      };
      compilation.insert_asset(name, source);
    }

    Ok(compilation)
  }

  /// Write emitted and updated assets below `dir`, returning the written paths.
  pub fn write_changed(&self, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for name in &self.changed {
      let Some(source) = self.assets.get(name) else {
        continue;
      };
      let destination = dir.join(name);
      if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
          .with_context(|| format!("failed to create {}", parent.display()))?;
      }
      fs::write(&destination, source.bytes())
        .with_context(|| format!("failed to write {}", destination.display()))?;
      written.push(destination);
    }
    Ok(written)
  }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
  match serde_json::Value::deserialize(deserializer)? {
    serde_json::Value::String(value) => Ok(value),
    serde_json::Value::Number(value) => Ok(value.to_string()),
    other => Err(D::Error::custom(format!("invalid module id {other}"))),
  }
}

fn normalise_name(name: &str) -> String {
  name.replace('\\', "/").trim_start_matches('/').to_string()
}

fn is_text_asset(name: &str) -> bool {
  matches!(
    Path::new(name).extension().and_then(|ext| ext.to_str()),
    Some("css" | "js" | "mjs" | "cjs")
  )
}

fn collect_files(root: &Path, relative: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
  let current = root.join(relative);
  let entries =
    fs::read_dir(&current).with_context(|| format!("failed to read {}", current.display()))?;

  let mut children = Vec::new();
  for entry in entries {
    let entry = entry?;
    children.push((entry.file_name(), entry.file_type()?));
  }
  children.sort_by(|a, b| a.0.cmp(&b.0));

  for (file_name, file_type) in children {
    let child = relative.join(&file_name);
    if file_type.is_dir() {
      collect_files(root, &child, files)?;
    } else if file_type.is_file() {
      files.push(child);
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn concatenated_sources_join_children() {
    let source = AssetSource::Concatenated(vec![
      AssetSource::text(".a{}"),
      AssetSource::Plain(b".b{}".to_vec()),
    ]);
    assert_eq!(source.kind(), AssetKind::Concatenated);
    assert_eq!(source.content(), ".a{}.b{}");
    assert_eq!(source.bytes().len(), 8);
    assert!(source.source_map().is_none());
  }

  #[test]
  fn emitted_assets_are_tracked_as_changed() {
    let mut compilation = Compilation::new("/dist", "");
    compilation.insert_asset("main.css", AssetSource::text(".a{}"));
    compilation.emit_asset("/sprite/s.png", AssetSource::Plain(vec![1, 2]));

    assert_eq!(compilation.public_path(), "");
    assert!(compilation.asset("sprite/s.png").is_some());
    let changed: Vec<&str> = compilation.changed_assets().collect();
    assert_eq!(changed, vec!["sprite/s.png"]);
  }

  #[test]
  fn load_dir_reads_nested_assets_and_maps() -> Result<()> {
    let temp = tempdir()?;
    let root = temp.path();
    fs::create_dir_all(root.join("img"))?;
    fs::write(root.join("img/a.png"), [0u8, 1, 2])?;
    fs::write(root.join("main.css"), ".a{color:red}")?;
    fs::write(root.join("main.css.map"), "{\"version\":3}")?;

    let compilation = Compilation::load_dir(root, "/assets/")?;
    let names: Vec<&str> = compilation.assets().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["img/a.png", "main.css", "main.css.map"]);
    assert_eq!(
      compilation.asset("main.css").and_then(AssetSource::source_map),
      Some("{\"version\":3}")
    );
    assert_eq!(compilation.asset("img/a.png").map(AssetSource::kind), Some(AssetKind::Plain));
    Ok(())
  }

  #[test]
  fn write_changed_only_writes_touched_assets() -> Result<()> {
    let temp = tempdir()?;
    let mut compilation = Compilation::new(temp.path(), "/");
    compilation.insert_asset("untouched.css", AssetSource::text(".a{}"));
    compilation.emit_asset("sprite/s.png", AssetSource::Plain(vec![9]));

    let written = compilation.write_changed(temp.path())?;
    assert_eq!(written, vec![temp.path().join("sprite/s.png")]);
    assert!(!temp.path().join("untouched.css").exists());
    Ok(())
  }

  #[test]
  fn stats_attach_modules_and_chunks() -> Result<()> {
    let temp = tempdir()?;
    let path = temp.path().join("stats.json");
    fs::write(
      &path,
      r#"{"modules":[{"id":12,"request":"./a.png","assets":["img/a.png"]}],
          "chunks":[{"name":"main","hash":"abc","files":["main.js"]}]}"#,
    )?;

    let compilation = Compilation::new(temp.path(), "/").with_stats(BuildStats::from_path(&path)?);
    assert_eq!(compilation.modules()[0].id, "12");
    assert_eq!(compilation.modules()[0].assets, vec!["img/a.png"]);
    assert_eq!(compilation.chunks()[0].hash, "abc");
    Ok(())
  }
}
