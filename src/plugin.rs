//! Build orchestrator: one [`SpritePlugin::run`] per build of the host bundler.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::asset_paths::sprite_url;
use crate::bundle::{ImageModule, ModuleMarker, ScriptRewriter, SpriteLocation, StyleRewriter, emit_sprite};
use crate::collect::{CollectedImages, ParsedStylesheet, collect_images};
use crate::compilation::{AssetSource, Compilation};
use crate::config::SpriteConfig;
use crate::diagnostics::{
  Diagnostic, DiagnosticKind, Diagnostics, NoopDiagnostics, Severity, TracingDiagnostics,
};
use crate::models::{BuildReport, CollectionMode, CoordinateMap, SpriteSummary, TransformTarget};
use crate::output_name::OutputName;
use crate::packing::{BinaryTreePacker, Packer};
use crate::rewrite::RewriteOptions;
use crate::selection::{ImageSelection, is_script};
use crate::stylesheet::StringifyOptions;

/// Sprite plugin instance. State carried between runs: the last sprite, its coordinates,
/// its resolved filename and the chunk hashes seen in the previous build.
pub struct SpritePlugin {
  config: SpriteConfig,
  selection: ImageSelection,
  diagnostics: Box<dyn Diagnostics>,
  packer: Box<dyn Packer>,
  chunk_hashes: BTreeMap<String, String>,
  sprite: Option<Vec<u8>>,
  output_name: OutputName,
  coordinates: CoordinateMap,
}

impl SpritePlugin {
  /// Create a plugin with the default packer. Diagnostics go to `tracing` unless `log` is off.
  pub fn new(config: SpriteConfig) -> Self {
    let diagnostics: Box<dyn Diagnostics> = if config.log {
      Box::new(TracingDiagnostics)
    } else {
      Box::new(NoopDiagnostics)
    };

    Self {
      selection: config.image_selection(),
      output_name: OutputName::new(config.output_filename.clone()),
      config,
      diagnostics,
      packer: Box::new(BinaryTreePacker),
      chunk_hashes: BTreeMap::new(),
      sprite: None,
      coordinates: CoordinateMap::new(),
    }
  }

  /// Send diagnostics to `diagnostics` instead of the default sink.
  pub fn with_diagnostics(mut self, diagnostics: impl Diagnostics + 'static) -> Self {
    self.diagnostics = Box::new(diagnostics);
    self
  }

  /// Pack sprites with `packer`.
  pub fn with_packer(mut self, packer: impl Packer + 'static) -> Self {
    self.packer = Box::new(packer);
    self
  }

  /// Active configuration.
  pub fn config(&self) -> &SpriteConfig {
    &self.config
  }

  /// Encoded sprite of the last successful run.
  pub fn sprite(&self) -> Option<&[u8]> {
    self.sprite.as_deref()
  }

  /// Coordinates of the last successful run.
  pub fn coordinates(&self) -> &CoordinateMap {
    &self.coordinates
  }

  /// Process one build: pack the referenced images, emit the sprite and rewrite every
  /// stylesheet or script chunk that points at a packed image.
  ///
  /// Failures never abort the host build. They are reported through the diagnostics sink
  /// and the affected step is skipped.
  pub fn run(&mut self, compilation: &mut Compilation) -> BuildReport {
    let diagnostics = &*self.diagnostics;
    let CollectedImages {
      mode,
      images,
      stylesheets,
    } = collect_images(compilation, &self.selection, diagnostics);

    if images.is_empty() {
      diagnostics.emit(Diagnostic::new(
        Severity::Warning,
        DiagnosticKind::NoImages,
        "No image to process.",
      ));
      return BuildReport::empty(mode);
    }

    diagnostics.emit(Diagnostic::info(format!(
      "Creating sprite image from {} images ...",
      images.len()
    )));
    let packed = match self.packer.pack(&images, self.config.padding) {
      Ok(packed) => packed,
      Err(err) => {
        diagnostics.emit(Diagnostic::new(
          Severity::Error,
          DiagnosticKind::PackFailed,
          format!("failed to create sprite image: {err}"),
        ));
        return BuildReport::empty(mode);
      }
    };

    self.output_name.invalidate();
    self.coordinates = packed.coordinates;
    let sprite = self.sprite.insert(packed.image);
    let file_name = self.output_name.resolve(sprite).to_string();
    let url = sprite_url(compilation.public_path(), &file_name, &self.config.suffix);

    let output_path = self.config.output_path.as_deref();
    match emit_sprite(compilation, &file_name, sprite, output_path) {
      Ok(SpriteLocation::Asset(name)) => diagnostics.emit(Diagnostic::new(
        Severity::Success,
        DiagnosticKind::Progress,
        format!("{name} ({} bytes) created.", sprite.len()),
      )),
      Ok(SpriteLocation::File(path)) => diagnostics.emit(Diagnostic::new(
        Severity::Success,
        DiagnosticKind::Progress,
        format!("{} ({} bytes) created.", path.display(), sprite.len()),
      )),
      Err(err) => {
        diagnostics.emit(Diagnostic::new(
          Severity::Error,
          DiagnosticKind::EmitFailed,
          format!("failed to emit sprite image: {err:#}"),
        ));
        return BuildReport::empty(mode);
      }
    }

    let mut report = BuildReport {
      mode,
      sprite: Some(SpriteSummary {
        file_name,
        url: url.clone(),
        byte_len: sprite.len(),
        image_count: self.coordinates.len(),
      }),
      rewritten_assets: Vec::new(),
      rewritten_declarations: 0,
    };

    let rewrite = RewriteOptions {
      sprite_url: &url,
      comment_origin: self.config.comment_origin,
    };
    let stringify = StringifyOptions {
      indent: self.config.effective_indent(),
      compress: self.config.compress,
    };

    match mode {
      CollectionMode::Extracted => {
        let rewriter = StyleRewriter {
          coordinates: &self.coordinates,
          public_path: compilation.public_path(),
          output_dir: compilation.output_dir(),
          rewrite,
          stringify,
        };
        let updates = transform_stylesheets(&rewriter, compilation, stylesheets, diagnostics);
        commit(compilation, updates, &mut report);
      }
      CollectionMode::Inline => {
        let modules = image_modules(
          compilation,
          &self.selection,
          &self.coordinates,
          &self.config.require_function,
          diagnostics,
        );
        let targets = transform_targets(compilation, &mut self.chunk_hashes);
        let rewriter = ScriptRewriter {
          modules: &modules,
          rewrite,
          stringify,
        };
        let updates = transform_scripts(&rewriter, compilation, &targets, diagnostics);
        commit(compilation, updates, &mut report);
      }
    }

    report
  }
}

type AssetUpdate = (String, AssetSource, usize);

fn transform_stylesheets(
  rewriter: &StyleRewriter<'_>,
  compilation: &Compilation,
  stylesheets: BTreeMap<String, ParsedStylesheet>,
  diagnostics: &dyn Diagnostics,
) -> Vec<AssetUpdate> {
  let mut updates = Vec::new();
  for (name, parsed) in stylesheets {
    let Some(original) = compilation.asset(&name) else {
      continue;
    };
    diagnostics.emit(Diagnostic::info(format!("transforming css asset {name} ...")));
    if let Some((source, count)) = rewriter.rewrite_asset(original, parsed, diagnostics) {
      updates.push((name, source, count));
    }
  }
  updates
}

fn transform_scripts(
  rewriter: &ScriptRewriter<'_>,
  compilation: &Compilation,
  targets: &[TransformTarget],
  diagnostics: &dyn Diagnostics,
) -> Vec<AssetUpdate> {
  let mut updates = Vec::new();
  for TransformTarget { asset_name: name } in targets {
    let Some(original) = compilation.asset(name) else {
      continue;
    };
    diagnostics.emit(Diagnostic::info(format!("transforming js asset {name} ...")));
    let outcome = rewriter.rewrite(&original.content(), diagnostics);
    if outcome.rewritten > 0 {
      let source = AssetSource::SourceMapped {
        text: outcome.text,
        map: original.source_map().map(str::to_string),
      };
      updates.push((name.clone(), source, outcome.rewritten));
    }
  }
  updates
}

fn commit(compilation: &mut Compilation, updates: Vec<AssetUpdate>, report: &mut BuildReport) {
  for (name, source, count) in updates {
    compilation.update_asset(&name, source);
    report.rewritten_declarations += count;
    report.rewritten_assets.push(name);
  }
}

/// Image modules of the build with the sprite placement of the asset each one emitted.
fn image_modules(
  compilation: &Compilation,
  selection: &ImageSelection,
  coordinates: &CoordinateMap,
  require_function: &str,
  diagnostics: &dyn Diagnostics,
) -> Vec<ImageModule> {
  compilation
    .modules()
    .iter()
    .filter(|module| selection.is_image(&module.request))
    .filter_map(|module| {
      let marker = match ModuleMarker::new(require_function, &module.id) {
        Ok(marker) => marker,
        Err(err) => {
          diagnostics.emit(Diagnostic::new(
            Severity::Error,
            DiagnosticKind::ParseFailed,
            format!("invalid module marker for '{}': {err}", module.request),
          ));
          return None;
        }
      };
      let rect = module
        .assets
        .first()
        .map(|asset| compilation.output_dir().join(asset.trim_start_matches('/')))
        .and_then(|local| coordinates.get(&local).copied());

      Some(ImageModule {
        marker,
        request: module.request.clone(),
        rect,
      })
    })
    .collect()
}

/// Script assets of chunks whose hash changed since the previous run.
///
/// Every chunk hash is recorded, so a chunk is processed again only after its content
/// changes.
fn transform_targets(
  compilation: &Compilation,
  chunk_hashes: &mut BTreeMap<String, String>,
) -> Vec<TransformTarget> {
  let mut changed_files = BTreeSet::new();
  for chunk in compilation.chunks() {
    let previous = chunk_hashes.insert(chunk.name.clone(), chunk.hash.clone());
    if previous.as_deref() != Some(chunk.hash.as_str()) {
      changed_files.extend(chunk.files.iter().map(String::as_str));
    }
  }

  compilation
    .assets()
    .map(|(name, _)| name)
    .filter(|name| is_script(name))
    .filter(|name| {
      let base = Path::new(name)
        .file_name()
        .and_then(|base| base.to_str())
        .unwrap_or(*name);
      changed_files.contains(*name) || changed_files.contains(base)
    })
    .map(|name| TransformTarget {
      asset_name: name.to_string(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::compilation::ChunkRecord;

  #[test]
  fn chunks_are_processed_again_only_after_their_hash_changes() {
    let mut compilation = Compilation::new("/out", "/");
    compilation.insert_asset("js/main.js", AssetSource::text("main"));
    compilation.insert_asset("js/main.0a1b.hot-update.js", AssetSource::text("hot"));
    compilation.insert_asset("js/vendor.js", AssetSource::text("vendor"));
    compilation.add_chunk(ChunkRecord {
      name: "main".into(),
      hash: "aaa".into(),
      files: vec!["main.js".into(), "main.0a1b.hot-update.js".into()],
    });

    let mut hashes = BTreeMap::new();
    let names = |targets: Vec<TransformTarget>| -> Vec<String> {
      targets.into_iter().map(|target| target.asset_name).collect()
    };
    assert_eq!(names(transform_targets(&compilation, &mut hashes)), vec!["js/main.js"]);
    assert!(transform_targets(&compilation, &mut hashes).is_empty());

    let mut next = Compilation::new("/out", "/");
    next.insert_asset("js/main.js", AssetSource::text("main"));
    next.add_chunk(ChunkRecord {
      name: "main".into(),
      hash: "bbb".into(),
      files: vec!["main.js".into()],
    });
    assert_eq!(names(transform_targets(&next, &mut hashes)), vec!["js/main.js"]);
  }

  #[test]
  fn disabled_logging_uses_a_silent_sink() {
    let config = SpriteConfig {
      log: false,
      ..SpriteConfig::default()
    };
    let mut plugin = SpritePlugin::new(config);
    let mut compilation = Compilation::new("/out", "/");

    let report = plugin.run(&mut compilation);
    assert_eq!(report, BuildReport::empty(CollectionMode::Extracted));
    assert!(plugin.sprite().is_none());
    assert!(plugin.coordinates().is_empty());
    assert!(!plugin.config().log);
  }
}
