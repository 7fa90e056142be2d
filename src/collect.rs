//! Gather the images that go into the sprite.
//!
//! Two discovery modes exist. When script modules import images directly, stylesheet text
//! lives inside script chunks and every emitted image is packed. Otherwise stylesheets were
//! extracted into `.css` assets and only images referenced by eligible backgrounds are
//! packed. Extracted stylesheets are parsed once here and handed to the rewrite phase.

use std::collections::BTreeMap;

use crate::asset_paths::{resolve_image_url, should_ignore_image_reference};
use crate::compilation::{AssetSource, Compilation};
use crate::declarations::locate_backgrounds;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
use crate::models::{CollectionMode, ImageAsset};
use crate::selection::{AssetInclusion, ImageSelection, is_stylesheet};
use crate::stylesheet::Stylesheet;

/// Parsed form of one extracted stylesheet asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedStylesheet {
  /// Plain or source-mapped asset.
  Single(Stylesheet),
  /// One entry per child of a concatenated asset; children that failed to parse are `None`.
  Concatenated(Vec<Option<Stylesheet>>),
}

impl ParsedStylesheet {
  /// Every successfully parsed stylesheet of the asset.
  pub fn sheets(&self) -> Vec<&Stylesheet> {
    match self {
      Self::Single(sheet) => vec![sheet],
      Self::Concatenated(children) => children.iter().flatten().collect(),
    }
  }
}

/// Result of image discovery for one build.
#[derive(Debug, Clone)]
pub struct CollectedImages {
  /// Discovery mode that was used.
  pub mode: CollectionMode,
  /// Images to pack, unique by resolved path, in path order.
  pub images: Vec<ImageAsset>,
  /// Extracted stylesheets keyed by asset name. Empty in inline mode.
  pub stylesheets: BTreeMap<String, ParsedStylesheet>,
}

/// Inline mode is used as soon as any module request names an allowed image.
pub fn detect_mode(compilation: &Compilation, selection: &ImageSelection) -> CollectionMode {
  let imports_images = compilation
    .modules()
    .iter()
    .any(|module| selection.is_image(&module.request));
  if imports_images {
    CollectionMode::Inline
  } else {
    CollectionMode::Extracted
  }
}

/// Discover the sprite sources of the build.
///
/// Precondition violations found in extracted stylesheets are reported here, once per
/// build; the rewrite phase reuses the parsed stylesheets without reporting again.
pub fn collect_images(
  compilation: &Compilation,
  selection: &ImageSelection,
  diagnostics: &dyn Diagnostics,
) -> CollectedImages {
  match detect_mode(compilation, selection) {
    CollectionMode::Inline => CollectedImages {
      mode: CollectionMode::Inline,
      images: inline_images(compilation, selection),
      stylesheets: BTreeMap::new(),
    },
    CollectionMode::Extracted => {
      let stylesheets = parse_stylesheets(compilation, diagnostics);
      let images = referenced_images(compilation, selection, &stylesheets, diagnostics);
      CollectedImages {
        mode: CollectionMode::Extracted,
        images,
        stylesheets,
      }
    }
  }
}

fn inline_images(compilation: &Compilation, selection: &ImageSelection) -> Vec<ImageAsset> {
  compilation
    .assets()
    .filter(|(name, _)| selection.is_included(name))
    .map(|(name, source)| {
      ImageAsset::new(compilation.output_dir().join(name), source.bytes().into_owned())
    })
    .collect()
}

/// Parse every extracted stylesheet; unparsable ones are reported and left out.
pub fn parse_stylesheets(
  compilation: &Compilation,
  diagnostics: &dyn Diagnostics,
) -> BTreeMap<String, ParsedStylesheet> {
  let mut parsed = BTreeMap::new();

  for (name, source) in compilation.assets().filter(|(name, _)| is_stylesheet(name)) {
    let entry = match source {
      AssetSource::Concatenated(children) => ParsedStylesheet::Concatenated(
        children
          .iter()
          .enumerate()
          .map(|(index, child)| {
            parse_reported(&child.content(), &format!("{name} (part {index})"), diagnostics)
          })
          .collect(),
      ),
      _ => match parse_reported(&source.content(), name, diagnostics) {
        Some(sheet) => ParsedStylesheet::Single(sheet),
        None => continue,
      },
    };
    parsed.insert(name.to_string(), entry);
  }

  parsed
}

fn parse_reported(text: &str, label: &str, diagnostics: &dyn Diagnostics) -> Option<Stylesheet> {
  match Stylesheet::parse(text) {
    Ok(sheet) => Some(sheet),
    Err(err) => {
      diagnostics.emit(Diagnostic::new(
        Severity::Error,
        DiagnosticKind::ParseFailed,
        format!("failed to parse {label}: {err}"),
      ));
      None
    }
  }
}

fn referenced_images(
  compilation: &Compilation,
  selection: &ImageSelection,
  stylesheets: &BTreeMap<String, ParsedStylesheet>,
  diagnostics: &dyn Diagnostics,
) -> Vec<ImageAsset> {
  let mut union = BTreeMap::new();

  let sheets = stylesheets.values().flat_map(ParsedStylesheet::sheets);
  for rule in sheets.flat_map(Stylesheet::rules) {
    for background in locate_backgrounds(rule) {
      background.report(diagnostics);
      if !background.is_eligible() {
        continue;
      }
      let Some(url) = background.url.as_deref() else {
        continue;
      };
      if should_ignore_image_reference(url) {
        continue;
      }

      let resolved = resolve_image_url(url, compilation.public_path(), compilation.output_dir());
      if !selection.is_included(&resolved.asset_name) || union.contains_key(&resolved.local) {
        continue;
      }
      if let Some(source) = compilation.asset(&resolved.asset_name) {
        let image = ImageAsset::new(resolved.local.clone(), source.bytes().into_owned());
        union.insert(resolved.local, image);
      }
    }
  }

  union.into_values().collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::compilation::ModuleRecord;
  use crate::diagnostics::RecordingDiagnostics;
  use std::path::Path;

  fn selection() -> ImageSelection {
    ImageSelection::from_extensions(vec!["png".into()])
  }

  fn compilation() -> Compilation {
    let mut compilation = Compilation::new("/out", "/assets/");
    compilation.insert_asset("img/x.png", AssetSource::Plain(vec![1]));
    compilation.insert_asset("img/y.png", AssetSource::Plain(vec![2]));
    compilation.insert_asset("img/unused.png", AssetSource::Plain(vec![3]));
    compilation
  }

  #[test]
  fn image_requests_switch_to_inline_mode() {
    let mut compilation = compilation();
    assert_eq!(detect_mode(&compilation, &selection()), CollectionMode::Extracted);

    compilation.add_module(ModuleRecord {
      id: "4".into(),
      request: "./img/x.png".into(),
      assets: vec!["img/x.png".into()],
    });
    assert_eq!(detect_mode(&compilation, &selection()), CollectionMode::Inline);

    let collected = collect_images(&compilation, &selection(), &RecordingDiagnostics::new());
    assert_eq!(collected.images.len(), 3);
    assert!(collected.stylesheets.is_empty());
  }

  #[test]
  fn extracted_mode_keeps_only_eligible_references() {
    let mut compilation = compilation();
    compilation.insert_asset(
      "css/main.css",
      AssetSource::text(
        ".a{background:url(/assets/img/x.png) no-repeat 0 0}\n\
         .b{background:url(/assets/img/y.png) repeat 0 0}\n\
         .c{background:url(https://cdn.example.com/z.png) no-repeat 0 0}\n\
         .d{background:url(/assets/img/missing.png) no-repeat 0 0}",
      ),
    );
    compilation.insert_asset(
      "css/other.css",
      AssetSource::Concatenated(vec![
        AssetSource::text(".e{background:url('/assets/img/x.png') no-repeat 0 0}"),
        AssetSource::text("}"),
      ]),
    );

    let recorder = RecordingDiagnostics::new();
    let collected = collect_images(&compilation, &selection(), &recorder);

    assert_eq!(collected.mode, CollectionMode::Extracted);
    let paths: Vec<&Path> = collected.images.iter().map(|image| image.path.as_path()).collect();
    assert_eq!(paths, vec![Path::new("/out/img/x.png")]);
    assert_eq!(collected.images[0].bytes, vec![1]);

    assert_eq!(recorder.of_kind(DiagnosticKind::RepeatStyle).len(), 1);
    assert_eq!(recorder.of_kind(DiagnosticKind::ParseFailed).len(), 1);
    assert!(matches!(
      collected.stylesheets.get("css/other.css"),
      Some(ParsedStylesheet::Concatenated(children)) if children.len() == 2 && children[1].is_none()
    ));
  }

  #[test]
  fn stylesheets_without_backgrounds_collect_nothing() {
    let mut compilation = compilation();
    compilation.insert_asset("main.css", AssetSource::text(".a{color:red}"));
    let collected = collect_images(&compilation, &selection(), &RecordingDiagnostics::new());
    assert!(collected.images.is_empty());
    assert_eq!(collected.stylesheets.len(), 1);
  }
}
