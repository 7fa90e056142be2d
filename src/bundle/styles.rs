//! Rewrite extracted stylesheet assets and serialize them back into the compilation.

use std::path::Path;

use crate::asset_paths::{resolve_image_url, should_ignore_image_reference};
use crate::collect::ParsedStylesheet;
use crate::compilation::AssetSource;
use crate::declarations::{BackgroundDeclaration, locate_backgrounds};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::models::{CoordinateMap, Rect};
use crate::rewrite::{RewriteOptions, rewrite_rule};
use crate::stylesheet::{StringifyOptions, Stylesheet};

/// Rewrites background declarations of extracted stylesheets.
#[derive(Debug, Clone, Copy)]
pub struct StyleRewriter<'a> {
  /// Placement of every packed image.
  pub coordinates: &'a CoordinateMap,
  /// Public URL prefix of emitted assets.
  pub public_path: &'a str,
  /// Directory the build writes its output to.
  pub output_dir: &'a Path,
  /// Sprite reference for rewritten declarations.
  pub rewrite: RewriteOptions<'a>,
  /// Serializer settings.
  pub stringify: StringifyOptions<'a>,
}

impl StyleRewriter<'_> {
  /// Rewrite every eligible background of `sheet`, returning how many were rewritten.
  ///
  /// Precondition violations are not reported here; they were reported when the images
  /// were collected.
  pub fn rewrite_sheet(&self, sheet: &mut Stylesheet, diagnostics: &dyn Diagnostics) -> usize {
    let mut rewritten = 0;

    sheet.for_each_rule_mut(|rule| {
      let found = locate_backgrounds(rule);
      let mut targets: Vec<(&BackgroundDeclaration, Rect)> = Vec::new();

      for background in found.iter().filter(|background| background.is_eligible()) {
        let Some(url) = background.url.as_deref() else {
          continue;
        };
        if should_ignore_image_reference(url) {
          continue;
        }

        let resolved = resolve_image_url(url, self.public_path, self.output_dir);
        match self.coordinates.get(&resolved.local) {
          Some(rect) => targets.push((background, *rect)),
          None => diagnostics.emit(Diagnostic::unknown_resource(&resolved.url)),
        }
      }

      if targets.is_empty() {
        return;
      }
      for rewrite in rewrite_rule(rule, &targets, &self.rewrite) {
        rewrite.report(diagnostics);
      }
      rewritten += targets.len();
    });

    rewritten
  }

  /// Rewrite a parsed stylesheet asset and build its replacement source.
  ///
  /// Returns `None` when no declaration changed. The replacement keeps the source map of
  /// the asset it replaces; each child of a concatenated asset keeps its own.
  pub fn rewrite_asset(
    &self,
    original: &AssetSource,
    parsed: ParsedStylesheet,
    diagnostics: &dyn Diagnostics,
  ) -> Option<(AssetSource, usize)> {
    match (original, parsed) {
      (AssetSource::Concatenated(children), ParsedStylesheet::Concatenated(sheets)) => {
        let mut total = 0;
        let replaced = children
          .iter()
          .zip(sheets)
          .map(|(child, sheet)| {
            let Some(mut sheet) = sheet else {
              return child.clone();
            };
            match self.rewrite_sheet(&mut sheet, diagnostics) {
              0 => child.clone(),
              count => {
                total += count;
                self.source_for(&sheet, child)
              }
            }
          })
          .collect();
        (total > 0).then(|| (AssetSource::Concatenated(replaced), total))
      }
      (_, ParsedStylesheet::Single(mut sheet)) => match self.rewrite_sheet(&mut sheet, diagnostics) {
        0 => None,
        count => Some((self.source_for(&sheet, original), count)),
      },
      (_, ParsedStylesheet::Concatenated(_)) => None,
    }
  }

  /// Serialized stylesheet text. Expanded output ends with a newline.
  pub fn serialize(&self, sheet: &Stylesheet) -> String {
    let mut css = sheet.to_css(&self.stringify);
    if !self.stringify.compress {
      css.push('\n');
    }
    css
  }

  fn source_for(&self, sheet: &Stylesheet, previous: &AssetSource) -> AssetSource {
    AssetSource::SourceMapped {
      text: self.serialize(sheet),
      map: previous.source_map().map(str::to_string),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::diagnostics::{DiagnosticKind, RecordingDiagnostics};
  use std::path::PathBuf;

  fn coordinates() -> CoordinateMap {
    [
      (PathBuf::from("/out/img/x.png"), Rect::new(10, 0, 5, 5)),
      (PathBuf::from("/out/img/y.png"), Rect::new(0, 20, 5, 5)),
    ]
    .into_iter()
    .collect()
  }

  fn rewriter<'a>(coordinates: &'a CoordinateMap, stringify: StringifyOptions<'a>) -> StyleRewriter<'a> {
    StyleRewriter {
      coordinates,
      public_path: "/assets/",
      output_dir: Path::new("/out"),
      rewrite: RewriteOptions {
        sprite_url: "/assets/s.png",
        comment_origin: false,
      },
      stringify,
    }
  }

  #[test]
  fn rewrites_nested_rules_and_warns_on_unknown_images() {
    let coordinates = coordinates();
    let rewriter = rewriter(&coordinates, StringifyOptions::default());
    let mut sheet = Stylesheet::parse(
      ".a{background:url(/assets/img/x.png) no-repeat 0 0}\n\
       @media print{.b{background-image:url(/assets/img/y.png);background-repeat:no-repeat;background-position:0 0}}\n\
       .c{background:url(/assets/img/z.png) no-repeat 0 0}",
    )
    .unwrap();
    let recorder = RecordingDiagnostics::new();

    assert_eq!(rewriter.rewrite_sheet(&mut sheet, &recorder), 2);
    let css = rewriter.serialize(&sheet);
    assert!(css.contains("background: url(/assets/s.png) no-repeat -10px 0;"));
    assert!(css.contains("background-position: 0 -20px;"));
    assert!(css.contains("background: url(/assets/img/z.png) no-repeat 0 0;"));
    assert!(css.ends_with("}\n"));

    let unknown = recorder.of_kind(DiagnosticKind::UnknownResource);
    assert_eq!(unknown.len(), 1);
    assert!(unknown[0].message.contains("/assets/img/z.png"));
    assert!(recorder.of_kind(DiagnosticKind::RepeatStyle).is_empty());
  }

  #[test]
  fn keeps_source_maps_and_untouched_children() {
    let coordinates = coordinates();
    let rewriter = rewriter(&coordinates, StringifyOptions {
      indent: "  ",
      compress: true,
    });
    let first = AssetSource::SourceMapped {
      text: ".a{background:url(/assets/img/x.png) no-repeat 0 0}".into(),
      map: Some("{\"version\":3}".into()),
    };
    let second = AssetSource::text(".b{color:red}");
    let original = AssetSource::Concatenated(vec![first.clone(), second.clone()]);
    let parsed = ParsedStylesheet::Concatenated(vec![
      Some(Stylesheet::parse(&first.content()).unwrap()),
      Some(Stylesheet::parse(&second.content()).unwrap()),
    ]);

    let (replaced, count) = rewriter
      .rewrite_asset(&original, parsed, &RecordingDiagnostics::new())
      .unwrap();
    assert_eq!(count, 1);
    let AssetSource::Concatenated(children) = replaced else {
      panic!("expected a concatenated asset");
    };
    assert_eq!(children[0], AssetSource::SourceMapped {
      text: ".a{background:url(/assets/s.png) no-repeat -10px 0;}".into(),
      map: Some("{\"version\":3}".into()),
    });
    assert_eq!(children[1], second);
  }

  #[test]
  fn unchanged_assets_are_not_replaced() {
    let coordinates = coordinates();
    let rewriter = rewriter(&coordinates, StringifyOptions::default());
    let original = AssetSource::text(".a{color:red}");
    let parsed = ParsedStylesheet::Single(Stylesheet::parse(".a{color:red}").unwrap());
    assert!(
      rewriter
        .rewrite_asset(&original, parsed, &RecordingDiagnostics::new())
        .is_none()
    );
  }
}
