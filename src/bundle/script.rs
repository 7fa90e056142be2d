//! Rewrite stylesheet text embedded in bundled script chunks.
//!
//! Work happens in two stages. [`extract_fragments`] finds the declaration blocks that
//! reference an image module and returns their clean CSS with the byte range they occupy
//! in the script. Each fragment is then rewritten as a standalone rule and written back
//! through a [`SpliceList`], which leaves every other byte of the chunk untouched.

use std::ops::Range;

use regex::Regex;
use thiserror::Error;

use crate::declarations::{BackgroundForm, locate_backgrounds};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
use crate::models::Rect;
use crate::rewrite::{RewriteOptions, rewrite_rule};
use crate::stylesheet::{Node, StringifyOptions, Stylesheet, StylesheetError};

/// Selector wrapped around a fragment so it parses as a complete rule.
const FRAGMENT_SELECTOR: &str = ".__sprite_fragment__";

/// Escaped line ending written back into script string literals.
const ESCAPED_LINE_ENDING: &str = if cfg!(windows) { "\\r\\n" } else { "\\n" };

/// Matches the runtime call that resolves one module inside a bundled chunk.
#[derive(Debug, Clone)]
pub struct ModuleMarker {
  pattern: Regex,
}

impl ModuleMarker {
  /// Marker for `require_function(<module_id>)`.
  ///
  /// The id may be quoted and preceded by an inline comment. It must be the whole argument,
  /// so module `1` never matches a call for module `21` or `12`.
  pub fn new(require_function: &str, module_id: &str) -> Result<Self, regex::Error> {
    let pattern = format!(
      r#"{}\(\s*(?:/\*.*?\*/\s*)?["']?{}["']?\s*\)"#,
      regex::escape(require_function),
      regex::escape(module_id),
    );
    Ok(Self {
      pattern: Regex::new(&pattern)?,
    })
  }

  fn find_at(&self, source: &str, from: usize) -> Option<Range<usize>> {
    self.pattern.find_at(source, from).map(|found| found.range())
  }
}

/// Declaration block of a script chunk that references an image module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFragment {
  /// Bytes of the chunk from the opening `{` through the closing `}`.
  pub range: Range<usize>,
  /// Text between the braces with escaped line breaks decoded.
  pub css: String,
}

/// Find every block enclosing a marker occurrence, scanning forward from the end of the
/// previous block.
pub fn extract_fragments(source: &str, marker: &ModuleMarker) -> Vec<ScriptFragment> {
  let mut fragments = Vec::new();
  let mut from = 0;

  while from < source.len() {
    let Some(found) = marker.find_at(source, from) else {
      break;
    };
    let Some(start) = source[..found.start].rfind('{') else {
      from = found.end;
      continue;
    };
    let Some(end) = source[found.end..].find('}').map(|offset| found.end + offset) else {
      break;
    };

    fragments.push(ScriptFragment {
      range: start..end + 1,
      css: decode_line_breaks(&source[start + 1..end]),
    });
    from = end + 1;
  }

  fragments
}

fn decode_line_breaks(text: &str) -> String {
  text
    .replace("\\r\\n", "\n")
    .replace("\\n", "\n")
    .replace("\\r", "\n")
}

/// Escape line breaks so the text can sit inside a script string literal.
pub fn encode_fragment(css: &str) -> String {
  css.replace("\r\n", "\n").replace('\n', ESCAPED_LINE_ENDING)
}

/// Errors raised while collecting script replacements.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpliceError {
  /// Two replacements cover some of the same bytes.
  #[error("replacement {start}..{end} overlaps replacement {other_start}..{other_end}")]
  Overlap {
    /// Start of the rejected range.
    start: usize,
    /// End of the rejected range.
    end: usize,
    /// Start of the range already queued.
    other_start: usize,
    /// End of the range already queued.
    other_end: usize,
  },
  /// The range does not address a valid slice of the source.
  #[error("replacement {start}..{end} is outside the source")]
  OutOfBounds {
    /// Start of the rejected range.
    start: usize,
    /// End of the rejected range.
    end: usize,
  },
}

/// Non-overlapping byte range replacements over one source text.
#[derive(Debug, Clone)]
pub struct SpliceList<'a> {
  source: &'a str,
  splices: Vec<(Range<usize>, String)>,
}

impl<'a> SpliceList<'a> {
  /// Start an empty list over `source`.
  pub fn new(source: &'a str) -> Self {
    Self {
      source,
      splices: Vec::new(),
    }
  }

  /// Queue a replacement, rejecting ranges that overlap one already queued.
  pub fn push(&mut self, range: Range<usize>, replacement: String) -> Result<(), SpliceError> {
    if range.start > range.end || self.source.get(range.clone()).is_none() {
      return Err(SpliceError::OutOfBounds {
        start: range.start,
        end: range.end,
      });
    }

    let overlapping = self
      .splices
      .iter()
      .find(|(other, _)| range.start < other.end && other.start < range.end);
    if let Some((other, _)) = overlapping {
      return Err(SpliceError::Overlap {
        start: range.start,
        end: range.end,
        other_start: other.start,
        other_end: other.end,
      });
    }

    let index = self
      .splices
      .partition_point(|(other, _)| other.start <= range.start);
    self.splices.insert(index, (range, replacement));
    Ok(())
  }

  /// Number of queued replacements.
  pub fn len(&self) -> usize {
    self.splices.len()
  }

  /// Returns true when nothing is queued.
  pub fn is_empty(&self) -> bool {
    self.splices.is_empty()
  }

  /// Source text with every queued replacement applied.
  pub fn apply(&self) -> String {
    let mut out = String::with_capacity(self.source.len());
    let mut cursor = 0;
    for (range, replacement) in &self.splices {
      out.push_str(&self.source[cursor..range.start]);
      out.push_str(replacement);
      cursor = range.end;
    }
    out.push_str(&self.source[cursor..]);
    out
  }
}

/// Image module referenced from script chunks.
#[derive(Debug, Clone)]
pub struct ImageModule {
  /// Marker locating the module's runtime calls.
  pub marker: ModuleMarker,
  /// Raw request used to name the module in diagnostics.
  pub request: String,
  /// Placement of the module's image in the sprite, if it was packed.
  pub rect: Option<Rect>,
}

/// Rewrites embedded stylesheet fragments of script chunks.
#[derive(Debug, Clone, Copy)]
pub struct ScriptRewriter<'a> {
  /// Image modules of the build.
  pub modules: &'a [ImageModule],
  /// Sprite reference for rewritten declarations.
  pub rewrite: RewriteOptions<'a>,
  /// Serializer settings for rewritten fragments.
  pub stringify: StringifyOptions<'a>,
}

/// Result of rewriting one script chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutcome {
  /// Chunk text after every accepted replacement.
  pub text: String,
  /// Number of fragments replaced.
  pub rewritten: usize,
}

impl ScriptRewriter<'_> {
  /// Rewrite every fragment of `source` that references a packed image module.
  pub fn rewrite(&self, source: &str, diagnostics: &dyn Diagnostics) -> ScriptOutcome {
    let mut splices = SpliceList::new(source);

    for module in self.modules {
      for fragment in extract_fragments(source, &module.marker) {
        let replacement = match self.rewrite_fragment(&fragment, module, diagnostics) {
          Ok(Some(replacement)) => replacement,
          Ok(None) => continue,
          Err(err) => {
            diagnostics.emit(Diagnostic::new(
              Severity::Error,
              DiagnosticKind::ParseFailed,
              format!("failed to parse stylesheet fragment for '{}': {err}", module.request),
            ));
            continue;
          }
        };

        if let Err(err) = splices.push(fragment.range.clone(), replacement) {
          diagnostics.emit(Diagnostic::new(
            Severity::Warning,
            DiagnosticKind::OverlappingSplice,
            format!("'{}' skipped: {err}", module.request),
          ));
        }
      }
    }

    ScriptOutcome {
      rewritten: splices.len(),
      text: splices.apply(),
    }
  }

  /// Rewrite one fragment as a standalone rule.
  ///
  /// Returns `Ok(None)` when the fragment holds no eligible background or the module's
  /// image is not part of the sprite. A shorthand background takes precedence over a
  /// longhand one in the same block.
  pub fn rewrite_fragment(
    &self,
    fragment: &ScriptFragment,
    module: &ImageModule,
    diagnostics: &dyn Diagnostics,
  ) -> Result<Option<String>, StylesheetError> {
    let mut sheet = Stylesheet::parse(&format!("{FRAGMENT_SELECTOR}{{{}}}", fragment.css))?;
    let Some(Node::Rule(rule)) = sheet.nodes.first_mut() else {
      return Ok(None);
    };

    let backgrounds = locate_backgrounds(rule);
    let chosen = backgrounds
      .iter()
      .find(|background| background.form == BackgroundForm::Shorthand)
      .or_else(|| backgrounds.first());
    let Some(background) = chosen else {
      return Ok(None);
    };

    background.report_as(diagnostics, &module.request);
    if !background.is_eligible() {
      return Ok(None);
    }
    let Some(rect) = module.rect else {
      diagnostics.emit(Diagnostic::unknown_resource(&module.request));
      return Ok(None);
    };

    for rewrite in rewrite_rule(rule, &[(background, rect)], &self.rewrite) {
      rewrite.report(diagnostics);
    }

    let css = sheet.to_css(&self.stringify);
    let block = css
      .strip_prefix(FRAGMENT_SELECTOR)
      .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
      .unwrap_or(&css);
    Ok(Some(encode_fragment(block)))
  }
}
