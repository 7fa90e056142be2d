//! Locate background declarations that reference images and check they can use the sprite.
//!
//! A background only addresses a single sprite cell when it does not repeat and starts at
//! the top-left corner, so both the shorthand and longhand forms must spell out
//! `no-repeat` and `0 0`. Locating is pure; callers decide when violations are reported.

use crate::asset_paths::extract_url;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::stylesheet::Rule;

/// How the background image is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundForm {
  /// `background: url(...) no-repeat 0 0`.
  Shorthand,
  /// `background-image` with sibling `background-repeat` and `background-position`.
  Longhand,
}

/// Outcome of the precondition checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
  /// The declaration can be rewritten.
  Eligible,
  /// The repeat-style is not `no-repeat`.
  RepeatStyle,
  /// The position is not `0 0`.
  Position,
}

/// Background declaration referencing an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundDeclaration {
  /// Index of the declaration in the rule's items.
  pub index: usize,
  /// Shorthand or longhand form.
  pub form: BackgroundForm,
  /// Declaration value as written.
  pub value: String,
  /// First `url(...)` reference of the value.
  pub url: Option<String>,
  /// Result of the precondition checks.
  pub verdict: Verdict,
}

impl BackgroundDeclaration {
  /// Whether the declaration passed every precondition.
  pub fn is_eligible(&self) -> bool {
    self.verdict == Verdict::Eligible
  }

  /// Report the verdict, naming the declaration by its value or URL.
  pub fn report(&self, diagnostics: &dyn Diagnostics) {
    let subject: &str = match self.verdict {
      Verdict::Eligible => self.url.as_deref().unwrap_or(&self.value),
      _ => &self.value,
    };
    self.report_as(diagnostics, subject);
  }

  /// Report the verdict, naming the declaration by `subject`.
  ///
  /// Violations are reported as errors. Eligible longhand declarations get a style hint
  /// recommending the shorthand form.
  pub fn report_as(&self, diagnostics: &dyn Diagnostics, subject: &str) {
    let shorthand = self.form == BackgroundForm::Shorthand;
    match self.verdict {
      Verdict::RepeatStyle => diagnostics.emit(Diagnostic::repeat_style(subject, shorthand)),
      Verdict::Position => diagnostics.emit(Diagnostic::position(subject, shorthand)),
      Verdict::Eligible if !shorthand => diagnostics.emit(Diagnostic::prefer_shorthand(subject)),
      Verdict::Eligible => {}
    }
  }
}

/// Find every background declaration of `rule` that references an image.
pub fn locate_backgrounds(rule: &Rule) -> Vec<BackgroundDeclaration> {
  rule
    .declarations()
    .filter(|(_, declaration)| declaration.value.contains("url("))
    .filter_map(|(index, declaration)| {
      let (form, verdict) = if declaration.is("background") {
        (BackgroundForm::Shorthand, shorthand_verdict(&declaration.value))
      } else if declaration.is("background-image") {
        (BackgroundForm::Longhand, longhand_verdict(rule))
      } else {
        return None;
      };

      Some(BackgroundDeclaration {
        index,
        form,
        value: declaration.value.clone(),
        url: extract_url(&declaration.value),
        verdict,
      })
    })
    .collect()
}

fn shorthand_verdict(value: &str) -> Verdict {
  if !value.contains("no-repeat") {
    Verdict::RepeatStyle
  } else if !value.contains(" 0 0") {
    Verdict::Position
  } else {
    Verdict::Eligible
  }
}

fn longhand_verdict(rule: &Rule) -> Verdict {
  if !rule.has_declaration("background-repeat", "no-repeat") {
    Verdict::RepeatStyle
  } else if !rule.has_declaration("background-position", "0 0") {
    Verdict::Position
  } else {
    Verdict::Eligible
  }
}
