//! Diagnostic sinks injected into every component that reports build progress or problems.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
  /// Progress information.
  Info,
  /// A rewrite or emission completed.
  Success,
  /// Something was skipped but the build continues.
  Warning,
  /// A step failed and its output was not produced.
  Error,
}

/// What a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
  /// General progress reporting.
  Progress,
  /// A declaration was rewritten.
  Transformed,
  /// The repeat-style of a background was not `no-repeat`.
  RepeatStyle,
  /// The position of a background was not `0 0`.
  Position,
  /// A longhand background could have used the shorthand form.
  PreferShorthand,
  /// A referenced image is not part of the sprite.
  UnknownResource,
  /// No image qualified for the sprite.
  NoImages,
  /// The packer failed.
  PackFailed,
  /// A stylesheet or fragment could not be parsed.
  ParseFailed,
  /// Two script replacements touched the same bytes.
  OverlappingSplice,
  /// The sprite could not be written.
  EmitFailed,
}

/// A single message reported while processing a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
  /// Severity of the message.
  pub severity: Severity,
  /// Category of the message.
  pub kind: DiagnosticKind,
  /// Human readable text.
  pub message: String,
}

impl Diagnostic {
  /// Build a diagnostic from its parts.
  pub fn new(severity: Severity, kind: DiagnosticKind, message: impl Into<String>) -> Self {
    Self {
      severity,
      kind,
      message: message.into(),
    }
  }

  /// Progress information.
  pub fn info(message: impl Into<String>) -> Self {
    Self::new(Severity::Info, DiagnosticKind::Progress, message)
  }

  /// Report a `before → after` rewrite.
  pub fn transformed(before: &str, after: &str) -> Self {
    Self::new(
      Severity::Success,
      DiagnosticKind::Transformed,
      format!("{before} -> {after}"),
    )
  }

  /// A background whose repeat-style is not `no-repeat`.
  pub fn repeat_style(subject: &str, shorthand: bool) -> Self {
    let what = if shorthand {
      "<repeat-style>"
    } else {
      "'background-repeat'"
    };
    Self::new(
      Severity::Error,
      DiagnosticKind::RepeatStyle,
      format!("'{subject}' skipped. Please use {what} as 'no-repeat'"),
    )
  }

  /// A background whose position is not `0 0`.
  pub fn position(subject: &str, shorthand: bool) -> Self {
    let what = if shorthand {
      "<position>"
    } else {
      "'background-position'"
    };
    Self::new(
      Severity::Error,
      DiagnosticKind::Position,
      format!("'{subject}' skipped. Please use {what} as '0 0'"),
    )
  }

  /// A valid longhand background that could be written as a shorthand.
  pub fn prefer_shorthand(url: &str) -> Self {
    Self::new(
      Severity::Warning,
      DiagnosticKind::PreferShorthand,
      format!("Shorthand properties preferred : background-image: url('{url}')"),
    )
  }

  /// A reference whose image is missing from the sprite coordinates.
  pub fn unknown_resource(url: &str) -> Self {
    Self::new(
      Severity::Warning,
      DiagnosticKind::UnknownResource,
      format!("'{url}' is not supported yet."),
    )
  }
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.message)
  }
}

/// Destination for diagnostics produced during a build.
pub trait Diagnostics {
  /// Record a diagnostic.
  fn emit(&self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
  fn emit(&self, diagnostic: Diagnostic) {
    let kind = format!("{:?}", diagnostic.kind);
    match diagnostic.severity {
      Severity::Info | Severity::Success => {
        tracing::info!(kind = %kind, "{}", diagnostic.message)
      }
      Severity::Warning => tracing::warn!(kind = %kind, "{}", diagnostic.message),
      Severity::Error => tracing::error!(kind = %kind, "{}", diagnostic.message),
    }
  }
}

/// Discards every diagnostic; used when logging is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDiagnostics;

impl Diagnostics for NoopDiagnostics {
  fn emit(&self, _diagnostic: Diagnostic) {}
}

/// Keeps diagnostics in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct RecordingDiagnostics {
  records: Rc<RefCell<Vec<Diagnostic>>>,
}

impl RecordingDiagnostics {
  /// Create an empty recorder.
  pub fn new() -> Self {
    Self::default()
  }

  /// Snapshot of every recorded diagnostic.
  pub fn records(&self) -> Vec<Diagnostic> {
    self.records.borrow().clone()
  }

  /// Recorded diagnostics of one kind.
  pub fn of_kind(&self, kind: DiagnosticKind) -> Vec<Diagnostic> {
    self
      .records
      .borrow()
      .iter()
      .filter(|diagnostic| diagnostic.kind == kind)
      .cloned()
      .collect()
  }

  /// Drop everything recorded so far.
  pub fn clear(&self) {
    self.records.borrow_mut().clear();
  }
}

impl Diagnostics for RecordingDiagnostics {
  fn emit(&self, diagnostic: Diagnostic) {
    self.records.borrow_mut().push(diagnostic);
  }
}
