//! Point validated background declarations at their cell of the sprite.

use crate::declarations::{BackgroundDeclaration, BackgroundForm};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::models::Rect;
use crate::stylesheet::{Rule, RuleItem};

/// Sprite reference written into rewritten declarations.
#[derive(Debug, Clone, Copy)]
pub struct RewriteOptions<'a> {
  /// Public URL of the sprite.
  pub sprite_url: &'a str,
  /// Keep the original declaration as a comment after each rewritten one.
  pub comment_origin: bool,
}

/// One declaration value replaced by the rewriter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
  /// Property whose value changed.
  pub property: String,
  /// Original value.
  pub before: String,
  /// New value.
  pub after: String,
}

impl Rewrite {
  /// Report the rewrite as a success diagnostic.
  pub fn report(&self, diagnostics: &dyn Diagnostics) {
    diagnostics.emit(Diagnostic::transformed(
      &format!("{}: {}", self.property, self.before),
      &format!("{}: {}", self.property, self.after),
    ));
  }
}

/// Negative background offset of a sprite cell; zero offsets are written as `0`.
pub fn format_offset(rect: &Rect) -> String {
  format!("{} {}", axis_offset(rect.x), axis_offset(rect.y))
}

fn axis_offset(value: u32) -> String {
  if value == 0 {
    "0".into()
  } else {
    format!("-{value}px")
  }
}

/// Rewrite eligible backgrounds of `rule` using their resolved sprite placement.
///
/// Values are replaced in place first; origin comments are inserted afterwards, from the
/// last declaration backwards, so the indices recorded by the locator stay valid.
pub fn rewrite_rule(
  rule: &mut Rule,
  backgrounds: &[(&BackgroundDeclaration, Rect)],
  options: &RewriteOptions<'_>,
) -> Vec<Rewrite> {
  let mut rewrites = Vec::new();
  let mut comments: Vec<(usize, String)> = Vec::new();

  for (background, rect) in backgrounds {
    let offset = format_offset(rect);
    match background.form {
      BackgroundForm::Shorthand => {
        let value = format!("url({}) no-repeat {offset}", options.sprite_url);
        if let Some(rewrite) = replace_value(rule, background.index, value) {
          comments.push((background.index, origin_comment(&rewrite)));
          rewrites.push(rewrite);
        }
      }
      BackgroundForm::Longhand => {
        let value = format!("url({})", options.sprite_url);
        if let Some(rewrite) = replace_value(rule, background.index, value) {
          comments.push((background.index, origin_comment(&rewrite)));
          rewrites.push(rewrite);
        }

        let position = rule.find("background-position").map(|(index, _)| index);
        if let Some(index) = position
          && let Some(rewrite) = replace_value(rule, index, offset)
        {
          comments.push((index, origin_comment(&rewrite)));
          rewrites.push(rewrite);
        }
      }
    }
  }

  if options.comment_origin {
    comments.sort_by(|a, b| b.0.cmp(&a.0));
    for (index, text) in comments {
      rule.items.insert(index + 1, RuleItem::Comment(text));
    }
  }

  rewrites
}

fn replace_value(rule: &mut Rule, index: usize, value: String) -> Option<Rewrite> {
  let declaration = rule.declaration_mut(index)?;
  let before = std::mem::replace(&mut declaration.value, value);
  Some(Rewrite {
    property: declaration.property.clone(),
    before,
    after: declaration.value.clone(),
  })
}

fn origin_comment(rewrite: &Rewrite) -> String {
  format!(" {}: {}; ", rewrite.property, rewrite.before)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::declarations::locate_backgrounds;
  use crate::stylesheet::{Declaration, Stylesheet};

  fn rewrite(css: &str, rect: Rect, comment_origin: bool) -> (Rule, Vec<Rewrite>) {
    let sheet = Stylesheet::parse(css).unwrap();
    let mut rule = sheet.rules()[0].clone();
    let found = locate_backgrounds(&rule);
    let backgrounds: Vec<(&BackgroundDeclaration, Rect)> =
      found.iter().filter(|bg| bg.is_eligible()).map(|bg| (bg, rect)).collect();
    let rewrites = rewrite_rule(&mut rule, &backgrounds, &RewriteOptions {
      sprite_url: "/assets/s.png",
      comment_origin,
    });
    (rule, rewrites)
  }

  fn value(rule: &Rule, property: &str) -> String {
    rule.find(property).map(|(_, decl)| decl.value.clone()).unwrap_or_default()
  }

  #[test]
  fn formats_zero_offsets_as_literal_zero() {
    assert_eq!(format_offset(&Rect::new(0, 0, 5, 5)), "0 0");
    assert_eq!(format_offset(&Rect::new(10, 0, 5, 5)), "-10px 0");
    assert_eq!(format_offset(&Rect::new(0, 20, 5, 5)), "0 -20px");
    assert_eq!(format_offset(&Rect::new(3, 4, 5, 5)), "-3px -4px");
  }

  #[test]
  fn rewrites_shorthand_value() {
    let (rule, rewrites) = rewrite(
      ".a{background:url(/assets/img/x.png) no-repeat 0 0}",
      Rect::new(10, 0, 5, 5),
      false,
    );
    assert_eq!(value(&rule, "background"), "url(/assets/s.png) no-repeat -10px 0");
    assert_eq!(rewrites.len(), 1);
    assert_eq!(rewrites[0].before, "url(/assets/img/x.png) no-repeat 0 0");
  }

  #[test]
  fn rewrites_longhand_image_and_position() {
    let (rule, rewrites) = rewrite(
      ".a{background-image:url(/assets/img/y.png);background-repeat:no-repeat;background-position:0 0}",
      Rect::new(0, 20, 5, 5),
      false,
    );
    assert_eq!(value(&rule, "background-image"), "url(/assets/s.png)");
    assert_eq!(value(&rule, "background-position"), "0 -20px");
    assert_eq!(value(&rule, "background-repeat"), "no-repeat");
    assert_eq!(rewrites.len(), 2);
  }

  #[test]
  fn inserts_origin_comments_after_rewritten_declarations() {
    let (rule, _) = rewrite(
      ".a{background-position:0 0;background-image:url(/assets/img/y.png);background-repeat:no-repeat}",
      Rect::new(1, 2, 5, 5),
      true,
    );
    assert_eq!(rule.items, vec![
      RuleItem::Declaration(Declaration::new("background-position", "-1px -2px")),
      RuleItem::Comment(" background-position: 0 0; ".into()),
      RuleItem::Declaration(Declaration::new("background-image", "url(/assets/s.png)")),
      RuleItem::Comment(" background-image: url(/assets/img/y.png); ".into()),
      RuleItem::Declaration(Declaration::new("background-repeat", "no-repeat")),
    ]);
  }

  #[test]
  fn shorthand_origin_comment_keeps_exact_value() {
    let (rule, _) = rewrite(
      ".a{background:url('/assets/img/x.png') no-repeat 0 0;color:red}",
      Rect::new(0, 0, 5, 5),
      true,
    );
    assert_eq!(
      rule.items[1],
      RuleItem::Comment(" background: url('/assets/img/x.png') no-repeat 0 0; ".into())
    );
    assert_eq!(value(&rule, "background"), "url(/assets/s.png) no-repeat 0 0");
  }
}
