//! Minimal stylesheet tree: rules, declarations and comments, with a parser and serializer.
//!
//! Only the structure needed to rewrite background declarations is modelled. Selectors,
//! at-rule preludes and declaration values are kept as the source text that produced them,
//! so untouched parts of a stylesheet serialize back to equivalent CSS.

mod parse;
mod stringify;

pub use parse::{StylesheetError, parse};
pub use stringify::{StringifyOptions, stringify};

/// Parsed stylesheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stylesheet {
  /// Top-level rules, at-rules and comments in source order.
  pub nodes: Vec<Node>,
}

/// Top-level or nested stylesheet entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
  /// Style rule.
  Rule(Rule),
  /// Comment text without the `/*` `*/` delimiters.
  Comment(String),
  /// At-rule such as `@media` or `@import`.
  AtRule(AtRule),
}

/// Style rule: a selector and its declaration block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rule {
  /// Selector text.
  pub selector: String,
  /// Declarations and comments of the block in source order.
  pub items: Vec<RuleItem>,
}

/// Entry of a declaration block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleItem {
  /// `property: value` pair.
  Declaration(Declaration),
  /// Comment text without the `/*` `*/` delimiters.
  Comment(String),
  /// Text that is not a `property: value` pair, kept as written without its `;`.
  Raw(String),
}

/// Single `property: value` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
  /// Property name as written.
  pub property: String,
  /// Value as written, including any `!important`.
  pub value: String,
}

impl Declaration {
  /// Create a declaration.
  pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
    Self {
      property: property.into(),
      value: value.into(),
    }
  }

  /// Whether this declaration sets `property`, ignoring ASCII case.
  pub fn is(&self, property: &str) -> bool {
    self.property.eq_ignore_ascii_case(property)
  }
}

/// At-rule with its raw prelude.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtRule {
  /// Name without the `@`.
  pub name: String,
  /// Text between the name and the block or semicolon.
  pub prelude: String,
  /// Block content.
  pub body: AtRuleBody,
}

/// Content of an at-rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtRuleBody {
  /// Statement ending with `;`, e.g. `@import`.
  Statement,
  /// Block of nested rules, e.g. `@media`.
  Rules(Vec<Node>),
  /// Block of declarations, e.g. `@font-face`.
  Declarations(Vec<RuleItem>),
  /// Block kept verbatim, e.g. `@keyframes`.
  Raw(String),
}

impl Stylesheet {
  /// Parse stylesheet text.
  pub fn parse(source: &str) -> Result<Self, StylesheetError> {
    parse(source)
  }

  /// Serialize back to CSS text.
  pub fn to_css(&self, options: &StringifyOptions<'_>) -> String {
    stringify(self, options)
  }

  /// Every style rule, including rules nested in grouping at-rules, in source order.
  pub fn rules(&self) -> Vec<&Rule> {
    let mut rules = Vec::new();
    collect_rules(&self.nodes, &mut rules);
    rules
  }

  /// Visit every style rule mutably, including rules nested in grouping at-rules.
  pub fn for_each_rule_mut(&mut self, mut visit: impl FnMut(&mut Rule)) {
    visit_rules_mut(&mut self.nodes, &mut visit);
  }
}

impl Rule {
  /// Every declaration of the block with its index in [`Rule::items`].
  pub fn declarations(&self) -> impl Iterator<Item = (usize, &Declaration)> {
    self
      .items
      .iter()
      .enumerate()
      .filter_map(|(index, item)| match item {
        RuleItem::Declaration(declaration) => Some((index, declaration)),
        RuleItem::Comment(_) | RuleItem::Raw(_) => None,
      })
  }

  /// First declaration setting `property`.
  pub fn find(&self, property: &str) -> Option<(usize, &Declaration)> {
    self
      .declarations()
      .find(|(_, declaration)| declaration.is(property))
  }

  /// Whether the block declares `property` with exactly `value`.
  pub fn has_declaration(&self, property: &str, value: &str) -> bool {
    self
      .declarations()
      .any(|(_, declaration)| declaration.is(property) && declaration.value == value)
  }

  /// Mutable access to the declaration at `index`.
  pub fn declaration_mut(&mut self, index: usize) -> Option<&mut Declaration> {
    match self.items.get_mut(index) {
      Some(RuleItem::Declaration(declaration)) => Some(declaration),
      _ => None,
    }
  }
}

fn collect_rules<'a>(nodes: &'a [Node], rules: &mut Vec<&'a Rule>) {
  for node in nodes {
    match node {
      Node::Rule(rule) => rules.push(rule),
      Node::AtRule(AtRule {
        body: AtRuleBody::Rules(children),
        ..
      }) => collect_rules(children, rules),
      _ => {}
    }
  }
}

fn visit_rules_mut(nodes: &mut [Node], visit: &mut dyn FnMut(&mut Rule)) {
  for node in nodes {
    match node {
      Node::Rule(rule) => visit(rule),
      Node::AtRule(AtRule {
        body: AtRuleBody::Rules(children),
        ..
      }) => visit_rules_mut(children, visit),
      _ => {}
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn finds_declarations_case_insensitively() {
    let sheet = Stylesheet::parse(".a{ /* note */ Background-Repeat: no-repeat; color: red }").unwrap();
    let rule = sheet.rules()[0];
    assert_eq!(rule.find("background-repeat").map(|(index, _)| index), Some(1));
    assert!(rule.has_declaration("background-repeat", "no-repeat"));
    assert!(!rule.has_declaration("color", "blue"));
  }

  #[test]
  fn visits_rules_nested_in_media_queries() {
    let mut sheet =
      Stylesheet::parse(".a{color:red}@media (min-width: 10px){.b{color:red}}@font-face{src:url(a.woff)}")
        .unwrap();
    assert_eq!(sheet.rules().len(), 2);

    let mut visited = Vec::new();
    sheet.for_each_rule_mut(|rule| visited.push(rule.selector.clone()));
    assert_eq!(visited, vec![".a", ".b"]);
  }
}
