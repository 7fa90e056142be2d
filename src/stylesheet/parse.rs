use cssparser::{Delimiter, ParseError, ParseErrorKind, Parser, ParserInput, SourcePosition, Token};
use thiserror::Error;

use super::{AtRule, AtRuleBody, Declaration, Node, Rule, RuleItem, Stylesheet};

/// At-rules whose block holds nested style rules.
const GROUPING_AT_RULES: &[&str] = &["media", "supports", "document", "-moz-document", "layer", "container"];

/// At-rules whose block holds declarations.
const DECLARATION_AT_RULES: &[&str] = &["font-face", "page", "counter-style", "property", "viewport"];

/// Errors raised while parsing stylesheet text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StylesheetError {
  /// A closing brace without a matching opening brace.
  #[error("unmatched '}}' at line {line}, column {column}")]
  UnmatchedBrace {
    /// One-based line number.
    line: u32,
    /// One-based column number.
    column: u32,
  },
}

type BlockResult<'i, T> = Result<T, ParseError<'i, ()>>;

/// Parse stylesheet text into a [`Stylesheet`].
///
/// Parsing is tolerant: text in a declaration block that is not a `property: value` pair is
/// kept verbatim as [`RuleItem::Raw`] and parsing resumes after the next `;`. Only structural
/// errors that make the block layout ambiguous are reported.
pub fn parse(source: &str) -> Result<Stylesheet, StylesheetError> {
  let mut input = ParserInput::new(source);
  let mut parser = Parser::new(&mut input);
  let nodes = parse_rule_list(&mut parser).map_err(|err| StylesheetError::UnmatchedBrace {
    line: err.location.line + 1,
    column: err.location.column,
  })?;
  Ok(Stylesheet { nodes })
}

fn parse_rule_list<'i, 't>(parser: &mut Parser<'i, 't>) -> BlockResult<'i, Vec<Node>> {
  let mut nodes = Vec::new();
  let mut prelude_start: Option<SourcePosition> = None;
  let mut at_rule: Option<String> = None;

  loop {
    let before = parser.position();
    let location = parser.current_source_location();
    let token = match parser.next_including_whitespace_and_comments() {
      Ok(token) => token.clone(),
      Err(_) => break,
    };

    match token {
      Token::WhiteSpace(_) => {}
      Token::Comment(text) if prelude_start.is_none() => nodes.push(Node::Comment(text.to_string())),
      Token::AtKeyword(name) if prelude_start.is_none() => {
        at_rule = Some(name.to_string());
        prelude_start = Some(parser.position());
      }
      Token::Semicolon => {
        if let (Some(name), Some(start)) = (at_rule.take(), prelude_start) {
          nodes.push(Node::AtRule(AtRule {
            name,
            prelude: parser.slice(start..before).trim().to_string(),
            body: AtRuleBody::Statement,
          }));
        }
        prelude_start = None;
      }
      Token::CurlyBracketBlock => {
        let prelude = prelude_start
          .take()
          .map(|start| parser.slice(start..before).trim().to_string())
          .unwrap_or_default();
        let node = match at_rule.take() {
          Some(name) => {
            let body = parse_at_rule_body(parser, &name)?;
            Node::AtRule(AtRule {
              name,
              prelude,
              body,
            })
          }
          None => Node::Rule(Rule {
            selector: prelude,
            items: parser.parse_nested_block(parse_declaration_list)?,
          }),
        };
        nodes.push(node);
      }
      Token::CloseCurlyBracket => {
        return Err(ParseError {
          kind: ParseErrorKind::Custom(()),
          location,
        });
      }
      _ => {
        if prelude_start.is_none() {
          prelude_start = Some(before);
        }
      }
    }
  }

  Ok(nodes)
}

fn parse_at_rule_body<'i, 't>(parser: &mut Parser<'i, 't>, name: &str) -> BlockResult<'i, AtRuleBody> {
  let name = name.to_ascii_lowercase();
  let body = if GROUPING_AT_RULES.contains(&name.as_str()) {
    AtRuleBody::Rules(parser.parse_nested_block(parse_rule_list)?)
  } else if DECLARATION_AT_RULES.contains(&name.as_str()) {
    AtRuleBody::Declarations(parser.parse_nested_block(parse_declaration_list)?)
  } else {
    AtRuleBody::Raw(parser.parse_nested_block(consume_raw_block)?)
  };
  Ok(body)
}

fn parse_declaration_list<'i, 't>(parser: &mut Parser<'i, 't>) -> BlockResult<'i, Vec<RuleItem>> {
  let mut items = Vec::new();

  loop {
    let start = parser.position();
    let token = match parser.next_including_whitespace_and_comments() {
      Ok(token) => token.clone(),
      Err(_) => break,
    };

    let property = match token {
      Token::WhiteSpace(_) | Token::Semicolon => continue,
      Token::Comment(text) => {
        items.push(RuleItem::Comment(text.to_string()));
        continue;
      }
      Token::Ident(name) => Some(name.to_string()),
      // IE star hack: `*zoom: 1`.
      Token::Delim('*') => match parser.next_including_whitespace_and_comments() {
        Ok(Token::Ident(name)) => Some(format!("*{name}")),
        _ => None,
      },
      _ => None,
    };

    let declaration = property.filter(|_| parser.try_parse(|p| p.expect_colon()).is_ok());
    let Some(property) = declaration else {
      let end = consume_until_semicolon(parser);
      let raw = parser.slice(start..end).trim();
      if !raw.is_empty() {
        items.push(RuleItem::Raw(raw.to_string()));
      }
      continue;
    };

    let value_start = parser.position();
    let value_end = consume_until_semicolon(parser);
    let value = parser.slice(value_start..value_end).trim();
    if value.is_empty() {
      items.push(RuleItem::Raw(parser.slice(start..value_end).trim().to_string()));
    } else {
      items.push(RuleItem::Declaration(Declaration::new(property, value)));
    }
  }

  Ok(items)
}

/// Consume tokens up to the next top-level `;` or the end of the block, nested blocks
/// included, and return the position before the `;`.
fn consume_until_semicolon(parser: &mut Parser<'_, '_>) -> SourcePosition {
  let _ = parser.parse_until_before::<_, (), ()>(Delimiter::Semicolon, |nested| {
    while nested.next_including_whitespace_and_comments().is_ok() {}
    Ok(())
  });
  let end = parser.position();
  let _ = parser.next();
  end
}

fn consume_raw_block<'i, 't>(parser: &mut Parser<'i, 't>) -> BlockResult<'i, String> {
  let start = parser.position();
  while parser.next_including_whitespace_and_comments().is_ok() {}
  Ok(parser.slice_from(start).trim().to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn declarations(rule: &Rule) -> Vec<(&str, &str)> {
    rule
      .declarations()
      .map(|(_, declaration)| (declaration.property.as_str(), declaration.value.as_str()))
      .collect()
  }

  #[test]
  fn parses_rules_and_declarations() {
    let sheet = parse(".a, .b > p { background: url(/img/x.png) no-repeat 0 0; color: red !important }").unwrap();
    let rule = sheet.rules()[0];
    assert_eq!(rule.selector, ".a, .b > p");
    assert_eq!(declarations(rule), vec![
      ("background", "url(/img/x.png) no-repeat 0 0"),
      ("color", "red !important"),
    ]);
  }

  #[test]
  fn keeps_comments_in_order() {
    let sheet = parse("/* head */ .a { /* inner */ color: red; }").unwrap();
    assert_eq!(sheet.nodes[0], Node::Comment(" head ".into()));
    let rule = sheet.rules()[0];
    assert_eq!(rule.items[0], RuleItem::Comment(" inner ".into()));
  }

  #[test]
  fn keeps_quoted_urls_and_functions_in_values() {
    let sheet = parse(r#".a{background-image:url("a;b.png");width:calc(100% - 2px)}"#).unwrap();
    assert_eq!(declarations(sheet.rules()[0]), vec![
      ("background-image", r#"url("a;b.png")"#),
      ("width", "calc(100% - 2px)"),
    ]);
  }

  #[test]
  fn keeps_malformed_declarations_verbatim() {
    let sheet = parse(".a{ color red; width: 2px; height:; }").unwrap();
    let rule = sheet.rules()[0];
    assert_eq!(declarations(rule), vec![("width", "2px")]);
    assert_eq!(rule.items[0], RuleItem::Raw("color red".into()));
    assert_eq!(rule.items[2], RuleItem::Raw("height:".into()));
  }

  #[test]
  fn keeps_hacked_property_names() {
    let sheet = parse(".a{*zoom:1;_height:1px;color:rgba(0,0,0,.5)}").unwrap();
    assert_eq!(declarations(sheet.rules()[0]), vec![
      ("*zoom", "1"),
      ("_height", "1px"),
      ("color", "rgba(0,0,0,.5)"),
    ]);
  }

  #[test]
  fn keeps_function_values_before_the_end_of_the_block() {
    let sheet = parse(r#".a{color:rgba(0,0,0,.5)}.b{background-image:url('/img/y.png')}"#).unwrap();
    let rules = sheet.rules();
    assert_eq!(declarations(rules[0]), vec![("color", "rgba(0,0,0,.5)")]);
    assert_eq!(declarations(rules[1]), vec![("background-image", "url('/img/y.png')")]);
  }

  #[test]
  fn parses_at_rules() {
    let sheet = parse(
      "@import url(base.css);\n@media screen and (min-width: 1px) { .a { color: red } }\n@keyframes spin { from { opacity: 0 } to { opacity: 1 } }",
    )
    .unwrap();

    let AtRule { name, prelude, body } = match &sheet.nodes[0] {
      Node::AtRule(rule) => rule.clone(),
      other => panic!("unexpected node {other:?}"),
    };
    assert_eq!(name, "import");
    assert_eq!(prelude, "url(base.css)");
    assert_eq!(body, AtRuleBody::Statement);

    match &sheet.nodes[1] {
      Node::AtRule(AtRule {
        prelude,
        body: AtRuleBody::Rules(children),
        ..
      }) => {
        assert_eq!(prelude, "screen and (min-width: 1px)");
        assert_eq!(children.len(), 1);
      }
      other => panic!("unexpected node {other:?}"),
    }

    match &sheet.nodes[2] {
      Node::AtRule(AtRule {
        body: AtRuleBody::Raw(raw),
        ..
      }) => assert_eq!(raw, "from { opacity: 0 } to { opacity: 1 }"),
      other => panic!("unexpected node {other:?}"),
    }
  }

  #[test]
  fn reports_unmatched_closing_brace() {
    let err = parse(".a{color:red}\n}").unwrap_err();
    assert_eq!(err, StylesheetError::UnmatchedBrace { line: 2, column: 1 });
  }
}
