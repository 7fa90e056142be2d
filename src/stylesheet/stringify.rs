use super::{AtRule, AtRuleBody, Node, Rule, RuleItem, Stylesheet};

/// Formatting options for [`stringify`].
#[derive(Debug, Clone, Copy)]
pub struct StringifyOptions<'a> {
  /// Indentation of one nesting level. Ignored when `compress` is set.
  pub indent: &'a str,
  /// Drop whitespace and comments.
  pub compress: bool,
}

impl Default for StringifyOptions<'_> {
  fn default() -> Self {
    Self {
      indent: "  ",
      compress: false,
    }
  }
}

/// Serialize a stylesheet.
///
/// Expanded output puts one declaration per line and separates top-level entries with a
/// blank line. Compressed output omits comments and every optional whitespace.
pub fn stringify(sheet: &Stylesheet, options: &StringifyOptions<'_>) -> String {
  if options.compress {
    compress_nodes(&sheet.nodes)
  } else {
    expand_nodes(&sheet.nodes, options.indent, 0)
  }
}

fn expand_nodes(nodes: &[Node], indent: &str, level: usize) -> String {
  nodes
    .iter()
    .map(|node| expand_node(node, indent, level))
    .collect::<Vec<_>>()
    .join("\n\n")
}

fn expand_node(node: &Node, indent: &str, level: usize) -> String {
  let pad = indent.repeat(level);
  match node {
    Node::Rule(Rule { selector, items }) => expand_block(&pad, selector, items, indent),
    Node::Comment(text) => format!("{pad}/*{text}*/"),
    Node::AtRule(AtRule { name, prelude, body }) => {
      let head = at_rule_head(name, prelude);
      match body {
        AtRuleBody::Statement => format!("{pad}{head};"),
        AtRuleBody::Rules(children) => format!(
          "{pad}{head} {{\n{}\n{pad}}}",
          expand_nodes(children, indent, level + 1)
        ),
        AtRuleBody::Declarations(items) => expand_block(&pad, &head, items, indent),
        AtRuleBody::Raw(raw) => format!("{pad}{head} {{ {raw} }}"),
      }
    }
  }
}

fn expand_block(pad: &str, head: &str, items: &[RuleItem], indent: &str) -> String {
  let mut out = format!("{pad}{head} {{\n");
  for item in items {
    out.push_str(pad);
    out.push_str(indent);
    match item {
      RuleItem::Declaration(declaration) => {
        out.push_str(&format!("{}: {};", declaration.property, declaration.value));
      }
      RuleItem::Comment(text) => out.push_str(&format!("/*{text}*/")),
      RuleItem::Raw(raw) => {
        out.push_str(raw);
        out.push(';');
      }
    }
    out.push('\n');
  }
  out.push_str(pad);
  out.push('}');
  out
}

fn compress_nodes(nodes: &[Node]) -> String {
  let mut out = String::new();
  for node in nodes {
    match node {
      Node::Rule(Rule { selector, items }) => compress_block(&mut out, selector, items),
      Node::Comment(_) => {}
      Node::AtRule(AtRule { name, prelude, body }) => {
        let head = at_rule_head(name, prelude);
        match body {
          AtRuleBody::Statement => {
            out.push_str(&head);
            out.push(';');
          }
          AtRuleBody::Rules(children) => {
            out.push_str(&head);
            out.push('{');
            out.push_str(&compress_nodes(children));
            out.push('}');
          }
          AtRuleBody::Declarations(items) => compress_block(&mut out, &head, items),
          AtRuleBody::Raw(raw) => {
            out.push_str(&head);
            out.push('{');
            out.push_str(raw);
            out.push('}');
          }
        }
      }
    }
  }
  out
}

fn compress_block(out: &mut String, head: &str, items: &[RuleItem]) {
  out.push_str(head);
  out.push('{');
  for item in items {
    match item {
      RuleItem::Declaration(declaration) => {
        out.push_str(&declaration.property);
        out.push(':');
        out.push_str(&declaration.value);
        out.push(';');
      }
      RuleItem::Raw(raw) => {
        out.push_str(raw);
        out.push(';');
      }
      RuleItem::Comment(_) => {}
    }
  }
  out.push('}');
}

fn at_rule_head(name: &str, prelude: &str) -> String {
  if prelude.is_empty() {
    format!("@{name}")
  } else {
    format!("@{name} {prelude}")
  }
}
