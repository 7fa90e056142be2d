//! Growing binary-tree layout.
//!
//! Each placed box splits its free node into a node to the right and a node below. When
//! no free node fits, the root grows right or down, preferring whichever keeps the
//! layout closest to a square.

/// Box to place, in padded pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Block {
  pub width: u32,
  pub height: u32,
}

#[derive(Debug, Clone, Copy)]
struct Node {
  x: u32,
  y: u32,
  width: u32,
  height: u32,
  used: bool,
  right: Option<usize>,
  down: Option<usize>,
}

impl Node {
  fn free(x: u32, y: u32, width: u32, height: u32) -> Self {
    Self {
      x,
      y,
      width,
      height,
      used: false,
      right: None,
      down: None,
    }
  }
}

/// Result of a layout: the position of each block and the covered area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Layout {
  pub positions: Vec<(u32, u32)>,
  pub width: u32,
  pub height: u32,
}

/// Nodes live in an arena; links are indices into it.
struct Tree {
  nodes: Vec<Node>,
  root: usize,
}

impl Tree {
  fn new(width: u32, height: u32) -> Self {
    Self {
      nodes: vec![Node::free(0, 0, width, height)],
      root: 0,
    }
  }

  fn push(&mut self, node: Node) -> usize {
    self.nodes.push(node);
    self.nodes.len() - 1
  }

  fn find(&self, index: usize, width: u32, height: u32) -> Option<usize> {
    let node = &self.nodes[index];
    if node.used {
      node
        .right
        .and_then(|right| self.find(right, width, height))
        .or_else(|| node.down.and_then(|down| self.find(down, width, height)))
    } else if width <= node.width && height <= node.height {
      Some(index)
    } else {
      None
    }
  }

  fn split(&mut self, index: usize, width: u32, height: u32) -> (u32, u32) {
    let node = self.nodes[index];
    let down = self.push(Node::free(node.x, node.y + height, node.width, node.height - height));
    let right = self.push(Node::free(node.x + width, node.y, node.width - width, height));

    let node = &mut self.nodes[index];
    node.used = true;
    node.down = Some(down);
    node.right = Some(right);
    (node.x, node.y)
  }

  fn grow(&mut self, width: u32, height: u32) -> Option<(u32, u32)> {
    let root = self.nodes[self.root];
    let can_grow_down = width <= root.width;
    let can_grow_right = height <= root.height;

    let should_grow_right = can_grow_right && root.height >= root.width + width;
    let should_grow_down = can_grow_down && root.width >= root.height + height;

    if should_grow_right {
      self.grow_right(width, height)
    } else if should_grow_down {
      self.grow_down(width, height)
    } else if can_grow_right {
      self.grow_right(width, height)
    } else if can_grow_down {
      self.grow_down(width, height)
    } else {
      None
    }
  }

  fn grow_right(&mut self, width: u32, height: u32) -> Option<(u32, u32)> {
    let previous = self.root;
    let old = self.nodes[previous];
    let right = self.push(Node::free(old.width, 0, width, old.height));
    self.root = self.push(Node {
      x: 0,
      y: 0,
      width: old.width + width,
      height: old.height,
      used: true,
      right: Some(right),
      down: Some(previous),
    });
    self.place(width, height)
  }

  fn grow_down(&mut self, width: u32, height: u32) -> Option<(u32, u32)> {
    let previous = self.root;
    let old = self.nodes[previous];
    let down = self.push(Node::free(0, old.height, old.width, height));
    self.root = self.push(Node {
      x: 0,
      y: 0,
      width: old.width,
      height: old.height + height,
      used: true,
      right: Some(previous),
      down: Some(down),
    });
    self.place(width, height)
  }

  fn place(&mut self, width: u32, height: u32) -> Option<(u32, u32)> {
    let index = self.find(self.root, width, height)?;
    Some(self.split(index, width, height))
  }
}

/// Place `blocks` in the given order. Returns `None` when a block cannot be placed,
/// which only happens when blocks are not sorted largest first.
pub(crate) fn layout(blocks: &[Block]) -> Option<Layout> {
  let Some(first) = blocks.first() else {
    return Some(Layout {
      positions: Vec::new(),
      width: 0,
      height: 0,
    });
  };

  let mut tree = Tree::new(first.width, first.height);
  let mut positions = Vec::with_capacity(blocks.len());
  for block in blocks {
    let position = match tree.place(block.width, block.height) {
      Some(position) => position,
      None => tree.grow(block.width, block.height)?,
    };
    positions.push(position);
  }

  let root = tree.nodes[tree.root];
  Some(Layout {
    positions,
    width: root.width,
    height: root.height,
  })
}
