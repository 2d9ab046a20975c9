//! Octree nodes backing [`SpatialMap`](super::SpatialMap).

use glam::DVec3;

use super::DAabb3;

/// Depth at which leaves stop splitting, whatever their size.
pub const MAX_DEPTH: u32 = 24;

/// One stored value and where it lives.
pub(super) struct Entry<T> {
  pub position: DVec3,
  pub value: T,
}

/// Octree node. Bounds are not stored; they are re-derived from the root on
/// every descent.
pub(super) enum Node<T> {
  Leaf(Vec<Entry<T>>),
  Branch(Box<[Node<T>; 8]>),
}

impl<T> Node<T> {
  pub fn empty() -> Self {
    Node::Leaf(Vec::new())
  }

  pub fn insert(&mut self, bounds: &DAabb3, depth: u32, split_threshold: usize, entry: Entry<T>) {
    match self {
      Node::Leaf(entries) => {
        entries.push(entry);
        if entries.len() > split_threshold && depth < MAX_DEPTH {
          let drained = std::mem::take(entries);
          let mut children: Box<[Node<T>; 8]> = Box::new(std::array::from_fn(|_| Node::empty()));
          for e in drained {
            let octant = bounds.octant(e.position);
            children[octant].insert(&bounds.child(octant), depth + 1, split_threshold, e);
          }
          *self = Node::Branch(children);
        }
      }
      Node::Branch(children) => {
        let octant = bounds.octant(entry.position);
        children[octant].insert(&bounds.child(octant), depth + 1, split_threshold, entry);
      }
    }
  }

  /// Visit every entry inside `region`, returning the number of hits.
  pub fn visit<F: FnMut(&Entry<T>)>(&self, bounds: &DAabb3, region: &DAabb3, f: &mut F) -> usize {
    if !bounds.overlaps(region) {
      return 0;
    }
    match self {
      Node::Leaf(entries) => {
        let mut hits = 0;
        for e in entries {
          if region.contains_point(e.position) {
            f(e);
            hits += 1;
          }
        }
        hits
      }
      Node::Branch(children) => {
        let mut hits = 0;
        for (octant, child) in children.iter().enumerate() {
          hits += child.visit(&bounds.child(octant), region, f);
        }
        hits
      }
    }
  }

  /// Visit every entry in the subtree.
  pub fn for_each<F: FnMut(&Entry<T>)>(&self, f: &mut F) {
    match self {
      Node::Leaf(entries) => {
        for e in entries {
          f(e);
        }
      }
      Node::Branch(children) => {
        for child in children.iter() {
          child.for_each(f);
        }
      }
    }
  }

  /// Deepest level of the subtree (a lone leaf is 0).
  pub fn depth(&self) -> u32 {
    match self {
      Node::Leaf(_) => 0,
      Node::Branch(children) => 1 + children.iter().map(Node::depth).max().unwrap_or(0),
    }
  }
}
