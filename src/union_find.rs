/*!

The equality theory for logical (term-level) variables: a union-find over `VarId` whose edges
carry the SAT literal that justifies them, per SPEC_FULL §4.4 and `original_source/var.c`
(`solver_bind_vars`, `var_reverse`, `solver_match_vars`).

Unlike a textbook union-find, every edge must be *undoable*: backtracking past the decision level
at which `x` was unified with `y` must restore both variables to being unrelated. Path compression
would turn one trailed edge into many, so `deref` only ever *follows* the chain, never rewrites it;
the only mutation `bind` performs is re-pointing one representative's `next` at the other,
recorded on `self.trail` so it can be undone in O(1).

*/

use crate::trail::{Mark, Trail};
use crate::{Literal, VarId};

#[derive(Clone, Debug)]
struct VarNode {
  /// Self-linked (`next == self`) iff this variable is currently a representative.
  next: VarId,
  /// The literal that justified linking this node to `next`; meaningless while `next == self`.
  link: Literal,
  /// Constraints attached to this variable, valid only while it is a representative; transplanted
  /// to the new representative's list on `bind`.
  constraints: Vec<crate::ConsId>,
}

impl VarNode {
  fn new_root(id: VarId) -> Self {
    Self { next: id, link: Literal::null(), constraints: Vec::new() }
  }
}

#[derive(Copy, Clone, Debug)]
enum Op {
  /// Undoes `bind`: `child` was a representative (`next == child`) before the bind; restore that,
  /// and truncate `parent`'s constraint list back to `parent_len` (the transplanted constraints
  /// from `child` were appended past that point).
  Bind { child: VarId, parent: VarId, parent_len: usize },
}

#[derive(Default)]
pub struct UnionFind {
  nodes: Vec<VarNode>,
  trail: Trail<Op>,
}

impl UnionFind {
  pub fn new() -> Self {
    Self::default()
  }

  /// Allocates a fresh variable, initially its own representative with no attached constraints.
  pub fn fresh_var(&mut self) -> VarId {
    let id = self.nodes.len();
    self.nodes.push(VarNode::new_root(id));
    id
  }

  pub fn mark(&self) -> Mark {
    self.trail.mark()
  }

  /// Follows `next` links to the representative. No path compression: every mutation here must be
  /// trail-reversible, and compression would require logging every edge it rewrites.
  pub fn deref(&self, x: VarId) -> VarId {
    let mut cur = x;
    while self.nodes[cur].next != cur {
      cur = self.nodes[cur].next;
    }
    cur
  }

  pub fn is_representative(&self, x: VarId) -> bool {
    self.nodes[x].next == x
  }

  pub fn attached_constraints(&self, x: VarId) -> &[crate::ConsId] {
    &self.nodes[self.deref(x)].constraints
  }

  pub fn attach_constraint(&mut self, x: VarId, cons: crate::ConsId) {
    let r = self.deref(x);
    self.nodes[r].constraints.push(cons);
  }

  /// Unifies `x` and `y` under justifying literal `lit`. Returns `false` if they were already the
  /// same representative (a no-op union). The representative with fewer attached constraints
  /// becomes the child, so the O(|list|) constraint transplant is as cheap as possible.
  pub fn bind(&mut self, lit: Literal, x: VarId, y: VarId) -> bool {
    let rx = self.deref(x);
    let ry = self.deref(y);
    if rx == ry {
      return false;
    }

    let (child, parent) = if self.nodes[rx].constraints.len() <= self.nodes[ry].constraints.len() {
      (rx, ry)
    } else {
      (ry, rx)
    };

    let parent_len = self.nodes[parent].constraints.len();
    let mut transplanted = std::mem::take(&mut self.nodes[child].constraints);
    self.nodes[parent].constraints.append(&mut transplanted);

    self.nodes[child].next = parent;
    self.nodes[child].link = lit;

    self.trail.push(Op::Bind { child, parent, parent_len });
    true
  }

  pub fn undo_to(&mut self, mark: Mark) {
    let nodes = &mut self.nodes;
    self.trail.undo_to(mark, |op| match op {
      Op::Bind { child, parent, parent_len } => {
        nodes[parent].constraints.truncate(parent_len);
        nodes[child].next = child;
        nodes[child].link = Literal::null();
      }
    });
  }

  /// Decides whether `x` and `y` are currently equal and, if so, appends the justifying literals
  /// along the two paths from `x` and `y` up to their common root to `reason`. Per SPEC_FULL §4.4:
  /// mark the path from `x` to its root, then walk from `y` upward collecting literals until a
  /// mark is hit (success) or the root is reached without a hit (failure, `reason` untouched). On
  /// a hit, the literals along *both* arms -- `x`'s path up to the meet node as well as `y`'s --
  /// are appended, matching `original_source/var.c:316-335`'s `solver_match_vars`, which loops
  /// from `x` up to the meet node `yi` adding `antecedent(reason, xi->lit)` after the walk from
  /// `y` finds it.
  pub fn match_vars(&self, reason: &mut Vec<Literal>, x: VarId, y: VarId) -> bool {
    let start_len = reason.len();

    // Path from `x` to its root, each entry the node and the literal linking it to `next` (`None`
    // for the root itself, which has no outgoing link).
    let mut x_path = Vec::new();
    let mut cur = x;
    loop {
      if self.nodes[cur].next == cur {
        x_path.push((cur, None));
        break;
      }
      x_path.push((cur, Some(self.nodes[cur].link)));
      cur = self.nodes[cur].next;
    }

    let mut cur = y;
    let mut collected = Vec::new();
    loop {
      if let Some(meet) = x_path.iter().position(|&(node, _)| node == cur) {
        reason.extend(collected);
        for &(_, link) in &x_path[..meet] {
          reason.push(link.expect("non-root entries in x_path always carry a link"));
        }
        return true;
      }
      if self.nodes[cur].next == cur {
        break;
      }
      collected.push(self.nodes[cur].link);
      cur = self.nodes[cur].next;
    }

    reason.truncate(start_len);
    false
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fresh_vars_are_their_own_representative() {
    let mut uf = UnionFind::new();
    let x = uf.fresh_var();
    let y = uf.fresh_var();
    assert_ne!(uf.deref(x), uf.deref(y));
    assert!(uf.is_representative(x));
  }

  #[test]
  fn bind_unifies_representatives() {
    let mut uf = UnionFind::new();
    let x = uf.fresh_var();
    let y = uf.fresh_var();
    assert!(uf.bind(Literal::positive(0), x, y));
    assert_eq!(uf.deref(x), uf.deref(y));
    // Rebinding already-equal variables is a no-op.
    assert!(!uf.bind(Literal::positive(1), x, y));
  }

  #[test]
  fn undo_restores_separate_representatives() {
    let mut uf = UnionFind::new();
    let x = uf.fresh_var();
    let y = uf.fresh_var();
    let mark = uf.mark();
    uf.bind(Literal::positive(0), x, y);
    assert_eq!(uf.deref(x), uf.deref(y));
    uf.undo_to(mark);
    assert_ne!(uf.deref(x), uf.deref(y));
  }

  #[test]
  fn match_vars_finds_a_justifying_path() {
    let mut uf = UnionFind::new();
    let x = uf.fresh_var();
    let y = uf.fresh_var();
    let z = uf.fresh_var();
    uf.bind(Literal::positive(0), x, y);
    uf.bind(Literal::positive(1), y, z);

    let mut reason = Vec::new();
    assert!(uf.match_vars(&mut reason, x, z));
    assert!(!reason.is_empty());
  }

  #[test]
  fn match_vars_fails_cleanly_on_unrelated_variables() {
    let mut uf = UnionFind::new();
    let x = uf.fresh_var();
    let y = uf.fresh_var();
    let mut reason = vec![Literal::positive(99)];
    assert!(!uf.match_vars(&mut reason, x, y));
    // `reason` is restored to its state before the failed call.
    assert_eq!(reason, vec![Literal::positive(99)]);
  }

  #[test]
  fn constraints_transplant_to_the_surviving_representative() {
    let mut uf = UnionFind::new();
    let x = uf.fresh_var();
    let y = uf.fresh_var();
    uf.attach_constraint(x, 42);
    uf.bind(Literal::positive(0), x, y);
    let r = uf.deref(x);
    assert!(uf.attached_constraints(r).contains(&42));
  }
}
