// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The persistent rope backing [`super::MeasuredSeq`].
//!
//! A join-based, `Rc`-sharing, height-balanced binary tree: every interior
//! node caches the combined [`Measure`] and subtree height, `join` is the
//! single primitive `append`/`cons`/`snoc` all reduce to, and rebalancing
//! is a single AVL-style rotation at the seam where two subtrees of
//! unequal height met (standard weight-balanced tree join, e.g. Blelloch
//! et al., specialized to AVL height balance). This keeps every operation
//! in [`super::MeasuredSeq`] inside the O(log n) budget the component
//! design allows, at the cost of the O(1) amortized ends a textbook 2-3
//! finger tree gets for free; see the module doc on [`super::MeasuredSeq`]
//! for why that trade was made here.

use super::measure::Measure;
use super::SeqElem;
use std::rc::Rc;

#[derive(Debug)]
pub(super) enum Tree {
    Empty,
    Leaf(SeqElem, Measure),
    Node {
        measure: Measure,
        height: u32,
        left: Rc<Tree>,
        right: Rc<Tree>,
    },
}

impl Tree {
    pub(super) fn measure(&self) -> Measure {
        match self {
            Tree::Empty => Measure::identity(),
            Tree::Leaf(_, m) => *m,
            Tree::Node { measure, .. } => *measure,
        }
    }

    pub(super) fn height(&self) -> u32 {
        match self {
            Tree::Empty | Tree::Leaf(..) => 0,
            Tree::Node { height, .. } => *height,
        }
    }

    pub(super) fn is_empty(&self) -> bool {
        matches!(self, Tree::Empty)
    }

    /// Walks the tree left to right, for debug formatting and tests only.
    pub(super) fn for_each<'a>(self: &'a Rc<Self>, f: &mut dyn FnMut(&'a SeqElem)) {
        match &**self {
            Tree::Empty => {}
            Tree::Leaf(e, _) => f(e),
            Tree::Node { left, right, .. } => {
                left.for_each(f);
                right.for_each(f);
            }
        }
    }
}

pub(super) fn empty() -> Rc<Tree> {
    Rc::new(Tree::Empty)
}

pub(super) fn leaf(elem: SeqElem, measure: Measure) -> Rc<Tree> {
    Rc::new(Tree::Leaf(elem, measure))
}

/// Builds a plain node from two subtrees whose heights already differ by
/// at most one. Does not rebalance; callers that can't guarantee that must
/// go through [`balance`].
fn node(l: Rc<Tree>, r: Rc<Tree>) -> Rc<Tree> {
    if l.is_empty() {
        return r;
    }
    if r.is_empty() {
        return l;
    }
    let measure = l.measure().combine(&r.measure());
    let height = 1 + l.height().max(r.height());
    Rc::new(Tree::Node { measure, height, left: l, right: r })
}

/// Builds a node from two subtrees whose heights may differ by up to two,
/// applying a single AVL rotation (simple or double) if needed.
fn balance(l: Rc<Tree>, r: Rc<Tree>) -> Rc<Tree> {
    let (hl, hr) = (l.height(), r.height());
    if hl > hr + 1 {
        let Tree::Node { left: ll, right: lr, .. } = &*l else {
            unreachable!("height > 0 implies Node")
        };
        if ll.height() >= lr.height() {
            node(ll.clone(), node(lr.clone(), r))
        } else {
            let Tree::Node { left: lrl, right: lrr, .. } = &**lr else {
                unreachable!("lr.height() > ll.height() >= 0 implies Node")
            };
            node(node(ll.clone(), lrl.clone()), node(lrr.clone(), r))
        }
    } else if hr > hl + 1 {
        let Tree::Node { left: rl, right: rr, .. } = &*r else {
            unreachable!("height > 0 implies Node")
        };
        if rr.height() >= rl.height() {
            node(node(l, rl.clone()), rr.clone())
        } else {
            let Tree::Node { left: rll, right: rlr, .. } = &**rl else {
                unreachable!("rl.height() > rr.height() >= 0 implies Node")
            };
            node(node(l, rll.clone()), node(rlr.clone(), rr.clone()))
        }
    } else {
        node(l, r)
    }
}

/// Concatenates two ropes, O(log n) in the combined size.
pub(super) fn join(l: Rc<Tree>, r: Rc<Tree>) -> Rc<Tree> {
    if l.is_empty() {
        return r;
    }
    if r.is_empty() {
        return l;
    }
    let (hl, hr) = (l.height(), r.height());
    if hl > hr + 1 {
        let Tree::Node { left, right, .. } = &*l else {
            unreachable!("height > 0 implies Node")
        };
        balance(left.clone(), join(right.clone(), r))
    } else if hr > hl + 1 {
        let Tree::Node { left, right, .. } = &*r else {
            unreachable!("height > 0 implies Node")
        };
        balance(join(l, left.clone()), right.clone())
    } else {
        node(l, r)
    }
}

/// Removes and returns the leftmost element together with its
/// already-cached per-element measure, O(log n).
pub(super) fn front(tree: &Rc<Tree>) -> Option<(SeqElem, Measure, Rc<Tree>)> {
    match &**tree {
        Tree::Empty => None,
        Tree::Leaf(e, m) => Some((*e, *m, empty())),
        Tree::Node { left, right, .. } => {
            let (e, m, new_left) = front(left)?;
            Some((e, m, join(new_left, right.clone())))
        }
    }
}

/// Splits `tree` at the first point where `pred` holds over the
/// accumulated measure from the start, returning `(prefix, suffix)` with
/// `tree == prefix ++ suffix` and `pred` false on every strict prefix of
/// `prefix`. If `pred` never holds, the whole tree is the prefix.
pub(super) fn split(
    tree: &Rc<Tree>,
    pred: &impl Fn(&Measure) -> bool,
) -> (Rc<Tree>, Rc<Tree>) {
    if !pred(&tree.measure()) {
        return (tree.clone(), empty());
    }
    split_acc(tree, &Measure::identity(), pred)
}

fn split_acc(
    tree: &Rc<Tree>,
    acc: &Measure,
    pred: &impl Fn(&Measure) -> bool,
) -> (Rc<Tree>, Rc<Tree>) {
    match &**tree {
        Tree::Empty => (empty(), empty()),
        Tree::Leaf(..) => (empty(), tree.clone()),
        Tree::Node { left, right, .. } => {
            let acc_left = acc.combine(&left.measure());
            if pred(&acc_left) {
                let (ll, lr) = split_acc(left, acc, pred);
                (ll, join(lr, right.clone()))
            } else {
                let (rl, rr) = split_acc(right, &acc_left, pred);
                (join(left.clone(), rl), rr)
            }
        }
    }
}
