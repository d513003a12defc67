//! Identity-aware list diff.
//!
//! `diff(old, new)` produces an edit script in three phases:
//!
//! 1. `Remove` for every old item whose identity is gone, highest index
//!    first so earlier indices stay valid.
//! 2. `Insert` / `Move` in new-list order. Kept items whose old positions
//!    form a longest increasing subsequence (in new order) never move; every
//!    other kept item moves exactly once, which is the minimum.
//! 3. `Change` for kept items whose content differs, at their final index.
//!
//! Positions are resolved against a precomputed slot order with a Fenwick
//! tree, so the whole diff runs in O((n + m) log(n + m)) for old length `n`
//! and new length `m`.
//!
//! Identities must be unique within each list. Duplicate ids produce an
//! unspecified (but non-panicking) script. Items without an identity never
//! match, so they are always removed and inserted.

use crate::model::note::{Note, NoteId};
use std::collections::HashMap;
use std::hash::Hash;

/// Identity and content predicates used for matching.
pub trait DiffItem {
    type Id: Eq + Hash;

    /// Items with equal ids are the same entity. `None` marks an item with
    /// no identity yet; it never matches anything, itself included.
    fn item_id(&self) -> Option<Self::Id>;

    /// Same-entity items with equal content need no `Change`.
    fn same_content(&self, other: &Self) -> bool;
}

impl DiffItem for Note {
    type Id = NoteId;

    fn item_id(&self) -> Option<NoteId> {
        self.id
    }

    fn same_content(&self, other: &Self) -> bool {
        Note::same_content(self, other)
    }
}

/// One positional edit. Indices refer to the list as it stands when the
/// operation is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp<T> {
    Remove { index: usize },
    Insert { index: usize, item: T },
    /// Remove at `from`, then insert at `to` in the shortened list.
    Move { from: usize, to: usize },
    Change { index: usize, item: T },
}

/// Receiver of positional edits, e.g. a displayed list widget.
pub trait ListSink<T> {
    fn on_removed(&mut self, index: usize);
    fn on_inserted(&mut self, index: usize, item: &T);
    fn on_moved(&mut self, from: usize, to: usize);
    fn on_changed(&mut self, index: usize, item: &T);
}

impl<T: Clone> ListSink<T> for Vec<T> {
    fn on_removed(&mut self, index: usize) {
        self.remove(index);
    }

    fn on_inserted(&mut self, index: usize, item: &T) {
        self.insert(index, item.clone());
    }

    fn on_moved(&mut self, from: usize, to: usize) {
        let item = self.remove(from);
        self.insert(to, item);
    }

    fn on_changed(&mut self, index: usize, item: &T) {
        self[index] = item.clone();
    }
}

/// Ordered edit operations turning one snapshot into the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditScript<T> {
    ops: Vec<EditOp<T>>,
}

impl<T> Default for EditScript<T> {
    fn default() -> Self {
        Self { ops: Vec::new() }
    }
}

impl<T> EditScript<T> {
    pub fn ops(&self) -> &[EditOp<T>] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<EditOp<T>> {
        self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn inserts(&self) -> usize {
        self.count(|op| matches!(op, EditOp::Insert { .. }))
    }

    pub fn removes(&self) -> usize {
        self.count(|op| matches!(op, EditOp::Remove { .. }))
    }

    pub fn moves(&self) -> usize {
        self.count(|op| matches!(op, EditOp::Move { .. }))
    }

    pub fn changes(&self) -> usize {
        self.count(|op| matches!(op, EditOp::Change { .. }))
    }

    fn count(&self, predicate: impl Fn(&EditOp<T>) -> bool) -> usize {
        self.ops.iter().filter(|op| predicate(op)).count()
    }

    /// Feeds every operation, in order, to `sink`.
    pub fn replay<L: ListSink<T> + ?Sized>(&self, sink: &mut L) {
        for op in &self.ops {
            match op {
                EditOp::Remove { index } => sink.on_removed(*index),
                EditOp::Insert { index, item } => sink.on_inserted(*index, item),
                EditOp::Move { from, to } => sink.on_moved(*from, *to),
                EditOp::Change { index, item } => sink.on_changed(*index, item),
            }
        }
    }
}

impl<T: Clone> EditScript<T> {
    /// Applies the script to a plain vector.
    pub fn apply_to(&self, list: &mut Vec<T>) {
        self.replay(list);
    }
}

/// Computes the edit script turning `old` into `new`.
pub fn diff<T: DiffItem + Clone>(old: &[T], new: &[T]) -> EditScript<T> {
    let mut ops = Vec::new();

    let old_positions: HashMap<T::Id, usize> = old
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| item.item_id().map(|id| (id, idx)))
        .collect();
    let matched: Vec<Option<usize>> = new
        .iter()
        .map(|item| item.item_id().and_then(|id| old_positions.get(&id).copied()))
        .collect();

    let mut kept_old = vec![false; old.len()];
    for &old_idx in matched.iter().flatten() {
        kept_old[old_idx] = true;
    }

    for idx in (0..old.len()).rev() {
        if !kept_old[idx] {
            ops.push(EditOp::Remove { index: idx });
        }
    }

    let kept: Vec<(usize, usize)> = matched
        .iter()
        .enumerate()
        .filter_map(|(new_idx, old_idx)| old_idx.map(|old_idx| (new_idx, old_idx)))
        .collect();
    let old_order: Vec<usize> = kept.iter().map(|&(_, old_idx)| old_idx).collect();
    let stable = longest_increasing(&old_order);

    let mut anchored_new = vec![false; new.len()];
    let mut anchored_old = vec![false; old.len()];
    for (&(new_idx, old_idx), &is_stable) in kept.iter().zip(&stable) {
        if is_stable {
            anchored_new[new_idx] = true;
            anchored_old[old_idx] = true;
        }
    }

    let layout = SlotLayout::build(&anchored_new, &anchored_old, &kept_old);
    let mut present = Fenwick::new(layout.len);
    for (old_idx, slot) in layout.old_slots.iter().enumerate() {
        if kept_old[old_idx] {
            if let Some(slot) = slot {
                present.add(*slot, 1);
            }
        }
    }
    for (new_idx, slot) in layout.new_slots.iter().enumerate() {
        if anchored_new[new_idx] {
            present.add(*slot, 1);
        }
    }

    for (new_idx, item) in new.iter().enumerate() {
        if anchored_new[new_idx] {
            continue;
        }
        let target = layout.new_slots[new_idx];
        match matched[new_idx] {
            Some(old_idx) => {
                let Some(source) = layout.old_slots[old_idx] else {
                    continue;
                };
                let from = present.prefix(source);
                present.add(source, -1);
                let to = present.prefix(target);
                present.add(target, 1);
                if from != to {
                    ops.push(EditOp::Move { from, to });
                }
            }
            None => {
                let index = present.prefix(target);
                present.add(target, 1);
                ops.push(EditOp::Insert {
                    index,
                    item: item.clone(),
                });
            }
        }
    }

    for (new_idx, item) in new.iter().enumerate() {
        if let Some(old_idx) = matched[new_idx] {
            if !old[old_idx].same_content(item) {
                ops.push(EditOp::Change {
                    index: new_idx,
                    item: item.clone(),
                });
            }
        }
    }

    EditScript { ops }
}

/// Total order of every position an item can occupy during phase 2.
///
/// Per gap between consecutive stable items: the stable item, then the
/// final slots of items placed into that gap (new order), then the original
/// slots of movable items still waiting in that gap (old order). Placing an
/// item right after its new-list predecessor then always lands on its final
/// slot's rank among present slots.
struct SlotLayout {
    len: usize,
    /// Final slot of every new item (stable items have only this slot).
    new_slots: Vec<usize>,
    /// Original slot of kept, non-stable old items.
    old_slots: Vec<Option<usize>>,
}

impl SlotLayout {
    fn build(anchored_new: &[bool], anchored_old: &[bool], kept_old: &[bool]) -> Self {
        let mut new_slots = vec![0; anchored_new.len()];
        let mut old_slots = vec![None; anchored_old.len()];
        let mut next = 0;
        let mut new_cursor = 0;
        let mut old_cursor = 0;

        loop {
            while new_cursor < anchored_new.len() && !anchored_new[new_cursor] {
                new_slots[new_cursor] = next;
                next += 1;
                new_cursor += 1;
            }
            while old_cursor < anchored_old.len() && !anchored_old[old_cursor] {
                if kept_old[old_cursor] {
                    old_slots[old_cursor] = Some(next);
                    next += 1;
                }
                old_cursor += 1;
            }
            if new_cursor >= anchored_new.len() || old_cursor >= anchored_old.len() {
                break;
            }
            // Both cursors now sit on the same stable item.
            new_slots[new_cursor] = next;
            next += 1;
            new_cursor += 1;
            old_cursor += 1;
        }

        Self {
            len: next,
            new_slots,
            old_slots,
        }
    }
}

/// Marks the members of one longest strictly increasing subsequence.
fn longest_increasing(seq: &[usize]) -> Vec<bool> {
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];

    for (idx, &value) in seq.iter().enumerate() {
        let pos = tails.partition_point(|&tail| seq[tail] < value);
        if pos > 0 {
            prev[idx] = Some(tails[pos - 1]);
        }
        if pos == tails.len() {
            tails.push(idx);
        } else {
            tails[pos] = idx;
        }
    }

    let mut keep = vec![false; seq.len()];
    let mut cursor = tails.last().copied();
    while let Some(idx) = cursor {
        keep[idx] = true;
        cursor = prev[idx];
    }
    keep
}

/// Binary indexed tree counting present slots.
struct Fenwick {
    tree: Vec<i64>,
}

impl Fenwick {
    fn new(len: usize) -> Self {
        Self {
            tree: vec![0; len + 1],
        }
    }

    fn add(&mut self, slot: usize, delta: i64) {
        let mut idx = slot + 1;
        while idx < self.tree.len() {
            self.tree[idx] += delta;
            idx += idx & idx.wrapping_neg();
        }
    }

    /// Number of present slots strictly before `slot`.
    fn prefix(&self, slot: usize) -> usize {
        let mut idx = slot.min(self.tree.len().saturating_sub(1));
        let mut sum = 0;
        while idx > 0 {
            sum += self.tree[idx];
            idx -= idx & idx.wrapping_neg();
        }
        usize::try_from(sum).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::{diff, longest_increasing, DiffItem, EditOp, Fenwick};

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Row(u32, &'static str);

    impl DiffItem for Row {
        type Id = u32;

        fn item_id(&self) -> Option<u32> {
            Some(self.0)
        }

        fn same_content(&self, other: &Self) -> bool {
            self.1 == other.1
        }
    }

    fn rows(ids: &[u32]) -> Vec<Row> {
        ids.iter().map(|&id| Row(id, "x")).collect()
    }

    fn permutations(items: &[u32]) -> Vec<Vec<u32>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut out = Vec::new();
        for idx in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(idx);
            for mut tail in permutations(&rest) {
                tail.insert(0, head);
                out.push(tail);
            }
        }
        out
    }

    #[test]
    fn lis_marks_one_longest_run() {
        let keep = longest_increasing(&[3, 0, 4, 1, 2]);
        assert_eq!(keep.iter().filter(|k| **k).count(), 3);
        assert_eq!(keep, vec![false, true, false, true, true]);
        assert!(longest_increasing(&[]).is_empty());
    }

    #[test]
    fn fenwick_counts_present_slots() {
        let mut tree = Fenwick::new(5);
        tree.add(0, 1);
        tree.add(3, 1);
        assert_eq!(tree.prefix(0), 0);
        assert_eq!(tree.prefix(3), 1);
        assert_eq!(tree.prefix(5), 2);
        tree.add(0, -1);
        assert_eq!(tree.prefix(4), 1);
    }

    #[test]
    fn rotation_is_a_single_move() {
        let old = rows(&[1, 2, 3, 4]);
        let new = rows(&[2, 3, 4, 1]);
        let script = diff(&old, &new);
        assert_eq!(script.ops(), &[EditOp::Move { from: 0, to: 3 }]);
    }

    #[test]
    fn every_permutation_with_churn_round_trips_with_minimal_moves() {
        let base = [1, 2, 3, 4, 5];
        for perm in permutations(&base) {
            for removed in 0..=base.len() {
                let old = rows(&base);
                let mut new_ids: Vec<u32> = perm
                    .iter()
                    .copied()
                    .filter(|id| *id as usize != removed)
                    .collect();
                new_ids.insert(new_ids.len() / 2, 90);
                new_ids.push(91);
                let new = rows(&new_ids);

                let script = diff(&old, &new);
                let mut applied = old.clone();
                script.apply_to(&mut applied);
                assert_eq!(applied, new, "perm={perm:?} removed={removed}");

                let kept_positions: Vec<usize> = new_ids
                    .iter()
                    .filter_map(|id| base.iter().position(|b| b == id))
                    .collect();
                let lis = longest_increasing(&kept_positions)
                    .into_iter()
                    .filter(|keep| *keep)
                    .count();
                assert_eq!(script.moves(), kept_positions.len() - lis);
                assert_eq!(script.inserts(), 2);
                assert_eq!(script.removes(), usize::from(removed != 0));
            }
        }
    }

    #[test]
    fn content_change_is_reported_at_final_index() {
        let old = vec![Row(1, "a"), Row(2, "b")];
        let new = vec![Row(2, "b"), Row(1, "z")];
        let script = diff(&old, &new);
        assert_eq!(script.moves(), 1);
        assert_eq!(
            script.ops().last(),
            Some(&EditOp::Change {
                index: 1,
                item: Row(1, "z"),
            })
        );
    }
}
