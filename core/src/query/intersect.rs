//! Merge primitives over doc-id ordered lists.

use crate::index::{DocId, Position, Posting, SkipTable};
use std::cmp::Ordering;

/// Random access to the doc id at each slot of an ordered list.
pub trait DocList {
    fn len(&self) -> usize;
    fn doc_at(&self, idx: usize) -> DocId;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DocList for [DocId] {
    fn len(&self) -> usize {
        <[DocId]>::len(self)
    }

    fn doc_at(&self, idx: usize) -> DocId {
        self[idx]
    }
}

impl DocList for [Posting] {
    fn len(&self) -> usize {
        <[Posting]>::len(self)
    }

    fn doc_at(&self, idx: usize) -> DocId {
        self[idx].doc_id
    }
}

/// First index at or after `from` whose doc id is `>= target`.
///
/// While the current slot carries a skip pointer whose destination is still
/// `<= target`, follow it; otherwise step by one.
pub fn seek<L: DocList + ?Sized>(list: &L, skips: Option<&SkipTable>, from: usize, target: DocId) -> usize {
    let mut i = from;
    while i < list.len() && list.doc_at(i) < target {
        match skips.and_then(|s| s.target(i)) {
            Some(t) if list.doc_at(t) <= target => i = t,
            _ => i += 1,
        }
    }
    i
}

pub fn intersect_linear(a: &[DocId], b: &[DocId]) -> Vec<DocId> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
        }
    }
    out
}

pub fn intersect_with_skips<A, B>(a: &A, a_skips: &SkipTable, b: &B, b_skips: &SkipTable) -> Vec<DocId>
where
    A: DocList + ?Sized,
    B: DocList + ?Sized,
{
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (x, y) = (a.doc_at(i), b.doc_at(j));
        match x.cmp(&y) {
            Ordering::Equal => {
                out.push(x);
                i += 1;
                j += 1;
            }
            Ordering::Less => i = seek(a, Some(a_skips), i, y),
            Ordering::Greater => j = seek(b, Some(b_skips), j, x),
        }
    }
    out
}

pub fn union(a: &[DocId], b: &[DocId]) -> Vec<DocId> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
            Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Elements of `universe` not in `exclude`.
pub fn difference(universe: &[DocId], exclude: &[DocId]) -> Vec<DocId> {
    let mut out = Vec::with_capacity(universe.len().saturating_sub(exclude.len()));
    let mut j = 0;
    for &doc in universe {
        while j < exclude.len() && exclude[j] < doc {
            j += 1;
        }
        if exclude.get(j) != Some(&doc) {
            out.push(doc);
        }
    }
    out
}

/// True if some position `p` of the first list has `p + k` in the k-th list
/// for every following list.
pub fn has_consecutive_run(lists: &[&[Position]]) -> bool {
    let Some((first, rest)) = lists.split_first() else {
        return false;
    };
    first.iter().any(|&start| {
        rest.iter().enumerate().all(|(k, positions)| {
            start
                .checked_add(k as Position + 1)
                .is_some_and(|want| positions.binary_search(&want).is_ok())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sorted_set(max: u32, len: usize) -> impl Strategy<Value = Vec<DocId>> {
        proptest::collection::btree_set(0..max, 0..len).prop_map(|s| s.into_iter().collect())
    }

    #[test]
    fn skip_intersection_matches_known_answer() {
        let a: Vec<DocId> = (0..100).step_by(3).collect();
        let b: Vec<DocId> = vec![0, 4, 9, 10, 50, 51, 99];
        let got = intersect_with_skips(&a[..], &SkipTable::build(a.len()), &b[..], &SkipTable::build(b.len()));
        assert_eq!(got, vec![0, 9, 51, 99]);
    }

    #[test]
    fn seek_follows_skips_but_never_overshoots() {
        let list: Vec<DocId> = (0..64).map(|i| i * 2).collect();
        let skips = SkipTable::build(list.len());
        assert_eq!(seek(&list[..], Some(&skips), 0, 33), 17);
        assert_eq!(seek(&list[..], Some(&skips), 0, 32), 16);
        assert_eq!(seek(&list[..], Some(&skips), 0, 1000), list.len());
        assert_eq!(seek(&list[..], None, 5, 0), 5);
    }

    #[test]
    fn union_and_difference() {
        assert_eq!(union(&[1, 3, 5], &[2, 3, 6]), vec![1, 2, 3, 5, 6]);
        assert_eq!(difference(&[1, 2, 3, 4, 5], &[2, 4, 9]), vec![1, 3, 5]);
        assert_eq!(difference(&[1, 2], &[]), vec![1, 2]);
    }

    #[test]
    fn consecutive_run_detection() {
        assert!(has_consecutive_run(&[&[0, 4], &[1, 7]]));
        assert!(has_consecutive_run(&[&[4], &[5], &[6]]));
        assert!(!has_consecutive_run(&[&[0, 4], &[2, 7]]));
        assert!(!has_consecutive_run(&[&[4], &[5], &[7]]));
        assert!(has_consecutive_run(&[&[3]]));
        assert!(!has_consecutive_run(&[]));
        assert!(!has_consecutive_run(&[&[u32::MAX], &[0]]));
    }

    proptest! {
        #[test]
        fn skip_intersection_equals_linear(a in sorted_set(500, 200), b in sorted_set(500, 200)) {
            let fast = intersect_with_skips(&a[..], &SkipTable::build(a.len()), &b[..], &SkipTable::build(b.len()));
            prop_assert_eq!(fast, intersect_linear(&a, &b));
        }

        #[test]
        fn seek_equals_linear_scan(list in sorted_set(1000, 300), from in 0usize..300, target in 0u32..1100) {
            let from = from.min(list.len());
            let expected = (from..list.len()).find(|&i| list[i] >= target).unwrap_or(list.len());
            prop_assert_eq!(seek(&list[..], Some(&SkipTable::build(list.len())), from, target), expected);
        }

        #[test]
        fn union_is_sorted_set_union(a in sorted_set(200, 80), b in sorted_set(200, 80)) {
            let mut expected: Vec<DocId> = a.iter().chain(&b).copied().collect();
            expected.sort_unstable();
            expected.dedup();
            prop_assert_eq!(union(&a, &b), expected);
        }
    }
}
