//! Document-at-a-time evaluation over lock-step cursors.
//!
//! Each node of the expression tree becomes a cursor positioned on its
//! smallest matching doc id. `NOT` has no bounded streaming form, so its
//! operand is drained and the complement materialized against all doc ids.

use super::intersect::{difference, has_consecutive_run, seek};
use super::parser::Expr;
use crate::index::{DocId, InvertedIndex, Position, Posting, SkipTable};

trait Cursor {
    /// Current doc id, `None` once exhausted.
    fn doc(&self) -> Option<DocId>;

    fn advance(&mut self);

    /// Move to the first doc id `>= target`. Never moves backwards.
    fn seek(&mut self, target: DocId);
}

impl<C: Cursor + ?Sized> Cursor for Box<C> {
    fn doc(&self) -> Option<DocId> {
        (**self).doc()
    }
    fn advance(&mut self) {
        (**self).advance()
    }
    fn seek(&mut self, target: DocId) {
        (**self).seek(target)
    }
}

struct PostingsCursor<'a> {
    postings: &'a [Posting],
    skips: Option<&'a SkipTable>,
    idx: usize,
}

impl<'a> PostingsCursor<'a> {
    fn positions(&self) -> &'a [Position] {
        self.postings.get(self.idx).map(|p| p.positions.as_slice()).unwrap_or(&[])
    }
}

impl Cursor for PostingsCursor<'_> {
    fn doc(&self) -> Option<DocId> {
        self.postings.get(self.idx).map(|p| p.doc_id)
    }

    fn advance(&mut self) {
        self.idx += 1;
    }

    fn seek(&mut self, target: DocId) {
        self.idx = seek(self.postings, self.skips, self.idx, target);
    }
}

struct ListCursor {
    docs: Vec<DocId>,
    idx: usize,
}

impl Cursor for ListCursor {
    fn doc(&self) -> Option<DocId> {
        self.docs.get(self.idx).copied()
    }

    fn advance(&mut self) {
        self.idx += 1;
    }

    fn seek(&mut self, target: DocId) {
        self.idx = seek(self.docs.as_slice(), None, self.idx, target);
    }
}

/// Move every cursor to the next doc id they all share, starting from the
/// first cursor's current doc.
fn align<C: Cursor>(cursors: &mut [C]) -> Option<DocId> {
    let mut target = cursors.first()?.doc()?;
    loop {
        let mut agreed = true;
        for cursor in cursors.iter_mut() {
            cursor.seek(target);
            match cursor.doc() {
                None => return None,
                Some(doc) if doc > target => {
                    target = doc;
                    agreed = false;
                }
                Some(_) => {}
            }
        }
        if agreed {
            return Some(target);
        }
    }
}

struct AndCursor<'a> {
    children: Vec<Box<dyn Cursor + 'a>>,
    current: Option<DocId>,
}

impl<'a> AndCursor<'a> {
    fn new(children: Vec<Box<dyn Cursor + 'a>>) -> Self {
        let mut cursor = Self { children, current: None };
        cursor.current = align(&mut cursor.children);
        cursor
    }
}

impl Cursor for AndCursor<'_> {
    fn doc(&self) -> Option<DocId> {
        self.current
    }

    fn advance(&mut self) {
        if self.current.is_none() {
            return;
        }
        self.children[0].advance();
        self.current = align(&mut self.children);
    }

    fn seek(&mut self, target: DocId) {
        if self.current.is_some_and(|d| d < target) {
            self.children[0].seek(target);
            self.current = align(&mut self.children);
        }
    }
}

struct OrCursor<'a> {
    children: Vec<Box<dyn Cursor + 'a>>,
}

impl Cursor for OrCursor<'_> {
    fn doc(&self) -> Option<DocId> {
        self.children.iter().filter_map(|c| c.doc()).min()
    }

    fn advance(&mut self) {
        let Some(current) = self.doc() else { return };
        for child in &mut self.children {
            if child.doc() == Some(current) {
                child.advance();
            }
        }
    }

    fn seek(&mut self, target: DocId) {
        for child in &mut self.children {
            child.seek(target);
        }
    }
}

/// Conjunction of the phrase's term cursors, filtered by position alignment.
struct PhraseCursor<'a> {
    terms: Vec<PostingsCursor<'a>>,
    current: Option<DocId>,
}

impl<'a> PhraseCursor<'a> {
    fn new(terms: Vec<PostingsCursor<'a>>) -> Self {
        let mut cursor = Self { terms, current: None };
        cursor.settle();
        cursor
    }

    fn settle(&mut self) {
        loop {
            self.current = align(&mut self.terms);
            if self.current.is_none() {
                return;
            }
            let lists: Vec<&[Position]> = self.terms.iter().map(PostingsCursor::positions).collect();
            if has_consecutive_run(&lists) {
                return;
            }
            self.terms[0].advance();
        }
    }
}

impl Cursor for PhraseCursor<'_> {
    fn doc(&self) -> Option<DocId> {
        self.current
    }

    fn advance(&mut self) {
        if self.current.is_none() {
            return;
        }
        self.terms[0].advance();
        self.settle();
    }

    fn seek(&mut self, target: DocId) {
        if self.current.is_some_and(|d| d < target) {
            self.terms[0].seek(target);
            self.settle();
        }
    }
}

pub(crate) struct DocAtATime<'a> {
    index: &'a InvertedIndex,
    use_skips: bool,
}

impl<'a> DocAtATime<'a> {
    pub(crate) fn new(index: &'a InvertedIndex) -> Self {
        Self { index, use_skips: index.config.uses_skip_pointers() }
    }

    pub(crate) fn evaluate(&self, expr: &Expr) -> Vec<DocId> {
        drain(self.cursor(expr))
    }

    fn postings(&self, term: &str) -> Option<PostingsCursor<'a>> {
        let entry = self.index.term(term)?;
        let skips = if self.use_skips { entry.skips.as_ref() } else { None };
        Some(PostingsCursor { postings: &entry.postings, skips, idx: 0 })
    }

    fn cursor(&self, expr: &Expr) -> Box<dyn Cursor + 'a> {
        match expr {
            Expr::Term(term) => match self.postings(term) {
                Some(cursor) => Box::new(cursor),
                None => empty(),
            },
            Expr::Phrase(words) => {
                match words.iter().map(|w| self.postings(w)).collect::<Option<Vec<_>>>() {
                    Some(terms) if !terms.is_empty() => Box::new(PhraseCursor::new(terms)),
                    _ => empty(),
                }
            }
            Expr::And(l, r) => Box::new(AndCursor::new(vec![self.cursor(l), self.cursor(r)])),
            Expr::Or(l, r) => Box::new(OrCursor { children: vec![self.cursor(l), self.cursor(r)] }),
            Expr::Not(e) => {
                let excluded = drain(self.cursor(e));
                Box::new(ListCursor { docs: difference(&self.index.all_docs, &excluded), idx: 0 })
            }
        }
    }
}

fn empty<'a>() -> Box<dyn Cursor + 'a> {
    Box::new(ListCursor { docs: Vec::new(), idx: 0 })
}

fn drain(mut cursor: Box<dyn Cursor + '_>) -> Vec<DocId> {
    let mut out = Vec::new();
    while let Some(doc) = cursor.doc() {
        out.push(doc);
        cursor.advance();
    }
    out
}
