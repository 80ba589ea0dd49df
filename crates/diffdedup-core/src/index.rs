//! Source-index renumbering.
//!
//! Upstream addresses elements by their current position in the input
//! sequence. Inserting or removing an element shifts every later position by
//! one, exactly like splicing an array. Anything that stores source positions
//! has to follow those shifts or its lookups go stale.
//!
//! Renumbering is monotone: it never swaps the relative order of two stored
//! positions, so sorted structures keyed by position stay sorted.

/// A single-element splice of the source sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Splice {
    /// An element is placed at this position; positions at or after it move up
    Insert(usize),
    /// The element at this position left; positions after it move down
    Remove(usize),
}

impl Splice {
    /// Map a stored position from before the splice to after it.
    ///
    /// For [`Splice::Remove`] the removed position must already be gone from
    /// the store; it maps to itself.
    #[must_use]
    pub fn apply(self, id: usize) -> usize {
        match self {
            Splice::Insert(at) if id >= at => id + 1,
            Splice::Remove(at) if id > at => id - 1,
            _ => id,
        }
    }
}

/// A store of source positions that follows splices of the input sequence.
pub trait SourceIndex {
    /// Rewrite every stored source position through `splice`.
    fn renumber(&mut self, splice: Splice);
}
