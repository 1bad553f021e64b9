//! # Closeable Iteration
//!
//! Read results may hold backend resources (open transactions, cursors,
//! buffers), so every result iterator can be closed explicitly.
//!
//! [`UnionIterator`] is the federation's merged read result: it walks the
//! per-graph iterators lazily, one after another, and closing it closes every
//! per-graph iterator, including the ones not yet reached. Dropping an
//! iterator closes it too.

use crate::element::Element;
use std::collections::VecDeque;

/// An iterator over backend resources that can be released early.
pub trait CloseableIterator: Iterator + Send {
    /// Release backend resources. After closing, `next` returns `None`.
    ///
    /// Closing twice is harmless.
    fn close(&mut self);
}

impl<I: CloseableIterator + ?Sized> CloseableIterator for Box<I> {
    fn close(&mut self) {
        (**self).close();
    }
}

/// Boxed element result, as returned by backends and by the federation.
pub type ElementIterator = Box<dyn CloseableIterator<Item = Element>>;

// =============================================================================
// VEC ITERATOR
// =============================================================================

/// A closeable iterator over already materialised items.
#[derive(Debug)]
pub struct VecIterator<T> {
    items: std::vec::IntoIter<T>,
}

impl<T> VecIterator<T> {
    #[must_use]
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: items.into_iter(),
        }
    }
}

impl<T: Send> Iterator for VecIterator<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.items.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl<T: Send> CloseableIterator for VecIterator<T> {
    fn close(&mut self) {
        self.items = Vec::new().into_iter();
    }
}

// =============================================================================
// UNION ITERATOR
// =============================================================================

/// Lazy concatenation of several closeable iterators.
pub struct UnionIterator<T> {
    parts: VecDeque<Box<dyn CloseableIterator<Item = T>>>,
}

impl<T> std::fmt::Debug for UnionIterator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnionIterator")
            .field("open_parts", &self.parts.len())
            .finish()
    }
}

impl<T> UnionIterator<T> {
    #[must_use]
    pub fn new(parts: Vec<Box<dyn CloseableIterator<Item = T>>>) -> Self {
        Self {
            parts: parts.into(),
        }
    }

    /// Number of per-graph iterators not yet exhausted or closed.
    #[must_use]
    pub fn open_parts(&self) -> usize {
        self.parts.len()
    }
}

impl<T: Send> Iterator for UnionIterator<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        while let Some(front) = self.parts.front_mut() {
            if let Some(item) = front.next() {
                return Some(item);
            }
            if let Some(mut exhausted) = self.parts.pop_front() {
                exhausted.close();
            }
        }
        None
    }
}

impl<T: Send> CloseableIterator for UnionIterator<T> {
    fn close(&mut self) {
        while let Some(mut part) = self.parts.pop_front() {
            part.close();
        }
    }
}

impl<T> Drop for UnionIterator<T> {
    fn drop(&mut self) {
        while let Some(mut part) = self.parts.pop_front() {
            part.close();
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
