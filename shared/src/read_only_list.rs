//! # `ReadOnlyList` – the public face of a mirrored list
//!
//! The engine mutates its backing `Vec` freely, but everything it hands out
//! goes through this wrapper. Reads delegate to the backing store and always
//! see its state at call time. Every mutator exists only to fail with
//! [`SyncError::UnsupportedMutation`]: a caller editing the mirror directly
//! would silently desynchronize it from the remote source.
//!
//! The wrapper never reaches the backing store's mutable API, so the
//! rejection is unconditional, including through its iterators.

use std::{fmt, iter::FusedIterator, ops::Deref, slice};

use crate::SyncError;

fn unsupported(operation: &'static str) -> SyncError {
    SyncError::UnsupportedMutation { operation }
}

/// Read-only view over a backing `Vec<T>`.
///
/// `B` is anything that derefs to the vector: a plain `&Vec<T>`, or a lock
/// guard held for as long as the view lives.
pub struct ReadOnlyList<B> {
    backing: B,
}

impl<B> ReadOnlyList<B> {
    pub fn new(backing: B) -> Self {
        Self { backing }
    }
}

impl<T, B> ReadOnlyList<B>
where
    B: Deref<Target = Vec<T>>,
{
    // Observation

    pub fn len(&self) -> usize {
        self.backing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backing.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.backing.get(index)
    }

    pub fn first(&self) -> Option<&T> {
        self.backing.first()
    }

    pub fn last(&self) -> Option<&T> {
        self.backing.last()
    }

    pub fn as_slice(&self) -> &[T] {
        self.backing.as_slice()
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            inner: self.backing.iter(),
        }
    }

    /// Bidirectional cursor positioned before the first element.
    pub fn list_iter(&self) -> ListIter<'_, T> {
        ListIter {
            items: self.backing.as_slice(),
            cursor: 0,
        }
    }

    /// Bidirectional cursor positioned before `index`. `index == len()` is
    /// allowed and yields a cursor at the tail.
    pub fn list_iter_at(&self, index: usize) -> Result<ListIter<'_, T>, SyncError> {
        let len = self.backing.len();
        if index > len {
            return Err(SyncError::IndexOutOfBounds { index, len });
        }
        Ok(ListIter {
            items: self.backing.as_slice(),
            cursor: index,
        })
    }

    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.backing.to_vec()
    }

    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.backing.contains(item)
    }

    pub fn contains_all(&self, items: &[T]) -> bool
    where
        T: PartialEq,
    {
        items.iter().all(|item| self.backing.contains(item))
    }

    pub fn index_of(&self, item: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.backing.iter().position(|candidate| candidate == item)
    }

    pub fn last_index_of(&self, item: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.backing.iter().rposition(|candidate| candidate == item)
    }

    // Mutation, always rejected

    pub fn push(&mut self, _item: T) -> Result<(), SyncError> {
        Err(unsupported("push"))
    }

    pub fn insert(&mut self, _index: usize, _item: T) -> Result<(), SyncError> {
        Err(unsupported("insert"))
    }

    pub fn remove(&mut self, _index: usize) -> Result<T, SyncError> {
        Err(unsupported("remove"))
    }

    pub fn remove_item(&mut self, _item: &T) -> Result<bool, SyncError> {
        Err(unsupported("remove_item"))
    }

    pub fn set(&mut self, _index: usize, _item: T) -> Result<T, SyncError> {
        Err(unsupported("set"))
    }

    pub fn clear(&mut self) -> Result<(), SyncError> {
        Err(unsupported("clear"))
    }

    pub fn extend<I: IntoIterator<Item = T>>(&mut self, _items: I) -> Result<(), SyncError> {
        Err(unsupported("extend"))
    }

    pub fn insert_all<I: IntoIterator<Item = T>>(
        &mut self,
        _index: usize,
        _items: I,
    ) -> Result<(), SyncError> {
        Err(unsupported("insert_all"))
    }

    pub fn remove_all(&mut self, _items: &[T]) -> Result<bool, SyncError> {
        Err(unsupported("remove_all"))
    }

    pub fn retain_all(&mut self, _items: &[T]) -> Result<bool, SyncError> {
        Err(unsupported("retain_all"))
    }

    pub fn retain<F: FnMut(&T) -> bool>(&mut self, _keep: F) -> Result<(), SyncError> {
        Err(unsupported("retain"))
    }
}

impl<T: fmt::Debug, B: Deref<Target = Vec<T>>> fmt::Debug for ReadOnlyList<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.backing.iter()).finish()
    }
}

impl<T, A, B> PartialEq<ReadOnlyList<B>> for ReadOnlyList<A>
where
    T: PartialEq,
    A: Deref<Target = Vec<T>>,
    B: Deref<Target = Vec<T>>,
{
    fn eq(&self, other: &ReadOnlyList<B>) -> bool {
        self.backing.as_slice() == other.backing.as_slice()
    }
}

impl<'a, T: 'a, B> IntoIterator for &'a ReadOnlyList<B>
where
    B: Deref<Target = Vec<T>>,
{
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Forward/backward iterator over a [`ReadOnlyList`].
pub struct Iter<'a, T> {
    inner: slice::Iter<'a, T>,
}

impl<T> Iter<'_, T> {
    /// Removal through the iterator is rejected like any other mutation.
    pub fn remove(&mut self) -> Result<(), SyncError> {
        Err(unsupported("iterator remove"))
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
impl<T> FusedIterator for Iter<'_, T> {}

/// Cursor that walks a [`ReadOnlyList`] in both directions.
///
/// The cursor sits between elements: `next` yields the element after it and
/// advances, `previous` steps back and yields the element it stepped over.
pub struct ListIter<'a, T> {
    items: &'a [T],
    cursor: usize,
}

impl<'a, T> ListIter<'a, T> {
    pub fn has_next(&self) -> bool {
        self.cursor < self.items.len()
    }

    pub fn has_previous(&self) -> bool {
        self.cursor > 0
    }

    pub fn previous(&mut self) -> Option<&'a T> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.items.get(self.cursor)
    }

    /// Index of the element `next` would return.
    pub fn next_index(&self) -> usize {
        self.cursor
    }

    /// Index of the element `previous` would return, `None` at the head.
    pub fn previous_index(&self) -> Option<usize> {
        self.cursor.checked_sub(1)
    }

    pub fn remove(&mut self) -> Result<(), SyncError> {
        Err(unsupported("iterator remove"))
    }

    pub fn set(&mut self, _item: T) -> Result<(), SyncError> {
        Err(unsupported("iterator set"))
    }

    pub fn add(&mut self, _item: T) -> Result<(), SyncError> {
        Err(unsupported("iterator add"))
    }
}

impl<'a, T> Iterator for ListIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.items.get(self.cursor)?;
        self.cursor += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.items.len() - self.cursor;
        (remaining, Some(remaining))
    }
}
