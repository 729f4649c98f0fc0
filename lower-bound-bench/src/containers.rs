//! Container adapters turning an unordered dataset into a searchable haystack
//!
//! Each adapter uses the conversion idiomatic for its storage: [`VectorContainer`] sorts the dataset in place,
//! while [`SetContainer`] inserts elements one by one into an ordered tree. The difference in conversion cost is
//! part of what benchmarks are comparing.

use std::{collections::BTreeMap, iter, ops::Bound};

/// Sorted container supporting lower-bound queries
pub trait SortedContainer<T> {
    /// Returns the first element not less than `needle` or `None` if there is no such element
    fn lower_bound(&self, needle: &T) -> Option<&T>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over all elements in ascending order (duplicates included)
    fn iter(&self) -> Box<dyn Iterator<Item = &T> + '_>;
}

/// Container strategy
pub trait ContainerKind: 'static {
    /// Stable name used in benchmark names
    const NAME: &'static str;

    type Container<T: Ord>: SortedContainer<T>;

    /// Consumes unordered values and builds a container holding the same elements in ascending order
    fn sorted_from<T: Ord>(values: Vec<T>) -> Self::Container<T>;
}

/// Position of the first element not less than `needle` in a sorted slice
///
/// Returns `sorted.len()` if all the elements are less than `needle`.
#[inline]
pub fn lower_bound_index<T: Ord>(sorted: &[T], needle: &T) -> usize {
    sorted.partition_point(|v| v < needle)
}

pub struct VectorContainer;

impl ContainerKind for VectorContainer {
    const NAME: &'static str = "Vector";

    type Container<T: Ord> = Vec<T>;

    fn sorted_from<T: Ord>(mut values: Vec<T>) -> Vec<T> {
        values.sort_unstable();
        values
    }
}

impl<T: Ord> SortedContainer<T> for Vec<T> {
    #[inline]
    fn lower_bound(&self, needle: &T) -> Option<&T> {
        self.get(lower_bound_index(self, needle))
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        Box::new(self.as_slice().iter())
    }
}

pub struct SetContainer;

impl ContainerKind for SetContainer {
    const NAME: &'static str = "Set";

    type Container<T: Ord> = MultiSet<T>;

    fn sorted_from<T: Ord>(values: Vec<T>) -> MultiSet<T> {
        values.into_iter().collect()
    }
}

/// Ordered multiset backed by [`BTreeMap`]
///
/// Equal elements are stored once along with the number of occurrences.
#[derive(Clone, Debug)]
pub struct MultiSet<T> {
    items: BTreeMap<T, usize>,
    len: usize,
}

impl<T: Ord> MultiSet<T> {
    pub fn new() -> Self {
        Self {
            items: BTreeMap::new(),
            len: 0,
        }
    }

    pub fn insert(&mut self, value: T) {
        *self.items.entry(value).or_insert(0) += 1;
        self.len += 1;
    }

    /// Number of occurrences of a given value
    pub fn count(&self, value: &T) -> usize {
        self.items.get(value).copied().unwrap_or(0)
    }
}

impl<T: Ord> Default for MultiSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord> FromIterator<T> for MultiSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

impl<T: Ord> SortedContainer<T> for MultiSet<T> {
    #[inline]
    fn lower_bound(&self, needle: &T) -> Option<&T> {
        self.items
            .range((Bound::Included(needle), Bound::Unbounded))
            .next()
            .map(|(value, _)| value)
    }

    fn len(&self) -> usize {
        self.len
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        Box::new(
            self.items
                .iter()
                .flat_map(|(value, &count)| iter::repeat(value).take(count)),
        )
    }
}

/// Closed list of container strategies benchmarks are registered for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContainerTag {
    Vector,
    Set,
}

impl ContainerTag {
    pub const ALL: [ContainerTag; 2] = [ContainerTag::Vector, ContainerTag::Set];

    pub fn name(self) -> &'static str {
        match self {
            ContainerTag::Vector => VectorContainer::NAME,
            ContainerTag::Set => SetContainer::NAME,
        }
    }
}
