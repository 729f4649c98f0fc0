//! Inputs prepared ahead of measurement
//!
//! A [`PreparedInput`] owns a sorted haystack and a fixed ring of needles sampled from the same dataset, so the
//! measured loop does nothing but pick the next needle and search for it.

use crate::{
    containers::{ContainerKind, SortedContainer},
    Error,
};

/// Number of needles sampled from every dataset
pub const NEEDLE_CAPACITY: usize = 512;

/// Fixed set of needles visited in round-robin order
#[derive(Clone, Debug)]
pub struct NeedleRing<V> {
    needles: Vec<V>,
    cursor: usize,
}

impl<V: Clone> NeedleRing<V> {
    /// Samples [`NEEDLE_CAPACITY`] needles spread across the dataset
    pub fn sample(dataset: &[V]) -> Result<Self, Error> {
        Self::with_capacity(dataset, NEEDLE_CAPACITY)
    }

    /// Samples `capacity` needles taking every `max(1, n / capacity)`-th element (wrapping around)
    ///
    /// Datasets smaller than `capacity` yield repeated needles.
    pub fn with_capacity(dataset: &[V], capacity: usize) -> Result<Self, Error> {
        assert!(capacity > 0, "Needle ring should have at least one slot");
        let n = dataset.len();
        if n == 0 {
            return Err(Error::EmptyDataset);
        }
        let stride = (n / capacity).max(1);
        let needles = (0..capacity)
            .map(|i| dataset[i * stride % n].clone())
            .collect();
        Ok(Self { needles, cursor: 0 })
    }
}

impl<V> NeedleRing<V> {
    /// Returns the needle under the cursor and advances the cursor
    #[inline]
    pub fn next_needle(&mut self) -> &V {
        let idx = self.cursor;
        self.cursor = (idx + 1) % self.needles.len();
        &self.needles[idx]
    }

    pub fn capacity(&self) -> usize {
        self.needles.len()
    }

    pub fn as_slice(&self) -> &[V] {
        &self.needles
    }
}

/// Sorted haystack along with the needles to search in it
pub struct PreparedInput<C: ContainerKind, V: Ord> {
    pub haystack: C::Container<V>,
    pub needles: NeedleRing<V>,
}

impl<C: ContainerKind, V: Ord + Clone> PreparedInput<C, V> {
    pub fn prepare(dataset: Vec<V>) -> Result<Self, Error> {
        let needles = NeedleRing::sample(&dataset)?;
        let haystack = C::sorted_from(dataset);
        Ok(Self { haystack, needles })
    }
}

impl<C: ContainerKind, V: Ord> PreparedInput<C, V> {
    /// Searches for the next needle in the haystack
    #[inline]
    pub fn search(&mut self) -> Option<&V> {
        let needle = self.needles.next_needle();
        self.haystack.lower_bound(needle)
    }
}

/// Builds one [`PreparedInput`] per dataset preserving the order of datasets
pub fn prepare_inputs<C, V>(datasets: Vec<Vec<V>>) -> Result<Vec<PreparedInput<C, V>>, Error>
where
    C: ContainerKind,
    V: Ord + Clone,
{
    datasets
        .into_iter()
        .map(PreparedInput::<C, V>::prepare)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        containers::{SetContainer, VectorContainer},
        generators::DatasetGenerator,
        values::Order,
    };

    #[test]
    fn check_needles_come_from_dataset() {
        let mut generator = DatasetGenerator::<u64>::new(10_000, Order::Random);
        let dataset = generator.next_dataset();
        let mut ring = NeedleRing::sample(&dataset).unwrap();
        for _ in 0..2 * NEEDLE_CAPACITY {
            assert!(dataset.contains(ring.next_needle()));
        }
    }

    #[test]
    fn check_needles_are_spread_with_stride() {
        let dataset = (0..2048u32).collect::<Vec<_>>();
        let ring = NeedleRing::sample(&dataset).unwrap();
        let expected = (0..512u32).map(|i| i * 4).collect::<Vec<_>>();
        assert_eq!(ring.as_slice(), expected.as_slice());
    }

    #[test]
    fn check_cursor_period_equals_capacity() {
        for n in [1, 3, 511, 512, 513, 5000] {
            let dataset = (0..n as u32).collect::<Vec<_>>();
            let mut ring = NeedleRing::sample(&dataset).unwrap();
            assert_eq!(ring.capacity(), NEEDLE_CAPACITY);

            let first_round = (0..NEEDLE_CAPACITY)
                .map(|_| *ring.next_needle())
                .collect::<Vec<_>>();
            let second_round = (0..NEEDLE_CAPACITY)
                .map(|_| *ring.next_needle())
                .collect::<Vec<_>>();
            assert_eq!(first_round, second_round, "n = {}", n);
        }
    }

    #[test]
    fn check_small_datasets_repeat_needles() {
        let ring = NeedleRing::sample(&[7u32, 3, 5]).unwrap();
        assert_eq!(ring.capacity(), NEEDLE_CAPACITY);
        assert_eq!(&ring.as_slice()[..6], &[7, 3, 5, 7, 3, 5]);

        let single = NeedleRing::sample(&[42u32]).unwrap();
        assert!(single.as_slice().iter().all(|v| *v == 42));
    }

    #[test]
    fn check_empty_dataset_is_rejected() {
        assert!(matches!(
            NeedleRing::<u32>::sample(&[]),
            Err(Error::EmptyDataset)
        ));
        assert!(prepare_inputs::<VectorContainer, u32>(vec![vec![1], vec![]]).is_err());
    }

    #[test]
    fn check_prepared_inputs_preserve_order() {
        let datasets = vec![vec![3u32, 1, 2], vec![30, 10, 20]];
        let inputs = prepare_inputs::<SetContainer, _>(datasets).unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].haystack.iter().copied().collect::<Vec<_>>(), [1, 2, 3]);
        assert_eq!(inputs[1].haystack.iter().copied().collect::<Vec<_>>(), [10, 20, 30]);
    }

    #[test]
    fn check_search_finds_needles() {
        let mut generator = DatasetGenerator::<String>::new(700, Order::Random);
        let datasets = generator.datasets(3);
        let mut inputs = prepare_inputs::<VectorContainer, _>(datasets).unwrap();
        for input in inputs.iter_mut() {
            for _ in 0..NEEDLE_CAPACITY {
                let expected = input.needles.as_slice()[input_cursor(input)].clone();
                assert_eq!(input.search(), Some(&expected));
            }
        }
    }

    fn input_cursor<C: ContainerKind, V: Ord>(input: &PreparedInput<C, V>) -> usize {
        input.needles.cursor
    }
}
