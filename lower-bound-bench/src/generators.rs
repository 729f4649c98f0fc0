use crate::values::{generate, Order, ValueType};
use rand::{rngs::SmallRng, SeedableRng};
use std::marker::PhantomData;

/// Seeded source of datasets for a single benchmark case
#[derive(Clone)]
pub struct DatasetGenerator<V> {
    rng: SmallRng,
    quantity: usize,
    order: Order,
    _type: PhantomData<V>,
}

impl<V: ValueType> DatasetGenerator<V> {
    pub fn new(quantity: usize, order: Order) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(42),
            quantity,
            order,
            _type: PhantomData,
        }
    }

    pub fn quantity(&self) -> usize {
        self.quantity
    }

    pub fn next_dataset(&mut self) -> Vec<V> {
        generate(self.quantity, self.order, &mut self.rng)
    }

    /// Generates `count` independent datasets
    pub fn datasets(&mut self, count: usize) -> Vec<Vec<V>> {
        (0..count).map(|_| self.next_dataset()).collect()
    }

    pub fn sync(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_synced_generators_agree() {
        let mut a = DatasetGenerator::<u64>::new(100, Order::Random);
        let mut b = DatasetGenerator::<u64>::new(100, Order::Random);
        a.sync(3);
        b.sync(3);
        assert_eq!(a.datasets(4), b.datasets(4));
    }

    #[test]
    fn check_datasets_are_independent() {
        let mut generator = DatasetGenerator::<u32>::new(1000, Order::Random);
        let datasets = generator.datasets(2);
        assert_eq!(datasets.len(), 2);
        assert!(datasets.iter().all(|d| d.len() == 1000));
        assert_ne!(datasets[0], datasets[1]);
    }
}
