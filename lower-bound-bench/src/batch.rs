/// Defines how logical iterations are accounted for in a single pass over all replicas
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BatchSize {
    /// Each processed element counts as an iteration
    CountElements,

    /// Each replica counts as an iteration
    #[default]
    CountBatch,
}

/// Number of replicas prepared for a case and the number of iterations one pass over them represents
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchPolicy {
    pub size: BatchSize,

    /// Approximate number of elements across all replicas of a case
    pub target_elements: usize,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            size: BatchSize::CountBatch,
            target_elements: 1_000,
        }
    }
}

impl BatchPolicy {
    pub fn new(size: BatchSize) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    /// Number of independent datasets to prepare. Small datasets are replicated so that
    /// a single pass does a meaningful amount of work.
    pub fn replicas(&self, quantity: usize) -> usize {
        self.target_elements
            .checked_div(quantity)
            .unwrap_or(self.target_elements)
            .max(1)
    }

    /// Number of logical iterations performed by a single pass over all replicas
    pub fn batch(&self, quantity: usize) -> usize {
        let replicas = self.replicas(quantity);
        match self.size {
            BatchSize::CountElements => replicas * quantity,
            BatchSize::CountBatch => replicas,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_replicas() {
        let policy = BatchPolicy::default();
        assert_eq!(policy.replicas(1), 1000);
        assert_eq!(policy.replicas(16), 62);
        assert_eq!(policy.replicas(1000), 1);
        assert_eq!(policy.replicas(1 << 18), 1);
    }

    #[test]
    fn check_batch_sizes() {
        let batch = BatchPolicy::new(BatchSize::CountBatch);
        assert_eq!(batch.batch(16), 62);
        assert_eq!(batch.batch(1 << 18), 1);

        let elements = BatchPolicy::new(BatchSize::CountElements);
        assert_eq!(elements.batch(16), 62 * 16);
        assert_eq!(elements.batch(1 << 18), 1 << 18);
    }
}
