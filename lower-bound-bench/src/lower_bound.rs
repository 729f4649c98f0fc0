//! Lower-bound benchmark cases
//!
//! Two strategies of keeping setup out of the measured region are provided:
//!
//! - [`PrecomputedLowerBound`] sorts all the datasets and samples needles before measurement starts. The measured
//!   loop only takes the next needle and searches for it;
//! - [`InlineLowerBound`] builds a fresh haystack from a raw copy of a dataset on every iteration, pausing the timer
//!   around needle selection and conversion.

use crate::{
    batch::BatchPolicy,
    containers::{ContainerKind, SortedContainer},
    generators::DatasetGenerator,
    input::{prepare_inputs, PreparedInput},
    registry::CaseFactory,
    replay::{run_op_on_copies, run_op_on_inputs},
    values::{Order, ValueType},
    BenchmarkCase, Error, Named, State,
};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::{hint::black_box, marker::PhantomData, mem};

pub const NAME_PREFIX: &str = "BM_LowerBound";

/// Mixed into the run seed so that needle selection does not replay the dataset shuffle
const NEEDLE_SEED_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

fn needle_rng(seed: u64) -> SmallRng {
    SmallRng::seed_from_u64(seed ^ NEEDLE_SEED_SALT)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    Precomputed,
    Inline,
}

/// Creates lower-bound cases for every registered combination
#[derive(Clone, Copy, Debug)]
pub struct LowerBound {
    pub strategy: Strategy,
    pub order: Order,
    pub batch: BatchPolicy,
}

impl LowerBound {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            order: Order::Random,
            batch: BatchPolicy::default(),
        }
    }
}

impl CaseFactory for LowerBound {
    fn prefix(&self) -> &str {
        NAME_PREFIX
    }

    fn build<V: ValueType, C: ContainerKind>(
        &self,
        name: String,
        quantity: usize,
    ) -> Box<dyn BenchmarkCase> {
        match self.strategy {
            Strategy::Precomputed => Box::new(PrecomputedLowerBound::<V, C>::new(
                name,
                quantity,
                self.order,
                self.batch,
            )),
            Strategy::Inline => Box::new(InlineLowerBound::<V, C>::new(
                name,
                quantity,
                self.order,
                self.batch,
            )),
        }
    }
}

pub struct PrecomputedLowerBound<V: ValueType, C: ContainerKind> {
    name: String,
    batch: BatchPolicy,
    generator: DatasetGenerator<V>,
    inputs: Option<Vec<PreparedInput<C, V>>>,
}

impl<V: ValueType, C: ContainerKind> PrecomputedLowerBound<V, C> {
    pub fn new(name: String, quantity: usize, order: Order, batch: BatchPolicy) -> Self {
        Self {
            name,
            batch,
            generator: DatasetGenerator::new(quantity, order),
            inputs: None,
        }
    }
}

impl<V: ValueType, C: ContainerKind> Named for PrecomputedLowerBound<V, C> {
    fn name(&self) -> &str {
        &self.name
    }
}

impl<V: ValueType, C: ContainerKind> BenchmarkCase for PrecomputedLowerBound<V, C> {
    fn run(&mut self, state: &mut State) -> Result<(), Error> {
        let quantity = self.generator.quantity();
        let inputs = match self.inputs.take() {
            Some(inputs) => inputs,
            None => prepare_inputs(self.generator.datasets(self.batch.replicas(quantity)))?,
        };
        let inputs = self.inputs.insert(inputs);

        run_op_on_inputs(state, inputs, self.batch.batch(quantity), |input| {
            black_box(input.search());
        });
        Ok(())
    }

    fn prepare_state(&mut self, seed: u64) {
        self.generator.sync(seed);
        self.inputs = None;
    }
}

pub struct InlineLowerBound<V: ValueType, C: ContainerKind> {
    name: String,
    batch: BatchPolicy,
    generator: DatasetGenerator<V>,
    originals: Option<Vec<Vec<V>>>,
    rng: SmallRng,
    _container: PhantomData<C>,
}

impl<V: ValueType, C: ContainerKind> InlineLowerBound<V, C> {
    pub fn new(name: String, quantity: usize, order: Order, batch: BatchPolicy) -> Self {
        Self {
            name,
            batch,
            generator: DatasetGenerator::new(quantity, order),
            originals: None,
            rng: needle_rng(42),
            _container: PhantomData,
        }
    }
}

impl<V: ValueType, C: ContainerKind> Named for InlineLowerBound<V, C> {
    fn name(&self) -> &str {
        &self.name
    }
}

impl<V: ValueType, C: ContainerKind> BenchmarkCase for InlineLowerBound<V, C> {
    fn run(&mut self, state: &mut State) -> Result<(), Error> {
        let quantity = self.generator.quantity();
        let originals = match self.originals.take() {
            Some(originals) => originals,
            None => {
                let datasets = self.generator.datasets(self.batch.replicas(quantity));
                if datasets.iter().any(Vec::is_empty) {
                    return Err(Error::EmptyDataset);
                }
                datasets
            }
        };
        let originals = self.originals.insert(originals);
        let rng = &mut self.rng;

        run_op_on_copies(
            state,
            originals,
            self.batch.batch(quantity),
            |state, copy| search_in_copy::<V, C>(state, rng, copy),
        );
        Ok(())
    }

    fn prepare_state(&mut self, seed: u64) {
        self.generator.sync(seed);
        self.rng = needle_rng(seed);
        self.originals = None;
    }
}

/// Converts a raw copy into a haystack and searches it for one of the copy's own values
///
/// Only the search is measured. The needle and the haystack are returned, so the haystack gets dropped by the caller
/// outside of the timed region.
fn search_in_copy<V: ValueType, C: ContainerKind>(
    state: &mut State,
    rng: &mut SmallRng,
    copy: &mut Vec<V>,
) -> (V, C::Container<V>) {
    state.pause_timing();
    let needle = copy[rng.gen_range(0..copy.len())].clone();
    let haystack = C::sorted_from(mem::take(copy));
    state.resume_timing();

    black_box(haystack.lower_bound(&needle));
    (needle, haystack)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        containers::{SetContainer, VectorContainer},
        values::Float,
    };
    use rand::RngCore;
    use std::{thread, time::Duration};

    fn run_to_completion(case: &mut dyn BenchmarkCase, iterations: usize) -> State {
        let mut state = State::new(iterations);
        case.run(&mut state).unwrap();
        assert!(!state.is_timing());
        state
    }

    #[test]
    fn check_precomputed_case_runs() {
        let mut case = PrecomputedLowerBound::<u32, VectorContainer>::new(
            "case".into(),
            16,
            Order::Random,
            BatchPolicy::default(),
        );
        let state = run_to_completion(&mut case, 100);
        assert!(state.iterations() >= 100);
        assert_eq!(state.iterations() % 62, 0);

        let inputs = case.inputs.as_ref().unwrap();
        assert_eq!(inputs.len(), 62);
        assert!(inputs.iter().all(|i| i.haystack.len() == 16));
    }

    #[test]
    fn check_precomputed_inputs_are_reused_until_reseeded() {
        let mut case = PrecomputedLowerBound::<String, SetContainer>::new(
            "case".into(),
            2000,
            Order::Random,
            BatchPolicy::default(),
        );
        run_to_completion(&mut case, 1);
        let first = case.inputs.as_ref().unwrap()[0].needles.as_slice().to_vec();
        run_to_completion(&mut case, 1);
        assert_eq!(first, case.inputs.as_ref().unwrap()[0].needles.as_slice());

        case.prepare_state(1);
        assert!(case.inputs.is_none());
        run_to_completion(&mut case, 1);
        assert_ne!(first, case.inputs.as_ref().unwrap()[0].needles.as_slice());
    }

    #[test]
    fn check_inline_case_runs() {
        let mut case = InlineLowerBound::<Float, SetContainer>::new(
            "case".into(),
            64,
            Order::Descending,
            BatchPolicy::default(),
        );
        let state = run_to_completion(&mut case, 30);
        assert_eq!(state.iterations(), 30);

        // originals are left untouched by the measured loop
        let originals = case.originals.as_ref().unwrap();
        assert_eq!(originals.len(), 15);
        assert!(originals.iter().all(|o| o.len() == 64));
        assert!(originals[0].windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn check_empty_datasets_fail_the_case() {
        let mut inline = InlineLowerBound::<u64, VectorContainer>::new(
            "inline".into(),
            0,
            Order::Random,
            BatchPolicy::default(),
        );
        assert!(matches!(
            inline.run(&mut State::new(1)),
            Err(Error::EmptyDataset)
        ));

        let mut precomputed = PrecomputedLowerBound::<u64, VectorContainer>::new(
            "precomputed".into(),
            0,
            Order::Random,
            BatchPolicy::default(),
        );
        assert!(matches!(
            precomputed.run(&mut State::new(1)),
            Err(Error::EmptyDataset)
        ));
    }

    #[test]
    fn check_factory_builds_named_cases() {
        for strategy in [Strategy::Precomputed, Strategy::Inline] {
            let factory = LowerBound::new(strategy);
            let mut case = factory.build::<(u32, u64, u32), VectorContainer>("name".into(), 8);
            assert_eq!(case.name(), "name");
            let state = run_to_completion(case.as_mut(), 10);
            assert!(state.iterations() >= 10);
        }
    }

    fn check_inline_search_hits_own_values<C: ContainerKind>() {
        // replicas have disjoint values, so a needle taken from another replica is not found
        let originals = DatasetGenerator::<u64>::new(300, Order::Random)
            .datasets(3)
            .into_iter()
            .enumerate()
            .map(|(i, d)| d.into_iter().map(|v| v + i as u64 * 1_000_000).collect())
            .collect::<Vec<Vec<u64>>>();

        let mut rng = needle_rng(7);
        let mut state = State::new(60);
        let mut queries = 0;
        run_op_on_copies(&mut state, &originals, 3, |state, copy| {
            let population = copy.clone();
            let (needle, haystack) = search_in_copy::<u64, C>(state, &mut rng, copy);
            assert!(population.contains(&needle));
            assert_eq!(haystack.len(), population.len());
            assert_eq!(haystack.lower_bound(&needle), Some(&needle));
            queries += 1;
            haystack
        });
        assert_eq!(queries, 60);
    }

    #[test]
    fn check_inline_search_finds_needle() {
        check_inline_search_hits_own_values::<VectorContainer>();
        check_inline_search_hits_own_values::<SetContainer>();
    }

    const CONVERSION: Duration = Duration::from_millis(200);
    const QUERY: Duration = Duration::from_millis(5);

    /// Container with a conversion much slower than a query
    struct SlowContainer;

    struct Slow<T>(Vec<T>);

    impl ContainerKind for SlowContainer {
        const NAME: &'static str = "Slow";

        type Container<T: Ord> = Slow<T>;

        fn sorted_from<T: Ord>(values: Vec<T>) -> Slow<T> {
            thread::sleep(CONVERSION);
            Slow(VectorContainer::sorted_from(values))
        }
    }

    impl<T: Ord> SortedContainer<T> for Slow<T> {
        fn lower_bound(&self, needle: &T) -> Option<&T> {
            thread::sleep(QUERY);
            SortedContainer::lower_bound(&self.0, needle)
        }

        fn len(&self) -> usize {
            self.0.len()
        }

        fn iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
            SortedContainer::iter(&self.0)
        }
    }

    #[test]
    fn check_inline_search_times_only_the_query() {
        let originals = vec![vec![3u32, 1, 2]];
        let mut rng = needle_rng(1);
        let mut state = State::new(2);
        run_op_on_copies(&mut state, &originals, 1, |state, copy| {
            search_in_copy::<u32, SlowContainer>(state, &mut rng, copy)
        });

        assert_eq!(state.iterations(), 2);
        let elapsed = Duration::from_nanos(state.elapsed_ns());
        assert!(elapsed >= QUERY * 2, "Search is not measured: {:?}", elapsed);
        assert!(elapsed < CONVERSION, "Conversion is measured: {:?}", elapsed);
    }

    #[test]
    fn check_needle_rng_is_independent_from_datasets() {
        let mut case = InlineLowerBound::<u32, VectorContainer>::new(
            "case".into(),
            1024,
            Order::Random,
            BatchPolicy::default(),
        );
        for seed in 0..100 {
            case.prepare_state(seed);
            let mut dataset_rng = SmallRng::seed_from_u64(seed);
            assert_ne!(case.rng.next_u64(), dataset_rng.next_u64());
        }
    }
}
