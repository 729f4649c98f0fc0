//! Cartesian registration of benchmark cases
//!
//! The product of value types, containers and quantities is built as data: tags of each axis are dispatched to a
//! generic [`CaseFactory::build()`] which gets monomorphized for every (value type, container) pair.

use crate::{
    containers::{ContainerKind, ContainerTag, SetContainer, VectorContainer},
    values::{Float, ValueTag, ValueType},
    BenchmarkCase, Error,
};
use log::debug;
use std::collections::HashSet;

/// Default dataset sizes
pub const QUANTITIES: [usize; 8] = [
    1 << 0,
    1 << 2,
    1 << 4,
    1 << 6,
    1 << 8,
    1 << 10,
    1 << 14,
    1 << 18,
];

/// Creates a benchmark case for a given value type and container
pub trait CaseFactory {
    /// Prefix of the names of all the cases this factory creates
    fn prefix(&self) -> &str;

    fn build<V: ValueType, C: ContainerKind>(
        &self,
        name: String,
        quantity: usize,
    ) -> Box<dyn BenchmarkCase>;
}

/// Name of a case: `<prefix><value type>_<container>_<quantity>`
pub fn case_name(prefix: &str, value: ValueTag, container: ContainerTag, quantity: usize) -> String {
    format!(
        "{}{}_{}_{}",
        prefix,
        value.name(),
        container.name(),
        quantity
    )
}

/// Axes of the cartesian product of benchmark cases
#[derive(Clone, Debug)]
pub struct CaseMatrix {
    value_types: Vec<ValueTag>,
    containers: Vec<ContainerTag>,
    quantities: Vec<usize>,
}

impl CaseMatrix {
    pub fn new(
        value_types: impl IntoIterator<Item = ValueTag>,
        containers: impl IntoIterator<Item = ContainerTag>,
        quantities: impl IntoIterator<Item = usize>,
    ) -> Self {
        Self {
            value_types: value_types.into_iter().collect(),
            containers: containers.into_iter().collect(),
            quantities: quantities.into_iter().collect(),
        }
    }

    /// All value types and containers with given quantities
    pub fn all(quantities: impl IntoIterator<Item = usize>) -> Self {
        Self::new(ValueTag::ALL, ContainerTag::ALL, quantities)
    }

    /// Number of cases in the product
    pub fn len(&self) -> usize {
        self.value_types.len() * self.containers.len() * self.quantities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates one case per combination
    ///
    /// Cases are ordered by value type, then by container, then by quantity. Fails if a quantity is zero or if two
    /// cases would get the same name.
    pub fn build<F: CaseFactory>(&self, factory: &F) -> Result<Vec<Box<dyn BenchmarkCase>>, Error> {
        if self.quantities.contains(&0) {
            return Err(Error::ZeroQuantity);
        }

        let mut names = HashSet::with_capacity(self.len());
        let mut cases = Vec::with_capacity(self.len());
        for &value in &self.value_types {
            for &container in &self.containers {
                for &quantity in &self.quantities {
                    let name = case_name(factory.prefix(), value, container, quantity);
                    if !names.insert(name.clone()) {
                        return Err(Error::DuplicateCase(name));
                    }
                    debug!("Registering {}", name);
                    cases.push(instantiate(factory, value, container, name, quantity));
                }
            }
        }
        Ok(cases)
    }
}

fn instantiate<F: CaseFactory>(
    factory: &F,
    value: ValueTag,
    container: ContainerTag,
    name: String,
    quantity: usize,
) -> Box<dyn BenchmarkCase> {
    match value {
        ValueTag::UInt32 => with_container::<F, u32>(factory, container, name, quantity),
        ValueTag::UInt64 => with_container::<F, u64>(factory, container, name, quantity),
        ValueTag::Pair => with_container::<F, (u32, u32)>(factory, container, name, quantity),
        ValueTag::Tuple => {
            with_container::<F, (u32, u64, u32)>(factory, container, name, quantity)
        }
        ValueTag::String => with_container::<F, String>(factory, container, name, quantity),
        ValueTag::Float => with_container::<F, Float>(factory, container, name, quantity),
    }
}

fn with_container<F: CaseFactory, V: ValueType>(
    factory: &F,
    container: ContainerTag,
    name: String,
    quantity: usize,
) -> Box<dyn BenchmarkCase> {
    match container {
        ContainerTag::Vector => factory.build::<V, VectorContainer>(name, quantity),
        ContainerTag::Set => factory.build::<V, SetContainer>(name, quantity),
    }
}
