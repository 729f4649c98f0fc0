//! Catalogue of value types used as benchmark payload and the orderings of generated datasets

use rand::{seq::SliceRandom, Rng};
use std::{cmp::Ordering, collections::BinaryHeap, fmt::Debug, mem};

/// Comparable value representation used to populate haystacks
///
/// Values are generated in bulk from consecutive indices, so `from_index()` should be a cheap and deterministic
/// mapping. Distinct indices should produce distinct values.
pub trait ValueType: Ord + Clone + Debug + 'static {
    /// Stable name used in benchmark names
    const NAME: &'static str;

    fn from_index(idx: usize) -> Self;
}

impl ValueType for u32 {
    const NAME: &'static str = "UInt32";

    fn from_index(idx: usize) -> Self {
        idx as u32
    }
}

impl ValueType for u64 {
    const NAME: &'static str = "UInt64";

    fn from_index(idx: usize) -> Self {
        idx as u64
    }
}

impl ValueType for (u32, u32) {
    const NAME: &'static str = "PairUInt32UInt32";

    fn from_index(idx: usize) -> Self {
        (idx as u32, idx as u32)
    }
}

impl ValueType for (u32, u64, u32) {
    const NAME: &'static str = "TupleUInt32UInt64UInt32";

    fn from_index(idx: usize) -> Self {
        (idx as u32, idx as u64, idx as u32)
    }
}

impl ValueType for String {
    const NAME: &'static str = "String";

    /// Strings share a long common prefix, so comparisons are not decided by the first byte
    fn from_index(idx: usize) -> Self {
        format!("lower-bound-value-{:016}", idx)
    }
}

/// `f32` with a total order
#[derive(Clone, Copy, Debug, Default)]
pub struct Float(pub f32);

impl PartialEq for Float {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Float {}

impl PartialOrd for Float {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Float {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl ValueType for Float {
    const NAME: &'static str = "Float";

    fn from_index(idx: usize) -> Self {
        Float(idx as f32)
    }
}

/// Closed list of value types benchmarks are registered for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueTag {
    UInt32,
    UInt64,
    Pair,
    Tuple,
    String,
    Float,
}

impl ValueTag {
    pub const ALL: [ValueTag; 6] = [
        ValueTag::UInt32,
        ValueTag::UInt64,
        ValueTag::Pair,
        ValueTag::Tuple,
        ValueTag::String,
        ValueTag::Float,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ValueTag::UInt32 => u32::NAME,
            ValueTag::UInt64 => u64::NAME,
            ValueTag::Pair => <(u32, u32)>::NAME,
            ValueTag::Tuple => <(u32, u64, u32)>::NAME,
            ValueTag::String => String::NAME,
            ValueTag::Float => Float::NAME,
        }
    }
}

/// Arrangement of a generated dataset
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Order {
    Ascending,
    #[default]
    Random,
    Descending,
    /// All the elements are equal
    SingleElement,
    /// Ascending first half followed by descending second half
    PipeOrgan,
    /// Binary max-heap layout
    Heap,
}

impl Order {
    pub const ALL: [Order; 6] = [
        Order::Ascending,
        Order::Random,
        Order::Descending,
        Order::SingleElement,
        Order::PipeOrgan,
        Order::Heap,
    ];

    /// Rearranges values in place according to this order
    pub fn arrange<V: Ord>(self, values: &mut Vec<V>, rng: &mut impl Rng) {
        match self {
            Order::Random => values.shuffle(rng),
            Order::Ascending => values.sort_unstable(),
            Order::Descending => values.sort_unstable_by(|a, b| b.cmp(a)),
            Order::SingleElement => {}
            Order::PipeOrgan => {
                values.sort_unstable();
                let mid = values.len() / 2;
                values[mid..].reverse();
            }
            Order::Heap => *values = BinaryHeap::from(mem::take(values)).into_vec(),
        }
    }
}

/// Generates a dataset of a given size and order
pub fn generate<V: ValueType>(quantity: usize, order: Order, rng: &mut impl Rng) -> Vec<V> {
    let mut values = match order {
        Order::SingleElement => vec![V::from_index(0); quantity],
        _ => (0..quantity).map(V::from_index).collect::<Vec<_>>(),
    };
    order.arrange(&mut values, rng);
    values
}
