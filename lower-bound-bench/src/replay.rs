//! Measured loops
//!
//! Both loops keep calling [`State::keep_running_batch()`] with the number of logical iterations a single pass
//! over all the inputs represents. Any work that should not be measured must happen while the timer is paused.

use crate::State;
use std::hint::black_box;

/// Replays prepared inputs
///
/// Inputs are reused across passes, so nothing is done between passes and the only work measured is the body
/// itself.
#[inline]
pub fn run_op_on_inputs<I, F>(state: &mut State, inputs: &mut [I], batch: usize, mut body: F)
where
    F: FnMut(&mut I),
{
    while state.keep_running_batch(batch) {
        for input in inputs.iter_mut() {
            body(input);
        }
    }
}

/// Runs a body on fresh copies of the original datasets
///
/// The body gets the timing state and is free to consume the copy, but should pause timing for any setup work.
/// Values returned by the body are kept alive until the end of the pass and dropped together with restoring
/// copies, both outside of the timed region.
#[inline]
pub fn run_op_on_copies<V, O, F>(state: &mut State, originals: &[Vec<V>], batch: usize, mut body: F)
where
    V: Clone,
    F: FnMut(&mut State, &mut Vec<V>) -> O,
{
    let mut copies = originals.to_vec();
    let mut results = Vec::with_capacity(copies.len());
    while state.keep_running_batch(batch) {
        for copy in copies.iter_mut() {
            results.push(black_box(body(state, copy)));
        }

        state.pause_timing();
        results.clear();
        for (copy, original) in copies.iter_mut().zip(originals) {
            copy.clone_from(original);
        }
        state.resume_timing();
    }
}
