//! Stack high-water mark from a painted stack.
//!
//! At boot the unused part of the main stack is filled with [`STACK_PAINT`].
//! The remaining margin is the run of words at the far end that still hold
//! the pattern.

/// Fill pattern written below the live stack.
pub const STACK_PAINT: u32 = 0xDEAD_BEEF;

/// Bytes left unpainted below the stack pointer at paint time.
pub const PAINT_GUARD_BYTES: usize = 256;

/// Bytes above the stack limit that are never painted.
///
/// esp-hal keeps its stack-guard canary 60 bytes above the limit and arms a
/// watchpoint on it during init.
pub const STACK_LIMIT_RESERVED_BYTES: usize = 64;

/// Name reported with every stack reading.
pub const DUTY_CYCLE_TASK: &str = "duty-cycle";

/// Counts leading words (lowest address first) still equal to `sentinel`.
#[must_use]
pub fn untouched_words<I>(words: I, sentinel: u32) -> usize
where
    I: IntoIterator<Item = u32>,
{
    words
        .into_iter()
        .take_while(|word| *word == sentinel)
        .count()
}

/// Region to paint for a stack whose lowest address is `limit`, painted
/// from a frame at `frame`. Returns the first address and the word count.
#[must_use]
pub fn paint_region(limit: usize, frame: usize) -> (usize, usize) {
    let first = limit.saturating_add(STACK_LIMIT_RESERVED_BYTES);
    let last = frame.saturating_sub(PAINT_GUARD_BYTES);
    (first, last.saturating_sub(first) / 4)
}

/// Converts a word count to bytes, saturating.
#[must_use]
pub fn words_to_bytes(words: usize) -> u32 {
    u32::try_from(words.saturating_mul(4)).unwrap_or(u32::MAX)
}

#[cfg(target_os = "none")]
pub use self::painted::PaintedStack;

#[cfg(target_os = "none")]
mod painted {
    use tracker_core::devices::StackGauge;

    use super::{DUTY_CYCLE_TASK, STACK_PAINT, paint_region, untouched_words, words_to_bytes};

    unsafe extern "C" {
        static _stack_start_cpu0: u32;
        static _stack_end_cpu0: u32;
    }

    /// [`StackGauge`] over the CPU0 main stack, which hosts the executor.
    pub struct PaintedStack {
        bottom: usize,
        words: usize,
    }

    impl PaintedStack {
        /// Paints everything between the reserved area above the stack limit
        /// and the guard below the caller's frame.
        ///
        /// # Safety
        ///
        /// Must run once, on the main stack, before anything deeper than
        /// the caller has used it.
        pub unsafe fn paint() -> Self {
            let start = (&raw const _stack_start_cpu0).expose_provenance();
            let end = (&raw const _stack_end_cpu0).expose_provenance();
            let marker = 0u32;
            let frame = (&raw const marker).addr();
            let (bottom, words) = paint_region(start.min(end), frame);

            let base = core::ptr::with_exposed_provenance_mut::<u32>(bottom);
            for index in 0..words {
                unsafe { base.add(index).write_volatile(STACK_PAINT) };
            }

            Self { bottom, words }
        }
    }

    impl StackGauge for PaintedStack {
        fn task_name(&self) -> &'static str {
            DUTY_CYCLE_TASK
        }

        fn remaining_stack(&mut self) -> u32 {
            let base = core::ptr::with_exposed_provenance::<u32>(self.bottom);
            let words = (0..self.words).map(|index| unsafe { base.add(index).read_volatile() });
            words_to_bytes(untouched_words(words, STACK_PAINT))
        }
    }
}
