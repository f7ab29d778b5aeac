//! Epoch boundary arithmetic.
//!
//! Pure functions, no I/O, no state — the algorithmic heart of the
//! scheduler. Each subnet runs its recurring epoch on a fixed interval of
//! `tempo + 1` blocks, phase-shifted by its netuid so that subnets do not
//! all hit their boundary on the same block.

use crate::types::{BlockHeight, Tempo};

/// The next epoch boundary for a subnet at the given height.
///
/// ```text
/// interval   = tempo + 1
/// phase      = (current + netuid + 1) mod interval
/// last_epoch = current - 1 - phase
/// next_epoch = last_epoch + interval
/// ```
///
/// The remainder is the Euclidean one (always in `[0, interval)`). The
/// result satisfies `current <= next_epoch < current + tempo + 1` for every
/// `current >= 0` and `tempo >= 1`, and is a fixed point when `current` is
/// already exactly on a boundary.
pub fn next_epoch(current: BlockHeight, tempo: Tempo, netuid: u16) -> BlockHeight {
    let interval = i128::from(tempo) + 1;
    let current = i128::from(current);
    let phase = (current + i128::from(netuid) + 1).rem_euclid(interval);
    let last_epoch = current - 1 - phase;
    // next - current = interval - 1 - phase, in [0, interval), so the
    // result fits back into u64 for any u64 input
    (last_epoch + interval) as BlockHeight
}

/// How far the next boundary is from the given height.
pub fn blocks_to_epoch(current: BlockHeight, tempo: Tempo, netuid: u16) -> u64 {
    next_epoch(current, tempo, netuid) - current
}
