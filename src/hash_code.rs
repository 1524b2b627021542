//! Process-wide hash codes for thread-local identities.
//!
//! Consecutive identities are spaced by a fixed odd increment close to
//! 2^32 / phi. Masking the codes with any power-of-two table size spreads
//! them near-uniformly, so densely created identities rarely collide on
//! their home slot.

use core::sync::atomic::{AtomicU32, Ordering};

/// Spacing between consecutively issued hash codes.
pub(crate) const HASH_INCREMENT: u32 = 0x61c8_8647;

static NEXT_HASH_CODE: AtomicU32 = AtomicU32::new(0);

/// Issue the next hash code. Wraps on overflow; only relative spacing matters.
#[inline]
pub(crate) fn next_hash_code() -> u32 {
    NEXT_HASH_CODE.fetch_add(HASH_INCREMENT, Ordering::Relaxed)
}
