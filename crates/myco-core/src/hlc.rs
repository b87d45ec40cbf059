//! Hybrid Logical Clock: packed 48-bit wall-clock ms + 16-bit logical
//! counter, giving a strict total order compatible with real time.

use thiserror::Error;

const LOGICAL_BITS: u32 = 16;
const LOGICAL_MASK: u64 = (1 << LOGICAL_BITS) - 1;

/// A packed HLC timestamp: upper 48 bits wall-clock ms, lower 16 bits
/// logical counter. Numeric order on the packed `u64` is exactly
/// wall-then-logical order, so `Ord` is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hlc(u64);

/// Failures from advancing an [`Hlc`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HlcError {
    /// The logical counter would exceed 16 bits within a single
    /// millisecond. Treated as fatal: wrapping would violate monotonicity.
    #[error("HLC logical counter overflowed within one millisecond")]
    LogicalOverflow,
}

impl Hlc {
    /// Pack a `(wall_ms, logical)` pair. `wall_ms` is truncated to 48 bits.
    #[must_use]
    pub fn pack(wall_ms: u64, logical: u16) -> Self {
        Self(((wall_ms & ((1 << 48) - 1)) << LOGICAL_BITS) | u64::from(logical))
    }

    /// Unpack into `(wall_ms, logical)`.
    #[must_use]
    pub fn unpack(self) -> (u64, u16) {
        (self.0 >> LOGICAL_BITS, (self.0 & LOGICAL_MASK) as u16)
    }

    /// The raw packed `u64`, as carried on the wire.
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Wrap a raw packed `u64` (e.g. read off the wire) as an `Hlc`.
    #[must_use]
    pub fn from_u64(raw: u64) -> Self {
        Self(raw)
    }

}

/// `a` is strictly newer than `b` under HLC order.
#[must_use]
pub fn newer(a: Hlc, b: Hlc) -> bool {
    a > b
}

/// A node's local clock state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Clock {
    last: Hlc,
}

impl Clock {
    /// Start a fresh clock at the zero timestamp.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock for a local event.
    ///
    /// # Errors
    ///
    /// [`HlcError::LogicalOverflow`] if `logical` would exceed `u16::MAX`
    /// within the same millisecond.
    pub fn next(&mut self, now_ms: u64) -> Result<Hlc, HlcError> {
        let (wall, logical) = self.last.unpack();
        let (new_wall, new_logical) = if now_ms > wall {
            (now_ms, 0)
        } else {
            let bumped = logical.checked_add(1).ok_or(HlcError::LogicalOverflow)?;
            (wall, bumped)
        };
        let next = Hlc::pack(new_wall, new_logical);
        self.last = next;
        Ok(next)
    }

    /// Merge a remote timestamp observation in with the local clock.
    ///
    /// # Errors
    ///
    /// [`HlcError::LogicalOverflow`] if the resulting logical counter would
    /// exceed `u16::MAX`.
    pub fn observe(&mut self, remote: Hlc, now_ms: u64) -> Result<Hlc, HlcError> {
        let (self_wall, self_logical) = self.last.unpack();
        let (remote_wall, remote_logical) = remote.unpack();
        let new_wall = self_wall.max(remote_wall).max(now_ms);

        let new_logical = if self_wall == new_wall && remote_wall == new_wall {
            self_logical.max(remote_logical).checked_add(1).ok_or(HlcError::LogicalOverflow)?
        } else if self_wall == new_wall {
            self_logical.checked_add(1).ok_or(HlcError::LogicalOverflow)?
        } else if remote_wall == new_wall {
            remote_logical.checked_add(1).ok_or(HlcError::LogicalOverflow)?
        } else {
            0
        };

        let merged = Hlc::pack(new_wall, new_logical);
        self.last = merged;
        Ok(merged)
    }

    /// The most recently emitted or observed timestamp.
    #[must_use]
    pub fn last(&self) -> Hlc {
        self.last
    }
}
