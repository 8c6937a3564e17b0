use thiserror::Error;

/// Unified, non-panicking error vocabulary for the simulation core.
///
/// Most of the crate reports failure through plain booleans or options (see
/// `Grid::set`, `Grid::step`) since those failures are routine. `SimError` is
/// reserved for the RLE codec, where a caller genuinely needs a reason.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("cell ({x}, {y}) is outside the bounded grid")]
    OutOfBounds { x: i64, y: i64 },

    #[error("region cannot be represented even at the widest storage width (8 bytes)")]
    CapacityExceeded,

    #[error("invalid RLE stream: {reason}")]
    InvalidFormat { reason: &'static str },

    #[error("decoded region contains {count} live cells, exceeding the caller's warn threshold")]
    Oversize { count: u64 },

    #[error("operation was cancelled before completion")]
    Cancelled,

    #[error("generation counter or quadtree depth reached its saturation limit")]
    Saturated,
}
