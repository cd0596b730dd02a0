use thiserror::Error;

/// Precondition violations reported by the kernel entry points.
///
/// Every kernel validates its shape once, before any tile loop runs, so a
/// returned error guarantees the output buffer was left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("width {width} must be a non-zero multiple of {tile}")]
    WidthNotTiled { width: usize, tile: usize },

    #[error("{dim} {count} must be a non-zero multiple of {tile}")]
    ChannelsNotTiled { dim: &'static str, count: usize, tile: usize },

    #[error("input_channels {count} exceeds {max}, the most an i32 accumulator can sum without overflow")]
    AccumulatorOverflow { count: usize, max: usize },

    #[error("row width {width} is below the minimum of {min} for edge/interior processing")]
    RowTooShort { width: usize, min: usize },

    #[error("{buffer} buffer holds {got} elements, {needed} required")]
    BufferTooSmall { buffer: &'static str, needed: usize, got: usize },
}

pub(crate) fn check_len(buffer: &'static str, got: usize, needed: usize) -> Result<(), ShapeError> {
    if got < needed {
        return Err(ShapeError::BufferTooSmall { buffer, needed, got });
    }
    Ok(())
}
