/// Bytes per output pixel. The framebuffer is tightly packed RGBA8.
pub const BYTES_PER_PIXEL: usize = 4;

/// A contiguous, half-open range of output rows assigned to exactly one
/// worker. Regions produced for one dispatch are disjoint and together cover
/// the whole frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    /// First row of the region (inclusive).
    pub start: u32,
    /// One past the last row of the region (exclusive).
    pub end: u32,
}

impl Region {
    /// Number of rows in the region.
    pub fn rows(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Parameters of one dispatched frame.
///
/// The descriptor is immutable after dispatch; workers receive a copy along
/// with their assigned [`Region`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameParams {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels (the partitioned extent).
    pub height: u32,
    /// Seed forwarded verbatim to the kernel, e.g. for sampling.
    pub seed: u64,
}

impl FrameParams {
    /// Bytes occupied by one output row.
    pub fn row_bytes(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Total framebuffer bytes needed for this frame.
    pub fn byte_len(&self) -> usize {
        self.height as usize * self.row_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_rows_and_emptiness() {
        let region = Region { start: 100, end: 200 };
        assert_eq!(region.rows(), 100);
        assert!(!region.is_empty());
        assert!(Region { start: 5, end: 5 }.is_empty());
    }

    #[test]
    fn frame_byte_math() {
        let frame = FrameParams { width: 320, height: 240, seed: 0 };
        assert_eq!(frame.row_bytes(), 320 * BYTES_PER_PIXEL);
        assert_eq!(frame.byte_len(), 320 * 240 * BYTES_PER_PIXEL);
    }
}
