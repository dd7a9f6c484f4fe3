//! Point-cloud output buffers.
//!
//! Two flat `f32` arrays (xyz triples and rgb triples), pre-sized once per
//! frame to the worst-case sample count, written in place from index 0, then
//! truncated to the used prefix on commit. The allocation is reused across
//! frames; the contents are not.

/// Worst-case point count for a frame: `ceil(vh/step) * ceil(half/step)`.
#[inline]
pub fn sample_capacity(half_width: u32, height: u32, step: u32) -> usize {
    let step = step.max(1);
    height.div_ceil(step) as usize * half_width.div_ceil(step) as usize
}

#[derive(Debug, Default)]
pub struct PointCloudBuffer {
    positions: Vec<f32>,
    colors: Vec<f32>,
    /// Floats written since `begin`.
    cursor: usize,
    /// Capacity in points reserved by the last `begin`.
    capacity: usize,
    frames_committed: u64,
}

/// Borrowed view of the last committed frame, valid for one draw call.
#[derive(Debug, Clone, Copy)]
pub struct CommittedCloud<'a> {
    pub positions: &'a [f32],
    pub colors: &'a [f32],
}

impl CommittedCloud<'_> {
    pub fn len(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn position(&self, i: usize) -> [f32; 3] {
        [self.positions[3 * i], self.positions[3 * i + 1], self.positions[3 * i + 2]]
    }

    pub fn color(&self, i: usize) -> [f32; 3] {
        [self.colors[3 * i], self.colors[3 * i + 1], self.colors[3 * i + 2]]
    }
}

impl PointCloudBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new frame with room for `capacity` points. Discards whatever
    /// was committed before.
    pub fn begin(&mut self, capacity: usize) {
        self.positions.clear();
        self.colors.clear();
        self.positions.resize(capacity * 3, 0.0);
        self.colors.resize(capacity * 3, 0.0);
        self.cursor = 0;
        self.capacity = capacity;
    }

    /// Flat index the next point will be written at (`3 * points_written`).
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Write one point at the cursor.
    ///
    /// Panics in debug builds if more points are pushed than `begin` reserved.
    #[inline]
    pub fn push(&mut self, position: [f32; 3], color: [f32; 3]) {
        debug_assert!(self.cursor + 3 <= self.capacity * 3, "point buffer overflow");
        let j = self.cursor;
        self.positions[j..j + 3].copy_from_slice(&position);
        self.colors[j..j + 3].copy_from_slice(&color);
        self.cursor += 3;
    }

    /// Truncate both arrays to the used prefix and expose them.
    pub fn commit(&mut self) -> CommittedCloud<'_> {
        self.positions.truncate(self.cursor);
        self.colors.truncate(self.cursor);
        self.frames_committed += 1;
        self.committed()
    }

    /// The last committed frame (empty before the first commit).
    pub fn committed(&self) -> CommittedCloud<'_> {
        let n = self.positions.len().min(self.cursor);
        CommittedCloud { positions: &self.positions[..n], colors: &self.colors[..n] }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn frames_committed(&self) -> u64 {
        self.frames_committed
    }
}
