use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

// MARK: - AudioLevel trait

/// Source of a normalised audio amplitude in `[0, 1]`.
///
/// Read from the render tick, so implementations must not block. A stale
/// value is fine.
pub trait AudioLevel: Send + Sync {
    fn amplitude(&self) -> f32;
}

// MARK: - SharedAmplitude

/// Last-known amplitude, written by the capture thread and read by the
/// render tick. Stores the `f32` bits in an atomic.
#[derive(Debug, Clone, Default)]
pub struct SharedAmplitude {
    bits: Arc<AtomicU32>,
}

impl SharedAmplitude {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` clamped to `[0, 1]`; NaN stores 0.
    pub fn store(&self, value: f32) {
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }
}

impl AudioLevel for SharedAmplitude {
    fn amplitude(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// Amplitude provider for sketches without audio, or when no device could
/// be opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silence;

impl AudioLevel for Silence {
    fn amplitude(&self) -> f32 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_amplitude_is_visible_through_clones() {
        let writer = SharedAmplitude::new();
        let reader = writer.clone();
        assert_eq!(reader.amplitude(), 0.0);

        writer.store(0.25);
        assert_eq!(reader.amplitude(), 0.25);

        writer.store(7.0);
        assert_eq!(reader.amplitude(), 1.0);
        writer.store(f32::NAN);
        assert_eq!(reader.amplitude(), 0.0);
    }

    #[test]
    fn silence_is_zero() {
        assert_eq!(Silence.amplitude(), 0.0);
    }
}
