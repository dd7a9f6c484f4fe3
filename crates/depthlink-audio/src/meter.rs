//! Amplitude meter with browser analyser semantics.
//!
//! Keeps the last `FFT_SIZE` samples; on each reading it windows them
//! (Blackman), runs an FFT, smooths the bin magnitudes over time, maps them to
//! bytes over a fixed dB range and returns the mean byte / 255.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use tracing::debug;

pub const FFT_SIZE: usize = 256;
pub const BIN_COUNT: usize = FFT_SIZE / 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterConfig {
    /// Weight of the previous magnitude in `[0, 1)`.
    pub smoothing: f32,
    pub min_db: f32,
    pub max_db: f32,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self { smoothing: 0.8, min_db: -100.0, max_db: -30.0 }
    }
}

pub struct AmplitudeMeter {
    fft: Arc<dyn Fft<f32>>,
    config: MeterConfig,
    window: Vec<f32>,
    /// Ring of the most recent samples; `write` is the oldest.
    history: Vec<f32>,
    write: usize,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    bytes: Vec<u8>,
    readings: u64,
}

impl Default for AmplitudeMeter {
    fn default() -> Self {
        Self::new(MeterConfig::default())
    }
}

impl AmplitudeMeter {
    pub fn new(config: MeterConfig) -> Self {
        let fft = FftPlanner::new().plan_fft_forward(FFT_SIZE);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self {
            fft,
            config,
            window: blackman(FFT_SIZE),
            history: vec![0.0; FFT_SIZE],
            write: 0,
            spectrum: vec![Complex::new(0.0, 0.0); FFT_SIZE],
            scratch,
            smoothed: vec![0.0; BIN_COUNT],
            bytes: vec![0; BIN_COUNT],
            readings: 0,
        }
    }

    /// Append mono samples. Non-finite samples count as silence.
    pub fn push_samples(&mut self, samples: &[f32]) {
        for &s in samples {
            self.history[self.write] = if s.is_finite() { s } else { 0.0 };
            self.write = (self.write + 1) % FFT_SIZE;
        }
    }

    /// Analyse the current window and return the amplitude in `[0, 1]`.
    ///
    /// Each call advances the magnitude smoothing by one step.
    pub fn read(&mut self) -> f32 {
        for (i, slot) in self.spectrum.iter_mut().enumerate() {
            let sample = self.history[(self.write + i) % FFT_SIZE];
            *slot = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft.process_with_scratch(&mut self.spectrum, &mut self.scratch);

        let tau = self.config.smoothing;
        let db_span = self.config.max_db - self.config.min_db;
        let mut sum = 0u32;
        for k in 0..BIN_COUNT {
            let magnitude = self.spectrum[k].norm() / FFT_SIZE as f32;
            self.smoothed[k] = tau * self.smoothed[k] + (1.0 - tau) * magnitude;
            let db = 20.0 * self.smoothed[k].log10();
            let scaled = 255.0 * (db - self.config.min_db) / db_span;
            // Silent bins give -inf dB and land on 0
            let byte = if scaled.is_nan() { 0 } else { scaled.floor().clamp(0.0, 255.0) as u8 };
            self.bytes[k] = byte;
            sum += byte as u32;
        }

        self.readings += 1;
        let amplitude = sum as f32 / BIN_COUNT as f32 / 255.0;
        if self.readings <= 3 || self.readings % 300 == 0 {
            debug!("AmplitudeMeter: reading #{} amplitude={:.3}", self.readings, amplitude);
        }
        amplitude
    }

    /// Byte spectrum from the last [`read`](Self::read).
    pub fn frequency_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

fn blackman(n: usize) -> Vec<f32> {
    use std::f32::consts::TAU;
    let (a0, a1, a2) = (0.42, 0.5, 0.08);
    (0..n)
        .map(|i| {
            let t = i as f32 / n as f32;
            a0 - a1 * (TAU * t).cos() + a2 * (2.0 * TAU * t).cos()
        })
        .collect()
}
