//! Default input device → [`AmplitudeMeter`] → [`SharedAmplitude`].

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SizedSample};
use depthlink_core::DeviceError;
use tracing::{info, warn};

use crate::level::SharedAmplitude;
use crate::meter::AmplitudeMeter;

const DEVICE: &str = "microphone";

/// Live capture. Dropping it stops the stream; the shared amplitude keeps
/// its last value.
pub struct MicrophoneCapture {
    _stream: cpal::Stream,
    level: SharedAmplitude,
}

impl MicrophoneCapture {
    /// Open the default input device and start feeding `level`.
    pub fn start(level: SharedAmplitude) -> Result<Self, DeviceError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| DeviceError::Unavailable { device: DEVICE.into() })?;

        let supported = device.default_input_config().map_err(|e| stream_failed(e.to_string()))?;
        let format = supported.sample_format();
        let config = supported.config();
        let channels = config.channels.max(1) as usize;

        let stream = match format {
            SampleFormat::F32 => build::<f32>(&device, &config, channels, level.clone(), |s| s),
            SampleFormat::I16 => build::<i16>(&device, &config, channels, level.clone(), |s| s as f32 / i16::MAX as f32),
            SampleFormat::U16 => build::<u16>(&device, &config, channels, level.clone(), |s| {
                (s as f32 - 32768.0) / 32768.0
            }),
            other => {
                return Err(DeviceError::UnsupportedFormat { device: DEVICE.into(), format: format!("{other:?}") })
            }
        }?;

        stream.play().map_err(|e| stream_failed(e.to_string()))?;
        info!("Microphone: capturing {} channel(s), {:?}", channels, format);
        Ok(Self { _stream: stream, level })
    }

    pub fn level(&self) -> &SharedAmplitude {
        &self.level
    }
}

fn stream_failed(reason: String) -> DeviceError {
    DeviceError::StreamFailed { device: DEVICE.into(), reason }
}

fn build<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    level: SharedAmplitude,
    to_f32: fn(T) -> f32,
) -> Result<cpal::Stream, DeviceError>
where
    T: SizedSample + Send + 'static,
{
    let mut meter = AmplitudeMeter::default();
    let mut mono = Vec::new();

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                mono.clear();
                mono.extend(
                    data.chunks(channels)
                        .map(|frame| frame.iter().map(|&s| to_f32(s)).sum::<f32>() / frame.len() as f32),
                );
                meter.push_samples(&mono);
                level.store(meter.read());
            },
            |e| warn!("Microphone: stream error: {}", e),
            None,
        )
        .map_err(|e| stream_failed(e.to_string()))
}
