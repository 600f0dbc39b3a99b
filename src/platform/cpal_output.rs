use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    BufferSize, Device, FromSample, Sample, SampleRate, SizedSample, Stream, StreamConfig,
    SupportedBufferSize,
};
use std::sync::Arc;

use super::{AudioOutput, CompletionCallback, OutputCore, RENDER_CHUNK};
use crate::config::OUTPUT_LATENCY;
use crate::error::OutputError;
use crate::source::{FrameSource, SILENCE};

pub struct CpalOutput {
    stream: Option<Stream>,
    device: Option<Device>,
    sample_rate: u32,
    core: Arc<OutputCore>,
}

impl CpalOutput {
    pub fn new() -> Self {
        Self {
            stream: None,
            device: None,
            sample_rate: 0,
            core: Arc::new(OutputCore::new()),
        }
    }

    /// Setup the CPAL host and device
    fn setup_host_device(&mut self) -> Result<(), OutputError> {
        let host = cpal::default_host();

        let device = host.default_output_device().ok_or(OutputError::NoDevice)?;

        match device.name() {
            Ok(name) => log::info!("Output device: {}", name),
            Err(e) => log::warn!("Output device name unavailable: {}", e),
        }

        self.device = Some(device);
        Ok(())
    }

    /// Build a stream running at `sample_rate` in the device's native sample format
    fn build_stream(&self, sample_rate: u32) -> Result<Stream, OutputError> {
        let device = self.device.as_ref().ok_or(OutputError::NoDevice)?;
        let supported = device
            .default_output_config()
            .map_err(|e| OutputError::Config(e.to_string()))?;
        log::debug!("Default output config: {:?}", supported);

        let latency_frames = (sample_rate as f64 * OUTPUT_LATENCY.as_secs_f64()).round() as u32;
        let buffer_size = match supported.buffer_size() {
            SupportedBufferSize::Range { min, max } if (*min..=*max).contains(&latency_frames) => {
                BufferSize::Fixed(latency_frames)
            }
            _ => BufferSize::Default,
        };

        let config = StreamConfig {
            channels: supported.channels(),
            sample_rate: SampleRate(sample_rate),
            buffer_size,
        };

        let core = self.core.clone();
        match supported.sample_format() {
            cpal::SampleFormat::I8 => Self::make_stream::<i8>(device, &config, core),
            cpal::SampleFormat::I16 => Self::make_stream::<i16>(device, &config, core),
            cpal::SampleFormat::I32 => Self::make_stream::<i32>(device, &config, core),
            cpal::SampleFormat::I64 => Self::make_stream::<i64>(device, &config, core),
            cpal::SampleFormat::U8 => Self::make_stream::<u8>(device, &config, core),
            cpal::SampleFormat::U16 => Self::make_stream::<u16>(device, &config, core),
            cpal::SampleFormat::U32 => Self::make_stream::<u32>(device, &config, core),
            cpal::SampleFormat::U64 => Self::make_stream::<u64>(device, &config, core),
            cpal::SampleFormat::F32 => Self::make_stream::<f32>(device, &config, core),
            cpal::SampleFormat::F64 => Self::make_stream::<f64>(device, &config, core),
            sample_format => Err(OutputError::UnsupportedFormat(sample_format.to_string())),
        }
    }

    /// Create a typed stream for the given sample format
    fn make_stream<T>(
        device: &Device,
        config: &StreamConfig,
        core: Arc<OutputCore>,
    ) -> Result<Stream, OutputError>
    where
        T: SizedSample + FromSample<f32>,
    {
        let num_channels = config.channels as usize;
        let err_fn = |err| log::error!("Output stream error: {}", err);

        device
            .build_output_stream(
                config,
                move |output: &mut [T], _: &cpal::OutputCallbackInfo| {
                    Self::process_frame(output, &core, num_channels);
                },
                err_fn,
                None,
            )
            .map_err(|e| OutputError::Stream(e.to_string()))
    }

    /// Render one device buffer, mapping stereo frames onto the device's channels
    fn process_frame<SampleType>(output: &mut [SampleType], core: &OutputCore, num_channels: usize)
    where
        SampleType: Sample + FromSample<f32>,
    {
        let mut scratch = [SILENCE; RENDER_CHUNK];

        for block in output.chunks_mut(RENDER_CHUNK * num_channels) {
            let frames = block.len() / num_channels;
            core.render(&mut scratch[..frames]);

            for (frame, &[left, right]) in block.chunks_mut(num_channels).zip(scratch.iter()) {
                match frame {
                    [mono] => *mono = SampleType::from_sample((left + right) * 0.5),
                    [l, r, rest @ ..] => {
                        *l = SampleType::from_sample(left);
                        *r = SampleType::from_sample(right);
                        for sample in rest {
                            *sample = SampleType::EQUILIBRIUM;
                        }
                    }
                    [] => {}
                }
            }
        }
    }
}

impl Default for CpalOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for CpalOutput {
    fn initialize(&mut self, sample_rate: u32) -> Result<(), OutputError> {
        if self.stream.is_some() && self.sample_rate == sample_rate {
            return Ok(());
        }
        if self.device.is_none() {
            self.setup_host_device()?;
        }

        // The running stream is only replaced once the new one exists
        let stream = self.build_stream(sample_rate)?;
        stream
            .play()
            .map_err(|e| OutputError::Stream(e.to_string()))?;

        self.stream = Some(stream);
        self.sample_rate = sample_rate;
        log::info!("Audio stream started at sample rate: {}", sample_rate);
        Ok(())
    }

    fn play(
        &mut self,
        source: Box<dyn FrameSource>,
        on_complete: CompletionCallback,
    ) -> Result<(), OutputError> {
        if self.stream.is_none() {
            return Err(OutputError::Stream("stream not initialized".to_string()));
        }
        self.core.play(source, on_complete);
        Ok(())
    }

    fn pause(&mut self, paused: bool) {
        self.core.set_paused(paused);
    }

    fn clear(&mut self) {
        self.core.clear();
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn is_active(&self) -> bool {
        self.core.is_active()
    }
}
