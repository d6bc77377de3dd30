//! Render side of the engine and the audio backends that drive it.
//!
//! [`Renderer`] owns the [`MixingBus`] (through an [`Engine`]) plus both ends
//! of the control link that live on the render side. Whoever calls
//! [`Renderer::render`] is the render path: a cpal callback in realtime mode,
//! or the host itself when running offline.
//!
//! Per block the renderer drains pending commands, mixes, then forwards bus
//! events. It never blocks and never drops a sample buffer itself.

use std::sync::mpsc::{self, Receiver, Sender};

use murmur_core::dsp::ms_to_samples;

use crate::bus::{BusEvent, Command, MixingBus};
use crate::graph::Engine;

const SCRATCH_FRAMES: usize = 4096;

/// Control-side ends of the command/event channels.
#[derive(Debug)]
pub struct BusLink {
    pub commands: Sender<Command>,
    pub events: Receiver<BusEvent>,
}

/// Wire a bus to a fresh pair of channels.
pub fn link(bus: MixingBus, sr: f32) -> (BusLink, Renderer) {
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let (ev_tx, ev_rx) = mpsc::channel();
    let renderer = Renderer {
        engine: Engine::new(bus, sr),
        commands: cmd_rx,
        events: ev_tx,
        scratch: vec![0.0; SCRATCH_FRAMES],
    };
    (BusLink { commands: cmd_tx, events: ev_rx }, renderer)
}

pub struct Renderer {
    engine: Engine<MixingBus>,
    commands: Receiver<Command>,
    events: Sender<BusEvent>,
    scratch: Vec<f32>,
}

impl core::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Renderer")
            .field("sr", &self.engine.sample_rate())
            .field("time", &self.engine.time())
            .field("bus", self.engine.generator())
            .finish()
    }
}

impl Renderer {
    #[inline] pub fn sample_rate(&self) -> f32 { self.engine.sample_rate() }

    /// Seconds rendered so far.
    #[inline] pub fn time(&self) -> f64 { self.engine.time() }

    /// Read-only view of the bus, for inspection between blocks.
    #[inline] pub fn bus(&self) -> &MixingBus { self.engine.generator() }

    /// Render one mono block.
    pub fn render(&mut self, out: &mut [f32]) {
        let sr = self.engine.sample_rate();
        while let Ok(cmd) = self.commands.try_recv() {
            self.engine.generator_mut().apply(cmd);
        }
        self.engine.render(out, sr);
        for ev in self.engine.generator_mut().drain_events() {
            // a closed link only happens at shutdown; the buffer is freed here then
            let _ = self.events.send(ev);
        }
    }

    /// Render `frames` mono samples into the internal scratch buffer.
    /// Grows the buffer past `SCRATCH_FRAMES`; the device callback uses
    /// [`fill_interleaved`](Self::fill_interleaved) instead.
    pub fn render_frames(&mut self, frames: usize) -> &[f32] {
        if self.scratch.len() < frames {
            self.scratch.resize(frames, 0.0);
        }
        let mut scratch = core::mem::take(&mut self.scratch);
        self.render(&mut scratch[..frames]);
        self.scratch = scratch;
        &self.scratch[..frames]
    }

    /// Render interleaved frames, the mono signal duplicated to every channel.
    /// A trailing partial frame is left untouched.
    pub fn render_interleaved(&mut self, out: &mut [f32], channels: usize) {
        self.fill_interleaved(out, channels, |s| s);
    }

    /// Like [`render_interleaved`](Self::render_interleaved) for any sample
    /// type. Renders in blocks of at most `SCRATCH_FRAMES`, so it never allocates.
    pub fn fill_interleaved<T: Copy>(&mut self, out: &mut [T], channels: usize, convert: impl Fn(f32) -> T) {
        let channels = channels.max(1);
        let frames = out.len() / channels;
        let mut scratch = core::mem::take(&mut self.scratch);
        for block in out[..frames * channels].chunks_mut(SCRATCH_FRAMES * channels) {
            let mono = &mut scratch[..block.len() / channels];
            self.render(mono);
            for (frame, s) in block.chunks_exact_mut(channels).zip(mono.iter()) {
                frame.fill(convert(*s));
            }
        }
        self.scratch = scratch;
    }

    /// Run the render path for `samples` without keeping the output.
    pub fn advance_samples(&mut self, mut samples: usize) {
        while samples > 0 {
            let n = samples.min(SCRATCH_FRAMES);
            self.render_frames(n);
            samples -= n;
        }
    }

    pub fn advance_ms(&mut self, ms: f32) {
        let n = ms_to_samples(ms, self.sample_rate());
        self.advance_samples(n as usize);
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "realtime")] {
        pub use device::{list_devices, DeviceOutput, OutputDevice};

        mod device {
            use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
            use tracing::{error, info};

            use super::Renderer;
            use crate::error::EngineError;

            /// Names of every output device on the default host.
            pub fn list_devices() -> Result<Vec<String>, EngineError> {
                let host = cpal::default_host();
                let mut names = Vec::new();
                for dev in host.output_devices()? {
                    names.push(dev.name()?);
                }
                Ok(names)
            }

            /// A selected device with its default configuration, not yet streaming.
            pub struct OutputDevice {
                device: cpal::Device,
                config: cpal::SupportedStreamConfig,
                name: String,
            }

            impl OutputDevice {
                /// Open `name`, or the host default when `None`.
                pub fn open(name: Option<&str>) -> Result<Self, EngineError> {
                    let host = cpal::default_host();
                    let device = match name {
                        Some(want) => {
                            let mut found = None;
                            for d in host.output_devices()? {
                                if d.name()? == want {
                                    found = Some(d);
                                    break;
                                }
                            }
                            found.ok_or_else(|| EngineError::DeviceNotFound(want.to_owned()))?
                        }
                        None => host.default_output_device().ok_or_else(|| {
                            EngineError::OutputUnavailable("no default output device".into())
                        })?,
                    };
                    let config = device.default_output_config()?;
                    let name = device.name()?;
                    Ok(Self { device, config, name })
                }

                #[inline] pub fn name(&self) -> &str { &self.name }

                #[allow(clippy::cast_precision_loss)]
                #[inline] pub fn sample_rate(&self) -> f32 { self.config.sample_rate().0 as f32 }

                #[inline] pub fn channels(&self) -> u16 { self.config.channels() }

                /// Move `renderer` into the device callback and start playing.
                pub fn start(self, renderer: Renderer) -> Result<DeviceOutput, EngineError> {
                    let format = self.config.sample_format();
                    let cfg: cpal::StreamConfig = self.config.config();
                    let stream = match format {
                        cpal::SampleFormat::F32 => build_stream::<f32>(&self.device, &cfg, renderer)?,
                        cpal::SampleFormat::I16 => build_stream::<i16>(&self.device, &cfg, renderer)?,
                        cpal::SampleFormat::U16 => build_stream::<u16>(&self.device, &cfg, renderer)?,
                        other => return Err(EngineError::UnsupportedFormat(other)),
                    };
                    stream.play()?;
                    info!(device = %self.name, sr = cfg.sample_rate.0, channels = cfg.channels, ?format, "output stream started");
                    Ok(DeviceOutput {
                        _stream: stream,
                        name: self.name,
                        sample_rate: cfg.sample_rate.0,
                        channels: cfg.channels,
                    })
                }
            }

            fn build_stream<T>(
                device: &cpal::Device,
                cfg: &cpal::StreamConfig,
                mut renderer: Renderer,
            ) -> Result<cpal::Stream, EngineError>
            where
                T: cpal::SizedSample + cpal::FromSample<f32> + Send + 'static,
            {
                let channels = usize::from(cfg.channels).max(1);
                let stream = device.build_output_stream(
                    cfg,
                    move |output: &mut [T], _| {
                        renderer.fill_interleaved(output, channels, |s: f32| T::from_sample(s));
                    },
                    |e: cpal::StreamError| error!(error = %e, "output stream error"),
                    None,
                )?;
                Ok(stream)
            }

            /// A running output stream. Dropping it stops playback and frees the device.
            pub struct DeviceOutput {
                _stream: cpal::Stream,
                name: String,
                sample_rate: u32,
                channels: u16,
            }

            impl DeviceOutput {
                #[inline] pub fn name(&self) -> &str { &self.name }
                #[inline] pub fn sample_rate(&self) -> u32 { self.sample_rate }
                #[inline] pub fn channels(&self) -> u16 { self.channels }
            }

            impl core::fmt::Debug for DeviceOutput {
                fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                    f.debug_struct("DeviceOutput")
                        .field("name", &self.name)
                        .field("sample_rate", &self.sample_rate)
                        .field("channels", &self.channels)
                        .finish()
                }
            }
        }
    }
}
