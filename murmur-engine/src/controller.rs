//! Public control surface.
//!
//! [`SoundController`] is what the surrounding application talks to. It keeps
//! a mirror of each texture's intent (active, preferred volume) and forwards
//! every change to the render side as a [`Command`]. Nothing here blocks on
//! audio: synthesis runs on background threads and hands its buffer straight
//! to the bus.
//!
//! Repeated toggles follow one rule: the last toggle wins, and a layer that is
//! still fading is retargeted from its current gain rather than restarted.

use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::bus::{effective_gain, BusEvent, Command, MixingBus, PlaybackState};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::output::{self, BusLink, Renderer};
use crate::texture::{TextureId, TextureSynthesizer};
use murmur_core::dsp::clamp01;

/// Outcome of a control operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[must_use]
pub enum Status {
    Applied,
    /// No output is available (startup failure or after teardown); nothing changed.
    Unavailable,
}

impl Status {
    #[inline] pub fn is_applied(self) -> bool { self == Status::Applied }
}

/// What a UI needs to draw one texture.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LayerStatus {
    pub active: bool,
    /// Preferred volume; kept while inactive.
    pub volume: f32,
    pub playback: PlaybackState,
    /// Gain the layer resolves to; 0 when inactive.
    pub effective_gain: f32,
}

/// Snapshot returned by [`SoundController::state`].
#[derive(Clone, Debug, PartialEq)]
pub struct EngineState {
    pub available: bool,
    pub master: f32,
    pub muted: bool,
    pub layers: [LayerStatus; TextureId::COUNT],
}

impl EngineState {
    #[inline]
    pub fn layer(&self, id: TextureId) -> &LayerStatus {
        &self.layers[id.index()]
    }

    /// Ids the caller has switched on.
    pub fn active(&self) -> impl Iterator<Item = TextureId> + '_ {
        TextureId::ALL.into_iter().filter(|id| self.layer(*id).active)
    }
}

#[derive(Copy, Clone, Debug)]
struct Slot {
    active: bool,
    volume: f32,
    playback: PlaybackState,
    generation: u64,
    /// The bus has reported this layer playing and not yet released it.
    buffered: bool,
    /// Revived without a synthesis job; one is started if the bus released first.
    revived: bool,
}

enum Backend {
    Disabled,
    Offline,
    #[cfg(feature = "realtime")]
    Device(output::DeviceOutput),
}

pub struct SoundController {
    link: Option<BusLink>,
    backend: Backend,
    synth: TextureSynthesizer,
    master: f32,
    muted: bool,
    slots: [Slot; TextureId::COUNT],
    next_generation: u64,
    jobs: Vec<JoinHandle<()>>,
}

impl core::fmt::Debug for SoundController {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SoundController")
            .field("available", &self.is_available())
            .field("master", &self.master)
            .field("muted", &self.muted)
            .field("pending_jobs", &self.jobs.len())
            .finish_non_exhaustive()
    }
}

impl SoundController {
    fn with_backend(cfg: &EngineConfig, sr: f32, link: Option<BusLink>, backend: Backend) -> Self {
        let slot = Slot {
            active: false,
            volume: cfg.default_volume,
            playback: PlaybackState::Stopped,
            generation: 0,
            buffered: false,
            revived: false,
        };
        Self {
            link,
            backend,
            synth: TextureSynthesizer::new(sr, cfg.seed),
            master: cfg.master_volume,
            muted: cfg.muted,
            slots: [slot; TextureId::COUNT],
            next_generation: 0,
            jobs: Vec::new(),
        }
    }

    fn new_bus(cfg: &EngineConfig, sr: f32) -> MixingBus {
        MixingBus::new(sr, cfg.ramps, cfg.master_volume, cfg.muted)
    }

    /// Controller with no output. Every operation reports [`Status::Unavailable`].
    #[allow(clippy::cast_precision_loss)]
    pub fn disabled(reason: &str) -> Self {
        warn!(reason, "audio output unavailable; sound engine disabled");
        let cfg = EngineConfig::default();
        Self::with_backend(&cfg, cfg.sample_rate as f32, None, Backend::Disabled)
    }

    /// Controller whose render side is pulled by the caller.
    #[allow(clippy::cast_precision_loss)]
    pub fn offline(config: &EngineConfig) -> (Self, Renderer) {
        let cfg = config.sanitized();
        let sr = cfg.sample_rate as f32;
        let (link, renderer) = output::link(Self::new_bus(&cfg, sr), sr);
        (Self::with_backend(&cfg, sr, Some(link), Backend::Offline), renderer)
    }

    /// Open the configured output device and start streaming silence.
    pub fn try_init(config: &EngineConfig) -> Result<Self, EngineError> {
        let cfg = config.sanitized();
        cfg_if::cfg_if! {
            if #[cfg(feature = "realtime")] {
                let device = output::OutputDevice::open(cfg.device.as_deref())?;
                let sr = device.sample_rate();
                let (link, renderer) = output::link(Self::new_bus(&cfg, sr), sr);
                let out = device.start(renderer)?;
                Ok(Self::with_backend(&cfg, sr, Some(link), Backend::Device(out)))
            } else {
                let _ = cfg;
                Err(EngineError::OutputUnavailable("built without the `realtime` feature".into()))
            }
        }
    }

    /// Like [`try_init`](Self::try_init), falling back to a disabled controller.
    pub fn init(config: &EngineConfig) -> Self {
        match Self::try_init(config) {
            Ok(c) => c,
            Err(e) => Self::disabled(&e.to_string()),
        }
    }

    #[inline]
    pub fn is_available(&self) -> bool {
        self.link.is_some()
    }

    /// Name of the output device, when streaming to one.
    pub fn output_name(&self) -> Option<&str> {
        match &self.backend {
            #[cfg(feature = "realtime")]
            Backend::Device(d) => Some(d.name()),
            _ => None,
        }
    }

    fn send(&self, cmd: Command) -> Status {
        match &self.link {
            Some(link) => match link.commands.send(cmd) {
                Ok(()) => Status::Applied,
                Err(_) => {
                    warn!("render side has gone away");
                    Status::Unavailable
                }
            },
            None => Status::Unavailable,
        }
    }

    /// Fold render-side notifications into the slot mirror. Returned buffers are freed here.
    fn pump_events(&mut self) {
        let Some(link) = &self.link else { return };
        let mut respawn = [None; TextureId::COUNT];
        while let Ok(ev) = link.events.try_recv() {
            match ev {
                BusEvent::Playing { id, generation } => {
                    let slot = &mut self.slots[id.index()];
                    if slot.active && slot.generation == generation {
                        slot.playback = PlaybackState::Playing;
                        slot.buffered = true;
                        slot.revived = false;
                        debug!(texture = %id, generation, "layer playing");
                    }
                }
                BusEvent::Released { id, generation, buffer } => {
                    let slot = &mut self.slots[id.index()];
                    slot.buffered = false;
                    if !slot.active && slot.generation == generation {
                        slot.playback = PlaybackState::Stopped;
                    } else if slot.active && slot.revived && slot.generation != generation {
                        // fade-out finished before the revive reached the bus
                        slot.revived = false;
                        respawn[id.index()] = Some(slot.generation);
                    }
                    debug!(texture = %id, generation, samples = buffer.as_ref().map_or(0, Vec::len), "layer released");
                }
                BusEvent::Discarded { id, generation, buffer } => {
                    debug!(texture = %id, generation, samples = buffer.len(), "unused buffer discarded");
                }
            }
        }
        for (id, generation) in TextureId::ALL.into_iter().zip(respawn) {
            if let Some(generation) = generation {
                self.spawn_synthesis(id, generation);
            }
        }
        self.jobs.retain(|h| !h.is_finished());
    }

    fn spawn_synthesis(&mut self, id: TextureId, generation: u64) {
        let Some(link) = &self.link else { return };
        let synth = self.synth;
        let tx = link.commands.clone();
        let job = thread::Builder::new()
            .name(format!("murmur-synth-{id}"))
            .spawn(move || {
                let buffer = synth.render(id, generation);
                let _ = tx.send(Command::Attach { id, generation, buffer });
            });
        match job {
            Ok(handle) => self.jobs.push(handle),
            Err(e) => {
                warn!(texture = %id, error = %e, "cannot spawn synthesis thread; rendering inline");
                let buffer = synth.render(id, generation);
                let _ = self.send(Command::Attach { id, generation, buffer });
            }
        }
    }

    /// Switch a texture on or off.
    pub fn toggle(&mut self, id: TextureId) -> Status {
        if !self.is_available() {
            return Status::Unavailable;
        }
        self.pump_events();
        let slot = self.slots[id.index()];
        if slot.active {
            debug!(texture = %id, from = ?slot.playback, "deactivate");
            let status = self.send(Command::Deactivate { id });
            if status.is_applied() {
                let slot = &mut self.slots[id.index()];
                slot.active = false;
                slot.playback = PlaybackState::FadingOut;
            }
            status
        } else {
            // a fading-out layer still holds its buffer and is revived in place
            let revive = slot.playback == PlaybackState::FadingOut && slot.buffered;
            self.next_generation += 1;
            let generation = self.next_generation;
            debug!(texture = %id, generation, from = ?slot.playback, "activate");
            let status = self.send(Command::Activate { id, generation, volume: slot.volume });
            if status.is_applied() {
                self.slots[id.index()] = Slot {
                    active: true,
                    playback: PlaybackState::FadingIn,
                    generation,
                    revived: revive,
                    ..slot
                };
                if !revive {
                    self.spawn_synthesis(id, generation);
                }
            }
            status
        }
    }

    /// Set a texture's preferred volume, clamped to [0, 1]. Kept while inactive.
    pub fn set_volume(&mut self, id: TextureId, volume: f32) -> Status {
        if !self.is_available() {
            return Status::Unavailable;
        }
        let volume = clamp01(volume);
        self.slots[id.index()].volume = volume;
        self.send(Command::SetVolume { id, volume })
    }

    pub fn set_master_volume(&mut self, volume: f32) -> Status {
        if !self.is_available() {
            return Status::Unavailable;
        }
        self.master = clamp01(volume);
        self.send(Command::SetMaster(self.master))
    }

    pub fn set_muted(&mut self, muted: bool) -> Status {
        if !self.is_available() {
            return Status::Unavailable;
        }
        self.muted = muted;
        self.send(Command::SetMuted(muted))
    }

    /// Gain `id` resolves to under the current settings.
    pub fn effective_gain(&self, id: TextureId) -> f32 {
        let slot = &self.slots[id.index()];
        if slot.active && self.is_available() {
            effective_gain(slot.volume, self.master, self.muted)
        } else {
            0.0
        }
    }

    /// Current per-texture state plus master settings.
    pub fn state(&mut self) -> EngineState {
        self.pump_events();
        let layers = TextureId::ALL.map(|id| {
            let slot = &self.slots[id.index()];
            LayerStatus {
                active: slot.active,
                volume: slot.volume,
                playback: slot.playback,
                effective_gain: self.effective_gain(id),
            }
        });
        EngineState { available: self.is_available(), master: self.master, muted: self.muted, layers }
    }

    /// Block until every in-flight synthesis job has posted its buffer.
    pub fn wait_for_synthesis(&mut self) {
        for job in self.jobs.drain(..) {
            if job.join().is_err() {
                warn!("synthesis thread panicked");
            }
        }
    }

    /// Stop every layer at once and release the output. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        if self.link.is_none() {
            return;
        }
        // queue pending buffers ahead of the stop so none outlives it
        self.wait_for_synthesis();
        let _ = self.send(Command::StopAll);
        // stop the stream while the event channel is still open
        self.backend = Backend::Disabled;
        self.pump_events();
        self.link = None;
        for slot in &mut self.slots {
            slot.active = false;
            slot.playback = PlaybackState::Stopped;
            slot.buffered = false;
            slot.revived = false;
        }
        debug!("sound engine torn down");
    }
}

impl Drop for SoundController {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> (SoundController, Renderer) {
        SoundController::offline(&EngineConfig::default().with_sample_rate(1_000).with_seed(2))
    }

    #[test]
    fn revive_of_a_playing_layer_reuses_its_buffer() {
        let (mut ctl, mut r) = engine();
        let _ = ctl.toggle(TextureId::Ocean);
        ctl.wait_for_synthesis();
        r.advance_ms(500.0);
        let _ = ctl.toggle(TextureId::Ocean);
        r.advance_ms(100.0);

        let _ = ctl.toggle(TextureId::Ocean);
        assert!(ctl.jobs.is_empty(), "revive started a synthesis job");
        r.advance_ms(500.0);
        let st = ctl.state();
        assert_eq!(st.layer(TextureId::Ocean).playback, PlaybackState::Playing);
        assert_eq!(r.bus().layer(TextureId::Ocean).map(|l| l.gain()), Some(0.5));
    }

    #[test]
    fn revive_before_any_buffer_still_synthesizes() {
        let (mut ctl, mut r) = engine();
        let _ = ctl.toggle(TextureId::Birds);
        let _ = ctl.toggle(TextureId::Birds);
        let _ = ctl.toggle(TextureId::Birds);
        // never reported playing, so the revive cannot count on a buffer
        assert!(!ctl.slots[TextureId::Birds.index()].revived);
        ctl.wait_for_synthesis();
        r.advance_ms(500.0);
        assert_eq!(ctl.state().layer(TextureId::Birds).playback, PlaybackState::Playing);
    }

    #[test]
    fn teardown_clears_every_slot() {
        let (mut ctl, mut r) = engine();
        let _ = ctl.toggle(TextureId::Rain);
        ctl.wait_for_synthesis();
        r.advance_ms(100.0);
        ctl.teardown();
        assert!(!ctl.is_available());
        assert!(ctl.slots.iter().all(|s| !s.active && !s.buffered));
        r.advance_samples(1);
        assert_eq!(r.bus().active_count(), 0);
    }
}
