//! Mixing bus: layer registry, gain automation and the block mixer.
//!
//! The bus lives on the render side and is the only owner of every
//! [`SoundLayer`]. The control side never touches it directly; it sends
//! [`Command`]s and hears back through [`BusEvent`]s.
//!
//! Lifecycle of a layer
//! - `Activate` inserts it as pending (`FadingIn`, no buffer yet)
//! - `Attach` hands over the synthesized buffer and starts the fade-in
//! - the fade-in completing moves it to `Playing`
//! - `Deactivate` ramps it to zero; when that ramp lands the layer is removed
//!   and its buffer travels back in [`BusEvent::Released`]
//!
//! Gain changes never jump: every retarget starts from the ramp's current value.

use murmur_core::dsp::{clamp, clamp01, mix_in_place, ms_to_samples};
use murmur_core::envelopes::GainRamp;

use crate::config::RampTimes;
use crate::graph::Generator;
use crate::texture::TextureId;

/// Where a layer is in its life.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum PlaybackState {
    FadingIn,
    Playing,
    FadingOut,
    #[default]
    Stopped,
}

/// `clamp(volume × master × (muted ? 0 : 1), 0, 1)`.
#[inline]
pub fn effective_gain(volume: f32, master: f32, muted: bool) -> f32 {
    if muted {
        0.0
    } else {
        clamp01(clamp01(volume) * clamp01(master))
    }
}

// ------ Layer ------

/// One texture instance on the bus.
#[derive(Debug)]
pub struct SoundLayer {
    id: TextureId,
    generation: u64,
    buffer: Option<Vec<f32>>,
    volume: f32,
    state: PlaybackState,
    ramp: GainRamp,
    pos: usize,
}

impl SoundLayer {
    fn pending(id: TextureId, generation: u64, volume: f32) -> Self {
        Self {
            id,
            generation,
            buffer: None,
            volume: clamp01(volume),
            state: PlaybackState::FadingIn,
            ramp: GainRamp::new(0.0),
            pos: 0,
        }
    }

    #[inline] pub fn id(&self) -> TextureId { self.id }
    #[inline] pub fn generation(&self) -> u64 { self.generation }
    #[inline] pub fn state(&self) -> PlaybackState { self.state }
    #[inline] pub fn volume(&self) -> f32 { self.volume }
    /// Gain reached so far.
    #[inline] pub fn gain(&self) -> f32 { self.ramp.value() }
    /// Gain the ramp is heading for.
    #[inline] pub fn target_gain(&self) -> f32 { self.ramp.target() }
    #[inline] pub fn is_pending(&self) -> bool { self.buffer.is_none() }
    #[inline] pub fn position(&self) -> usize { self.pos }

    /// Add this layer into `out`, looping its buffer.
    fn mix_into(&mut self, out: &mut [f32]) {
        let Some(buf) = self.buffer.as_deref() else { return };
        if buf.is_empty() {
            return;
        }
        let mut done = 0;
        while done < out.len() {
            let n = (out.len() - done).min(buf.len() - self.pos);
            let dst = &mut out[done..done + n];
            let src = &buf[self.pos..self.pos + n];
            if self.ramp.is_settled() {
                let g = self.ramp.value();
                if g != 0.0 {
                    mix_in_place(dst, src, g);
                }
            } else {
                for (d, s) in dst.iter_mut().zip(src) {
                    *d += *s * self.ramp.next();
                }
            }
            done += n;
            self.pos = (self.pos + n) % buf.len();
        }
    }
}

// ------ Messages ------

/// Control → render.
#[derive(Debug)]
pub enum Command {
    /// Start (or revive) a layer. `generation` tags the synthesis job feeding it.
    Activate { id: TextureId, generation: u64, volume: f32 },
    /// Finished synthesis for `generation`.
    Attach { id: TextureId, generation: u64, buffer: Vec<f32> },
    Deactivate { id: TextureId },
    SetVolume { id: TextureId, volume: f32 },
    SetMaster(f32),
    SetMuted(bool),
    /// Drop every layer immediately, no ramps.
    StopAll,
}

/// Render → control.
#[derive(Debug)]
pub enum BusEvent {
    /// Fade-in completed.
    Playing { id: TextureId, generation: u64 },
    /// Layer removed. `buffer` is `None` when it never received one.
    Released { id: TextureId, generation: u64, buffer: Option<Vec<f32>> },
    /// A buffer arrived that no layer wanted (superseded generation or revived layer).
    Discarded { id: TextureId, generation: u64, buffer: Vec<f32> },
}

// ------ Bus ------

/// Ramp lengths resolved to samples.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct RampSamples {
    fade_in: u32,
    fade_out: u32,
    change: u32,
}

impl RampSamples {
    fn resolve(t: RampTimes, sr: f32) -> Self {
        Self {
            fade_in: ms_to_samples(t.fade_in_ms, sr),
            fade_out: ms_to_samples(t.fade_out_ms, sr),
            change: ms_to_samples(t.change_ms, sr),
        }
    }
}

pub struct MixingBus {
    sr: f32,
    times: RampTimes,
    ramps: RampSamples,
    master: f32,
    muted: bool,
    layers: [Option<SoundLayer>; TextureId::COUNT],
    events: Vec<BusEvent>,
}

impl core::fmt::Debug for MixingBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MixingBus")
            .field("sr", &self.sr)
            .field("master", &self.master)
            .field("muted", &self.muted)
            .field("layers", &self.active_count())
            .finish()
    }
}

impl MixingBus {
    pub fn new(sr: f32, times: RampTimes, master: f32, muted: bool) -> Self {
        let sr = sr.max(1.0);
        Self {
            sr,
            times,
            ramps: RampSamples::resolve(times, sr),
            master: clamp01(master),
            muted,
            layers: Default::default(),
            events: Vec::with_capacity(2 * TextureId::COUNT),
        }
    }

    #[inline] pub fn master(&self) -> f32 { self.master }
    #[inline] pub fn muted(&self) -> bool { self.muted }

    #[inline]
    pub fn layer(&self, id: TextureId) -> Option<&SoundLayer> {
        self.layers[id.index()].as_ref()
    }

    /// Layers currently held, including pending and fading-out ones.
    pub fn active_count(&self) -> usize {
        self.layers.iter().filter(|l| l.is_some()).count()
    }

    /// Lifecycle notifications produced since the last drain.
    pub fn drain_events(&mut self) -> impl Iterator<Item = BusEvent> + '_ {
        self.events.drain(..)
    }

    /// Point a layer's ramp at its current effective gain.
    fn retarget(ramps: RampSamples, master: f32, muted: bool, layer: &mut SoundLayer) {
        let target = effective_gain(layer.volume, master, muted);
        match layer.state {
            PlaybackState::FadingIn if layer.buffer.is_some() => {
                // keep the fade-in's end time, but never ramp faster than a change
                let n = layer.ramp.remaining().max(ramps.change);
                layer.ramp.retarget(target, n);
            }
            PlaybackState::Playing => layer.ramp.retarget(target, ramps.change),
            // pending layers pick the target up on attach; fading ones keep heading to zero
            _ => {}
        }
    }

    pub fn apply(&mut self, cmd: Command) {
        let (master, muted, ramps) = (self.master, self.muted, self.ramps);
        match cmd {
            Command::Activate { id, generation, volume } => {
                let slot = &mut self.layers[id.index()];
                match slot {
                    Some(layer) => {
                        layer.generation = generation;
                        layer.volume = clamp01(volume);
                        if layer.buffer.is_some() {
                            // revive: climb back from wherever the fade-out got to
                            layer.state = PlaybackState::FadingIn;
                            let target = effective_gain(layer.volume, master, muted);
                            layer.ramp.retarget(target, ramps.fade_in);
                        }
                    }
                    None => *slot = Some(SoundLayer::pending(id, generation, volume)),
                }
            }
            Command::Attach { id, generation, buffer } => {
                match &mut self.layers[id.index()] {
                    Some(layer) if layer.generation == generation && layer.buffer.is_none() => {
                        layer.buffer = Some(buffer);
                        layer.pos = 0;
                        let target = effective_gain(layer.volume, master, muted);
                        layer.ramp.retarget(target, ramps.fade_in);
                    }
                    _ => self.events.push(BusEvent::Discarded { id, generation, buffer }),
                }
            }
            Command::Deactivate { id } => {
                let slot = &mut self.layers[id.index()];
                match slot {
                    Some(layer) if layer.buffer.is_none() => {
                        let generation = layer.generation;
                        *slot = None;
                        self.events.push(BusEvent::Released { id, generation, buffer: None });
                    }
                    Some(layer) if layer.state != PlaybackState::FadingOut => {
                        layer.state = PlaybackState::FadingOut;
                        layer.ramp.retarget(0.0, ramps.fade_out);
                    }
                    _ => {}
                }
            }
            Command::SetVolume { id, volume } => {
                if let Some(layer) = &mut self.layers[id.index()] {
                    layer.volume = clamp01(volume);
                    Self::retarget(ramps, master, muted, layer);
                }
            }
            Command::SetMaster(v) => {
                self.master = clamp01(v);
                self.retarget_all();
            }
            Command::SetMuted(m) => {
                self.muted = m;
                self.retarget_all();
            }
            Command::StopAll => {
                for slot in &mut self.layers {
                    if let Some(layer) = slot.take() {
                        self.events.push(BusEvent::Released {
                            id: layer.id,
                            generation: layer.generation,
                            buffer: layer.buffer,
                        });
                    }
                }
            }
        }
    }

    fn retarget_all(&mut self) {
        let (master, muted, ramps) = (self.master, self.muted, self.ramps);
        for layer in self.layers.iter_mut().flatten() {
            Self::retarget(ramps, master, muted, layer);
        }
    }

    /// Mix every layer into `out` (overwritten), then settle lifecycle transitions.
    pub fn mix(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        for layer in self.layers.iter_mut().flatten() {
            layer.mix_into(out);
        }
        for s in out.iter_mut() {
            *s = clamp(*s, -1.0, 1.0);
        }

        for slot in &mut self.layers {
            let Some(layer) = slot else { continue };
            if layer.buffer.is_none() || !layer.ramp.is_settled() {
                continue;
            }
            match layer.state {
                PlaybackState::FadingIn => {
                    layer.state = PlaybackState::Playing;
                    self.events.push(BusEvent::Playing { id: layer.id, generation: layer.generation });
                }
                PlaybackState::FadingOut => {
                    if let Some(layer) = slot.take() {
                        self.events.push(BusEvent::Released {
                            id: layer.id,
                            generation: layer.generation,
                            buffer: layer.buffer,
                        });
                    }
                }
                _ => {}
            }
        }
    }
}

impl Generator for MixingBus {
    fn reset(&mut self, sr: f32) {
        self.sr = sr.max(1.0);
        self.ramps = RampSamples::resolve(self.times, self.sr);
    }

    fn next(&mut self) -> f32 {
        let mut one = [0.0f32; 1];
        self.mix(&mut one);
        one[0]
    }

    fn render(&mut self, out: &mut [f32]) {
        self.mix(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 1000.0;

    fn bus() -> MixingBus {
        // 1 kHz keeps ramp lengths readable: 500 / 500 / 100 samples
        MixingBus::new(SR, RampTimes::default(), 1.0, false)
    }

    fn ones(n: usize) -> Vec<f32> {
        vec![1.0; n]
    }

    fn run(bus: &mut MixingBus, n: usize) -> Vec<f32> {
        let mut out = vec![0.0; n];
        bus.mix(&mut out);
        out
    }

    fn start(bus: &mut MixingBus, id: TextureId, generation: u64, volume: f32) {
        bus.apply(Command::Activate { id, generation, volume });
        bus.apply(Command::Attach { id, generation, buffer: ones(64) });
    }

    #[test]
    fn effective_gain_formula() {
        assert_eq!(effective_gain(0.5, 0.5, false), 0.25);
        assert_eq!(effective_gain(0.5, 0.5, true), 0.0);
        assert_eq!(effective_gain(2.0, 1.0, false), 1.0);
        assert_eq!(effective_gain(f32::NAN, 1.0, false), 0.0);
    }

    #[test]
    fn pending_layer_is_silent_until_attached() {
        let mut b = bus();
        b.apply(Command::Activate { id: TextureId::Rain, generation: 1, volume: 0.5 });
        let out = run(&mut b, 100);
        assert!(out.iter().all(|&x| x == 0.0));
        assert!(b.layer(TextureId::Rain).is_some_and(SoundLayer::is_pending));
        assert_eq!(b.drain_events().count(), 0);
    }

    #[test]
    fn fade_in_reaches_target_then_reports_playing() {
        let mut b = bus();
        start(&mut b, TextureId::Rain, 1, 0.5);
        let out = run(&mut b, 500);
        assert!((out[499] - 0.5).abs() < 1e-6);
        let max_step = out.windows(2).map(|w| (w[1] - w[0]).abs()).fold(0.0, f32::max);
        assert!(max_step <= 0.5 / 500.0 + 1e-6);

        let layer = b.layer(TextureId::Rain).unwrap();
        assert_eq!(layer.state(), PlaybackState::Playing);
        let ev: Vec<_> = b.drain_events().collect();
        assert!(matches!(ev[..], [BusEvent::Playing { id: TextureId::Rain, generation: 1 }]));
    }

    #[test]
    fn fade_out_releases_buffer_on_completion() {
        let mut b = bus();
        start(&mut b, TextureId::Ocean, 1, 1.0);
        run(&mut b, 500);
        b.drain_events().for_each(drop);

        b.apply(Command::Deactivate { id: TextureId::Ocean });
        run(&mut b, 499);
        assert_eq!(b.layer(TextureId::Ocean).unwrap().state(), PlaybackState::FadingOut);
        assert_eq!(b.drain_events().count(), 0);

        run(&mut b, 1);
        assert!(b.layer(TextureId::Ocean).is_none());
        let ev: Vec<_> = b.drain_events().collect();
        assert!(matches!(&ev[..], [BusEvent::Released { buffer: Some(buf), .. }] if buf.len() == 64));
    }

    #[test]
    fn deactivate_mid_fade_in_continues_from_current_gain() {
        let mut b = bus();
        start(&mut b, TextureId::Rain, 1, 1.0);
        let a = run(&mut b, 250);
        b.apply(Command::Deactivate { id: TextureId::Rain });
        let c = run(&mut b, 10);
        assert!((c[0] - a[249]).abs() < 0.01, "{} -> {}", a[249], c[0]);
        assert!(c[9] < c[0]);
    }

    #[test]
    fn revive_during_fade_out_keeps_buffer_and_discards_new_one() {
        let mut b = bus();
        start(&mut b, TextureId::Wind, 1, 1.0);
        run(&mut b, 500);
        b.apply(Command::Deactivate { id: TextureId::Wind });
        let before = run(&mut b, 200);
        b.apply(Command::Activate { id: TextureId::Wind, generation: 2, volume: 1.0 });
        let after = run(&mut b, 10);
        assert!((after[0] - before[199]).abs() < 0.01);
        assert!(after[9] > after[0]);
        assert_eq!(b.layer(TextureId::Wind).unwrap().state(), PlaybackState::FadingIn);

        b.apply(Command::Attach { id: TextureId::Wind, generation: 2, buffer: ones(8) });
        let ev: Vec<_> = b.drain_events().collect();
        assert!(matches!(ev[..], [BusEvent::Playing { .. }, BusEvent::Discarded { generation: 2, .. }]));
    }

    #[test]
    fn deactivate_pending_removes_and_late_buffer_is_discarded() {
        let mut b = bus();
        b.apply(Command::Activate { id: TextureId::Birds, generation: 5, volume: 0.5 });
        b.apply(Command::Deactivate { id: TextureId::Birds });
        assert!(b.layer(TextureId::Birds).is_none());
        b.apply(Command::Attach { id: TextureId::Birds, generation: 5, buffer: ones(4) });
        assert!(b.layer(TextureId::Birds).is_none());
        let ev: Vec<_> = b.drain_events().collect();
        assert!(matches!(
            ev[..],
            [BusEvent::Released { buffer: None, .. }, BusEvent::Discarded { generation: 5, .. }]
        ));
    }

    #[test]
    fn stale_generation_is_discarded() {
        let mut b = bus();
        b.apply(Command::Activate { id: TextureId::Night, generation: 3, volume: 0.5 });
        b.apply(Command::Attach { id: TextureId::Night, generation: 2, buffer: ones(4) });
        assert!(b.layer(TextureId::Night).unwrap().is_pending());
        assert!(matches!(b.drain_events().next(), Some(BusEvent::Discarded { generation: 2, .. })));
    }

    #[test]
    fn master_and_mute_retarget_playing_layers() {
        let mut b = bus();
        start(&mut b, TextureId::Rain, 1, 0.5);
        start(&mut b, TextureId::Forest, 1, 1.0);
        run(&mut b, 500);

        b.apply(Command::SetMaster(0.0));
        run(&mut b, 100);
        for id in [TextureId::Rain, TextureId::Forest] {
            let l = b.layer(id).unwrap();
            assert_eq!(l.state(), PlaybackState::Playing);
            assert_eq!(l.gain(), 0.0);
        }

        b.apply(Command::SetMaster(1.0));
        run(&mut b, 100);
        assert_eq!(b.layer(TextureId::Rain).unwrap().gain(), 0.5);
        assert_eq!(b.layer(TextureId::Forest).unwrap().gain(), 1.0);

        b.apply(Command::SetMuted(true));
        let out = run(&mut b, 100);
        assert_eq!(out[99], 0.0);
    }

    #[test]
    fn change_during_fade_in_keeps_end_time() {
        let mut b = bus();
        start(&mut b, TextureId::Cafe, 1, 1.0);
        run(&mut b, 200);
        b.apply(Command::SetVolume { id: TextureId::Cafe, volume: 0.2 });
        let l = b.layer(TextureId::Cafe).unwrap();
        assert_eq!(l.target_gain(), 0.2);
        assert_eq!(l.state(), PlaybackState::FadingIn);
        run(&mut b, 300);
        let l = b.layer(TextureId::Cafe).unwrap();
        assert_eq!(l.state(), PlaybackState::Playing);
        assert_eq!(l.gain(), 0.2);
    }

    #[test]
    fn change_at_end_of_fade_in_uses_change_ramp() {
        let mut b = bus();
        start(&mut b, TextureId::Rain, 1, 1.0);
        let before = run(&mut b, 499);
        b.apply(Command::SetVolume { id: TextureId::Rain, volume: 0.0 });
        let after = run(&mut b, 100);

        let last = before[498];
        let max_step = (last / 100.0) + 1e-6;
        assert!((last - after[0]).abs() <= max_step, "jump {} -> {}", last, after[0]);
        let worst = after.windows(2).map(|w| (w[0] - w[1]).abs()).fold(0.0, f32::max);
        assert!(worst <= max_step, "step {worst}");
        assert_eq!(after[99], 0.0);
        assert_eq!(b.layer(TextureId::Rain).unwrap().state(), PlaybackState::Playing);
    }

    #[test]
    fn volume_change_during_fade_out_only_stores() {
        let mut b = bus();
        start(&mut b, TextureId::Rain, 1, 1.0);
        run(&mut b, 500);
        b.apply(Command::Deactivate { id: TextureId::Rain });
        b.apply(Command::SetVolume { id: TextureId::Rain, volume: 0.3 });
        let l = b.layer(TextureId::Rain).unwrap();
        assert_eq!(l.volume(), 0.3);
        assert_eq!(l.target_gain(), 0.0);
    }

    #[test]
    fn output_is_clamped() {
        let mut b = bus();
        for id in TextureId::ALL {
            b.apply(Command::Activate { id, generation: 1, volume: 1.0 });
            b.apply(Command::Attach { id, generation: 1, buffer: ones(32) });
        }
        let out = run(&mut b, 600);
        assert!(out.iter().all(|x| (-1.0..=1.0).contains(x)));
        assert_eq!(out[599], 1.0);
    }

    #[test]
    fn stop_all_hands_back_every_buffer() {
        let mut b = bus();
        start(&mut b, TextureId::Rain, 1, 1.0);
        b.apply(Command::Activate { id: TextureId::Night, generation: 1, volume: 1.0 });
        b.apply(Command::StopAll);
        assert_eq!(b.active_count(), 0);
        let released = b.drain_events().filter(|e| matches!(e, BusEvent::Released { .. })).count();
        assert_eq!(released, 2);
    }

    #[test]
    fn buffer_loops_across_blocks() {
        let mut b = MixingBus::new(SR, RampTimes { fade_in_ms: 0.0, ..RampTimes::default() }, 1.0, false);
        b.apply(Command::Activate { id: TextureId::Rain, generation: 1, volume: 1.0 });
        b.apply(Command::Attach { id: TextureId::Rain, generation: 1, buffer: vec![0.1, 0.2, 0.3] });
        let out = run(&mut b, 7);
        assert_eq!(out, vec![0.1, 0.2, 0.3, 0.1, 0.2, 0.3, 0.1]);
        assert_eq!(b.layer(TextureId::Rain).unwrap().position(), 1);
    }
}
