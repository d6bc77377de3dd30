//! Noise generators: the raw material of every texture.
//!
//! Every generator fills a caller-provided slice from a caller-provided
//! `rand::Rng`, keeps no state between calls and never allocates. Feeding two
//! generators identically seeded RNGs yields comparable buffers, which is how
//! the tests contrast colors.
//!
//! Loop readiness
//! - Recursive colors (brown, pink) run a warm-up pass over their white input
//!   before writing, so the recursion state at sample 0 matches the state at
//!   the last sample.
//! - Events near the end of the buffer wrap around to its start.
//! - Modulation and gate periods are snapped to a whole number of cycles.

use rand::Rng;

use crate::dsp::{fast_sin, fill_sine, ms_to_samples, snap_period, wrap_phase01, TAU};
use crate::envelopes::ArExp;
use crate::filters::OnePoleLP;

/// Leak constant `k` of the brown integrator `y = (y + k·w) / (1 + k)`.
pub const BROWN_LEAK: f32 = 0.02;
/// Make-up gain for the integrator's low-pass attenuation.
pub const BROWN_GAIN: f32 = 3.5;

/// Paul Kellet's pink filter: `(decay, gain)` per state `b0..b5`.
const PINK_POLES: [(f32, f32); 6] = [
    (0.99886, 0.055_517_9),
    (0.99332, 0.075_075_9),
    (0.96900, 0.153_852_0),
    (0.86650, 0.310_485_6),
    (0.55000, 0.532_952_2),
    (-0.7616, -0.016_898_0),
];
const PINK_WHITE: f32 = 0.5362;
const PINK_GAIN: f32 = 0.11;

// ------------------------------------ Specs --------------------------------------

/// Slow sinusoidal amplitude envelope (swell, gusts).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Modulation {
    /// Cycle length in seconds (snapped to fit the buffer).
    pub period_s: f32,
    /// 0 = untouched, 1 = envelope swings all the way to silence.
    pub depth: f32,
}

/// What a sparse event writes into the buffer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ImpulseEvent {
    /// Short stretch of elevated noise decaying linearly to the floor.
    Burst {
        amplitude: f32,
        length_ms: f32,
    },
    /// Exponentially decaying sine sweep from a random start frequency.
    Chirp {
        low_hz: f32,
        high_hz: f32,
        /// End frequency as a ratio of the start frequency.
        sweep: f32,
        amplitude: f32,
        decay_ms: f32,
        length_ms: f32,
    },
}

/// Low continuous floor with randomly injected events.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Sparse {
    pub floor: f32,
    /// Per-sample probability of starting an event.
    pub probability: f32,
    pub event: ImpulseEvent,
}

/// Floor noise plus a steady tone switched by a smooth periodic gate.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GatedTone {
    pub floor: f32,
    pub tone_hz: f32,
    pub amplitude: f32,
    pub gate_period_s: f32,
    /// Fraction of each gate period during which the tone sounds.
    pub duty: f32,
}

// ---------------------------------- Generators -----------------------------------

/// Independent uniform samples in [-1, 1).
#[inline]
pub fn white<R: Rng + ?Sized>(out: &mut [f32], rng: &mut R) {
    for s in out.iter_mut() {
        *s = rng.gen::<f32>() * 2.0 - 1.0;
    }
}

/// Leaky-integrated white noise (≈ −6 dB/octave above the leak corner).
pub fn brown<R: Rng + ?Sized>(out: &mut [f32], rng: &mut R) {
    white(out, rng);
    // (y + k w) / (1 + k) is a one-pole low-pass with a = k / (1 + k)
    let mut lp = OnePoleLP::with_coeff(BROWN_LEAK / (1.0 + BROWN_LEAK));
    for &w in out.iter() {
        lp.process(w);
    }
    for s in out.iter_mut() {
        *s = lp.process(*s) * BROWN_GAIN;
    }
}

#[derive(Copy, Clone, Debug, Default)]
struct Kellet {
    b: [f32; 6],
}

impl Kellet {
    #[inline]
    fn tick(&mut self, w: f32) -> f32 {
        let mut sum = 0.0;
        for (b, &(decay, gain)) in self.b.iter_mut().zip(PINK_POLES.iter()) {
            *b = decay * *b + gain * w;
            sum += *b;
        }
        (sum + w * PINK_WHITE) * PINK_GAIN
    }
}

/// Six-state pink approximation (≈ −3 dB/octave).
pub fn pink<R: Rng + ?Sized>(out: &mut [f32], rng: &mut R) {
    white(out, rng);
    let mut k = Kellet::default();
    for &w in out.iter() {
        k.tick(w);
    }
    for s in out.iter_mut() {
        *s = k.tick(*s);
    }
}

/// Multiply `out` by `(1 - depth) + depth * ½(1 + sin(2π t / period))`.
#[allow(clippy::cast_precision_loss)]
pub fn modulate(out: &mut [f32], sr: f32, m: Modulation) {
    let sr = sr.max(1.0);
    let span = out.len() as f32 / sr;
    let depth = m.depth.clamp(0.0, 1.0);
    let period = snap_period(m.period_s, span);
    if period <= 0.0 {
        return;
    }
    let inc = 1.0 / (period * sr);
    for (i, s) in out.iter_mut().enumerate() {
        let p = wrap_phase01(i as f32 * inc);
        let env = (1.0 - depth) + depth * 0.5 * (1.0 + fast_sin(TAU * p));
        *s *= env;
    }
}

/// Noise floor plus events started with per-sample probability `spec.probability`.
pub fn sparse<R: Rng + ?Sized>(out: &mut [f32], rng: &mut R, sr: f32, spec: &Sparse) {
    white(out, rng);
    for s in out.iter_mut() {
        *s *= spec.floor;
    }
    if out.is_empty() || spec.probability <= 0.0 {
        return;
    }
    for start in 0..out.len() {
        if rng.gen::<f32>() < spec.probability {
            write_event(out, start, rng, sr, &spec.event);
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn write_event<R: Rng + ?Sized>(out: &mut [f32], start: usize, rng: &mut R, sr: f32, ev: &ImpulseEvent) {
    let n = out.len();
    match *ev {
        ImpulseEvent::Burst { amplitude, length_ms } => {
            let len = (ms_to_samples(length_ms, sr) as usize).max(1);
            let level = amplitude * rng.gen_range(0.5f32..=1.0);
            for j in 0..len {
                let env = 1.0 - j as f32 / len as f32;
                out[(start + j) % n] += level * env * (rng.gen::<f32>() * 2.0 - 1.0);
            }
        }
        ImpulseEvent::Chirp { low_hz, high_hz, sweep, amplitude, decay_ms, length_ms } => {
            let len = (ms_to_samples(length_ms, sr) as usize).max(1);
            let f0 = if high_hz > low_hz { rng.gen_range(low_hz..high_hz) } else { low_hz };
            let mut env = ArExp::new(1.0, decay_ms, sr);
            env.trigger();
            let mut phase = 0.0f32;
            for j in 0..len {
                let t = j as f32 / len as f32;
                let f = f0 * (1.0 + (sweep - 1.0) * t);
                out[(start + j) % n] += amplitude * env.next() * fast_sin(phase);
                phase += TAU * f / sr;
                if phase > TAU {
                    phase -= TAU;
                }
            }
        }
    }
}

/// Floor noise plus a gated steady tone (crickets).
#[allow(clippy::cast_precision_loss)]
pub fn gated_tone<R: Rng + ?Sized>(out: &mut [f32], rng: &mut R, sr: f32, spec: &GatedTone) {
    let sr = sr.max(1.0);
    let span = out.len() as f32 / sr;
    if out.is_empty() {
        return;
    }
    // whole number of tone cycles and gate periods per buffer
    let tone_hz = (spec.tone_hz * span).round().max(1.0) / span;
    let period = snap_period(spec.gate_period_s, span);
    let duty = spec.duty.clamp(0.01, 1.0);

    let mut phase = 0.0;
    fill_sine(out, &mut phase, TAU * tone_hz / sr);

    let gate_inc = 1.0 / (period * sr);
    for (i, s) in out.iter_mut().enumerate() {
        let p = wrap_phase01(i as f32 * gate_inc);
        let gate = if p < duty {
            let w = fast_sin(core::f32::consts::PI * p / duty);
            w * w
        } else {
            0.0
        };
        let floor = spec.floor * (rng.gen::<f32>() * 2.0 - 1.0);
        *s = spec.amplitude * gate * *s + floor;
    }
}

// ------------------------------------ Tests --------------------------------------
