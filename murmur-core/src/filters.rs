//! Filters: a one-pole smoother and the TPT state-variable filter stage.
//!
//! Goals
//! - `no_std`-friendly, allocation free
//! - Stable, musically-pleasant responses
//! - Clear APIs and predictable parameterization
//!
//! Contents
//! - `OnePoleLP`   : “RC-style” one-pole low-pass (also the brown-noise integrator)
//! - `FilterKind`  : LP/HP/BP taps of the SVF
//! - `FilterSpec`  : static description of one shaping stage (kind, cutoff, Q)
//! - `SvfTpt`      : State-Variable Filter via Topology Preserving Transform
//! - `FilterStage` : an `SvfTpt` bound to a `FilterSpec`, streaming or offline
//!
//! Notes
//! - `OnePoleLP` uses the inexpensive `y += a * (x - y)` form, where
//!   `a = 1 - exp(-2π fc / sr)`.
//! - `SvfTpt` uses the “g = tan(π fc / sr)” formulation with `R = 1/(2Q)`.
//!   It is robust to high resonance and parameter modulation.
//! - `FilterStage::apply_looped` runs a warm-up pass first so the filter state
//!   at the start of the buffer equals the state at its end; the result loops
//!   without a seam.

use crate::dsp::{kill_denormals, m_exp, tpt_g, TAU};
use core::fmt::Debug;

/// Butterworth Q, used by lowpass/highpass stages unless a recipe overrides it.
pub const Q_BUTTERWORTH: f32 = core::f32::consts::FRAC_1_SQRT_2;

/// One-pole low-pass `y += a * (x - y)`.
///
/// `a` is derived from cutoff (Hz) and sample rate:
/// `a = 1 - exp(-2π * fc / sr)`.
#[derive(Copy, Clone, Debug)]
pub struct OnePoleLP {
    a: f32,
    y: f32,
}

impl OnePoleLP {
    /// Create a low-pass with cutoff `cut_hz` and sample rate `sr`.
    #[inline]
    pub fn new(cut_hz: f32, sr: f32) -> Self {
        let fc = cut_hz.max(0.0).min(0.499 * sr.max(1.0));
        Self::with_coeff(1.0 - m_exp(-TAU * fc / sr.max(1.0)))
    }

    /// Create a low-pass from the raw smoothing coefficient `a` in (0, 1].
    #[inline]
    pub fn with_coeff(a: f32) -> Self {
        Self { a: a.clamp(0.0, 1.0), y: 0.0 }
    }

    /// Process one sample.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        self.y += self.a * (x - self.y);
        kill_denormals(self.y)
    }

    #[inline] pub fn value(&self) -> f32 { self.y }
}

/// SVF output tap selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FilterKind {
    Lowpass,
    Highpass,
    Bandpass,
}

/// One frequency-shaping stage: tap, cutoff/center (Hz) and resonance.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FilterSpec {
    pub kind: FilterKind,
    pub cutoff_hz: f32,
    pub q: f32,
}

impl FilterSpec {
    pub const fn lowpass(cutoff_hz: f32) -> Self {
        Self { kind: FilterKind::Lowpass, cutoff_hz, q: Q_BUTTERWORTH }
    }

    pub const fn highpass(cutoff_hz: f32) -> Self {
        Self { kind: FilterKind::Highpass, cutoff_hz, q: Q_BUTTERWORTH }
    }

    pub const fn bandpass(center_hz: f32, q: f32) -> Self {
        Self { kind: FilterKind::Bandpass, cutoff_hz: center_hz, q }
    }
}

/// Topology-Preserving Transform SVF (State-Variable Filter).
///
/// Parameters:
/// - `cut_hz`  : cutoff / center frequency in Hz
/// - `q`       : quality factor (>= ~0.5 typical; lower increases damping)
///
/// Internals:
/// - `g = tan(π fc / sr)`
/// - `R = 1 / (2Q)`
///
/// This implementation follows common SVF/TPT references (Vadim Zavalishin et al.).
#[derive(Copy, Clone, Debug)]
pub struct SvfTpt {
    sr: f32,
    cut: f32,
    q: f32,
    // derived
    g: f32,
    r: f32,
    // states
    ic1eq: f32,
    ic2eq: f32,
}

impl SvfTpt {
    #[inline]
    pub fn new(cut_hz: f32, q: f32, sr: f32) -> Self {
        let mut s = Self {
            sr: sr.max(1.0),
            cut: cut_hz.max(0.0),
            q: q.max(1e-4),
            g: 0.0,
            r: 0.0,
            ic1eq: 0.0,
            ic2eq: 0.0,
        };
        s.recalc();
        s
    }

    #[inline]
    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }

    #[inline]
    fn recalc(&mut self) {
        self.g = tpt_g(self.cut, self.sr);       // tan(π fc / sr)
        self.r = 1.0 / (2.0 * self.q);           // damping
    }

    /// Process one sample, returning the `(lp, bp, hp)` taps.
    ///
    /// The band-pass tap is scaled by `2R` so its peak gain is unity at the center frequency.
    #[inline]
    pub fn process_all(&mut self, x: f32) -> (f32, f32, f32) {
        // Solved TPT SVF (Zavalishin):
        // hp  = (x - (2R + g) s1 - s2) / (1 + 2R g + g²)
        // bp  = g hp + s1 ;  s1' = g hp + bp
        // lp  = g bp + s2 ;  s2' = g bp + lp
        let g = self.g;
        let two_r = 2.0 * self.r;
        let hp = (x - (two_r + g) * self.ic1eq - self.ic2eq) / (1.0 + two_r * g + g * g);
        let v1 = g * hp;
        let bp = v1 + self.ic1eq;
        self.ic1eq = kill_denormals(bp + v1);
        let v2 = g * bp;
        let lp = v2 + self.ic2eq;
        self.ic2eq = kill_denormals(lp + v2);

        (lp, two_r * bp, hp)
    }

    /// Process one sample, returning only the tap requested.
    #[inline]
    pub fn process(&mut self, x: f32, kind: FilterKind) -> f32 {
        let (lp, bp, hp) = self.process_all(x);
        match kind {
            FilterKind::Lowpass => lp,
            FilterKind::Highpass => hp,
            FilterKind::Bandpass => bp,
        }
    }
}

/// A configured shaping stage. Interchangeable between streaming (`process`)
/// and offline (`apply`, `apply_looped`) use.
#[derive(Copy, Clone, Debug)]
pub struct FilterStage {
    spec: FilterSpec,
    svf: SvfTpt,
}

impl FilterStage {
    #[inline]
    pub fn new(spec: FilterSpec, sr: f32) -> Self {
        Self { spec, svf: SvfTpt::new(spec.cutoff_hz, spec.q, sr) }
    }

    #[inline] pub fn reset(&mut self) { self.svf.reset(); }

    /// Streaming form: one sample in, one sample out.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        self.svf.process(x, self.spec.kind)
    }

    /// Offline form: filter `buf` in place, continuing from the current state.
    pub fn apply(&mut self, buf: &mut [f32]) {
        for s in buf.iter_mut() {
            *s = self.process(*s);
        }
    }

    /// Offline form for loop buffers: warm the state over the whole buffer,
    /// then filter it in place. Prior state is discarded.
    pub fn apply_looped(&mut self, buf: &mut [f32]) {
        self.reset();
        for &s in buf.iter() {
            self.process(s);
        }
        self.apply(buf);
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// RMS of a settled sine at `hz` through `stage`.
    fn sine_gain(spec: FilterSpec, hz: f32, sr: f32) -> f32 {
        let mut stage = FilterStage::new(spec, sr);
        let n = sr as usize;
        let mut acc = 0.0f64;
        let mut cnt = 0usize;
        for i in 0..n {
            let cycles = (i as f64 * f64::from(hz) / f64::from(sr)).fract();
            let x = (core::f64::consts::TAU * cycles).sin() as f32;
            let y = stage.process(x);
            if i >= n / 2 {
                acc += f64::from(y * y);
                cnt += 1;
            }
        }
        // a unit sine has RMS 1/√2
        ((acc / cnt as f64).sqrt() * core::f64::consts::SQRT_2) as f32
    }

    #[test]
    fn one_pole_lp_moves_towards_input() {
        let sr = 48000.0;
        let mut lp = OnePoleLP::new(1000.0, sr);
        let mut y = 0.0;
        for _ in 0..(sr as usize) {
            y = lp.process(1.0);
        }
        assert!(y > 0.9, "y={}", y);
    }

    #[test]
    fn lowpass_passes_low_and_cuts_high() {
        let sr = 44_100.0;
        let spec = FilterSpec::lowpass(400.0);
        assert!(sine_gain(spec, 50.0, sr) > 0.9);
        assert!(sine_gain(spec, 400.0, sr) > 0.6 && sine_gain(spec, 400.0, sr) < 0.8);
        assert!(sine_gain(spec, 6_400.0, sr) < 0.01);
    }

    #[test]
    fn highpass_blocks_dc_and_passes_high() {
        let sr = 44_100.0;
        let mut stage = FilterStage::new(FilterSpec::highpass(200.0), sr);
        let mut y = 1.0;
        for _ in 0..(sr as usize) {
            y = stage.process(1.0);
        }
        assert!(y.abs() < 1e-3, "y={y}");
        assert!(sine_gain(FilterSpec::highpass(200.0), 4_000.0, sr) > 0.95);
    }

    #[test]
    fn bandpass_peaks_at_center() {
        let sr = 44_100.0;
        let spec = FilterSpec::bandpass(1_000.0, 0.3);
        let center = sine_gain(spec, 1_000.0, sr);
        assert!((center - 1.0).abs() < 0.05, "center={center}");
        assert!(sine_gain(spec, 60.0, sr) < center);
        assert!(sine_gain(spec, 15_000.0, sr) < center);
    }

    #[test]
    fn looped_apply_has_no_startup_transient() {
        let sr = 8_000.0;
        // one period of a 100 Hz sine, exactly 80 samples
        let mut buf: [f32; 80] = core::array::from_fn(|i| (TAU * i as f32 / 80.0).sin());
        let mut stage = FilterStage::new(FilterSpec::lowpass(1_000.0), sr);
        stage.apply_looped(&mut buf);
        let seam = (buf[0] - buf[79]).abs();
        let step = buf.windows(2).map(|w| (w[1] - w[0]).abs()).fold(0.0f32, f32::max);
        assert!(seam <= step * 1.5, "seam={seam} step={step}");
    }
}
