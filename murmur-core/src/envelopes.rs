//! Envelope generators and gain automation primitives.
//!
//! Provided envelopes:
//! - `GainRamp` : linear, retargetable parameter ramp (click-free layer gain)
//! - `ArExp`    : fast AR percussion envelope (exp attack/decay)
//!
//! All envelopes are `no_std` friendly and avoid heap allocations.
//! Each exposes a `next()` tick that advances by exactly one sample.

use core::fmt::Debug;
use crate::dsp::one_pole_coeff_ms;

// ---------------------------------- Gain ramp ------------------------------------

/// Linear ramp from the current value to a target over a fixed number of samples.
///
/// Retargeting always starts from the value reached so far, never from the
/// previous ramp's starting point, so a change of mind mid-ramp cannot jump.
/// After exactly `samples` ticks the value equals the target bit-for-bit.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GainRamp {
    value: f32,
    start: f32,
    target: f32,
    elapsed: u32,
    samples: u32,
}

impl GainRamp {
    /// A settled ramp holding `value`.
    #[inline]
    pub fn new(value: f32) -> Self {
        Self { value, start: value, target: value, elapsed: 0, samples: 0 }
    }

    /// Head for `target`, arriving after `samples` ticks. Zero samples snaps.
    #[inline]
    pub fn retarget(&mut self, target: f32, samples: u32) {
        self.start = self.value;
        self.target = target;
        self.elapsed = 0;
        self.samples = samples;
        if samples == 0 {
            self.value = target;
        }
    }

    /// Advance one sample and return the new value.
    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.elapsed < self.samples {
            self.elapsed += 1;
            self.value = if self.elapsed == self.samples { self.target } else { self.interpolate() };
        }
        self.value
    }

    /// Interpolated from the ramp's start, not accumulated.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn interpolate(&self) -> f32 {
        let t = f64::from(self.elapsed) / f64::from(self.samples);
        let (a, b) = (f64::from(self.start), f64::from(self.target));
        (a + (b - a) * t) as f32
    }

    #[inline] pub fn value(&self) -> f32 { self.value }
    #[inline] pub fn target(&self) -> f32 { self.target }
    #[inline] pub fn remaining(&self) -> u32 { self.samples - self.elapsed }
    #[inline] pub fn is_settled(&self) -> bool { self.elapsed == self.samples }
}

impl Default for GainRamp {
    fn default() -> Self {
        Self::new(0.0)
    }
}

// ------------------------------- AR (percussive) ---------------------------------

/// Exponential AR envelope for percussive sounds.
/// Attack and release are ms time constants (RC style). Calling `trigger()` restarts from zero.
#[derive(Copy, Clone, Debug)]
pub struct ArExp {
    atk_ms: f32,
    rel_ms: f32,
    sr:     f32,
    env:    f32,
    rising: bool,
    a_a:    f32,
    a_r:    f32,
}

impl ArExp {
    #[inline]
    pub fn new(atk_ms: f32, rel_ms: f32, sr: f32) -> Self {
        let mut s = Self {
            atk_ms: atk_ms.max(0.0), rel_ms: rel_ms.max(0.0), sr: sr.max(1.0),
            env: 0.0, rising: false,
            a_a: 0.0, a_r: 0.0,
        };
        s.recalc();
        s
    }

    #[inline] fn recalc(&mut self) {
        self.a_a = one_pole_coeff_ms(self.atk_ms, self.sr);
        self.a_r = one_pole_coeff_ms(self.rel_ms, self.sr);
    }

    /// Start from 0, go up, then decay.
    #[inline] pub fn trigger(&mut self) { self.env = 0.0; self.rising = true; }

    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.rising {
            self.env += (1.0 - self.env) * (1.0 - self.a_a);
            if self.env >= 0.9999 { self.rising = false; }
        } else {
            self.env += (0.0 - self.env) * (1.0 - self.a_r);
            if self.env <= 1e-5 { self.env = 0.0; }
        }
        self.env
    }

    #[inline] pub fn value(&self) -> f32 { self.env }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_lands_exactly_on_target() {
        let mut r = GainRamp::new(0.0);
        r.retarget(0.25, 22_050);
        for _ in 0..22_050 { r.next(); }
        assert_eq!(r.value(), 0.25);
        assert!(r.is_settled());
        // further ticks hold
        assert_eq!(r.next(), 0.25);
    }

    #[test]
    fn ramp_is_monotonic_and_bounded_per_sample() {
        let n = 4_410;
        let mut r = GainRamp::new(0.9);
        r.retarget(0.1, n);
        let max_step = 0.8 / n as f32 + 1e-6;
        let mut prev = r.value();
        for _ in 0..n {
            let v = r.next();
            assert!(v <= prev, "not monotonic: {prev} -> {v}");
            assert!(prev - v <= max_step, "jump {}", prev - v);
            prev = v;
        }
    }

    #[test]
    fn retarget_mid_ramp_continues_from_current_value() {
        let mut r = GainRamp::new(0.0);
        r.retarget(1.0, 1_000);
        for _ in 0..400 { r.next(); }
        let here = r.value();
        assert!((here - 0.4).abs() < 1e-3, "here={here}");
        r.retarget(0.0, 1_000);
        let first = r.next();
        assert!((here - first).abs() <= 0.4 / 1_000.0 + 1e-6);
        for _ in 0..999 { r.next(); }
        assert_eq!(r.value(), 0.0);
    }

    #[test]
    fn long_ramp_has_no_drift_at_the_end() {
        let n = 48_000;
        let mut r = GainRamp::new(0.0);
        r.retarget(1.0, n);
        let step = 1.0 / n as f32;
        let mut prev = r.value();
        for _ in 0..n {
            let v = r.next();
            assert!((v - prev - step).abs() < 1e-6, "step {} at {v}", v - prev);
            prev = v;
        }
        assert_eq!(prev, 1.0);
    }

    #[test]
    fn zero_length_retarget_snaps() {
        let mut r = GainRamp::new(0.3);
        r.retarget(0.7, 0);
        assert_eq!(r.value(), 0.7);
        assert!(r.is_settled());
    }

    #[test]
    fn ar_exp_triggers_and_dies() {
        let sr = 48000.0;
        let mut e = ArExp::new(1.0, 200.0, sr);
        e.trigger();
        let mut maxv = 0.0;
        for _ in 0..(sr as usize) {
            let v = e.next();
            if v > maxv { maxv = v; }
        }
        assert!(maxv > 0.8 && e.value() < 0.01);
    }
}
