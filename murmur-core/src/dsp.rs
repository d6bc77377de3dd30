//! Generic DSP utilities and math helpers.
//!
//! Design goals:
//! - `no_std` ready (guarded by the crate feature `no-std`)
//! - Math backend selection that works in both `std` and `no_std` contexts
//! - Optional `fast-math` approximations for hot paths
//! - Clean, side-effect free helpers that are easy to test
//!
//! Features used by this file:
//! - `fast-math` : enables polynomial/rational approximations (faster, approx.)
//! - `simd`      : `wide::f32x8` path for [`mix_in_place`]
//!
//! Conventions:
//! - All functions are `#[inline]` where useful to help the optimizer.
//! - Argument and return domains are documented per function.

#![allow(clippy::excessive_precision)]

use core::f32::consts::PI;

use cfg_if::cfg_if;

// ----------------------------- Math backend selection -----------------------------

cfg_if! {
    // micromath preferred if explicitly requested (works in no_std)
    if #[cfg(feature = "micromath")] {
        use micromath::F32Ext as _;
        #[inline] pub(crate) fn m_sin(x: f32) -> f32 { x.sin() }
        #[inline] pub(crate) fn m_cos(x: f32) -> f32 { x.cos() }
        #[inline] pub(crate) fn m_exp(x: f32) -> f32 { x.exp() }
        #[inline] pub(crate) fn m_tan(x: f32) -> f32 { (x.sin()) / (x.cos()) }
    // libm (C math) in no_std
    } else if #[cfg(feature = "no-std")] {
        #[inline] pub(crate) fn m_sin(x: f32) -> f32 { libm::sinf(x) }
        #[inline] pub(crate) fn m_cos(x: f32) -> f32 { libm::cosf(x) }
        #[inline] pub(crate) fn m_exp(x: f32) -> f32 { libm::expf(x) }
        #[inline] pub(crate) fn m_tan(x: f32) -> f32 { libm::tanf(x) }
    // std backend
    } else {
        #[inline] pub(crate) fn m_sin(x: f32) -> f32 { x.sin() }
        #[inline] pub(crate) fn m_cos(x: f32) -> f32 { x.cos() }
        #[inline] pub(crate) fn m_exp(x: f32) -> f32 { x.exp() }
        #[inline] pub(crate) fn m_tan(x: f32) -> f32 { x.tan() }
    }
}

// --------------------------------- Constants -------------------------------------

/// 2π (commonly useful)
pub const TAU: f32 = 2.0 * PI;

/// A very small epsilon used in denormal handling and safe divisions.
pub const EPS_SMALL: f32 = 1.0e-20;

// --------------------------------- Utilities -------------------------------------

/// Clamp `x` into `[lo, hi]`. NaN maps to `lo`.
#[inline]
pub fn clamp(x: f32, lo: f32, hi: f32) -> f32 {
    if x.is_nan() || x < lo { lo } else if x > hi { hi } else { x }
}

/// Clamp into the unit interval. Used for every user-facing volume.
#[inline]
pub fn clamp01(x: f32) -> f32 {
    clamp(x, 0.0, 1.0)
}

/// Wrap phase into [0, 1).
#[inline]
pub fn wrap_phase01(mut p: f32) -> f32 {
    // fast + branchless wrap using floor
    p = p - (p + 1.0).floor() + 1.0;
    if p >= 1.0 { p - 1.0 } else { p }
}

/// Kill denormal/subnormal values. Returns 0.0 if |x| < EPS_SMALL.
#[inline]
pub fn kill_denormals(x: f32) -> f32 {
    if x.abs() < EPS_SMALL { 0.0 } else { x }
}

/// Number of samples covering `ms` milliseconds at `sr` (rounded, never negative).
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn ms_to_samples(ms: f32, sr: f32) -> u32 {
    let n = (ms.max(0.0) * 0.001 * sr.max(1.0)).round();
    if n >= u32::MAX as f32 { u32::MAX } else { n as u32 }
}

/// Snap `period_s` so that a whole number of cycles (at least one) fits into `span_s`.
///
/// Used to keep modulators and gates seamless across a loop point.
#[inline]
pub fn snap_period(period_s: f32, span_s: f32) -> f32 {
    if period_s <= 0.0 || span_s <= 0.0 {
        return span_s.max(0.0);
    }
    let cycles = (span_s / period_s).round().max(1.0);
    span_s / cycles
}

// --------------------------------- Fast trig -------------------------------------

/// Fast sine with range reduction into [-π, π] and 5th-order minimax-style poly.
/// Max abs error ~1e-3 for musical uses when `fast-math` is enabled; falls back to exact otherwise.
#[inline]
pub fn fast_sin(x: f32) -> f32 {
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            // Range reduce to [-π, π] without making the parameter mutable in the signature.
            let mut xr = x;
            let k = (xr / TAU).round();
            xr -= k * TAU;

            // 5th-order odd polynomial: sin(x) ≈ x * (a + b x^2 + c x^4)
            let x2 = xr * xr;
            xr * (0.999_979_313_3 + x2 * (-0.166_624_432_0 + x2 * 0.008_308_978_98))
        } else {
            m_sin(x)
        }
    }
}

#[inline]
pub fn fast_cos(x: f32) -> f32 {
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            // cos(x) = sin(x + π/2)
            fast_sin(x + core::f32::consts::PI * 0.5)
        } else {
            m_cos(x)
        }
    }
}

// --------------------------------- Exponentials / smoothing ----------------------

/// One-pole smoothing coefficient for a time constant `t_ms` (milliseconds).
///
/// The discrete one-pole form: `y[n] += a * (x[n] - y[n])`
/// where `a = exp(-1/(tau * sr))` for first-order lag with time constant `tau`.
///
/// We interpret `t_ms` as the time to reach ~63% (1 - 1/e). Common for parameter smoothing.
#[inline]
pub fn one_pole_coeff_ms(t_ms: f32, sr: f32) -> f32 {
    if t_ms <= 0.0 { return 0.0; }
    let tau = t_ms * 0.001;
    m_exp(-1.0 / (tau * sr))
}

/// TPT (Topology-Preserving Transform) `g = tan(π fc / sr)` helper for state-variable filters.
///
/// If `fast-math` is enabled and `tan` is expensive, we compute `tan(x)`
/// via `sin(x)/cos(x)` using our faster approximations, which is generally sufficient for musical ranges.
#[inline]
pub fn tpt_g(cut_hz: f32, sr: f32) -> f32 {
    // keep the warp finite: tan() blows up at Nyquist
    let fc = clamp(cut_hz, 0.0, 0.49 * sr);
    let x = core::f32::consts::PI * (fc / sr);
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            let s = fast_sin(x);
            let c = fast_cos(x);
            s / c
        } else {
            m_tan(x)
        }
    }
}

// --------------------------------- Mix / sine block ------------------------------

/// In-place mix: `dst[i] += src[i] * gain`.
///
/// Mismatched lengths mix the common prefix. With `simd` the bulk runs eight lanes at a time.
#[inline]
pub fn mix_in_place(dst: &mut [f32], src: &[f32], gain: f32) {
    let n = dst.len().min(src.len());
    let (dst, src) = (&mut dst[..n], &src[..n]);

    cfg_if! {
        if #[cfg(feature = "simd")] {
            use wide::f32x8;

            let g = f32x8::splat(gain);
            let mut d_chunks = dst.chunks_exact_mut(8);
            let mut s_chunks = src.chunks_exact(8);
            for (d, s) in (&mut d_chunks).zip(&mut s_chunks) {
                let mut dv = [0.0f32; 8];
                let mut sv = [0.0f32; 8];
                dv.copy_from_slice(d);
                sv.copy_from_slice(s);
                let out = f32x8::from(dv) + f32x8::from(sv) * g;
                d.copy_from_slice(&out.to_array());
            }
            for (d, s) in d_chunks.into_remainder().iter_mut().zip(s_chunks.remainder()) {
                *d += *s * gain;
            }
        } else {
            for (d, s) in dst.iter_mut().zip(src.iter()) {
                *d += *s * gain;
            }
        }
    }
}

/// Fill `out` with a sine using a running phase accumulator.
/// After the call, `*phase` is advanced by `out.len() * phase_inc` and wrapped to [-2π, 2π].
#[inline]
pub fn fill_sine(out: &mut [f32], phase: &mut f32, phase_inc: f32) {
    if out.is_empty() {
        return;
    }

    let two_pi = TAU;
    let inv_two_pi = 1.0 / two_pi;

    for y in out.iter_mut() {
        // range-reduce current phase to [-π, π]
        let mut xr = *phase;
        let k = (xr * inv_two_pi).round();
        xr -= k * two_pi;

        // 7th-order odd polynomial approximation:
        // sin(x) ≈ x + c3*x^3 + c5*x^5 + c7*x^7
        let x2 = xr * xr;
        let x3 = x2 * xr;
        let y_poly = xr
            + (-1.0 / 6.0) * x3
            + (1.0 / 120.0) * x3 * x2
            + (-1.0 / 5040.0) * x3 * x2 * x2;

        *y = y_poly;

        // advance phase; keep bounded occasionally
        *phase += phase_inc;
        if *phase > two_pi || *phase < -two_pi {
            let k2 = (*phase * inv_two_pi).round();
            *phase -= k2 * two_pi;
        }
    }
}

// --------------------------------- Tests (std only) ------------------------------
