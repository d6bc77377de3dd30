#![cfg_attr(not(feature = "std"), no_std)]
//! Murmur Core — no_std-ready DSP primitives for procedural soundscapes.
//!
//! Features
//! - `std`      : (default) use the Rust standard library
//! - `no-std`   : build with `#![no_std]` and use `libm`/`micromath` math backends
//! - `fast-math`: enable approximations (polys/rationals) for trig
//! - `simd`     : eight-lane block mixing via `wide`
//!
//! Modules
//! - [`dsp`]       : math backend, utils (clamping, sample counts, fast trig, block mix)
//! - [`envelopes`] : linear gain ramp, percussive AR
//! - [`filters`]   : one-pole LP, TPT SVF, the offline/streaming filter stage
//! - [`noise`]     : white/brown/pink, modulation, sparse events, gated tones
//!
//! Design
//! - No heap allocations; generators fill caller-provided slices
//! - Randomness is always injected (`rand::Rng`), never global
//! - Friendly to embedded / real-time targets

pub mod dsp;
pub mod envelopes;
pub mod filters;
pub mod noise;

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::dsp::{clamp, clamp01, mix_in_place, ms_to_samples, snap_period, TAU};
    pub use crate::envelopes::{ArExp, GainRamp};
    pub use crate::filters::{FilterKind, FilterSpec, FilterStage, OnePoleLP, SvfTpt};
    pub use crate::noise::{GatedTone, ImpulseEvent, Modulation, Sparse};
}

#[cfg(test)]
mod smoke {

    #[test]
    fn prelude_exists() {
        use crate::prelude::*;
        let _ = clamp01(1.5);
        let mut ramp = GainRamp::new(0.0);
        ramp.retarget(1.0, 10);
        let _ = ramp.next();
        let mut stage = FilterStage::new(FilterSpec::lowpass(1000.0), 48000.0);
        let _ = stage.process(0.1);
    }
}
