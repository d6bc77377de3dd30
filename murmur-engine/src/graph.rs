//! Realtime synthesis graph core.
//!
//! This module defines the minimal `Generator` trait and a lightweight `Engine<G>`
//! wrapper that owns a generator (the mixing bus), tracks sample rate and time,
//! and produces **mono** samples with zero heap work per sample.
//!
//! Design goals
//! - No dynamic allocations in the audio thread
//! - SR changes handled lazily (if the host reconfigures), with cheap branching
//! - Generic over the generator type, so graphs can be swapped without trait objects

/// Anything that can generate one sample at a time.
pub trait Generator {
    /// Called when the engine is (re)initialized or when the sample rate changes.
    fn reset(&mut self, sr: f32);

    /// Generate the next mono sample. Implementations should assume the sample
    /// rate has been communicated via `reset`.
    fn next(&mut self) -> f32;

    /// Fill a whole block. Generators with a cheaper block path override this.
    fn render(&mut self, out: &mut [f32]) {
        for s in out.iter_mut() {
            *s = self.next();
        }
    }
}

/// Lightweight realtime engine that owns a generator.
///
/// The audio callback should call `render(out, sr)` for every block. If the
/// `sr` reported by the host changes, the engine will call `reset(sr)` on the
/// inner generator once and continue.
pub struct Engine<G: Generator> {
    sr: f32,
    t: f64,
    gen: G,
}

impl<G: Generator> Engine<G> {
    /// Construct with an already-configured generator. We immediately `reset`
    /// the generator to communicate the sample rate.
    #[inline]
    pub fn new(mut gen: G, sr: f32) -> Self {
        let sr = sr.max(1.0);
        gen.reset(sr);
        Self { sr, t: 0.0, gen }
    }

    #[inline]
    fn sync_rate(&mut self, sr: f32) {
        if sr != self.sr {
            self.sr = sr.max(1.0);
            self.gen.reset(self.sr);
        }
    }

    /// Produce **one** mono sample at the given sample rate.
    #[inline]
    pub fn next(&mut self, sr: f32) -> f32 {
        self.sync_rate(sr);
        self.t += 1.0 / f64::from(self.sr);
        self.gen.next()
    }

    /// Produce a block of mono samples at the given sample rate.
    #[inline]
    #[allow(clippy::cast_precision_loss)]
    pub fn render(&mut self, out: &mut [f32], sr: f32) {
        self.sync_rate(sr);
        self.t += out.len() as f64 / f64::from(self.sr);
        self.gen.render(out);
    }

    /// Return the engine’s current sample rate.
    #[inline] pub fn sample_rate(&self) -> f32 { self.sr }

    /// Return elapsed time (seconds) rendered so far.
    #[inline] pub fn time(&self) -> f64 { self.t }

    #[inline] pub fn generator(&self) -> &G { &self.gen }

    /// Get a mutable reference to the inner generator for live parameter tweaks.
    #[inline] pub fn generator_mut(&mut self) -> &mut G { &mut self.gen }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        resets: u32,
        n: f32,
    }

    impl Generator for Counter {
        fn reset(&mut self, _sr: f32) { self.resets += 1; }
        fn next(&mut self) -> f32 { self.n += 1.0; self.n }
    }

    #[test]
    fn engine_tracks_time_and_rate_changes() {
        let mut e = Engine::new(Counter { resets: 0, n: 0.0 }, 100.0);
        let mut block = [0.0; 50];
        e.render(&mut block, 100.0);
        assert_eq!(block[49], 50.0);
        assert!((e.time() - 0.5).abs() < 1e-9);
        assert_eq!(e.generator().resets, 1);

        e.next(200.0);
        assert_eq!(e.generator().resets, 2);
        assert_eq!(e.sample_rate(), 200.0);
    }
}
