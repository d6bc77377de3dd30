//! Engine configuration.
//!
//! Plain data with sane defaults; every consumer goes through [`EngineConfig::sanitized`]
//! so out-of-range values are clamped rather than rejected.

use murmur_core::dsp::clamp01;

/// Sample rate used when no device dictates one (offline rendering, FFI hosts).
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Default per-layer volume before the caller sets one.
pub const DEFAULT_LAYER_VOLUME: f32 = 0.5;

/// Gain ramp lengths, in milliseconds.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RampTimes {
    /// 0 → effective gain when a layer is activated.
    pub fade_in_ms: f32,
    /// current → 0 when a layer is deactivated; the layer is released afterwards.
    pub fade_out_ms: f32,
    /// Volume, master or mute changes while a layer is playing.
    pub change_ms: f32,
}

impl Default for RampTimes {
    fn default() -> Self {
        Self { fade_in_ms: 500.0, fade_out_ms: 500.0, change_ms: 100.0 }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Rate for offline rendering; a real device overrides it with its own.
    pub sample_rate: u32,
    /// Output device name; `None` picks the host default.
    pub device: Option<String>,
    pub ramps: RampTimes,
    /// Volume every texture starts with.
    pub default_volume: f32,
    pub master_volume: f32,
    pub muted: bool,
    /// Fixed seed for reproducible textures; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            device: None,
            ramps: RampTimes::default(),
            default_volume: DEFAULT_LAYER_VOLUME,
            master_volume: 1.0,
            muted: false,
            seed: None,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn with_sample_rate(mut self, sr: u32) -> Self {
        self.sample_rate = sr;
        self
    }

    #[must_use]
    pub fn with_device(mut self, name: impl Into<String>) -> Self {
        self.device = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn with_master_volume(mut self, v: f32) -> Self {
        self.master_volume = v;
        self
    }

    #[must_use]
    pub fn with_muted(mut self, muted: bool) -> Self {
        self.muted = muted;
        self
    }

    #[must_use]
    pub fn with_ramps(mut self, ramps: RampTimes) -> Self {
        self.ramps = ramps;
        self
    }

    /// Copy with every value forced into its valid range.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let ms = |v: f32| if v.is_finite() { v.max(0.0) } else { 0.0 };
        Self {
            sample_rate: self.sample_rate.clamp(8_000, 192_000),
            device: self.device.clone(),
            ramps: RampTimes {
                fade_in_ms: ms(self.ramps.fade_in_ms),
                fade_out_ms: ms(self.ramps.fade_out_ms),
                change_ms: ms(self.ramps.change_ms),
            },
            default_volume: clamp01(self.default_volume),
            master_volume: clamp01(self.master_volume),
            muted: self.muted,
            seed: self.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_ramps() {
        let c = EngineConfig::default();
        assert_eq!(c.ramps.fade_in_ms, 500.0);
        assert_eq!(c.ramps.fade_out_ms, 500.0);
        assert_eq!(c.ramps.change_ms, 100.0);
        assert_eq!(c.default_volume, 0.5);
        assert_eq!(c.master_volume, 1.0);
    }

    #[test]
    fn sanitized_clamps_everything() {
        let c = EngineConfig {
            sample_rate: 10,
            ramps: RampTimes { fade_in_ms: -1.0, fade_out_ms: f32::NAN, change_ms: 5.0 },
            default_volume: 3.0,
            master_volume: -0.5,
            ..EngineConfig::default()
        }
        .sanitized();
        assert_eq!(c.sample_rate, 8_000);
        assert_eq!(c.ramps.fade_in_ms, 0.0);
        assert_eq!(c.ramps.fade_out_ms, 0.0);
        assert_eq!(c.ramps.change_ms, 5.0);
        assert_eq!(c.default_volume, 1.0);
        assert_eq!(c.master_volume, 0.0);
    }
}
