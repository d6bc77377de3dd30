//! Texture recipes and the synthesis routine that turns them into loop-ready buffers.
//!
//! Every texture is one row of a static table ([`TextureRecipe`]) consumed by a
//! single routine ([`TextureSynthesizer::render`]): noise source, optional
//! amplitude modulation, optional filter stage. Adding a texture means adding a
//! row, not a branch.

use core::fmt;
use core::str::FromStr;

use murmur_core::filters::{FilterSpec, FilterStage};
use murmur_core::noise::{self, GatedTone, ImpulseEvent, Modulation, Sparse};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::EngineError;

/// Closed set of ambient textures. The discriminant is the stable index used
/// by the layer registry and the C ABI.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum TextureId {
    Rain = 0,
    Forest = 1,
    Ocean = 2,
    Cafe = 3,
    Wind = 4,
    Fireplace = 5,
    Birds = 6,
    Night = 7,
}

impl TextureId {
    pub const COUNT: usize = 8;

    pub const ALL: [TextureId; Self::COUNT] = [
        TextureId::Rain,
        TextureId::Forest,
        TextureId::Ocean,
        TextureId::Cafe,
        TextureId::Wind,
        TextureId::Fireplace,
        TextureId::Birds,
        TextureId::Night,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn from_index(i: usize) -> Option<Self> {
        Self::ALL.get(i).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            TextureId::Rain => "rain",
            TextureId::Forest => "forest",
            TextureId::Ocean => "ocean",
            TextureId::Cafe => "cafe",
            TextureId::Wind => "wind",
            TextureId::Fireplace => "fireplace",
            TextureId::Birds => "birds",
            TextureId::Night => "night",
        }
    }

    #[inline]
    pub fn recipe(self) -> &'static TextureRecipe {
        &RECIPES[self.index()]
    }
}

impl fmt::Display for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TextureId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        if key == "café" {
            return Ok(TextureId::Cafe);
        }
        Self::ALL
            .into_iter()
            .find(|t| t.name() == key)
            .ok_or_else(|| EngineError::UnknownTexture(s.to_owned()))
    }
}

/// Raw source a recipe starts from.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum NoiseKind {
    White,
    Brown,
    Pink,
    Sparse(Sparse),
    GatedTone(GatedTone),
}

/// Immutable description of one texture.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TextureRecipe {
    pub id: TextureId,
    pub noise: NoiseKind,
    pub filter: Option<FilterSpec>,
    pub modulation: Option<Modulation>,
    pub duration_s: f32,
    pub looped: bool,
}

// ------ Recipe table ------

static RECIPES: [TextureRecipe; TextureId::COUNT] = [
    TextureRecipe {
        id: TextureId::Rain,
        noise: NoiseKind::Brown,
        filter: Some(FilterSpec::lowpass(400.0)),
        modulation: None,
        duration_s: 2.0,
        looped: true,
    },
    TextureRecipe {
        id: TextureId::Forest,
        noise: NoiseKind::Pink,
        filter: Some(FilterSpec::bandpass(800.0, 0.5)),
        modulation: None,
        duration_s: 2.0,
        looped: true,
    },
    TextureRecipe {
        id: TextureId::Ocean,
        noise: NoiseKind::White,
        filter: Some(FilterSpec::lowpass(500.0)),
        modulation: Some(Modulation { period_s: 0.5, depth: 0.8 }),
        duration_s: 4.0,
        looped: true,
    },
    TextureRecipe {
        id: TextureId::Cafe,
        noise: NoiseKind::Sparse(Sparse {
            floor: 0.15,
            probability: 0.0005,
            event: ImpulseEvent::Burst { amplitude: 0.45, length_ms: 12.0 },
        }),
        filter: Some(FilterSpec::bandpass(1000.0, 0.3)),
        modulation: None,
        duration_s: 2.0,
        looped: true,
    },
    TextureRecipe {
        id: TextureId::Wind,
        noise: NoiseKind::White,
        filter: Some(FilterSpec::highpass(200.0)),
        modulation: Some(Modulation { period_s: 2.0, depth: 0.4 }),
        duration_s: 3.0,
        looped: true,
    },
    TextureRecipe {
        id: TextureId::Fireplace,
        noise: NoiseKind::Sparse(Sparse {
            floor: 0.1,
            probability: 0.002,
            event: ImpulseEvent::Burst { amplitude: 0.8, length_ms: 3.0 },
        }),
        filter: Some(FilterSpec::lowpass(2000.0)),
        modulation: None,
        duration_s: 2.0,
        looped: true,
    },
    TextureRecipe {
        id: TextureId::Birds,
        noise: NoiseKind::Sparse(Sparse {
            floor: 0.0,
            probability: 0.0002,
            event: ImpulseEvent::Chirp {
                low_hz: 2000.0,
                high_hz: 4000.0,
                sweep: 1.25,
                amplitude: 0.3,
                decay_ms: 25.0,
                length_ms: 90.0,
            },
        }),
        filter: None,
        modulation: None,
        duration_s: 4.0,
        looped: true,
    },
    TextureRecipe {
        id: TextureId::Night,
        noise: NoiseKind::GatedTone(GatedTone {
            floor: 0.02,
            tone_hz: 4000.0,
            amplitude: 0.1,
            gate_period_s: 0.1,
            duty: 0.35,
        }),
        filter: None,
        modulation: None,
        duration_s: 3.0,
        looped: true,
    },
];

// ------ Synthesis ------

/// Renders recipes into owned buffers. Cheap to clone; background jobs carry a copy.
#[derive(Copy, Clone, Debug)]
pub struct TextureSynthesizer {
    sample_rate: f32,
    seed: Option<u64>,
}

impl TextureSynthesizer {
    pub fn new(sample_rate: f32, seed: Option<u64>) -> Self {
        Self { sample_rate: sample_rate.max(1.0), seed }
    }

    #[inline] pub fn sample_rate(&self) -> f32 { self.sample_rate }

    /// Number of samples a texture's buffer holds at this rate.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn buffer_len(&self, id: TextureId) -> usize {
        (id.recipe().duration_s * self.sample_rate).round() as usize
    }

    /// Synthesize a fresh buffer for `id`.
    ///
    /// With a fixed seed the output depends only on (seed, id, generation), so
    /// repeated activations still differ from one another.
    pub fn render(&self, id: TextureId, generation: u64) -> Vec<f32> {
        let recipe = id.recipe();
        let sr = self.sample_rate;
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ generation.rotate_left(8) ^ id as u64),
            None => StdRng::from_entropy(),
        };

        let mut buf = vec![0.0f32; self.buffer_len(id)];
        match &recipe.noise {
            NoiseKind::White => noise::white(&mut buf, &mut rng),
            NoiseKind::Brown => noise::brown(&mut buf, &mut rng),
            NoiseKind::Pink => noise::pink(&mut buf, &mut rng),
            NoiseKind::Sparse(spec) => noise::sparse(&mut buf, &mut rng, sr, spec),
            NoiseKind::GatedTone(spec) => noise::gated_tone(&mut buf, &mut rng, sr, spec),
        }

        if let Some(m) = recipe.modulation {
            noise::modulate(&mut buf, sr, m);
        }

        if let Some(spec) = recipe.filter {
            let mut stage = FilterStage::new(spec, sr);
            if recipe.looped {
                stage.apply_looped(&mut buf);
            } else {
                stage.apply(&mut buf);
            }
        }
        buf
    }
}
