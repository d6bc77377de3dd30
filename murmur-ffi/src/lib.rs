//! C ABI wrapper for the Murmur engine.
//!
//! The host owns the audio callback: it creates an engine, pulls interleaved
//! f32 frames from it, and toggles textures from its UI thread or the same
//! thread.
//!
//! ABI notes
//! - All functions are `extern "C"` and `#[no_mangle]`.
//! - Opaque handle type: `MurmurEngine` (heap-allocated; you own/delete it).
//! - Textures are addressed by their stable index `0..murmur_texture_count()`.
//! - Control functions return `MURMUR_OK`, `MURMUR_UNAVAILABLE` or `MURMUR_INVALID`.
//! - With `panic = "unwind"` (dev and test profiles) no panic crosses the
//!   boundary; a caught panic reports `MURMUR_INVALID`. The workspace release
//!   profile sets `panic = "abort"`, where a panic aborts the host process.
//!
//! Threading
//! - The object is NOT thread-safe; serialize calls on one handle.

use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use murmur_engine::{EngineConfig, PlaybackState, Renderer, SoundController, Status, TextureId};

pub const MURMUR_OK: i32 = 0;
pub const MURMUR_UNAVAILABLE: i32 = -1;
pub const MURMUR_INVALID: i32 = -2;

pub const MURMUR_STOPPED: i32 = 0;
pub const MURMUR_FADING_IN: i32 = 1;
pub const MURMUR_PLAYING: i32 = 2;
pub const MURMUR_FADING_OUT: i32 = 3;

/// Opaque engine handed to C: controller plus the render side the host pulls.
pub struct MurmurEngine {
    controller: SoundController,
    renderer: Renderer,
}

impl MurmurEngine {
    fn new(config: &EngineConfig) -> Self {
        let (controller, renderer) = SoundController::offline(config);
        Self { controller, renderer }
    }
}

/// Per-texture state for UIs.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct MurmurLayerState {
    pub active: i32,
    pub volume: f32,
    /// One of the `MURMUR_STOPPED..MURMUR_FADING_OUT` codes.
    pub playback: i32,
    pub effective_gain: f32,
}

fn playback_code(p: PlaybackState) -> i32 {
    match p {
        PlaybackState::Stopped => MURMUR_STOPPED,
        PlaybackState::FadingIn => MURMUR_FADING_IN,
        PlaybackState::Playing => MURMUR_PLAYING,
        PlaybackState::FadingOut => MURMUR_FADING_OUT,
    }
}

fn status_code(s: Status) -> i32 {
    match s {
        Status::Applied => MURMUR_OK,
        Status::Unavailable => MURMUR_UNAVAILABLE,
    }
}

/// Run `f` on a live handle, turning null pointers and (when unwinding) panics into `MURMUR_INVALID`.
fn with_engine(engine: *mut MurmurEngine, f: impl FnOnce(&mut MurmurEngine) -> i32) -> i32 {
    if engine.is_null() {
        return MURMUR_INVALID;
    }
    let e = unsafe { &mut *engine };
    catch_unwind(AssertUnwindSafe(|| f(e))).unwrap_or(MURMUR_INVALID)
}

fn texture(index: u32) -> Option<TextureId> {
    TextureId::from_index(index as usize)
}

// --- Creation / destruction -------------------------------------------------------

fn create(config: &EngineConfig) -> *mut MurmurEngine {
    match catch_unwind(|| MurmurEngine::new(config)) {
        Ok(eng) => Box::into_raw(Box::new(eng)),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Create an engine rendering at `sample_rate` Hz with fresh randomness.
/// Returns null on failure.
#[no_mangle]
pub extern "C" fn murmur_create(sample_rate: u32) -> *mut MurmurEngine {
    create(&EngineConfig::default().with_sample_rate(sample_rate))
}

/// Like `murmur_create`, with reproducible textures.
#[no_mangle]
pub extern "C" fn murmur_create_seeded(sample_rate: u32, seed: u64) -> *mut MurmurEngine {
    create(&EngineConfig::default().with_sample_rate(sample_rate).with_seed(seed))
}

/// Destroy an engine previously returned by `murmur_create*`.
#[no_mangle]
pub extern "C" fn murmur_destroy(engine: *mut MurmurEngine) {
    if !engine.is_null() {
        unsafe { drop(Box::from_raw(engine)); }
    }
}

// --- Rendering -------------------------------------------------------------------

/// Render `frames` of audio into an interleaved f32 buffer with `channels` channels.
/// The bus is mono; each sample is duplicated to all channels.
///
/// Returns the number of frames rendered (0 on error).
#[no_mangle]
pub extern "C" fn murmur_render_interleaved_f32(
    engine: *mut MurmurEngine,
    out_interleaved: *mut f32,
    frames: u32,
    channels: u32,
) -> u32 {
    if out_interleaved.is_null() || frames == 0 || channels == 0 {
        return 0;
    }
    let len = (frames as usize) * (channels as usize);
    let out = unsafe { std::slice::from_raw_parts_mut(out_interleaved, len) };
    let rc = with_engine(engine, |e| {
        e.renderer.render_interleaved(out, channels as usize);
        MURMUR_OK
    });
    if rc == MURMUR_OK { frames } else { 0 }
}

/// Sample rate the engine renders at.
#[no_mangle]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub extern "C" fn murmur_sample_rate(engine: *const MurmurEngine) -> u32 {
    if engine.is_null() {
        return 0;
    }
    let e = unsafe { &*engine };
    e.renderer.sample_rate().round() as u32
}

// --- Control ---------------------------------------------------------------------

#[no_mangle]
pub extern "C" fn murmur_toggle(engine: *mut MurmurEngine, texture_index: u32) -> i32 {
    let Some(id) = texture(texture_index) else { return MURMUR_INVALID };
    with_engine(engine, |e| status_code(e.controller.toggle(id)))
}

/// Set a texture's preferred volume; clamped to [0, 1].
#[no_mangle]
pub extern "C" fn murmur_set_volume(engine: *mut MurmurEngine, texture_index: u32, volume: f32) -> i32 {
    let Some(id) = texture(texture_index) else { return MURMUR_INVALID };
    with_engine(engine, |e| status_code(e.controller.set_volume(id, volume)))
}

#[no_mangle]
pub extern "C" fn murmur_set_master_volume(engine: *mut MurmurEngine, volume: f32) -> i32 {
    with_engine(engine, |e| status_code(e.controller.set_master_volume(volume)))
}

/// Non-zero mutes.
#[no_mangle]
pub extern "C" fn murmur_set_muted(engine: *mut MurmurEngine, muted: i32) -> i32 {
    with_engine(engine, |e| status_code(e.controller.set_muted(muted != 0)))
}

/// Fill `out` with the state of one texture.
#[no_mangle]
pub extern "C" fn murmur_layer_state(
    engine: *mut MurmurEngine,
    texture_index: u32,
    out: *mut MurmurLayerState,
) -> i32 {
    let Some(id) = texture(texture_index) else { return MURMUR_INVALID };
    if out.is_null() {
        return MURMUR_INVALID;
    }
    with_engine(engine, |e| {
        let st = e.controller.state();
        let l = st.layer(id);
        unsafe {
            *out = MurmurLayerState {
                active: i32::from(l.active),
                volume: l.volume,
                playback: playback_code(l.playback),
                effective_gain: l.effective_gain,
            };
        }
        if st.available { MURMUR_OK } else { MURMUR_UNAVAILABLE }
    })
}

/// Block until pending texture synthesis has reached the render side.
#[no_mangle]
pub extern "C" fn murmur_wait_for_synthesis(engine: *mut MurmurEngine) -> i32 {
    with_engine(engine, |e| {
        e.controller.wait_for_synthesis();
        MURMUR_OK
    })
}

/// Stop everything immediately. Later control calls report `MURMUR_UNAVAILABLE`.
#[no_mangle]
pub extern "C" fn murmur_teardown(engine: *mut MurmurEngine) -> i32 {
    with_engine(engine, |e| {
        e.controller.teardown();
        MURMUR_OK
    })
}

// --- Texture metadata ------------------------------------------------------------

#[no_mangle]
pub extern "C" fn murmur_texture_count() -> u32 {
    TextureId::COUNT as u32
}

const NAMES: [&[u8]; TextureId::COUNT] = [
    b"rain\0",
    b"forest\0",
    b"ocean\0",
    b"cafe\0",
    b"wind\0",
    b"fireplace\0",
    b"birds\0",
    b"night\0",
];

/// Static NUL-terminated name of a texture, or null for a bad index.
#[no_mangle]
pub extern "C" fn murmur_texture_name(texture_index: u32) -> *const c_char {
    match NAMES.get(texture_index as usize) {
        Some(name) => name.as_ptr().cast(),
        None => std::ptr::null(),
    }
}
