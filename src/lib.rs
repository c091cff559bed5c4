//! Beatfall core crate.
//!
//! Five-lane falling-note rhythm game for the browser. The hosting page
//! hands `start_game()` a YouTube URL and a duration; a placeholder chart
//! is synthesized (real YouTube audio extraction is a stub, see
//! [`youtube`]) and the game runs on a canvas with A/S/D/F/G keys judged
//! against per-note hit windows. Chart generation and session judging are
//! pure modules tested natively; only the browser shell touches web APIs.

use wasm_bindgen::prelude::*;

pub mod chart;
pub mod engine;
mod game;
pub mod generator;
pub mod youtube;

pub use game::LANE_KEYS;

// Optional small allocator for size (feature gated)
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn wasm_start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

// -----------------------------------------------------------------------------
// JS-facing entrypoints
// -----------------------------------------------------------------------------

/// Start a play session for the given source URL and track duration in
/// seconds. `on_game_end` is invoked exactly once with the final score when
/// the track finishes. A malformed URL is not fatal: the game falls back to
/// demo-mode generation with a silent clock.
#[wasm_bindgen]
pub fn start_game(
    source_url: &str,
    duration_secs: u32,
    on_game_end: &js_sys::Function,
) -> Result<(), JsValue> {
    game::start_session(source_url, duration_secs, on_game_end)
}

/// Stop the running session, cancelling the pending animation frame and
/// pausing audio. Safe to call when nothing is running.
#[wasm_bindgen]
pub fn stop_game() {
    game::stop_session();
}

/// Embed URL (player chrome disabled) for a recognized YouTube source URL,
/// for the hosting page to show alongside the game.
#[wasm_bindgen]
pub fn youtube_embed_url(source_url: &str) -> Option<String> {
    youtube::extract_video_id(source_url).map(|id| youtube::embed_url(&id))
}
