//! Browser shell: canvas setup, keyboard wiring, the animation-frame loop
//! and the render pass. All gameplay decisions live in the pure
//! [`crate::engine`] core; this module only samples the clock once per
//! frame, forwards input edges, and draws the session state.

use crate::chart::NOTE_LANES;
use crate::engine::{
    CANVAS_HEIGHT, CANVAS_WIDTH, GamePhase, GameSession, HIT_ZONE_Y, LANE_WIDTH, NOTE_SPEED,
    note_visible, note_y,
};
use crate::generator::generate_demo_chart;
use crate::youtube;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::cell::{Cell, RefCell};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlAudioElement, HtmlCanvasElement, window};

/// Keys mapped 1:1 to lanes 0..4. All other keys are ignored.
pub const LANE_KEYS: [&str; NOTE_LANES] = ["A", "S", "D", "F", "G"];
const LANE_COLORS: [&str; NOTE_LANES] = ["#ef4444", "#f97316", "#eab308", "#22c55e", "#3b82f6"];

/// Runtime shell state: render surface, optional audio clock and the
/// session, owned by the frame loop through a thread-local slot.
struct ShellState {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    session: GameSession,
    /// Authoritative clock when present; otherwise a silent timer runs
    /// against `clock_origin_ms`.
    audio: Option<HtmlAudioElement>,
    clock_origin_ms: f64,
    on_game_end: js_sys::Function,
}

thread_local! {
    static SHELL_STATE: RefCell<Option<ShellState>> = const { RefCell::new(None) };
    static FRAME_CLOSURE: RefCell<Option<Closure<dyn FnMut(f64)>>> = const { RefCell::new(None) };
    static FRAME_REQUEST: Cell<Option<i32>> = const { Cell::new(None) };
    static LISTENERS_INSTALLED: Cell<bool> = const { Cell::new(false) };
}

/// Start a play session. The source URL is parsed for a YouTube video id;
/// since real extraction is stubbed, a recognized id resolves to the
/// bundled demo track and a malformed one falls back to a silent timer.
/// The chart itself is always demo-generated. `on_game_end` receives the
/// final score exactly once, when the track finishes.
pub fn start_session(
    source_url: &str,
    duration_secs: u32,
    on_game_end: &js_sys::Function,
) -> Result<(), JsValue> {
    let win = window().ok_or_else(|| JsValue::from_str("no window"))?;
    let doc = win
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;

    stop_session();

    let duration = duration_secs as f64;
    let mut rng = SmallRng::from_entropy();
    let notes = generate_demo_chart(duration, &mut rng);

    // Create / reuse the game canvas.
    let canvas: HtmlCanvasElement = if let Some(el) = doc.get_element_by_id("bf-canvas") {
        el.dyn_into()?
    } else {
        let c: HtmlCanvasElement = doc.create_element("canvas")?.dyn_into()?;
        c.set_id("bf-canvas");
        c.set_width(CANVAS_WIDTH as u32);
        c.set_height(CANVAS_HEIGHT as u32);
        c.set_attribute("style", "position:fixed; left:50%; top:50%; transform:translate(-50%,-50%); border:2px solid #a855f7; border-radius:8px; background:#000; z-index:20;").ok();
        doc.body()
            .ok_or_else(|| JsValue::from_str("no body"))?
            .append_child(&c)?;
        c
    };
    let ctx: CanvasRenderingContext2d = canvas
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("no 2d context"))?
        .dyn_into()?;
    ctx.set_font("bold 24px monospace");

    // Audio pipeline: error taxonomy (a) malformed URL and (b) element
    // setup failure both degrade to the silent clock instead of aborting.
    let audio = match youtube::extract_video_id(source_url) {
        Some(id) => {
            let audio_url = youtube::resolve_audio_proxy(&id);
            match doc.create_element("audio") {
                Ok(el) => match el.dyn_into::<HtmlAudioElement>() {
                    Ok(a) => {
                        a.set_src(&audio_url);
                        Some(a)
                    }
                    Err(_) => {
                        web_sys::console::error_1(&JsValue::from_str(
                            "audio element setup failed, using silent clock",
                        ));
                        None
                    }
                },
                Err(e) => {
                    web_sys::console::error_1(&e);
                    None
                }
            }
        }
        None => {
            web_sys::console::warn_1(&JsValue::from_str(
                "unrecognized source URL, running demo without audio",
            ));
            None
        }
    };

    let mut session = GameSession::new(notes, duration);
    session.start();
    if let Some(a) = &audio {
        let _ = a.play();
    }
    let now = win
        .performance()
        .ok_or_else(|| JsValue::from_str("no performance"))?
        .now();

    SHELL_STATE.with(|cell| {
        cell.replace(Some(ShellState {
            canvas,
            ctx,
            session,
            audio,
            clock_origin_ms: now,
            on_game_end: on_game_end.clone(),
        }))
    });

    install_key_listeners(&doc)?;
    start_frame_loop();
    Ok(())
}

/// Tear the session down: cancel the pending frame request and stop the
/// audio element so no timer keeps running against a dead surface.
pub fn stop_session() {
    if let Some(id) = FRAME_REQUEST.with(|c| c.take()) {
        if let Some(w) = window() {
            let _ = w.cancel_animation_frame(id);
        }
    }
    FRAME_CLOSURE.with(|c| c.replace(None));
    SHELL_STATE.with(|cell| {
        if let Some(state) = cell.borrow_mut().take() {
            if let Some(a) = &state.audio {
                let _ = a.pause();
            }
        }
    });
}

// --- Input --------------------------------------------------------------------

fn lane_for_key(key: &str) -> Option<usize> {
    let upper = key.to_ascii_uppercase();
    LANE_KEYS.iter().position(|k| *k == upper)
}

fn install_key_listeners(doc: &web_sys::Document) -> Result<(), JsValue> {
    // The forgotten closures below live for the page lifetime; install once
    // even if sessions restart.
    if LISTENERS_INSTALLED.with(|c| c.get()) {
        return Ok(());
    }
    {
        let closure = Closure::wrap(Box::new(move |evt: web_sys::KeyboardEvent| {
            if let Some(lane) = lane_for_key(&evt.key()) {
                SHELL_STATE.with(|cell| {
                    if let Some(state) = cell.borrow_mut().as_mut() {
                        state.session.press(lane);
                    }
                });
            }
        }) as Box<dyn FnMut(_)>);
        doc.add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref())?;
        closure.forget();
    }
    {
        let closure = Closure::wrap(Box::new(move |evt: web_sys::KeyboardEvent| {
            if let Some(lane) = lane_for_key(&evt.key()) {
                SHELL_STATE.with(|cell| {
                    if let Some(state) = cell.borrow_mut().as_mut() {
                        state.session.release(lane);
                    }
                });
            }
        }) as Box<dyn FnMut(_)>);
        doc.add_event_listener_with_callback("keyup", closure.as_ref().unchecked_ref())?;
        closure.forget();
    }
    LISTENERS_INSTALLED.with(|c| c.set(true));
    Ok(())
}

// --- Frame loop ---------------------------------------------------------------

fn start_frame_loop() {
    let closure = Closure::wrap(Box::new(move |ts: f64| {
        let mut ended: Option<(js_sys::Function, u64)> = None;
        SHELL_STATE.with(|cell| {
            if let Some(state) = cell.borrow_mut().as_mut() {
                if let Some(score) = shell_tick(state, ts) {
                    ended = Some((state.on_game_end.clone(), score));
                }
            }
        });
        // Invoke the end callback outside the state borrow; it may well
        // call back into stop_game().
        if let Some((cb, score)) = ended {
            let _ = cb.call1(&JsValue::NULL, &JsValue::from_f64(score as f64));
        }
        // Stop the loop once the session has ended (the ending frame has
        // already drawn the overlay) or been torn down.
        let keep_running = SHELL_STATE.with(|cell| {
            cell.borrow()
                .as_ref()
                .is_some_and(|state| state.session.phase() != GamePhase::Ended)
        });
        if keep_running {
            schedule_frame();
        } else {
            FRAME_REQUEST.with(|c| c.set(None));
        }
    }) as Box<dyn FnMut(f64)>);
    FRAME_CLOSURE.with(|c| c.replace(Some(closure)));
    schedule_frame();
}

fn schedule_frame() {
    let Some(w) = window() else { return };
    FRAME_CLOSURE.with(|c| {
        if let Some(cb) = c.borrow().as_ref() {
            if let Ok(id) = w.request_animation_frame(cb.as_ref().unchecked_ref()) {
                FRAME_REQUEST.with(|r| r.set(Some(id)));
            }
        }
    });
}

/// One frame: sample the clock, advance the session, draw. Returns the
/// final score on the frame the session ends.
fn shell_tick(state: &mut ShellState, _ts: f64) -> Option<u64> {
    // Sample the authoritative clock once; judging and rendering for this
    // frame both use this value.
    let now = match &state.audio {
        Some(audio) => audio.current_time(),
        None => {
            // Silent timer clock (no audio available for this source).
            let perf = window().and_then(|w| w.performance())?; // skip the frame, not fatal
            (perf.now() - state.clock_origin_ms) / 1000.0
        }
    };

    let audio_done = state.audio.as_ref().is_some_and(|a| a.ended());
    let final_score = if audio_done {
        state.session.finish()
    } else {
        state.session.step(now)
    };

    render(state, now);
    final_score
}

// --- Rendering ----------------------------------------------------------------

fn render(state: &ShellState, now: f64) {
    let ctx = &state.ctx;
    let w = state.canvas.width() as f64;
    let h = state.canvas.height() as f64;

    ctx.set_fill_style_str("#000000");
    ctx.fill_rect(0.0, 0.0, w, h);

    // Lanes: background tinted while held, border line, key label.
    for i in 0..NOTE_LANES {
        let x = i as f64 * LANE_WIDTH;
        let held = state.session.lane_held(i);
        if held {
            ctx.set_fill_style_str(&format!("{}40", LANE_COLORS[i]));
        } else {
            ctx.set_fill_style_str("#1a1a1a");
        }
        ctx.fill_rect(x, 0.0, LANE_WIDTH, h);

        ctx.set_stroke_style_str("#444444");
        ctx.set_line_width(2.0);
        line(ctx, x, 0.0, x, h);

        ctx.set_fill_style_str(if held { "#ffffff" } else { LANE_COLORS[i] });
        ctx.set_text_align("center");
        ctx.fill_text(LANE_KEYS[i], x + LANE_WIDTH / 2.0, HIT_ZONE_Y + 40.0)
            .ok();
    }

    // Hit zone band.
    ctx.set_fill_style_str("#ffffff20");
    ctx.fill_rect(0.0, HIT_ZONE_Y - 20.0, w, 40.0);
    ctx.set_stroke_style_str("#ffffff");
    ctx.set_line_width(3.0);
    ctx.stroke_rect(0.0, HIT_ZONE_Y - 20.0, w, 40.0);

    // Unjudged notes inside the visible band.
    for note in state.session.notes() {
        if !note.is_pending() {
            continue;
        }
        let y = note_y(note.start_time, now);
        if !note_visible(y) {
            continue;
        }
        let x = note.lane as f64 * LANE_WIDTH + 10.0;
        let nw = LANE_WIDTH - 20.0;
        let nh = (note.duration * NOTE_SPEED).max(30.0);

        ctx.set_fill_style_str("#00000080");
        ctx.fill_rect(x + 2.0, y + 2.0, nw, nh);
        ctx.set_fill_style_str(LANE_COLORS[note.lane]);
        ctx.fill_rect(x, y, nw, nh);
        ctx.set_fill_style_str("#ffffff40");
        ctx.fill_rect(x, y, nw, nh / 3.0);
        ctx.set_stroke_style_str("#ffffff");
        ctx.set_line_width(2.0);
        ctx.stroke_rect(x, y, nw, nh);
    }

    // Score / combo readout.
    ctx.set_fill_style_str("#ffffff");
    ctx.set_text_align("left");
    ctx.fill_text(&format!("Score: {}", state.session.score()), 20.0, 40.0)
        .ok();
    ctx.fill_text(&format!("Combo: {}", state.session.combo()), 20.0, 80.0)
        .ok();

    if state.session.phase() == GamePhase::Ended {
        ctx.set_fill_style_str("rgba(0,0,0,0.55)");
        ctx.fill_rect(0.0, 0.0, w, h);
        ctx.set_fill_style_str("#ffffff");
        ctx.set_text_align("center");
        ctx.fill_text("TRACK COMPLETE", w / 2.0, h / 2.0).ok();
        ctx.fill_text(
            &format!("Final score: {}", state.session.score()),
            w / 2.0,
            h / 2.0 + 40.0,
        )
        .ok();
    }
}

fn line(ctx: &CanvasRenderingContext2d, x1: f64, y1: f64, x2: f64, y2: f64) {
    ctx.begin_path();
    ctx.move_to(x1, y1);
    ctx.line_to(x2, y2);
    ctx.stroke();
}
