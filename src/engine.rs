//! Game session core: phase machine, per-frame judging, scoring and combo
//! state, and scroll geometry. Deliberately display-free; the browser shell
//! samples the clock once per animation frame and calls [`GameSession::step`]
//! with it, so the whole loop is callable synchronously in native tests.

use crate::chart::{NOTE_LANES, Note, NoteState};

/// Judgement window around a note's start time, in seconds.
pub const HIT_WINDOW: f64 = 0.1;
/// Scroll rate in canvas pixels per second.
pub const NOTE_SPEED: f64 = 200.0;
pub const CANVAS_WIDTH: f64 = 800.0;
pub const CANVAS_HEIGHT: f64 = 600.0;
/// Vertical center of the hit zone.
pub const HIT_ZONE_Y: f64 = CANVAS_HEIGHT - 100.0;
pub const LANE_WIDTH: f64 = CANVAS_WIDTH / NOTE_LANES as f64;

/// Session lifecycle: `Idle` until the start command, `Playing` while the
/// frame loop runs, `Ended` once the track finishes (final score reported
/// exactly once on that transition).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GamePhase {
    Idle,
    Playing,
    Ended,
}

/// Outcome of judging one pending note on one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Judgement {
    Hit { points: u64 },
    Miss,
}

/// Base points for a hit at `time_diff` seconds from the note center.
fn hit_points(time_diff: f64) -> u64 {
    (100 - (time_diff * 500.0).floor() as i64).max(50) as u64
}

/// Judge a single pending note against the sampled frame time and the
/// currently held lanes. This is the only place a note leaves `Pending`.
fn judge_note(note: &mut Note, now: f64, pressed: &[bool; NOTE_LANES]) -> Option<Judgement> {
    if !note.is_pending() {
        return None;
    }
    let time_diff = (now - note.start_time).abs();
    if time_diff <= HIT_WINDOW && pressed[note.lane] {
        note.state = NoteState::Hit;
        Some(Judgement::Hit {
            points: hit_points(time_diff),
        })
    } else if now > note.start_time + HIT_WINDOW {
        note.state = NoteState::Missed;
        Some(Judgement::Miss)
    } else {
        None
    }
}

/// One play-through of a chart. Owns the notes for the session's lifetime.
pub struct GameSession {
    notes: Vec<Note>,
    track_len: f64,
    current_time: f64,
    score: u64,
    combo: u32,
    pressed: [bool; NOTE_LANES],
    phase: GamePhase,
}

impl GameSession {
    pub fn new(notes: Vec<Note>, track_len: f64) -> Self {
        Self {
            notes,
            track_len,
            current_time: 0.0,
            score: 0,
            combo: 0,
            pressed: [false; NOTE_LANES],
            phase: GamePhase::Idle,
        }
    }

    pub fn start(&mut self) {
        if self.phase == GamePhase::Idle {
            self.phase = GamePhase::Playing;
        }
    }

    pub fn press(&mut self, lane: usize) {
        if lane < NOTE_LANES {
            self.pressed[lane] = true;
        }
    }

    pub fn release(&mut self, lane: usize) {
        if lane < NOTE_LANES {
            self.pressed[lane] = false;
        }
    }

    /// Advance one frame at the sampled clock time `now`: judge every
    /// pending note, then detect end-of-track. Returns the final score on
    /// the single frame that transitions to `Ended`, `None` otherwise.
    pub fn step(&mut self, now: f64) -> Option<u64> {
        if self.phase != GamePhase::Playing {
            return None;
        }
        self.current_time = now;

        for note in &mut self.notes {
            match judge_note(note, now, &self.pressed) {
                Some(Judgement::Hit { points }) => {
                    self.score += points * (self.combo as u64 + 1);
                    self.combo += 1;
                }
                Some(Judgement::Miss) => self.combo = 0,
                None => {}
            }
        }

        if now >= self.track_len { self.finish() } else { None }
    }

    /// Force the Playing -> Ended transition (the shell calls this when the
    /// audio element reports `ended` before the nominal track length).
    pub fn finish(&mut self) -> Option<u64> {
        if self.phase == GamePhase::Playing {
            self.phase = GamePhase::Ended;
            Some(self.score)
        } else {
            None
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn lane_held(&self, lane: usize) -> bool {
        lane < NOTE_LANES && self.pressed[lane]
    }
}

// --- Scroll geometry ----------------------------------------------------------

/// Vertical center of a note at the sampled frame time: it reaches
/// `HIT_ZONE_Y` exactly at its start time and scrolls at `NOTE_SPEED`.
pub fn note_y(start_time: f64, now: f64) -> f64 {
    HIT_ZONE_Y - (start_time - now) * NOTE_SPEED
}

/// Whether a note at vertical position `y` is worth drawing at all.
pub fn note_visible(y: f64) -> bool {
    y > -50.0 && y < CANVAS_HEIGHT + 50.0
}
