//! Note chart data model shared by the generator and the engine.
//! A chart is built upfront, ordered by start time, and never grows once
//! play begins; only the per-note judgement state mutates afterwards.

/// Number of lanes; lanes are indexed 0..NOTE_LANES.
pub const NOTE_LANES: usize = 5;

/// Judgement lifecycle of a single note. A note leaves `Pending` at most
/// once, into either `Hit` or `Missed`, and never returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteState {
    Pending,
    Hit,
    Missed,
}

/// One scheduled note. `start_time` is the second at which the note center
/// reaches the hit zone.
#[derive(Clone, Debug)]
pub struct Note {
    pub id: String,
    pub lane: usize,
    pub start_time: f64,
    pub duration: f64,
    pub state: NoteState,
}

impl Note {
    pub fn new(id: String, lane: usize, start_time: f64, duration: f64) -> Self {
        debug_assert!(lane < NOTE_LANES);
        Self {
            id,
            lane,
            start_time,
            duration,
            state: NoteState::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == NoteState::Pending
    }
}

/// True if notes are sorted by `start_time` (the order both generators emit).
pub fn is_time_ordered(notes: &[Note]) -> bool {
    notes.windows(2).all(|w| w[0].start_time <= w[1].start_time)
}
