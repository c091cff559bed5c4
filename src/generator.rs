//! Note chart generation.
//!
//! Two independent modes produce a time-ordered `Note` sequence:
//! an analytical onset detector fed by a band-energy stream (~43 Hz),
//! and a procedural demo generator for when no audio analysis is
//! available. Randomness is injected (`rand::Rng`) so both modes are
//! deterministic under a seeded RNG in tests.

use crate::chart::{NOTE_LANES, Note};
use rand::Rng;
use std::collections::VecDeque;

/// Spectral sampling rate of the analytical mode (frames per second).
pub const ANALYSIS_RATE_HZ: f64 = 43.0;
/// Seconds between spectral frames.
pub const FRAME_DT: f64 = 1.0 / ANALYSIS_RATE_HZ;
/// Minimum total energy for a frame to count as a beat candidate.
pub const BEAT_THRESHOLD: f64 = 120.0;
/// Minimum spacing between emitted notes, in seconds.
pub const MIN_NOTE_INTERVAL: f64 = 0.2;
/// Fixed lookahead so a note scrolls in before its judgement time.
pub const NOTE_LOOKAHEAD: f64 = 2.0;
/// Duration assigned to every generated note.
pub const NOTE_DURATION: f64 = 0.1;

// --- Band energies ----------------------------------------------------------

/// Average spectral energy in the bass / mid / treble bin ranges of one
/// analysis frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BandEnergies {
    pub bass: f64,
    pub mid: f64,
    pub treble: f64,
}

impl BandEnergies {
    pub fn total(&self) -> f64 {
        self.bass + self.mid + self.treble
    }
}

/// Split a byte-magnitude spectrum into the three band averages used by the
/// onset detector: bass bins [0,4), mid [4,16), treble [16,64). Bins beyond
/// the slice length contribute zero but the divisor stays the range width.
pub fn band_energies(bins: &[u8]) -> BandEnergies {
    BandEnergies {
        bass: energy_in_range(bins, 0, 4),
        mid: energy_in_range(bins, 4, 16),
        treble: energy_in_range(bins, 16, 64),
    }
}

fn energy_in_range(bins: &[u8], start: usize, end: usize) -> f64 {
    let mut energy = 0.0;
    for &b in bins.iter().take(end.min(bins.len())).skip(start) {
        energy += b as f64;
    }
    energy / (end - start) as f64
}

/// Supplies band-energy frames at `ANALYSIS_RATE_HZ`. The browser shell
/// would back this with an analyser node; tests back it with plain vectors.
pub trait SpectrumSource {
    fn next_frame(&mut self) -> Option<BandEnergies>;
}

impl<I: Iterator<Item = BandEnergies>> SpectrumSource for I {
    fn next_frame(&mut self) -> Option<BandEnergies> {
        self.next()
    }
}

// --- Adaptive-threshold onset detection --------------------------------------

/// Sliding window over recent total-energy samples, for the adaptive part of
/// the beat test (mean + 1.5 sigma).
struct EnergyWindow {
    samples: VecDeque<f64>,
    cap: usize,
}

impl EnergyWindow {
    fn new(cap: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(cap),
            cap,
        }
    }

    fn push(&mut self, energy: f64) {
        if self.samples.len() == self.cap {
            self.samples.pop_front();
        }
        self.samples.push_back(energy);
    }

    fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    fn stddev(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .samples
            .iter()
            .map(|e| (e - mean).powi(2))
            .sum::<f64>()
            / self.samples.len() as f64;
        variance.sqrt()
    }
}

/// Map one beat frame to a lane: strictly-dominant bass goes left, treble
/// right, mid somewhere in between, then a 30% chance to nudge by one lane.
fn pick_lane<R: Rng>(frame: &BandEnergies, rng: &mut R) -> usize {
    let mut lane = if frame.bass > frame.mid && frame.bass > frame.treble {
        0
    } else if frame.treble > frame.mid && frame.treble > frame.bass {
        NOTE_LANES - 1
    } else if frame.mid > frame.bass && frame.mid > frame.treble {
        rng.gen_range(1..NOTE_LANES - 1)
    } else {
        NOTE_LANES / 2
    };
    if rng.gen_bool(0.3) {
        let nudge: i32 = if rng.gen_bool(0.5) { 1 } else { -1 };
        lane = (lane as i32 + nudge).clamp(0, NOTE_LANES as i32 - 1) as usize;
    }
    lane
}

/// Analytical mode: walk the spectrum stream and emit a note whenever a
/// frame clears the fixed threshold, stands 1.5 sigma above the recent mean,
/// and enough time has passed since the previous note. Stops when the
/// source runs dry or playback time reaches `duration`.
pub fn generate_from_spectrum<S, R>(source: &mut S, duration: f64, rng: &mut R) -> Vec<Note>
where
    S: SpectrumSource,
    R: Rng,
{
    let mut notes = Vec::new();
    let mut window = EnergyWindow::new(10);
    let mut last_note_time = -MIN_NOTE_INTERVAL;
    let mut time = 0.0;

    while time < duration {
        let Some(frame) = source.next_frame() else {
            break;
        };
        let total = frame.total();
        window.push(total);

        if total > BEAT_THRESHOLD
            && total > window.mean() + 1.5 * window.stddev()
            && time - last_note_time >= MIN_NOTE_INTERVAL
        {
            let lane = pick_lane(&frame, rng);
            notes.push(Note::new(
                format!("note-{time}-{lane}"),
                lane,
                time + NOTE_LOOKAHEAD,
                NOTE_DURATION,
            ));
            last_note_time = time;
        }
        time += FRAME_DT;
    }
    notes
}

// --- Demo mode ----------------------------------------------------------------

/// Fixed lane patterns the demo generator picks from each step.
pub static DEMO_PATTERNS: [&[usize]; 5] = [
    &[0, 2, 4], // left, center, right
    &[1, 3],    // mid lanes
    &[0, 1, 2, 3, 4],
    &[2],    // center only
    &[0, 4], // outer lanes
];

/// Demo mode: procedural notes on a bounded random walk of intervals.
/// Emission starts at t = 2.0 and ends one interval short of `duration - 1`,
/// with each interval perturbed by up to ±0.1 s and clamped to [0.3, 0.8].
pub fn generate_demo_chart<R: Rng>(duration: f64, rng: &mut R) -> Vec<Note> {
    let mut notes = Vec::new();
    let mut interval: f64 = 0.5;
    let mut time = NOTE_LOOKAHEAD;

    while time < duration - 1.0 {
        let pattern = DEMO_PATTERNS[rng.gen_range(0..DEMO_PATTERNS.len())];
        let lane = pattern[rng.gen_range(0..pattern.len())];
        notes.push(Note::new(
            format!("demo-note-{time}-{lane}"),
            lane,
            time,
            NOTE_DURATION,
        ));

        // Vary the interval slightly for a less mechanical feel.
        interval = (interval + rng.gen_range(-0.1..=0.1)).clamp(0.3, 0.8);
        time += interval;
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::is_time_ordered;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn frames(totals: &[(f64, f64, f64)]) -> impl Iterator<Item = BandEnergies> + '_ {
        totals.iter().map(|&(bass, mid, treble)| BandEnergies {
            bass,
            mid,
            treble,
        })
    }

    #[test]
    fn test_band_energies_average_over_range_width() {
        let mut bins = vec![0u8; 64];
        bins[..4].fill(200);
        let e = band_energies(&bins);
        assert!((e.bass - 200.0).abs() < 1e-9);
        assert!((e.mid - 0.0).abs() < 1e-9);
        // Short buffers still divide by the nominal range width.
        let short = band_energies(&[100u8; 32]);
        assert!((short.treble - 100.0 * 16.0 / 48.0).abs() < 1e-9);
    }

    #[test]
    fn test_silent_spectrum_yields_no_notes() {
        let silent = vec![(0.0, 0.0, 0.0); (60.0 * ANALYSIS_RATE_HZ) as usize];
        let mut source = frames(&silent);
        let mut rng = SmallRng::seed_from_u64(7);
        let notes = generate_from_spectrum(&mut source, 60.0, &mut rng);
        assert!(notes.is_empty());
    }

    #[test]
    fn test_spectrum_spike_emits_lookahead_note() {
        // Quiet floor, then a single bass spike well above threshold.
        let mut seq = vec![(10.0, 10.0, 10.0); 20];
        seq.push((300.0, 20.0, 20.0));
        seq.extend(std::iter::repeat_n((10.0, 10.0, 10.0), 20));
        let mut source = frames(&seq);
        let mut rng = SmallRng::seed_from_u64(1);
        let notes = generate_from_spectrum(&mut source, 10.0, &mut rng);
        assert_eq!(notes.len(), 1);
        let spike_time = 20.0 * FRAME_DT;
        assert!((notes[0].start_time - (spike_time + NOTE_LOOKAHEAD)).abs() < 1e-9);
        assert!((notes[0].duration - NOTE_DURATION).abs() < 1e-12);
    }

    #[test]
    fn test_min_interval_suppresses_rapid_beats() {
        // Constant loud signal: the adaptive test passes only while the
        // window mean lags, but back-to-back candidate frames are still
        // capped by MIN_NOTE_INTERVAL.
        let mut seq = Vec::new();
        for i in 0..80 {
            let level = if i % 2 == 0 { 400.0 } else { 10.0 };
            seq.push((level, 0.0, 0.0));
        }
        let mut source = frames(&seq);
        let mut rng = SmallRng::seed_from_u64(3);
        let notes = generate_from_spectrum(&mut source, 10.0, &mut rng);
        for w in notes.windows(2) {
            assert!(
                w[1].start_time - w[0].start_time >= MIN_NOTE_INTERVAL - 1e-9,
                "notes closer than the minimum interval"
            );
        }
    }

    #[test]
    fn test_dominant_band_lane_bias() {
        // With the nudge it can move one lane, never further.
        let bass_frame = BandEnergies {
            bass: 300.0,
            mid: 10.0,
            treble: 10.0,
        };
        let treble_frame = BandEnergies {
            bass: 10.0,
            mid: 10.0,
            treble: 300.0,
        };
        let mut rng = SmallRng::seed_from_u64(11);
        for _ in 0..200 {
            assert!(pick_lane(&bass_frame, &mut rng) <= 1);
            assert!(pick_lane(&treble_frame, &mut rng) >= 3);
        }
    }

    #[test]
    fn test_demo_chart_interval_bounds() {
        let mut rng = SmallRng::seed_from_u64(42);
        let notes = generate_demo_chart(120.0, &mut rng);
        assert!(!notes.is_empty());
        assert!(is_time_ordered(&notes));
        assert!((notes[0].start_time - 2.0).abs() < 1e-9);
        for w in notes.windows(2) {
            let gap = w[1].start_time - w[0].start_time;
            assert!((0.3 - 1e-9..=0.8 + 1e-9).contains(&gap), "gap {gap} out of bounds");
        }
    }

    #[test]
    fn test_demo_chart_ends_before_duration_margin() {
        for seed in 0..16 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let notes = generate_demo_chart(120.0, &mut rng);
            let last = notes.last().expect("demo chart never empty for 120s");
            assert!(last.start_time < 119.0);
        }
    }

    #[test]
    fn test_demo_chart_lane_and_count_envelope() {
        let mut rng = SmallRng::seed_from_u64(9);
        let notes = generate_demo_chart(120.0, &mut rng);
        for n in &notes {
            assert!(n.lane < NOTE_LANES);
        }
        // Emission spans (2, 119) with every interval clamped to [0.3, 0.8],
        // so the count is hard-bounded around the nominal 117/0.55.
        let count = notes.len() as f64;
        assert!(
            (117.0 / 0.8 - 1.0..=117.0 / 0.3 + 1.0).contains(&count),
            "count {count} outside interval-clamp envelope"
        );
    }
}
