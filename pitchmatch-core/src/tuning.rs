//! # Musical Tuning Module
//!
//! This module maps a frequency set onto the closest entry of a note table.
//! Closeness is octave-invariant: two frequencies whose ratio is a power of
//! two are a perfect match, and the penalty peaks half-way between octaves.
//!
//! ## Features
//! - Ordered note tables (table order is the tie-break order)
//! - JSON loading that preserves file order
//! - Built-in equal-temperament chromatic table over the 88-key range
//! - "rest" detection from the silent-frame marker

use crate::pitch::{FrequencySet, round_to};
use crate::{AnalysisError, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::f64::consts::{LN_2, PI};
use std::fmt;
use std::path::Path;

/// Dominant frequency produced by a frame with no energy.
pub const REST_MARKER: f64 = 1.0;

/// Label reported when the rest marker is present.
pub const REST_LABEL: &str = "rest";

/// Contribution of a frequency that sits exactly on an octave of a target.
const OCTAVE_MATCH_BONUS: f64 = -100.0;

const PITCH_CLASSES: [&str; 12] = [
    "A", "A#", "B", "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#",
];

/// Represents a single piano key with its name and frequency.
#[derive(Debug, Clone)]
pub struct PianoKey {
    /// Key name (e.g., "A4", "C#3")
    pub name: String,
    /// Frequency in Hz
    pub frequency: f64,
}

/// Statically computed keys for a standard 88-key piano (A0 to C8).
///
/// Equal temperament with A4 = 440 Hz.
static KEYS: Lazy<Vec<PianoKey>> = Lazy::new(|| {
    (0..88)
        .map(|i| {
            // A4 is the 49th key, index 48.
            let frequency = 440.0 * 2.0_f64.powf((i as f64 - 48.0) / 12.0);
            // The octave number changes at C.
            let octave = (i + 9) / 12;
            PianoKey {
                name: format!("{}{}", PITCH_CLASSES[i % 12], octave),
                frequency,
            }
        })
        .collect()
});

/// Twelve pitch classes, each listing its frequencies across the piano.
static CHROMATIC: Lazy<NoteTable> = Lazy::new(|| {
    let entries = PITCH_CLASSES
        .iter()
        .enumerate()
        .map(|(class, name)| NoteEntry {
            label: name.to_string(),
            frequencies: KEYS
                .iter()
                .skip(class)
                .step_by(12)
                .map(|key| key.frequency)
                .collect(),
        })
        .collect();
    NoteTable { entries }
});

/// Finds the piano key closest to `frequency` in Hz.
pub fn nearest_key(frequency: f64) -> &'static PianoKey {
    KEYS.iter()
        .min_by(|a, b| {
            let diff_a = (a.frequency - frequency).abs();
            let diff_b = (b.frequency - frequency).abs();
            diff_a.total_cmp(&diff_b)
        })
        .unwrap_or(&KEYS[48])
}

/// One note of a table: a label and its reference frequencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEntry {
    pub label: String,
    /// Reference frequencies in Hz, typically one per register.
    pub frequencies: Vec<f64>,
}

/// An ordered, caller-owned list of notes.
///
/// Construction guarantees the table is non-empty and every reference
/// frequency is finite and positive, which keeps the log-ratio scoring
/// well-defined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<NoteEntry>", into = "Vec<NoteEntry>")]
pub struct NoteTable {
    entries: Vec<NoteEntry>,
}

impl TryFrom<Vec<NoteEntry>> for NoteTable {
    type Error = AnalysisError;

    fn try_from(entries: Vec<NoteEntry>) -> Result<Self> {
        Self::new(entries)
    }
}

impl From<NoteTable> for Vec<NoteEntry> {
    fn from(table: NoteTable) -> Self {
        table.entries
    }
}

impl NoteTable {
    /// Validates and wraps an ordered list of notes.
    ///
    /// # Arguments
    /// * `entries` - Notes in tie-break order, earliest wins
    ///
    /// # Returns
    /// * `Result<Self>` - `InvalidNoteTable` if the list is empty, a note has
    ///   no reference frequencies, or a frequency is not finite and positive
    pub fn new(entries: Vec<NoteEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(AnalysisError::InvalidNoteTable("table has no notes".into()));
        }
        for entry in &entries {
            if entry.frequencies.is_empty() {
                return Err(AnalysisError::InvalidNoteTable(format!(
                    "note '{}' has no reference frequencies",
                    entry.label
                )));
            }
            if let Some(bad) = entry
                .frequencies
                .iter()
                .find(|f| !f.is_finite() || **f <= 0.0)
            {
                return Err(AnalysisError::InvalidNoteTable(format!(
                    "note '{}' has invalid frequency {bad}",
                    entry.label
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Builds a table from `(label, frequencies)` pairs, keeping their order.
    pub fn from_pairs<I, L, F>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (L, F)>,
        L: Into<String>,
        F: Into<Vec<f64>>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(label, frequencies)| NoteEntry {
                    label: label.into(),
                    frequencies: frequencies.into(),
                })
                .collect(),
        )
    }

    /// Parses a JSON array of `{ "label": ..., "frequencies": [...] }` objects.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a JSON note table from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    /// The twelve equal-tempered pitch classes, A first.
    pub fn chromatic() -> Self {
        CHROMATIC.clone()
    }

    pub fn entries(&self) -> &[NoteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of classifying one frequency set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// The silent-frame marker was present.
    Rest,
    /// Label of the best-matching note.
    Note(String),
}

impl Detection {
    pub fn label(&self) -> &str {
        match self {
            Detection::Rest => REST_LABEL,
            Detection::Note(label) => label,
        }
    }

    pub fn is_rest(&self) -> bool {
        matches!(self, Detection::Rest)
    }
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Octave-invariant distance between a frequency and a target.
///
/// `|100 * round(sin((pi / ln 2) * ln(f / t)), 4)|`: zero whenever `f / t`
/// is a power of two, 100 at the half-octave points. Both arguments must be
/// positive.
pub fn octave_distance(frequency: f64, target: f64) -> f64 {
    (100.0 * round_to((PI / LN_2 * (frequency / target).ln()).sin(), 4)).abs()
}

/// Contribution of one frequency to a note's weight.
///
/// The closest target decides; an exact octave match earns a bonus instead
/// of a zero penalty.
fn frequency_weight(frequency: f64, targets: &[f64]) -> f64 {
    let nearest = targets
        .iter()
        .map(|&target| octave_distance(frequency, target))
        .fold(f64::INFINITY, f64::min);
    if nearest == 0.0 {
        OCTAVE_MATCH_BONUS
    } else {
        nearest
    }
}

/// Total weight of a note against a frequency set; lower is closer.
pub fn note_weight(targets: &[f64], frequencies: &FrequencySet) -> f64 {
    frequencies
        .iter()
        .map(|f| frequency_weight(f, targets))
        .sum()
}

/// Converts a frequency set into its likeliest note.
///
/// Returns [`Detection::Rest`] as soon as the rest marker is present.
/// Otherwise every note is weighed in table order and a later note only
/// takes over with a strictly lower weight, so ties go to the earlier note.
/// An empty set weighs every note at zero and picks the first.
pub fn classify(table: &NoteTable, frequencies: &FrequencySet) -> Detection {
    if frequencies.contains(REST_MARKER) {
        return Detection::Rest;
    }

    let mut closest: Option<(&NoteEntry, f64)> = None;
    for entry in table.entries() {
        let weight = note_weight(&entry.frequencies, frequencies);
        if closest.is_none_or(|(_, best)| weight < best) {
            closest = Some((entry, weight));
        }
    }

    match closest {
        Some((entry, _)) => Detection::Note(entry.label.clone()),
        // Tables are non-empty by construction.
        None => Detection::Rest,
    }
}
