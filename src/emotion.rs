//! Drives, comfort and the discrete emotional state.
//!
//! The pipeline is `vitals + personality -> drives -> comfort`, and separately
//! `vitals + ai mode -> emotion`, optionally re-rolled by temperament.
//! Everything except the temperament re-roll is a pure function.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::behavior::AiMode;
use crate::field::Field;
use crate::memory::PersonalityDrift;
use crate::vitals::Vitals;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionalState {
    Ecstatic,
    Joyful,
    Content,
    Serene,
    Curious,
    Playful,
    Mischievous,
    Restless,
    Yearning,
    Overwhelmed,
    Exhausted,
    Melancholic,
    Dreamy,
    Contemplative,
    Neutral,
}

impl EmotionalState {
    pub fn as_str(self) -> &'static str {
        match self {
            EmotionalState::Ecstatic => "ecstatic",
            EmotionalState::Joyful => "joyful",
            EmotionalState::Content => "content",
            EmotionalState::Serene => "serene",
            EmotionalState::Curious => "curious",
            EmotionalState::Playful => "playful",
            EmotionalState::Mischievous => "mischievous",
            EmotionalState::Restless => "restless",
            EmotionalState::Yearning => "yearning",
            EmotionalState::Overwhelmed => "overwhelmed",
            EmotionalState::Exhausted => "exhausted",
            EmotionalState::Melancholic => "melancholic",
            EmotionalState::Dreamy => "dreamy",
            EmotionalState::Contemplative => "contemplative",
            EmotionalState::Neutral => "neutral",
        }
    }
}

/// One row of the emotion cascade.
pub struct EmotionRule {
    pub emotion: EmotionalState,
    pub when: fn(&Vitals, AiMode) -> bool,
}

/// Evaluated top to bottom; the first matching row wins.
pub const EMOTION_RULES: [EmotionRule; 12] = [
    EmotionRule {
        emotion: EmotionalState::Yearning,
        when: |v, _| v.hunger > 80.0,
    },
    EmotionRule {
        emotion: EmotionalState::Overwhelmed,
        when: |v, _| v.hygiene < 30.0,
    },
    EmotionRule {
        emotion: EmotionalState::Dreamy,
        when: |_, mode| mode == AiMode::Dreaming,
    },
    EmotionRule {
        emotion: EmotionalState::Exhausted,
        when: |v, _| v.energy < 20.0,
    },
    EmotionRule {
        emotion: EmotionalState::Ecstatic,
        when: |v, _| v.mood > 85.0 && v.energy > 70.0,
    },
    EmotionRule {
        emotion: EmotionalState::Joyful,
        when: |v, _| v.mood > 70.0 && v.energy > 50.0,
    },
    EmotionRule {
        emotion: EmotionalState::Melancholic,
        when: |v, _| v.mood < 25.0,
    },
    EmotionRule {
        emotion: EmotionalState::Restless,
        when: |v, _| v.mood < 45.0 && v.energy > 70.0,
    },
    EmotionRule {
        emotion: EmotionalState::Curious,
        when: |_, mode| matches!(mode, AiMode::Observing | AiMode::Focusing),
    },
    EmotionRule {
        emotion: EmotionalState::Playful,
        when: |_, mode| mode == AiMode::Playing,
    },
    EmotionRule {
        emotion: EmotionalState::Content,
        when: |v, _| v.mood > 55.0,
    },
    EmotionRule {
        emotion: EmotionalState::Serene,
        when: |v, _| v.mood >= 45.0,
    },
];

pub fn classify_emotion(vitals: &Vitals, mode: AiMode) -> EmotionalState {
    EMOTION_RULES
        .iter()
        .find(|rule| (rule.when)(vitals, mode))
        .map(|rule| rule.emotion)
        .unwrap_or(EmotionalState::Neutral)
}

/// Base personality traits, each in [0, 100].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Personality {
    pub curiosity: f64,
    pub playfulness: f64,
    pub discipline: f64,
    pub sociability: f64,
    pub calmness: f64,
}

impl Default for Personality {
    fn default() -> Self {
        Self {
            curiosity: 50.0,
            playfulness: 50.0,
            discipline: 50.0,
            sociability: 50.0,
            calmness: 50.0,
        }
    }
}

impl Personality {
    /// Each trait lands in [30, 70], fixed for a given name.
    pub fn from_field(field: &Field) -> Self {
        let trait_of = |label: &str| 30.0 + (field.hash(label) % 41) as f64;
        Self {
            curiosity: trait_of("trait:curiosity"),
            playfulness: trait_of("trait:playfulness"),
            discipline: trait_of("trait:discipline"),
            sociability: trait_of("trait:sociability"),
            calmness: trait_of("trait:calmness"),
        }
    }

    /// Base plus drift, clamped. The base is left untouched.
    pub fn with_drift(&self, drift: &PersonalityDrift) -> Self {
        let c = |v: f64| v.clamp(0.0, 100.0);
        Self {
            curiosity: c(self.curiosity + drift.curiosity),
            playfulness: c(self.playfulness + drift.playfulness),
            discipline: c(self.discipline + drift.discipline),
            sociability: c(self.sociability + drift.sociability),
            calmness: c(self.calmness + drift.calmness),
        }
    }
}

/// Inner pressures, each in [0, 1].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Drives {
    pub resonance: f64,
    pub exploration: f64,
    pub connection: f64,
    pub rest: f64,
    pub expression: f64,
}

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Maps a [0, 100] meter to a [-1, 1] modulation around its midpoint.
fn modulation(v: f64) -> f64 {
    (v - 50.0) / 50.0
}

pub fn compute_drives(vitals: &Vitals, personality: &Personality) -> Drives {
    let energy_mod = modulation(vitals.energy);
    let curiosity_mod = modulation(vitals.curiosity);
    let mood_mod = modulation(vitals.mood);

    Drives {
        exploration: clamp01(
            personality.curiosity / 100.0 * (1.0 + energy_mod * 0.4 + curiosity_mod * 0.6),
        ),
        rest: clamp01(
            (100.0 - vitals.energy) / 100.0 * (1.0 + modulation(personality.calmness) * 0.3),
        ),
        // low bond raises the need for company
        connection: clamp01(
            personality.sociability / 100.0 * (1.0 - modulation(vitals.bond) * 0.5),
        ),
        expression: clamp01(
            personality.playfulness / 100.0 * (1.0 + mood_mod * 0.3 + energy_mod * 0.3),
        ),
        resonance: clamp01(
            (vitals.mood + vitals.bond) / 200.0 * (1.0 + modulation(personality.discipline) * 0.2),
        ),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComfortSource {
    Physical,
    Mental,
    Emotional,
    Balanced,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comfort {
    pub physical: f64,
    pub mental: f64,
    pub emotional: f64,
    pub overall: f64,
    pub source: ComfortSource,
    pub unmet_needs: Vec<String>,
}

const NEED_THRESHOLD: f64 = 50.0;
/// Components closer together than this count as balanced.
const BALANCE_SPREAD: f64 = 10.0;

pub fn compute_comfort(vitals: &Vitals, drives: &Drives) -> Comfort {
    let c = |v: f64| v.clamp(0.0, 100.0);
    let satiety = 100.0 - vitals.hunger;

    let physical = c(((1.0 - drives.rest) * 100.0 + satiety + vitals.hygiene + vitals.health) / 4.0);
    let mental =
        c(((1.0 - drives.exploration) * 100.0 + (1.0 - drives.expression) * 100.0 + vitals.mood)
            / 3.0);
    let emotional =
        c((drives.resonance * 100.0 + (1.0 - drives.connection) * 100.0 + vitals.bond) / 3.0);
    let overall = (physical + mental + emotional) / 3.0;

    let hi = physical.max(mental).max(emotional);
    let lo = physical.min(mental).min(emotional);
    let source = if hi - lo < BALANCE_SPREAD {
        ComfortSource::Balanced
    } else if physical >= hi {
        ComfortSource::Physical
    } else if mental >= hi {
        ComfortSource::Mental
    } else {
        ComfortSource::Emotional
    };

    let checks = [
        (vitals.energy, "rest"),
        (satiety, "nourishment"),
        (vitals.hygiene, "cleanliness"),
        (vitals.health, "care"),
        (mental, "stimulation"),
        (emotional, "connection"),
    ];
    let unmet_needs = checks
        .iter()
        .filter(|(v, _)| *v < NEED_THRESHOLD)
        .map(|(_, need)| need.to_string())
        .collect();

    Comfort {
        physical,
        mental,
        emotional,
        overall,
        source,
        unmet_needs,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Temperament {
    Energetic,
    Calm,
    Inquisitive,
    Gentle,
}

/// Weight below which an emotion may be re-rolled under a temperament.
const LOW_WEIGHT: f64 = 0.5;

impl Temperament {
    pub const ALL: [Temperament; 4] = [
        Temperament::Energetic,
        Temperament::Calm,
        Temperament::Inquisitive,
        Temperament::Gentle,
    ];

    pub fn from_field(field: &Field) -> Self {
        Self::ALL[(field.hash("temperament") % Self::ALL.len() as u64) as usize]
    }

    /// Affinity for `emotion`; anything not listed is 1.0.
    pub fn weight(self, emotion: EmotionalState) -> f64 {
        use EmotionalState::*;
        let table: &[(EmotionalState, f64)] = match self {
            Temperament::Energetic => &[
                (Serene, 0.3),
                (Neutral, 0.3),
                (Contemplative, 0.3),
                (Melancholic, 0.4),
                (Content, 0.6),
            ],
            Temperament::Calm => &[(Restless, 0.3), (Mischievous, 0.3), (Ecstatic, 0.5)],
            Temperament::Inquisitive => &[(Neutral, 0.3), (Serene, 0.45), (Content, 0.7)],
            Temperament::Gentle => &[(Restless, 0.4), (Mischievous, 0.4)],
        };
        table
            .iter()
            .find(|(e, _)| *e == emotion)
            .map(|(_, w)| *w)
            .unwrap_or(1.0)
    }

    pub fn alternatives(self) -> &'static [EmotionalState] {
        use EmotionalState::*;
        match self {
            Temperament::Energetic => &[Playful, Curious, Mischievous, Restless],
            Temperament::Calm => &[Serene, Content, Contemplative],
            Temperament::Inquisitive => &[Curious, Contemplative],
            Temperament::Gentle => &[Content, Serene, Joyful],
        }
    }

    /// Re-rolls a low-affinity emotion toward one that fits the temperament.
    ///
    /// Draws nothing for emotions at or above the weight cutoff; otherwise one
    /// draw for the override check and one more to pick the alternative.
    pub fn modulate(self, emotion: EmotionalState, rng: &mut impl Rng) -> EmotionalState {
        let w = self.weight(emotion);
        if w >= LOW_WEIGHT {
            return emotion;
        }
        let roll: f64 = rng.gen();
        if roll >= 1.0 - w {
            return emotion;
        }
        let alts = self.alternatives();
        alts[rng.gen_range(0..alts.len())]
    }
}
