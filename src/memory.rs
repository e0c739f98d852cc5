use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::emotion::EmotionalState;

pub const HISTORY_CAP: usize = 100;
/// Fewer recorded actions than this produce no drift at all.
pub const DRIFT_MIN_HISTORY: usize = 20;
/// Drift only looks at this many of the most recent actions.
pub const DRIFT_WINDOW: usize = 50;

pub const ACTION_PLAY: &str = "play";
pub const ACTION_FEED: &str = "feed";
pub const ACTION_BREEDING: &str = "breeding";
pub const ACTION_EXPLORATION_DISCOVERY: &str = "exploration_discovery";
pub const ACTION_EXPLORATION_ANOMALY: &str = "exploration_anomaly";
pub const ACTION_MINIGAME_VICTORY: &str = "minigame_victory";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionMemory {
    pub action: String,
    pub emotion: EmotionalState,
    pub timestamp: DateTime<Utc>,
    /// In [-1, 1].
    pub impact: f64,
}

impl ActionMemory {
    pub fn new(
        action: impl Into<String>,
        emotion: EmotionalState,
        timestamp: DateTime<Utc>,
        impact: f64,
    ) -> Self {
        Self {
            action: action.into(),
            emotion,
            timestamp,
            impact: if impact.is_nan() {
                0.0
            } else {
                impact.clamp(-1.0, 1.0)
            },
        }
    }
}

/// Additive offset on top of the base personality.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalityDrift {
    pub curiosity: f64,
    pub playfulness: f64,
    pub discipline: f64,
    pub sociability: f64,
    pub calmness: f64,
}

impl PersonalityDrift {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub fn calculate_personality_drift<'a, I>(history: I) -> PersonalityDrift
where
    I: IntoIterator<Item = &'a ActionMemory>,
    I::IntoIter: DoubleEndedIterator + ExactSizeIterator,
{
    let iter = history.into_iter();
    if iter.len() < DRIFT_MIN_HISTORY {
        return PersonalityDrift::default();
    }

    let mut counts: BTreeMap<&str, f64> = BTreeMap::new();
    for m in iter.rev().take(DRIFT_WINDOW) {
        *counts.entry(m.action.as_str()).or_default() += 1.0;
    }
    let n = |action: &str| counts.get(action).copied().unwrap_or(0.0);

    let play = n(ACTION_PLAY);
    let feed = n(ACTION_FEED);
    let breeding = n(ACTION_BREEDING);
    let discovery = n(ACTION_EXPLORATION_DISCOVERY);
    let anomaly = n(ACTION_EXPLORATION_ANOMALY);
    let victory = n(ACTION_MINIGAME_VICTORY);

    PersonalityDrift {
        playfulness: (play * 0.5 + victory * 0.3).min(10.0),
        discipline: (feed * 0.4 + victory * 0.2).min(8.0),
        sociability: (breeding * 1.5 + play * 0.1).min(6.0),
        curiosity: (discovery * 0.8 + anomaly * 1.0).min(8.0),
        calmness: -(anomaly * 0.5).min(5.0),
    }
}

/// Bounded action history plus the derived drift.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Consciousness {
    history: VecDeque<ActionMemory>,
    emotion_counts: BTreeMap<EmotionalState, u32>,
    drift: PersonalityDrift,
}

impl Consciousness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds from stored parts, trimming to the cap and recomputing drift.
    pub fn restore(
        history: Vec<ActionMemory>,
        emotion_counts: BTreeMap<EmotionalState, u32>,
    ) -> Self {
        let mut history: VecDeque<ActionMemory> = history.into();
        while history.len() > HISTORY_CAP {
            history.pop_front();
        }
        let drift = calculate_personality_drift(&history);
        Self {
            history,
            emotion_counts,
            drift,
        }
    }

    pub fn record_experience(&mut self, memory: ActionMemory) {
        *self.emotion_counts.entry(memory.emotion).or_default() += 1;
        self.history.push_back(memory);
        while self.history.len() > HISTORY_CAP {
            self.history.pop_front();
        }
        self.drift = calculate_personality_drift(&self.history);
    }

    pub fn history(&self) -> &VecDeque<ActionMemory> {
        &self.history
    }

    pub fn emotion_counts(&self) -> &BTreeMap<EmotionalState, u32> {
        &self.emotion_counts
    }

    pub fn drift(&self) -> &PersonalityDrift {
        &self.drift
    }

    pub fn dominant_emotion(&self) -> Option<EmotionalState> {
        self.emotion_counts
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(e, _)| *e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(i: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(i)
    }

    fn memories(actions: &[&str]) -> Vec<ActionMemory> {
        actions
            .iter()
            .enumerate()
            .map(|(i, a)| ActionMemory::new(*a, EmotionalState::Joyful, at(i as i64), 0.5))
            .collect()
    }

    #[test]
    fn short_history_has_no_drift() {
        let history = memories(&[ACTION_PLAY; 15]);
        assert!(calculate_personality_drift(&history).is_empty());
    }

    #[test]
    fn drift_is_capped() {
        let history = memories(&[ACTION_PLAY; 60]);
        let d = calculate_personality_drift(&history);
        assert_eq!(d.playfulness, 10.0);
        assert_eq!(d.sociability, 5.0);
        assert_eq!(d.discipline, 0.0);
    }

    #[test]
    fn drift_only_reads_the_recent_window() {
        let mut actions = vec![ACTION_FEED; 60];
        actions.extend(std::iter::repeat(ACTION_PLAY).take(50));
        let d = calculate_personality_drift(&memories(&actions));
        assert_eq!(d.discipline, 0.0);
        assert_eq!(d.playfulness, 10.0);
    }

    #[test]
    fn mixed_history_drifts_each_trait() {
        let mut actions = Vec::new();
        for _ in 0..4 {
            actions.extend([
                ACTION_FEED,
                ACTION_MINIGAME_VICTORY,
                ACTION_EXPLORATION_DISCOVERY,
                ACTION_EXPLORATION_ANOMALY,
                "pet",
            ]);
        }
        let d = calculate_personality_drift(&memories(&actions));
        assert!((d.discipline - (4.0 * 0.4 + 4.0 * 0.2)).abs() < 1e-12);
        assert!((d.playfulness - 1.2).abs() < 1e-12);
        assert!((d.curiosity - 7.2).abs() < 1e-12);
        assert!((d.calmness + 2.0).abs() < 1e-12);
    }

    #[test]
    fn history_never_exceeds_cap() {
        let mut c = Consciousness::new();
        for i in 0..250 {
            c.record_experience(ActionMemory::new(
                format!("act{i}"),
                EmotionalState::Content,
                at(i),
                0.1,
            ));
            assert!(c.history().len() <= HISTORY_CAP);
        }
        assert_eq!(c.history().front().unwrap().action, "act150");
        assert_eq!(c.emotion_counts()[&EmotionalState::Content], 250);
    }

    #[test]
    fn recording_updates_drift_once_threshold_is_met() {
        let mut c = Consciousness::new();
        for i in 0..19 {
            c.record_experience(ActionMemory::new(ACTION_PLAY, EmotionalState::Playful, at(i), 0.4));
        }
        assert!(c.drift().is_empty());
        c.record_experience(ActionMemory::new(ACTION_PLAY, EmotionalState::Playful, at(19), 0.4));
        assert_eq!(c.drift().playfulness, 10.0);
        assert_eq!(c.dominant_emotion(), Some(EmotionalState::Playful));
    }

    #[test]
    fn impact_is_clamped() {
        let m = ActionMemory::new("x", EmotionalState::Neutral, at(0), 3.0);
        assert_eq!(m.impact, 1.0);
        let m = ActionMemory::new("x", EmotionalState::Neutral, at(0), f64::NAN);
        assert_eq!(m.impact, 0.0);
    }

    #[test]
    fn restore_trims_and_recomputes() {
        let c = Consciousness::restore(memories(&[ACTION_FEED; 130]), BTreeMap::new());
        assert_eq!(c.history().len(), HISTORY_CAP);
        assert_eq!(c.drift().discipline, 8.0);
    }
}
