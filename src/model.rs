use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::behavior::{AiState, BehaviorMachine};
use crate::config::Settings;
use crate::emotion::{
    classify_emotion, compute_comfort, compute_drives, Comfort, Drives, EmotionalState,
    Personality, Temperament,
};
use crate::error::{CompanionError, Result};
use crate::evolution::{EvolutionState, Offspring};
use crate::field::{Digits, Field, SubStream};
use crate::genome::Genome;
use crate::interaction::InteractionTracker;
use crate::memory::{ActionMemory, Consciousness, PersonalityDrift};
use crate::sigil::{SigilPoint, SigilSet};
use crate::vitals::Vitals;

pub const SAVE_VERSION: u32 = 1;
/// Longest absence replayed on resume.
pub const MAX_CATCHUP_SECS: i64 = 30 * 24 * 3600;
pub(crate) const WHISPER_CAP: usize = 16;

/// Per-second autonomous change applied while time passes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftRates {
    pub hunger: f64,
    pub energy: f64,
    pub hygiene: f64,
    pub curiosity: f64,
    /// Fraction of the distance to neutral mood closed per second.
    pub mood_relax: f64,
    pub dream_recovery: f64,
    pub neglect_health: f64,
    pub passive_health: f64,
}

impl Default for DriftRates {
    fn default() -> Self {
        Self {
            hunger: 1.2,
            energy: 0.8,
            hygiene: 0.6,
            curiosity: 0.3,
            mood_relax: 0.02,
            dream_recovery: 4.0,
            neglect_health: 1.5,
            passive_health: 0.25,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rules {
    pub tick_step_ms: u64,
    pub catchup_max_secs: i64,
    /// 1.0 = normal, lower = slower meter changes.
    pub meter_rate_scale: f64,
    pub drift: DriftRates,
    pub breeding_bond_threshold: f64,
    pub dream_energy_reward: f64,
    pub play_mood_reward: f64,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            tick_step_ms: 1_000,
            catchup_max_secs: 24 * 3600,
            meter_rate_scale: 0.05,
            drift: DriftRates::default(),
            breeding_bond_threshold: 60.0,
            dream_energy_reward: 25.0,
            play_mood_reward: 4.0,
        }
    }
}

impl Rules {
    pub fn validate(&self) -> Result<()> {
        if self.tick_step_ms == 0 {
            return Err(CompanionError::config("tick_step_ms must be positive"));
        }
        if !(0..=MAX_CATCHUP_SECS).contains(&self.catchup_max_secs) {
            return Err(CompanionError::config(format!(
                "catchup_max_secs must be within [0, {MAX_CATCHUP_SECS}], got {}",
                self.catchup_max_secs
            )));
        }
        if !(self.meter_rate_scale >= 0.0) {
            return Err(CompanionError::config("meter_rate_scale must be non-negative"));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Counters {
    pub total_interactions: u64,
    pub dream_count: u64,
    pub games_won: u64,
    pub breed_count: u64,
}

/// One independent random stream per subsystem.
#[derive(Clone, Debug)]
pub(crate) struct Streams {
    pub(crate) behavior: SubStream,
    pub(crate) breeding: SubStream,
    pub(crate) temperament: SubStream,
}

impl Streams {
    pub(crate) fn for_field(field: &Field) -> Self {
        Self {
            behavior: field.stream("behavior"),
            breeding: field.stream("breeding"),
            temperament: field.stream("temperament"),
        }
    }
}

/// The whole simulated entity. Rendering reads it through [`Companion::view`];
/// every mutation goes through the methods in `sim`.
#[derive(Clone, Debug)]
pub struct Companion {
    pub(crate) settings: Settings,
    pub(crate) field: Field,
    pub(crate) personality: Personality,
    pub(crate) temperament: Temperament,
    pub(crate) vitals: Vitals,
    pub(crate) sigils: SigilSet,
    pub(crate) behavior: BehaviorMachine,
    pub(crate) streams: Streams,
    pub(crate) consciousness: Consciousness,
    pub(crate) interactions: InteractionTracker,
    pub(crate) offspring: Vec<Offspring>,
    pub(crate) counters: Counters,
    pub(crate) emotion: EmotionalState,
    pub(crate) whispers: VecDeque<String>,
    pub(crate) clock_ms: u64,
}

pub(crate) fn to_ms(t: DateTime<Utc>) -> u64 {
    t.timestamp_millis().max(0) as u64
}

pub(crate) fn from_ms(ms: u64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms as i64)
        .single()
        .unwrap_or_default()
}

impl Companion {
    pub fn new(settings: Settings, now: DateTime<Utc>) -> Result<Self> {
        settings.validate()?;
        let field = Field::new(&settings.name)?;
        let mut behavior = BehaviorMachine::new(settings.behavior.clone())?;
        let mut streams = Streams::for_field(&field);
        let clock_ms = to_ms(now);
        behavior.start(clock_ms, &mut streams.behavior);

        let vitals = Vitals::default();
        let emotion = classify_emotion(&vitals, behavior.mode());

        info!(name = %settings.name, "companion created");

        Ok(Self {
            personality: Personality::from_field(&field),
            temperament: Temperament::from_field(&field),
            sigils: SigilSet::generate(&field, settings.sigil_count, &settings.sigil_layout),
            field,
            vitals,
            behavior,
            streams,
            consciousness: Consciousness::new(),
            interactions: InteractionTracker::new(),
            offspring: Vec::new(),
            counters: Counters::default(),
            emotion,
            whispers: VecDeque::new(),
            clock_ms,
            settings,
        })
    }

    /// Rebuilds a companion from a stored record. Behavior restarts in `idle`.
    pub fn from_snapshot(snapshot: Snapshot, now: DateTime<Utc>) -> Result<Self> {
        let mut settings = snapshot.settings;
        if !snapshot.name.trim().is_empty() {
            settings.name = snapshot.name;
        }
        let mut c = Self::new(settings, now)?;
        c.vitals = snapshot.vitals.clamped();
        if let Some(p) = snapshot.personality {
            c.personality = p;
        }
        c.consciousness = Consciousness::restore(snapshot.history, snapshot.emotion_counts);
        c.sigils.restore_activated(snapshot.activated_sigils);
        c.counters = snapshot.counters;
        c.behavior.set_dream_count(snapshot.counters.dream_count);
        c.offspring = snapshot.offspring;
        c.emotion = classify_emotion(&c.vitals, c.behavior.mode());
        Ok(c)
    }

    pub fn to_snapshot(&self, now: DateTime<Utc>) -> Snapshot {
        Snapshot {
            version: SAVE_VERSION,
            last_seen_utc: now,
            name: self.field.name().to_string(),
            vitals: self.vitals,
            personality: Some(self.personality),
            history: self.consciousness.history().iter().cloned().collect(),
            emotion_counts: self.consciousness.emotion_counts().clone(),
            activated_sigils: self.sigils.activated().iter().copied().collect(),
            counters: self.counters,
            offspring: self.offspring.clone(),
            settings: self.settings.clone(),
        }
    }

    pub fn name(&self) -> &str {
        self.field.name()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn vitals(&self) -> &Vitals {
        &self.vitals
    }

    pub fn genome(&self) -> Genome {
        Genome::derive(&self.field, &self.vitals)
    }

    pub fn evolution(&self) -> EvolutionState {
        EvolutionState::from_genome(&self.genome())
    }

    pub fn sigils(&self) -> &SigilSet {
        &self.sigils
    }

    pub fn ai_state(&self) -> &AiState {
        self.behavior.state()
    }

    /// Due time of the single pending behavior transition.
    pub fn next_transition_ms(&self) -> Option<u64> {
        self.behavior.pending_due_ms()
    }

    pub fn temperament(&self) -> Temperament {
        self.temperament
    }

    pub fn base_personality(&self) -> &Personality {
        &self.personality
    }

    pub fn personality_drift(&self) -> &PersonalityDrift {
        self.consciousness.drift()
    }

    /// Base personality plus current drift, recomputed on every read.
    pub fn effective_personality(&self) -> Personality {
        self.personality.with_drift(self.consciousness.drift())
    }

    pub fn drives(&self) -> Drives {
        compute_drives(&self.vitals, &self.effective_personality())
    }

    pub fn comfort(&self) -> Comfort {
        compute_comfort(&self.vitals, &self.drives())
    }

    /// Current emotion, after temperament modulation.
    pub fn emotion(&self) -> EmotionalState {
        self.emotion
    }

    /// Emotion straight from the cascade, before temperament.
    pub fn base_emotion(&self) -> EmotionalState {
        classify_emotion(&self.vitals, self.behavior.mode())
    }

    pub fn history(&self) -> &VecDeque<ActionMemory> {
        self.consciousness.history()
    }

    pub fn offspring(&self) -> &[Offspring] {
        &self.offspring
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn whispers(&self) -> impl Iterator<Item = &str> {
        self.whispers.iter().map(String::as_str)
    }

    pub fn drain_whispers(&mut self) -> Vec<String> {
        self.whispers.drain(..).collect()
    }

    pub fn view(&self) -> CompanionView<'_> {
        CompanionView {
            name: self.field.name(),
            pulse: self.field.pulse(),
            ring: self.field.ring(),
            genome: self.genome(),
            evolution: self.evolution(),
            ai: *self.behavior.state(),
            emotion: self.emotion,
            comfort: self.comfort(),
            vitals: self.vitals,
            sigils: self.sigils.points(),
            activated: self.sigils.activated(),
        }
    }
}

/// Read-only snapshot handed to a renderer.
#[derive(Clone, Debug)]
pub struct CompanionView<'a> {
    pub name: &'a str,
    pub pulse: &'a Digits,
    pub ring: &'a Digits,
    pub genome: Genome,
    pub evolution: EvolutionState,
    pub ai: AiState,
    pub emotion: EmotionalState,
    pub comfort: Comfort,
    pub vitals: Vitals,
    pub sigils: &'a [SigilPoint],
    pub activated: &'a BTreeSet<usize>,
}

/// Persisted record. Missing fields fall back to defaults; a different
/// `version` is discarded by the loader.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    #[serde(default)]
    pub last_seen_utc: DateTime<Utc>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub vitals: Vitals,
    /// Base personality; rederived from the name when absent.
    #[serde(default)]
    pub personality: Option<Personality>,
    #[serde(default)]
    pub history: Vec<ActionMemory>,
    #[serde(default)]
    pub emotion_counts: BTreeMap<EmotionalState, u32>,
    #[serde(default)]
    pub activated_sigils: Vec<usize>,
    #[serde(default)]
    pub counters: Counters,
    #[serde(default)]
    pub offspring: Vec<Offspring>,
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CatchupSummary {
    pub ticks_simulated: u64,
    pub dreams: u64,
    pub hunger_max: f64,
    pub mood_min: f64,
    pub energy_min: f64,
}

impl CatchupSummary {
    pub(crate) fn new() -> Self {
        Self {
            ticks_simulated: 0,
            dreams: 0,
            hunger_max: 0.0,
            mood_min: 100.0,
            energy_min: 100.0,
        }
    }

    pub fn has_anything(&self) -> bool {
        self.ticks_simulated > 0
            && (self.dreams > 0
                || self.hunger_max > 70.0
                || self.mood_min < 40.0
                || self.energy_min < 30.0)
    }

    pub(crate) fn record(&mut self, vitals: &Vitals) {
        self.ticks_simulated += 1;
        self.hunger_max = self.hunger_max.max(vitals.hunger);
        self.mood_min = self.mood_min.min(vitals.mood);
        self.energy_min = self.energy_min.min(vitals.energy);
    }
}
