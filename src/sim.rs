use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::behavior::{AiMode, BehaviorEvent, BehaviorInputs, BehaviorMachine};
use crate::config::Settings;
use crate::emotion::{classify_emotion, Personality, Temperament};
use crate::error::{CompanionError, Result};
use crate::evolution::{breed_genomes, splice_names, Offspring};
use crate::field::Field;
use crate::genome::Genome;
use crate::interaction::{Reaction, Response};
use crate::memory::{
    ActionMemory, ACTION_BREEDING, ACTION_EXPLORATION_ANOMALY, ACTION_EXPLORATION_DISCOVERY,
    ACTION_FEED, ACTION_MINIGAME_VICTORY, ACTION_PLAY,
};
use crate::model::{
    from_ms, to_ms, CatchupSummary, Companion, Snapshot, Streams, WHISPER_CAP,
};
use crate::sigil::SigilSet;
use crate::vitals::{Vitals, VitalsDelta};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CareAction {
    Feed,
    Play,
    Clean,
    Rest,
}

impl CareAction {
    pub fn as_str(self) -> &'static str {
        match self {
            CareAction::Feed => ACTION_FEED,
            CareAction::Play => ACTION_PLAY,
            CareAction::Clean => "clean",
            CareAction::Rest => "rest",
        }
    }

    fn effect(self) -> (VitalsDelta, f64, &'static str) {
        match self {
            CareAction::Feed => (
                VitalsDelta {
                    hunger: -25.0,
                    mood: 3.0,
                    health: 1.0,
                    ..Default::default()
                },
                0.4,
                "Mm. Warm light, thank you.",
            ),
            CareAction::Play => (
                VitalsDelta {
                    mood: 10.0,
                    energy: -7.0,
                    bond: 2.0,
                    hunger: 2.0,
                    ..Default::default()
                },
                0.6,
                "Again! Again!",
            ),
            CareAction::Clean => (
                VitalsDelta {
                    hygiene: 100.0,
                    mood: 2.0,
                    ..Default::default()
                },
                0.3,
                "I feel shiny.",
            ),
            CareAction::Rest => (
                VitalsDelta {
                    energy: 15.0,
                    mood: 1.0,
                    ..Default::default()
                },
                0.2,
                "Just a moment of stillness...",
            ),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplorationFinding {
    Discovery,
    Anomaly,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BreedOutcome {
    Born(Offspring),
    Declined(String),
}

const DECLINE_NO_PARTNER: &str = "Dream with whom? Tell me their name.";
const DECLINE_LOW_BOND: &str = "Not yet. Stay with me a little longer first.";
const SIGILS_COMPLETE: &str = "Every sigil is singing at once.";

/// Partner meters are not known, so they come from the partner's own field.
fn partner_vitals(partner: &Field) -> Vitals {
    let mut s = partner.stream("partner-vitals");
    let mut draw = || s.gen_range(20.0..90.0);
    Vitals {
        energy: draw(),
        curiosity: draw(),
        bond: draw(),
        health: draw(),
        ..Default::default()
    }
}

impl Companion {
    /// Restores from a snapshot and simulates the time spent away.
    pub fn resume(snapshot: Snapshot, now: DateTime<Utc>) -> Result<(Self, CatchupSummary)> {
        snapshot.settings.rules.validate()?;
        let max_away = ChronoDuration::try_seconds(snapshot.settings.rules.catchup_max_secs)
            .unwrap_or_else(ChronoDuration::zero);
        let earliest = now.checked_sub_signed(max_away).unwrap_or(now);
        let start = snapshot.last_seen_utc.clamp(earliest, now);
        let mut c = Self::from_snapshot(snapshot, start)?;
        let summary = c.catch_up(now);
        Ok((c, summary))
    }

    /// Runs every whole fixed step between the last tick and `now`.
    pub fn advance_to(&mut self, now: DateTime<Utc>) -> Vec<BehaviorEvent> {
        let now_ms = to_ms(now);
        let step = self.settings.rules.tick_step_ms;
        let mut events = Vec::new();
        while self.clock_ms.saturating_add(step) <= now_ms {
            self.clock_ms += step;
            events.extend(self.tick_fixed_step(self.clock_ms));
        }
        events
    }

    /// Offline catch-up, capped at `catchup_max_secs`.
    pub fn catch_up(&mut self, now: DateTime<Utc>) -> CatchupSummary {
        let rules = &self.settings.rules;
        let now_ms = to_ms(now);
        let max_ms = (rules.catchup_max_secs.max(0) as u64).saturating_mul(1_000);
        let step = rules.tick_step_ms;

        if now_ms.saturating_sub(self.clock_ms) > max_ms {
            self.clock_ms = now_ms - max_ms;
            self.behavior.reset(self.clock_ms, &mut self.streams.behavior);
        }

        let mut summary = CatchupSummary::new();
        while self.clock_ms.saturating_add(step) <= now_ms {
            self.clock_ms += step;
            for ev in self.tick_fixed_step(self.clock_ms) {
                if let BehaviorEvent::DreamComplete { .. } = ev {
                    summary.dreams += 1;
                }
            }
            summary.record(&self.vitals);
        }
        if summary.ticks_simulated > 0 {
            info!(
                ticks = summary.ticks_simulated,
                dreams = summary.dreams,
                "caught up on time away"
            );
        }
        summary
    }

    pub(crate) fn tick_fixed_step(&mut self, at_ms: u64) -> Vec<BehaviorEvent> {
        let rules = &self.settings.rules;
        let dt = (rules.tick_step_ms as f64 / 1000.0) * rules.meter_rate_scale;
        let d = rules.drift;
        let v = self.vitals;

        let dreaming = self.behavior.mode() == AiMode::Dreaming;
        let neglected = v.hunger > 80.0 || v.hygiene < 20.0;
        self.vitals.apply(&VitalsDelta {
            hunger: d.hunger * dt,
            hygiene: -d.hygiene * dt,
            curiosity: d.curiosity * dt,
            mood: (50.0 - v.mood) * d.mood_relax * dt,
            energy: if dreaming {
                d.dream_recovery * dt
            } else {
                -d.energy * dt
            },
            health: if neglected {
                -d.neglect_health * dt
            } else {
                d.passive_health * dt
            },
            ..Default::default()
        });

        let inputs = BehaviorInputs {
            energy: self.vitals.energy,
            curiosity: self.vitals.curiosity,
            sigil_count: self.sigils.len(),
        };
        let events = self
            .behavior
            .advance(at_ms, &inputs, &mut self.streams.behavior);
        for ev in &events {
            self.on_behavior_event(ev, at_ms);
        }
        self.refresh_emotion();
        events
    }

    fn on_behavior_event(&mut self, ev: &BehaviorEvent, at_ms: u64) {
        match ev {
            BehaviorEvent::DreamComplete { dreams } => {
                self.counters.dream_count = *dreams;
                self.vitals.apply(&VitalsDelta {
                    energy: self.settings.rules.dream_energy_reward,
                    mood: 2.0,
                    ..Default::default()
                });
                self.remember("dream", from_ms(at_ms), 0.3);
            }
            BehaviorEvent::Play { .. } => {
                self.vitals.apply(&VitalsDelta {
                    mood: self.settings.rules.play_mood_reward,
                    curiosity: 1.0,
                    ..Default::default()
                });
            }
            BehaviorEvent::Whisper(line) => self.push_whisper(line.clone()),
            BehaviorEvent::ModeChanged { .. } | BehaviorEvent::FocusChanged(_) => {}
        }
    }

    pub fn care(&mut self, action: CareAction, now: DateTime<Utc>) -> &'static str {
        let (delta, impact, line) = action.effect();
        self.vitals.apply(&delta);
        self.remember(action.as_str(), now, impact);
        debug!(action = action.as_str(), "care");
        line
    }

    pub fn feed(&mut self, now: DateTime<Utc>) -> &'static str {
        self.care(CareAction::Feed, now)
    }

    pub fn play(&mut self, now: DateTime<Utc>) -> &'static str {
        self.care(CareAction::Play, now)
    }

    pub fn clean(&mut self, now: DateTime<Utc>) -> &'static str {
        self.care(CareAction::Clean, now)
    }

    pub fn rest(&mut self, now: DateTime<Utc>) -> &'static str {
        self.care(CareAction::Rest, now)
    }

    pub fn poke(&mut self, now: DateTime<Utc>) -> Reaction {
        let r = self.interactions.poke(to_ms(now));
        self.respond(r, now)
    }

    pub fn pet(&mut self, now: DateTime<Utc>) -> Reaction {
        let r = self.interactions.pet();
        self.respond(r, now)
    }

    pub fn drag(&mut self, velocity: f64, now: DateTime<Utc>) -> Reaction {
        let r = self.interactions.drag(velocity);
        self.respond(r, now)
    }

    pub fn shake(&mut self, intensity: f64, now: DateTime<Utc>) -> Reaction {
        let r = self.interactions.shake(intensity, to_ms(now));
        self.respond(r, now)
    }

    pub fn grab(&mut self, now: DateTime<Utc>) -> Reaction {
        let r = self.interactions.grab(to_ms(now));
        self.respond(r, now)
    }

    pub fn release(&mut self, now: DateTime<Utc>) -> Reaction {
        let r = self.interactions.release(to_ms(now));
        self.respond(r, now)
    }

    pub fn tickle(&mut self, now: DateTime<Utc>) -> Reaction {
        let r = self.interactions.tickle();
        self.respond(r, now)
    }

    fn respond(&mut self, response: Response, now: DateTime<Utc>) -> Reaction {
        self.vitals.apply(&response.delta);
        self.counters.total_interactions += 1;
        let impact = (response.delta.mood + response.delta.bond) / 10.0;
        self.remember(response.action, now, impact);
        response.reaction
    }

    /// Returns `false` for unknown or already active sigils.
    pub fn activate_sigil(&mut self, index: usize, now: DateTime<Utc>) -> bool {
        if !self.sigils.activate(index) {
            return false;
        }
        self.vitals.apply(&VitalsDelta {
            curiosity: 3.0,
            mood: 2.0,
            ..Default::default()
        });
        self.remember("sigil_activation", now, 0.3);
        if self.sigils.all_activated() {
            self.push_whisper(SIGILS_COMPLETE.to_string());
        }
        debug!(index, active = self.sigils.activated().len(), "sigil activated");
        true
    }

    pub fn record_game_result(&mut self, game: &str, won: bool, now: DateTime<Utc>) {
        if won {
            self.counters.games_won += 1;
            self.vitals.apply(&VitalsDelta {
                mood: 8.0,
                curiosity: 3.0,
                bond: 1.0,
                ..Default::default()
            });
            self.remember(ACTION_MINIGAME_VICTORY, now, 0.7);
        } else {
            self.vitals.apply(&VitalsDelta {
                mood: -2.0,
                ..Default::default()
            });
            self.remember("minigame_loss", now, -0.2);
        }
        debug!(game, won, "mini-game result");
    }

    pub fn record_exploration(&mut self, finding: ExplorationFinding, now: DateTime<Utc>) {
        let (delta, action, impact) = match finding {
            ExplorationFinding::Discovery => (
                VitalsDelta {
                    curiosity: 6.0,
                    mood: 3.0,
                    ..Default::default()
                },
                ACTION_EXPLORATION_DISCOVERY,
                0.5,
            ),
            ExplorationFinding::Anomaly => (
                VitalsDelta {
                    curiosity: 10.0,
                    mood: -2.0,
                    energy: -3.0,
                    ..Default::default()
                },
                ACTION_EXPLORATION_ANOMALY,
                -0.1,
            ),
        };
        self.vitals.apply(&delta);
        self.remember(action, now, impact);
    }

    /// Breeds with the companion named `partner`. Declines are ordinary
    /// outcomes and leave the state untouched apart from a whisper.
    pub fn breed(&mut self, partner: &str, now: DateTime<Utc>) -> BreedOutcome {
        let partner = partner.trim();
        if partner.is_empty() {
            return self.decline(DECLINE_NO_PARTNER);
        }
        let threshold = self.settings.rules.breeding_bond_threshold;
        if self.vitals.bond < threshold {
            debug!(bond = self.vitals.bond, threshold, "breeding declined");
            return self.decline(DECLINE_LOW_BOND);
        }
        let partner_field = match Field::new(partner) {
            Ok(f) => f,
            Err(err) => {
                warn!(%err, "partner field unavailable");
                return self.decline(DECLINE_NO_PARTNER);
            }
        };

        let partner_genome = Genome::derive(&partner_field, &partner_vitals(&partner_field));
        let genome = breed_genomes(&self.genome(), &partner_genome, &mut self.streams.breeding);
        let offspring = Offspring {
            name: splice_names(self.name(), partner),
            genome,
            parents: [self.name().to_string(), partner.to_string()],
            birth_date: now,
        };

        self.offspring.push(offspring.clone());
        self.counters.breed_count += 1;
        self.vitals.apply(&VitalsDelta {
            energy: -15.0,
            mood: 10.0,
            bond: 5.0,
            ..Default::default()
        });
        self.remember(ACTION_BREEDING, now, 0.8);
        info!(
            child = %offspring.name,
            partner,
            power = offspring.evolution().power,
            "offspring born"
        );
        BreedOutcome::Born(offspring)
    }

    fn decline(&mut self, line: &str) -> BreedOutcome {
        self.push_whisper(line.to_string());
        BreedOutcome::Declined(line.to_string())
    }

    /// Rebinds to a new name. Vitals, memories and offspring carry over;
    /// everything derived from the field is rebuilt and activations reset.
    pub fn reseed(&mut self, name: &str, now: DateTime<Utc>) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CompanionError::config("name must not be empty"));
        }
        let field = Field::new(name)?;
        self.clock_ms = self.clock_ms.max(to_ms(now));
        self.rebind(field);
        self.behavior.reset(self.clock_ms, &mut self.streams.behavior);
        self.refresh_emotion();
        info!(name, "companion reseeded");
        Ok(())
    }

    /// Swaps in a new field and rebuilds what derives from it. Cannot fail.
    fn rebind(&mut self, field: Field) {
        self.settings.name = field.name().to_string();
        self.personality = Personality::from_field(&field);
        self.temperament = Temperament::from_field(&field);
        self.sigils = SigilSet::generate(
            &field,
            self.settings.sigil_count,
            &self.settings.sigil_layout,
        );
        self.streams = Streams::for_field(&field);
        self.field = field;
        self.interactions = Default::default();
    }

    /// Starts over with the current settings.
    pub fn reset(&mut self, now: DateTime<Utc>) -> Result<()> {
        *self = Companion::new(self.settings.clone(), now)?;
        info!(name = self.name(), "companion reset");
        Ok(())
    }

    /// Applies new settings, rebuilding only what they touch. On error the
    /// companion is left exactly as it was.
    pub fn update_settings(&mut self, settings: Settings, now: DateTime<Utc>) -> Result<()> {
        settings.validate()?;
        let renamed = settings.name.trim() != self.field.name();
        let field = if renamed {
            Some(Field::new(settings.name.trim())?)
        } else {
            None
        };
        let machine = if settings.behavior != self.settings.behavior {
            Some(BehaviorMachine::new(settings.behavior.clone())?)
        } else {
            None
        };
        let regenerate = settings.sigil_count != self.settings.sigil_count
            || settings.sigil_layout != self.settings.sigil_layout;

        let restart = renamed || regenerate || machine.is_some();
        self.settings = settings;
        self.clock_ms = self.clock_ms.max(to_ms(now));
        if let Some(mut machine) = machine {
            machine.set_dream_count(self.counters.dream_count);
            self.behavior = machine;
        }
        if let Some(field) = field {
            self.rebind(field);
        } else if regenerate {
            self.sigils = SigilSet::generate(
                &self.field,
                self.settings.sigil_count,
                &self.settings.sigil_layout,
            );
        }
        // focus may point past the new sigil set
        if restart {
            self.behavior.reset(self.clock_ms, &mut self.streams.behavior);
            self.refresh_emotion();
        }
        if renamed {
            info!(name = self.name(), "companion reseeded");
        }
        Ok(())
    }

    fn remember(&mut self, action: &str, at: DateTime<Utc>, impact: f64) {
        self.refresh_emotion();
        self.consciousness
            .record_experience(ActionMemory::new(action, self.emotion, at, impact));
    }

    fn refresh_emotion(&mut self) {
        let base = classify_emotion(&self.vitals, self.behavior.mode());
        self.emotion = self.temperament.modulate(base, &mut self.streams.temperament);
    }

    fn push_whisper(&mut self, line: String) {
        self.whispers.push_back(line);
        while self.whispers.len() > WHISPER_CAP {
            self.whispers.pop_front();
        }
    }
}
