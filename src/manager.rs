//! The orchestrator: owns the progression state, the ledger and the
//! catalog, and exposes every player-facing operation as a method that
//! either completes or returns `false` without mutating anything.
//!
//! Derived stats are recomputed from owned effect sources on every call;
//! nothing is cached, so there is no invalidation to get wrong.

use crate::catalog::Catalog;
use crate::clock::{GameClock, TICK_MS};
use crate::currency::{CurrencyKind, CurrencyLedger, Price, LAYER_ELECTRONIZE, LAYER_PROTONISE};
use crate::effects::{calculate, EffectCtx, EffectKind, EffectSource, Selector};
use crate::offline::{self, OfflineSummary};
use crate::save::{self, GameState, SaveError, SaveStore};
use crate::state::{
    default_feature_state, level_from_total_xp, Building, BuildingId, Feature, PowerUp,
    ProgressionState, RealmKind, RealmState,
};

/// Geometric price growth per building owned.
pub const BUILDING_COST_RATIO: f64 = 1.15;
/// XP granted per atom earned while the levels feature is on.
pub const XP_PER_ATOM: f64 = 0.1;
/// Atoms on hand needed before protonising pays out at all.
pub const PROTONISE_ATOMS_REQUIRED: f64 = 1e12;
/// Protons on hand needed before electronizing is offered.
pub const ELECTRONIZE_PROTONS_REQUIRED: f64 = 1e9;
/// Production boost per skill point invested in a currency.
pub const BOOST_PER_POINT: f64 = 0.1;
/// Most skill points a single currency accepts.
pub const MAX_BOOST_POINTS: u32 = 20;
/// Idle ms to fully charge the stability field, before modifiers.
pub const STABILITY_BASE_TIME_MS: f64 = 600_000.0;
/// Stability multiplier at full charge, before modifiers.
pub const STABILITY_BASE_MAX_BOOST: f64 = 2.0;
/// Chance for a spawned photon to be excited, before modifiers.
pub const EXCITED_PHOTON_BASE_CHANCE: f64 = 0.002;
/// Base wait between photon spawns (ms), before modifiers.
pub const PHOTON_BASE_SPAWN_INTERVAL_MS: f64 = 10_000.0;

/// Out-of-band events the host may surface to the player.
#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    AchievementUnlocked { id: String, name: String },
    RealmUnlocked(RealmKind),
    OfflineProgressApplied(OfflineSummary),
}

pub trait Notifier {
    fn notify(&mut self, event: GameEvent);
}

/// Discards every event. The default when the host has no UI yet.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&mut self, _event: GameEvent) {}
}

/// Records events for inspection.
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Vec<GameEvent>,
}

impl Notifier for RecordingNotifier {
    fn notify(&mut self, event: GameEvent) {
        self.events.push(event);
    }
}

pub struct GameManager {
    pub state: ProgressionState,
    pub ledger: CurrencyLedger,
    pub catalog: Catalog,
    notifier: Box<dyn Notifier>,
    clock: GameClock,
}

impl GameManager {
    pub fn new(catalog: Catalog, notifier: Box<dyn Notifier>) -> Self {
        Self {
            state: ProgressionState::default(),
            ledger: CurrencyLedger::new(),
            catalog,
            notifier,
            clock: GameClock::new(),
        }
    }

    pub fn standard() -> Self {
        Self::new(Catalog::standard(), Box::new(NullNotifier))
    }

    // ---- effect sources -------------------------------------------------

    /// Every owned upgrade, skill and photon-upgrade level, in catalog
    /// order. That order is the fold order of all derived stats.
    pub fn active_effect_sources(&self) -> Vec<EffectSource> {
        let mut sources = Vec::new();
        for (id, def) in &self.catalog.upgrades {
            if self.state.owns_upgrade(id) && !def.effects.is_empty() {
                sources.push(EffectSource {
                    id: (*id).to_string(),
                    effects: def.effects.clone(),
                });
            }
        }
        for (id, def) in &self.catalog.skills {
            if self.state.owns_skill(id) && !def.effects.is_empty() {
                sources.push(EffectSource {
                    id: (*id).to_string(),
                    effects: def.effects.clone(),
                });
            }
        }
        for (id, def) in &self.catalog.photon_upgrades {
            let level = self.state.photon_upgrade_level(id);
            if level > 0 {
                let effects = (def.effects)(level);
                if !effects.is_empty() {
                    sources.push(EffectSource {
                        id: (*id).to_string(),
                        effects,
                    });
                }
            }
        }
        sources
    }

    fn derived(&self, sources: &[EffectSource], kind: EffectKind, base: f64) -> f64 {
        let ctx = EffectCtx::new(&self.state, &self.ledger);
        calculate(sources, Selector::of(kind), &ctx, base)
    }

    // ---- derived stats --------------------------------------------------

    pub fn player_level(&self) -> u32 {
        level_from_total_xp(self.state.total_xp)
    }

    /// Stepped tier multiplier for a building. Level 0 is neutral.
    pub fn level_multiplier(count: u32, level: u32) -> f64 {
        if level == 0 {
            return 1.0;
        }
        let base = (count as f64 / 2.0).powi(level as i32 + 1) / 5.0;
        (base * (level as f64 + 1.0) * 100.0).sqrt()
    }

    /// One building's output per second before run-wide multipliers.
    pub fn building_production(&self, id: BuildingId, sources: &[EffectSource]) -> f64 {
        let Some(building) = self.state.buildings.get(&id) else {
            return 0.0;
        };
        if building.count == 0 {
            return 0.0;
        }
        let ctx = EffectCtx::new(&self.state, &self.ledger);
        let rate = calculate(sources, Selector::building(id), &ctx, building.rate);
        building.count as f64 * rate * Self::level_multiplier(building.count, building.level)
    }

    pub fn global_multiplier(&self, sources: &[EffectSource]) -> f64 {
        self.derived(sources, EffectKind::Global, 1.0)
    }

    /// Product of active power-up multipliers, each folded through
    /// power-up-strength modifiers.
    pub fn bonus_multiplier(&self, sources: &[EffectSource], now_ms: f64) -> f64 {
        self.state
            .active_power_ups
            .iter()
            .filter(|p| !p.expired(now_ms))
            .map(|p| self.derived(sources, EffectKind::PowerUpMultiplier, p.multiplier))
            .product()
    }

    /// Idle-time production bonus. Inactive without the stability field
    /// feature, and suppressed entirely while any power-up runs.
    pub fn stability_multiplier(&self, sources: &[EffectSource], now_ms: f64) -> f64 {
        if !self.state.feature_enabled(Feature::StabilityField) {
            return 1.0;
        }
        let any_power_up = self
            .state
            .active_power_ups
            .iter()
            .any(|p| !p.expired(now_ms));
        if any_power_up {
            return 1.0;
        }
        let capacity = self.derived(sources, EffectKind::StabilityCapacity, 1.0);
        let speed = self.derived(sources, EffectKind::StabilitySpeed, 1.0);
        let max_boost = self.derived(sources, EffectKind::StabilityBoost, STABILITY_BASE_MAX_BOOST);
        let time_required = STABILITY_BASE_TIME_MS * capacity / speed;
        let idle = (now_ms - self.state.last_interaction_time).max(0.0);
        let progress = (idle / time_required).clamp(0.0, 1.0);
        1.0 + (max_boost - 1.0) * capacity * progress
    }

    pub fn currency_boost_multiplier(&self, kind: CurrencyKind) -> f64 {
        let points = self.state.currency_boosts.get(&kind).copied().unwrap_or(0);
        1.0 + BOOST_PER_POINT * points as f64
    }

    /// Total production in atoms per second at `now_ms`.
    pub fn atoms_per_second(&self, now_ms: f64) -> f64 {
        let sources = self.active_effect_sources();
        let base: f64 = self
            .catalog
            .buildings
            .keys()
            .map(|id| self.building_production(*id, &sources))
            .sum();
        base * self.global_multiplier(&sources)
            * self.bonus_multiplier(&sources, now_ms)
            * self.stability_multiplier(&sources, now_ms)
            * self.currency_boost_multiplier(CurrencyKind::Atoms)
    }

    pub fn click_power(&self, now_ms: f64) -> f64 {
        let sources = self.active_effect_sources();
        self.derived(&sources, EffectKind::Click, 1.0) * self.bonus_multiplier(&sources, now_ms)
    }

    pub fn auto_clicks_per_second(&self) -> f64 {
        let sources = self.active_effect_sources();
        self.derived(&sources, EffectKind::AutoClick, 0.0)
    }

    pub fn photon_auto_clicks_per_5s(&self) -> f64 {
        let sources = self.active_effect_sources();
        self.derived(&sources, EffectKind::PhotonAutoClick, 0.0)
    }

    pub fn photon_spawn_interval_ms(&self) -> f64 {
        let sources = self.active_effect_sources();
        self.derived(
            &sources,
            EffectKind::PhotonSpawnInterval,
            PHOTON_BASE_SPAWN_INTERVAL_MS,
        )
    }

    pub fn excited_photon_chance(&self) -> f64 {
        let sources = self.active_effect_sources();
        self.derived(
            &sources,
            EffectKind::ExcitedPhotonChance,
            EXCITED_PHOTON_BASE_CHANCE,
        )
        .clamp(0.0, 1.0)
    }

    pub fn xp_gain_multiplier(&self) -> f64 {
        let sources = self.active_effect_sources();
        self.derived(&sources, EffectKind::XpGain, 1.0)
    }

    // ---- skill points ---------------------------------------------------

    /// One point per building level across all buildings.
    pub fn skill_points_total(&self) -> u32 {
        self.state.buildings.values().map(|b| b.level).sum()
    }

    pub fn skill_points_used(&self) -> u32 {
        self.state.currency_boosts.values().sum()
    }

    pub fn skill_points_available(&self) -> u32 {
        self.skill_points_total()
            .saturating_sub(self.skill_points_used())
    }

    pub fn add_currency_boost(&mut self, kind: CurrencyKind) -> bool {
        let current = self.state.currency_boosts.get(&kind).copied().unwrap_or(0);
        if self.skill_points_available() == 0 || current >= MAX_BOOST_POINTS {
            return false;
        }
        self.state.currency_boosts.insert(kind, current + 1);
        true
    }

    pub fn remove_currency_boost(&mut self, kind: CurrencyKind) -> bool {
        let current = self.state.currency_boosts.get(&kind).copied().unwrap_or(0);
        if current == 0 {
            return false;
        }
        self.state.currency_boosts.insert(kind, current - 1);
        true
    }

    // ---- income ---------------------------------------------------------

    /// Credit atoms and grant XP when the levels feature is on.
    pub fn add_atoms(&mut self, amount: f64) {
        if amount <= 0.0 || !amount.is_finite() {
            return;
        }
        self.ledger.add(CurrencyKind::Atoms, amount);
        if self.state.feature_enabled(Feature::Levels) {
            self.state.total_xp += amount * XP_PER_ATOM * self.xp_gain_multiplier();
        }
    }

    /// A manual click. Resets the idle timer unless the matching bypass
    /// is owned.
    pub fn click(&mut self, now_ms: f64) -> f64 {
        let power = self.click_power(now_ms) * self.currency_boost_multiplier(CurrencyKind::Atoms);
        self.add_atoms(power);
        self.state.total_clicks_run += 1;
        self.state.total_clicks_all_time += 1;
        if !self.state.owns_upgrade("electron_bypass_atom_click_stability") {
            self.state.last_interaction_time = now_ms;
        }
        power
    }

    // ---- purchases ------------------------------------------------------

    fn building_base_cost(&self, id: BuildingId) -> Option<Price> {
        self.catalog.buildings.get(&id).map(|d| d.cost)
    }

    /// Price of the next `quantity` units, geometric series rounded to a
    /// whole amount.
    pub fn building_cost(&self, id: BuildingId, quantity: u32) -> Option<Price> {
        let base = self.building_base_cost(id)?;
        let count = self.state.building_count(id);
        let first = base.amount * BUILDING_COST_RATIO.powi(count as i32);
        let amount = if quantity == 0 {
            0.0
        } else {
            first * (BUILDING_COST_RATIO.powi(quantity as i32) - 1.0)
                / (BUILDING_COST_RATIO - 1.0)
        };
        Some(Price::new(amount.round(), base.currency))
    }

    /// Largest purchase quantity the current balance covers.
    pub fn max_affordable(&self, id: BuildingId) -> u32 {
        let Some(base) = self.building_base_cost(id) else {
            return 0;
        };
        let count = self.state.building_count(id);
        let first = base.amount * BUILDING_COST_RATIO.powi(count as i32);
        let balance = self.ledger.amount(base.currency);
        if balance < first {
            return 0;
        }
        let ratio = BUILDING_COST_RATIO;
        ((balance * (ratio - 1.0) / first + 1.0).ln() / ratio.ln()).floor() as u32
    }

    pub fn purchase_building(&mut self, id: BuildingId, quantity: u32) -> bool {
        if quantity == 0 {
            return false;
        }
        let Some(price) = self.building_cost(id, quantity) else {
            return false;
        };
        if !self.ledger.spend(&price) {
            return false;
        }
        let def = &self.catalog.buildings[&id];
        let entry = self.state.buildings.entry(id).or_insert(Building {
            cost: def.cost,
            count: 0,
            level: 0,
            rate: def.rate,
            unlocked: true,
        });
        entry.count += quantity;
        entry.level = Building::level_for_count(entry.count);
        entry.cost = Price::new(
            (def.cost.amount * BUILDING_COST_RATIO.powi(entry.count as i32)).round(),
            def.cost.currency,
        );
        self.state.total_buildings_purchased_all_time += quantity;
        true
    }

    /// Reveal a building once its price currency has ever covered the
    /// base cost. Returns true only on the unlocking transition.
    pub fn unlock_building(&mut self, id: BuildingId) -> bool {
        let Some(def) = self.catalog.buildings.get(&id) else {
            return false;
        };
        if self.state.buildings.get(&id).is_some_and(|b| b.unlocked) {
            return false;
        }
        if self.ledger.earned_run(def.cost.currency) < def.cost.amount {
            return false;
        }
        let building = Building {
            cost: def.cost,
            count: 0,
            level: 0,
            rate: def.rate,
            unlocked: true,
        };
        let entry = self.state.buildings.entry(id).or_insert(building);
        entry.unlocked = true;
        true
    }

    pub fn purchase_upgrade(&mut self, id: &str) -> bool {
        let Some(def) = self.catalog.upgrades.get(id) else {
            return false;
        };
        if self.state.owns_upgrade(id) {
            return false;
        }
        if let Some(condition) = &def.condition {
            let ctx = EffectCtx::new(&self.state, &self.ledger);
            if !condition(&ctx) {
                return false;
            }
        }
        if !self.ledger.spend(&def.cost) {
            return false;
        }
        self.state.upgrades.push(id.to_string());
        self.state.total_upgrades_purchased_all_time += 1;
        true
    }

    pub fn skill_requirements_met(&self, id: &str) -> bool {
        self.catalog
            .skills
            .get(id)
            .is_some_and(|def| def.requires.iter().all(|req| self.state.owns_skill(req)))
    }

    pub fn purchase_skill(&mut self, id: &str, now_ms: f64) -> bool {
        let Some(def) = self.catalog.skills.get(id) else {
            return false;
        };
        if self.state.owns_skill(id) || !self.skill_requirements_met(id) {
            return false;
        }
        if let Some(condition) = &def.condition {
            let ctx = EffectCtx::new(&self.state, &self.ledger);
            if !condition(&ctx) {
                return false;
            }
        }
        if !self.ledger.spend(&def.cost) {
            return false;
        }
        self.state.skill_upgrades.push(id.to_string());
        self.sync_features();
        self.check_realm_unlocks(now_ms);
        true
    }

    pub fn purchase_photon_upgrade(&mut self, id: &str) -> bool {
        let Some(def) = self.catalog.photon_upgrades.get(id) else {
            return false;
        };
        let level = self.state.photon_upgrade_level(id);
        if level >= def.max_level {
            return false;
        }
        if !self.ledger.spend(&def.cost_at(level)) {
            return false;
        }
        self.state.photon_upgrades.insert(id.to_string(), level + 1);
        true
    }

    // ---- features and realms ---------------------------------------------

    /// Re-derive every feature flag from the skills currently owned.
    pub fn sync_features(&mut self) {
        let mut features = default_feature_state();
        for (id, def) in &self.catalog.skills {
            if let Some(feature) = def.feature {
                if self.state.owns_skill(id) {
                    features.insert(feature, true);
                }
            }
        }
        self.state.features = features;
    }

    pub fn check_realm_unlocks(&mut self, _now_ms: f64) {
        if self.state.feature_enabled(Feature::PurpleRealm) {
            let realm = self
                .state
                .realms
                .entry(RealmKind::Photons)
                .or_insert(RealmState { unlocked: false });
            if !realm.unlocked {
                realm.unlocked = true;
                self.notifier.notify(GameEvent::RealmUnlocked(RealmKind::Photons));
            }
        }
    }

    pub fn check_achievements(&mut self) {
        let mut newly = Vec::new();
        {
            let ctx = EffectCtx::new(&self.state, &self.ledger);
            for (id, def) in &self.catalog.achievements {
                if !self.state.achievements.iter().any(|a| a == id) && (def.condition)(&ctx) {
                    newly.push(((*id).to_string(), def.name.to_string()));
                }
            }
        }
        for (id, name) in newly {
            self.state.achievements.push(id.clone());
            self.notifier
                .notify(GameEvent::AchievementUnlocked { id, name });
        }
    }

    // ---- power-ups --------------------------------------------------------

    /// Add a timed bonus. Ignored if one with the same id is already
    /// running.
    pub fn collect_power_up(&mut self, power_up: PowerUp, now_ms: f64) -> bool {
        if self
            .state
            .active_power_ups
            .iter()
            .any(|p| p.id == power_up.id && !p.expired(now_ms))
        {
            return false;
        }
        self.state.active_power_ups.push(power_up);
        self.state.power_ups_collected += 1;
        if !self.state.owns_upgrade("electron_bypass_bonus_click_stability") {
            self.state.last_interaction_time = now_ms;
        }
        true
    }

    /// Drop a running bonus by id. Removing an absent id is a no-op.
    pub fn remove_power_up(&mut self, id: &str) -> bool {
        let before = self.state.active_power_ups.len();
        self.state.active_power_ups.retain(|p| p.id != id);
        self.state.active_power_ups.len() != before
    }

    pub fn prune_power_ups(&mut self, now_ms: f64) {
        self.state
            .active_power_ups
            .retain(|p| p.start_time > 0.0 && !p.expired(now_ms));
    }

    // ---- prestige ---------------------------------------------------------

    /// Protons paid out for the atoms on hand, after gain modifiers.
    pub fn protonise_gain(&self) -> f64 {
        let atoms = self.ledger.amount(CurrencyKind::Atoms);
        let base = (atoms / PROTONISE_ATOMS_REQUIRED).sqrt().floor();
        if base < 1.0 {
            return 0.0;
        }
        let sources = self.active_effect_sources();
        self.derived(&sources, EffectKind::ProtonGain, base)
            * self.currency_boost_multiplier(CurrencyKind::Protons)
    }

    /// Electrons paid out per electronize: one, folded through gain
    /// modifiers. Zero below the proton threshold.
    pub fn electronize_gain(&self) -> f64 {
        if self.ledger.amount(CurrencyKind::Protons) < ELECTRONIZE_PROTONS_REQUIRED {
            return 0.0;
        }
        let sources = self.active_effect_sources();
        self.derived(&sources, EffectKind::ElectronGain, 1.0)
            * self.currency_boost_multiplier(CurrencyKind::Electrons)
    }

    /// Upgrades that survive any prestige reset: everything bought with
    /// prestige currency, recognized by its id prefix.
    fn persistent_upgrades(&self) -> Vec<String> {
        self.state
            .upgrades
            .iter()
            .filter(|id| id.starts_with("proton") || id.starts_with("electron"))
            .cloned()
            .collect()
    }

    /// Skills that survive any prestige reset: feature grants and
    /// prestige-priced purchases. Both tiers use the same filter.
    fn persistent_skills(&self) -> Vec<String> {
        self.state
            .skill_upgrades
            .iter()
            .filter(|id| {
                let Some(def) = self.catalog.skills.get(id.as_str()) else {
                    return false;
                };
                def.feature.is_some()
                    || matches!(
                        def.cost.currency,
                        CurrencyKind::Protons | CurrencyKind::Electrons
                    )
            })
            .cloned()
            .collect()
    }

    fn reset_run(&mut self, layer: u8, now_ms: f64) {
        let upgrades = self.persistent_upgrades();
        let skills = self.persistent_skills();
        self.state.reset_layer(layer);
        self.ledger.reset_layer(layer);
        self.state.upgrades = upgrades;
        self.state.skill_upgrades = skills;
        self.sync_features();
        self.state.last_interaction_time = now_ms;
    }

    /// First prestige tier: convert atoms into protons and reset the run.
    pub fn protonise(&mut self, now_ms: f64) -> bool {
        let gain = self.protonise_gain();
        if gain <= 0.0 {
            return false;
        }
        self.state.total_protonises_run += 1;
        self.state.total_protonises_all_time += 1;
        self.reset_run(LAYER_PROTONISE, now_ms);
        self.ledger.add(CurrencyKind::Protons, gain);
        true
    }

    /// Second prestige tier: convert protons into electrons and reset
    /// both layers.
    pub fn electronize(&mut self, now_ms: f64) -> bool {
        if self.ledger.amount(CurrencyKind::Protons) < ELECTRONIZE_PROTONS_REQUIRED {
            return false;
        }
        let gain = self.electronize_gain();
        if gain <= 0.0 {
            return false;
        }
        self.state.total_electronizes_run += 1;
        self.state.total_electronizes_all_time += 1;
        self.reset_run(LAYER_ELECTRONIZE, now_ms);
        self.state.total_protonises_run = 0;
        self.ledger.add(CurrencyKind::Electrons, gain);
        true
    }

    // ---- loop -------------------------------------------------------------

    /// One whole second of live play.
    pub fn tick(&mut self, now_ms: f64) {
        self.state.in_game_time += TICK_MS;

        let aps = self.atoms_per_second(now_ms);
        if aps > self.state.highest_aps {
            self.state.highest_aps = aps;
        }
        self.add_atoms(aps);

        if self.state.settings.automation.auto_click {
            let clicks = self.auto_clicks_per_second();
            if clicks > 0.0 {
                let power = self.click_power(now_ms)
                    * self.currency_boost_multiplier(CurrencyKind::Atoms);
                self.add_atoms(clicks * power);
                if !self.state.owns_upgrade("electron_bypass_atom_autoclick_stability") {
                    self.state.last_interaction_time = now_ms;
                }
            }
        }

        let auto_buy: Vec<BuildingId> = self.state.settings.automation.buildings.clone();
        for id in auto_buy {
            self.purchase_building(id, 1);
        }

        for &id in BuildingId::all() {
            self.unlock_building(id);
        }
        self.prune_power_ups(now_ms);
        self.check_achievements();
        self.check_realm_unlocks(now_ms);
    }

    /// Feed wall-clock time; runs as many whole ticks as have elapsed.
    pub fn pump(&mut self, now_ms: f64) -> u32 {
        let ticks = self.clock.update(now_ms);
        for _ in 0..ticks {
            self.tick(now_ms);
        }
        ticks
    }

    // ---- persistence ------------------------------------------------------

    pub fn snapshot(&self) -> GameState {
        GameState {
            version: save::SAVE_VERSION,
            currencies: self.ledger.snapshot(),
            state: self.state.clone(),
        }
    }

    fn apply_snapshot(&mut self, snapshot: GameState) {
        self.ledger.restore(snapshot.currencies);
        self.state = snapshot.state;
    }

    /// Serialize and store. Storage failures are logged, not returned;
    /// a missed autosave must never interrupt play.
    pub fn save(&mut self, store: &mut dyn SaveStore, now_ms: f64) {
        self.state.last_save = now_ms;
        let snapshot = self.snapshot();
        match serde_json::to_string(&snapshot) {
            Ok(blob) => {
                if !store.set(save::SAVE_KEY, &blob) {
                    log::warn!("save write failed, keeping state in memory");
                }
            }
            Err(err) => log::warn!("save serialization failed: {err}"),
        }
    }

    /// Load, migrate, apply offline catch-up once, and persist the
    /// result. A missing save starts a fresh run.
    pub fn load_game(
        &mut self,
        store: &mut dyn SaveStore,
        now_ms: f64,
    ) -> Result<Option<OfflineSummary>, SaveError> {
        let summary = match save::load_saved_state(store)? {
            Some(snapshot) => {
                self.apply_snapshot(snapshot);
                self.sync_features();
                let summary = offline::apply_offline_progress(self, now_ms);
                self.prune_power_ups(now_ms);
                if let Some(s) = &summary {
                    self.notifier
                        .notify(GameEvent::OfflineProgressApplied(s.clone()));
                }
                summary
            }
            None => {
                self.state = ProgressionState::default();
                self.state.start_date = now_ms;
                self.state.last_interaction_time = now_ms;
                None
            }
        };
        self.clock.resync(now_ms);
        self.save(store, now_ms);
        Ok(summary)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_bulk_cost_monotone_in_quantity(
            owned in 0u32..200,
            qty in 1u32..50,
        ) {
            let mut m = GameManager::standard();
            m.ledger.add(CurrencyKind::Atoms, 1e30);
            if owned > 0 {
                prop_assert!(m.purchase_building(BuildingId::Molecule, owned));
            }
            let a = m.building_cost(BuildingId::Molecule, qty).unwrap().amount;
            let b = m.building_cost(BuildingId::Molecule, qty + 1).unwrap().amount;
            prop_assert!(b > a);
        }

        #[test]
        fn prop_max_affordable_is_exactly_affordable(balance in 15.0f64..1e12) {
            let mut m = GameManager::standard();
            m.ledger.add(CurrencyKind::Atoms, balance);
            let n = m.max_affordable(BuildingId::Molecule);
            prop_assert!(n >= 1);
            let cost = m.building_cost(BuildingId::Molecule, n).unwrap().amount;
            prop_assert!(cost <= balance + 1.0);
        }

        #[test]
        fn prop_failed_purchase_never_mutates(balance in 0.0f64..14.0) {
            let mut m = GameManager::standard();
            m.ledger.add(CurrencyKind::Atoms, balance);
            prop_assert!(!m.purchase_building(BuildingId::Molecule, 1));
            prop_assert!((m.ledger.amount(CurrencyKind::Atoms) - balance).abs() < 1e-9);
            prop_assert_eq!(m.state.building_count(BuildingId::Molecule), 0);
        }

        #[test]
        fn prop_protonise_gain_never_negative(atoms in 0.0f64..1e18) {
            let mut m = GameManager::standard();
            m.ledger.add(CurrencyKind::Atoms, atoms);
            prop_assert!(m.protonise_gain() >= 0.0);
        }
    }
}
