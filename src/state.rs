//! Progression state: the plain-data aggregate of everything a run owns.
//!
//! All fields serialize with the persisted-blob key names, so a live
//! state and a save round-trip through the same struct.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::currency::{Price, LAYER_ELECTRONIZE, LAYER_PROTONISE};

/// Owning this many units of a building raises its level by one.
pub const BUILDING_LEVEL_STEP: u32 = 25;

/// Ownable production units, in catalog order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildingId {
    Molecule,
    Crystal,
    Nanostructure,
    Microorganism,
    Rock,
    Planet,
    Star,
    NeutronStar,
    BlackHole,
}

impl BuildingId {
    pub fn all() -> &'static [BuildingId] {
        &[
            BuildingId::Molecule,
            BuildingId::Crystal,
            BuildingId::Nanostructure,
            BuildingId::Microorganism,
            BuildingId::Rock,
            BuildingId::Planet,
            BuildingId::Star,
            BuildingId::NeutronStar,
            BuildingId::BlackHole,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            BuildingId::Molecule => "Molecule",
            BuildingId::Crystal => "Crystal",
            BuildingId::Nanostructure => "Nanostructure",
            BuildingId::Microorganism => "Micro-organism",
            BuildingId::Rock => "Rock",
            BuildingId::Planet => "Planet",
            BuildingId::Star => "Star",
            BuildingId::NeutronStar => "Neutron Star",
            BuildingId::BlackHole => "Black Hole",
        }
    }
}

/// Boolean capability flags granted by skills.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    HoverCollection,
    Levels,
    OfflineProgress,
    PurpleRealm,
    StabilityField,
}

impl Feature {
    pub fn all() -> &'static [Feature] {
        &[
            Feature::HoverCollection,
            Feature::Levels,
            Feature::OfflineProgress,
            Feature::PurpleRealm,
            Feature::StabilityField,
        ]
    }
}

/// Derived flag set, recomputed whenever skill ownership changes.
pub type FeatureState = IndexMap<Feature, bool>;

pub fn default_feature_state() -> FeatureState {
    Feature::all().iter().map(|f| (*f, false)).collect()
}

/// Top-level game modes. Once unlocked, a realm never re-locks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RealmKind {
    Atoms,
    Photons,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RealmState {
    pub unlocked: bool,
}

pub fn default_realm_state() -> IndexMap<RealmKind, RealmState> {
    let mut realms = IndexMap::new();
    realms.insert(RealmKind::Atoms, RealmState { unlocked: true });
    realms.insert(RealmKind::Photons, RealmState { unlocked: false });
    realms
}

/// One owned production unit type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub cost: Price,
    pub count: u32,
    pub level: u32,
    pub rate: f64,
    pub unlocked: bool,
}

impl Building {
    /// Stepped tier derived from count; monotone non-decreasing.
    pub fn level_for_count(count: u32) -> u32 {
        count / BUILDING_LEVEL_STEP
    }
}

/// A timed production bonus collected during play.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerUp {
    pub id: String,
    pub name: String,
    pub description: String,
    pub multiplier: f64,
    /// Lifetime in milliseconds.
    pub duration: f64,
    /// Wall-clock ms at collection; 0 means malformed (dropped on load).
    pub start_time: f64,
}

impl PowerUp {
    pub fn expired(&self, now_ms: f64) -> bool {
        now_ms >= self.start_time + self.duration
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutomationSettings {
    pub auto_click: bool,
    pub auto_click_photons: bool,
    pub buildings: Vec<BuildingId>,
    pub upgrades: bool,
}

impl Default for AutomationSettings {
    fn default() -> Self {
        Self {
            auto_click: false,
            auto_click_photons: false,
            buildings: Vec::new(),
            upgrades: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameplaySettings {
    pub offline_progress_enabled: bool,
}

impl Default for GameplaySettings {
    fn default() -> Self {
        Self {
            offline_progress_enabled: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpgradeSettings {
    pub display_already_bought: bool,
}

/// Externally edited toggles the core reads but never renders.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub automation: AutomationSettings,
    pub gameplay: GameplaySettings,
    pub upgrades: UpgradeSettings,
}

/// Per-currency skill-point boosts (points spent, not multipliers).
pub type CurrencyBoosts = IndexMap<crate::currency::CurrencyKind, u32>;

/// The aggregate of owned buildings, purchased upgrades/skills, unlocked
/// features and realms, prestige counters and settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressionState {
    pub achievements: Vec<String>,
    pub active_power_ups: Vec<PowerUp>,
    pub buildings: IndexMap<BuildingId, Building>,
    pub currency_boosts: CurrencyBoosts,
    pub features: FeatureState,
    #[serde(rename = "highestAPS")]
    pub highest_aps: f64,
    pub in_game_time: f64,
    pub last_interaction_time: f64,
    pub last_save: f64,
    pub photon_upgrades: IndexMap<String, u32>,
    pub power_ups_collected: u32,
    pub realms: IndexMap<RealmKind, RealmState>,
    pub settings: Settings,
    pub skill_upgrades: Vec<String>,
    pub start_date: f64,
    pub total_buildings_purchased_all_time: u32,
    pub total_clicks_all_time: u64,
    pub total_clicks_run: u64,
    pub total_electronizes_all_time: u32,
    pub total_electronizes_run: u32,
    pub total_protonises_all_time: u32,
    pub total_protonises_run: u32,
    pub total_upgrades_purchased_all_time: u32,
    #[serde(rename = "totalXP")]
    pub total_xp: f64,
    pub upgrades: Vec<String>,
}

impl Default for ProgressionState {
    fn default() -> Self {
        Self {
            achievements: Vec::new(),
            active_power_ups: Vec::new(),
            buildings: IndexMap::new(),
            currency_boosts: IndexMap::new(),
            features: default_feature_state(),
            highest_aps: 0.0,
            in_game_time: 0.0,
            last_interaction_time: 0.0,
            last_save: 0.0,
            photon_upgrades: IndexMap::new(),
            power_ups_collected: 0,
            realms: default_realm_state(),
            settings: Settings::default(),
            skill_upgrades: Vec::new(),
            start_date: 0.0,
            total_buildings_purchased_all_time: 0,
            total_clicks_all_time: 0,
            total_clicks_run: 0,
            total_electronizes_all_time: 0,
            total_electronizes_run: 0,
            total_protonises_all_time: 0,
            total_protonises_run: 0,
            total_upgrades_purchased_all_time: 0,
            total_xp: 0.0,
            upgrades: Vec::new(),
        }
    }
}

impl ProgressionState {
    pub fn owns_upgrade(&self, id: &str) -> bool {
        self.upgrades.iter().any(|u| u == id)
    }

    pub fn owns_skill(&self, id: &str) -> bool {
        self.skill_upgrades.iter().any(|s| s == id)
    }

    pub fn photon_upgrade_level(&self, id: &str) -> u32 {
        self.photon_upgrades.get(id).copied().unwrap_or(0)
    }

    pub fn feature_enabled(&self, feature: Feature) -> bool {
        self.features.get(&feature).copied().unwrap_or(false)
    }

    pub fn building_count(&self, id: BuildingId) -> u32 {
        self.buildings.get(&id).map_or(0, |b| b.count)
    }

    /// Clears every field belonging to prestige layers 1..=`layer`,
    /// leaving higher-layer and unlayered fields intact. Feature flags
    /// are cleared here and re-derived by the caller from the skills
    /// that survive.
    pub fn reset_layer(&mut self, layer: u8) {
        if layer >= LAYER_PROTONISE {
            self.active_power_ups.clear();
            self.buildings.clear();
            self.currency_boosts.clear();
            self.features = default_feature_state();
            self.highest_aps = 0.0;
            self.skill_upgrades.clear();
            self.total_clicks_run = 0;
            self.total_xp = 0.0;
            self.upgrades.clear();
        }
        if layer >= LAYER_ELECTRONIZE {
            self.photon_upgrades.clear();
        }
    }
}

/// XP required to go from `level - 1` to `level`.
pub fn xp_for_level(level: u32) -> f64 {
    let base = 100.0;
    let rate: f64 = 0.42;
    (base * (1.0 + rate).powi(level as i32 - 1)).floor()
}

/// Player level implied by a total-XP amount.
pub fn level_from_total_xp(total_xp: f64) -> u32 {
    let mut level = 0;
    let mut remaining = total_xp;
    while remaining >= xp_for_level(level + 1) {
        remaining -= xp_for_level(level + 1);
        level += 1;
    }
    level
}
