//! Save persistence: a versioned JSON blob, a migration chain that walks
//! old blobs up to the current schema, and a validate-and-repair pass
//! that turns almost-valid data into a playable state instead of losing
//! the run.
//!
//! Migrations operate on raw `serde_json::Value` so that shapes the
//! current structs can no longer represent stay reachable. Typed
//! deserialization happens exactly once, after repair.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::currency::{CurrencyKind, CurrencyLedger, CurrencyState};
use crate::state::{default_feature_state, default_realm_state, ProgressionState};

/// Storage key for the one save slot.
pub const SAVE_KEY: &str = "atomic-clicker-save";

/// Current save schema version. Bump whenever a migration step is added.
pub const SAVE_VERSION: u64 = 21;

/// Power-ups with longer lifetimes than this were written by a buggy
/// schema and are dropped on migration.
const MAX_LEGAL_POWER_UP_MS: f64 = 100_000.0;

/// Point-bought skill ids from the pre-currency tree, reclassified as
/// plain upgrades in schema 21.
const LEGACY_SKILL_TO_UPGRADE_IDS: &[&str] = &[
    "atomicFusion",
    "bonusHiggsBosonSpeed0",
    "bonusHiggsBosonSpeed1",
    "bonusHiggsBosonSpeed2",
    "clickPowerBoost0",
    "clickPowerBoost1",
    "clickPowerBoost2",
    "levelBoost0",
    "levelBoost1",
    "powerUpBoost0",
    "powerUpBoost1",
    "xpBoost0",
    "xpBoost1",
    "xpBoost2",
];

/// Feature-unlock upgrade ids replaced by skills in schema 21.
const FEATURE_UPGRADE_TO_SKILL: &[(&str, &str)] = &[
    ("feature_levels", "unlockLevels"),
    ("feature_offline_progress", "offlineProgress"),
    ("feature_purple_realm", "purpleRealm"),
    ("stability_unlock", "stabilityField"),
];

/// The persisted blob: schema version, currency balances, and the whole
/// progression aggregate flattened beside them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub version: u64,
    pub currencies: IndexMap<CurrencyKind, CurrencyState>,
    #[serde(flatten)]
    pub state: ProgressionState,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            version: SAVE_VERSION,
            currencies: CurrencyLedger::new().snapshot(),
            state: ProgressionState::default(),
        }
    }
}

/// Why a blob could not be loaded. The raw blob is always retained so
/// the host can offer an export before the player accepts a reset.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("save blob is not valid JSON: {details}")]
    InvalidJson { details: String, raw: String },
    #[error("save migration failed at version {version}: {details}")]
    MigrationFailed {
        version: u64,
        details: String,
        raw: String,
    },
    #[error("migrated save failed validation: {details}")]
    ValidationFailed { details: String, raw: String },
    #[error("unrecognized save failure: {details}")]
    Unknown { details: String, raw: String },
}

impl SaveError {
    pub fn raw(&self) -> &str {
        match self {
            SaveError::InvalidJson { raw, .. }
            | SaveError::MigrationFailed { raw, .. }
            | SaveError::ValidationFailed { raw, .. }
            | SaveError::Unknown { raw, .. } => raw,
        }
    }
}

/// Key-value persistence boundary. `set` reports failure instead of
/// panicking; autosave treats a failed write as a warning.
pub trait SaveStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> bool;
}

#[derive(Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl SaveStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> bool {
        self.entries.insert(key.to_string(), value.to_string());
        true
    }
}

/// Reentrancy guard for autosave: a save triggered while one is already
/// being written is skipped, not queued.
#[derive(Default)]
pub struct AutosaveGuard {
    in_flight: bool,
}

impl AutosaveGuard {
    pub fn begin(&mut self) -> bool {
        if self.in_flight {
            return false;
        }
        self.in_flight = true;
        true
    }

    pub fn finish(&mut self) {
        self.in_flight = false;
    }
}

/// One persisted field: its key, the schema version that introduced it,
/// and its default. Fields missing from older blobs are backfilled from
/// this table instead of per-version special cases.
struct StatField {
    key: &'static str,
    #[allow(dead_code)]
    min_version: u64,
    default: fn() -> Value,
}

fn stat_fields() -> Vec<StatField> {
    fn field(key: &'static str, min_version: u64, default: fn() -> Value) -> StatField {
        StatField {
            key,
            min_version,
            default,
        }
    }
    vec![
        field("achievements", 0, || json!([])),
        field("activePowerUps", 0, || json!([])),
        field("buildings", 0, || json!({})),
        field("currencyBoosts", 21, || json!({})),
        field("features", 21, || {
            serde_json::to_value(default_feature_state()).unwrap_or_else(|_| json!({}))
        }),
        field("highestAPS", 0, || json!(0.0)),
        field("inGameTime", 0, || json!(0.0)),
        field("lastInteractionTime", 0, || json!(0.0)),
        field("lastSave", 0, || json!(0.0)),
        field("photonUpgrades", 10, || json!({})),
        field("powerUpsCollected", 0, || json!(0)),
        field("realms", 19, || {
            serde_json::to_value(default_realm_state()).unwrap_or_else(|_| json!({}))
        }),
        field("settings", 3, || {
            serde_json::to_value(crate::state::Settings::default()).unwrap_or_else(|_| json!({}))
        }),
        field("skillUpgrades", 11, || json!([])),
        field("startDate", 0, || json!(0.0)),
        field("totalBuildingsPurchasedAllTime", 14, || json!(0)),
        field("totalClicksAllTime", 16, || json!(0)),
        field("totalClicksRun", 16, || json!(0)),
        field("totalElectronizesAllTime", 9, || json!(0)),
        field("totalElectronizesRun", 16, || json!(0)),
        field("totalProtonisesAllTime", 16, || json!(0)),
        field("totalProtonisesRun", 16, || json!(0)),
        field("totalUpgradesPurchasedAllTime", 14, || json!(0)),
        field("totalXP", 0, || json!(0.0)),
        field("upgrades", 0, || json!([])),
        field("currencies", 17, || {
            serde_json::to_value(CurrencyLedger::new().snapshot()).unwrap_or_else(|_| json!({}))
        }),
    ]
}

fn object_mut<'a>(value: &'a mut Value) -> Result<&'a mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "save root is not an object".to_string())
}

/// Walk a blob from whatever version it carries up to `SAVE_VERSION`.
/// Version 1 blobs predate recoverable schemas and always fail.
pub fn migrate(mut value: Value) -> Result<Value, (u64, String)> {
    let obj = object_mut(&mut value).map_err(|details| (0, details))?;
    let mut version = obj.get("version").and_then(Value::as_u64).unwrap_or(0);

    if version > SAVE_VERSION {
        return Err((version, format!("newer than supported schema {SAVE_VERSION}")));
    }
    if version == 1 {
        return Err((1, "schema 1 saves are unrecoverable, full reset required".into()));
    }
    if version == 0 {
        // Pre-versioned blobs never tracked unlock state.
        if let Some(buildings) = obj.get_mut("buildings").and_then(Value::as_object_mut) {
            for building in buildings.values_mut() {
                if let Some(b) = building.as_object_mut() {
                    b.insert("unlocked".into(), json!(true));
                }
            }
        }
        version = 2;
    }

    while version < SAVE_VERSION {
        match version {
            2 => backfill_building_levels(obj),
            4 => wrap_building_costs(obj),
            8 => {
                // Counter introduced after electrons themselves; a held
                // balance implies at least one reset happened.
                if !obj.contains_key("totalElectronizes") {
                    let had_electrons = obj
                        .get("electrons")
                        .and_then(Value::as_f64)
                        .is_some_and(|e| e > 0.0);
                    obj.insert(
                        "totalElectronizes".into(),
                        json!(if had_electrons { 1 } else { 0 }),
                    );
                }
            }
            13 => baseline_lifetime_stats(obj),
            14 => rename_bonus_photons_to_higgs(obj),
            15 => split_run_and_all_time_stats(obj),
            16 => flatten_currencies(obj),
            17 => drop_overlong_power_ups(obj),
            18 => promote_realm_flags(obj),
            20 => restructure_skills(obj),
            _ => {}
        }
        version += 1;
    }

    for spec in stat_fields() {
        let missing = matches!(obj.get(spec.key), None | Some(Value::Null));
        if missing {
            obj.insert(spec.key.into(), (spec.default)());
        }
    }
    obj.insert("version".into(), json!(SAVE_VERSION));
    Ok(value)
}

/// Schema 3 introduced building levels derived from counts.
fn backfill_building_levels(obj: &mut Map<String, Value>) {
    let Some(buildings) = obj.get_mut("buildings").and_then(Value::as_object_mut) else {
        return;
    };
    for building in buildings.values_mut() {
        let Some(b) = building.as_object_mut() else {
            continue;
        };
        if !b.contains_key("level") {
            let count = b.get("count").and_then(Value::as_u64).unwrap_or(0);
            b.insert("level".into(), json!(count / 25));
        }
    }
}

/// Schema 5 moved building costs from bare numbers to priced amounts.
fn wrap_building_costs(obj: &mut Map<String, Value>) {
    let Some(buildings) = obj.get_mut("buildings").and_then(Value::as_object_mut) else {
        return;
    };
    for building in buildings.values_mut() {
        let Some(b) = building.as_object_mut() else {
            continue;
        };
        if let Some(amount) = b.get("cost").and_then(Value::as_f64) {
            b.insert(
                "cost".into(),
                json!({ "amount": amount, "currency": "atoms" }),
            );
        }
    }
}

fn json_number(obj: &Map<String, Value>, key: &str) -> f64 {
    obj.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

fn seed_from(obj: &mut Map<String, Value>, from: &str, to: &str) {
    let value = obj.get(from).cloned().unwrap_or(json!(0));
    obj.insert(to.into(), value);
}

/// Schema 14 introduced earned-stat tracking, baselined from whatever
/// the blob held at migration time.
fn baseline_lifetime_stats(obj: &mut Map<String, Value>) {
    let atoms = json_number(obj, "atoms");
    obj.insert("totalAtomsEarned".into(), json!(atoms));
    obj.insert("totalAtomsEarnedAllTime".into(), json!(atoms));

    let buildings_owned: u64 = obj
        .get("buildings")
        .and_then(Value::as_object)
        .map(|buildings| {
            buildings
                .values()
                .filter_map(|b| b.get("count").and_then(Value::as_u64))
                .sum()
        })
        .unwrap_or(0);
    obj.insert("totalBuildingsPurchased".into(), json!(buildings_owned));

    seed_from(obj, "totalClicks", "totalClicksAllTime");
    obj.insert("totalElectronsEarned".into(), json!(json_number(obj, "electrons")));
    obj.insert("totalProtonsEarned".into(), json!(json_number(obj, "protons")));

    let upgrades = obj.get("upgrades").and_then(Value::as_array).map_or(0, Vec::len);
    let skills = obj.get("skillUpgrades").and_then(Value::as_array).map_or(0, Vec::len);
    obj.insert("totalUpgradesPurchased".into(), json!(upgrades + skills));
}

/// Schema 15 renamed the bonus collectible from photons to the Higgs
/// boson in stats, achievement ids and speed-skill ids.
fn rename_bonus_photons_to_higgs(obj: &mut Map<String, Value>) {
    rename_key(obj, "totalBonusPhotonsClicked", "totalBonusHiggsBosonClicked");
    if let Some(achievements) = obj.get_mut("achievements").and_then(Value::as_array_mut) {
        for entry in achievements.iter_mut() {
            if let Some(id) = entry.as_str() {
                if id.contains("bonus_photons_clicked_") {
                    *entry = json!(id.replace("bonus_photons_clicked_", "bonus_higgs_boson_clicked_"));
                }
            }
        }
    }
    if let Some(skills) = obj.get_mut("skillUpgrades").and_then(Value::as_array_mut) {
        for entry in skills.iter_mut() {
            if let Some(id) = entry.as_str() {
                if let Some(rest) = id.strip_prefix("bonusPhotonSpeed") {
                    *entry = json!(format!("bonusHiggsBosonSpeed{rest}"));
                }
            }
        }
    }
}

/// Schema 16 split every mixed stat into an explicit run/all-time pair
/// and seeded the half each rename left missing.
fn split_run_and_all_time_stats(obj: &mut Map<String, Value>) {
    for (from, to) in [
        ("totalAtomsEarned", "totalAtomsEarnedRun"),
        ("totalBonusHiggsBosonClicked", "totalBonusHiggsBosonClickedRun"),
        ("totalBuildingsPurchased", "totalBuildingsPurchasedAllTime"),
        ("totalClicks", "totalClicksRun"),
        ("totalElectronizes", "totalElectronizesAllTime"),
        ("totalElectronsEarned", "totalElectronsEarnedAllTime"),
        ("totalExcitedPhotonsEarned", "totalExcitedPhotonsEarnedAllTime"),
        ("totalProtonises", "totalProtonisesRun"),
        ("totalProtonsEarned", "totalProtonsEarnedAllTime"),
        ("totalUpgradesPurchased", "totalUpgradesPurchasedAllTime"),
    ] {
        rename_key(obj, from, to);
    }

    seed_from(obj, "totalBonusHiggsBosonClickedRun", "totalBonusHiggsBosonClickedAllTime");
    seed_from(obj, "totalElectronizesAllTime", "totalElectronizesRun");
    seed_from(obj, "totalElectronsEarnedAllTime", "totalElectronsEarnedRun");
    seed_from(obj, "totalExcitedPhotonsEarnedAllTime", "totalExcitedPhotonsEarnedRun");
    seed_from(obj, "photons", "totalPhotonsEarnedAllTime");
    seed_from(obj, "photons", "totalPhotonsEarnedRun");
    seed_from(obj, "totalProtonisesRun", "totalProtonisesAllTime");
    seed_from(obj, "totalProtonsEarnedAllTime", "totalProtonsEarnedRun");
}

/// Schema 19 replaced the lone unlock boolean with the realms map. The
/// flag was renamed once before versioning caught up, so both spellings
/// count.
fn promote_realm_flags(obj: &mut Map<String, Value>) {
    let photon_flag = obj.remove("photonRealmUnlocked").and_then(|v| v.as_bool());
    let purple_flag = obj.remove("purpleRealmUnlocked").and_then(|v| v.as_bool());
    if obj.contains_key("realms") {
        return;
    }
    let photons_unlocked = photon_flag.or(purple_flag).unwrap_or(false);
    obj.insert(
        "realms".into(),
        json!({
            "atoms": { "unlocked": true },
            "photons": { "unlocked": photons_unlocked }
        }),
    );
}

fn rename_key(obj: &mut Map<String, Value>, from: &str, to: &str) {
    if let Some(value) = obj.remove(from) {
        obj.entry(to.to_string()).or_insert(value);
    }
}

/// Schema 17 collected the flat per-currency balances and their earned
/// counters into one map of balance records.
fn flatten_currencies(obj: &mut Map<String, Value>) {
    if obj.contains_key("currencies") {
        return;
    }
    fn record(obj: &Map<String, Value>, amount_key: Option<&str>, stem: &str) -> Value {
        let amount = amount_key.map_or(0.0, |key| json_number(obj, key));
        json!({
            "amount": amount,
            "earnedRun": json_number(obj, &format!("{stem}Run")),
            "earnedAllTime": json_number(obj, &format!("{stem}AllTime")),
        })
    }
    let currencies = json!({
        "atoms": record(obj, Some("atoms"), "totalAtomsEarned"),
        "electrons": record(obj, Some("electrons"), "totalElectronsEarned"),
        "excitedPhotons": record(obj, Some("excitedPhotons"), "totalExcitedPhotonsEarned"),
        "higgsBoson": record(obj, None, "totalBonusHiggsBosonClicked"),
        "photons": record(obj, Some("photons"), "totalPhotonsEarned"),
        "protons": record(obj, Some("protons"), "totalProtonsEarned"),
    });

    for key in [
        "atoms", "totalAtomsEarnedRun", "totalAtomsEarnedAllTime",
        "electrons", "totalElectronsEarnedRun", "totalElectronsEarnedAllTime",
        "excitedPhotons", "totalExcitedPhotonsEarnedRun", "totalExcitedPhotonsEarnedAllTime",
        "totalBonusHiggsBosonClickedRun", "totalBonusHiggsBosonClickedAllTime",
        "photons", "totalPhotonsEarnedRun", "totalPhotonsEarnedAllTime",
        "protons", "totalProtonsEarnedRun", "totalProtonsEarnedAllTime",
    ] {
        obj.remove(key);
    }
    obj.insert("currencies".into(), currencies);
}

/// Schema 18 fixed a bug that wrote effectively permanent power-ups.
fn drop_overlong_power_ups(obj: &mut Map<String, Value>) {
    let Some(power_ups) = obj.get_mut("activePowerUps").and_then(Value::as_array_mut) else {
        return;
    };
    power_ups.retain(|p| {
        p.get("duration")
            .and_then(Value::as_f64)
            .is_some_and(|d| d <= MAX_LEGAL_POWER_UP_MS)
    });
}

/// Schema 21 split skills out of the upgrade list, replaced the
/// feature-unlock upgrades with their skill counterparts, and added the
/// boost-point allocations.
fn restructure_skills(obj: &mut Map<String, Value>) {
    let mut upgrades: Vec<String> = obj
        .get("upgrades")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default();
    let mut skills: Vec<String> = obj
        .get("skillUpgrades")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default();

    // Point-bought tree picks are plain upgrades now.
    for id in LEGACY_SKILL_TO_UPGRADE_IDS {
        if let Some(pos) = skills.iter().position(|s| s == id) {
            skills.remove(pos);
            if !upgrades.iter().any(|u| u == id) {
                upgrades.push((*id).to_string());
            }
        }
    }

    // Feature-unlock upgrades became skills.
    for (old_id, skill_id) in FEATURE_UPGRADE_TO_SKILL {
        if let Some(pos) = upgrades.iter().position(|u| u == old_id) {
            upgrades.remove(pos);
            if !skills.iter().any(|s| s == skill_id) {
                skills.push((*skill_id).to_string());
            }
        }
    }

    // So did the hover-collection photon upgrade.
    let hover_owned = obj
        .get("photonUpgrades")
        .and_then(Value::as_object)
        .and_then(|p| p.get("feature_hover_collection"))
        .and_then(Value::as_u64)
        .is_some_and(|level| level > 0);
    if hover_owned && !skills.iter().any(|s| s == "hoverCollection") {
        skills.push("hoverCollection".to_string());
    }

    obj.insert("upgrades".into(), json!(upgrades));
    obj.insert("skillUpgrades".into(), json!(skills));
    if !obj.contains_key("currencyBoosts") {
        obj.insert("currencyBoosts".into(), json!({}));
    }
    // Feature flags are re-derived from owned skills after load, so the
    // stored map only needs to exist.
    if !obj.contains_key("features") {
        let features =
            serde_json::to_value(default_feature_state()).unwrap_or_else(|_| json!({}));
        obj.insert("features".into(), features);
    }
}

fn same_shape(expected: &Value, actual: &Value) -> bool {
    matches!(
        (expected, actual),
        (Value::Array(_), Value::Array(_))
            | (Value::Object(_), Value::Object(_))
            | (Value::Number(_), Value::Number(_))
            | (Value::Bool(_), Value::Bool(_))
            | (Value::String(_), Value::String(_))
    )
}

/// Replace fields whose shape no longer matches the schema with their
/// defaults, then deserialize. Each replacement is reported so the host
/// can tell the player what was lost.
pub fn validate_and_repair(mut value: Value) -> Result<(GameState, Vec<String>), String> {
    let obj = object_mut(&mut value)?;
    let mut repairs = Vec::new();

    for spec in stat_fields() {
        let default = (spec.default)();
        let needs_repair = match obj.get(spec.key) {
            None | Some(Value::Null) => true,
            Some(actual) => !same_shape(&default, actual),
        };
        if needs_repair {
            repairs.push(format!("{} reset to default", spec.key));
            obj.insert(spec.key.into(), default);
        }
    }

    // Balances must be finite and non-negative, and every kind must be
    // present; older schemas only wrote the kinds the player had touched.
    if let Some(currencies) = obj.get_mut("currencies").and_then(Value::as_object_mut) {
        for kind in ["atoms", "protons", "electrons", "photons", "excitedPhotons", "higgsBoson"] {
            if !currencies.contains_key(kind) {
                currencies.insert(
                    kind.into(),
                    json!({ "amount": 0.0, "earnedRun": 0.0, "earnedAllTime": 0.0 }),
                );
            }
        }
        for (kind, record) in currencies.iter_mut() {
            let Some(r) = record.as_object_mut() else {
                repairs.push(format!("currency {kind} reset to zero"));
                *record = json!({ "amount": 0.0, "earnedRun": 0.0, "earnedAllTime": 0.0 });
                continue;
            };
            for key in ["amount", "earnedRun", "earnedAllTime"] {
                let ok = r
                    .get(key)
                    .and_then(Value::as_f64)
                    .is_some_and(|v| v.is_finite() && v >= 0.0);
                if !ok {
                    repairs.push(format!("currency {kind}.{key} reset to zero"));
                    r.insert(key.into(), json!(0.0));
                }
            }
        }
    }

    obj.insert("version".into(), json!(SAVE_VERSION));

    let game_state: GameState =
        serde_json::from_value(value).map_err(|e| format!("deserialize after repair: {e}"))?;
    Ok((game_state, repairs))
}

/// Read the save slot, migrate it to the current schema, and repair
/// what can be repaired. `Ok(None)` means a fresh profile.
pub fn load_saved_state(store: &dyn SaveStore) -> Result<Option<GameState>, SaveError> {
    let Some(raw) = store.get(SAVE_KEY) else {
        return Ok(None);
    };

    let value: Value = serde_json::from_str(&raw).map_err(|e| SaveError::InvalidJson {
        details: e.to_string(),
        raw: raw.clone(),
    })?;
    if !value.is_object() {
        return Err(SaveError::Unknown {
            details: "save root is not an object".into(),
            raw,
        });
    }

    let migrated = migrate(value).map_err(|(version, details)| {
        log::warn!("save migration failed at schema {version}: {details}");
        SaveError::MigrationFailed {
            version,
            details,
            raw: raw.clone(),
        }
    })?;

    let (game_state, repairs) =
        validate_and_repair(migrated).map_err(|details| SaveError::ValidationFailed {
            details,
            raw: raw.clone(),
        })?;
    for repair in &repairs {
        log::info!("save repair: {repair}");
    }
    Ok(Some(game_state))
}
