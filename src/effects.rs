//! Effect composition: atomic modifiers attached to upgrades and skills,
//! folded over a base value in catalog order.
//!
//! Effects compose by ordered function application, not independent
//! accumulation: a "x2" listed after a "+10%" multiplies the already
//! boosted value. Tests pin exact numeric results for known chains.

use std::fmt;
use std::sync::Arc;

use crate::currency::CurrencyLedger;
use crate::state::{level_from_total_xp, BuildingId, ProgressionState};

/// Which derived stat an effect modifies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectKind {
    /// Per-building output; carries a target.
    Building,
    /// Multiplier applied to all production.
    Global,
    /// Manual/auto click value.
    Click,
    /// Clicks per second contributed by auto-click.
    AutoClick,
    /// Auto-buy interval for a target building (ms).
    AutoBuy,
    /// Auto-upgrade-purchase interval (ms).
    AutoUpgrade,
    ElectronGain,
    ProtonGain,
    XpGain,
    PowerUpInterval,
    PowerUpDuration,
    PowerUpMultiplier,
    StabilityCapacity,
    StabilitySpeed,
    StabilityBoost,
    ExcitedPhotonChance,
    /// Photon clicks per 5 seconds from the passive collector.
    PhotonAutoClick,
    PhotonSpawnInterval,
    PhotonDoubleChance,
    ExcitedPhotonDouble,
    ExcitedPhotonFromMax,
}

/// Read-only view of live state handed to effect transforms.
pub struct EffectCtx<'a> {
    pub state: &'a ProgressionState,
    pub ledger: &'a CurrencyLedger,
}

impl<'a> EffectCtx<'a> {
    pub fn new(state: &'a ProgressionState, ledger: &'a CurrencyLedger) -> Self {
        Self { state, ledger }
    }

    pub fn player_level(&self) -> u32 {
        level_from_total_xp(self.state.total_xp)
    }

    pub fn total_building_count(&self) -> u32 {
        self.state.buildings.values().map(|b| b.count).sum()
    }

    pub fn owned_building_types(&self) -> usize {
        self.state.buildings.values().filter(|b| b.count > 0).count()
    }

    pub fn photon_upgrade_levels(&self) -> u32 {
        self.state.photon_upgrades.values().sum()
    }
}

type Transform = Arc<dyn Fn(f64, &EffectCtx) -> f64 + Send + Sync>;

/// An atomic modifier: a stat slot, an optional building target, and a
/// total transform over the running value.
#[derive(Clone)]
pub struct Effect {
    pub kind: EffectKind,
    pub target: Option<BuildingId>,
    apply: Transform,
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("kind", &self.kind)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl Effect {
    /// Multiply the running value by a constant.
    pub fn scale(kind: EffectKind, factor: f64) -> Self {
        Self {
            kind,
            target: None,
            apply: Arc::new(move |v, _| v * factor),
        }
    }

    /// Multiply a specific building's output by a constant.
    pub fn scale_building(target: BuildingId, factor: f64) -> Self {
        Self {
            kind: EffectKind::Building,
            target: Some(target),
            apply: Arc::new(move |v, _| v * factor),
        }
    }

    /// Add a constant to the running value.
    pub fn offset(kind: EffectKind, delta: f64) -> Self {
        Self {
            kind,
            target: None,
            apply: Arc::new(move |v, _| v + delta),
        }
    }

    /// Arbitrary state-dependent transform.
    pub fn compute<F>(kind: EffectKind, f: F) -> Self
    where
        F: Fn(f64, &EffectCtx) -> f64 + Send + Sync + 'static,
    {
        Self {
            kind,
            target: None,
            apply: Arc::new(f),
        }
    }

    pub fn with_target(mut self, target: BuildingId) -> Self {
        self.target = Some(target);
        self
    }

    pub fn apply(&self, value: f64, ctx: &EffectCtx) -> f64 {
        (self.apply)(value, ctx)
    }
}

/// An owned upgrade/skill/photon-upgrade with its active effect list.
#[derive(Clone, Debug)]
pub struct EffectSource {
    pub id: String,
    pub effects: Vec<Effect>,
}

/// What to match when collecting effects for one derived stat.
#[derive(Clone, Copy, Debug)]
pub struct Selector {
    pub kind: EffectKind,
    pub target: Option<BuildingId>,
}

impl Selector {
    pub fn of(kind: EffectKind) -> Self {
        Self { kind, target: None }
    }

    pub fn building(target: BuildingId) -> Self {
        Self {
            kind: EffectKind::Building,
            target: Some(target),
        }
    }

    fn matches(&self, effect: &Effect) -> bool {
        if effect.kind != self.kind {
            return false;
        }
        match self.target {
            Some(target) => effect.target == Some(target),
            None => true,
        }
    }
}

/// Filter sources down to the effects applicable to a selector,
/// preserving source order.
pub fn select<'a>(sources: &'a [EffectSource], selector: Selector) -> Vec<&'a Effect> {
    sources
        .iter()
        .flat_map(|s| s.effects.iter())
        .filter(|e| selector.matches(e))
        .collect()
}

/// Thread `base` through every applicable effect in order.
pub fn fold(effects: &[&Effect], ctx: &EffectCtx, base: f64) -> f64 {
    effects.iter().fold(base, |value, e| e.apply(value, ctx))
}

/// Select-then-fold in one step; a selector matching nothing returns
/// `base` unchanged.
pub fn calculate(sources: &[EffectSource], selector: Selector, ctx: &EffectCtx, base: f64) -> f64 {
    fold(&select(sources, selector), ctx, base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::CurrencyLedger;
    use crate::state::ProgressionState;

    fn source(id: &str, effects: Vec<Effect>) -> EffectSource {
        EffectSource {
            id: id.to_string(),
            effects,
        }
    }

    #[test]
    fn empty_selection_returns_base() {
        let state = ProgressionState::default();
        let ledger = CurrencyLedger::new();
        let ctx = EffectCtx::new(&state, &ledger);
        let sources = vec![source("a", vec![Effect::scale(EffectKind::Click, 2.0)])];
        let got = calculate(&sources, Selector::of(EffectKind::Global), &ctx, 10.0);
        assert!((got - 10.0).abs() < 1e-9);
    }

    #[test]
    fn fold_applies_in_listed_order() {
        let state = ProgressionState::default();
        let ledger = CurrencyLedger::new();
        let ctx = EffectCtx::new(&state, &ledger);

        // x2 then +1: (10 * 2) + 1 = 21
        let sources = vec![
            source("double", vec![Effect::scale(EffectKind::Global, 2.0)]),
            source("plus_one", vec![Effect::offset(EffectKind::Global, 1.0)]),
        ];
        let got = calculate(&sources, Selector::of(EffectKind::Global), &ctx, 10.0);
        assert!((got - 21.0).abs() < 1e-9);

        // +1 then x2: (10 + 1) * 2 = 22 — order is observable.
        let sources = vec![
            source("plus_one", vec![Effect::offset(EffectKind::Global, 1.0)]),
            source("double", vec![Effect::scale(EffectKind::Global, 2.0)]),
        ];
        let got = calculate(&sources, Selector::of(EffectKind::Global), &ctx, 10.0);
        assert!((got - 22.0).abs() < 1e-9);
    }

    #[test]
    fn chained_mixed_effects_exact_value() {
        let state = ProgressionState::default();
        let ledger = CurrencyLedger::new();
        let ctx = EffectCtx::new(&state, &ledger);

        // base 10 -> +10% -> x2 -> +5: ((10 * 1.1) * 2) + 5 = 27
        let sources = vec![
            source("pct", vec![Effect::scale(EffectKind::Global, 1.1)]),
            source("double", vec![Effect::scale(EffectKind::Global, 2.0)]),
            source("flat", vec![Effect::offset(EffectKind::Global, 5.0)]),
        ];
        let got = calculate(&sources, Selector::of(EffectKind::Global), &ctx, 10.0);
        assert!((got - 27.0).abs() < 1e-9);
    }

    #[test]
    fn building_selector_requires_matching_target() {
        let state = ProgressionState::default();
        let ledger = CurrencyLedger::new();
        let ctx = EffectCtx::new(&state, &ledger);

        let sources = vec![source(
            "boost",
            vec![
                Effect::scale_building(BuildingId::Molecule, 2.0),
                Effect::scale_building(BuildingId::Crystal, 3.0),
            ],
        )];

        let molecule = calculate(&sources, Selector::building(BuildingId::Molecule), &ctx, 1.0);
        assert!((molecule - 2.0).abs() < 1e-9);
        let crystal = calculate(&sources, Selector::building(BuildingId::Crystal), &ctx, 1.0);
        assert!((crystal - 3.0).abs() < 1e-9);
        let rock = calculate(&sources, Selector::building(BuildingId::Rock), &ctx, 1.0);
        assert!((rock - 1.0).abs() < 1e-9);
    }

    #[test]
    fn untargeted_selector_sees_targeted_effects_of_same_kind() {
        // An AutoBuy selector without target collects all auto-buy
        // effects regardless of building.
        let state = ProgressionState::default();
        let ledger = CurrencyLedger::new();
        let ctx = EffectCtx::new(&state, &ledger);

        let sources = vec![source(
            "autobuy",
            vec![Effect::scale(EffectKind::AutoBuy, 0.5).with_target(BuildingId::Molecule)],
        )];
        let effects = select(&sources, Selector::of(EffectKind::AutoBuy));
        assert_eq!(effects.len(), 1);
        let _ = ctx;
    }

    #[test]
    fn state_dependent_transform_reads_live_state() {
        let mut state = ProgressionState::default();
        state.total_clicks_run = 250;
        let ledger = CurrencyLedger::new();
        let ctx = EffectCtx::new(&state, &ledger);

        // +10% per 100 clicks: floor(250/100) * 0.1 = +20%
        let sources = vec![source(
            "click_mastery",
            vec![Effect::compute(EffectKind::Global, |v, ctx| {
                let bonus = (ctx.state.total_clicks_run / 100) as f64 * 0.1;
                v * (1.0 + bonus)
            })],
        )];
        let got = calculate(&sources, Selector::of(EffectKind::Global), &ctx, 100.0);
        assert!((got - 120.0).abs() < 1e-9);
    }

    #[test]
    fn ctx_player_level_derives_from_total_xp() {
        let mut state = ProgressionState::default();
        state.total_xp = 242.0;
        let ledger = CurrencyLedger::new();
        let ctx = EffectCtx::new(&state, &ledger);
        assert_eq!(ctx.player_level(), 2);
    }
}
