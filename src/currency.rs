//! Currency kinds and the ledger that owns their balances.
//!
//! The ledger is pure bookkeeping: it knows nothing about buildings,
//! effects or prestige rules. `remove` is the only operation that can
//! fail, and it fails without mutating anything.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Prestige reset tiers, ordered. Resetting a layer also resets every
/// layer below it.
pub const LAYER_PROTONISE: u8 = 1;
pub const LAYER_ELECTRONIZE: u8 = 2;

/// The six currency kinds of the game: one primary resource and five
/// prestige-tier resources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CurrencyKind {
    Atoms,
    Protons,
    Electrons,
    Photons,
    ExcitedPhotons,
    HiggsBoson,
}

impl CurrencyKind {
    /// All kinds in display order.
    pub fn all() -> &'static [CurrencyKind] {
        &[
            CurrencyKind::Atoms,
            CurrencyKind::Protons,
            CurrencyKind::Electrons,
            CurrencyKind::Photons,
            CurrencyKind::ExcitedPhotons,
            CurrencyKind::HiggsBoson,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            CurrencyKind::Atoms => "Atoms",
            CurrencyKind::Protons => "Protons",
            CurrencyKind::Electrons => "Electrons",
            CurrencyKind::Photons => "Photons",
            CurrencyKind::ExcitedPhotons => "Excited Photons",
            CurrencyKind::HiggsBoson => "Higgs Boson",
        }
    }

    /// The prestige layer that zeroes this currency, if any. Electrons
    /// survive everything short of a hard reset.
    pub fn reset_layer(&self) -> Option<u8> {
        match self {
            CurrencyKind::Atoms => Some(LAYER_PROTONISE),
            CurrencyKind::Protons
            | CurrencyKind::Photons
            | CurrencyKind::ExcitedPhotons
            | CurrencyKind::HiggsBoson => Some(LAYER_ELECTRONIZE),
            CurrencyKind::Electrons => None,
        }
    }
}

/// A price in a specific currency.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub amount: f64,
    pub currency: CurrencyKind,
}

impl Price {
    pub fn new(amount: f64, currency: CurrencyKind) -> Self {
        Self { amount, currency }
    }

    pub fn atoms(amount: f64) -> Self {
        Self::new(amount, CurrencyKind::Atoms)
    }
}

/// Balance and lifetime-earned counters for one currency.
///
/// Invariants: `amount >= 0`, `earned_all_time >= earned_run`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CurrencyState {
    pub amount: f64,
    pub earned_run: f64,
    pub earned_all_time: f64,
}

/// Owns every currency balance. Never panics; `remove` reports failure
/// through its return value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyLedger {
    currencies: IndexMap<CurrencyKind, CurrencyState>,
}

impl Default for CurrencyLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl CurrencyLedger {
    pub fn new() -> Self {
        let currencies = CurrencyKind::all()
            .iter()
            .map(|k| (*k, CurrencyState::default()))
            .collect();
        Self { currencies }
    }

    pub fn amount(&self, kind: CurrencyKind) -> f64 {
        self.currencies.get(&kind).map_or(0.0, |c| c.amount)
    }

    pub fn earned_run(&self, kind: CurrencyKind) -> f64 {
        self.currencies.get(&kind).map_or(0.0, |c| c.earned_run)
    }

    pub fn earned_all_time(&self, kind: CurrencyKind) -> f64 {
        self.currencies.get(&kind).map_or(0.0, |c| c.earned_all_time)
    }

    /// Increase the balance and both earned counters. Negative amounts
    /// are ignored.
    pub fn add(&mut self, kind: CurrencyKind, amount: f64) {
        if amount <= 0.0 || !amount.is_finite() {
            return;
        }
        let entry = self.currencies.entry(kind).or_default();
        entry.amount += amount;
        entry.earned_run += amount;
        entry.earned_all_time += amount;
    }

    /// Decrease the balance. Fails without mutation if the balance is
    /// insufficient.
    pub fn remove(&mut self, kind: CurrencyKind, amount: f64) -> bool {
        if amount < 0.0 || !amount.is_finite() {
            return false;
        }
        let entry = self.currencies.entry(kind).or_default();
        if entry.amount < amount {
            return false;
        }
        entry.amount -= amount;
        true
    }

    pub fn can_afford(&self, price: &Price) -> bool {
        self.amount(price.currency) >= price.amount
    }

    /// Spend a price. Fails without mutation when unaffordable.
    pub fn spend(&mut self, price: &Price) -> bool {
        self.remove(price.currency, price.amount)
    }

    /// Zero the balance and run counter of every currency whose reset
    /// layer is at or below `layer`. All-time counters are untouched.
    pub fn reset_layer(&mut self, layer: u8) {
        for (kind, state) in self.currencies.iter_mut() {
            if matches!(kind.reset_layer(), Some(l) if l <= layer) {
                state.amount = 0.0;
                state.earned_run = 0.0;
            }
        }
    }

    /// Zero everything, including all-time counters.
    pub fn hard_reset(&mut self) {
        for state in self.currencies.values_mut() {
            *state = CurrencyState::default();
        }
    }

    /// Replace the whole map (used when loading a save).
    pub fn restore(&mut self, currencies: IndexMap<CurrencyKind, CurrencyState>) {
        self.currencies = Self::new().currencies;
        for (kind, state) in currencies {
            self.currencies.insert(kind, state);
        }
    }

    pub fn snapshot(&self) -> IndexMap<CurrencyKind, CurrencyState> {
        self.currencies.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_raises_amount_and_both_counters() {
        let mut ledger = CurrencyLedger::new();
        ledger.add(CurrencyKind::Atoms, 50.0);
        assert!((ledger.amount(CurrencyKind::Atoms) - 50.0).abs() < 1e-9);
        assert!((ledger.earned_run(CurrencyKind::Atoms) - 50.0).abs() < 1e-9);
        assert!((ledger.earned_all_time(CurrencyKind::Atoms) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn remove_fails_without_mutation_when_insufficient() {
        let mut ledger = CurrencyLedger::new();
        ledger.add(CurrencyKind::Atoms, 10.0);
        assert!(!ledger.remove(CurrencyKind::Atoms, 10.5));
        assert!((ledger.amount(CurrencyKind::Atoms) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn remove_succeeds_at_exact_balance() {
        let mut ledger = CurrencyLedger::new();
        ledger.add(CurrencyKind::Protons, 3.0);
        assert!(ledger.remove(CurrencyKind::Protons, 3.0));
        assert!((ledger.amount(CurrencyKind::Protons) - 0.0).abs() < 1e-9);
        // Earned counters keep their values.
        assert!((ledger.earned_run(CurrencyKind::Protons) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn negative_amounts_are_ignored() {
        let mut ledger = CurrencyLedger::new();
        ledger.add(CurrencyKind::Atoms, -5.0);
        assert!((ledger.amount(CurrencyKind::Atoms) - 0.0).abs() < 1e-9);
        assert!(!ledger.remove(CurrencyKind::Atoms, -5.0));
    }

    #[test]
    fn reset_layer_protonise_only_clears_atoms() {
        let mut ledger = CurrencyLedger::new();
        ledger.add(CurrencyKind::Atoms, 100.0);
        ledger.add(CurrencyKind::Protons, 10.0);
        ledger.add(CurrencyKind::Electrons, 1.0);
        ledger.reset_layer(LAYER_PROTONISE);
        assert!((ledger.amount(CurrencyKind::Atoms) - 0.0).abs() < 1e-9);
        assert!((ledger.amount(CurrencyKind::Protons) - 10.0).abs() < 1e-9);
        assert!((ledger.amount(CurrencyKind::Electrons) - 1.0).abs() < 1e-9);
        // All-time counter survives the reset.
        assert!((ledger.earned_all_time(CurrencyKind::Atoms) - 100.0).abs() < 1e-9);
        assert!((ledger.earned_run(CurrencyKind::Atoms) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn reset_layer_electronize_clears_everything_but_electrons() {
        let mut ledger = CurrencyLedger::new();
        for kind in CurrencyKind::all() {
            ledger.add(*kind, 7.0);
        }
        ledger.reset_layer(LAYER_ELECTRONIZE);
        assert!((ledger.amount(CurrencyKind::Electrons) - 7.0).abs() < 1e-9);
        for kind in [
            CurrencyKind::Atoms,
            CurrencyKind::Protons,
            CurrencyKind::Photons,
            CurrencyKind::ExcitedPhotons,
            CurrencyKind::HiggsBoson,
        ] {
            assert!((ledger.amount(kind) - 0.0).abs() < 1e-9, "{kind:?}");
        }
    }

    #[test]
    fn hard_reset_clears_all_time_counters() {
        let mut ledger = CurrencyLedger::new();
        ledger.add(CurrencyKind::Electrons, 42.0);
        ledger.hard_reset();
        assert!((ledger.amount(CurrencyKind::Electrons) - 0.0).abs() < 1e-9);
        assert!((ledger.earned_all_time(CurrencyKind::Electrons) - 0.0).abs() < 1e-9);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_kind() -> impl Strategy<Value = CurrencyKind> {
        prop_oneof![
            Just(CurrencyKind::Atoms),
            Just(CurrencyKind::Protons),
            Just(CurrencyKind::Electrons),
            Just(CurrencyKind::Photons),
            Just(CurrencyKind::ExcitedPhotons),
            Just(CurrencyKind::HiggsBoson),
        ]
    }

    proptest! {
        #[test]
        fn prop_amount_never_negative(
            kind in arb_kind(),
            adds in proptest::collection::vec(0.0f64..1e9, 0..8),
            removes in proptest::collection::vec(0.0f64..1e9, 0..8),
        ) {
            let mut ledger = CurrencyLedger::new();
            for a in &adds {
                ledger.add(kind, *a);
            }
            for r in &removes {
                ledger.remove(kind, *r);
            }
            prop_assert!(ledger.amount(kind) >= 0.0);
        }

        #[test]
        fn prop_all_time_at_least_run(
            kind in arb_kind(),
            adds in proptest::collection::vec(0.0f64..1e9, 0..8),
        ) {
            let mut ledger = CurrencyLedger::new();
            for a in &adds {
                ledger.add(kind, *a);
            }
            ledger.reset_layer(LAYER_ELECTRONIZE);
            prop_assert!(ledger.earned_all_time(kind) >= ledger.earned_run(kind));
        }

        #[test]
        fn prop_failed_remove_is_noop(kind in arb_kind(), balance in 0.0f64..1e6) {
            let mut ledger = CurrencyLedger::new();
            ledger.add(kind, balance);
            let before = ledger.amount(kind);
            prop_assert!(!ledger.remove(kind, balance + 1.0));
            prop_assert!((ledger.amount(kind) - before).abs() < 1e-9);
        }
    }
}
