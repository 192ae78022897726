//! Headless progression core for an incremental clicker: currencies,
//! buildings, an ordered effect-composition engine, two prestige tiers,
//! deterministic offline catch-up, and versioned save migration.
//!
//! The crate renders nothing and owns no event loop. A host drives it
//! by calling [`GameManager::pump`] with wall-clock timestamps and
//! persists through any [`SaveStore`].

pub mod catalog;
pub mod clock;
pub mod currency;
pub mod effects;
pub mod manager;
pub mod offline;
pub mod save;
pub mod state;

pub use catalog::Catalog;
pub use clock::GameClock;
pub use currency::{CurrencyKind, CurrencyLedger, CurrencyState, Price};
pub use effects::{Effect, EffectCtx, EffectKind, EffectSource, Selector};
pub use manager::{GameEvent, GameManager, Notifier, NullNotifier};
pub use offline::OfflineSummary;
pub use save::{
    AutosaveGuard, GameState, MemoryStore, SaveError, SaveStore, SAVE_KEY, SAVE_VERSION,
};
pub use state::{Building, BuildingId, Feature, PowerUp, ProgressionState, RealmKind};
