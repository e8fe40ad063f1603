//! Data models for fcti-ta (title analysis)

pub mod chain;
pub mod document;
pub mod encumbrance;
pub mod foreclosure;
pub mod identity;
pub mod property;
pub mod task;
pub mod warning;

pub use chain::{ChainGap, GapStatus, LinkStatus, OwnershipPeriod, PersistedPeriod, RejectedDocument};
pub use document::{DocType, Document, DocumentKey, PartySide};
pub use encumbrance::{
    Encumbrance, EncumbranceKind, EventType, InstrumentEvent, LienStatus, SurvivalClassification,
    SurvivalSnapshot, SurvivalStatus,
};
pub use foreclosure::{ForeclosureContext, ForeclosureType};
pub use identity::{EntityType, Identity, IdentityMember, LinkDecision, LinkType};
pub use property::{normalize_legal_text, LegalSource, LegalVariation, Property};
pub use task::{priority, SearchOperator, SearchTask, TaskKey, TaskStatus, TaskType};
pub use warning::{DataQualityWarning, WarningKind};
