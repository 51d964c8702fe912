//! Data-approval status resolution.
//!
//! A request flows through the level resolver, the eligibility filter, a
//! [`CellSignalSource`] query and finally the state classifier.

pub mod cache;
pub mod classify;
pub mod eligibility;
pub mod levels;
pub mod resolver;

pub use cache::{ApprovalExistenceCache, CacheGeneration};
pub use classify::{classify, StateSignals};
pub use eligibility::{check_eligibility, Ineligibility};
pub use levels::{resolve_levels, LevelBoundaries, ResolvedLevels};
pub use resolver::{
    ApprovalStatusResolver, CellSignalRequest, CellSignalSource, CellSignals, CurrentUserProvider,
    HighestApproved, PeriodLookup, StaticUserProvider, StatusQuery, SystemSettings,
};
