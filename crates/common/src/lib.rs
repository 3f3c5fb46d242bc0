//! Common types and traits shared across Vigil crates.
//!
//! Holds the investigation state, the supervisor's decision vocabulary and
//! the step trait that every specialist implements.

pub mod decision;
pub mod error;
pub mod event;
pub mod state;
pub mod traits;
pub mod update;

pub use decision::Decision;
pub use error::{ErrorKind, Result, VigilError};
pub use event::{HaltReason, InvestigationEvent, Outcome};
pub use state::{
    Alert, FirewallRule, InvestigationRequest, InvestigationState, LogAnalysis, Protocol,
    RuleAction, ThreatIntel,
};
pub use traits::Step;
pub use update::{PartialUpdate, StateField};
