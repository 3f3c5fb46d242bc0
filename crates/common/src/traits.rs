//! Core step trait.
//!
//! Defined in `vigil-common` so that both the coordinator and the agent
//! crates can reference it without circular dependencies.

use crate::{Decision, InvestigationState, PartialUpdate, Result};
use async_trait::async_trait;

/// A specialist step the supervisor can dispatch to.
#[async_trait]
pub trait Step: Send + Sync {
    /// Human-readable name used in logs and trace lines.
    fn name(&self) -> &str;

    /// The decision this step answers to.
    fn decision(&self) -> Decision;

    /// Read the current state and produce an update for the fields this step owns.
    ///
    /// Steps never mutate the state directly. An `Err` leaves the state as it was.
    async fn execute(&self, state: &InvestigationState) -> Result<PartialUpdate>;
}
