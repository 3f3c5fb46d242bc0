//! Supervisor routing and orchestration for Vigil.
//!
//! The coordinator is the central brain that:
//! 1. Derives routing facts from the investigation state
//! 2. Lets the supervisor pick the next decision from a transition table
//! 3. Dispatches the matching step and merges its partial update
//! 4. Streams one event per iteration until the investigation terminates
//!
//! # Architecture
//!
//! ```text
//! InvestigationRequest
//!      │
//!      ▼
//! ┌─────────────────┐   decide    ┌────────────┐
//! │  Orchestrator   │ ──────────► │ Supervisor │ ◄── RuleTable (fast_track | consultative)
//! │   (this crate)  │ ◄────────── └────────────┘     + optional Reasoner
//! └────────┬────────┘  Decision
//!          │ execute(&state) → PartialUpdate → apply
//!    ┌─────┴──────┬────────────┬────────────┐
//!    ▼            ▼            ▼            ▼
//! [Threat]      [Log]     [Consultant]  [Policy]
//!  Analyst     Analyst       Agent        Agent
//! ```

pub mod builder;
pub mod config;
pub mod orchestrator;
pub mod routing;
pub mod supervisor;

pub use builder::{Collaborators, build_orchestrator, build_with, default_registry};
pub use config::{SupervisorConfig, VigilConfig};
pub use orchestrator::{CancelToken, Orchestrator, OrchestratorConfig, StepRegistry};
pub use routing::{RoutingFacts, RoutingRule, RuleTable, TableKind};
pub use supervisor::{Supervisor, SupervisorMode};
