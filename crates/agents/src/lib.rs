//! Specialist investigation steps.
//!
//! This crate provides one [`Step`](vigil_common::Step) per supervisor decision:
//!
//! - **Threat Analyst**: indicator reputation lookup and verdict
//! - **Log Analyst**: anomaly verdict over the supplied logs
//! - **Consultant Agent**: playbook procedure for a detected incident
//! - **Policy Agent**: machine-readable firewall rule
//!
//! # Architecture
//!
//! Each step reads the shared state, calls its collaborators and returns a
//! partial update for the fields it owns. None of them touches the state.
//!
//! ```text
//!            ┌──────────────┐  ┌─────────────┐  ┌────────────┐  ┌────────────┐
//!            │    Threat    │  │     Log     │  │ Consultant │  │   Policy   │
//!            │   Analyst    │  │   Analyst   │  │   Agent    │  │   Agent    │
//!            └──┬────────┬──┘  └──────┬──────┘  └──┬──────┬──┘  └─────┬──────┘
//!               │        │            │            │      │           │
//!               ▼        ▼            ▼            ▼      ▼           ▼
//!        ReputationLookup  ────────── Reasoner ──────────────────────
//!                                                  PlaybookRetriever
//! ```

pub mod consultant;
pub mod log_analysis;
pub mod policy;
pub mod reputation;
pub mod threat_intel;

pub use consultant::{ConsultantStep, NO_PLAYBOOK_FOUND};
pub use log_analysis::LogAnalystStep;
pub use policy::PolicyStep;
pub use reputation::{
    AnalysisStats, ReputationConfig, ReputationLookup, ReputationReport, VirusTotalClient,
};
pub use threat_intel::ThreatAnalystStep;
