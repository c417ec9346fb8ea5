//! wellspring - health and wellness coaching agent
//!
//! An orchestration core for a coaching agent: user turns are classified,
//! routed to tools or specialist capabilities, and every proposed change
//! to the session record passes a guardrail gate before it commits.
//!
//! # Architecture
//!
//! The system is built around guarded state commits:
//! - Tools and capabilities propose changes; they never mutate sessions
//! - The coordinator stages, gates, and applies changes atomically
//! - A rejected turn leaves the session record untouched
//!
//! # Modules
//!
//! - `adapters`: External service boundaries (understanding, completion)
//! - `capabilities`: Specialist handoff targets (escalation, injury, nutrition)
//! - `core`: Orchestration logic (coordinator, router, guardrails, retry)
//! - `domain`: Data structures (SessionRecord, ChangeSet, TurnResponse)
//! - `tools`: The coaching tools behind the four-phase contract
//! - `store`: Session persistence
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Chat interactively
//! wellspring chat
//!
//! # Run a single turn
//! wellspring turn --session alice "I want to lose 4 kg over 8 weeks"
//!
//! # Inspect a session
//! wellspring show alice
//! ```

pub mod adapters;
pub mod capabilities;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod store;
pub mod tools;
