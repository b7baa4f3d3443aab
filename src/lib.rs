//! Triagelink: secure patient intake links, red-flag screening, and AI
//! summary orchestration for outpatient practices.
//!
//! The pipeline runs in five stages. A provider issues a single-use,
//! time-bounded link ([`links`]); the patient proves their identity
//! against a date-of-birth challenge ([`verification`]); their
//! submission is validated and persisted atomically ([`ingest`]) while
//! a deterministic rule engine screens it for clinical red flags
//! ([`detection`]); and a generative model drafts a clinician-facing
//! summary under lease, deadline, and retry discipline ([`summary`]).
//! Status transitions for links and intakes live in one table
//! ([`state`]) that every compare-and-set update derives its guard
//! from.

pub mod api;
pub mod config;
pub mod db;
pub mod detection;
pub mod ingest;
pub mod links;
pub mod models;
pub mod notify;
pub mod state;
pub mod summary;
pub mod verification;
