//! Opengine - scheduled operation execution engine for backup and disaster recovery.
//!
//! A scheduler fires operations; the engine decides whether to execute,
//! resume or drop each firing, keeps a durable log of every attempt and
//! prunes it to a retention window.

// ============================================================================
// Core
// ============================================================================

pub mod engine;
pub mod operation;

// ============================================================================
// Collaborators
// ============================================================================

pub mod client;
pub mod store;

// ============================================================================
// Infrastructure
// ============================================================================

pub mod build_info;
pub mod config;
pub mod sync;

pub use engine::OperationEngine;
