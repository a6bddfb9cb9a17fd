//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the software.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Equipment data model - joint index layout, low level command/state frames, and the locomotion
/// command contract.
pub mod eqpt;

/// Network module
pub mod net;
