//! Shared primitive types used across the shipyard.

/// Identifier handed back for every accepted build request.
pub type TaskId = String;

/// Monotonic fleet revision. Bumped on every fleet mutation.
pub type Revision = u64;

/// Name of a unit template (and of every unit built from it).
pub type TypeName = String;
