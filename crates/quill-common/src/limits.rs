//! Centralized limits and thresholds for the quill solver.
//!
//! Keeping these in one place prevents duplicate definitions with
//! inconsistent values and documents the rationale for each limit.

/// Maximum recursion depth for a single subtype query.
///
/// The visit histories terminate all legitimate recursion (including
/// F-bounded generics); hitting this limit therefore indicates a bug in the
/// engine or in collaborator-provided bounds, not a hard input. Structural
/// comparison of recursive generics can legitimately nest deeply before a
/// cycle is recorded, so the limit is generous.
pub const MAX_SUBTYPE_DEPTH: u32 = 512;

/// Maximum recursion depth for a single structural conversion (`as_super`).
///
/// Conversion does not consult the visit histories, but every step either
/// descends into a strictly smaller shape or climbs a finite supertype
/// chain, so genuine inputs stay far below this.
pub const MAX_AS_SUPER_DEPTH: u32 = 256;

/// Maximum number of classes visited by one erased-subtype reachability
/// walk. Supertype graphs are acyclic by construction; this bounds the walk
/// against a store corrupted by a misbehaving registration.
pub const MAX_SUPERTYPE_WALK: u32 = 4_096;
