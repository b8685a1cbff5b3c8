//! Shared primitive types used across the entire generator.

/// A simulation step. One step = one in-game day.
pub type Step = u64;

/// Dense account identifier; doubles as the vertex index in the graph arena.
pub type AccountId = usize;

/// Monotonically increasing transaction (edge) identifier.
pub type EdgeId = u64;

/// Bank identifier as it appears in the parameter tables.
pub type BankId = String;
