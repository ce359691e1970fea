//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Appointments and inventory items are entities: an appointment that is
/// rescheduled to another day is still the same appointment.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}
