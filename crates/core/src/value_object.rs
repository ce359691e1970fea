//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity; two instances with the same attribute
/// values are interchangeable (e.g. a [`TimeRange`](crate::TimeRange) or a
/// stock status). They are immutable: "changing" one means building a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
