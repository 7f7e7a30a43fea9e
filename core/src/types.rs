//! Shared primitive types used across the audit pipeline.

/// Stable identifier of an ingested transaction.
pub type TransactionId = String;

/// Identifier of one uploaded batch (an analysis session).
pub type SessionId = String;

/// Opaque, already-authenticated caller identity.
/// The core only uses it as a rate-limit key and an ownership check.
pub type CallerId = String;

/// Key of a duplicate group: normalized vendor, date, and amount in cents.
pub type GroupKey = String;
