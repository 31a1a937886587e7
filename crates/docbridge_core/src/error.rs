//! Error types for the bridge core.

use thiserror::Error;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors that can occur in bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Document store error.
    #[error("store error: {0}")]
    Store(#[from] docbridge_store::StoreError),

    /// Value encoding/decoding error.
    #[error("value error: {0}")]
    Value(#[from] docbridge_value::ValueError),

    /// No type mapping exists for a value type.
    ///
    /// Surfaced at model-build or mapping-lookup time; fatal for the
    /// property in question.
    #[error("not supported: {message}")]
    NotSupported {
        /// Description of the unsupported construct.
        message: String,
    },

    /// An insert collided with an existing key.
    ///
    /// Triggers rollback of the containing save batch.
    #[error("duplicate key {key} in table {entity_type}")]
    DuplicateKey {
        /// The entity type whose table rejected the insert.
        entity_type: String,
        /// Display form of the colliding key.
        key: String,
    },

    /// An update or delete target was missing.
    ///
    /// Signals an external concurrent modification; triggers rollback of the
    /// containing save batch.
    #[error("key {key} not found in table {entity_type}")]
    NotFound {
        /// The entity type whose table was searched.
        entity_type: String,
        /// Display form of the missing key.
        key: String,
    },

    /// A required property was absent from a stored document.
    ///
    /// Aborts the query that materialized the document.
    #[error("cannot materialize {entity_type}: required property {property} is absent")]
    Materialization {
        /// The entity type being materialized.
        entity_type: String,
        /// The absent property.
        property: String,
    },

    /// `begin` was called while a transaction is already active.
    #[error("a transaction is already active")]
    AlreadyActive,

    /// `commit` or `rollback` was called without an active transaction.
    #[error("no active transaction")]
    NoActiveTransaction,

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl BridgeError {
    /// Creates a not supported error.
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported {
            message: message.into(),
        }
    }

    /// Creates a duplicate key error.
    pub fn duplicate_key(entity_type: impl Into<String>, key: impl Into<String>) -> Self {
        Self::DuplicateKey {
            entity_type: entity_type.into(),
            key: key.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(entity_type: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            key: key.into(),
        }
    }

    /// Creates a materialization error.
    pub fn materialization(entity_type: impl Into<String>, property: impl Into<String>) -> Self {
        Self::Materialization {
            entity_type: entity_type.into(),
            property: property.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}
