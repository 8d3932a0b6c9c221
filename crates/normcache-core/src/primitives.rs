//! # Fixed Primitives
//!
//! Hardcoded constants shared by the normalizer, the store and the selector.
//!
//! These values are part of the record format: changing any of them changes
//! which keys a store snapshot contains.

/// EntityId of the unnamed root of a top-level operation.
pub const ROOT_ID: &str = "client:root";

/// Response field that carries an entity's identity.
///
/// Every object that can be the target of a link must select this field.
pub const ID_FIELD: &str = "id";

/// Key under which a reference is written in a serialized record.
pub const REF_KEY: &str = "__ref";

/// Member of a GraphQL response that holds the result tree.
pub const DATA_KEY: &str = "data";

/// Default nesting limit.
///
/// Forwarded to the GraphQL parser, which bounds the syntactic depth of every
/// selection tree. The fragment table applies the same limit to chains of
/// nested spreads, which the parser cannot see.
pub const DEFAULT_RECURSION_LIMIT: usize = 500;
