//! # Document Module
//!
//! Read-only selection AST for GraphQL documents.
//!
//! Source text is parsed with `apollo-parser` and its lossless syntax tree is
//! lowered once into the owned types below. The normalizer and the selector
//! only ever see this AST:
//! - operations and fragment definitions, in source order
//! - fields with alias, name, arguments and optional child selections
//! - fragment spreads and inline fragments
//!
//! Fragment definitions are collected into a [`FragmentTable`] per document;
//! spread resolution and cycle detection live here so both walks share them.

use crate::primitives::DEFAULT_RECURSION_LIMIT;
use crate::storage_key;
use crate::{CacheError, StorageKey};
use apollo_parser::Parser;
use apollo_parser::cst::{self, CstNode};
use std::collections::BTreeMap;

// =============================================================================
// AST TYPES
// =============================================================================

/// One entry of a selection set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// `alias: name(args) { ... }`
    Field(Field),
    /// `...FragmentName`
    FragmentSpread(FragmentSpread),
    /// `... on Type { ... }`
    InlineFragment(InlineFragment),
}

/// A field selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Response alias, if any.
    pub alias: Option<String>,
    /// Schema field name.
    pub name: String,
    /// Arguments in source order.
    pub arguments: Vec<Argument>,
    /// Child selections; `None` for leaf fields.
    pub selections: Option<Vec<Selection>>,
}

impl Field {
    /// Key of this field in a response object: the alias if present, else the name.
    #[must_use]
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Cache key of this field within its parent record.
    pub fn storage_key(&self) -> Result<StorageKey, CacheError> {
        storage_key::encode(&self.name, &self.arguments)
    }
}

/// A named argument with its value as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    /// Argument name.
    pub name: String,
    /// Argument value.
    pub value: ArgumentValue,
}

impl Argument {
    /// Create an argument.
    #[must_use]
    pub fn new(name: impl Into<String>, value: ArgumentValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// The value of an argument.
///
/// Scalar literals keep their content; the remaining kinds keep their source
/// text only so that errors can show what was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentValue {
    /// `"text"` (escape sequences resolved)
    String(String),
    /// `42`, kept as written
    Int(String),
    /// `1.5e3`, kept as written
    Float(String),
    /// `true` / `false`
    Boolean(bool),
    /// `null`
    Null,
    /// `$name`
    Variable(String),
    /// `ENUM_VALUE`
    Enum(String),
    /// `[ ... ]`
    List(String),
    /// `{ ... }`
    Object(String),
}

/// `...FragmentName`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentSpread {
    /// Name of the spread fragment.
    pub name: String,
}

/// `... on Type { ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineFragment {
    /// Type condition, if written. Not evaluated.
    pub type_condition: Option<String>,
    /// Selections applied to the enclosing entity.
    pub selections: Vec<Selection>,
}

/// Kind of an operation definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// `query` or the `{ ... }` shorthand.
    Query,
    /// `mutation`
    Mutation,
    /// `subscription`
    Subscription,
}

/// An operation definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDefinition {
    /// Operation name, `None` for anonymous operations.
    pub name: Option<String>,
    /// Operation kind.
    pub kind: OperationKind,
    /// Top-level selections, applied to the root entity.
    pub selections: Vec<Selection>,
}

/// A named fragment definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentDefinition {
    /// Fragment name.
    pub name: String,
    /// `on Type` condition. Not evaluated.
    pub type_condition: Option<String>,
    /// Fragment selections.
    pub selections: Vec<Selection>,
}

// =============================================================================
// FRAGMENT TABLE
// =============================================================================

/// Fragment definitions of one document, by name.
///
/// Also carries the limit on how deeply spreads may nest while expanding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentTable {
    fragments: BTreeMap<String, FragmentDefinition>,
    depth_limit: usize,
}

impl Default for FragmentTable {
    fn default() -> Self {
        Self::with_depth_limit(DEFAULT_RECURSION_LIMIT)
    }
}

impl FragmentTable {
    /// Create an empty table with the default spread depth limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table allowing at most `depth_limit` nested spreads.
    #[must_use]
    pub fn with_depth_limit(depth_limit: usize) -> Self {
        Self {
            fragments: BTreeMap::new(),
            depth_limit,
        }
    }

    /// Maximum number of spreads expanded inside one another.
    #[must_use]
    pub fn depth_limit(&self) -> usize {
        self.depth_limit
    }

    /// Add a definition. Fails if the name is already taken.
    pub fn insert(&mut self, fragment: FragmentDefinition) -> Result<(), CacheError> {
        if self.fragments.contains_key(&fragment.name) {
            return Err(CacheError::DuplicateFragment(fragment.name));
        }
        self.fragments.insert(fragment.name.clone(), fragment);
        Ok(())
    }

    /// Look up a definition by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FragmentDefinition> {
        self.fragments.get(name)
    }

    /// Number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Check if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Resolve a spread given the chain of spreads currently being expanded.
    ///
    /// `active` holds the fragments entered on the path from the walk's root to
    /// this spread, across field boundaries. Entering one of them again is a
    /// cycle; the error path starts at its first occurrence. A chain longer
    /// than the depth limit fails with [`CacheError::FragmentDepthExceeded`].
    pub fn resolve(
        &self,
        name: &str,
        active: &[String],
    ) -> Result<&FragmentDefinition, CacheError> {
        if let Some(start) = active.iter().position(|entered| entered == name) {
            let mut path = active[start..].to_vec();
            path.push(name.to_owned());
            return Err(CacheError::FragmentCycle { path });
        }
        if active.len() >= self.depth_limit {
            return Err(CacheError::FragmentDepthExceeded {
                fragment: name.to_owned(),
                limit: self.depth_limit,
            });
        }
        self.get(name)
            .ok_or_else(|| CacheError::UnknownFragment(name.to_owned()))
    }
}

// =============================================================================
// DOCUMENT
// =============================================================================

/// A parsed executable document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    operations: Vec<OperationDefinition>,
    fragments: FragmentTable,
    first_fragment: Option<String>,
}

impl Document {
    /// Parse source text with the default recursion limit.
    pub fn parse(source: &str) -> Result<Self, CacheError> {
        Self::parse_with_limit(source, DEFAULT_RECURSION_LIMIT)
    }

    /// Parse source text, bounding selection nesting at `recursion_limit`.
    ///
    /// Any parser diagnostic fails the whole document.
    pub fn parse_with_limit(source: &str, recursion_limit: usize) -> Result<Self, CacheError> {
        let tree = Parser::new(source)
            .recursion_limit(recursion_limit)
            .parse();

        let errors: Vec<String> = tree
            .errors()
            .map(|err| format!("{} (at offset {})", err.message(), err.index()))
            .collect();
        if !errors.is_empty() {
            return Err(CacheError::Parse(errors.join("; ")));
        }

        let mut operations = Vec::new();
        let mut fragments = FragmentTable::with_depth_limit(recursion_limit);
        let mut first_fragment = None;

        for definition in tree.document().definitions() {
            match definition {
                cst::Definition::OperationDefinition(operation) => {
                    operations.push(lower_operation(&operation)?);
                }
                cst::Definition::FragmentDefinition(fragment) => {
                    let fragment = lower_fragment(&fragment)?;
                    if first_fragment.is_none() {
                        first_fragment = Some(fragment.name.clone());
                    }
                    fragments.insert(fragment)?;
                }
                _ => {
                    return Err(CacheError::NotExecutable(
                        "type system definitions cannot be executed or read".to_owned(),
                    ));
                }
            }
        }

        Ok(Self {
            operations,
            fragments,
            first_fragment,
        })
    }

    /// All operations in source order.
    #[must_use]
    pub fn operations(&self) -> &[OperationDefinition] {
        &self.operations
    }

    /// The fragment table built from this document.
    #[must_use]
    pub fn fragments(&self) -> &FragmentTable {
        &self.fragments
    }

    /// Pick the operation to execute.
    ///
    /// Without a name the document must contain exactly one operation.
    pub fn operation(&self, name: Option<&str>) -> Result<&OperationDefinition, CacheError> {
        match name {
            Some(name) => self
                .operations
                .iter()
                .find(|op| op.name.as_deref() == Some(name))
                .ok_or_else(|| CacheError::OperationNotFound(name.to_owned())),
            None => match self.operations.as_slice() {
                [] => Err(CacheError::MissingOperation),
                [only] => Ok(only),
                many => Err(CacheError::AmbiguousOperation(many.len())),
            },
        }
    }

    /// Selections to read for a fragment read.
    ///
    /// With a name, the named fragment. Without, the first operation (the
    /// `{ ... }` shorthand included), else the first fragment in source order.
    pub fn read_selection(&self, fragment: Option<&str>) -> Result<&[Selection], CacheError> {
        if let Some(name) = fragment {
            return self
                .fragments
                .get(name)
                .map(|f| f.selections.as_slice())
                .ok_or_else(|| CacheError::UnknownFragment(name.to_owned()));
        }
        if let Some(operation) = self.operations.first() {
            return Ok(&operation.selections);
        }
        self.first_fragment
            .as_deref()
            .and_then(|name| self.fragments.get(name))
            .map(|f| f.selections.as_slice())
            .ok_or(CacheError::MissingOperation)
    }
}

// =============================================================================
// LOWERING (syntax tree -> AST)
// =============================================================================

fn lower_operation(operation: &cst::OperationDefinition) -> Result<OperationDefinition, CacheError> {
    let kind = match operation.operation_type() {
        Some(ty) if ty.mutation_token().is_some() => OperationKind::Mutation,
        Some(ty) if ty.subscription_token().is_some() => OperationKind::Subscription,
        _ => OperationKind::Query,
    };
    Ok(OperationDefinition {
        name: operation.name().map(|n| n.text().to_string()),
        kind,
        selections: lower_selection_set(operation.selection_set())?,
    })
}

fn lower_fragment(fragment: &cst::FragmentDefinition) -> Result<FragmentDefinition, CacheError> {
    let name = required(
        fragment.fragment_name().and_then(|n| n.name()),
        "fragment name",
    )?;
    Ok(FragmentDefinition {
        name,
        type_condition: type_condition(fragment.type_condition()),
        selections: lower_selection_set(fragment.selection_set())?,
    })
}

fn lower_selection_set(set: Option<cst::SelectionSet>) -> Result<Vec<Selection>, CacheError> {
    let set = set.ok_or_else(|| CacheError::Parse("missing selection set".to_owned()))?;
    set.selections().map(lower_selection).collect()
}

fn lower_selection(selection: cst::Selection) -> Result<Selection, CacheError> {
    match selection {
        cst::Selection::Field(field) => {
            let arguments = match field.arguments() {
                Some(arguments) => arguments
                    .arguments()
                    .map(|arg| lower_argument(&arg))
                    .collect::<Result<Vec<_>, _>>()?,
                None => Vec::new(),
            };
            let selections = match field.selection_set() {
                Some(set) => Some(lower_selection_set(Some(set))?),
                None => None,
            };
            Ok(Selection::Field(Field {
                alias: field
                    .alias()
                    .and_then(|alias| alias.name())
                    .map(|n| n.text().to_string()),
                name: required(field.name(), "field name")?,
                arguments,
                selections,
            }))
        }
        cst::Selection::FragmentSpread(spread) => Ok(Selection::FragmentSpread(FragmentSpread {
            name: required(
                spread.fragment_name().and_then(|n| n.name()),
                "fragment spread name",
            )?,
        })),
        cst::Selection::InlineFragment(inline) => Ok(Selection::InlineFragment(InlineFragment {
            type_condition: type_condition(inline.type_condition()),
            selections: lower_selection_set(inline.selection_set())?,
        })),
    }
}

fn lower_argument(argument: &cst::Argument) -> Result<Argument, CacheError> {
    let name = required(argument.name(), "argument name")?;
    let value = argument
        .value()
        .ok_or_else(|| CacheError::Parse(format!("argument `{name}` has no value")))?;
    let value = match value {
        cst::Value::StringValue(s) => ArgumentValue::String(String::from(s)),
        cst::Value::IntValue(i) => ArgumentValue::Int(source_text(&i)),
        cst::Value::FloatValue(f) => ArgumentValue::Float(source_text(&f)),
        cst::Value::BooleanValue(b) => ArgumentValue::Boolean(source_text(&b) == "true"),
        cst::Value::NullValue(_) => ArgumentValue::Null,
        cst::Value::Variable(v) => ArgumentValue::Variable(source_text(&v)),
        cst::Value::EnumValue(e) => ArgumentValue::Enum(source_text(&e)),
        cst::Value::ListValue(l) => ArgumentValue::List(source_text(&l)),
        cst::Value::ObjectValue(o) => ArgumentValue::Object(source_text(&o)),
    };
    Ok(Argument { name, value })
}

fn type_condition(condition: Option<cst::TypeCondition>) -> Option<String> {
    condition
        .and_then(|c| c.named_type())
        .and_then(|t| t.name())
        .map(|n| n.text().to_string())
}

fn required(name: Option<cst::Name>, what: &str) -> Result<String, CacheError> {
    name.map(|n| n.text().to_string())
        .ok_or_else(|| CacheError::Parse(format!("missing {what}")))
}

fn source_text(node: &impl CstNode) -> String {
    node.syntax()
        .text()
        .to_string()
        .trim_matches(|c: char| c.is_whitespace() || c == ',')
        .to_owned()
}

// =============================================================================
// TESTS
// =============================================================================
