//! Decoding configuration nodes into typed values.
//!
//! Types implement [`Decode`] to be readable from the tree. Implementations
//! exist for primitives, `Option`, the standard sequence and map collections,
//! `PathBuf` and `Duration`. Application structs implement `Decode` through
//! [`DecodeContext::aggregate`]:
//!
//! ```rust
//! use config_resolver::{ConfigNode, Decode, DecodeContext, Validated};
//!
//! struct Database {
//!     host: String,
//!     port: u16,
//! }
//!
//! impl Decode for Database {
//!     fn decode(node: &ConfigNode, ctx: &DecodeContext<'_>) -> Validated<Self> {
//!         let mut fields = ctx.aggregate(node, "Database");
//!         let host = fields.required::<String>("host");
//!         let port = fields.or_else("port", 5432u16);
//!         fields.finish(|| Some(Database { host: host?, port }))
//!     }
//! }
//! ```
//!
//! A [`DecoderRegistry`] can override the decoding of any type; registered
//! decoders are consulted before the `Decode` implementation.

use regex::RegexSet;
use std::any::{Any, TypeId};
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{ConfigurationError, ConfigurationResult};
use crate::lexer::{join_index, join_key, PathLexer, PathToken};
use crate::node::{ConfigNode, LeafNode};
use crate::tags::Tags;
use crate::validation::{IssueKind, Validated, ValidationIssue};

mod aggregate;
mod collections;
mod primitives;

pub use aggregate::AggregateDecoder;
pub use collections::decode_by_name;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

/// Replacement shown instead of secret values.
pub const MASK: &str = "*****";

/// A type that can be decoded from a configuration node.
pub trait Decode: Sized + 'static {
    /// Name used in diagnostics.
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    fn decode(node: &ConfigNode, ctx: &DecodeContext<'_>) -> Validated<Self>;

    /// Called when no node exists at the requested path.
    fn decode_missing(ctx: &DecodeContext<'_>) -> Validated<Self> {
        Validated::failed(ValidationIssue::error(
            IssueKind::NoNodeFound,
            ctx.path(),
            format!("No node found on path: {}", ctx.path()),
        ))
    }
}

type DecodeFn<T> = dyn Fn(&ConfigNode, &DecodeContext<'_>) -> Validated<T> + Send + Sync;

/// Explicitly registered decoders, keyed by target type.
#[derive(Clone, Default)]
pub struct DecoderRegistry {
    decoders: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `decoder` for `T`, replacing any earlier registration.
    pub fn register<T, F>(&mut self, decoder: F)
    where
        T: 'static,
        F: Fn(&ConfigNode, &DecodeContext<'_>) -> Validated<T> + Send + Sync + 'static,
    {
        let decoder: Arc<DecodeFn<T>> = Arc::new(decoder);
        self.decoders.insert(TypeId::of::<T>(), Arc::new(decoder));
    }

    pub fn get<T: 'static>(&self) -> Option<Arc<DecodeFn<T>>> {
        self.decoders
            .get(&TypeId::of::<T>())?
            .downcast_ref::<Arc<DecodeFn<T>>>()
            .cloned()
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.decoders.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("registered", &self.decoders.len())
            .finish()
    }
}

/// Matches paths whose values must be masked.
#[derive(Debug, Clone)]
pub struct SecretPathMatcher {
    patterns: RegexSet,
}

impl SecretPathMatcher {
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidConfiguration` for an invalid
    /// pattern.
    pub fn new(patterns: &[String]) -> ConfigurationResult<Self> {
        let patterns =
            RegexSet::new(patterns).map_err(|e| ConfigurationError::InvalidConfiguration {
                field: "secrets.secret_paths".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { patterns })
    }

    /// A matcher that never matches.
    pub fn none() -> Self {
        Self {
            patterns: RegexSet::empty(),
        }
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.patterns.is_match(path)
    }
}

impl Default for SecretPathMatcher {
    fn default() -> Self {
        Self::none()
    }
}

/// State shared by every decoder during one query.
///
/// The context knows where in the tree decoding currently is, which decoders
/// are registered and which values are secret. It also records whether the
/// result may be cached: decoding any no-cache or decorated leaf marks the
/// whole query uncacheable.
pub struct DecodeContext<'a> {
    path: String,
    registry: &'a DecoderRegistry,
    lexer: &'a PathLexer,
    secret_paths: &'a SecretPathMatcher,
    tags: &'a Tags,
    cacheable: &'a Cell<bool>,
}

impl<'a> DecodeContext<'a> {
    pub fn new(
        path: impl Into<String>,
        registry: &'a DecoderRegistry,
        lexer: &'a PathLexer,
        secret_paths: &'a SecretPathMatcher,
        tags: &'a Tags,
        cacheable: &'a Cell<bool>,
    ) -> Self {
        Self {
            path: path.into(),
            registry,
            lexer,
            secret_paths,
            tags,
            cacheable,
        }
    }

    /// Canonical path of the node being decoded.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Tags of the query.
    pub fn tags(&self) -> &Tags {
        self.tags
    }

    pub fn lexer(&self) -> &PathLexer {
        self.lexer
    }

    /// The context for the map entry `name`.
    pub fn child(&self, name: &str) -> DecodeContext<'a> {
        self.at(join_key(&self.path, name))
    }

    /// The context for array element `index`.
    pub fn element(&self, index: usize) -> DecodeContext<'a> {
        self.at(join_index(&self.path, index))
    }

    fn at(&self, path: String) -> DecodeContext<'a> {
        DecodeContext {
            path,
            registry: self.registry,
            lexer: self.lexer,
            secret_paths: self.secret_paths,
            tags: self.tags,
            cacheable: self.cacheable,
        }
    }

    /// Decodes `node` as `T`, preferring a registered decoder.
    ///
    /// `None` means no node exists here and defers to `T::decode_missing`.
    pub fn decode<T: Decode>(&self, node: Option<&ConfigNode>) -> Validated<T> {
        let Some(node) = node else {
            return T::decode_missing(self);
        };
        if let ConfigNode::Leaf(leaf) = node {
            if leaf.is_uncacheable() {
                self.mark_uncacheable();
            }
        }
        match self.registry.get::<T>() {
            Some(decoder) => (*decoder)(node, self),
            None => T::decode(node, self),
        }
    }

    /// Decodes the node at `tokens` below `root`.
    pub fn decode_at<T: Decode>(&self, root: &ConfigNode, tokens: &[PathToken]) -> Validated<T> {
        self.decode(root.navigate(tokens).ok())
    }

    /// Starts decoding an aggregate from a map node.
    pub fn aggregate<'n>(
        &'n self,
        node: &'n ConfigNode,
        type_name: &str,
    ) -> AggregateDecoder<'n, 'a> {
        AggregateDecoder::new(node, self, type_name)
    }

    /// Prevents the result of this query from being cached.
    pub fn mark_uncacheable(&self) {
        self.cacheable.set(false);
    }

    pub fn is_cacheable(&self) -> bool {
        self.cacheable.get()
    }

    /// Returns `true` if `leaf`'s value must be masked here.
    pub fn is_secret(&self, leaf: &LeafNode) -> bool {
        leaf.is_secret() || self.secret_paths.is_match(&self.path)
    }

    /// `value`, or the mask when `leaf` is secret.
    pub fn display_value<'v>(&self, leaf: &LeafNode, value: &'v str) -> &'v str {
        if self.is_secret(leaf) {
            MASK
        } else {
            value
        }
    }

    /// Reads the value of a leaf node.
    ///
    /// # Errors
    ///
    /// Returns a `TypeMismatch` issue for maps and arrays and a
    /// `MissingValue` issue for a leaf without a value.
    pub fn leaf_value<'n>(
        &self,
        node: &'n ConfigNode,
        type_name: &str,
    ) -> Result<(&'n LeafNode, String), ValidationIssue> {
        let leaf = node.as_leaf().ok_or_else(|| self.type_mismatch(node, type_name))?;
        let value = leaf.value().ok_or_else(|| {
            ValidationIssue::error(
                IssueKind::MissingValue,
                self.path.clone(),
                format!("No value at '{}' to decode as {}", self.path, type_name),
            )
        })?;
        Ok((leaf, value))
    }

    /// A `TypeMismatch` issue for `node` at this path.
    pub fn type_mismatch(&self, node: &ConfigNode, type_name: &str) -> ValidationIssue {
        ValidationIssue::error(
            IssueKind::TypeMismatch,
            self.path.clone(),
            format!(
                "Cannot decode a {} node at '{}' as {}",
                node.kind(),
                self.path,
                type_name
            ),
        )
    }

    /// An `InvalidValue` issue with the value masked when secret.
    pub fn invalid_value(
        &self,
        leaf: &LeafNode,
        value: &str,
        type_name: &str,
        reason: impl std::fmt::Display,
    ) -> ValidationIssue {
        ValidationIssue::error(
            IssueKind::InvalidValue,
            self.path.clone(),
            format!(
                "Unable to decode '{}' at '{}' as {}: {}",
                self.display_value(leaf, value),
                self.path,
                type_name,
                reason
            ),
        )
    }
}
