//! Hierarchical configuration resolution.
//!
//! Values arrive from any number of ordered sources as flat `path = value`
//! pairs or as already structured trees. They are compiled into trees,
//! merged with later sources taking precedence, run through a processing
//! pipeline and finally decoded into typed values on demand.
//!
//! ```text
//! source -> compile -> merge -> pipeline -> snapshot -> decode (+ cache)
//! ```
//!
//! - **Paths** like `db.replicas[0].host` or `@env=prod.db.host` are split by
//!   the [`PathLexer`] into object, array and tag tokens.
//! - **Tags** scope sources and queries to an environment; tagged values are
//!   overlaid on the untagged tree.
//! - **Pipeline** stages handle inline annotations (`@{secret}`,
//!   `@{temp:3}`), in-memory encryption, read-limited secrets and `$include`
//!   directives that splice other sources into the tree.
//! - **Diagnostics** are collected as [`ValidationIssue`]s rather than
//!   failing on the first problem.
//!
//! The entry point is [`ConfigResolver`].

pub mod cache;
pub mod compiler;
pub mod decode;
pub mod errors;
pub mod lexer;
pub mod merge;
pub mod node;
pub mod pipeline;
pub mod resolver;
pub mod secrets;
pub mod settings;
pub mod source;
pub mod tags;
pub mod validation;

pub use cache::{CacheKey, CacheStatistics, DecodedValueCache};
pub use compiler::{PathFragment, TreeCompiler};
pub use decode::{
    decode_by_name, AggregateDecoder, Decode, DecodeContext, DecoderRegistry, SecretPathMatcher,
};
pub use errors::{ConfigurationError, ConfigurationResult};
pub use lexer::{
    LowerCaseNormalizer, PathLexer, PathToken, PreserveCaseNormalizer, SentenceNormalizer,
    TokenKind,
};
pub use merge::TreeMerger;
pub use node::{
    meta_keys, ArrayNode, ConfigNode, LeafNode, LeafPayload, MapNode, MetaValue, Metadata,
    NodeKind,
};
pub use pipeline::{
    AnnotationError, AnnotationProcessor, AnnotationTransform, IncludeError, NodeProcessor,
    Processed, ProcessorPipeline, SourceFactory, SourceFactoryRegistry,
};
pub use resolver::{ConfigResolver, ConfigResolverBuilder, ConfigSnapshot, LoadReport};
pub use secrets::{EncryptedValue, SecretError, TemporaryValue};
pub use settings::{
    AnnotationSettings, CaseMode, IncludeSettings, LexerSettings, ResolverOptions,
    SecretSettings, TemporaryRule,
};
pub use source::{
    ConfigSource, FormatLoader, LoaderRegistry, SourceError, SourceId, SourcePayload,
};
pub use tags::{Tag, Tags};
pub use validation::{IssueKind, Severity, Validated, ValidationIssue};
