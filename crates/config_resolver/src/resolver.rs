//! Configuration resolver.
//!
//! This module implements the orchestration component of the engine. The
//! `ConfigResolver` fetches every registered source, compiles and merges
//! their fragments, runs the processing pipeline and answers typed queries
//! against the result.
//!
//! # Architecture
//!
//! - `ConfigSource` + `LoaderRegistry` deliver each source's payload
//! - `TreeCompiler` turns pairs into trees, one per tag set
//! - `TreeMerger` composes the trees in registration order
//! - `ProcessorPipeline` applies annotations, encryption, temporary secrets
//!   and includes
//! - `DecodeContext` + `DecodedValueCache` answer queries
//!
//! The merged result is held in an immutable [`ConfigSnapshot`]. `load` and
//! `reload` build a complete new snapshot and swap it in atomically, so a
//! query always sees one whole snapshot.
//!
//! # Secrets
//!
//! The snapshot also keeps each source's compiled trees from before the
//! pipeline ran, so that `reload` can rebuild around a single refetched
//! source. Those trees hold values exactly as the sources delivered them.
//! Encryption, read budgets and masking apply to the processed roots only:
//! a spent temporary value or a sealed leaf is still present in plaintext in
//! the compiled trees until the next snapshot replaces them. Sources that
//! must not stay resident in memory should not be registered with a
//! long-lived resolver.
//!
//! # Usage
//!
//! ```rust,ignore
//! use config_resolver::ConfigResolver;
//! use config_sources::{JsonLoader, MapSource};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = ConfigResolver::builder()
//!     .with_loader(Arc::new(JsonLoader::new()))
//!     .with_source(Arc::new(MapSource::new("defaults", [("db.port", "5432")])))
//!     .build()?;
//!
//! resolver.load().await?;
//! let port: u16 = resolver.get("db.port")?;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, info, instrument, warn};

use crate::cache::{CacheKey, CacheStatistics, DecodedValueCache};
use crate::compiler::TreeCompiler;
use crate::decode::{Decode, DecodeContext, DecoderRegistry, SecretPathMatcher};
use crate::errors::{ConfigurationError, ConfigurationResult};
use crate::lexer::{render_path, PathLexer, PathToken};
use crate::merge::TreeMerger;
use crate::node::ConfigNode;
use crate::pipeline::{
    AnnotationProcessor, AnnotationTransform, EncryptionProcessor, IncludeProcessor, NodeProcessor,
    ProcessorPipeline, SourceFactory, SourceFactoryRegistry, TemporaryProcessor,
    ANNOTATION_PRIORITY, ENCRYPTION_PRIORITY, INCLUDE_PRIORITY, TEMPORARY_PRIORITY,
};
use crate::settings::ResolverOptions;
use crate::source::{
    fetch_payload, ConfigSource, FormatLoader, LoaderRegistry, SourceId, SourcePayload,
};
use crate::tags::{Tag, Tags};
use crate::validation::{Severity, Validated, ValidationIssue};

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;

/// One source's compiled contribution.
///
/// The trees are kept from before the pipeline runs, so they still hold raw
/// values. `Debug` lists only their tag sets.
#[derive(Clone)]
struct CompiledSource {
    id: SourceId,
    name: String,
    /// `false` when the payload could not be fetched at all.
    fetched: bool,
    trees: BTreeMap<Tags, ConfigNode>,
    issues: Vec<ValidationIssue>,
}

impl fmt::Debug for CompiledSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSource")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("fetched", &self.fetched)
            .field("tag_sets", &self.trees.keys().collect::<Vec<_>>())
            .field("issues", &self.issues.len())
            .finish()
    }
}

/// An immutable, fully processed view of the configuration.
#[derive(Debug)]
pub struct ConfigSnapshot {
    generation: u64,
    loaded_at: DateTime<Utc>,
    compiled: Vec<CompiledSource>,
    roots: BTreeMap<Tags, Arc<ConfigNode>>,
    issues: Vec<ValidationIssue>,
}

impl ConfigSnapshot {
    fn empty() -> Self {
        let mut roots = BTreeMap::new();
        roots.insert(Tags::new(), Arc::new(ConfigNode::empty_map()));
        Self {
            generation: 0,
            loaded_at: Utc::now(),
            compiled: Vec::new(),
            roots,
            issues: Vec::new(),
        }
    }

    /// Incremented by every successful `load` or `reload`. Zero before the
    /// first load.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Issues found while building this snapshot.
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Tag sets that have their own root.
    pub fn tag_sets(&self) -> impl Iterator<Item = &Tags> {
        self.roots.keys()
    }

    /// The root built for exactly `tags`. Keys are stored normalized.
    pub fn root(&self, tags: &Tags) -> Option<&ConfigNode> {
        self.roots.get(tags).map(|root| root.as_ref())
    }

    /// The root serving a query with `tags`: the one whose tag set is the
    /// largest subset of `tags`.
    pub fn root_for(&self, tags: &Tags) -> Arc<ConfigNode> {
        self.roots
            .iter()
            .filter(|(root_tags, _)| root_tags.is_subset(tags))
            .max_by_key(|(root_tags, _)| root_tags.len())
            .map(|(_, root)| Arc::clone(root))
            .unwrap_or_else(|| Arc::new(ConfigNode::empty_map()))
    }
}

/// Summary of a successful `load` or `reload`.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub generation: u64,
    pub loaded_at: DateTime<Utc>,
    /// Number of registered sources.
    pub sources: usize,
    /// Number of tag sets with their own root.
    pub tag_sets: usize,
    /// Every issue found, including those below error level.
    pub issues: Vec<ValidationIssue>,
}

/// Builds a [`ConfigResolver`].
pub struct ConfigResolverBuilder {
    options: ResolverOptions,
    sources: Vec<Arc<dyn ConfigSource>>,
    loaders: LoaderRegistry,
    decoders: DecoderRegistry,
    factories: SourceFactoryRegistry,
    annotations: Vec<Arc<dyn AnnotationTransform>>,
    processors: Vec<(i32, Arc<dyn NodeProcessor>)>,
}

impl Default for ConfigResolverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigResolverBuilder {
    pub fn new() -> Self {
        Self {
            options: ResolverOptions::default(),
            sources: Vec::new(),
            loaders: LoaderRegistry::new(),
            decoders: DecoderRegistry::new(),
            factories: SourceFactoryRegistry::new(),
            annotations: Vec::new(),
            processors: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    /// Adds a source. Later sources take precedence over earlier ones.
    pub fn with_source(mut self, source: Arc<dyn ConfigSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn FormatLoader>) -> Self {
        self.loaders.register(loader);
        self
    }

    /// Registers a decoder that takes precedence over `T`'s `Decode` impl.
    pub fn with_decoder<T, F>(mut self, decoder: F) -> Self
    where
        T: 'static,
        F: Fn(&ConfigNode, &DecodeContext<'_>) -> Validated<T> + Send + Sync + 'static,
    {
        self.decoders.register::<T, F>(decoder);
        self
    }

    /// Registers a factory for include directives.
    pub fn with_source_factory(mut self, factory: Arc<dyn SourceFactory>) -> Self {
        self.factories.register(factory);
        self
    }

    pub fn with_annotation(mut self, transform: Arc<dyn AnnotationTransform>) -> Self {
        self.annotations.push(transform);
        self
    }

    /// Adds a processor next to the built-in ones.
    pub fn with_processor(mut self, priority: i32, processor: Arc<dyn NodeProcessor>) -> Self {
        self.processors.push((priority, processor));
        self
    }

    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidConfiguration` if the options
    /// contain an empty delimiter or an invalid pattern.
    pub fn build(self) -> ConfigurationResult<ConfigResolver> {
        let lexer = PathLexer::from_settings(&self.options.lexer)?;
        let secret_paths = SecretPathMatcher::new(&self.options.secrets.secret_paths)?;

        let mut annotations = AnnotationProcessor::from_settings(&self.options.annotations)?;
        for transform in self.annotations {
            annotations.register(transform);
        }

        let mut pipeline = ProcessorPipeline::new();
        pipeline.register(ANNOTATION_PRIORITY, Arc::new(annotations));
        pipeline.register(
            ENCRYPTION_PRIORITY,
            Arc::new(EncryptionProcessor::from_settings(&self.options.secrets)?),
        );
        pipeline.register(
            TEMPORARY_PRIORITY,
            Arc::new(TemporaryProcessor::from_settings(&self.options.secrets)?),
        );
        pipeline.register(
            INCLUDE_PRIORITY,
            Arc::new(IncludeProcessor::new(
                &self.options.include,
                lexer.clone(),
                Arc::new(self.factories),
            )),
        );
        for (priority, processor) in self.processors {
            pipeline.register(priority, processor);
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.id()) {
                return Err(ConfigurationError::InvalidConfiguration {
                    field: "sources".to_string(),
                    reason: format!("Source '{}' is registered twice", source.name()),
                });
            }
        }

        debug!(
            "Built resolver with {} source(s) and processors {:?}",
            self.sources.len(),
            pipeline.processor_names()
        );

        Ok(ConfigResolver {
            options: self.options,
            lexer,
            secret_paths,
            sources: self.sources,
            loaders: self.loaders,
            decoders: self.decoders,
            pipeline,
            compiler: TreeCompiler::new(),
            merger: TreeMerger::new(),
            snapshot: RwLock::new(Arc::new(ConfigSnapshot::empty())),
            cache: DecodedValueCache::new(),
            load_lock: tokio::sync::Mutex::new(()),
        })
    }
}

/// Resolves typed configuration values from layered sources.
///
/// Queries are synchronous and never block on `load`/`reload`, which are
/// serialized with each other.
pub struct ConfigResolver {
    options: ResolverOptions,
    lexer: PathLexer,
    secret_paths: SecretPathMatcher,
    sources: Vec<Arc<dyn ConfigSource>>,
    loaders: LoaderRegistry,
    decoders: DecoderRegistry,
    pipeline: ProcessorPipeline,
    compiler: TreeCompiler,
    merger: TreeMerger,
    snapshot: RwLock<Arc<ConfigSnapshot>>,
    cache: DecodedValueCache,
    load_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sources: Vec<&str> = self.sources.iter().map(|s| s.name()).collect();
        f.debug_struct("ConfigResolver")
            .field("sources", &sources)
            .field("pipeline", &self.pipeline)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl ConfigResolver {
    pub fn builder() -> ConfigResolverBuilder {
        ConfigResolverBuilder::new()
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Ids of the registered sources, in precedence order.
    pub fn source_ids(&self) -> Vec<SourceId> {
        self.sources.iter().map(|s| s.id()).collect()
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn cache_statistics(&self) -> CacheStatistics {
        self.cache.statistics()
    }

    /// Fetches every source and replaces the snapshot.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::LoadFailed` carrying every issue when an
    /// error-level issue is found and `fail_on_load_errors` is set. The
    /// previous snapshot stays in place.
    #[instrument(skip(self), fields(sources = self.sources.len()))]
    pub async fn load(&self) -> ConfigurationResult<LoadReport> {
        let _guard = self.load_lock.lock().await;
        info!("Loading configuration");
        self.load_locked().await
    }

    async fn load_locked(&self) -> ConfigurationResult<LoadReport> {
        let mut compiled = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            compiled.push(self.compile_source(source.as_ref()).await);
        }
        self.install(compiled)
    }

    /// Refetches one source and rebuilds the snapshot around it.
    ///
    /// The other sources keep their last compiled trees. On any failure the
    /// current snapshot is kept, so the call can simply be retried.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::UnknownSource` for an id that was never
    /// registered and `ConfigurationError::LoadFailed` if the source cannot
    /// be fetched or the rebuild finds errors.
    #[instrument(skip(self, source_id), fields(source_id = %source_id))]
    pub async fn reload(&self, source_id: SourceId) -> ConfigurationResult<LoadReport> {
        let source = self
            .sources
            .iter()
            .find(|s| s.id() == source_id)
            .ok_or_else(|| ConfigurationError::UnknownSource {
                source_id: source_id.to_string(),
            })?;

        let _guard = self.load_lock.lock().await;
        let current = self.snapshot();
        let Some(slot) = current.compiled.iter().position(|c| c.id == source_id) else {
            info!("Source '{}' has not been loaded yet, loading all sources", source.name());
            return self.load_locked().await;
        };

        info!("Reloading source '{}'", source.name());
        let refreshed = self.compile_source(source.as_ref()).await;
        if !refreshed.fetched {
            warn!(
                "Failed to fetch source '{}', keeping generation {}",
                refreshed.name, current.generation
            );
            return Err(load_failed(refreshed.issues, self.options.strict));
        }

        let mut compiled = current.compiled.clone();
        compiled[slot] = refreshed;
        self.install(compiled)
    }

    async fn compile_source(&self, source: &dyn ConfigSource) -> CompiledSource {
        let name = source.name().to_string();
        let tags = source.tags().normalized(self.lexer.normalizer());
        debug!("Fetching source '{}'", name);

        let mut issues = Vec::new();
        let fetched = fetch_payload(source, &self.loaders).await;
        let trees = match fetched.absorb_into(&mut issues) {
            None => None,
            Some(SourcePayload::Pairs(pairs)) => Some(
                self.compiler
                    .compile_pairs(&self.lexer, &pairs, &tags, &name)
                    .absorb_into(&mut issues)
                    .unwrap_or_default(),
            ),
            Some(SourcePayload::Tree(tree)) => {
                let tree = tree
                    .normalized(self.lexer.normalizer(), "")
                    .absorb_into(&mut issues)
                    .unwrap_or_else(ConfigNode::empty_map);
                Some(BTreeMap::from([(tags, tree)]))
            }
        };

        CompiledSource {
            id: source.id(),
            name,
            fetched: trees.is_some(),
            trees: trees.unwrap_or_default(),
            issues,
        }
    }

    /// Builds a snapshot from compiled sources and swaps it in.
    fn install(&self, compiled: Vec<CompiledSource>) -> ConfigurationResult<LoadReport> {
        let generation = self.snapshot().generation + 1;
        let (roots, issues) = self.build_roots(&compiled);
        let strict = self.options.strict;

        let error_count = issues.iter().filter(|i| i.is_error(strict)).count();
        if error_count > 0 && self.options.fail_on_load_errors {
            warn!(
                "Configuration load found {} error(s), keeping generation {}",
                error_count,
                generation - 1
            );
            for issue in &issues {
                log_issue(issue, issue.severity.effective(strict));
            }
            return Err(load_failed(issues, strict));
        }
        for issue in &issues {
            log_issue(issue, issue.severity.effective(strict));
        }

        let snapshot = Arc::new(ConfigSnapshot {
            generation,
            loaded_at: Utc::now(),
            compiled,
            roots,
            issues: issues.clone(),
        });
        let report = LoadReport {
            generation,
            loaded_at: snapshot.loaded_at,
            sources: snapshot.compiled.len(),
            tag_sets: snapshot.roots.len(),
            issues,
        };

        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
        self.cache.clear(generation);

        info!(
            "Configuration generation {} loaded from {} source(s) with {} tag set(s)",
            generation, report.sources, report.tag_sets
        );
        Ok(report)
    }

    /// Merges and processes one root per tag set.
    fn build_roots(
        &self,
        compiled: &[CompiledSource],
    ) -> (BTreeMap<Tags, Arc<ConfigNode>>, Vec<ValidationIssue>) {
        let mut issues = Vec::new();
        for source in compiled {
            issues.extend(source.issues.iter().cloned());
        }

        let mut tag_sets: BTreeSet<Tags> = BTreeSet::new();
        tag_sets.insert(Tags::new());
        for source in compiled {
            tag_sets.extend(source.trees.keys().cloned());
        }

        let mut roots = BTreeMap::new();
        for target in tag_sets {
            let mut layers: Vec<(usize, usize, &ConfigNode)> = Vec::new();
            for (index, source) in compiled.iter().enumerate() {
                for (tags, tree) in &source.trees {
                    if tags.is_subset(&target) {
                        layers.push((tags.len(), index, tree));
                    }
                }
            }
            layers.sort_by_key(|(specificity, index, _)| (*specificity, *index));

            debug!("Building root for tags '{}' from {} tree(s)", target, layers.len());
            let merged = self
                .merger
                .merge_all(layers.into_iter().map(|(_, _, tree)| tree.clone()), "")
                .absorb_into(&mut issues)
                .unwrap_or_else(ConfigNode::empty_map);
            let processed = self
                .pipeline
                .run(merged)
                .absorb_into(&mut issues)
                .unwrap_or_else(ConfigNode::empty_map);
            roots.insert(target, Arc::new(processed));
        }

        (roots, dedup_issues(issues))
    }

    /// Decodes the value at `path` as `T`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::DecodeFailed` with every issue when no
    /// value could be produced or an issue reaches `failure_threshold`.
    pub fn get<T>(&self, path: &str) -> ConfigurationResult<T>
    where
        T: Decode + Clone + Send + Sync,
    {
        self.get_tagged(path, &Tags::new())
    }

    /// Decodes the value at `path` as `T` in the scope of `tags`.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    #[instrument(level = "debug", skip(self, tags), fields(tags = %tags))]
    pub fn get_tagged<T>(&self, path: &str, tags: &Tags) -> ConfigurationResult<T>
    where
        T: Decode + Clone + Send + Sync,
    {
        let result = self.query::<T>(path, tags);
        let strict = self.options.strict;
        let threshold = self.options.failure_threshold;
        let failing = result
            .issues
            .iter()
            .filter(|i| i.severity.effective(strict) >= threshold)
            .count();

        match result.value {
            Some(value) if failing == 0 => {
                for issue in &result.issues {
                    log_issue(issue, issue.severity.effective(strict));
                }
                Ok(value)
            }
            _ => {
                debug!("Query for '{}' failed with {} issue(s)", path, result.issues.len());
                Err(ConfigurationError::DecodeFailed {
                    path: path.to_string(),
                    type_name: T::type_name().to_string(),
                    error_count: failing.max(1),
                    issues: result.issues,
                })
            }
        }
    }

    /// Decodes the value at `path`, or returns `default`.
    ///
    /// Never fails. When falling back, the issues are logged at
    /// `default_log_level`.
    pub fn get_or<T>(&self, path: &str, default: T) -> T
    where
        T: Decode + Clone + Send + Sync,
    {
        match self.get::<T>(path) {
            Ok(value) => value,
            Err(e) => {
                let level = self.options.default_log_level;
                log_issue_message(&format!("Using default for '{}': {}", path, e), level);
                for issue in e.issues() {
                    log_issue(issue, level);
                }
                default
            }
        }
    }

    /// Decodes the value at `path`, `None` when nothing is configured there.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::DecodeFailed` if a value exists but
    /// cannot be decoded.
    pub fn get_optional<T>(&self, path: &str) -> ConfigurationResult<Option<T>>
    where
        T: Decode + Clone + Send + Sync,
    {
        self.get::<Option<T>>(path)
    }

    fn query<T>(&self, path: &str, tags: &Tags) -> Validated<T>
    where
        T: Decode + Clone + Send + Sync,
    {
        let strict = self.options.strict;
        let mut issues = Vec::new();
        let mut query_tags = tags.normalized(self.lexer.normalizer());
        let mut descent: Vec<PathToken> = Vec::new();

        if !path.trim().is_empty() {
            let lexed = self.lexer.tokenize(path);
            let failed = lexed.has_errors(strict);
            let tokens = lexed.absorb_into(&mut issues).unwrap_or_default();
            if failed {
                return Validated::failed_with(issues);
            }
            for token in tokens {
                match token {
                    PathToken::Tag { key, value } => query_tags.insert(Tag::new(key, value)),
                    other => descent.push(other),
                }
            }
        }

        let canonical = render_path(&descent);
        let key = CacheKey::new::<T>(canonical.clone(), &query_tags);
        if self.options.cache_enabled {
            if let Some(value) = self.cache.get::<T>(&key) {
                return Validated::with_issues(value, issues);
            }
        }

        let snapshot = self.snapshot();
        let root = snapshot.root_for(&query_tags);
        let cacheable = Cell::new(true);
        let ctx = DecodeContext::new(
            canonical,
            &self.decoders,
            &self.lexer,
            &self.secret_paths,
            &query_tags,
            &cacheable,
        );
        let decoded = ctx.decode_at::<T>(&root, &descent);
        let value = decoded.absorb_into(&mut issues);

        let threshold = self.options.failure_threshold;
        let succeeded = value.is_some()
            && !issues
                .iter()
                .any(|i| i.severity.effective(strict) >= threshold);
        if self.options.cache_enabled && succeeded && cacheable.get() {
            if let Some(value) = &value {
                self.cache.insert(snapshot.generation, key, value.clone());
            }
        }

        Validated { value, issues }
    }

    /// Renders the untagged configuration with secret values masked.
    pub fn render_masked(&self) -> String {
        self.render_masked_tagged(&Tags::new())
    }

    /// Renders the configuration seen by `tags` with secret values masked.
    pub fn render_masked_tagged(&self, tags: &Tags) -> String {
        let snapshot = self.snapshot();
        snapshot
            .root_for(&tags.normalized(self.lexer.normalizer()))
            .render_masked(&|path| self.secret_paths.is_match(path))
    }
}

fn load_failed(issues: Vec<ValidationIssue>, strict: bool) -> ConfigurationError {
    ConfigurationError::LoadFailed {
        error_count: issues.iter().filter(|i| i.is_error(strict)).count(),
        issues,
    }
}

fn dedup_issues(issues: Vec<ValidationIssue>) -> Vec<ValidationIssue> {
    let mut seen = HashSet::new();
    issues
        .into_iter()
        .filter(|issue| seen.insert(issue.clone()))
        .collect()
}

fn log_issue(issue: &ValidationIssue, level: Severity) {
    log_issue_message(&issue.to_string(), level);
}

fn log_issue_message(message: &str, level: Severity) {
    match level {
        Severity::Debug => debug!("{}", message),
        Severity::Warn => warn!("{}", message),
        Severity::Error => error!("{}", message),
    }
}
