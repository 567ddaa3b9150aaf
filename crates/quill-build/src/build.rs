//! The incremental build engine.
//!
//! Every module goes through four stages: Read, Parsed, Resolved and
//! Elaborated. Each stage keeps one [`Trace`] per module behind its own
//! async lock. A fetch holds that lock for its whole duration, so at most
//! one computation per key is ever in flight, while distinct keys proceed
//! independently. A stored trace is reused as long as the hash of its
//! inputs is unchanged and no [`Instruction`] asks for a point query.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinSet;
use tower_lsp::lsp_types::InlayHint;
use tracing::Instrument;

use quill_resolve::resolved;
use quill_syntax::{
    merge_diagnostics, push_diagnostic, surface, Diagnostic, Diagnostics, ModuleLocation,
    SourceLocation, Span,
};

use crate::config::Config;
use crate::document::LineIndex;
use crate::error::{BuildError, Stage};
use crate::ide::{inlay_hint, HoverProducer, Instruction};
use crate::read::read_module;
use crate::trace::{combine, hash_of, Store, Trace};

/// Boxed so that fetches can recurse through spawned tasks.
pub type Fetch<T> = Pin<Box<dyn Future<Output = Result<T, BuildError>> + Send + 'static>>;

#[derive(Debug)]
pub struct Read {
    pub text: String,
}

#[derive(Debug)]
pub struct Parsed {
    pub module: surface::Module,
    pub diagnostics: Vec<Diagnostic>,
    pub line_index: LineIndex,
}

#[derive(Debug)]
pub struct Resolved {
    pub module: resolved::Module,
    /// Parse and resolve diagnostics together.
    pub diagnostics: Diagnostics,
    pub definition: Option<SourceLocation>,
    /// Modules this one was resolved against, sorted, cyclic imports left out.
    pub dependencies: Vec<ModuleLocation>,
    pub line_index: LineIndex,
}

#[derive(Debug)]
pub struct Elaborated {
    pub module: quill_core::Module,
    /// Parse, resolve and elaboration diagnostics together.
    pub diagnostics: Diagnostics,
    pub hover: Option<HoverProducer>,
    pub definition: Option<SourceLocation>,
    pub inlay_hints: Vec<InlayHint>,
    pub line_index: LineIndex,
    /// Every module this one was elaborated against, transitive
    /// dependencies included, each once.
    pub scope: Vec<Arc<Elaborated>>,
}

/// How many times each phase function has run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub reads: usize,
    pub parses: usize,
    pub resolves: usize,
    pub elaborations: usize,
}

#[derive(Default)]
struct Counters {
    reads: AtomicUsize,
    parses: AtomicUsize,
    resolves: AtomicUsize,
    elaborations: AtomicUsize,
}

/// A module's edit counter as seen by a running query. The counter is
/// shared, so it keeps counting after the module is closed and forgotten.
#[derive(Debug, Clone)]
pub struct Generation {
    counter: Arc<AtomicU64>,
    seen: u64,
}

impl Generation {
    /// No edit or close happened since this was taken.
    pub fn is_current(&self) -> bool {
        self.counter.load(Ordering::Acquire) == self.seen
    }
}

/// The modules each in-flight fetch of one stage is waiting on. Fetches of
/// a stage only ever wait on fetches of the same stage, so a cycle here is
/// the only way two fetches can wait on each other.
#[derive(Default)]
struct Waits(Mutex<HashMap<ModuleLocation, Vec<ModuleLocation>>>);

/// Removes the edges of one fetch when dropped.
struct Waiting<'a> {
    waits: &'a Waits,
    from: ModuleLocation,
}

impl Waits {
    /// Record that `from` is about to wait on `targets`. Targets already
    /// waiting on `from`, directly or not, are left out and returned apart.
    fn enter(
        &self,
        from: &ModuleLocation,
        targets: Vec<ModuleLocation>,
    ) -> (Waiting<'_>, Vec<ModuleLocation>, Vec<ModuleLocation>) {
        let mut waits = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let (blocked, kept): (Vec<_>, Vec<_>) = targets
            .into_iter()
            .partition(|target| waits_on(&waits, target, from));
        waits.insert(from.clone(), kept.clone());
        let waiting = Waiting {
            waits: self,
            from: from.clone(),
        };
        (waiting, kept, blocked)
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
    }
}

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        let mut waits = self.waits.0.lock().unwrap_or_else(PoisonError::into_inner);
        waits.remove(&self.from);
    }
}

fn waits_on(
    waits: &HashMap<ModuleLocation, Vec<ModuleLocation>>,
    from: &ModuleLocation,
    target: &ModuleLocation,
) -> bool {
    let mut seen = HashSet::new();
    let mut stack = vec![from];
    while let Some(current) = stack.pop() {
        if current == target {
            return true;
        }
        if seen.insert(current) {
            stack.extend(waits.get(current).into_iter().flatten());
        }
    }
    false
}

pub struct Build {
    config: Config,
    read: Store<Read>,
    parsed: Store<Parsed>,
    resolved: Store<Resolved>,
    elaborated: Store<Elaborated>,
    /// Edit counters of the modules some query has watched. Bumped on
    /// every edit; bumped and dropped on close.
    generations: Mutex<HashMap<ModuleLocation, Arc<AtomicU64>>>,
    resolving: Waits,
    elaborating: Waits,
    counters: Counters,
}

impl Build {
    pub fn new(config: Config) -> Arc<Self> {
        Arc::new(Self {
            config,
            read: Store::new(),
            parsed: Store::new(),
            resolved: Store::new(),
            elaborated: Store::new(),
            generations: Mutex::new(HashMap::new()),
            resolving: Waits::default(),
            elaborating: Waits::default(),
            counters: Counters::default(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> Stats {
        Stats {
            reads: self.counters.reads.load(Ordering::Relaxed),
            parses: self.counters.parses.load(Ordering::Relaxed),
            resolves: self.counters.resolves.load(Ordering::Relaxed),
            elaborations: self.counters.elaborations.load(Ordering::Relaxed),
        }
    }

    pub fn generation(&self, location: &ModuleLocation) -> Generation {
        let mut generations = self.generations.lock().unwrap_or_else(PoisonError::into_inner);
        let counter = Arc::clone(generations.entry(location.clone()).or_default());
        let seen = counter.load(Ordering::Acquire);
        Generation { counter, seen }
    }

    fn bump_generation(&self, location: &ModuleLocation) {
        let generations = self.generations.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(counter) = generations.get(location) {
            counter.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn retire_generation(&self, location: &ModuleLocation) {
        let mut generations = self.generations.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(counter) = generations.remove(location) {
            counter.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Replace the text of `location` with the editor's copy.
    #[tracing::instrument(skip_all, fields(module = %location))]
    pub async fn change_text(&self, location: &ModuleLocation, text: String) {
        let slot = self.read.slot(location);
        let mut cached = slot.lock().await;
        *cached = Some(Trace::new(Read { text }, 0));
        self.bump_generation(location);
    }

    /// Forget everything cached for `location`. Waits for any fetch of
    /// the same keys that is already running.
    #[tracing::instrument(skip_all, fields(module = %location))]
    pub async fn close_text(&self, location: &ModuleLocation) {
        self.retire_generation(location);
        evict(&self.read, location).await;
        evict(&self.parsed, location).await;
        evict(&self.resolved, location).await;
        evict(&self.elaborated, location).await;
    }

    pub async fn fetch_read(&self, location: &ModuleLocation) -> Trace<Read> {
        let slot = self.read.slot(location);
        let mut cached = slot.lock().await;
        if let Some(trace) = cached.as_ref() {
            return trace.clone();
        }
        let text = read_module(&self.config, location).await;
        self.counters.reads.fetch_add(1, Ordering::Relaxed);
        let trace = Trace::new(Read { text }, 0);
        *cached = Some(trace.clone());
        trace
    }

    #[tracing::instrument(skip_all, fields(module = %location))]
    pub async fn fetch_parsed(&self, location: &ModuleLocation) -> Result<Trace<Parsed>, BuildError> {
        let slot = self.parsed.slot(location);
        let mut cached = slot.lock().await;
        let read = self.fetch_read(location).await;
        let hash = hash_of(read.value.text.as_str());
        if let Some(trace) = cached.as_ref().filter(|trace| trace.hash == hash) {
            tracing::debug!(module = %location, "parsed: hit");
            return Ok(trace.clone());
        }
        tracing::debug!(module = %location, "parsed: miss");

        let name = location.clone();
        let parsed = tokio::task::spawn_blocking(move || {
            let text = &read.value.text;
            let (module, diagnostics) = quill_syntax::parse(text, name);
            Parsed {
                module,
                diagnostics,
                line_index: LineIndex::new(text),
            }
        })
        .await
        .map_err(|err| BuildError::from_join(err, location.clone(), Stage::Parsed))?;
        self.counters.parses.fetch_add(1, Ordering::Relaxed);

        let trace = Trace::new(parsed, hash);
        *cached = Some(trace.clone());
        Ok(trace)
    }

    pub fn fetch_resolved(
        self: &Arc<Self>,
        location: ModuleLocation,
        instruction: Option<Instruction>,
    ) -> Fetch<Trace<Resolved>> {
        let build = Arc::clone(self);
        let span = tracing::debug_span!("fetch_resolved", module = %location);
        Box::pin(async move { build.resolve(location, instruction).await }.instrument(span))
    }

    pub fn fetch_elaborated(
        self: &Arc<Self>,
        location: ModuleLocation,
        instruction: Option<Instruction>,
    ) -> Fetch<Trace<Elaborated>> {
        let build = Arc::clone(self);
        let span = tracing::debug_span!("fetch_elaborated", module = %location);
        Box::pin(async move { build.elaborate(location, instruction).await }.instrument(span))
    }

    async fn resolve(
        self: Arc<Self>,
        location: ModuleLocation,
        instruction: Option<Instruction>,
    ) -> Result<Trace<Resolved>, BuildError> {
        let slot = self.resolved.slot(&location);
        let mut cached = slot.lock().await;
        let parsed = self.fetch_parsed(&location).await?;

        let mut diagnostics = Diagnostics::new();
        for diagnostic in &parsed.value.diagnostics {
            push_diagnostic(&mut diagnostics, None, diagnostic.clone());
        }

        // An import that leads back here is left out; waiting on it would
        // wait on this very lock.
        let mut dependencies = Vec::new();
        let mut cyclic_hash = 0u64;
        for dependency in dependencies_of(&location, &parsed.value.module) {
            if self.reaches(&dependency, &location).await? {
                tracing::warn!(module = %location, %dependency, "cyclic import");
                push_diagnostic(
                    &mut diagnostics,
                    None,
                    Diagnostic::error(
                        format!("cyclic import of `{}`", dependency),
                        import_span(&parsed.value.module, &dependency),
                    ),
                );
                cyclic_hash = cyclic_hash.wrapping_add(self.fetch_parsed(&dependency).await?.hash);
            } else {
                dependencies.push(dependency);
            }
        }

        // Another fetch may have seen the imports before an edit reversed
        // them. Its module is left out here and picked up on the next fetch,
        // since the input hash then differs.
        let (waiting, dependencies, blocked) = self.resolving.enter(&location, dependencies);
        for dependency in &blocked {
            tracing::warn!(module = %location, %dependency, "import reversed during the build");
        }
        let fetches = dependencies
            .iter()
            .map(|dependency| self.fetch_resolved(dependency.clone(), None))
            .collect();
        let upstream = join_all(fetches, &location, Stage::Resolved).await;
        drop(waiting);
        let upstream = upstream?;
        let hash = combine(
            parsed.hash,
            upstream.iter().map(|trace| trace.hash).chain([cyclic_hash]),
        );
        tracing::trace!(module = %location, hash, "resolved: input hash");

        if instruction.is_none() {
            if let Some(trace) = cached.as_ref().filter(|trace| trace.hash == hash) {
                tracing::debug!(module = %location, "resolved: hit");
                return Ok(trace.clone());
            }
        }
        tracing::debug!(module = %location, ?instruction, "resolved: miss");

        let query = instruction.map(|instruction| instruction.to_query(&parsed.value.line_index));
        let input = Arc::clone(&parsed.value);
        let modules: Vec<Arc<Resolved>> = upstream.iter().map(|trace| Arc::clone(&trace.value)).collect();
        let result = tokio::task::spawn_blocking(move || {
            let modules: Vec<&resolved::Module> = modules.iter().map(|m| &m.module).collect();
            quill_resolve::resolve(&input.module, &modules, query)
        })
        .await
        .map_err(|err| BuildError::from_join(err, location.clone(), Stage::Resolved))?;
        self.counters.resolves.fetch_add(1, Ordering::Relaxed);

        merge_diagnostics(&mut diagnostics, result.diagnostics);
        let trace = Trace::new(
            Resolved {
                module: result.module,
                diagnostics,
                definition: result.definition,
                dependencies,
                line_index: parsed.value.line_index.clone(),
            },
            hash,
        );
        *cached = Some(trace.clone());
        Ok(trace)
    }

    async fn elaborate(
        self: Arc<Self>,
        location: ModuleLocation,
        instruction: Option<Instruction>,
    ) -> Result<Trace<Elaborated>, BuildError> {
        let slot = self.elaborated.slot(&location);
        let mut cached = slot.lock().await;

        let definition_query = instruction.filter(|i| matches!(i, Instruction::Definition(_)));
        let resolved = self.fetch_resolved(location.clone(), definition_query).await?;

        let (waiting, dependencies, blocked) = self
            .elaborating
            .enter(&location, resolved.value.dependencies.clone());
        for dependency in &blocked {
            tracing::warn!(module = %location, %dependency, "import reversed during the build");
        }
        let fetches = dependencies
            .iter()
            .map(|dependency| self.fetch_elaborated(dependency.clone(), None))
            .collect();
        let upstream = join_all(fetches, &location, Stage::Elaborated).await;
        drop(waiting);
        let upstream = upstream?;
        let hash = combine(resolved.hash, upstream.iter().map(|trace| trace.hash));
        tracing::trace!(module = %location, hash, "elaborated: input hash");

        if instruction.is_none() {
            if let Some(trace) = cached.as_ref().filter(|trace| trace.hash == hash) {
                tracing::debug!(module = %location, "elaborated: hit");
                return Ok(trace.clone());
            }
        }
        tracing::debug!(module = %location, ?instruction, "elaborated: miss");

        let line_index = resolved.value.line_index.clone();
        let query = instruction.map(|instruction| instruction.to_query(&line_index));
        let input = Arc::clone(&resolved.value);
        // Types of imported definitions may unfold definitions from
        // modules this one never imports.
        let scope = scope_of(&upstream);
        let modules = scope.clone();
        let result = tokio::task::spawn_blocking(move || {
            let modules: Vec<&quill_core::Module> = modules.iter().map(|m| &m.module).collect();
            quill_core::elaborate(&input.module, &modules, query)
        })
        .await
        .map_err(|err| BuildError::from_join(err, location.clone(), Stage::Elaborated))?;
        self.counters.elaborations.fetch_add(1, Ordering::Relaxed);

        let mut diagnostics = resolved.value.diagnostics.clone();
        merge_diagnostics(&mut diagnostics, result.diagnostics);
        let definition = match definition_query {
            Some(_) => resolved.value.definition.clone(),
            None => None,
        };
        let trace = Trace::new(
            Elaborated {
                module: result.module,
                diagnostics,
                hover: result.hover.map(|hover| HoverProducer::new(hover, &line_index)),
                definition,
                inlay_hints: result
                    .inlay_hints
                    .iter()
                    .map(|hint| inlay_hint(&line_index, hint))
                    .collect(),
                line_index,
                scope,
            },
            hash,
        );
        *cached = Some(trace.clone());
        Ok(trace)
    }

    /// Whether `target` is among the modules `from` transitively depends on,
    /// `from` itself included.
    async fn reaches(&self, from: &ModuleLocation, target: &ModuleLocation) -> Result<bool, BuildError> {
        let mut seen = HashSet::new();
        let mut stack = vec![from.clone()];
        while let Some(current) = stack.pop() {
            if current == *target {
                return Ok(true);
            }
            if !seen.insert(current.clone()) {
                continue;
            }
            let parsed = self.fetch_parsed(&current).await?;
            stack.extend(dependencies_of(&current, &parsed.value.module));
        }
        Ok(false)
    }

    /// Whether any stage still holds a slot for `location`.
    pub fn is_cached(&self, location: &ModuleLocation) -> bool {
        self.read.contains(location)
            || self.parsed.contains(location)
            || self.resolved.contains(location)
            || self.elaborated.contains(location)
    }
}

async fn evict<V: Send + Sync>(store: &Store<V>, location: &ModuleLocation) {
    let slot = store.slot(location);
    let mut cached = slot.lock().await;
    *cached = None;
    store.remove(location, &slot);
}

/// The dependencies in `upstream` together with everything they were
/// elaborated against, deduplicated by module.
fn scope_of(upstream: &[Trace<Elaborated>]) -> Vec<Arc<Elaborated>> {
    let mut seen = HashSet::new();
    let mut scope = Vec::new();
    for trace in upstream {
        for module in trace.value.scope.iter().chain(std::iter::once(&trace.value)) {
            if seen.insert(module.module.name.clone()) {
                scope.push(Arc::clone(module));
            }
        }
    }
    scope
}

/// Imported modules plus the prelude, sorted and deduplicated.
fn dependencies_of(location: &ModuleLocation, module: &surface::Module) -> Vec<ModuleLocation> {
    let mut dependencies: Vec<ModuleLocation> = module
        .imports
        .iter()
        .map(|(import, _)| import.module.clone())
        .collect();
    let prelude = ModuleLocation::prelude();
    if *location != prelude {
        dependencies.push(prelude);
    }
    dependencies.sort();
    dependencies.dedup();
    dependencies
}

fn import_span(module: &surface::Module, dependency: &ModuleLocation) -> Span {
    module
        .imports
        .iter()
        .find(|(import, _)| import.module == *dependency)
        .map(|(_, span)| *span)
        .unwrap_or_default()
}

/// Run `fetches` in parallel and wait for every one of them. Results keep
/// the order of `fetches`; the first error wins.
async fn join_all<T: Send + 'static>(
    fetches: Vec<Fetch<T>>,
    location: &ModuleLocation,
    stage: Stage,
) -> Result<Vec<T>, BuildError> {
    let mut set = JoinSet::new();
    let count = fetches.len();
    for (index, fetch) in fetches.into_iter().enumerate() {
        set.spawn(async move { (index, fetch.await) });
    }

    let mut results: Vec<Option<T>> = (0..count).map(|_| None).collect();
    let mut first_error = None;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, Ok(value))) => results[index] = Some(value),
            Ok((_, Err(err))) => {
                first_error.get_or_insert(err);
            }
            Err(err) => {
                first_error.get_or_insert(BuildError::from_join(err, location.clone(), stage));
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(results.into_iter().flatten().collect()),
    }
}
