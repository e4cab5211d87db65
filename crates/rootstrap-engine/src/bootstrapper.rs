use std::collections::BTreeMap;

use ndarray::ArrayD;
use rootstrap_stats::{
    collector::{Collector, CollectorError},
    numeric::Weight,
};
use tracing::{debug, info, trace};

use crate::{
    CallbackError, DrawWeights, Edges, EdgesSpec,
    context::{ContextError, IterationContext, StaticContext},
    observable::Observable,
    reader::{ReadError, SourceReader},
    resample::{ResampleSeed, WeightDrawer},
    sample_set::{SampleSet, SampleSetBuilder, SampleSetError},
};

const PROGRESS_INTERVAL: usize = 1000;

/// Registry of sources and observables, and driver of the bootstrap loop.
///
/// # Lifecycle
///
/// 1. [`register_source`](Self::register_source): extract a histogram from every input
///    file and stack it into a [`SampleSet`]
/// 2. [`register_static_source`](Self::register_static_source): compute ensemble-wide
///    values once, from the unweighted sources
/// 3. [`register_observable`](Self::register_observable): declare derived quantities,
///    evaluated in registration order
/// 4. [`bootstrap`](Self::bootstrap): draw weights, evaluate every observable, accumulate
///
/// Every iteration is all-or-nothing: results are only folded into the collectors once
/// every observable of that iteration has been computed and validated. A failing
/// callback aborts the run and leaves the collectors as they were after the previous
/// iteration.
///
/// # Example
///
/// ```
/// use ndarray::arr1;
/// use rootstrap_engine::{
///     Bootstrapper, EdgesSpec, Edges, Extracted, ResampleSeed, reader::MemoryReader,
/// };
///
/// let mut reader = MemoryReader::new();
/// for i in 1..=5 {
///     let content = arr1(&[f64::from(i); 3]).into_dyn();
///     reader.push_file([("hist".to_owned(), Extracted::new(content, Edges::from_shape(&[3])))]);
/// }
///
/// let mut bs = Bootstrapper::with_seed(reader, ResampleSeed::from_u128(1));
/// bs.register_source("hist", "hist").unwrap();
/// bs.register_observable("total", EdgesSpec::source("hist"), |ctx| Ok(ctx.values("hist")?))
///     .unwrap();
///
/// let collectors = bs.bootstrap(100).unwrap();
/// let mean = collectors["total"].mean().unwrap();
/// assert!((mean[[0]] - 15.0).abs() < 3.0);
/// ```
#[derive(Debug)]
pub struct Bootstrapper {
    reader: Box<dyn SourceReader>,
    drawer: WeightDrawer,
    current_weights: Option<DrawWeights>,
    sources: BTreeMap<String, SampleSet>,
    statics: BTreeMap<String, ArrayD<f64>>,
    observables: Vec<Observable>,
    observable_index: BTreeMap<String, usize>,
    completed_iterations: usize,
}

/// Error raised by [`Bootstrapper`] registration and iteration.
#[derive(Debug, derive_more::Display)]
pub enum BootstrapError {
    #[display("source '{_0}' is already registered")]
    DuplicateSource(String),
    #[display("static source '{_0}' is already registered")]
    DuplicateStatic(String),
    #[display("observable '{_0}' is already registered")]
    DuplicateObservable(String),
    #[display("observable '{observable}' takes its edges from unknown source '{source_name}'")]
    UnknownSource {
        observable: String,
        source_name: String,
    },
    #[display("invalid edges for observable '{observable}': {reason}")]
    InvalidEdges {
        observable: String,
        reason: CallbackError,
    },
    #[display("no sources registered")]
    NoSources,
    #[display("no observables registered")]
    NoObservables,
    #[display("cannot read source '{name}': {source}")]
    Read { name: String, source: ReadError },
    #[display("source '{name}' expected {expected} files, the reader returned {found}")]
    FileCount {
        name: String,
        expected: usize,
        found: usize,
    },
    #[display("cannot populate source '{name}' (file {file}): {source}")]
    Population {
        name: String,
        file: String,
        source: SampleSetError,
    },
    #[display("no weights drawn yet; call draw() first")]
    NotReady,
    #[display("{_0}")]
    Context(ContextError),
    #[display("static source '{name}' failed: {source}")]
    StaticCallback { name: String, source: CallbackError },
    #[display("observable '{observable}' failed in iteration {iteration}: {source}")]
    Callback {
        observable: String,
        iteration: usize,
        source: CallbackError,
    },
    #[display("cannot accumulate observable '{observable}' in iteration {iteration}: {source}")]
    Accumulate {
        observable: String,
        iteration: usize,
        source: CollectorError,
    },
}

impl std::error::Error for BootstrapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::DuplicateSource(_)
            | Self::DuplicateStatic(_)
            | Self::DuplicateObservable(_)
            | Self::UnknownSource { .. }
            | Self::NoSources
            | Self::NoObservables
            | Self::FileCount { .. }
            | Self::NotReady => None,
            Self::InvalidEdges { reason: source, .. }
            | Self::StaticCallback { source, .. }
            | Self::Callback { source, .. } => Some(&**source),
            Self::Read { source, .. } => Some(source),
            Self::Population { source, .. } => Some(source),
            Self::Context(source) => Some(source),
            Self::Accumulate { source, .. } => Some(source),
        }
    }
}

impl Bootstrapper {
    /// Creates an engine over the files of `reader`, with a random resampling seed.
    pub fn new<R>(reader: R) -> Self
    where
        R: SourceReader + 'static,
    {
        let drawer = WeightDrawer::new(reader.file_count());
        Self::with_drawer(Box::new(reader), drawer)
    }

    /// Like [`Self::new`], but resampling deterministically from `seed`.
    pub fn with_seed<R>(reader: R, seed: ResampleSeed) -> Self
    where
        R: SourceReader + 'static,
    {
        let drawer = WeightDrawer::with_seed(reader.file_count(), seed);
        Self::with_drawer(Box::new(reader), drawer)
    }

    fn with_drawer(reader: Box<dyn SourceReader>, drawer: WeightDrawer) -> Self {
        Self {
            reader,
            drawer,
            current_weights: None,
            sources: BTreeMap::new(),
            statics: BTreeMap::new(),
            observables: vec![],
            observable_index: BTreeMap::new(),
            completed_iterations: 0,
        }
    }

    /// Number of input files.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.drawer.file_count()
    }

    /// Number of iterations accumulated so far, over all calls to [`bootstrap`](Self::bootstrap).
    #[must_use]
    pub fn completed_iterations(&self) -> usize {
        self.completed_iterations
    }

    /// Extracts the histogram at the dotted `path` from every file and registers it as `name`.
    ///
    /// Population is atomic: on any extraction or shape error nothing is registered.
    pub fn register_source(
        &mut self,
        name: impl Into<String>,
        path: impl Into<String>,
    ) -> Result<&SampleSet, BootstrapError> {
        let name = name.into();
        let path = path.into();
        if self.sources.contains_key(&name) {
            return Err(BootstrapError::DuplicateSource(name));
        }

        debug!(source = %name, %path, files = self.file_count(), "extracting source");
        let extracted = self
            .reader
            .read_all(&path)
            .map_err(|source| BootstrapError::Read {
                name: name.clone(),
                source,
            })?;
        if extracted.len() != self.file_count() {
            return Err(BootstrapError::FileCount {
                name,
                expected: self.file_count(),
                found: extracted.len(),
            });
        }

        let mut builder = SampleSetBuilder::new(name.clone(), path);
        for file in extracted {
            builder
                .push(file)
                .map_err(|source| self.population_error(&name, source))?;
        }
        let set = builder
            .finish()
            .map_err(|source| self.population_error(&name, source))?;
        info!(
            source = %name,
            path = set.path(),
            shape = ?set.shape(),
            files = set.file_count(),
            "registered source"
        );
        Ok(self.sources.entry(name).or_insert(set))
    }

    fn population_error(&self, name: &str, source: SampleSetError) -> BootstrapError {
        let file = match &source {
            SampleSetError::ShapeMismatch { file_index, .. } => self.reader.file_label(*file_index),
            SampleSetError::NoFiles | SampleSetError::WeightCount { .. } => "-".to_owned(),
        };
        BootstrapError::Population {
            name: name.to_owned(),
            file,
            source,
        }
    }

    /// Computes a value once from the unweighted ensemble and registers it as `name`.
    ///
    /// The callback runs immediately; it sees the populated sources and earlier static
    /// sources, never resampled weights.
    pub fn register_static_source<F>(
        &mut self,
        name: impl Into<String>,
        callback: F,
    ) -> Result<&ArrayD<f64>, BootstrapError>
    where
        F: FnOnce(&StaticContext<'_>) -> Result<ArrayD<f64>, CallbackError>,
    {
        let name = name.into();
        if self.statics.contains_key(&name) {
            return Err(BootstrapError::DuplicateStatic(name));
        }
        let value =
            callback(&self.static_context()).map_err(|source| BootstrapError::StaticCallback {
                name: name.clone(),
                source,
            })?;
        info!(static_source = %name, shape = ?value.shape(), "registered static source");
        Ok(self.statics.entry(name).or_insert(value))
    }

    /// Registers an observable accumulated with unit weight.
    ///
    /// Observables are evaluated in registration order, so `callback` may read any
    /// observable registered before it through [`IterationContext::observable`].
    pub fn register_observable<F>(
        &mut self,
        name: impl Into<String>,
        edges: impl Into<EdgesSpec>,
        callback: F,
    ) -> Result<(), BootstrapError>
    where
        F: Fn(&IterationContext<'_>) -> Result<ArrayD<f64>, CallbackError> + 'static,
    {
        self.register_weighted_observable(name, edges, callback, |_| Ok(Weight::Scalar(1.0)))
    }

    /// Registers an observable whose per-iteration results are accumulated with the weight
    /// returned by `weight`.
    pub fn register_weighted_observable<F, W>(
        &mut self,
        name: impl Into<String>,
        edges: impl Into<EdgesSpec>,
        callback: F,
        weight: W,
    ) -> Result<(), BootstrapError>
    where
        F: Fn(&IterationContext<'_>) -> Result<ArrayD<f64>, CallbackError> + 'static,
        W: Fn(&IterationContext<'_>) -> Result<Weight, CallbackError> + 'static,
    {
        let name = name.into();
        if self.observable_index.contains_key(&name) {
            return Err(BootstrapError::DuplicateObservable(name));
        }
        let edges = self.resolve_edges(&name, edges.into())?;

        debug!(observable = %name, position = self.observables.len(), "registered observable");
        self.observable_index
            .insert(name.clone(), self.observables.len());
        self.observables.push(Observable {
            name,
            edges,
            callback: Box::new(callback),
            weight: Box::new(weight),
            collector: Collector::new(),
        });
        Ok(())
    }

    fn resolve_edges(&self, observable: &str, spec: EdgesSpec) -> Result<Edges, BootstrapError> {
        let invalid = |reason: CallbackError| BootstrapError::InvalidEdges {
            observable: observable.to_owned(),
            reason,
        };
        let edges = match spec {
            EdgesSpec::Source(source_name) => match self.sources.get(&source_name) {
                Some(set) => set.edges().clone(),
                None => {
                    return Err(BootstrapError::UnknownSource {
                        observable: observable.to_owned(),
                        source_name,
                    });
                }
            },
            EdgesSpec::Explicit(edges) => edges,
            EdgesSpec::Computed(compute) => compute(&self.static_context()).map_err(invalid)?,
        };
        edges.validate().map_err(|e| invalid(Box::new(e)))?;
        Ok(edges)
    }

    fn static_context(&self) -> StaticContext<'_> {
        StaticContext {
            sources: &self.sources,
            statics: &self.statics,
        }
    }

    /// Draws a new set of bootstrap weights and makes it current.
    ///
    /// Only needed for hand-written loops over [`values`](Self::values);
    /// [`bootstrap`](Self::bootstrap) draws on its own.
    pub fn draw(&mut self) -> &DrawWeights {
        self.current_weights.insert(self.drawer.draw())
    }

    /// The most recently drawn weights.
    pub fn current_weights(&self) -> Result<&DrawWeights, BootstrapError> {
        self.current_weights
            .as_ref()
            .ok_or(BootstrapError::NotReady)
    }

    /// Resampled values of a source under the most recently drawn weights.
    pub fn values(&self, source: &str) -> Result<ArrayD<f64>, BootstrapError> {
        let weights = self.current_weights()?;
        let set = self.source(source).ok_or_else(|| {
            BootstrapError::Context(ContextError::UnknownSource(source.to_owned()))
        })?;
        set.values(weights).map_err(|err| {
            BootstrapError::Context(ContextError::Resample {
                name: source.to_owned(),
                source: err,
            })
        })
    }

    /// Runs `n_iterations` bootstrap iterations and returns every observable's collector.
    ///
    /// Collectors keep accumulating across calls.
    pub fn bootstrap(
        &mut self,
        n_iterations: usize,
    ) -> Result<BTreeMap<&str, &Collector>, BootstrapError> {
        if self.sources.is_empty() {
            return Err(BootstrapError::NoSources);
        }
        if self.observables.is_empty() {
            return Err(BootstrapError::NoObservables);
        }

        info!(
            iterations = n_iterations,
            files = self.file_count(),
            sources = self.sources.len(),
            observables = self.observables.len(),
            "starting bootstrap"
        );
        for _ in 0..n_iterations {
            let weights = self.drawer.draw();
            self.run_iteration(&weights)?;
            self.current_weights = Some(weights);
            self.completed_iterations += 1;
            if self.completed_iterations % PROGRESS_INTERVAL == 0 {
                debug!(completed = self.completed_iterations, "bootstrap progress");
            }
        }
        info!(completed = self.completed_iterations, "bootstrap finished");

        Ok(self.collectors())
    }

    fn run_iteration(&mut self, weights: &DrawWeights) -> Result<(), BootstrapError> {
        let iteration = self.completed_iterations;
        trace!(iteration, weights = ?weights.as_slice(), "iteration");

        let base = StaticContext {
            sources: &self.sources,
            statics: &self.statics,
        };
        let mut computed = Vec::with_capacity(self.observables.len());
        let mut computed_weights = Vec::with_capacity(self.observables.len());
        for observable in &self.observables {
            let ctx = IterationContext {
                iteration,
                weights,
                base,
                observable_index: &self.observable_index,
                computed: &computed,
            };
            let callback_error = |source| BootstrapError::Callback {
                observable: observable.name.clone(),
                iteration,
                source,
            };
            let value = (observable.callback)(&ctx).map_err(callback_error)?;
            let weight = (observable.weight)(&ctx).map_err(callback_error)?;
            computed.push(value);
            computed_weights.push(weight);
        }

        let accumulate_error = |observable: &Observable, source| BootstrapError::Accumulate {
            observable: observable.name.clone(),
            iteration,
            source,
        };
        for ((observable, value), weight) in self
            .observables
            .iter()
            .zip(&computed)
            .zip(&computed_weights)
        {
            observable
                .collector
                .validate(value, weight)
                .map_err(|source| accumulate_error(observable, source))?;
        }
        for ((observable, value), weight) in self
            .observables
            .iter_mut()
            .zip(&computed)
            .zip(&computed_weights)
        {
            observable
                .collector
                .add_weighted(value, weight)
                .map_err(|source| accumulate_error(observable, source))?;
        }
        Ok(())
    }

    /// Collectors of every observable, keyed by name.
    #[must_use]
    pub fn collectors(&self) -> BTreeMap<&str, &Collector> {
        self.observables
            .iter()
            .map(|o| (o.name.as_str(), &o.collector))
            .collect()
    }

    /// Collector of one observable.
    #[must_use]
    pub fn collector(&self, name: &str) -> Option<&Collector> {
        let &index = self.observable_index.get(name)?;
        Some(&self.observables[index].collector)
    }

    /// Observable names in registration (evaluation) order.
    pub fn observable_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.observables.iter().map(|o| o.name.as_str())
    }

    /// Edges an observable was registered with.
    #[must_use]
    pub fn observable_edges(&self, name: &str) -> Option<&Edges> {
        let &index = self.observable_index.get(name)?;
        Some(&self.observables[index].edges)
    }

    /// A registered source.
    #[must_use]
    pub fn source(&self, name: &str) -> Option<&SampleSet> {
        self.sources.get(name)
    }

    /// A registered static source.
    #[must_use]
    pub fn static_value(&self, name: &str) -> Option<&ArrayD<f64>> {
        self.statics.get(name)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{IxDyn, arr1};

    use super::*;
    use crate::{Extracted, reader::MemoryReader};

    fn reader(contents: &[f64]) -> MemoryReader {
        let mut reader = MemoryReader::new();
        for &content in contents {
            reader.push_file([(
                "dir.hist".to_owned(),
                Extracted::new(
                    arr1(&[content, content * 2.0]).into_dyn(),
                    Edges::from_shape(&[2]),
                ),
            )]);
        }
        reader
    }

    fn engine() -> Bootstrapper {
        let mut bs = Bootstrapper::with_seed(reader(&[1.0, 2.0, 3.0]), ResampleSeed::from_u128(7));
        bs.register_source("hist", "dir.hist").unwrap();
        bs
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let mut bs = engine();
        assert!(matches!(
            bs.register_source("hist", "dir.hist"),
            Err(BootstrapError::DuplicateSource(name)) if name == "hist"
        ));

        bs.register_static_source("total", |ctx| Ok(ctx.integrated_sample("hist")?))
            .unwrap();
        assert!(matches!(
            bs.register_static_source("total", |ctx| Ok(ctx.integrated_sample("hist")?)),
            Err(BootstrapError::DuplicateStatic(_))
        ));

        bs.register_observable("obs", EdgesSpec::source("hist"), |ctx| {
            Ok(ctx.values("hist")?)
        })
        .unwrap();
        assert!(matches!(
            bs.register_observable("obs", EdgesSpec::source("hist"), |ctx| Ok(
                ctx.values("hist")?
            )),
            Err(BootstrapError::DuplicateObservable(_))
        ));
    }

    #[test]
    fn test_missing_path_does_not_register() {
        let mut bs = engine();
        let err = bs.register_source("other", "dir.missing").unwrap_err();
        assert!(matches!(err, BootstrapError::Read { .. }));
        assert!(err.to_string().contains("dir.missing"));
        assert!(bs.source("other").is_none());
    }

    #[test]
    fn test_shape_mismatch_does_not_register() {
        let mut reader = reader(&[1.0, 2.0]);
        reader.push_file([(
            "dir.hist".to_owned(),
            Extracted::new(arr1(&[1.0]).into_dyn(), Edges::from_shape(&[1])),
        )]);
        let mut bs = Bootstrapper::new(reader);
        let err = bs.register_source("hist", "dir.hist").unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::Population {
                source: SampleSetError::ShapeMismatch { file_index: 2, .. },
                ..
            }
        ));
        assert!(bs.source("hist").is_none());
    }

    #[test]
    fn test_edges_resolution() {
        let mut bs = engine();
        assert!(matches!(
            bs.register_observable("a", EdgesSpec::source("nope"), |ctx| Ok(ctx.values("hist")?)),
            Err(BootstrapError::UnknownSource { source_name, .. }) if source_name == "nope"
        ));
        assert!(matches!(
            bs.register_observable("b", Edges::new(vec![vec![0.0]]), |ctx| Ok(
                ctx.values("hist")?
            )),
            Err(BootstrapError::InvalidEdges { .. })
        ));
        assert!(matches!(
            bs.register_observable(
                "c",
                EdgesSpec::computed(|_| Err("no binning".into())),
                |ctx| Ok(ctx.values("hist")?)
            ),
            Err(BootstrapError::InvalidEdges { .. })
        ));

        bs.register_observable(
            "d",
            EdgesSpec::computed(|ctx| Ok(ctx.edges("hist")?.clone())),
            |ctx| Ok(ctx.values("hist")?),
        )
        .unwrap();
        assert_eq!(bs.observable_edges("d"), Some(&Edges::from_shape(&[2])));
        assert_eq!(bs.observable_names().collect::<Vec<_>>(), ["d"]);
    }

    #[test]
    fn test_static_source_sees_unweighted_ensemble() {
        let mut bs = engine();
        let total = bs
            .register_static_source("total", |ctx| Ok(ctx.integrated_sample("hist")?))
            .unwrap();
        assert_eq!(total, &arr1(&[6.0, 12.0]).into_dyn());

        let doubled = bs
            .register_static_source("doubled", |ctx| Ok(ctx.static_value("total")? * 2.0))
            .unwrap();
        assert_eq!(doubled, &arr1(&[12.0, 24.0]).into_dyn());

        let err = bs
            .register_static_source("bad", |ctx| Ok(ctx.static_value("missing")?.clone()))
            .unwrap_err();
        assert!(matches!(err, BootstrapError::StaticCallback { .. }));
        assert!(bs.static_value("bad").is_none());
    }

    #[test]
    fn test_bootstrap_requires_configuration() {
        let mut bs = Bootstrapper::new(reader(&[1.0]));
        assert!(matches!(bs.bootstrap(1), Err(BootstrapError::NoSources)));
        bs.register_source("hist", "dir.hist").unwrap();
        assert!(matches!(
            bs.bootstrap(1),
            Err(BootstrapError::NoObservables)
        ));
    }

    #[test]
    fn test_values_before_draw_is_not_ready() {
        let mut bs = engine();
        assert!(matches!(bs.values("hist"), Err(BootstrapError::NotReady)));
        assert!(matches!(
            bs.current_weights(),
            Err(BootstrapError::NotReady)
        ));

        let weights = bs.draw().clone();
        assert_eq!(weights.total(), 3);
        let set = bs.source("hist").unwrap();
        let expected = (0..3).fold(ArrayD::<f64>::zeros(IxDyn(&[2])), |acc, i| {
            acc + set.file(i).unwrap().to_owned() * f64::from(weights.as_slice()[i])
        });
        assert_eq!(bs.values("hist").unwrap(), expected);
        assert!(matches!(
            bs.values("missing"),
            Err(BootstrapError::Context(ContextError::UnknownSource(_)))
        ));
    }

    #[test]
    fn test_later_observable_sees_same_iteration_value() {
        let mut bs = engine();
        bs.register_observable(
            "a",
            EdgesSpec::source("hist"),
            |ctx| Ok(ctx.values("hist")?),
        )
        .unwrap();
        bs.register_observable("diff", EdgesSpec::source("hist"), |ctx| {
            Ok(ctx.values("hist")? - ctx.observable("a")?)
        })
        .unwrap();

        let collectors = bs.bootstrap(50).unwrap();
        let diff = collectors["diff"];
        assert_eq!(diff.mean().unwrap(), arr1(&[0.0, 0.0]).into_dyn());
        assert_eq!(diff.sigma().unwrap(), arr1(&[0.0, 0.0]).into_dyn());
        assert_eq!(bs.completed_iterations(), 50);
    }

    #[test]
    fn test_reading_later_observable_fails() {
        let mut bs = engine();
        bs.register_observable("early", EdgesSpec::source("hist"), |ctx| {
            Ok(ctx.observable("late")?.clone())
        })
        .unwrap();
        bs.register_observable("late", EdgesSpec::source("hist"), |ctx| {
            Ok(ctx.values("hist")?)
        })
        .unwrap();

        let err = bs.bootstrap(1).unwrap_err();
        assert!(matches!(
            &err,
            BootstrapError::Callback { observable, iteration: 0, .. } if observable == "early"
        ));
        assert!(bs.collector("late").unwrap().mean().is_none());
    }

    #[test]
    fn test_failing_iteration_leaves_collectors_untouched() {
        let mut bs = engine();
        bs.register_observable("ok", EdgesSpec::source("hist"), |ctx| {
            Ok(ctx.values("hist")?)
        })
        .unwrap();
        bs.register_observable("flaky", EdgesSpec::source("hist"), |ctx| {
            if ctx.iteration() == 3 {
                return Err("iteration 3 is cursed".into());
            }
            Ok(ctx.values("hist")?)
        })
        .unwrap();

        let err = bs.bootstrap(10).unwrap_err();
        assert!(matches!(err, BootstrapError::Callback { iteration: 3, .. }));
        assert_eq!(bs.completed_iterations(), 3);

        let ok = bs.collector("ok").unwrap();
        assert_eq!(ok.count().unwrap(), &arr1(&[3.0, 3.0]).into_dyn());
        let flaky = bs.collector("flaky").unwrap();
        assert_eq!(flaky.count().unwrap(), &arr1(&[3.0, 3.0]).into_dyn());
    }

    #[test]
    fn test_failing_weight_leaves_collectors_untouched() {
        let mut bs = engine();
        bs.register_observable("first", EdgesSpec::source("hist"), |ctx| {
            Ok(ctx.values("hist")?)
        })
        .unwrap();
        bs.register_weighted_observable(
            "weighted",
            EdgesSpec::source("hist"),
            |ctx| Ok(ctx.values("hist")?),
            |ctx| {
                if ctx.iteration() == 2 {
                    return Err("no weight for iteration 2".into());
                }
                Ok(Weight::Scalar(1.0))
            },
        )
        .unwrap();

        let err = bs.bootstrap(5).unwrap_err();
        assert!(matches!(
            &err,
            BootstrapError::Callback { observable, iteration: 2, .. } if observable == "weighted"
        ));
        assert_eq!(bs.completed_iterations(), 2);
        for name in ["first", "weighted"] {
            assert_eq!(
                bs.collector(name).unwrap().count().unwrap(),
                &arr1(&[2.0, 2.0]).into_dyn()
            );
        }
    }

    #[test]
    fn test_shape_change_aborts_before_commit() {
        let mut bs = engine();
        bs.register_observable("first", EdgesSpec::source("hist"), |ctx| {
            Ok(ctx.values("hist")?)
        })
        .unwrap();
        bs.register_observable("growing", Edges::from_shape(&[1]), |ctx| {
            let len = if ctx.iteration() == 0 { 1 } else { 2 };
            Ok(ArrayD::zeros(IxDyn(&[len])))
        })
        .unwrap();

        let err = bs.bootstrap(2).unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::Accumulate { iteration: 1, .. }
        ));
        let first = bs.collector("first").unwrap();
        assert_eq!(first.count().unwrap(), &arr1(&[1.0, 1.0]).into_dyn());
    }

    #[test]
    fn test_weighted_observable() {
        let mut bs = engine();
        bs.register_weighted_observable(
            "weighted",
            EdgesSpec::source("hist"),
            |_| Ok(arr1(&[1.0, 2.0]).into_dyn()),
            |_| Ok(Weight::Scalar(0.5)),
        )
        .unwrap();
        let collectors = bs.bootstrap(4).unwrap();
        assert_eq!(
            collectors["weighted"].count().unwrap(),
            &arr1(&[2.0, 2.0]).into_dyn()
        );
        assert_eq!(
            collectors["weighted"].mean().unwrap(),
            arr1(&[1.0, 2.0]).into_dyn()
        );
    }

    #[test]
    fn test_collectors_keep_accumulating() {
        let mut bs = engine();
        bs.register_observable("obs", EdgesSpec::source("hist"), |ctx| {
            Ok(ctx.values("hist")?)
        })
        .unwrap();
        bs.bootstrap(5).unwrap();
        bs.bootstrap(7).unwrap();
        assert_eq!(bs.completed_iterations(), 12);
        assert_eq!(
            bs.collector("obs").unwrap().count().unwrap(),
            &arr1(&[12.0, 12.0]).into_dyn()
        );
        assert_eq!(bs.current_weights().unwrap().total(), 3);
    }

    #[test]
    fn test_same_seed_same_result() {
        let run = || {
            let mut bs = engine();
            bs.register_observable("obs", EdgesSpec::source("hist"), |ctx| {
                Ok(ctx.values("hist")?)
            })
            .unwrap();
            bs.bootstrap(20).unwrap();
            bs.collector("obs").unwrap().summary().unwrap()
        };
        let (a, b) = (run(), run());
        assert_eq!(a.mean, b.mean);
        assert_eq!(a.sigma, b.sigma);
    }
}
