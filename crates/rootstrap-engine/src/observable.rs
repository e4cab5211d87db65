use std::fmt;

use ndarray::ArrayD;
use rootstrap_stats::{collector::Collector, numeric::Weight};

use crate::{CallbackError, Edges, context::IterationContext};

pub(crate) type ObservableFn =
    Box<dyn Fn(&IterationContext<'_>) -> Result<ArrayD<f64>, CallbackError>>;
pub(crate) type WeightFn = Box<dyn Fn(&IterationContext<'_>) -> Result<Weight, CallbackError>>;

/// A registered observable: its callbacks and the collector its results feed.
pub(crate) struct Observable {
    pub(crate) name: String,
    pub(crate) edges: Edges,
    pub(crate) callback: ObservableFn,
    pub(crate) weight: WeightFn,
    pub(crate) collector: Collector,
}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("name", &self.name)
            .field("edges", &self.edges)
            .field("collector", &self.collector)
            .finish_non_exhaustive()
    }
}
