//! Bootstrap results written back as a container.

use rootstrap_engine::{Collector, Edges};
use tracing::warn;

use crate::container::{Container, Histogram, WriteError};

/// Builds a container holding `<name>.mean` and `<name>.sigma` for every observable.
///
/// Observables that never accumulated anything are skipped. When the registered
/// edges do not fit the accumulated shape, index edges are written instead.
pub fn export<'a, I>(observables: I) -> Result<Container, WriteError>
where
    I: IntoIterator<Item = (&'a str, &'a Edges, &'a Collector)>,
{
    let mut container = Container::new();
    for (name, edges, collector) in observables {
        let Some(summary) = collector.summary() else {
            warn!(observable = name, "no accumulated results, not exported");
            continue;
        };
        for (suffix, values) in [("mean", summary.mean), ("sigma", summary.sigma)] {
            let path = format!("{name}.{suffix}");
            let histogram = Histogram::new(&values, edges.clone()).or_else(|_| {
                warn!(
                    observable = name,
                    "edges do not match the result shape, using index edges"
                );
                Histogram::new(&values, Edges::from_shape(values.shape()))
            });
            let histogram = histogram.map_err(|source| WriteError::Histogram {
                path: path.clone(),
                source,
            })?;
            container.insert(&path, histogram)?;
        }
    }
    Ok(container)
}
