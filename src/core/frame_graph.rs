//! Dependency-driven pass scheduler executing hazard-free layers in parallel.
//!
//! Passes declare read/write access to resource categories (arbitrary
//! `'static` marker types). Execution order is derived from the declared
//! access sets: a layer contains passes with no data hazards among them and
//! is dispatched onto the task scheduler as a whole; the graph blocks until
//! the layer drains before releasing the next one. That inter-layer barrier
//! is the only place the frame graph blocks.

use std::any::TypeId;
use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::core::error::GraphError;
use crate::core::task_scheduler::TaskScheduler;
use crate::util::latch::CountdownLatch;

/// Resource-category token: type identity plus a readable name for
/// diagnostics.
#[derive(Clone, Copy)]
struct AccessToken {
    id: TypeId,
    #[allow(dead_code)]
    name: &'static str,
}

/// Collects a pass's declared read and write sets.
///
/// Categories are plain Rust types; declaring `read::<Lights>()` and
/// `write::<Lights>()` in different passes creates an ordering edge between
/// them.
#[derive(Default)]
pub struct PassBuilder {
    reads: Vec<AccessToken>,
    writes: Vec<AccessToken>,
}

impl PassBuilder {
    /// Declare that the pass reads category `C`.
    pub fn read<C: 'static>(&mut self) -> &mut Self {
        self.reads.push(AccessToken {
            id: TypeId::of::<C>(),
            name: std::any::type_name::<C>(),
        });
        self
    }

    /// Declare that the pass writes category `C`, owning it exclusively for
    /// the pass's duration.
    pub fn write<C: 'static>(&mut self) -> &mut Self {
        self.writes.push(AccessToken {
            id: TypeId::of::<C>(),
            name: std::any::type_name::<C>(),
        });
        self
    }
}

/// A registered pass: name, declared access sets, and the work to run.
struct PassNode {
    name: String,
    reads: Vec<AccessToken>,
    writes: Vec<AccessToken>,
    execute: Box<dyn FnOnce() + Send + 'static>,
}

impl PassNode {
    /// Whether `self` must complete before `later` may start, given that
    /// `self` was declared first. Any write on either side of a shared
    /// category is a hazard; read-read sharing is not.
    fn conflicts_with(&self, later: &Self) -> bool {
        let writes_shared = self.writes.iter().any(|token| {
            later.reads.iter().any(|other| other.id == token.id)
                || later.writes.iter().any(|other| other.id == token.id)
        });
        if writes_shared {
            return true;
        }
        self.reads
            .iter()
            .any(|token| later.writes.iter().any(|other| other.id == token.id))
    }
}

/// Summary of one executed frame graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGraphReport {
    /// Number of passes executed.
    pub pass_count: usize,
    /// Number of sequential layers the passes were grouped into.
    pub layer_count: usize,
}

/// Per-frame set of declared passes, executed in dependency layers.
#[derive(Default)]
pub struct FrameGraph {
    passes: Vec<PassNode>,
}

impl FrameGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pass.
    ///
    /// `declare` is invoked once, synchronously, to populate the pass's
    /// read/write sets; it must have no side effects beyond that. `execute`
    /// runs later, possibly concurrently with other passes of the same
    /// layer, and must treat its declared write categories as exclusively
    /// owned for its duration.
    pub fn add_pass<D, E>(&mut self, name: &str, declare: D, execute: E)
    where
        D: FnOnce(&mut PassBuilder),
        E: FnOnce() + Send + 'static,
    {
        let mut builder = PassBuilder::default();
        declare(&mut builder);
        trace!(
            pass = name,
            reads = builder.reads.len(),
            writes = builder.writes.len(),
            "pass registered"
        );
        self.passes.push(PassNode {
            name: name.to_owned(),
            reads: builder.reads,
            writes: builder.writes,
            execute: Box::new(execute),
        });
    }

    /// Number of registered passes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Whether no passes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Execute all registered passes on `scheduler`, layer by layer,
    /// consuming them. Each layer is fully drained before the next starts;
    /// passes within a layer may run in any order, including concurrently.
    ///
    /// # Errors
    ///
    /// - [`GraphError::Cycle`] if the declared access sets cannot be
    ///   ordered; reported before any pass executes
    /// - [`GraphError::Scheduler`] if dispatching a pass fails; the current
    ///   layer is drained before the error is returned and the remaining
    ///   passes are discarded
    pub fn execute(&mut self, scheduler: &TaskScheduler) -> Result<FrameGraphReport, GraphError> {
        let layers = self.build_layers()?;
        let passes = std::mem::take(&mut self.passes);
        let pass_count = passes.len();
        let layer_count = layers.len();

        let mut executes: Vec<Option<Box<dyn FnOnce() + Send + 'static>>> = passes
            .into_iter()
            .map(|pass| {
                trace!(pass = %pass.name, "pass ready");
                Some(pass.execute)
            })
            .collect();

        for (layer_index, layer) in layers.into_iter().enumerate() {
            debug!(layer = layer_index, passes = layer.len(), "releasing layer");
            let latch = Arc::new(CountdownLatch::new(layer.len()));

            let mut dispatch_error = None;
            for (slot, &pass_index) in layer.iter().enumerate() {
                let execute = executes[pass_index]
                    .take()
                    .unwrap_or_else(|| Box::new(|| {}));
                let guard_source = Arc::clone(&latch);
                let result = scheduler.dispatch(move || {
                    let _guard = guard_source.guard();
                    execute();
                });
                if let Err(error) = result {
                    // Release the slots that will never run so the barrier
                    // still drains, then surface the failure.
                    for _ in slot..layer.len() {
                        latch.count_down();
                    }
                    dispatch_error = Some(error);
                    break;
                }
            }

            latch.wait();
            if let Some(error) = dispatch_error {
                return Err(GraphError::Scheduler(error));
            }
        }

        debug!(pass_count, layer_count, "frame graph executed");
        Ok(FrameGraphReport {
            pass_count,
            layer_count,
        })
    }

    /// Group pass indices into topological layers with Kahn's algorithm.
    ///
    /// An edge `P → Q` exists iff `P` was declared before `Q` and the two
    /// conflict on some category (see [`PassNode::conflicts_with`]). Layer 0
    /// holds passes with no incoming edges — including passes that declare
    /// no access at all; each subsequent layer holds passes whose
    /// dependencies all live in strictly earlier layers.
    fn build_layers(&self) -> Result<Vec<Vec<usize>>, GraphError> {
        let count = self.passes.len();
        let mut edges: Vec<Vec<usize>> = vec![Vec::new(); count];
        let mut in_degree = vec![0_usize; count];

        for later in 0..count {
            for earlier in 0..later {
                if self.passes[earlier].conflicts_with(&self.passes[later]) {
                    edges[earlier].push(later);
                    in_degree[later] += 1;
                }
            }
        }

        let mut queue: VecDeque<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
        let mut layer_of = vec![0_usize; count];
        let mut visited = 0;

        while let Some(node) = queue.pop_front() {
            visited += 1;
            for &next in &edges[node] {
                if layer_of[next] <= layer_of[node] {
                    layer_of[next] = layer_of[node] + 1;
                }
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        if visited != count {
            let unordered = (0..count)
                .filter(|&i| in_degree[i] > 0)
                .map(|i| self.passes[i].name.clone())
                .collect();
            return Err(GraphError::Cycle(unordered));
        }

        let layer_count = layer_of.iter().max().map_or(0, |&depth| depth + 1);
        let mut layers = vec![Vec::new(); layer_count];
        for (index, &layer) in layer_of.iter().enumerate() {
            layers[layer].push(index);
        }
        Ok(layers)
    }
}
