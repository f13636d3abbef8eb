use std::collections::VecDeque;

use anyhow::Result;
use fixedbitset::FixedBitSet;
use log::debug;
use took::Timer;

use crate::pricing::labeling::{
    extend_resources, Label, LabelArena, LabelState, Reachability, Resources, VertexLabels,
};
use crate::pricing::{
    DualPrices, PricingContext, PricingProblem, PruneReason, SearchStats,
};
use crate::problem::matrix::SquareMatrix;
use crate::problem::vrptw::VrptwInstance;
use crate::solution::Path;

/// Label-correcting search for the elementary ESPPTWCC. Each label carries
/// the set of vertices it can no longer visit, which is not a function of
/// the resource totals alone, so finalization is not monotone: whenever a
/// vertex's label set changes the vertex goes back on a FIFO queue and is
/// re-expanded until the whole system is quiescent.
pub struct EspptwccLabelCorrecting<'a> {
    instance: &'a VrptwInstance,
    arena: LabelArena<Reachability>,
    labels: VertexLabels,
    queue: VecDeque<usize>,
    on_queue: FixedBitSet,
    paths: Vec<Path>,
    revised_cost: Option<f64>,
    stats: SearchStats,
}

impl<'a> EspptwccLabelCorrecting<'a> {
    pub fn new(instance: &'a VrptwInstance) -> Self {
        Self {
            instance,
            arena: LabelArena::new(),
            labels: VertexLabels::with_num_vertices(instance.num_vertices()),
            queue: VecDeque::new(),
            on_queue: FixedBitSet::with_capacity(instance.num_vertices()),
            paths: vec![],
            revised_cost: None,
            stats: SearchStats::default(),
        }
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    fn reset(&mut self) {
        self.arena.clear();
        self.labels.clear();
        self.queue.clear();
        self.on_queue.clear();
        self.paths.clear();
        self.revised_cost = None;
        self.stats = SearchStats::default();
    }

    fn enqueue(&mut self, vertex: usize) {
        if !self.on_queue.contains(vertex) {
            self.on_queue.insert(vertex);
            self.queue.push_back(vertex);
        }
    }

    fn finalize(&mut self, ctx: &PricingContext) {
        let end = ctx.end_vertex();
        let mut tied = self.labels.at(end).to_vec();
        tied.sort_by(|a, b| {
            self.arena
                .get(*a)
                .resources
                .cost
                .total_cmp(&self.arena.get(*b).resources.cost)
        });
        self.revised_cost = tied.first().map(|id| self.arena.get(*id).resources.cost);
        self.paths = tied
            .iter()
            .map(|id| Path::from_vertex_sequence(self.instance, self.arena.route_to(*id)))
            .collect();
    }
}

impl PricingProblem for EspptwccLabelCorrecting<'_> {
    fn solve(&mut self, duals: &DualPrices, travel_times: &SquareMatrix<f64>) -> Result<()> {
        let timer = Timer::new();
        let ctx = PricingContext::new(self.instance, duals, travel_times)?;
        self.reset();

        let end = ctx.end_vertex();
        let resources = Resources::zero();
        let root = self.arena.push(Label {
            resources,
            vertex: ctx.start_vertex(),
            pred: None,
            state: Reachability::root(&ctx, &resources),
        });
        self.labels.insert(&self.arena, end, root);
        self.enqueue(ctx.start_vertex());

        while let Some(vertex) = self.queue.pop_front() {
            self.on_queue.set(vertex, false);
            // lists of other vertices may change below, this one cannot
            let snapshot = self.labels.at(vertex).to_vec();

            for next in 0..ctx.num_vertices() {
                if !ctx.usable_arc(vertex, next) {
                    continue;
                }
                let mut changed = false;
                for &id in &snapshot {
                    let label = self.arena.get(id);
                    if !label.state.may_visit(next) {
                        self.stats.record(PruneReason::Infeasible);
                        continue;
                    }
                    let Some(extended) = extend_resources(&ctx, &label.resources, vertex, next)
                    else {
                        self.stats.record(PruneReason::Infeasible);
                        continue;
                    };
                    let state = Reachability::extended(&ctx, &label.state, &extended, next);
                    let candidate = self.arena.push(Label {
                        resources: extended,
                        vertex: next,
                        pred: Some(id),
                        state,
                    });
                    self.stats.labels_created += 1;

                    let outcome = self.labels.insert(&self.arena, end, candidate);
                    if !outcome.inserted {
                        self.stats.record(PruneReason::Dominated);
                    }
                    changed |= outcome.changed_list();
                }
                if changed {
                    self.enqueue(next);
                }
            }
        }

        self.finalize(&ctx);
        debug!(
            "label-correcting: cost {:?}, {} tied paths, arena {} ({}), took {}",
            self.revised_cost,
            self.paths.len(),
            self.arena.len(),
            self.stats,
            timer.took(),
        );
        Ok(())
    }

    fn shortest_paths(&self) -> &[Path] {
        &self.paths
    }

    fn revised_cost_of_shortest_path(&self) -> Option<f64> {
        self.revised_cost
    }
}
