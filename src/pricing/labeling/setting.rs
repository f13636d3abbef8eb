use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use anyhow::Result;
use log::debug;
use took::Timer;

use crate::pricing::labeling::{
    extend_resources, Label, LabelArena, LabelId, Resources, VertexLabels,
};
use crate::pricing::{
    DualPrices, PricingContext, PricingProblem, PruneReason, SearchStats,
};
use crate::problem::matrix::SquareMatrix;
use crate::problem::vrptw::VrptwInstance;
use crate::solution::Path;

/// Frontier ordering: lexicographically minimal `(cost, time, demand)` pops
/// first.
#[derive(Debug, Clone, Copy)]
struct FrontierKey {
    cost: f64,
    time: f64,
    demand: f64,
}

impl FrontierKey {
    fn of(resources: &Resources) -> Self {
        Self {
            cost: resources.cost,
            time: resources.time,
            demand: resources.demand,
        }
    }
}

impl PartialEq for FrontierKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrontierKey {}

impl PartialOrd for FrontierKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrontierKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cost
            .total_cmp(&other.cost)
            .then_with(|| self.time.total_cmp(&other.time))
            .then_with(|| self.demand.total_cmp(&other.demand))
    }
}

/// Label-setting search for the relaxed SPPTWCC: dominance is vertex-local
/// and revisits are allowed, so the result is exact for the non-elementary
/// problem and a valid lower bound for the elementary one.
pub struct SpptwccLabelSetting<'a> {
    instance: &'a VrptwInstance,
    arena: LabelArena<()>,
    labels: VertexLabels,
    frontier: BinaryHeap<Reverse<(FrontierKey, LabelId)>>,
    /// lazy frontier deletion: retired entries are skipped on pop
    retired: Vec<bool>,
    paths: Vec<Path>,
    revised_cost: Option<f64>,
    stats: SearchStats,
}

impl<'a> SpptwccLabelSetting<'a> {
    pub fn new(instance: &'a VrptwInstance) -> Self {
        Self {
            instance,
            arena: LabelArena::new(),
            labels: VertexLabels::with_num_vertices(instance.num_vertices()),
            frontier: BinaryHeap::new(),
            retired: vec![],
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
        self.frontier.clear();
        self.retired.clear();
        self.paths.clear();
        self.revised_cost = None;
        self.stats = SearchStats::default();
    }

    fn new_label(&mut self, label: Label<()>) -> LabelId {
        let id = self.arena.push(label);
        self.retired.push(false);
        id
    }

    fn finalize(&mut self, ctx: &PricingContext) {
        let end = ctx.end_vertex();
        let mut tied: Vec<LabelId> = self.labels.at(end).to_vec();
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

impl PricingProblem for SpptwccLabelSetting<'_> {
    fn solve(&mut self, duals: &DualPrices, travel_times: &SquareMatrix<f64>) -> Result<()> {
        let timer = Timer::new();
        let ctx = PricingContext::new(self.instance, duals, travel_times)?;
        self.reset();

        let end = ctx.end_vertex();
        let root = self.new_label(Label {
            resources: Resources::zero(),
            vertex: ctx.start_vertex(),
            pred: None,
            state: (),
        });
        self.labels.insert(&self.arena, end, root);
        self.frontier.push(Reverse((
            FrontierKey::of(&self.arena.get(root).resources),
            root,
        )));

        while let Some(Reverse((_, id))) = self.frontier.pop() {
            if self.retired[id.index()] {
                continue;
            }
            let (vertex, resources) = {
                let label = self.arena.get(id);
                (label.vertex, label.resources)
            };

            for next in 0..ctx.num_vertices() {
                if next == vertex {
                    continue;
                }
                let Some(extended) = extend_resources(&ctx, &resources, vertex, next) else {
                    self.stats.record(PruneReason::Infeasible);
                    continue;
                };
                let candidate = self.new_label(Label {
                    resources: extended,
                    vertex: next,
                    pred: Some(id),
                    state: (),
                });
                self.stats.labels_created += 1;

                let outcome = self.labels.insert(&self.arena, end, candidate);
                for removed in &outcome.removed {
                    self.retired[removed.index()] = true;
                }
                if !outcome.inserted {
                    self.stats.record(PruneReason::Dominated);
                    continue;
                }
                // labels at the end depot are final, never extended again
                if next != end {
                    self.frontier.push(Reverse((FrontierKey::of(&extended), candidate)));
                }
            }
        }

        self.finalize(&ctx);
        debug!(
            "label-setting: cost {:?}, {} tied paths, arena {} ({}), took {}",
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
