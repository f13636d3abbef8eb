use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread;

use anyhow::Result;
use fixedbitset::FixedBitSet;
use log::debug;
use serde::Deserialize;
use took::Timer;

use crate::pricing::{
    DualPrices, PricingContext, PricingProblem, PruneReason, SearchStats,
};
use crate::problem::matrix::SquareMatrix;
use crate::problem::vrptw::VrptwInstance;
use crate::solution::Path;

mod bounds;

use bounds::{compute_bounds, rollback, Bounds};

/// Tunables of the pulse algorithm. The bucket width and the lower time
/// limit only affect pruning strength, never correctness; the worker count
/// bounds the number of depot subtrees explored concurrently.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PulseParams {
    pub time_step: f64,
    pub time_limit_lb: f64,
    pub workers: usize,
}

impl Default for PulseParams {
    fn default() -> Self {
        Self {
            time_step: 4.0,
            time_limit_lb: 100.0,
            workers: 8,
        }
    }
}

/// Depth-first pulse search for the elementary ESPPTWCC: a backward bounding
/// phase fills a per-vertex, per-time-bucket lower-bound table, then a
/// forward pulse from the depot explores with bound, rollback, and cycle
/// pruning. The depot's direct children are explored on a small worker pool.
pub struct EspptwccPulse<'a> {
    instance: &'a VrptwInstance,
    params: PulseParams,
    paths: Vec<Path>,
    revised_cost: Option<f64>,
    stats: SearchStats,
}

impl<'a> EspptwccPulse<'a> {
    pub fn new(instance: &'a VrptwInstance) -> Self {
        Self::with_params(instance, PulseParams::default())
    }

    pub fn with_params(instance: &'a VrptwInstance, params: PulseParams) -> Self {
        Self {
            instance,
            params,
            paths: vec![],
            revised_cost: None,
            stats: SearchStats::default(),
        }
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    fn reset(&mut self) {
        self.paths.clear();
        self.revised_cost = None;
        self.stats = SearchStats::default();
    }
}

impl PricingProblem for EspptwccPulse<'_> {
    fn solve(&mut self, duals: &DualPrices, travel_times: &SquareMatrix<f64>) -> Result<()> {
        let timer = Timer::new();
        let ctx = PricingContext::new(self.instance, duals, travel_times)?;
        self.reset();

        let bounds = compute_bounds(&ctx, &self.params, &mut self.stats);
        let incumbent = Incumbent::new();
        forward_search(
            &ctx,
            &bounds,
            &incumbent,
            self.params.workers.max(1),
            &mut self.stats,
        );

        let (best_cost, routes) = incumbent.into_result();
        if best_cost.is_finite() {
            self.revised_cost = Some(best_cost);
            self.paths = routes
                .into_iter()
                .map(|route| Path::from_vertex_sequence(self.instance, route))
                .collect();
        }

        debug!(
            "pulse: cost {:?}, {} tied paths ({}), took {}",
            self.revised_cost,
            self.paths.len(),
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

/// Best-known full path set, shared across workers. The cost snapshot is a
/// plain atomic so bound checks stay lock-free; all updates happen under the
/// mutex, and a stale snapshot can only weaken pruning, never correctness.
struct Incumbent {
    cost_bits: AtomicU64,
    tied: Mutex<TiedRoutes>,
}

struct TiedRoutes {
    cost: f64,
    routes: Vec<Vec<usize>>,
}

impl Incumbent {
    fn new() -> Self {
        Self {
            cost_bits: AtomicU64::new(f64::INFINITY.to_bits()),
            tied: Mutex::new(TiedRoutes {
                cost: f64::INFINITY,
                routes: vec![],
            }),
        }
    }

    #[inline(always)]
    fn best_cost(&self) -> f64 {
        f64::from_bits(self.cost_bits.load(Ordering::Relaxed))
    }

    /// Strictly better replaces the tied set, equal cost appends.
    fn offer(&self, cost: f64, route: Vec<usize>) {
        let mut tied = self.tied.lock().unwrap();
        if cost < tied.cost {
            tied.cost = cost;
            tied.routes.clear();
            tied.routes.push(route);
            self.cost_bits.store(cost.to_bits(), Ordering::Relaxed);
        } else if cost == tied.cost && tied.cost.is_finite() {
            tied.routes.push(route);
        }
    }

    fn into_result(self) -> (f64, Vec<Vec<usize>>) {
        let tied = self.tied.into_inner().unwrap();
        (tied.cost, tied.routes)
    }
}

/// Explores the depot's direct children, handing each feasible subtree to a
/// worker thread. At most `workers` subtrees run at once; when the pool is
/// full the oldest dispatch is joined first, and every worker is joined
/// before returning.
fn forward_search(
    ctx: &PricingContext,
    bounds: &Bounds,
    incumbent: &Incumbent,
    workers: usize,
    stats: &mut SearchStats,
) {
    let start = ctx.start_vertex();
    let end = ctx.end_vertex();
    let depart = ctx.vertex(start).time_window.earliest;

    thread::scope(|scope| {
        let mut pool: VecDeque<thread::ScopedJoinHandle<SearchStats>> = VecDeque::new();

        for next in 1..ctx.num_vertices() {
            if !ctx.usable_arc(start, next) {
                continue;
            }
            let cost = ctx.revised_cost(start, next);
            let demand = ctx.vertex(next).demand;
            let time = ctx.arrival_time(start, next, depart);
            if demand > ctx.capacity() || time > ctx.vertex(next).time_window.latest {
                stats.record(PruneReason::Infeasible);
                continue;
            }
            if next == end {
                // the empty tour, feasible whenever the duplicate-depot arc is
                incumbent.offer(cost, vec![start, end]);
                continue;
            }

            if pool.len() == workers {
                let oldest = pool.pop_front().expect("pool is non-empty");
                stats.merge(&oldest.join().expect("pulse worker panicked"));
            }
            let handle = scope.spawn(move || {
                let mut worker = PulseWorker {
                    ctx,
                    bounds,
                    incumbent,
                    visited: FixedBitSet::with_capacity(ctx.num_vertices()),
                    path: vec![start],
                    stats: SearchStats::default(),
                };
                worker.pulse(next, cost, demand, time);
                worker.stats
            });
            pool.push_back(handle);
        }

        while let Some(handle) = pool.pop_front() {
            stats.merge(&handle.join().expect("pulse worker panicked"));
        }
    });
}

struct PulseWorker<'a, 'b> {
    ctx: &'b PricingContext<'a>,
    bounds: &'b Bounds,
    incumbent: &'b Incumbent,
    visited: FixedBitSet,
    path: Vec<usize>,
    stats: SearchStats,
}

impl PulseWorker<'_, '_> {
    fn pulse(&mut self, vertex: usize, cost: f64, demand: f64, mut time: f64) {
        let window = self.ctx.vertex(vertex).time_window;
        if time < window.earliest {
            time = window.earliest;
        }
        if self.visited.contains(vertex) {
            self.stats.record(PruneReason::Cycle);
            return;
        }
        if self.bounds.completion_bound(vertex, time) + cost >= self.incumbent.best_cost() {
            self.stats.record(PruneReason::Bound);
            return;
        }
        if rollback(self.ctx, &self.path, vertex, cost) {
            self.stats.record(PruneReason::Rollback);
            return;
        }

        self.visited.insert(vertex);
        self.path.push(vertex);

        let end = self.ctx.end_vertex();
        for next in 1..self.ctx.num_vertices() {
            if !self.ctx.usable_arc(vertex, next) {
                continue;
            }
            let next_cost = cost + self.ctx.revised_cost(vertex, next);
            let next_demand = demand + self.ctx.vertex(next).demand;
            let next_time = self.ctx.arrival_time(vertex, next, time);
            if next_demand > self.ctx.capacity()
                || next_time > self.ctx.vertex(next).time_window.latest
            {
                self.stats.record(PruneReason::Infeasible);
                continue;
            }
            if next == end {
                let mut route = self.path.clone();
                route.push(end);
                self.incumbent.offer(next_cost, route);
                continue;
            }
            self.pulse(next, next_cost, next_demand, next_time);
        }

        self.path.pop();
        self.visited.set(vertex, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::tests_support::{four_vertex_instance, no_path_instance};

    #[test]
    fn finds_cheapest_elementary_path() {
        let (instance, duals) = four_vertex_instance(3.0, 2.0);
        let mut solver = EspptwccPulse::new(&instance);
        solver.solve(&duals, instance.travel_times()).unwrap();
        assert_eq!(solver.revised_cost_of_shortest_path(), Some(17.0));
        let paths = solver.shortest_paths();
        assert!(!paths.is_empty());
        assert_eq!(paths[0].vertices(), &[0, 1, 3]);
        assert_eq!(paths[0].cost(), 20.0);
    }

    #[test]
    fn large_duals_make_the_two_customer_route_optimal() {
        let (instance, duals) = four_vertex_instance(15.0, 12.0);
        let mut solver = EspptwccPulse::new(&instance);
        solver.solve(&duals, instance.travel_times()).unwrap();
        assert_eq!(solver.revised_cost_of_shortest_path(), Some(3.0));
        for path in solver.shortest_paths() {
            assert_eq!(path.visit_count(1), 1);
            assert_eq!(path.visit_count(2), 1);
        }
    }

    #[test]
    fn no_feasible_path_yields_empty_result() {
        let (instance, duals) = no_path_instance();
        let mut solver = EspptwccPulse::new(&instance);
        solver.solve(&duals, instance.travel_times()).unwrap();
        assert!(solver.shortest_paths().is_empty());
        assert_eq!(solver.revised_cost_of_shortest_path(), None);
    }

    #[test]
    fn single_worker_matches_default_pool() {
        let (instance, duals) = four_vertex_instance(15.0, 12.0);
        let mut serial = EspptwccPulse::with_params(
            &instance,
            PulseParams {
                workers: 1,
                ..PulseParams::default()
            },
        );
        serial.solve(&duals, instance.travel_times()).unwrap();
        let mut pooled = EspptwccPulse::new(&instance);
        pooled.solve(&duals, instance.travel_times()).unwrap();
        assert_eq!(
            serial.revised_cost_of_shortest_path(),
            pooled.revised_cost_of_shortest_path()
        );
    }

    #[test]
    fn coarse_bounding_parameters_stay_correct() {
        // with the bounding phase effectively disabled everything rides on
        // the naive bound; the result must not change
        let (instance, duals) = four_vertex_instance(15.0, 12.0);
        let mut solver = EspptwccPulse::with_params(
            &instance,
            PulseParams {
                time_step: 1000.0,
                time_limit_lb: 1000.0,
                workers: 2,
            },
        );
        solver.solve(&duals, instance.travel_times()).unwrap();
        assert_eq!(solver.revised_cost_of_shortest_path(), Some(3.0));
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let params: PulseParams = toml::from_str("time_step = 2.5").unwrap();
        assert_eq!(params.time_step, 2.5);
        assert_eq!(params.time_limit_lb, 100.0);
        assert_eq!(params.workers, 8);
    }
}
