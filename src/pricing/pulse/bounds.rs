use fixedbitset::FixedBitSet;

use crate::pricing::pulse::PulseParams;
use crate::pricing::{PricingContext, PruneReason, SearchStats};

/// Lower bounds on the cost of completing a partial path, built by the
/// bounding phase and consumed read-only by the forward search.
pub(crate) struct Bounds {
    table: BoundTable,
    /// most negative cost/time ratio over all usable arcs, clamped to <= 0
    /// so it stays a valid per-time-unit lower bound even when every reduced
    /// cost is positive
    naive_rate: f64,
    /// cheapest full completion seen during bounding, <= 0 by construction
    relaxation: f64,
    /// initial time of the last bucket the bounding phase solved
    last_bucket_time: f64,
}

impl Bounds {
    /// Lower bound on the cost of any end-depot completion from `vertex`
    /// with `time` already elapsed.
    pub fn completion_bound(&self, vertex: usize, time: f64) -> f64 {
        if time < self.last_bucket_time {
            (self.last_bucket_time - time) * self.naive_rate + self.relaxation
        } else {
            self.table.lookup(vertex, time)
        }
    }
}

/// Per-vertex, per-time-bucket lower bounds. Bucket `b` covers partial
/// paths whose elapsed time is at least `b * step`; buckets are filled from
/// the latest one downwards, so each slot is the minimum over all later
/// start times as well.
pub(crate) struct BoundTable {
    step: f64,
    max_index: usize,
    rows: Vec<Vec<f64>>,
}

impl BoundTable {
    fn new(num_vertices: usize, time_ub: f64, time_limit_lb: f64, step: f64) -> Self {
        let max_index = (time_ub / step) as usize;
        let num_buckets = if time_limit_lb < time_ub {
            ((time_ub - time_limit_lb) / step) as usize + 1
        } else {
            1
        };
        Self {
            step,
            max_index,
            rows: vec![vec![f64::INFINITY; num_buckets]; num_vertices],
        }
    }

    #[inline(always)]
    fn slot(&self, time: f64) -> usize {
        debug_assert!(time >= 0.0);
        self.max_index - (time / self.step) as usize
    }

    fn record(&mut self, vertex: usize, bucket_time: f64, value: f64) {
        let slot = self.slot(bucket_time);
        debug_assert!(slot < self.rows[vertex].len());
        self.rows[vertex][slot] = value;
    }

    #[inline(always)]
    fn lookup(&self, vertex: usize, time: f64) -> f64 {
        let slot = self.slot(time);
        debug_assert!(slot < self.rows[vertex].len());
        self.rows[vertex][slot]
    }
}

/// Smallest step multiple strictly above the end depot's closing time; the
/// first bucket the bounding phase solves.
fn rounded_time_ub(latest_end: f64, step: f64) -> f64 {
    let raised = latest_end + step;
    raised - raised % step
}

/// Runs the full bounding phase: for every bucket time from the rounded
/// horizon down to the configured lower limit, a bounded depth-first pulse
/// from every vertex except the end depot, accumulating per-vertex minimum
/// completion costs into the table.
pub(crate) fn compute_bounds(
    ctx: &PricingContext,
    params: &PulseParams,
    stats: &mut SearchStats,
) -> Bounds {
    let n = ctx.num_vertices();
    let end = ctx.end_vertex();
    let latest_end = ctx.vertex(end).time_window.latest;
    let time_ub = rounded_time_ub(latest_end, params.time_step);

    let mut search = BoundSearch {
        ctx,
        naive_rate: naive_rate(ctx),
        relaxation: 0.0,
        min_cost: vec![f64::INFINITY; n],
        table: BoundTable::new(n, time_ub, params.time_limit_lb, params.time_step),
        bucket_time: time_ub,
        step: params.time_step,
        visited: FixedBitSet::with_capacity(n),
        path: vec![],
        stats: SearchStats::default(),
    };

    while search.bucket_time >= params.time_limit_lb {
        for vertex in 0..end {
            search.pulse_bound(vertex, vertex, 0.0, 0.0, search.bucket_time);
            search
                .table
                .record(vertex, search.bucket_time, search.min_cost[vertex]);
        }
        search.bucket_time -= params.time_step;
    }

    stats.merge(&search.stats);
    Bounds {
        table: search.table,
        naive_rate: search.naive_rate,
        relaxation: search.relaxation,
        // the loop stepped one bucket past the last one it solved
        last_bucket_time: search.bucket_time + params.time_step,
    }
}

/// Most negative reduced cost per unit of time over all usable arcs,
/// clamped to <= 0 (see `Bounds::naive_rate`).
fn naive_rate(ctx: &PricingContext) -> f64 {
    let mut rate: f64 = 0.0;
    for from in 0..ctx.num_vertices() {
        for to in 0..ctx.num_vertices() {
            if !ctx.usable_arc(from, to) {
                continue;
            }
            let time = ctx.vertex(from).service_time + ctx.travel_time(from, to);
            if time <= 0.0 {
                continue;
            }
            rate = rate.min(ctx.revised_cost(from, to) / time);
        }
    }
    rate
}

/// A three-vertex chain `direct -> pre -> current` is never part of an
/// optimal path when skipping `pre` is at least as cheap.
pub(crate) fn rollback(ctx: &PricingContext, path: &[usize], vertex: usize, cost: f64) -> bool {
    if path.len() < 2 {
        return false;
    }
    let pre = path[path.len() - 1];
    let direct = path[path.len() - 2];
    let direct_cost = cost - ctx.revised_cost(pre, vertex) - ctx.revised_cost(direct, pre)
        + ctx.revised_cost(direct, vertex);
    direct_cost <= cost
}

struct BoundSearch<'a, 'b> {
    ctx: &'b PricingContext<'a>,
    naive_rate: f64,
    relaxation: f64,
    /// per root vertex, across all buckets solved so far
    min_cost: Vec<f64>,
    table: BoundTable,
    bucket_time: f64,
    step: f64,
    visited: FixedBitSet,
    path: Vec<usize>,
    stats: SearchStats,
}

impl BoundSearch<'_, '_> {
    fn pulse_bound(&mut self, root: usize, vertex: usize, cost: f64, demand: f64, mut time: f64) {
        let window = self.ctx.vertex(vertex).time_window;
        if time > window.latest {
            self.stats.record(PruneReason::Infeasible);
            return;
        }
        if self.visited.contains(vertex) {
            self.stats.record(PruneReason::Cycle);
            return;
        }
        if time < window.earliest {
            time = window.earliest;
        }
        if self.lower_bound(root, vertex, time) + cost >= self.min_cost[root] {
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
                self.offer_completion(root, next_cost);
            } else {
                self.pulse_bound(root, next, next_cost, next_demand, next_time);
            }
        }

        self.path.pop();
        self.visited.set(vertex, false);
    }

    /// During a sweep the buckets of vertices before `root` are already
    /// final for the current bucket time; everything else falls back to the
    /// naive estimate until its slot is written.
    fn lower_bound(&self, root: usize, vertex: usize, time: f64) -> f64 {
        if vertex >= root && time < self.bucket_time + self.step {
            (self.bucket_time + self.step - time) * self.naive_rate + self.relaxation
        } else {
            self.table.lookup(vertex, time)
        }
    }

    fn offer_completion(&mut self, root: usize, cost: f64) {
        if cost < self.min_cost[root] {
            self.min_cost[root] = cost;
            if cost < self.relaxation {
                self.relaxation = cost;
            }
        }
    }
}
