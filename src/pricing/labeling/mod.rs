use fixedbitset::FixedBitSet;

use crate::pricing::PricingContext;

pub mod correcting;
pub mod setting;

/// Accumulated resources of a partial path; all three are non-decreasing
/// along any predecessor chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Resources {
    pub cost: f64,
    pub time: f64,
    pub demand: f64,
}

impl Resources {
    pub fn zero() -> Self {
        Self {
            cost: 0.0,
            time: 0.0,
            demand: 0.0,
        }
    }
}

/// Handle into a [`LabelArena`]; stays valid for the whole solve call even
/// after the label is dropped from its vertex list, so descendants can always
/// walk their predecessor chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct LabelId(u32);

impl LabelId {
    /// Dense arena offset, usable as an index into side tables.
    #[inline(always)]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Immutable partial-path state: resources, last vertex, predecessor handle,
/// and per-algorithm extra state `S`.
#[derive(Debug, Clone)]
pub(crate) struct Label<S> {
    pub resources: Resources,
    pub vertex: usize,
    pub pred: Option<LabelId>,
    pub state: S,
}

pub(crate) struct LabelArena<S> {
    labels: Vec<Label<S>>,
}

impl<S> LabelArena<S> {
    pub fn new() -> Self {
        Self { labels: vec![] }
    }

    pub fn clear(&mut self) {
        self.labels.clear();
    }

    pub fn push(&mut self, label: Label<S>) -> LabelId {
        debug_assert!(self.labels.len() < u32::MAX as usize);
        let id = LabelId(self.labels.len() as u32);
        self.labels.push(label);
        id
    }

    #[inline(always)]
    pub fn get(&self, id: LabelId) -> &Label<S> {
        &self.labels[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Full vertex sequence of the label's path, start depot first.
    pub fn route_to(&self, id: LabelId) -> Vec<usize> {
        let mut route = vec![];
        let mut current = Some(id);
        while let Some(label_id) = current {
            let label = self.get(label_id);
            route.push(label.vertex);
            current = label.pred;
        }
        route.reverse();
        route
    }
}

/// Per-algorithm label state: nothing for the relaxed search, a
/// reachability record for the elementary one. Selecting the type parameter
/// selects the dominance rule, with no runtime type tests.
pub(crate) trait LabelState: Sized + PartialEq {
    fn root(ctx: &PricingContext, resources: &Resources) -> Self;

    fn extended(ctx: &PricingContext, parent: &Self, resources: &Resources, vertex: usize) -> Self;

    /// May a path in this state still be extended to `vertex`?
    fn may_visit(&self, vertex: usize) -> bool;

    fn dominates(&self, other: &Self) -> bool;
}

impl LabelState for () {
    fn root(_: &PricingContext, _: &Resources) -> Self {}

    fn extended(_: &PricingContext, _: &Self, _: &Resources, _: usize) -> Self {}

    fn may_visit(&self, _: usize) -> bool {
        true
    }

    fn dominates(&self, _: &Self) -> bool {
        true
    }
}

/// Vertices a partial path can no longer visit: already served, or provably
/// capacity-/time-window-infeasible to reach next. Supersets accumulate along
/// predecessor chains.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Reachability {
    unreachable: FixedBitSet,
    count: u32,
}

impl Reachability {
    /// Closes off `vertex` itself plus every vertex that capacity or
    /// time-window arithmetic proves infeasible to reach next.
    fn close_off(&mut self, ctx: &PricingContext, resources: &Resources, vertex: usize) {
        self.mark(vertex);
        for next in 0..ctx.num_vertices() {
            if self.unreachable.contains(next) {
                continue;
            }
            if resources.demand + ctx.vertex(next).demand > ctx.capacity() {
                self.mark(next);
                continue;
            }
            if ctx.arrival_time(vertex, next, resources.time) > ctx.vertex(next).time_window.latest
            {
                self.mark(next);
            }
        }
    }

    fn mark(&mut self, vertex: usize) {
        if !self.unreachable.contains(vertex) {
            self.unreachable.insert(vertex);
            self.count += 1;
        }
    }
}

impl LabelState for Reachability {
    fn root(ctx: &PricingContext, resources: &Resources) -> Self {
        let mut state = Self {
            unreachable: FixedBitSet::with_capacity(ctx.num_vertices()),
            count: 0,
        };
        state.close_off(ctx, resources, ctx.start_vertex());
        state
    }

    fn extended(ctx: &PricingContext, parent: &Self, resources: &Resources, vertex: usize) -> Self {
        let mut state = parent.clone();
        state.close_off(ctx, resources, vertex);
        state
    }

    #[inline(always)]
    fn may_visit(&self, vertex: usize) -> bool {
        !self.unreachable.contains(vertex)
    }

    fn dominates(&self, other: &Self) -> bool {
        self.count <= other.count && self.unreachable.is_subset(&other.unreachable)
    }
}

/// Shared resource-extension rule: reject capacity overflow and late
/// arrivals, clamp early arrivals up to the window start.
pub(crate) fn extend_resources(
    ctx: &PricingContext,
    resources: &Resources,
    from: usize,
    to: usize,
) -> Option<Resources> {
    debug_assert_ne!(from, to);

    let demand = resources.demand + ctx.vertex(to).demand;
    if demand > ctx.capacity() {
        return None;
    }

    let mut time = ctx.arrival_time(from, to, resources.time);
    let window = ctx.vertex(to).time_window;
    if time > window.latest {
        return None;
    }
    if time < window.earliest {
        time = window.earliest;
    }

    Some(Resources {
        cost: resources.cost + ctx.revised_cost(from, to),
        time,
        demand,
    })
}

/// `a` dominates `b` (both at the same vertex). At the end depot only a
/// strictly cheaper label dominates, so the whole tied-best set survives
/// there; everywhere else equality counts as domination and the insertion
/// logic special-cases exact duplicates.
pub(crate) fn dominates<S: LabelState>(end_vertex: usize, a: &Label<S>, b: &Label<S>) -> bool {
    debug_assert_eq!(a.vertex, b.vertex);

    if a.vertex == end_vertex {
        return a.resources.cost < b.resources.cost;
    }

    if a.resources.cost > b.resources.cost
        || a.resources.time > b.resources.time
        || a.resources.demand > b.resources.demand
    {
        return false;
    }

    a.state.dominates(&b.state)
}

pub(crate) struct InsertOutcome {
    pub inserted: bool,
    /// Labels retired from the list; the label-setting frontier must skip
    /// them on pop.
    pub removed: Vec<LabelId>,
}

impl InsertOutcome {
    pub fn changed_list(&self) -> bool {
        self.inserted || !self.removed.is_empty()
    }
}

/// Per-vertex lists of non-dominated labels with the two-directional
/// dominance check applied on every insertion.
pub(crate) struct VertexLabels {
    lists: Vec<Vec<LabelId>>,
}

impl VertexLabels {
    pub fn with_num_vertices(n: usize) -> Self {
        Self {
            lists: vec![vec![]; n],
        }
    }

    pub fn clear(&mut self) {
        for list in &mut self.lists {
            list.clear();
        }
    }

    #[inline(always)]
    pub fn at(&self, vertex: usize) -> &[LabelId] {
        &self.lists[vertex]
    }

    pub fn insert<S: LabelState>(
        &mut self,
        arena: &LabelArena<S>,
        end_vertex: usize,
        candidate: LabelId,
    ) -> InsertOutcome {
        let cand = arena.get(candidate);
        let list = &mut self.lists[cand.vertex];

        let mut removed = vec![];
        // once the candidate strictly removed an entry it cannot itself be
        // dominated by a later one (entries are mutually non-dominated)
        let mut may_be_dominated = true;
        let mut dominated = false;

        let mut i = 0;
        while i < list.len() {
            let other = arena.get(list[i]);
            if dominates(end_vertex, cand, other) {
                if may_be_dominated
                    && cand.resources == other.resources
                    && cand.state == other.state
                {
                    // exact duplicate: keep the incumbent label
                    return InsertOutcome {
                        inserted: false,
                        removed,
                    };
                }
                may_be_dominated = false;
                removed.push(list.remove(i));
                continue;
            }
            if may_be_dominated && dominates(end_vertex, other, cand) {
                dominated = true;
                break;
            }
            i += 1;
        }

        if !dominated {
            list.push(candidate);
        }
        InsertOutcome {
            inserted: !dominated,
            removed,
        }
    }
}
