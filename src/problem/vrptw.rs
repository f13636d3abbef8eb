use anyhow::{bail, Result};

use crate::problem::matrix::SquareMatrix;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub earliest: f64,
    pub latest: f64,
}

impl TimeWindow {
    pub fn new(earliest: f64, latest: f64) -> Self {
        Self { earliest, latest }
    }

    pub fn contains(&self, time: f64) -> bool {
        self.earliest <= time && time <= self.latest
    }
}

#[derive(Debug, Clone)]
pub struct Vertex {
    pub id: usize,
    pub x: f64,
    pub y: f64,
    pub demand: f64,
    pub service_time: f64,
    pub time_window: TimeWindow,
}

/// VRPTW instance over vertex indices `0..V`: index 0 is the start depot,
/// `V-1` a duplicate end depot, everything in between a customer.
///
/// Arcs into the start depot and out of the end depot carry the infeasible
/// sentinel, so no search can use them. Read-only once built; branching
/// decisions derive new travel-time matrices outside and pass them per solve
/// call.
pub struct VrptwInstance {
    pub name: String,
    vertices: Vec<Vertex>,
    capacity: f64,
    distances: SquareMatrix<f64>,
    travel_times: SquareMatrix<f64>,
}

impl VrptwInstance {
    pub fn builder(name: impl Into<String>) -> VrptwInstanceBuilder {
        VrptwInstanceBuilder::new(name)
    }

    #[inline(always)]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    #[inline(always)]
    pub fn num_customers(&self) -> usize {
        self.vertices.len() - 2
    }

    #[inline(always)]
    pub fn start_depot(&self) -> usize {
        0
    }

    #[inline(always)]
    pub fn end_depot(&self) -> usize {
        self.vertices.len() - 1
    }

    #[inline(always)]
    pub fn is_customer(&self, id: usize) -> bool {
        id > 0 && id < self.end_depot()
    }

    #[inline(always)]
    pub fn vertex(&self, id: usize) -> &Vertex {
        &self.vertices[id]
    }

    pub fn customers(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices[1..self.vertices.len() - 1].iter()
    }

    #[inline(always)]
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    #[inline(always)]
    pub fn distances(&self) -> &SquareMatrix<f64> {
        &self.distances
    }

    #[inline(always)]
    pub fn travel_times(&self) -> &SquareMatrix<f64> {
        &self.travel_times
    }
}

pub struct VrptwInstanceBuilder {
    name: String,
    capacity: f64,
    horizon: f64,
    depot: (f64, f64),
    customers: Vec<Vertex>,
    distances: Option<SquareMatrix<f64>>,
    travel_times: Option<SquareMatrix<f64>>,
}

impl VrptwInstanceBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capacity: 0.0,
            horizon: 0.0,
            depot: (0.0, 0.0),
            customers: vec![],
            distances: None,
            travel_times: None,
        }
    }

    pub fn capacity(mut self, capacity: f64) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn horizon(mut self, horizon: f64) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn depot_at(mut self, x: f64, y: f64) -> Self {
        self.depot = (x, y);
        self
    }

    pub fn add_customer(
        mut self,
        x: f64,
        y: f64,
        demand: f64,
        service_time: f64,
        time_window: TimeWindow,
    ) -> Self {
        let id = self.customers.len() + 1;
        self.customers.push(Vertex {
            id,
            x,
            y,
            demand,
            service_time,
            time_window,
        });
        self
    }

    /// Explicit distance matrix instead of Euclidean coordinates.
    pub fn distances(mut self, distances: SquareMatrix<f64>) -> Self {
        self.distances = Some(distances);
        self
    }

    /// Explicit travel times; defaults to the distance matrix (unit speed).
    pub fn travel_times(mut self, travel_times: SquareMatrix<f64>) -> Self {
        self.travel_times = Some(travel_times);
        self
    }

    pub fn build(self) -> Result<VrptwInstance> {
        if self.capacity <= 0.0 {
            bail!("vehicle capacity must be positive (got {})", self.capacity);
        }
        if self.horizon <= 0.0 {
            bail!("planning horizon must be positive (got {})", self.horizon);
        }
        for customer in &self.customers {
            let tw = customer.time_window;
            if tw.earliest > tw.latest {
                bail!(
                    "customer {} has an empty time window [{}, {}]",
                    customer.id,
                    tw.earliest,
                    tw.latest
                );
            }
            if customer.demand < 0.0 || customer.service_time < 0.0 {
                bail!("customer {} has negative demand or service time", customer.id);
            }
        }

        let n = self.customers.len() + 2;
        let mut vertices = Vec::with_capacity(n);
        let depot_window = TimeWindow::new(0.0, self.horizon);
        vertices.push(Vertex {
            id: 0,
            x: self.depot.0,
            y: self.depot.1,
            demand: 0.0,
            service_time: 0.0,
            time_window: depot_window,
        });
        vertices.extend(self.customers);
        vertices.push(Vertex {
            id: n - 1,
            x: self.depot.0,
            y: self.depot.1,
            demand: 0.0,
            service_time: 0.0,
            time_window: depot_window,
        });

        let mut distances = match self.distances {
            Some(matrix) => {
                if matrix.dim() != n {
                    bail!("distance matrix is {0}x{0}, expected {1}x{1}", matrix.dim(), n);
                }
                matrix
            }
            None => SquareMatrix::from_fn(n, |from, to| {
                euclidean_distance(&vertices[from], &vertices[to])
            }),
        };
        let mut travel_times = match self.travel_times {
            Some(matrix) => {
                if matrix.dim() != n {
                    bail!(
                        "travel-time matrix is {0}x{0}, expected {1}x{1}",
                        matrix.dim(),
                        n
                    );
                }
                matrix
            }
            None => distances.clone(),
        };

        // arcs into the start depot and out of the end depot are unusable
        for i in 0..n {
            distances.set(i, 0, SquareMatrix::INFEASIBLE);
            distances.set(n - 1, i, SquareMatrix::INFEASIBLE);
            travel_times.set(i, 0, SquareMatrix::INFEASIBLE);
            travel_times.set(n - 1, i, SquareMatrix::INFEASIBLE);
        }

        Ok(VrptwInstance {
            name: self.name,
            vertices,
            capacity: self.capacity,
            distances,
            travel_times,
        })
    }
}

/// Euclidean distance truncated to two decimals, the Solomon-benchmark
/// convention.
fn euclidean_distance(a: &Vertex, b: &Vertex) -> f64 {
    let exact = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();
    (exact * 100.0).trunc() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_instance() -> VrptwInstance {
        VrptwInstance::builder("triangle")
            .capacity(10.0)
            .horizon(100.0)
            .depot_at(0.0, 0.0)
            .add_customer(3.0, 4.0, 5.0, 1.0, TimeWindow::new(0.0, 50.0))
            .add_customer(6.0, 8.0, 5.0, 1.0, TimeWindow::new(0.0, 80.0))
            .build()
            .unwrap()
    }

    #[test]
    fn indices_and_depot_duplication() {
        let instance = small_instance();
        assert_eq!(instance.num_vertices(), 4);
        assert_eq!(instance.num_customers(), 2);
        assert_eq!(instance.start_depot(), 0);
        assert_eq!(instance.end_depot(), 3);
        assert!(instance.is_customer(1));
        assert!(!instance.is_customer(3));
        assert_eq!(instance.vertex(3).x, instance.vertex(0).x);
        assert_eq!(instance.vertex(0).demand, 0.0);
    }

    #[test]
    fn sealed_arcs() {
        let instance = small_instance();
        for i in 0..instance.num_vertices() {
            assert!(!instance.distances().is_usable_arc(i, 0));
            assert!(!instance.travel_times().is_usable_arc(3, i));
        }
        // depot to its duplicate stays usable at zero distance
        assert_eq!(instance.distances().get(0, 3), 0.0);
    }

    #[test]
    fn euclidean_truncation() {
        let instance = small_instance();
        // 3-4-5 triangle
        assert_eq!(instance.distances().get(0, 1), 5.0);
        // sqrt(3^2 + 4^2) from (3,4) to (6,8)
        assert_eq!(instance.distances().get(1, 2), 5.0);
    }

    #[test]
    fn empty_time_window_is_rejected() {
        let result = VrptwInstance::builder("bad")
            .capacity(10.0)
            .horizon(100.0)
            .add_customer(1.0, 1.0, 1.0, 0.0, TimeWindow::new(60.0, 50.0))
            .build();
        assert!(result.is_err());
    }
}
