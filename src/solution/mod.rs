use std::fmt;

use crate::problem::vrptw::VrptwInstance;

/// A depot-to-depot column produced by the pricing engine: the vertex
/// sequence, its true (distance) cost, and per-vertex visit counts for the
/// master problem. The relaxed label-setting search may return paths that
/// visit a customer more than once.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    vertices: Vec<usize>,
    cost: f64,
    visit_counts: Vec<u32>,
}

impl Path {
    pub fn from_vertex_sequence(instance: &VrptwInstance, vertices: Vec<usize>) -> Self {
        debug_assert!(vertices.first() == Some(&instance.start_depot()));
        debug_assert!(vertices.last() == Some(&instance.end_depot()));

        let mut cost = 0.0;
        for arc in vertices.windows(2) {
            cost += instance.distances().get(arc[0], arc[1]);
        }
        let mut visit_counts = vec![0u32; instance.num_vertices()];
        for &vertex in &vertices {
            visit_counts[vertex] += 1;
        }
        Self {
            vertices,
            cost,
            visit_counts,
        }
    }

    pub fn vertices(&self) -> &[usize] {
        &self.vertices
    }

    /// True cost from the distance matrix, not the dual-revised cost.
    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn visit_count(&self, vertex: usize) -> u32 {
        self.visit_counts[vertex]
    }

    pub fn visit_counts(&self) -> &[u32] {
        &self.visit_counts
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, vertex) in self.vertices.iter().enumerate() {
            if i > 0 {
                write!(f, "-")?;
            }
            write!(f, "{}", vertex)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::vrptw::TimeWindow;

    fn instance() -> VrptwInstance {
        VrptwInstance::builder("path-tests")
            .capacity(10.0)
            .horizon(100.0)
            .depot_at(0.0, 0.0)
            .add_customer(3.0, 4.0, 5.0, 0.0, TimeWindow::new(0.0, 100.0))
            .add_customer(0.0, 8.0, 5.0, 0.0, TimeWindow::new(0.0, 100.0))
            .build()
            .unwrap()
    }

    #[test]
    fn cost_and_counts() {
        let instance = instance();
        let path = Path::from_vertex_sequence(&instance, vec![0, 1, 2, 3]);
        // 5.0 + 5.0 + distance (0,8)->(0,0) = 8.0
        assert_eq!(path.cost(), 18.0);
        assert_eq!(path.visit_count(1), 1);
        assert_eq!(path.visit_count(0), 1);
        assert_eq!(path.visit_counts(), &[1, 1, 1, 1]);
    }

    #[test]
    fn repeated_visits_are_counted() {
        let instance = instance();
        let path = Path::from_vertex_sequence(&instance, vec![0, 1, 2, 1, 3]);
        assert_eq!(path.visit_count(1), 2);
    }

    #[test]
    fn display_joins_with_dashes() {
        let instance = instance();
        let path = Path::from_vertex_sequence(&instance, vec![0, 2, 3]);
        assert_eq!(path.to_string(), "0-2-3");
    }
}
