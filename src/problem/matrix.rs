use num_traits::Zero;

/// Dense row-major square matrix of arc weights.
#[derive(Debug, Clone)]
pub struct SquareMatrix<W> {
    n: usize,
    data: Vec<W>,
}

impl<W: Copy> SquareMatrix<W> {
    pub fn from_fill(n: usize, value: W) -> Self {
        Self {
            n,
            data: vec![value; n * n],
        }
    }

    pub fn from_fn(n: usize, mut f: impl FnMut(usize, usize) -> W) -> Self {
        let mut data = Vec::with_capacity(n * n);
        for from in 0..n {
            for to in 0..n {
                data.push(f(from, to));
            }
        }
        Self { n, data }
    }

    #[inline(always)]
    pub fn dim(&self) -> usize {
        self.n
    }

    #[inline(always)]
    pub fn get(&self, from: usize, to: usize) -> W {
        self.data[self.idx(from, to)]
    }

    pub fn set(&mut self, from: usize, to: usize, value: W) {
        let idx = self.idx(from, to);
        self.data[idx] = value;
    }

    #[inline(always)]
    fn idx(&self, from: usize, to: usize) -> usize {
        debug_assert!(from < self.n);
        debug_assert!(to < self.n);
        from * self.n + to
    }
}

impl<W: Copy + Zero> SquareMatrix<W> {
    /// Filled matrix with a zero diagonal (no cost to stay in place).
    pub fn with_zero_diagonal(n: usize, fill: W) -> Self {
        let mut matrix = Self::from_fill(n, fill);
        for i in 0..n {
            matrix.set(i, i, W::zero());
        }
        matrix
    }
}

impl SquareMatrix<f64> {
    /// Sentinel weight of an arc that can never appear in a feasible path.
    pub const INFEASIBLE: f64 = f64::INFINITY;

    #[inline(always)]
    pub fn is_usable_arc(&self, from: usize, to: usize) -> bool {
        self.get(from, to).is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_diagonal_and_fill() {
        let m = SquareMatrix::with_zero_diagonal(3, 7.5);
        for i in 0..3 {
            for j in 0..3 {
                if i == j {
                    assert_eq!(m.get(i, j), 0.0);
                } else {
                    assert_eq!(m.get(i, j), 7.5);
                }
            }
        }
    }

    #[test]
    fn from_fn_row_major() {
        let m = SquareMatrix::from_fn(4, |from, to| (from * 10 + to) as f64);
        assert_eq!(m.get(0, 3), 3.0);
        assert_eq!(m.get(2, 1), 21.0);
        assert_eq!(m.dim(), 4);
    }

    #[test]
    fn infeasible_arcs_are_not_usable() {
        let mut m = SquareMatrix::with_zero_diagonal(2, 1.0);
        m.set(0, 1, SquareMatrix::INFEASIBLE);
        assert!(!m.is_usable_arc(0, 1));
        assert!(m.is_usable_arc(1, 0));
    }
}
