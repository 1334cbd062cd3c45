//! Nodal Lagrange bases on the real line.

use crate::Error;

/// The Lagrange polynomial basis associated with a set of distinct nodes.
///
/// Basis function `j` is the unique polynomial of degree `n - 1` that equals one at node `j`
/// and vanishes at every other node. Evaluation uses the barycentric weights
/// $w_j = 1 / \prod_{k \neq j} (x_j - x_k)$, which makes evaluation at the nodes themselves
/// exact.
#[derive(Debug, Clone, PartialEq)]
pub struct LagrangeBasis1d {
    nodes: Vec<f64>,
    barycentric_weights: Vec<f64>,
}

impl LagrangeBasis1d {
    pub fn from_nodes(nodes: Vec<f64>) -> Result<Self, Error> {
        let mut barycentric_weights = Vec::with_capacity(nodes.len());
        for (j, x_j) in nodes.iter().enumerate() {
            let mut product = 1.0;
            for (k, x_k) in nodes.iter().enumerate() {
                if k != j {
                    product *= x_j - x_k;
                }
            }
            if product == 0.0 {
                return Err(Error::DuplicateNodes);
            }
            barycentric_weights.push(1.0 / product);
        }
        Ok(Self {
            nodes,
            barycentric_weights,
        })
    }

    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    pub fn num_functions(&self) -> usize {
        self.nodes.len()
    }

    /// Value of basis function `j` at `x`.
    pub fn evaluate(&self, j: usize, x: f64) -> f64 {
        let product: f64 = self
            .nodes
            .iter()
            .enumerate()
            .filter(|&(k, _)| k != j)
            .map(|(_, x_k)| x - x_k)
            .product();
        self.barycentric_weights[j] * product
    }

    /// Derivative of basis function `j` at `x`.
    pub fn derivative(&self, j: usize, x: f64) -> f64 {
        let n = self.nodes.len();
        let mut sum = 0.0;
        for m in (0..n).filter(|&m| m != j) {
            let mut product = 1.0;
            for k in (0..n).filter(|&k| k != j && k != m) {
                product *= x - self.nodes[k];
            }
            sum += product;
        }
        self.barycentric_weights[j] * sum
    }

    /// Interpolation and derivative tables at the given points.
    ///
    /// Returns `(B, G)`, each with `points.len() * n` entries stored with the point index
    /// running fastest: `B[q + nq * j]` is the value of basis function `j` at point `q` and
    /// `G` holds the corresponding derivatives.
    pub fn tables(&self, points: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let nq = points.len();
        let n = self.num_functions();
        let mut b = vec![0.0; nq * n];
        let mut g = vec![0.0; nq * n];
        for j in 0..n {
            for (q, &x) in points.iter().enumerate() {
                b[q + nq * j] = self.evaluate(j, x);
                g[q + nq * j] = self.derivative(j, x);
            }
        }
        (b, g)
    }
}
