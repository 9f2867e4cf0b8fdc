//! Gauss-Lobatto-Legendre nodes, weights and Lagrange interpolation matrices.
//!
//! The `n` GLL nodes on `[-1, 1]` are the endpoints plus the roots of `P'_{n-1}`.
//! They are found by Newton iteration from the Chebyshev-Lobatto points, which
//! converges in a handful of steps for the orders used here.

use crate::coupling_error::CouplingError;
use num_traits::Float;

const MAX_NEWTON_ITERS: usize = 100;

/// Evaluate `P_n(x)` and `P_{n-1}(x)` with the three-term recurrence.
fn legendre_pair<T: Float>(n: usize, x: T) -> (T, T) {
    let mut p_prev = T::one();
    let mut p_curr = x;
    if n == 0 {
        return (p_prev, T::zero());
    }
    for k in 1..n {
        let kf = T::from(k).unwrap_or_else(T::zero);
        let two_k_plus_one = kf + kf + T::one();
        let next = (two_k_plus_one * x * p_curr - kf * p_prev) / (kf + T::one());
        p_prev = p_curr;
        p_curr = next;
    }
    (p_curr, p_prev)
}

/// Evaluate the Legendre polynomial `P_n(x)`.
pub fn legendre<T: Float>(n: usize, x: T) -> T {
    legendre_pair(n, x).0
}

/// The `n_points` GLL nodes in ascending order.
pub fn gll_nodes<T: Float>(n_points: usize) -> Result<Vec<T>, CouplingError> {
    if n_points < 2 {
        return Err(CouplingError::InvalidQuadrature(n_points));
    }
    let order = n_points - 1;
    let nf = T::from(order).unwrap_or_else(T::one);
    let pi = T::from(std::f64::consts::PI).unwrap_or_else(T::zero);
    let tol = T::epsilon() * T::from(10.0).unwrap_or_else(T::one);

    let mut nodes: Vec<T> = (0..n_points)
        .map(|j| {
            let jf = T::from(j).unwrap_or_else(T::zero);
            -(pi * jf / nf).cos()
        })
        .collect();
    nodes[0] = -T::one();
    nodes[order] = T::one();

    // Interior nodes: Newton on (1 - x²) P'_N(x), whose derivative reduces to
    // -N(N+1) P_N(x).
    for x in nodes.iter_mut().take(order).skip(1) {
        for _ in 0..MAX_NEWTON_ITERS {
            let (p_n, p_nm1) = legendre_pair(order, *x);
            // (1 - x²) P'_N = N (P_{N-1} - x P_N)
            let lobatto = nf * (p_nm1 - *x * p_n);
            let update = lobatto / (nf * (nf + T::one()) * p_n);
            *x = *x + update;
            if update.abs() < tol {
                break;
            }
        }
    }
    Ok(nodes)
}

/// GLL quadrature weights `w_j = 2 / (N (N + 1) P_N(x_j)²)`.
pub fn gll_weights<T: Float>(nodes: &[T]) -> Vec<T> {
    let order = nodes.len().saturating_sub(1);
    let nf = T::from(order).unwrap_or_else(T::one);
    let two = T::one() + T::one();
    nodes
        .iter()
        .map(|&x| {
            let p_n = legendre(order, x);
            two / (nf * (nf + T::one()) * p_n * p_n)
        })
        .collect()
}

/// Lagrange basis polynomial `j` of `nodes`, evaluated at `x`.
pub fn lagrange_basis<T: Float>(nodes: &[T], j: usize, x: T) -> T {
    nodes
        .iter()
        .enumerate()
        .filter(|&(m, _)| m != j)
        .fold(T::one(), |acc, (_, &xm)| acc * (x - xm) / (nodes[j] - xm))
}

/// Row-major `(targets.len() x sources.len())` matrix with entry `(i, j) = L_j(targets[i])`.
pub fn lagrange_matrix<T: Float>(sources: &[T], targets: &[T]) -> Vec<T> {
    let mut out = Vec::with_capacity(sources.len() * targets.len());
    for &x in targets {
        for j in 0..sources.len() {
            out.push(lagrange_basis(sources, j, x));
        }
    }
    out
}

/// Interpolation matrix from `start_points` GLL nodes to `end_points` GLL nodes.
pub fn interpolation_matrix(start_points: usize, end_points: usize) -> Result<Vec<f64>, CouplingError> {
    let sources = gll_nodes::<f64>(start_points)?;
    let targets = gll_nodes::<f64>(end_points)?;
    Ok(lagrange_matrix(&sources, &targets))
}
