//! Corner Jacobians for mirror elements.
//!
//! # Vertex ordering
//! Checks use the corner vertices in the mirror's canonical order:
//!
//! - **Quadrilateral**: `[v0, v1, v2, v3]` counter-clockwise about the face normal.
//!   The element may be embedded in 3D, so orientation is judged by the corner
//!   normals agreeing with each other rather than by a sign in the XY plane.
//! - **Hexahedron**: bottom face `[0, 1, 2, 3]` and top face `[4, 5, 6, 7]`, both
//!   counter-clockwise seen from above. Each corner's Jacobian is the triple
//!   product of its three edges taken in right-handed order.
//!
//! Second-order elements list their corners first, so only the leading 4 or 8
//! vertices are inspected.

use crate::coupling_error::CouplingError;

const EPS: f64 = 1e-12;

/// For every hex corner, the three neighbours forming a right-handed frame.
const HEX_CORNER_FRAMES: [(usize, [usize; 3]); 8] = [
    (0, [1, 3, 4]),
    (1, [2, 0, 5]),
    (2, [3, 1, 6]),
    (3, [0, 2, 7]),
    (4, [7, 5, 0]),
    (5, [4, 6, 1]),
    (6, [5, 7, 2]),
    (7, [6, 4, 3]),
];

/// Signed corner Jacobians of a hexahedron (positive for a valid element).
pub fn hex_corner_jacobians(vertices: &[[f64; 3]]) -> Result<[f64; 8], CouplingError> {
    expect_corners(vertices, 8)?;
    let mut out = [0.0; 8];
    for (slot, (corner, [a, b, c])) in out.iter_mut().zip(HEX_CORNER_FRAMES) {
        let o = vertices[corner];
        let ea = sub(vertices[a], o);
        let eb = sub(vertices[b], o);
        let ec = sub(vertices[c], o);
        *slot = dot(ea, cross(eb, ec));
    }
    Ok(out)
}

/// Unnormalized corner normals of a quadrilateral.
pub fn quad_corner_normals(vertices: &[[f64; 3]]) -> Result<[[f64; 3]; 4], CouplingError> {
    expect_corners(vertices, 4)?;
    let mut out = [[0.0; 3]; 4];
    for (i, normal) in out.iter_mut().enumerate() {
        let curr = vertices[i];
        let next = vertices[(i + 1) % 4];
        let prev = vertices[(i + 3) % 4];
        *normal = cross(sub(next, curr), sub(prev, curr));
    }
    Ok(out)
}

/// Smallest scaled corner Jacobian of a quadrilateral: each corner normal is
/// projected onto the mean normal. Negative or zero means twisted or degenerate.
pub fn quad_min_jacobian(vertices: &[[f64; 3]]) -> Result<f64, CouplingError> {
    let normals = quad_corner_normals(vertices)?;
    let mut mean = [0.0; 3];
    for n in &normals {
        for d in 0..3 {
            mean[d] += n[d];
        }
    }
    let mean_len = norm(mean);
    if mean_len <= EPS {
        return Ok(0.0);
    }
    Ok(normals
        .iter()
        .map(|n| dot(*n, mean) / mean_len)
        .fold(f64::INFINITY, f64::min))
}

/// Smallest corner Jacobian of a hexahedron.
pub fn hex_min_jacobian(vertices: &[[f64; 3]]) -> Result<f64, CouplingError> {
    Ok(hex_corner_jacobians(vertices)?
        .into_iter()
        .fold(f64::INFINITY, f64::min))
}

/// Fail unless `min_jacobian` is finite and strictly positive.
pub fn validate_min_jacobian(min_jacobian: f64, element: usize) -> Result<f64, CouplingError> {
    if !min_jacobian.is_finite() || min_jacobian.abs() <= EPS {
        return Err(CouplingError::InvalidGeometry(format!(
            "degenerate mirror element {element}: min corner jacobian = {min_jacobian}"
        )));
    }
    if min_jacobian < 0.0 {
        return Err(CouplingError::InvalidGeometry(format!(
            "inverted mirror element {element}: min corner jacobian = {min_jacobian}"
        )));
    }
    Ok(min_jacobian)
}

fn expect_corners(vertices: &[[f64; 3]], corners: usize) -> Result<(), CouplingError> {
    if vertices.len() < corners {
        return Err(CouplingError::InvalidGeometry(format!(
            "vertex count mismatch: expected at least {corners}, got {}",
            vertices.len()
        )));
    }
    Ok(())
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUBE: [[f64; 3]; 8] = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [1.0, 0.0, 1.0],
        [1.0, 1.0, 1.0],
        [0.0, 1.0, 1.0],
    ];

    #[test]
    fn unit_cube_has_unit_corner_jacobians() {
        for j in hex_corner_jacobians(&CUBE).unwrap() {
            assert!((j - 1.0).abs() < 1e-14);
        }
    }

    #[test]
    fn tensor_ordered_cube_is_inverted() {
        // Corners listed in tensor order instead of counter-clockwise.
        let mut tensor = CUBE;
        tensor.swap(2, 3);
        tensor.swap(6, 7);
        let min = hex_min_jacobian(&tensor).unwrap();
        assert!(validate_min_jacobian(min, 0).is_err());
    }

    #[test]
    fn bowtie_quad_is_rejected() {
        let good = [[0.0, 0.0, 2.0], [1.0, 0.0, 2.0], [1.0, 1.0, 2.0], [0.0, 1.0, 2.0]];
        let bowtie = [good[0], good[1], good[3], good[2]];
        assert!(quad_min_jacobian(&good).unwrap() > 0.0);
        assert!(quad_min_jacobian(&bowtie).unwrap() <= 0.0);
    }
}
