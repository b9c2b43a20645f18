/// Finite-difference stencils on node-centered grids
///
/// All derivative formulas used by the operator live here. Values are read
/// through a sampler closure `Fn(offset) -> T`, so the same formulas serve
/// displacement components, stiffness tensors and unit impulses (for the
/// operator diagonal).
///
/// One-sided formulas are second order:
/// ```text
/// forward  u'  = (-3 u0 + 4 u1 - u2) / 2h
/// backward u'  = ( 3 u0 - 4 u-1 + u-2) / 2h
/// forward  u'' = ( 2 u0 - 5 u1 + 4 u2 - u3) / h^2
/// ```

use std::ops::{Add, Mul, Sub};

use nalgebra::Matrix3;

use crate::error::NodeIndex;
use crate::grid::Geometry;

/// Offset from the node a stencil is centered on.
pub type Offset = [isize; 3];

/// Per-direction stencil selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StencilType {
    /// Symmetric stencil
    Central,
    /// Node on the low face; the stencil reaches in the + direction
    OneSidedLow,
    /// Node on the high face; the stencil reaches in the - direction
    OneSidedHigh,
}

impl StencilType {
    /// Stencil types at node `m`, from its position relative to the
    /// non-periodic domain faces only.
    pub fn at(geom: &Geometry, m: NodeIndex) -> [StencilType; 3] {
        let mut sten = [StencilType::Central; 3];
        for d in 0..geom.dim {
            if geom.on_low_face(m, d) {
                sten[d] = StencilType::OneSidedLow;
            } else if geom.on_high_face(m, d) {
                sten[d] = StencilType::OneSidedHigh;
            }
        }
        sten
    }
}

#[inline]
fn step(d: usize, n: isize) -> Offset {
    let mut o = [0; 3];
    o[d] = n;
    o
}

#[inline]
fn add(a: Offset, b: Offset) -> Offset {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

fn first<T, S>(sample: &S, d: usize, h: f64, st: StencilType) -> T
where
    T: Copy + Add<Output = T> + Sub<Output = T> + Mul<f64, Output = T>,
    S: Fn(Offset) -> T,
{
    let s = |n: isize| sample(step(d, n));
    match st {
        StencilType::Central => (s(1) - s(-1)) * (0.5 / h),
        StencilType::OneSidedLow => (s(1) * 4.0 - s(0) * 3.0 - s(2)) * (0.5 / h),
        StencilType::OneSidedHigh => (s(0) * 3.0 - s(-1) * 4.0 + s(-2)) * (0.5 / h),
    }
}

fn second<T, S>(sample: &S, d: usize, h: f64, st: StencilType) -> T
where
    T: Copy + Add<Output = T> + Sub<Output = T> + Mul<f64, Output = T>,
    S: Fn(Offset) -> T,
{
    let s = |n: isize| sample(step(d, n));
    let ih2 = 1.0 / (h * h);
    match st {
        StencilType::Central => (s(1) + s(-1) - s(0) * 2.0) * ih2,
        StencilType::OneSidedLow => (s(0) * 2.0 - s(1) * 5.0 + s(2) * 4.0 - s(3)) * ih2,
        StencilType::OneSidedHigh => (s(0) * 2.0 - s(-1) * 5.0 + s(-2) * 4.0 - s(-3)) * ih2,
    }
}

/// Derivative of order `order` (exponent triple) at the stencil center.
///
/// # Arguments
/// * `sample` - Field value at an offset from the node
/// * `order` - e.g. `[1,0,0]` for d/dx, `[0,2,0]` for d2/dy2, `[1,0,1]` for d2/dxdz
/// * `dx` - Grid spacing
/// * `sten` - Stencil type per direction
///
/// # Panics
/// Panics for orders other than first, second and mixed second derivatives.
pub fn derivative<T, S>(sample: S, order: [usize; 3], dx: &[f64; 3], sten: &[StencilType; 3]) -> T
where
    T: Copy + Add<Output = T> + Sub<Output = T> + Mul<f64, Output = T>,
    S: Fn(Offset) -> T,
{
    let dirs: Vec<usize> = (0..3).filter(|&d| order[d] > 0).collect();
    match (dirs.as_slice(), order.iter().sum::<usize>()) {
        ([d], 1) => first(&sample, *d, dx[*d], sten[*d]),
        ([d], 2) => second(&sample, *d, dx[*d], sten[*d]),
        ([a, b], 2) => {
            let (a, b) = (*a, *b);
            let inner = |o: Offset| first(&|o2: Offset| sample(add(o, o2)), b, dx[b], sten[b]);
            first(&inner, a, dx[a], sten[a])
        }
        _ => panic!("unsupported derivative order {:?}", order),
    }
}

/// Unit exponent triple for direction `d`.
#[inline]
pub fn d1(d: usize) -> [usize; 3] {
    let mut o = [0; 3];
    o[d] = 1;
    o
}

/// Exponent triple for the second derivative along `a` and `b`.
#[inline]
pub fn d2(a: usize, b: usize) -> [usize; 3] {
    let mut o = [0; 3];
    o[a] += 1;
    o[b] += 1;
    o
}

/// Displacement gradient, `gradu(p, q) = du_p / dx_q`.
///
/// `sample(p, offset)` reads component `p`. Rows and columns beyond `dim` are zero.
pub fn gradient<S>(sample: S, dim: usize, dx: &[f64; 3], sten: &[StencilType; 3]) -> Matrix3<f64>
where
    S: Fn(usize, Offset) -> f64,
{
    let mut g = Matrix3::zeros();
    for p in 0..dim {
        for q in 0..dim {
            g[(p, q)] = derivative(|o| sample(p, o), d1(q), dx, sten);
        }
    }
    g
}

/// Second derivatives, `hess[k](l, j) = d2 u_k / dx_l dx_j`.
pub fn hessian<S>(sample: S, dim: usize, dx: &[f64; 3], sten: &[StencilType; 3]) -> [Matrix3<f64>; 3]
where
    S: Fn(usize, Offset) -> f64,
{
    let mut h = [Matrix3::zeros(); 3];
    for k in 0..dim {
        for l in 0..dim {
            for j in l..dim {
                let v = derivative(|o| sample(k, o), d2(l, j), dx, sten);
                h[k][(l, j)] = v;
                h[k][(j, l)] = v;
            }
        }
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DX: [f64; 3] = [0.5, 0.25, 1.0];

    // u = 2x^2 - xy + y^2 + 3x, evaluated around node (x0, y0)
    fn poly(x0: f64, y0: f64) -> impl Fn(Offset) -> f64 {
        move |o| {
            let x = x0 + o[0] as f64 * DX[0];
            let y = y0 + o[1] as f64 * DX[1];
            2.0 * x * x - x * y + y * y + 3.0 * x
        }
    }

    #[test]
    fn test_first_derivatives_exact_for_quadratics() {
        let (x, y) = (1.5, -0.75);
        for st in [StencilType::Central, StencilType::OneSidedLow, StencilType::OneSidedHigh] {
            let sten = [st, st, StencilType::Central];
            let ux: f64 = derivative(poly(x, y), [1, 0, 0], &DX, &sten);
            let uy: f64 = derivative(poly(x, y), [0, 1, 0], &DX, &sten);
            assert_relative_eq!(ux, 4.0 * x - y + 3.0, epsilon = 1e-12);
            assert_relative_eq!(uy, -x + 2.0 * y, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_second_and_mixed_derivatives() {
        let (x, y) = (0.25, 2.0);
        for st in [StencilType::Central, StencilType::OneSidedLow, StencilType::OneSidedHigh] {
            let sten = [st, StencilType::Central, StencilType::Central];
            let uxx: f64 = derivative(poly(x, y), [2, 0, 0], &DX, &sten);
            let uyy: f64 = derivative(poly(x, y), [0, 2, 0], &DX, &sten);
            let uxy: f64 = derivative(poly(x, y), [1, 1, 0], &DX, &sten);
            assert_relative_eq!(uxx, 4.0, epsilon = 1e-10);
            assert_relative_eq!(uyy, 2.0, epsilon = 1e-10);
            assert_relative_eq!(uxy, -1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_one_sided_second_derivative_exact_for_cubics() {
        let f = |o: Offset| {
            let x = 1.0 + o[0] as f64 * DX[0];
            x * x * x
        };
        let sten = [StencilType::OneSidedHigh, StencilType::Central, StencilType::Central];
        let uxx: f64 = derivative(f, [2, 0, 0], &DX, &sten);
        assert_relative_eq!(uxx, 6.0, epsilon = 1e-10);
    }

    #[test]
    fn test_unit_impulse_self_weight() {
        let delta = |o: Offset| if o == [0, 0, 0] { 1.0 } else { 0.0 };
        let h = DX[0];
        let sten = [StencilType::OneSidedLow, StencilType::Central, StencilType::Central];
        let w: f64 = derivative(delta, [1, 0, 0], &DX, &sten);
        assert_relative_eq!(w, -1.5 / h);
        let w: f64 = derivative(delta, [0, 1, 0], &DX, &sten);
        assert_relative_eq!(w, 0.0);
        let w: f64 = derivative(delta, [0, 2, 0], &DX, &sten);
        assert_relative_eq!(w, -2.0 / (DX[1] * DX[1]));
    }

    #[test]
    fn test_stencil_type_at_faces() {
        let g = Geometry::new(2, [4, 4, 0], [0.0; 3], [1.0; 3], [false, true, false]).unwrap();
        let s = StencilType::at(&g, [0, 0, 0]);
        assert_eq!(s[0], StencilType::OneSidedLow);
        // periodic direction stays central
        assert_eq!(s[1], StencilType::Central);
        assert_eq!(StencilType::at(&g, [4, 2, 0])[0], StencilType::OneSidedHigh);
    }

    #[test]
    fn test_gradient_and_hessian_of_vector_field() {
        let sten = [StencilType::Central; 3];
        // u = (x*y, x^2)
        let sample = |p: usize, o: Offset| {
            let x = 1.0 + o[0] as f64 * DX[0];
            let y = 2.0 + o[1] as f64 * DX[1];
            if p == 0 { x * y } else { x * x }
        };
        let g = gradient(sample, 2, &DX, &sten);
        assert_relative_eq!(g[(0, 0)], 2.0, epsilon = 1e-12);
        assert_relative_eq!(g[(0, 1)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(g[(1, 0)], 2.0, epsilon = 1e-12);
        assert_relative_eq!(g[(1, 1)], 0.0, epsilon = 1e-12);
        let h = hessian(sample, 2, &DX, &sten);
        assert_relative_eq!(h[0][(0, 1)], 1.0, epsilon = 1e-10);
        assert_relative_eq!(h[0][(1, 0)], 1.0, epsilon = 1e-10);
        assert_relative_eq!(h[1][(0, 0)], 2.0, epsilon = 1e-10);
        assert_relative_eq!(g[(2, 2)], 0.0);
    }
}
