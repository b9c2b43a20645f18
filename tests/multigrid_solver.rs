/// V-cycle solver on the nodal operator
///
/// Uses a component-wise Laplacian model, for which damped Jacobi and
/// red-black Gauss-Seidel are both good smoothers.

use approx::assert_relative_eq;
use elastic_mg::{
    init_rhs, BcMatrix, BcType, BoxLayout, DirectSolver, Elastic, ElasticError, Face, Geometry,
    GridHierarchy, HierarchyInfo, MaterialModel, MultigridConfig, MultigridSolver, NodeBox,
    NodeField, SmootherKind,
};

fn info() -> HierarchyInfo {
    HierarchyInfo {
        max_coarsening_level: 30,
        n_ranks: 2,
    }
}

fn laplacian_problem(geom: Geometry, bc: BcMatrix) -> (Elastic, NodeField<f64>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let h = GridHierarchy::single_level(geom.clone(), 8, &info()).unwrap();
    let mut op = Elastic::define(h, bc).unwrap();
    op.set_uniform_model(MaterialModel::Laplacian { alpha: 1.0 }.stiffness())
        .unwrap();
    let mut b = op.make_field(0, 0);
    init_rhs(op.bc(), &geom, &mut b, [1.0, -2.0, 0.0]).unwrap();
    (op, b)
}

fn direct_solution(op: &Elastic, b: &NodeField<f64>) -> NodeField<f64> {
    let a = op.assemble(0, 0).unwrap();
    let (x, _) = DirectSolver::new()
        .solve(&a.matrix, &a.gather(b).unwrap())
        .unwrap();
    let mut u = op.make_field(0, 0);
    a.scatter(&x, &mut u).unwrap();
    u
}

fn solve_and_compare(geom: Geometry, bc: BcMatrix, smoother: SmootherKind) {
    let (mut op, b) = laplacian_problem(geom, bc);
    let mut u = op.make_field(0, 0);
    let config = MultigridConfig {
        tol_rel: 1e-10,
        max_iter: 40,
        smoother,
        ..MultigridConfig::default()
    };
    let mut solver = MultigridSolver::new(config);
    let stats = solver.solve(&mut op, &mut u, &b).unwrap();
    assert!(stats.converged, "{:?}", stats);
    assert!(stats.iterations > 1);
    assert!(stats.relative_residual <= 1e-10);

    let reference = direct_solution(&op, &b);
    let scale = reference.norm0();
    for (uf, rf) in u.fabs().iter().zip(reference.fabs()) {
        for m in uf.valid_box().iter() {
            for p in 0..2 {
                assert_relative_eq!(uf[(m, p)], rf[(m, p)], epsilon = 1e-7 * scale);
            }
        }
    }
}

#[test]
fn test_vcycle_converges_with_jacobi() {
    let geom = Geometry::new(2, [16, 16, 0], [0.0; 3], [1.0; 3], [false; 3]).unwrap();
    solve_and_compare(geom, BcMatrix::all_displacement(2), SmootherKind::Approximate);
}

#[test]
fn test_vcycle_converges_with_gauss_seidel() {
    let geom = Geometry::new(2, [16, 16, 0], [0.0; 3], [1.0; 3], [false; 3]).unwrap();
    solve_and_compare(geom, BcMatrix::all_displacement(2), SmootherKind::Exact);
}

#[test]
fn test_vcycle_periodic_direction() {
    let geom = Geometry::new(2, [16, 8, 0], [0.0; 3], [2.0, 1.0, 0.0], [true, false, false]).unwrap();
    solve_and_compare(geom, BcMatrix::all_displacement(2), SmootherKind::Exact);
}

#[test]
fn test_inhomogeneous_displacement_is_imposed() {
    let geom = Geometry::new(2, [8, 8, 0], [0.0; 3], [1.0; 3], [false; 3]).unwrap();
    let mut bc = BcMatrix::all_displacement(2);
    bc.set_face(Face::hi(0), BcType::Displacement, [0.5, 0.25, 0.0]);
    let (mut op, b) = laplacian_problem(geom, bc);
    let mut u = op.make_field(0, 0);
    let stats = MultigridSolver::new(MultigridConfig::default())
        .solve(&mut op, &mut u, &b)
        .unwrap();
    assert!(stats.converged);
    assert_relative_eq!(*u.get([8, 4, 0], 0).unwrap(), 0.5, epsilon = 1e-12);
    assert_relative_eq!(*u.get([8, 4, 0], 1).unwrap(), 0.25, epsilon = 1e-12);
}

#[test]
fn test_several_amr_levels_are_rejected() {
    let g0 = Geometry::new(2, [8, 8, 0], [0.0; 3], [1.0; 3], [false; 3]).unwrap();
    let g1 = g0.refine();
    let l0 = BoxLayout::chop(&g0, 8, 1).unwrap();
    let l1 = BoxLayout::new(2, vec![NodeBox::new([4, 4, 0], [12, 12, 0])], vec![0]).unwrap();
    let h = GridHierarchy::new(&[g0, g1], &[l0, l1], &info()).unwrap();
    let mut op = Elastic::define(h, BcMatrix::all_displacement(2)).unwrap();
    op.set_uniform_model(MaterialModel::Laplacian { alpha: 1.0 }.stiffness())
        .unwrap();
    let mut u = op.make_field(0, 0);
    let b = op.make_field(0, 0);
    let err = MultigridSolver::new(MultigridConfig::default())
        .solve(&mut op, &mut u, &b)
        .unwrap_err();
    assert!(matches!(err, ElasticError::Unimplemented { .. }));
}

#[test]
fn test_zero_rhs_converges_immediately() {
    let geom = Geometry::new(2, [8, 8, 0], [0.0; 3], [1.0; 3], [false; 3]).unwrap();
    let (mut op, _) = laplacian_problem(geom, BcMatrix::all_displacement(2));
    let mut u = op.make_field(0, 0);
    let b = op.make_field(0, 0);
    let stats = MultigridSolver::new(MultigridConfig::default())
        .solve(&mut op, &mut u, &b)
        .unwrap();
    assert!(stats.converged);
    assert_eq!(stats.iterations, 0);
}
