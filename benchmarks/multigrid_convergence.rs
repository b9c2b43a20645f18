/// Multigrid convergence study
///
/// Part 1: V-cycle convergence factors for a Laplacian model with
/// prescribed displacement on every face, for both smoothers and growing
/// grids. The factor should stay roughly constant under refinement.
///
/// Part 2: discretization error of the clamped bar with roller sides,
/// compared against u_x = x (L - x/2) / (lambda + 2 mu).

use elastic_mg::{
    init_rhs, BcMatrix, Elastic, Geometry, GridHierarchy, HierarchyInfo, MaterialModel,
    MultigridConfig, MultigridSolver, NodeField, SmootherKind,
};

fn laplacian_rates(n: usize, smoother: SmootherKind) -> (usize, f64) {
    let geom = Geometry::new(2, [n, n, 0], [0.0; 3], [1.0; 3], [false; 3]).unwrap();
    let hierarchy = GridHierarchy::single_level(geom.clone(), 32, &HierarchyInfo::default()).unwrap();
    let mut op = Elastic::define(hierarchy, BcMatrix::all_displacement(2)).unwrap();
    op.set_uniform_model(MaterialModel::Laplacian { alpha: 1.0 }.stiffness())
        .unwrap();

    let mut u = op.make_field(0, 0);
    let mut b = op.make_field(0, 0);
    init_rhs(op.bc(), &geom, &mut b, [1.0, 1.0, 0.0]).unwrap();

    let config = MultigridConfig {
        tol_rel: 1e-10,
        max_iter: 50,
        smoother,
        ..MultigridConfig::default()
    };
    let mut solver = MultigridSolver::new(config);
    let stats = solver.solve(&mut op, &mut u, &b).unwrap();
    let rate = stats.relative_residual.powf(1.0 / stats.iterations.max(1) as f64);
    (stats.iterations, rate)
}

fn bar_error(n: usize) -> f64 {
    let (lambda, mu) = (1.0, 1.0);
    let length = 4.0;
    let geom = Geometry::new(2, [4 * n, n, 0], [0.0; 3], [length, 1.0, 0.0], [false; 3]).unwrap();
    let hierarchy = GridHierarchy::single_level(geom.clone(), 64, &HierarchyInfo::default()).unwrap();
    let mut op = Elastic::define(hierarchy, BcMatrix::clamped_bar(2, true)).unwrap();
    op.set_uniform_model(MaterialModel::Isotropic { lambda, mu }.stiffness())
        .unwrap();
    op.prepare().unwrap();

    let mut b = op.make_field(0, 0);
    init_rhs(op.bc(), &geom, &mut b, [1.0, 0.0, 0.0]).unwrap();
    let assembled = op.assemble(0, 0).unwrap();
    let rhs = assembled.gather(&b).unwrap();
    let mut direct = elastic_mg::DirectSolver::new();
    let (x, _) = direct.solve(&assembled.matrix, &rhs).unwrap();
    let mut u: NodeField<f64> = op.make_field(0, 0);
    assembled.scatter(&x, &mut u).unwrap();

    let mut err: f64 = 0.0;
    for fab in u.fabs() {
        for m in fab.valid_box().iter() {
            let x = geom.node_position(m)[0];
            let exact = x * (length - 0.5 * x) / (lambda + 2.0 * mu);
            err = err.max((fab[(m, 0)] - exact).abs());
        }
    }
    err
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    println!("=== V-cycle convergence (Laplacian, Dirichlet) ===");
    println!("{:>6} {:>12} {:>8} {:>10}", "n", "smoother", "iters", "rate");
    for n in [16, 32, 64] {
        for smoother in [SmootherKind::Approximate, SmootherKind::Exact] {
            let (iters, rate) = laplacian_rates(n, smoother);
            println!("{:>6} {:>12?} {:>8} {:>10.4}", n, smoother, iters, rate);
        }
    }

    println!("\n=== Clamped bar with rollers: max |u_x - exact| ===");
    for n in [2, 4, 8] {
        println!("{:>6} {:>12.3e}", n, bar_error(n));
    }
}
