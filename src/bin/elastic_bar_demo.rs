/// Clamped bar under a body force, solved with geometric multigrid
///
/// Usage: elastic_bar_demo [config.toml]
///
/// Without a config file the default problem is a 32x8 bar on [0,4]x[0,1],
/// clamped at x = 0 with roller sides and a unit body force along x. For
/// roller sides the exact solution is u_x = b x (L - x/2) / C_xxxx, which the
/// discretization reproduces to round-off.

use std::env;
use std::process;

use log::{error, info};

use elastic_mg::{init_rhs, Elastic, ElasticConfig, MultigridSolver, Result};

fn run() -> Result<()> {
    let config = match env::args().nth(1) {
        Some(path) => {
            info!("Reading configuration from {}", path);
            ElasticConfig::from_file(path)?
        }
        None => ElasticConfig::default(),
    };
    config.log_summary();

    let hierarchy = config.hierarchy()?;
    let bc = config.bc()?;
    let stiffness = config.material.stiffness()?;
    let mut op = Elastic::define(hierarchy, bc)?;
    op.set_uniform_model(stiffness)?;

    let geom = op.geom(0, 0).clone();
    let mut u = op.make_field(0, 0);
    let mut b = op.make_field(0, 0);
    init_rhs(op.bc(), &geom, &mut b, config.body_force)?;

    let mut solver = MultigridSolver::new(config.solver.clone());
    let stats = solver.solve(&mut op, &mut u, &b)?;

    println!("=== Elastic bar ===");
    println!("  Nodes:      {:?}", geom.domain);
    println!("  MG levels:  {}", op.num_mg_levels(0));
    println!("  Iterations: {}", stats.iterations);
    println!("  |r|/|r0|:   {:.3e}", stats.relative_residual);
    println!("  Converged:  {}", stats.converged);
    println!("  Time:       {:.3}s", stats.solve_time);

    let length = geom.n_cells(0) as f64 * geom.dx[0];
    let modulus = stiffness.get(0, 0, 0, 0);
    let bx = config.body_force[0];
    let mut tip = 0.0;
    let mut n_tip = 0;
    let mut max_err: f64 = 0.0;
    for fab in u.fabs() {
        for m in fab.valid_box().iter() {
            let x = geom.node_position(m)[0] - geom.prob_lo[0];
            let exact = bx * x * (length - 0.5 * x) / modulus;
            max_err = max_err.max((fab[(m, 0)] - exact).abs());
            if geom.on_high_face(m, 0) {
                tip += fab[(m, 0)];
                n_tip += 1;
            }
        }
    }
    let tip = tip / n_tip.max(1) as f64;
    println!("  Mean tip u_x: {:.6e}", tip);
    println!(
        "  Roller estimate b L^2 / (2 C_xxxx) = {:.6e}",
        bx * length * length / (2.0 * modulus)
    );
    if config.boundary_conditions.preset.as_deref() == Some("clamped_bar_rollers")
        && config.boundary_conditions.faces.is_empty()
    {
        println!("  Max |u_x - exact|: {:.3e}", max_err);
    }

    let energy = op.energy(0, &u)?;
    let cell = geom.dx[..geom.dim].iter().product::<f64>();
    let total: f64 = energy
        .fabs()
        .iter()
        .zip(op.masks().owner(0, 0).fabs())
        .map(|(w, own)| {
            w.valid_box()
                .iter()
                .filter(|m| own[(*m, 0)] == 1)
                .map(|m| w[(m, 0)])
                .sum::<f64>()
        })
        .sum::<f64>()
        * cell;
    println!("  Energy (nodal sum): {:.6e}", total);
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(e) = run() {
        error!("{}", e);
        process::exit(1);
    }
}
