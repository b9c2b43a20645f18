/// Restriction and interpolation between MG levels
///
/// Linear fields are reproduced exactly by full weighting and by linear
/// interpolation. Transfers through layouts that do not line up with the
/// hierarchy give the same values as the aligned path.

use std::f64::consts::PI;

use approx::assert_relative_eq;
use elastic_mg::{
    BcMatrix, BcType, BoxLayout, Elastic, Geometry, GridHierarchy, HierarchyInfo, NodeField,
};

fn operator(bc: BcMatrix) -> Elastic {
    let geom = Geometry::new(2, [16, 8, 0], [0.0; 3], [2.0, 1.0, 0.0], [false; 3]).unwrap();
    let info = HierarchyInfo {
        max_coarsening_level: 30,
        n_ranks: 3,
    };
    let h = GridHierarchy::single_level(geom, 4, &info).unwrap();
    Elastic::define(h, bc).unwrap()
}

fn linear(m: [isize; 3], p: usize) -> f64 {
    1.0 + 0.5 * m[0] as f64 - 0.25 * m[1] as f64 + p as f64
}

fn fill_linear(field: &mut NodeField<f64>, scale: isize) {
    for fab in field.fabs_mut() {
        for m in fab.valid_box().iter() {
            let mf = [scale * m[0], scale * m[1], 0];
            for p in 0..2 {
                fab[(m, p)] = linear(mf, p);
            }
        }
    }
}

#[test]
fn test_restriction_exact_for_linear_fields() {
    let op = operator(BcMatrix::uniform(2, BcType::Traction));
    let mut fine = op.make_field(0, 0);
    fill_linear(&mut fine, 1);
    let mut crse = op.make_field(0, 1);
    op.restriction(0, 1, &mut crse, &mut fine).unwrap();
    for fab in crse.fabs() {
        for m in fab.valid_box().iter() {
            for p in 0..2 {
                assert_relative_eq!(fab[(m, p)], linear([2 * m[0], 2 * m[1], 0], p), epsilon = 1e-12);
            }
        }
    }
}

#[test]
fn test_interpolation_exact_for_linear_fields() {
    let op = operator(BcMatrix::uniform(2, BcType::Traction));
    let mut crse = op.make_field(0, 1);
    fill_linear(&mut crse, 2);
    let mut fine = op.make_field(0, 0);
    fine.set_val(1.0);
    op.interpolation(0, 0, &mut fine, &crse).unwrap();
    for fab in fine.fabs() {
        for m in fab.valid_box().iter() {
            for p in 0..2 {
                assert_relative_eq!(fab[(m, p)], 1.0 + linear(m, p), epsilon = 1e-12);
            }
        }
    }
}

#[test]
fn test_restriction_zeroes_prescribed_rows() {
    let op = operator(BcMatrix::all_displacement(2));
    let mut fine = op.make_field(0, 0);
    fine.set_val(1.0);
    let mut crse = op.make_field(0, 1);
    op.restriction(0, 1, &mut crse, &mut fine).unwrap();
    let g = op.geom(0, 1).clone();
    for fab in crse.fabs() {
        for m in fab.valid_box().iter() {
            // pinned boundary nodes read only fine boundary nodes; interior
            // coarse nodes never reach the fine boundary
            let expect = if g.on_boundary(m) { 0.0 } else { 1.0 };
            assert_relative_eq!(fab[(m, 0)], expect, epsilon = 1e-12);
        }
    }
    // the fine field had its prescribed rows zeroed too
    assert_relative_eq!(*fine.get([0, 3, 0], 1).unwrap(), 0.0);
}

fn restrict_then_interpolate_error(op: &Elastic, k: f64) -> f64 {
    let geom = op.geom(0, 0).clone();
    let mut fine = op.make_field(0, 0);
    for fab in fine.fabs_mut() {
        for m in fab.valid_box().iter() {
            let x = geom.node_position(m);
            let v = (k * PI * x[0]).sin() * (k * PI * x[1]).sin();
            fab[(m, 0)] = v;
            fab[(m, 1)] = 0.5 * v;
        }
    }
    let original = fine.clone();

    let mut crse = op.make_field(0, 1);
    op.restriction(0, 1, &mut crse, &mut fine).unwrap();
    let mut back = op.make_field(0, 0);
    op.interpolation(0, 0, &mut back, &crse).unwrap();

    let mut err: f64 = 0.0;
    for (bf, of) in back.fabs().iter().zip(original.fabs()) {
        for m in bf.valid_box().iter() {
            for p in 0..2 {
                err = err.max((bf[(m, p)] - of[(m, p)]).abs());
            }
        }
    }
    err
}

#[test]
fn test_round_trip_error_shrinks_for_smoother_fields() {
    let op = operator(BcMatrix::uniform(2, BcType::Traction));
    let errors: Vec<f64> = [1.0, 0.5, 0.25, 0.125]
        .iter()
        .map(|&k| restrict_then_interpolate_error(&op, k))
        .collect();
    assert!(errors[0] < 0.05, "{:?}", errors);
    for w in errors.windows(2) {
        assert!(w[1] < w[0], "{:?}", errors);
    }
    assert!(errors[3] < 0.1 * errors[0], "{:?}", errors);
}

#[test]
fn test_transfers_through_misaligned_layouts() {
    let op = operator(BcMatrix::uniform(2, BcType::Traction));
    let cgeom = op.geom(0, 1).clone();

    let mut fine = op.make_field(0, 0);
    for fab in fine.fabs_mut() {
        for m in fab.valid_box().iter() {
            fab[(m, 0)] = (0.3 * m[0] as f64).cos() + (m[1] as f64).sin();
            fab[(m, 1)] = (m[0] * m[1]) as f64 * 0.01;
        }
    }
    let mut fine_copy = fine.clone();

    let mut aligned = op.make_field(0, 1);
    op.restriction(0, 1, &mut aligned, &mut fine).unwrap();
    let single = BoxLayout::single(&cgeom);
    let mut misaligned = NodeField::new(&single, 2, 2, 0.0);
    op.restriction(0, 1, &mut misaligned, &mut fine_copy).unwrap();
    for m in cgeom.domain.iter() {
        for p in 0..2 {
            assert_relative_eq!(
                *aligned.get(m, p).unwrap(),
                *misaligned.get(m, p).unwrap(),
                epsilon = 1e-12
            );
        }
    }

    let mut up_aligned = op.make_field(0, 0);
    op.interpolation(0, 0, &mut up_aligned, &aligned).unwrap();
    let mut up_misaligned = op.make_field(0, 0);
    op.interpolation(0, 0, &mut up_misaligned, &misaligned).unwrap();
    for (a, b) in up_aligned.fabs().iter().zip(up_misaligned.fabs()) {
        for m in a.valid_box().iter() {
            for p in 0..2 {
                assert_relative_eq!(a[(m, p)], b[(m, p)], epsilon = 1e-12);
            }
        }
    }
}

#[test]
fn test_transfer_level_checks() {
    let op = operator(BcMatrix::all_displacement(2));
    let mut fine = op.make_field(0, 0);
    let mut crse = op.make_field(0, 1);
    assert!(op.restriction(0, 0, &mut crse, &mut fine).is_err());
    let bottom = op.num_mg_levels(0) - 1;
    let mut f = op.make_field(0, bottom);
    assert!(op.interpolation(0, bottom, &mut f, &crse).is_err());
}
