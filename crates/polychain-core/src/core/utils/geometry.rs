use nalgebra::{Matrix3, Point3, Rotation3, Unit, Vector3};

pub fn rotation_from_axis_angle(axis: &Vector3<f64>, angle_degrees: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Unit::new_normalize(*axis), angle_degrees.to_radians())
}

/// Builds a right-handed orthonormal frame from three reference points.
///
/// The first axis is `p1 - p0` normalized; the third is the normal of the
/// plane spanned by `p1 - p0` and `p2 - p0`; the second completes the
/// right-handed frame. Returns `None` when the points are collinear or
/// coincident, since no unique frame exists.
pub fn frame_from_points(
    p0: &Point3<f64>,
    p1: &Point3<f64>,
    p2: &Point3<f64>,
) -> Option<Rotation3<f64>> {
    let u = p1 - p0;
    let v = p2 - p0;
    let normal = u.cross(&v);
    if u.norm() < 1e-12 || normal.norm() < 1e-12 {
        return None;
    }
    let x_axis = u.normalize();
    let z_axis = normal.normalize();
    let y_axis = z_axis.cross(&x_axis);
    Some(Rotation3::from_matrix_unchecked(Matrix3::from_columns(&[
        x_axis, y_axis, z_axis,
    ])))
}

/// Computes the world-space rigid transform carrying an original frame
/// (rotation + origin) onto a new one, as a `(rotation, translation)` pair
/// applied as `p' = rotation * p + translation`.
pub fn rigid_transform_between_frames(
    original_rotation: &Rotation3<f64>,
    original_origin: &Point3<f64>,
    new_rotation: &Rotation3<f64>,
    new_origin: &Point3<f64>,
) -> (Rotation3<f64>, Vector3<f64>) {
    let rotation = new_rotation * original_rotation.inverse();
    let translation = new_origin.coords - rotation * original_origin.coords;
    (rotation, translation)
}

pub fn calculate_rmsd(coords1: &[Point3<f64>], coords2: &[Point3<f64>]) -> Option<f64> {
    if coords1.len() != coords2.len() || coords1.is_empty() {
        return None;
    }
    let n = coords1.len() as f64;
    let squared_dist_sum: f64 = coords1
        .iter()
        .zip(coords2.iter())
        .map(|(p1, p2)| (p1 - p2).norm_squared())
        .sum();
    Some((squared_dist_sum / n).sqrt())
}

/// True sphere/axis-aligned-cube intersection test, used by the coarse
/// occupancy map. `cell_min` is the corner of the cube with the smallest
/// coordinates.
pub fn sphere_intersects_cell(
    center: &Point3<f64>,
    radius: f64,
    cell_min: &Point3<f64>,
    cell_size: f64,
) -> bool {
    let mut dist_sq = 0.0;
    for i in 0..3 {
        let lo = cell_min[i];
        let hi = cell_min[i] + cell_size;
        let c = center[i];
        if c < lo {
            dist_sq += (lo - c) * (lo - c);
        } else if c > hi {
            dist_sq += (c - hi) * (c - hi);
        }
    }
    dist_sq <= radius * radius
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-9;

    #[test]
    fn rotation_from_axis_angle_quarter_turn_is_right_handed() {
        let rotation = rotation_from_axis_angle(&Vector3::z(), 90.0);
        assert!((rotation * Vector3::x() - Vector3::y()).norm() < TOL);
    }

    #[test]
    fn rotation_from_axis_angle_fixes_the_axis() {
        let axis = Vector3::new(0.0, 1.0, 0.0);
        let rotation = rotation_from_axis_angle(&axis, 37.0);
        assert!((rotation * axis - axis).norm() < TOL);
    }

    #[test]
    fn rotation_from_axis_angle_negated_angle_inverts() {
        let axis = Vector3::new(1.0, 1.0, 0.0);
        let v = Vector3::new(2.5, -1.0, 0.7);

        let back = rotation_from_axis_angle(&axis, -63.0) * (rotation_from_axis_angle(&axis, 63.0) * v);
        assert!((back - v).norm() < TOL);
    }

    #[test]
    fn frame_from_points_is_orthonormal_and_right_handed() {
        let frame = frame_from_points(
            &Point3::new(1.0, 1.0, 1.0),
            &Point3::new(2.0, 1.0, 1.0),
            &Point3::new(1.0, 3.0, 1.0),
        )
        .unwrap();

        let m = frame.matrix();
        let x: Vector3<f64> = m.column(0).clone_owned();
        let y: Vector3<f64> = m.column(1).clone_owned();
        let z: Vector3<f64> = m.column(2).clone_owned();
        assert!((x.norm() - 1.0).abs() < TOL);
        assert!((y.norm() - 1.0).abs() < TOL);
        assert!((z.norm() - 1.0).abs() < TOL);
        assert!(x.dot(&y).abs() < TOL);
        assert!((x.cross(&y) - z).norm() < TOL);
    }

    #[test]
    fn frame_from_points_rejects_collinear_points() {
        assert!(
            frame_from_points(
                &Point3::origin(),
                &Point3::new(1.0, 0.0, 0.0),
                &Point3::new(2.0, 0.0, 0.0),
            )
            .is_none()
        );
        assert!(
            frame_from_points(&Point3::origin(), &Point3::origin(), &Point3::new(0.0, 1.0, 0.0))
                .is_none()
        );
    }

    #[test]
    fn rigid_transform_between_frames_maps_old_frame_onto_new() {
        let p0 = Point3::new(0.5, 0.5, 0.0);
        let p1 = Point3::new(1.5, 0.5, 0.0);
        let p2 = Point3::new(0.5, 2.0, 0.0);
        let old_frame = frame_from_points(&p0, &p1, &p2).unwrap();

        // Rotate the frame points by a known rigid motion.
        let motion = rotation_from_axis_angle(&Vector3::z(), 30.0);
        let shift = Vector3::new(1.0, -2.0, 0.5);
        let q0 = Point3::from(motion * p0.coords + shift);
        let q1 = Point3::from(motion * p1.coords + shift);
        let q2 = Point3::from(motion * p2.coords + shift);
        let new_frame = frame_from_points(&q0, &q1, &q2).unwrap();

        let (rotation, translation) =
            rigid_transform_between_frames(&old_frame, &p0, &new_frame, &q0);

        // The recovered transform must reproduce the motion on all points.
        for (p, q) in [(p0, q0), (p1, q1), (p2, q2)] {
            let mapped = Point3::from(rotation * p.coords + translation);
            assert!((mapped - q).norm() < TOL);
        }
    }

    #[test]
    fn calculate_rmsd_computes_expected_value() {
        let a = vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        let b = vec![Point3::new(0.0, 3.0, 0.0), Point3::new(1.0, 0.0, 4.0)];
        let rmsd = calculate_rmsd(&a, &b).unwrap();
        assert!((rmsd - ((9.0 + 16.0) / 2.0f64).sqrt()).abs() < TOL);
    }

    #[test]
    fn calculate_rmsd_rejects_mismatched_or_empty_input() {
        assert!(calculate_rmsd(&[], &[]).is_none());
        assert!(calculate_rmsd(&[Point3::origin()], &[]).is_none());
    }

    #[test]
    fn sphere_intersects_cell_detects_overlap_and_miss() {
        let cell_min = Point3::new(0.0, 0.0, 0.0);

        // Center inside the cell.
        assert!(sphere_intersects_cell(&Point3::new(0.5, 0.5, 0.5), 0.1, &cell_min, 1.0));
        // Sphere touching a face from outside.
        assert!(sphere_intersects_cell(&Point3::new(1.4, 0.5, 0.5), 0.5, &cell_min, 1.0));
        // Clearly outside.
        assert!(!sphere_intersects_cell(&Point3::new(3.0, 0.5, 0.5), 0.5, &cell_min, 1.0));
        // Near a corner the diagonal distance governs.
        assert!(!sphere_intersects_cell(&Point3::new(1.5, 1.5, 1.5), 0.5, &cell_min, 1.0));
    }
}
