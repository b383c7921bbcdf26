//! Perspective-n-Point pose recovery and Euler angle extraction.
//!
//! The solver is the classic iterative scheme: a direct linear transform
//! over normalized image coordinates seeds a Levenberg-Marquardt
//! refinement of the reprojection error. Euler angles are read from the
//! RQ decomposition of the recovered projection matrix, with Givens
//! rotations ordered x, y, z.

use nalgebra::{
    DMatrix, DVector, Matrix3, Matrix3x4, Point2, Point3, Rotation3, Vector3, Vector6,
};

use crate::camera::CameraModel;
use crate::{Error, Result};

const MAX_LM_ITERATIONS: usize = 30;
const LM_STEP: f64 = 1e-6;

/// Recovered extrinsic pose
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PnpSolution {
    /// Axis-angle rotation vector (radians)
    pub rotation_vector: Vector3<f64>,
    /// Translation from model frame to camera frame
    pub translation: Vector3<f64>,
}

/// Euler angles in degrees, in decomposition output order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EulerAngles {
    /// Rotation about the x axis (decomposition component 0)
    pub pitch: f64,
    /// Rotation about the y axis (decomposition component 1)
    pub yaw: f64,
    /// Rotation about the z axis (decomposition component 2)
    pub roll: f64,
}

/// Project a model point into pixel coordinates.
///
/// Applies the camera's radial-tangential distortion `[k1, k2, p1, p2]`
/// after the perspective divide.
#[must_use]
pub fn project_point(
    point: &Point3<f64>,
    rotation: &Rotation3<f64>,
    translation: &Vector3<f64>,
    camera: &CameraModel,
) -> Point2<f64> {
    let pc = rotation * point.coords + translation;
    let xn = pc.x / pc.z;
    let yn = pc.y / pc.z;

    let d = camera.distortion();
    let (k1, k2, p1, p2) = (d[0], d[1], d[2], d[3]);
    let r2 = xn * xn + yn * yn;
    let radial = 1.0 + k1 * r2 + k2 * r2 * r2;
    let xd = xn * radial + 2.0 * p1 * xn * yn + p2 * (r2 + 2.0 * xn * xn);
    let yd = yn * radial + p1 * (r2 + 2.0 * yn * yn) + 2.0 * p2 * xn * yn;

    let k = camera.intrinsic_matrix();
    Point2::new(k[(0, 0)] * xd + k[(0, 2)], k[(1, 1)] * yd + k[(1, 2)])
}

/// Solve for the pose mapping `object_points` onto `image_points`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] on mismatched or insufficient
/// correspondences (at least 6 are required) or a degenerate
/// configuration.
pub fn solve_pnp(
    object_points: &[Point3<f64>],
    image_points: &[Point2<f64>],
    camera: &CameraModel,
) -> Result<PnpSolution> {
    if object_points.len() != image_points.len() {
        return Err(Error::InvalidInput(format!(
            "{} object points against {} image points",
            object_points.len(),
            image_points.len()
        )));
    }
    if object_points.len() < 6 {
        return Err(Error::InvalidInput(format!(
            "{} correspondences, PnP needs at least 6",
            object_points.len()
        )));
    }

    let (rotation, translation) = dlt_initialize(object_points, image_points, camera)?;
    let params = refine(object_points, image_points, camera, &rotation, &translation);

    Ok(PnpSolution {
        rotation_vector: Vector3::new(params[0], params[1], params[2]),
        translation: Vector3::new(params[3], params[4], params[5]),
    })
}

/// Direct linear transform over normalized coordinates.
///
/// Distortion is ignored here; the refinement stage models it through the
/// full projection.
fn dlt_initialize(
    object_points: &[Point3<f64>],
    image_points: &[Point2<f64>],
    camera: &CameraModel,
) -> Result<(Rotation3<f64>, Vector3<f64>)> {
    let k_inv = camera
        .intrinsic_matrix()
        .try_inverse()
        .ok_or_else(|| Error::InvalidInput("intrinsic matrix is not invertible".to_string()))?;

    let n = object_points.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 12);
    for (i, (obj, pix)) in object_points.iter().zip(image_points.iter()).enumerate() {
        let v = k_inv * Vector3::new(pix.x, pix.y, 1.0);
        let u = v.x / v.z;
        let w = v.y / v.z;

        let r0 = 2 * i;
        let r1 = r0 + 1;
        a[(r0, 0)] = obj.x;
        a[(r0, 1)] = obj.y;
        a[(r0, 2)] = obj.z;
        a[(r0, 3)] = 1.0;
        a[(r0, 8)] = -u * obj.x;
        a[(r0, 9)] = -u * obj.y;
        a[(r0, 10)] = -u * obj.z;
        a[(r0, 11)] = -u;

        a[(r1, 4)] = obj.x;
        a[(r1, 5)] = obj.y;
        a[(r1, 6)] = obj.z;
        a[(r1, 7)] = 1.0;
        a[(r1, 8)] = -w * obj.x;
        a[(r1, 9)] = -w * obj.y;
        a[(r1, 10)] = -w * obj.z;
        a[(r1, 11)] = -w;
    }

    // Null vector of A via the smallest eigenpair of A^T A.
    let ata = a.transpose() * &a;
    let eig = ata.symmetric_eigen();
    let min_idx = eig
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|(_, x), (_, y)| x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(idx, _)| idx)
        .ok_or_else(|| Error::InvalidInput("eigensolver failed in PnP".to_string()))?;
    let p: DVector<f64> = eig.eigenvectors.column(min_idx).into();

    let m = Matrix3::new(p[0], p[1], p[2], p[4], p[5], p[6], p[8], p[9], p[10]);
    let mut t = Vector3::new(p[3], p[7], p[11]);

    // Rows of M are a scaled rotation; the mean row norm recovers the scale.
    let scale = (m.row(0).norm() + m.row(1).norm() + m.row(2).norm()) / 3.0;
    if scale < f64::EPSILON {
        return Err(Error::InvalidInput("degenerate PnP configuration".to_string()));
    }
    t /= scale;

    let svd = (m / scale).svd(true, true);
    let u = svd
        .u
        .ok_or_else(|| Error::InvalidInput("SVD failed in PnP".to_string()))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| Error::InvalidInput("SVD failed in PnP".to_string()))?;
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        r = -r;
        t = -t;
    }

    Ok((Rotation3::from_matrix(&r), t))
}

fn reprojection_residuals(
    object_points: &[Point3<f64>],
    image_points: &[Point2<f64>],
    camera: &CameraModel,
    params: &Vector6<f64>,
) -> DVector<f64> {
    let rotation = Rotation3::from_scaled_axis(Vector3::new(params[0], params[1], params[2]));
    let translation = Vector3::new(params[3], params[4], params[5]);
    let mut residuals = DVector::zeros(2 * object_points.len());
    for (i, (obj, pix)) in object_points.iter().zip(image_points.iter()).enumerate() {
        let projected = project_point(obj, &rotation, &translation, camera);
        residuals[2 * i] = projected.x - pix.x;
        residuals[2 * i + 1] = projected.y - pix.y;
    }
    residuals
}

/// Levenberg-Marquardt over the stacked reprojection residuals, with a
/// central-difference Jacobian in the six pose parameters.
fn refine(
    object_points: &[Point3<f64>],
    image_points: &[Point2<f64>],
    camera: &CameraModel,
    rotation: &Rotation3<f64>,
    translation: &Vector3<f64>,
) -> Vector6<f64> {
    let axis = rotation.scaled_axis();
    let mut params = Vector6::new(
        axis.x,
        axis.y,
        axis.z,
        translation.x,
        translation.y,
        translation.z,
    );
    let mut best =
        reprojection_residuals(object_points, image_points, camera, &params).norm_squared();
    let mut lambda = 1e-3;
    let rows = 2 * object_points.len();

    for _ in 0..MAX_LM_ITERATIONS {
        let residuals = reprojection_residuals(object_points, image_points, camera, &params);
        let mut jacobian = DMatrix::<f64>::zeros(rows, 6);
        for c in 0..6 {
            let mut forward = params;
            forward[c] += LM_STEP;
            let mut backward = params;
            backward[c] -= LM_STEP;
            let rf = reprojection_residuals(object_points, image_points, camera, &forward);
            let rb = reprojection_residuals(object_points, image_points, camera, &backward);
            for row in 0..rows {
                jacobian[(row, c)] = (rf[row] - rb[row]) / (2.0 * LM_STEP);
            }
        }
        let jtj = jacobian.transpose() * &jacobian;
        let jtr = jacobian.transpose() * &residuals;

        let mut improved = false;
        for _ in 0..10 {
            let mut damped = jtj.clone();
            for i in 0..6 {
                damped[(i, i)] += lambda * jtj[(i, i)].max(1e-12);
            }
            let Some(step) = damped.lu().solve(&jtr) else {
                lambda *= 10.0;
                continue;
            };
            let mut candidate = params;
            for i in 0..6 {
                candidate[i] -= step[i];
            }
            let err = reprojection_residuals(object_points, image_points, camera, &candidate)
                .norm_squared();
            if err < best {
                params = candidate;
                best = err;
                lambda = (lambda * 0.1).max(1e-12);
                improved = true;
                break;
            }
            lambda *= 10.0;
        }
        if !improved || best < 1e-18 {
            break;
        }
    }
    params
}

/// Rotation vector to rotation matrix (Rodrigues formula)
#[must_use]
pub fn rodrigues(rotation_vector: &Vector3<f64>) -> Matrix3<f64> {
    Rotation3::from_scaled_axis(*rotation_vector).into_inner()
}

/// Augment a rotation matrix into a 3×4 projection matrix with a zero
/// translation column
#[must_use]
pub fn augment_projection(rotation: &Matrix3<f64>) -> Matrix3x4<f64> {
    let mut projection = Matrix3x4::zeros();
    projection.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
    projection
}

/// Euler angles from the RQ decomposition of a projection matrix.
///
/// Givens rotations about x, y and z in turn zero the lower triangle of
/// the 3×3 part; each rotation's angle is one Euler component, reported
/// in degrees.
#[must_use]
pub fn decompose_projection(projection: &Matrix3x4<f64>) -> EulerAngles {
    let m = projection.fixed_view::<3, 3>(0, 0).into_owned();

    // Qx zeroes m[(2,1)]
    let (cx, sx) = givens(m[(2, 2)], m[(2, 1)]);
    let qx = Matrix3::new(1.0, 0.0, 0.0, 0.0, cx, sx, 0.0, -sx, cx);
    let m1 = m * qx;

    // Qy zeroes m[(2,0)]
    let (cy, sy) = givens(m1[(2, 2)], -m1[(2, 0)]);
    let qy = Matrix3::new(cy, 0.0, -sy, 0.0, 1.0, 0.0, sy, 0.0, cy);
    let m2 = m1 * qy;

    // Qz zeroes m[(1,0)]
    let (cz, sz) = givens(m2[(1, 1)], m2[(1, 0)]);

    EulerAngles {
        pitch: sx.atan2(cx).to_degrees(),
        yaw: sy.atan2(cy).to_degrees(),
        roll: sz.atan2(cz).to_degrees(),
    }
}

fn givens(c: f64, s: f64) -> (f64, f64) {
    let z = 1.0 / (c * c + s * s + f64::EPSILON).sqrt();
    (c * z, s * z)
}

/// One-shot pitch recentering for near-frontal viewing.
///
/// The decomposition reports pitch near ±180° for a frontal face; this
/// folds it back around zero. It is not a general unwrapping: sustained
/// rotation past the fold still produces a discontinuity, and the rule
/// itself jumps between -180 and 180 at raw pitch 0.
#[must_use]
pub fn normalize_pitch(pitch: f64) -> f64 {
    if pitch < 0.0 {
        -180.0 - pitch
    } else {
        180.0 - pitch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::FACE_MODEL_POINTS;

    fn model_points() -> Vec<Point3<f64>> {
        FACE_MODEL_POINTS
            .iter()
            .map(|p| Point3::new(p[0], p[1], p[2]))
            .collect()
    }

    /// Frontal-face rotation: model axes flipped into camera axes
    fn frontal() -> Matrix3<f64> {
        Matrix3::new(1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 0.0, -1.0)
    }

    #[test]
    fn test_rodrigues_identity() {
        let r = rodrigues(&Vector3::zeros());
        assert!((r - Matrix3::identity()).norm() < 1e-12);
    }

    #[test]
    fn test_rodrigues_quarter_turn() {
        let r = rodrigues(&Vector3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2));
        let rotated = r * Vector3::new(1.0, 0.0, 0.0);
        assert!((rotated - Vector3::new(0.0, 1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_decompose_identity() {
        let euler = decompose_projection(&augment_projection(&Matrix3::identity()));
        assert!(euler.pitch.abs() < 1e-9);
        assert!(euler.yaw.abs() < 1e-9);
        assert!(euler.roll.abs() < 1e-9);
    }

    #[test]
    fn test_decompose_frontal_face() {
        let euler = decompose_projection(&augment_projection(&frontal()));
        assert!((euler.pitch.abs() - 180.0).abs() < 1e-9);
        assert!(euler.yaw.abs() < 1e-9);
        assert!(euler.roll.abs() < 1e-9);
        assert!(normalize_pitch(euler.pitch).abs() < 1e-9);
    }

    #[test]
    fn test_decompose_yawed_face() {
        let turned = Rotation3::from_axis_angle(&Vector3::y_axis(), 20_f64.to_radians())
            .into_inner()
            * frontal();
        let euler = decompose_projection(&augment_projection(&turned));
        assert!((euler.yaw - 20.0).abs() < 1e-9);
        assert!(normalize_pitch(euler.pitch).abs() < 1e-9);
        assert!(euler.roll.abs() < 1e-9);
    }

    #[test]
    fn test_normalize_pitch_rule() {
        assert_eq!(normalize_pitch(-170.0), -10.0);
        assert_eq!(normalize_pitch(170.0), 10.0);
        assert_eq!(normalize_pitch(0.0), 180.0);
        assert_eq!(normalize_pitch(-180.0), 0.0);
        assert_eq!(normalize_pitch(180.0), 0.0);
    }

    #[test]
    fn test_normalize_pitch_bounded_with_zero_discontinuity() {
        let mut p = -180.0;
        while p <= 180.0 {
            let fixed = normalize_pitch(p);
            assert!((-180.0..=180.0).contains(&fixed), "pitch {p} mapped to {fixed}");
            p += 0.5;
        }
        // The two branches disagree by a full turn at the boundary.
        let below = normalize_pitch(-1e-9);
        let above = normalize_pitch(0.0);
        assert!((above - below - 360.0).abs() < 1e-6);
    }

    #[test]
    fn test_solve_pnp_recovers_synthetic_pose() {
        let camera = CameraModel::default();
        let object = model_points();
        let rotation = Rotation3::from_matrix(
            &(Rotation3::from_axis_angle(&Vector3::y_axis(), 15_f64.to_radians()).into_inner()
                * frontal()),
        );
        let translation = Vector3::new(1.5, -2.0, 55.0);
        let image: Vec<Point2<f64>> = object
            .iter()
            .map(|p| project_point(p, &rotation, &translation, &camera))
            .collect();

        let solution = solve_pnp(&object, &image, &camera).unwrap();
        let recovered = Rotation3::from_scaled_axis(solution.rotation_vector);

        assert!((solution.translation - translation).norm() < 1e-4);
        assert!((recovered.into_inner() - rotation.into_inner()).norm() < 1e-6);

        let residual = reprojection_residuals(
            &object,
            &image,
            &camera,
            &Vector6::new(
                solution.rotation_vector.x,
                solution.rotation_vector.y,
                solution.rotation_vector.z,
                solution.translation.x,
                solution.translation.y,
                solution.translation.z,
            ),
        );
        assert!(residual.norm() < 1e-6);
    }

    #[test]
    fn test_solve_pnp_euler_pipeline_matches_generator() {
        let camera = CameraModel::default();
        let object = model_points();
        let generator = Rotation3::from_axis_angle(&Vector3::y_axis(), -25_f64.to_radians())
            .into_inner()
            * frontal();
        let rotation = Rotation3::from_matrix(&generator);
        let translation = Vector3::new(0.0, 0.0, 60.0);
        let image: Vec<Point2<f64>> = object
            .iter()
            .map(|p| project_point(p, &rotation, &translation, &camera))
            .collect();

        let solution = solve_pnp(&object, &image, &camera).unwrap();
        let rmat = rodrigues(&solution.rotation_vector);
        let euler = decompose_projection(&augment_projection(&rmat));
        assert!((euler.yaw - -25.0).abs() < 1e-4);
        assert!(normalize_pitch(euler.pitch).abs() < 1e-4);
        assert!(euler.roll.abs() < 1e-4);
    }

    #[test]
    fn test_solve_pnp_validates_input() {
        let camera = CameraModel::default();
        let object = model_points();
        let image = vec![Point2::new(0.0, 0.0); 5];
        assert!(solve_pnp(&object, &image, &camera).is_err());
        assert!(solve_pnp(&object[..5], &image[..5], &camera).is_err());
    }
}
