// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! contains the conversion functions between the flat arrays used by the hardware interface
//! and the geometric types used by the controllers.
//!
//! The array layouts are fixed by the device:
//! * Frame: 12 scalars, three groups of one rotation column followed by one translation entry
//!   `[r00, r10, r20, px, r01, r11, r21, py, r02, r12, r22, pz]`.
//! * Stiffness/damping: 6 scalars `[kx, ky, kz, krx, kry, krz]`.
//! * Wrench: 6 scalars `[fx, fy, fz, tx, ty, tz]`.
use crate::controller::control_types::{Stiffness, Wrench};
use nalgebra::{Isometry3, Matrix3, Rotation3, Translation3, UnitQuaternion, Vector3};

/// Number of scalars of an encoded frame.
pub const FRAME_LEN: usize = 12;
/// Number of scalars of an encoded stiffness or damping.
pub const STIFFNESS_LEN: usize = 6;
/// Number of scalars of an encoded wrench.
pub const WRENCH_LEN: usize = 6;

/// converts the 12 scalar device representation of a frame to an Isometry
///
/// # Panics
/// if `array` has less than 12 entries.
pub fn fri_to_isometry(array: &[f64]) -> Isometry3<f64> {
    assert!(
        array.len() >= FRAME_LEN,
        "frame arrays need {} entries, got {}",
        FRAME_LEN,
        array.len()
    );
    #[rustfmt::skip]
    let matrix = Matrix3::new(
        array[0], array[4], array[8],
        array[1], array[5], array[9],
        array[2], array[6], array[10],
    );
    let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(matrix));
    Isometry3::from_parts(
        Translation3::new(array[3], array[7], array[11]),
        rotation,
    )
}

/// converts an Isometry to the 12 scalar device representation of a frame
pub fn isometry_to_fri(isometry: &Isometry3<f64>) -> [f64; 12] {
    let rotation = isometry.rotation.to_rotation_matrix();
    let matrix = rotation.matrix();
    let translation = &isometry.translation.vector;
    let mut out = [0.; FRAME_LEN];
    for column in 0..3 {
        for row in 0..3 {
            out[column * 4 + row] = matrix[(row, column)];
        }
        out[column * 4 + 3] = translation[column];
    }
    out
}

/// converts the 6 scalar device representation of a stiffness or damping to a [`Stiffness`]
///
/// # Panics
/// if `array` has less than 6 entries.
pub fn fri_to_stiffness(array: &[f64]) -> Stiffness {
    assert!(
        array.len() >= STIFFNESS_LEN,
        "stiffness arrays need {} entries, got {}",
        STIFFNESS_LEN,
        array.len()
    );
    let mut data = [0.; STIFFNESS_LEN];
    data.copy_from_slice(&array[..STIFFNESS_LEN]);
    Stiffness::new(data)
}

/// converts a [`Stiffness`] to its 6 scalar device representation
pub fn stiffness_to_fri(stiffness: &Stiffness) -> [f64; 6] {
    stiffness.data
}

/// converts the 6 scalar device representation of a wrench to a [`Wrench`]
///
/// # Panics
/// if `array` has less than 6 entries.
pub fn fri_to_wrench(array: &[f64]) -> Wrench {
    assert!(
        array.len() >= WRENCH_LEN,
        "wrench arrays need {} entries, got {}",
        WRENCH_LEN,
        array.len()
    );
    Wrench::new(
        Vector3::new(array[0], array[1], array[2]),
        Vector3::new(array[3], array[4], array[5]),
    )
}

/// converts a [`Wrench`] to its 6 scalar device representation `[fx, fy, fz, tx, ty, tz]`
pub fn wrench_to_fri(wrench: &Wrench) -> [f64; 6] {
    [
        wrench.force.x,
        wrench.force.y,
        wrench.force.z,
        wrench.torque.x,
        wrench.torque.y,
        wrench.torque.z,
    ]
}

#[cfg(test)]
pub(crate) mod test_utils {
    use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
    use rand::Rng;

    pub fn random_isometry<R: Rng>(rng: &mut R) -> Isometry3<f64> {
        let axis = Vector3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        let angle = rng.gen_range(-std::f64::consts::PI..std::f64::consts::PI);
        let rotation = if axis.norm() > 1e-3 {
            UnitQuaternion::from_scaled_axis(axis.normalize() * angle)
        } else {
            UnitQuaternion::identity()
        };
        Isometry3::from_parts(
            Translation3::new(
                rng.gen_range(-2.0..2.0),
                rng.gen_range(-2.0..2.0),
                rng.gen_range(-2.0..2.0),
            ),
            rotation,
        )
    }

    pub fn assert_isometry_eq(a: &Isometry3<f64>, b: &Isometry3<f64>, thresh: f64) {
        let ma = a.to_homogeneous();
        let mb = b.to_homogeneous();
        for (x, y) in ma.iter().zip(mb.iter()) {
            assert!((x - y).abs() < thresh, "{} != {}\n{}\n{}", x, y, ma, mb);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::controller::control_types::{Stiffness, Wrench};
    use crate::utils::test_utils::{assert_isometry_eq, random_isometry};
    use crate::utils::{
        fri_to_isometry, fri_to_stiffness, fri_to_wrench, isometry_to_fri, stiffness_to_fri,
        wrench_to_fri,
    };
    use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn frame_layout() {
        // 90 degrees around z: x axis -> y axis, y axis -> -x axis
        let frame = Isometry3::from_parts(
            Translation3::new(0.1, 0.2, 0.3),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2),
        );
        let array = isometry_to_fri(&frame);
        let expected = [0., 1., 0., 0.1, -1., 0., 0., 0.2, 0., 0., 1., 0.3];
        for (a, e) in array.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-12, "{:?}", array);
        }
        assert_isometry_eq(&fri_to_isometry(&expected), &frame, 1e-12);
    }

    #[test]
    fn frame_round_trip() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let frame = random_isometry(&mut rng);
            assert_isometry_eq(&fri_to_isometry(&isometry_to_fri(&frame)), &frame, 1e-9);
        }
    }

    #[test]
    fn stiffness_and_wrench_round_trip() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let mut data = [0.; 6];
            data.iter_mut().for_each(|x| *x = rng.gen_range(0.0..5000.0));
            let stiffness = Stiffness::new(data);
            assert_eq!(fri_to_stiffness(&stiffness_to_fri(&stiffness)), stiffness);

            let wrench = Wrench::new(
                Vector3::new(rng.gen(), rng.gen(), rng.gen()),
                Vector3::new(rng.gen(), rng.gen(), rng.gen()),
            );
            assert_eq!(fri_to_wrench(&wrench_to_fri(&wrench)), wrench);
        }
    }

    #[test]
    fn wrench_layout() {
        let wrench = fri_to_wrench(&[1., 2., 3., 4., 5., 6.]);
        assert_eq!(wrench.force, Vector3::new(1., 2., 3.));
        assert_eq!(wrench.torque, Vector3::new(4., 5., 6.));
    }

    #[test]
    #[should_panic]
    fn short_frame_array_panics() {
        fri_to_isometry(&[0.; 11]);
    }

    #[test]
    #[should_panic]
    fn short_wrench_array_panics() {
        fri_to_wrench(&[0.; 5]);
    }

    #[test]
    #[should_panic]
    fn short_stiffness_array_panics() {
        fri_to_stiffness(&[]);
    }
}
