// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the mapping between Cartesian wrenches and joint torques through the Jacobian.
use crate::controller::control_types::Wrench;
use nalgebra::{Matrix6, Matrix6xX, Vector6};

/// A Jacobian with 6 rows and one column per joint. Maps joint velocities to the twist
/// `[vx, vy, vz, wx, wy, wz]`.
pub type Jacobian = Matrix6xX<f64>;

/// Maps a wrench to joint torques with the transposed Jacobian: `dest = J^T * wrench`.
///
/// The wrench has to be expressed in the same frame as the twist output of the Jacobian; no
/// frame conversion happens here.
///
/// # Panics
/// if the number of columns of `jacobian` differs from the length of `dest`.
pub fn multiply_jacobian(jacobian: &Jacobian, wrench: &Wrench, dest: &mut [f64]) {
    assert_eq!(
        jacobian.ncols(),
        dest.len(),
        "Jacobian has {} columns but the torque vector has {} entries",
        jacobian.ncols(),
        dest.len()
    );
    let wrench = wrench.to_vector();
    for (i, tau) in dest.iter_mut().enumerate() {
        *tau = jacobian.column(i).dot(&wrench);
    }
}

/// Estimates the Cartesian wrench which explains the external joint torques `tau_ext` in the
/// least squares sense: `(J J^T)^-1 J tau_ext`.
///
/// # Return
/// `None` if `J J^T` is singular, e.g. in a singular configuration or for less than 6 joints.
///
/// # Panics
/// if the number of columns of `jacobian` differs from the length of `tau_ext`.
pub fn estimate_wrench(jacobian: &Jacobian, tau_ext: &[f64]) -> Option<Wrench> {
    assert_eq!(jacobian.ncols(), tau_ext.len());
    let mut j_jt = Matrix6::<f64>::zeros();
    let mut j_tau = Vector6::<f64>::zeros();
    for (i, tau) in tau_ext.iter().enumerate() {
        let column = jacobian.column(i);
        j_jt += column * column.transpose();
        j_tau += column * *tau;
    }
    j_jt.try_inverse()
        .map(|inverse| Wrench::from_vector(&(inverse * j_tau)))
}
