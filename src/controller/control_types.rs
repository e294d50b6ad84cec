// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the value types exchanged between the control laws, the command path and the
//! hardware command interfaces.

use serde::Deserialize;
use serde::Serialize;

use crate::exception::{create_command_exception, LwrException, LwrResult};
use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3, Vector6};

/// Number of scalars of a flat pose payload `[x, y, z, qx, qy, qz, qw]`.
pub const POSE_LEN: usize = 7;

/// Diagonal Cartesian impedance gains.
///
/// The same type is used for stiffness and damping. The order of the entries is
/// `[kx, ky, kz, krx, kry, krz]` (3 translational, 3 rotational). No cross coupling is modeled.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct Stiffness {
    pub data: [f64; 6],
}

impl Stiffness {
    /// Creates a new Stiffness instance
    /// # Arguments
    /// * `data` - gains in the order `[kx, ky, kz, krx, kry, krz]`.
    pub fn new(data: [f64; 6]) -> Self {
        Stiffness { data }
    }
    /// Creates stiffness with the same gain for all translational and the same gain for all
    /// rotational directions.
    pub fn from_parts(translational: f64, rotational: f64) -> Self {
        Stiffness {
            data: [
                translational,
                translational,
                translational,
                rotational,
                rotational,
                rotational,
            ],
        }
    }
    /// Determines whether all gains are finite and non negative.
    pub fn is_physical(&self) -> bool {
        self.data.iter().all(|x| x.is_finite() && *x >= 0.)
    }
}

impl From<[f64; 6]> for Stiffness {
    fn from(data: [f64; 6]) -> Self {
        Stiffness::new(data)
    }
}

/// Force and torque acting on a body.
///
/// A Wrench carries no frame information on its own; whenever it crosses an interface it is
/// wrapped in a [`WrenchStamped`](`crate::controller::telemetry::WrenchStamped`).
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct Wrench {
    /// Force in \[N\].
    pub force: Vector3<f64>,
    /// Torque in \[Nm\].
    pub torque: Vector3<f64>,
}

impl Wrench {
    pub fn new(force: Vector3<f64>, torque: Vector3<f64>) -> Self {
        Wrench { force, torque }
    }
    pub fn zero() -> Self {
        Wrench::new(Vector3::zeros(), Vector3::zeros())
    }
    /// stacks force and torque into `[fx, fy, fz, tx, ty, tz]`
    pub fn to_vector(&self) -> Vector6<f64> {
        Vector6::new(
            self.force.x,
            self.force.y,
            self.force.z,
            self.torque.x,
            self.torque.y,
            self.torque.z,
        )
    }
    pub fn from_vector(vector: &Vector6<f64>) -> Self {
        Wrench::new(
            Vector3::new(vector[0], vector[1], vector[2]),
            Vector3::new(vector[3], vector[4], vector[5]),
        )
    }
}

impl Default for Wrench {
    fn default() -> Self {
        Wrench::zero()
    }
}

impl std::ops::Add for Wrench {
    type Output = Wrench;

    fn add(self, rhs: Wrench) -> Wrench {
        Wrench::new(self.force + rhs.force, self.torque + rhs.torque)
    }
}

/// A pose as it arrives from the command path.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct Pose {
    /// Position `[x, y, z]` in \[m\].
    pub position: [f64; 3],
    /// Orientation as quaternion `[qx, qy, qz, qw]`. Does not have to be normalized.
    pub orientation: [f64; 4],
}

impl Pose {
    pub fn new(position: [f64; 3], orientation: [f64; 4]) -> Self {
        Pose {
            position,
            orientation,
        }
    }
    /// Creates a Pose from a flat `[x, y, z, qx, qy, qz, qw]` payload.
    /// # Errors
    /// * CommandDimension if the payload does not have exactly 7 entries.
    pub fn from_slice(data: &[f64]) -> LwrResult<Self> {
        if data.len() != POSE_LEN {
            return Err(LwrException::CommandDimension {
                command: "pose",
                expected: POSE_LEN,
                actual: data.len(),
            });
        }
        Ok(Pose::new(
            [data[0], data[1], data[2]],
            [data[3], data[4], data[5], data[6]],
        ))
    }
    /// Converts the pose into an Isometry, normalizing the quaternion.
    /// # Errors
    /// * CommandException if a value is not finite or the quaternion has zero norm.
    pub fn to_isometry(&self) -> LwrResult<Isometry3<f64>> {
        if !self
            .position
            .iter()
            .chain(self.orientation.iter())
            .all(|x| x.is_finite())
        {
            return Err(create_command_exception("pose contains non finite values"));
        }
        let [qx, qy, qz, qw] = self.orientation;
        let quaternion = Quaternion::new(qw, qx, qy, qz);
        let rotation = UnitQuaternion::try_new(quaternion, f64::EPSILON)
            .ok_or_else(|| create_command_exception("pose orientation has zero norm"))?;
        let [x, y, z] = self.position;
        Ok(Isometry3::from_parts(Translation3::new(x, y, z), rotation))
    }
    pub fn from_isometry(isometry: &Isometry3<f64>) -> Self {
        let t = isometry.translation.vector;
        let q = isometry.rotation.quaternion();
        Pose::new([t.x, t.y, t.z], [q.i, q.j, q.k, q.w])
    }
}

/// Per joint command of the joint impedance interface.
///
/// The hardware applies
/// `torque = stiffness * (position - measured) - damping * velocity + torque_ff`.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct JointImpedanceCommand {
    /// Desired joint position in \[rad\].
    pub position: f64,
    /// Feed forward torque in \[Nm\].
    pub torque: f64,
    /// Joint stiffness in \[Nm/rad\].
    pub stiffness: f64,
    /// Normalized joint damping.
    pub damping: f64,
}

/// Which kind of feed forward the Cartesian hardware interface expects. Chosen once in the
/// configuration, never at runtime.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedForwardMode {
    /// The wrench is sent as `[fx, fy, fz, tx, ty, tz]` in the native frame.
    Cartesian,
    /// The wrench is mapped through the transposed Jacobian and sent as joint torques.
    JointSpace,
}

impl Default for FeedForwardMode {
    fn default() -> Self {
        FeedForwardMode::Cartesian
    }
}

/// Feed forward part of a [`CartesianImpedanceCommand`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum FeedForward<'a> {
    /// Wrench in device layout `[fx, fy, fz, tx, ty, tz]`.
    Cartesian([f64; 6]),
    /// Joint torques, one per joint, index aligned with the chain's joint names.
    Joint(&'a [f64]),
}

/// Command of the Cartesian impedance interface in device layout.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CartesianImpedanceCommand<'a> {
    /// Desired pose, see [`isometry_to_fri`](`crate::utils::isometry_to_fri`).
    pub pose: [f64; 12],
    pub stiffness: [f64; 6],
    pub damping: [f64; 6],
    pub feed_forward: FeedForward<'a>,
}
