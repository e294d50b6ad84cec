// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the interfaces to the kinematic chain of the robot.
//!
//! Parsing the robot description is not part of this crate. The controllers only need the
//! ordered joint names, the transform of a named sub chain (to find the mounting transform) and,
//! optionally, a Jacobian. These are provided by implementations of
//! [`KinematicChainProvider`] and [`JacobianSolver`].
use std::collections::HashMap;

use crate::exception::{LwrException, LwrResult};
use nalgebra::Isometry3;

#[cfg(test)]
use mockall::automock;

pub mod jacobian;
pub mod mount;

pub use jacobian::{estimate_wrench, multiply_jacobian, Jacobian};
pub use mount::MountTransform;

/// Capability of a kinematic chain from the robot root to its tip.
#[cfg_attr(test, automock)]
pub trait KinematicChainProvider {
    /// Names of the movable joints, ordered from root to tip. Every joint vector in this crate
    /// is index aligned with this list.
    fn joint_names(&self) -> Vec<String>;
    /// Number of movable joints of the chain.
    fn nr_of_joints(&self) -> usize {
        self.joint_names().len()
    }
    /// Transform of the chain segment from `root` to `tip`, i.e. the pose of `tip` expressed in
    /// `root`.
    /// # Errors
    /// * KinematicsException if there is no chain between the links.
    fn segment_transform(&self, root: &str, tip: &str) -> LwrResult<Isometry3<f64>>;
}

/// Computes the 6xN Jacobian of the chain for a joint configuration.
#[cfg_attr(test, automock)]
pub trait JacobianSolver: Send {
    /// Writes the Jacobian at the joint positions `q` into `jacobian`. The twist output is
    /// expressed in the native root frame. Must not allocate.
    /// # Errors
    /// * KinematicsException if the Jacobian cannot be computed.
    fn jacobian(&mut self, q: &[f64], jacobian: &mut Jacobian) -> LwrResult<()>;
}

/// A kinematic chain given by a list of joint names and a table of known segment transforms.
///
/// Useful if the transforms are known without a robot description, e.g. for a robot mounted
/// at a measured position.
#[derive(Debug, Clone)]
pub struct FixedChain {
    joint_names: Vec<String>,
    segments: HashMap<(String, String), Isometry3<f64>>,
}

impl FixedChain {
    pub fn new(joint_names: Vec<String>) -> Self {
        FixedChain {
            joint_names,
            segments: HashMap::new(),
        }
    }
    /// Adds the transform from `root` to `tip`. The inverse direction is answered as well.
    pub fn with_segment(mut self, root: &str, tip: &str, transform: Isometry3<f64>) -> Self {
        self.segments
            .insert((root.to_string(), tip.to_string()), transform);
        self
    }
}

impl KinematicChainProvider for FixedChain {
    fn joint_names(&self) -> Vec<String> {
        self.joint_names.clone()
    }

    fn segment_transform(&self, root: &str, tip: &str) -> LwrResult<Isometry3<f64>> {
        if root == tip {
            return Ok(Isometry3::identity());
        }
        if let Some(transform) = self.segments.get(&(root.to_string(), tip.to_string())) {
            return Ok(*transform);
        }
        self.segments
            .get(&(tip.to_string(), root.to_string()))
            .map(|transform| transform.inverse())
            .ok_or_else(|| LwrException::KinematicsException {
                message: format!("no chain from {} to {}", root, tip),
            })
    }
}
