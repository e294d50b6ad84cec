// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the messages published by the controllers and the sink they are published to.
use std::time::Duration;

use crate::controller::control_types::Wrench;
use nalgebra::Isometry3;

#[cfg(test)]
use mockall::automock;

/// Measured state of all joints, index aligned with `name`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JointState {
    /// Cycle time at which the values were read.
    pub stamp: Duration,
    pub name: Vec<String>,
    /// Joint positions in \[rad\].
    pub position: Vec<f64>,
    /// Joint velocities in \[rad/s\].
    pub velocity: Vec<f64>,
    /// Estimated external joint torques in \[Nm\].
    pub effort: Vec<f64>,
}

impl JointState {
    /// Creates a zeroed joint state for the given joints.
    pub fn new(name: Vec<String>) -> Self {
        let n = name.len();
        JointState {
            stamp: Duration::ZERO,
            name,
            position: vec![0.; n],
            velocity: vec![0.; n],
            effort: vec![0.; n],
        }
    }
}

/// A pose expressed in the frame `frame_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseStamped {
    pub stamp: Duration,
    pub frame_id: String,
    pub pose: Isometry3<f64>,
}

impl PoseStamped {
    pub fn new(frame_id: &str) -> Self {
        PoseStamped {
            stamp: Duration::ZERO,
            frame_id: frame_id.to_string(),
            pose: Isometry3::identity(),
        }
    }
}

/// A wrench expressed in the frame `frame_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct WrenchStamped {
    pub stamp: Duration,
    pub frame_id: String,
    pub wrench: Wrench,
}

impl WrenchStamped {
    pub fn new(frame_id: &str, wrench: Wrench) -> Self {
        WrenchStamped {
            stamp: Duration::ZERO,
            frame_id: frame_id.to_string(),
            wrench,
        }
    }
}

/// Topic a pose is published on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PoseTopic {
    /// measured tool pose in the native frame
    Measured,
    /// measured tool pose in the external frame
    MeasuredBaseLink,
    /// desired tool pose in the native frame
    Goal,
}

/// Outbound side of the telemetry.
///
/// Called from inside the control cycle, so implementations must not block. Messages are only
/// borrowed; an implementation which needs to keep them has to copy them.
#[cfg_attr(test, automock)]
pub trait TelemetrySink: Send {
    fn publish_joint_state(&mut self, state: &JointState);
    fn publish_pose(&mut self, topic: PoseTopic, pose: &PoseStamped);
    fn publish_wrench(&mut self, wrench: &WrenchStamped);
}


#[cfg(test)]
mod tests {
    use crate::controller::telemetry::{JointState, PoseStamped};

    #[test]
    fn preallocated_messages() {
        let state = JointState::new(vec!["a".into(), "b".into()]);
        assert_eq!(state.position, vec![0., 0.]);
        assert_eq!(state.effort.len(), 2);
        let pose = PoseStamped::new("lwr_base_link");
        assert_eq!(pose.frame_id, "lwr_base_link");
    }
}
