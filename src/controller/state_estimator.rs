// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the state estimator, which republishes the measured state of the robot.
use std::time::Duration;

use crate::controller::config::ControllerConfig;
use crate::controller::control_types::Wrench;
use crate::controller::telemetry::{
    JointState, PoseStamped, PoseTopic, TelemetrySink, WrenchStamped,
};
use crate::controller::{Controller, Lifecycle};
use crate::exception::{create_configuration_exception, LwrResult};
use crate::hardware::{
    cartesian_pose_names, external_torque_names, resolve_handles, tool_wrench_names, AxisHandle,
    HandleSet,
};
use crate::kinematics::{KinematicChainProvider, MountTransform};
use crate::utils::{fri_to_isometry, fri_to_wrench, FRAME_LEN, WRENCH_LEN};

/// Reads the measured state from the hardware and publishes it. Does not command anything.
///
/// Every published cycle produces four messages, all stamped with the cycle time:
/// * the tool pose in the native root frame ([`PoseTopic::Measured`]),
/// * the tool pose in the external base link frame ([`PoseTopic::MeasuredBaseLink`]),
/// * the estimated external wrench at the tool center point, in the tip frame,
/// * the joint state with the estimated external joint torques as effort.
///
/// Publications are throttled to the configured publish rate based on the cycle time.
pub struct StateEstimator {
    mount: MountTransform,
    pose_handles: Vec<AxisHandle>,
    tool_wrench_handles: Vec<AxisHandle>,
    joint_handles: Vec<AxisHandle>,
    external_torque_handles: Vec<AxisHandle>,
    sink: Box<dyn TelemetrySink>,
    publish_period: Duration,
    last_publish: Option<Duration>,
    active: bool,
    measured_frame: [f64; FRAME_LEN],
    measured_wrench: [f64; WRENCH_LEN],
    pose: PoseStamped,
    pose_base_link: PoseStamped,
    wrench: WrenchStamped,
    joint_state: JointState,
}

impl StateEstimator {
    /// Creates a new state estimator.
    /// # Arguments
    /// * `hardware` - handle set used to resolve the axes. Only used during construction.
    /// * `chain` - kinematic chain providing the joint names and the mounting transform.
    /// * `config` - needs `base_link_name`, `root_name` and `tip_name`.
    /// * `sink` - receives the messages.
    /// # Errors
    /// * ConfigurationException if a link name is missing, the mounting transform cannot be
    /// read or an axis is missing.
    pub fn new<H: HandleSet + ?Sized, C: KinematicChainProvider + ?Sized>(
        hardware: &H,
        chain: &C,
        config: &ControllerConfig,
        sink: Box<dyn TelemetrySink>,
    ) -> LwrResult<Self> {
        let base_link_name = config.base_link_name()?;
        let root_name = config.root_name()?;
        let tip_name = config.tip_name()?;
        let robot_name = config.robot_name();
        let publish_period = config.publish_period();
        let mount = MountTransform::from_chain(chain, &base_link_name, &root_name)?;

        let joint_names = chain.joint_names();
        if joint_names.is_empty() {
            return Err(create_configuration_exception(
                "kinematic chain does not contain any joints",
            ));
        }
        let pose_handles = resolve_handles(hardware, &cartesian_pose_names(&robot_name))?;
        let tool_wrench_handles = resolve_handles(hardware, &tool_wrench_names(&robot_name))?;
        let joint_handles = resolve_handles(hardware, &joint_names)?;
        let external_torque_handles =
            resolve_handles(hardware, &external_torque_names(&joint_names))?;
        tracing::debug!(
            "state estimator created for {}, publishing every {:?}",
            robot_name,
            publish_period
        );

        Ok(StateEstimator {
            mount,
            pose_handles,
            tool_wrench_handles,
            joint_handles,
            external_torque_handles,
            sink,
            publish_period,
            last_publish: None,
            active: false,
            measured_frame: [0.; FRAME_LEN],
            measured_wrench: [0.; WRENCH_LEN],
            pose: PoseStamped::new(&root_name),
            pose_base_link: PoseStamped::new(&base_link_name),
            wrench: WrenchStamped::new(&tip_name, Wrench::zero()),
            joint_state: JointState::new(joint_names),
        })
    }

    /// Minimum time between two publications.
    pub fn publish_period(&self) -> Duration {
        self.publish_period
    }

    fn is_due(&self, time: &Duration) -> bool {
        match self.last_publish {
            None => true,
            Some(last) => time.saturating_sub(last) >= self.publish_period,
        }
    }
}

impl Lifecycle for StateEstimator {
    fn starting(&mut self, _time: &Duration) {
        tracing::debug!("starting state estimator");
        self.last_publish = None;
        self.active = true;
    }

    fn stopping(&mut self, _time: &Duration) {
        tracing::debug!("stopping state estimator");
        self.active = false;
    }
}

impl<H: HandleSet + ?Sized> Controller<H> for StateEstimator {
    fn update(&mut self, hardware: &mut H, time: &Duration, _period: &Duration) {
        if !self.active || !self.is_due(time) {
            return;
        }
        self.last_publish = Some(*time);

        for (value, axis) in self.measured_frame.iter_mut().zip(self.pose_handles.iter()) {
            *value = hardware.position(*axis);
        }
        for (value, axis) in self
            .measured_wrench
            .iter_mut()
            .zip(self.tool_wrench_handles.iter())
        {
            *value = hardware.effort(*axis);
        }
        let native = fri_to_isometry(&self.measured_frame);

        self.pose.stamp = *time;
        self.pose.pose = native;
        self.sink.publish_pose(PoseTopic::Measured, &self.pose);

        self.pose_base_link.stamp = *time;
        self.pose_base_link.pose = self.mount.to_external(&native);
        self.sink
            .publish_pose(PoseTopic::MeasuredBaseLink, &self.pose_base_link);

        self.wrench.stamp = *time;
        self.wrench.wrench = fri_to_wrench(&self.measured_wrench);
        self.sink.publish_wrench(&self.wrench);

        for (i, (joint, torque)) in self
            .joint_handles
            .iter()
            .zip(self.external_torque_handles.iter())
            .enumerate()
        {
            self.joint_state.position[i] = hardware.position(*joint);
            self.joint_state.velocity[i] = hardware.velocity(*joint);
            self.joint_state.effort[i] = hardware.effort(*torque);
        }
        self.joint_state.stamp = *time;
        self.sink.publish_joint_state(&self.joint_state);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use approx::assert_relative_eq;
    use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};

    use crate::controller::config::ControllerConfig;
    use crate::controller::state_estimator::StateEstimator;
    use crate::controller::telemetry::test_utils::RecordingSink;
    use crate::controller::telemetry::{MockTelemetrySink, PoseTopic};
    use crate::controller::test_utils::{
        joint_names, lwr_chain, lwr_config, lwr_hardware, set_measured_pose,
    };
    use crate::controller::{Controller, Lifecycle};
    use crate::exception::LwrException;
    use crate::hardware::{tool_wrench_names, MemoryHandleSet};
    use crate::utils::test_utils::assert_isometry_eq;

    fn estimator(config: &ControllerConfig) -> (MemoryHandleSet, StateEstimator, RecordingSink) {
        let hardware = lwr_hardware();
        let sink = RecordingSink::default();
        let estimator =
            StateEstimator::new(&hardware, &lwr_chain(), config, Box::new(sink.clone())).unwrap();
        (hardware, estimator, sink)
    }

    fn tick(estimator: &mut StateEstimator, hardware: &mut MemoryHandleSet, millis: u64) {
        estimator.update(
            hardware,
            &Duration::from_millis(millis),
            &Duration::from_millis(1),
        );
    }

    #[test]
    fn identity_pose_is_published_in_both_frames() {
        let (mut hardware, mut estimator, sink) = estimator(&lwr_config());
        estimator.starting(&Duration::ZERO);
        tick(&mut estimator, &mut hardware, 0);

        let recorded = sink.recorded.lock().unwrap();
        assert_eq!(recorded.poses.len(), 2);
        let (topic, native) = &recorded.poses[0];
        assert_eq!(*topic, PoseTopic::Measured);
        assert_eq!(native.frame_id, "lwr_base_link");
        assert_isometry_eq(&native.pose, &Isometry3::identity(), 1e-12);

        let (topic, external) = &recorded.poses[1];
        assert_eq!(*topic, PoseTopic::MeasuredBaseLink);
        assert_eq!(external.frame_id, "base_link");
        assert_relative_eq!(
            external.pose.translation.vector,
            Vector3::new(0., 0., 0.1),
            epsilon = 1e-12
        );
        assert_relative_eq!(external.pose.rotation.angle(), 0., epsilon = 1e-12);
    }

    #[test]
    fn wrench_and_joint_state() {
        let (mut hardware, mut estimator, sink) = estimator(&lwr_config());
        let pose = Isometry3::from_parts(
            Translation3::new(0.2, 0.3, 0.4),
            UnitQuaternion::from_euler_angles(0.3, 0.2, 0.1),
        );
        set_measured_pose(&mut hardware, &pose);
        for (i, name) in tool_wrench_names("lwr").iter().enumerate() {
            hardware.set_effort_by_name(name, i as f64 + 1.);
        }
        for (i, name) in joint_names().iter().enumerate() {
            hardware.set_position_by_name(name, 0.1 * i as f64);
            hardware.set_velocity_by_name(name, -0.1 * i as f64);
            hardware.set_effort_by_name(name, 100.);
            hardware.set_effort_by_name(&format!("{}_estExtJntTrq", name), i as f64);
        }
        estimator.starting(&Duration::ZERO);
        tick(&mut estimator, &mut hardware, 5);

        let recorded = sink.recorded.lock().unwrap();
        assert_isometry_eq(&recorded.poses[0].1.pose, &pose, 1e-9);

        assert_eq!(recorded.wrenches.len(), 1);
        let wrench = &recorded.wrenches[0];
        assert_eq!(wrench.frame_id, "lwr_7_link");
        assert_eq!(wrench.stamp, Duration::from_millis(5));
        assert_eq!(wrench.wrench.force, Vector3::new(1., 2., 3.));
        assert_eq!(wrench.wrench.torque, Vector3::new(4., 5., 6.));

        assert_eq!(recorded.joint_states.len(), 1);
        let state = &recorded.joint_states[0];
        assert_eq!(state.name, joint_names());
        assert_eq!(state.stamp, Duration::from_millis(5));
        assert_relative_eq!(state.position[6], 0.6, epsilon = 1e-12);
        assert_relative_eq!(state.velocity[6], -0.6, epsilon = 1e-12);
        assert_eq!(state.effort, vec![0., 1., 2., 3., 4., 5., 6.]);
    }

    #[test]
    fn publications_are_throttled() {
        let config = ControllerConfig {
            publish_rate: Some(100.),
            ..lwr_config()
        };
        let (mut hardware, mut estimator, sink) = estimator(&config);
        assert_eq!(estimator.publish_period(), Duration::from_millis(10));

        // inactive
        tick(&mut estimator, &mut hardware, 0);
        assert!(sink.recorded.lock().unwrap().joint_states.is_empty());

        estimator.starting(&Duration::ZERO);
        for millis in 0..25 {
            tick(&mut estimator, &mut hardware, millis);
        }
        let stamps: Vec<Duration> = sink
            .recorded
            .lock()
            .unwrap()
            .joint_states
            .iter()
            .map(|state| state.stamp)
            .collect();
        assert_eq!(
            stamps,
            vec![
                Duration::from_millis(0),
                Duration::from_millis(10),
                Duration::from_millis(20)
            ]
        );

        estimator.stopping(&Duration::from_millis(25));
        tick(&mut estimator, &mut hardware, 40);
        assert_eq!(sink.recorded.lock().unwrap().joint_states.len(), 3);
    }

    #[test]
    fn four_publications_per_cycle() {
        let mut sink = MockTelemetrySink::new();
        sink.expect_publish_pose().times(2).return_const(());
        sink.expect_publish_wrench().times(1).return_const(());
        sink.expect_publish_joint_state()
            .withf(|state| state.name.len() == 7)
            .times(1)
            .return_const(());
        let mut hardware = lwr_hardware();
        let mut estimator =
            StateEstimator::new(&hardware, &lwr_chain(), &lwr_config(), Box::new(sink)).unwrap();
        estimator.starting(&Duration::ZERO);
        estimator.update(&mut hardware, &Duration::ZERO, &Duration::ZERO);
    }

    #[test]
    fn tiny_publish_rate_does_not_fail_construction() {
        let config = ControllerConfig {
            publish_rate: Some(1e-30),
            ..lwr_config()
        };
        let (_, estimator, _) = estimator(&config);
        assert_eq!(estimator.publish_period(), Duration::from_millis(2));
    }

    #[test]
    fn missing_axes_and_links() {
        let hardware = MemoryHandleSet::new(&joint_names());
        assert!(matches!(
            StateEstimator::new(
                &hardware,
                &lwr_chain(),
                &lwr_config(),
                Box::new(RecordingSink::default())
            ),
            Err(LwrException::ConfigurationException { .. })
        ));
        let config = ControllerConfig {
            base_link_name: None,
            ..lwr_config()
        };
        assert!(StateEstimator::new(
            &lwr_hardware(),
            &lwr_chain(),
            &config,
            Box::new(RecordingSink::default())
        )
        .is_err());
    }
}
