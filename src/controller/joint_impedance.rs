// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the joint impedance controller.
//!
//! The impedance law itself runs on the hardware. The controller only forwards desired position,
//! feed forward torque, stiffness and damping of every joint in every cycle.
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::controller::config::ControllerConfig;
use crate::controller::control_types::JointImpedanceCommand;
use crate::controller::{
    check_command_size, check_finite, check_gains, CommandStatus, Controller, ControllerState,
    Lifecycle,
};
use crate::exception::{create_configuration_exception, LwrResult};
use crate::hardware::{resolve_handles, AxisHandle, HandleSet, JointImpedanceInterface};
use crate::kinematics::KinematicChainProvider;

/// Setpoint of the joint impedance controller. All vectors are index aligned with the joint
/// names of the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct JointSetpoint {
    /// Desired joint positions. `None` until the measured positions are latched or a position
    /// is commanded.
    pub position: Option<Vec<f64>>,
    pub feed_forward_torque: Vec<f64>,
    pub stiffness: Vec<f64>,
    pub damping: Vec<f64>,
}

impl JointSetpoint {
    /// Setpoint without desired position, zero feed forward torque and the same gains for
    /// every joint.
    pub fn nominal(nr_of_joints: usize, stiffness: f64, damping: f64) -> Self {
        JointSetpoint {
            position: None,
            feed_forward_torque: vec![0.; nr_of_joints],
            stiffness: vec![stiffness; nr_of_joints],
            damping: vec![damping; nr_of_joints],
        }
    }
}

/// Forwards a joint impedance setpoint to hardware implementing [`JointImpedanceInterface`].
///
/// On the first cycle after [`starting`](`Lifecycle::starting`) the measured joint positions
/// become the desired positions unless a position was commanded before, so the robot holds
/// still after activation.
pub struct JointImpedanceController {
    joint_names: Vec<String>,
    joint_handles: Vec<AxisHandle>,
    setpoint: Arc<ArcSwap<JointSetpoint>>,
    nominal: JointSetpoint,
    measured_position: Vec<f64>,
    measured_velocity: Vec<f64>,
    state: ControllerState,
}

impl JointImpedanceController {
    /// Creates a new joint impedance controller.
    /// # Arguments
    /// * `hardware` - handle set used to resolve the joint axes. Only used during construction.
    /// * `chain` - kinematic chain providing the ordered joint names.
    /// * `config` - configuration, `stiffness_gains` and `damping_gains` are used as nominal
    /// gains for every joint.
    /// # Errors
    /// * ConfigurationException if the chain has no joints or the hardware misses a joint.
    pub fn new<H: HandleSet + ?Sized, C: KinematicChainProvider + ?Sized>(
        hardware: &H,
        chain: &C,
        config: &ControllerConfig,
    ) -> LwrResult<Self> {
        let joint_names = chain.joint_names();
        if joint_names.is_empty() {
            return Err(create_configuration_exception(
                "kinematic chain does not contain any joints",
            ));
        }
        let joint_handles = resolve_handles(hardware, &joint_names)?;
        let n = joint_names.len();
        let nominal = JointSetpoint::nominal(n, config.joint_stiffness(), config.joint_damping());
        tracing::debug!("joint impedance controller created for {} joints", n);
        Ok(JointImpedanceController {
            joint_names,
            joint_handles,
            setpoint: Arc::new(ArcSwap::from_pointee(nominal.clone())),
            nominal,
            measured_position: vec![0.; n],
            measured_velocity: vec![0.; n],
            state: ControllerState::Uninitialized,
        })
    }

    /// Returns a handle to command this controller from another thread.
    pub fn commander(&self) -> JointImpedanceCommander {
        JointImpedanceCommander {
            setpoint: self.setpoint.clone(),
            nr_of_joints: self.joint_names.len(),
        }
    }

    pub fn joint_names(&self) -> &[String] {
        &self.joint_names
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// joint positions read in the last cycle
    pub fn measured_position(&self) -> &[f64] {
        &self.measured_position
    }

    /// joint velocities read in the last cycle
    pub fn measured_velocity(&self) -> &[f64] {
        &self.measured_velocity
    }

    fn latch_measured_position(&self) {
        let measured = &self.measured_position;
        self.setpoint.rcu(|current| {
            let mut next = JointSetpoint::clone(current);
            if next.position.is_none() {
                next.position = Some(measured.clone());
            }
            next
        });
    }
}

impl Lifecycle for JointImpedanceController {
    fn starting(&mut self, _time: &Duration) {
        tracing::debug!("starting joint impedance controller");
        self.state = ControllerState::Holding;
    }

    fn stopping(&mut self, _time: &Duration) {
        tracing::debug!("stopping joint impedance controller");
        self.setpoint.store(Arc::new(self.nominal.clone()));
        self.state = ControllerState::Uninitialized;
    }
}

impl<H: JointImpedanceInterface + ?Sized> Controller<H> for JointImpedanceController {
    fn update(&mut self, hardware: &mut H, _time: &Duration, _period: &Duration) {
        if self.state == ControllerState::Uninitialized {
            return;
        }
        for ((axis, q), dq) in self
            .joint_handles
            .iter()
            .zip(self.measured_position.iter_mut())
            .zip(self.measured_velocity.iter_mut())
        {
            *q = hardware.position(*axis);
            *dq = hardware.velocity(*axis);
        }
        if self.state == ControllerState::Holding {
            self.latch_measured_position();
            self.state = ControllerState::Running;
        }
        let setpoint = self.setpoint.load();
        let position = setpoint
            .position
            .as_deref()
            .unwrap_or(&self.measured_position);
        for (i, axis) in self.joint_handles.iter().enumerate() {
            hardware.set_impedance_command(
                *axis,
                &JointImpedanceCommand {
                    position: position[i],
                    torque: setpoint.feed_forward_torque[i],
                    stiffness: setpoint.stiffness[i],
                    damping: setpoint.damping[i],
                },
            );
        }
    }
}

/// Command side of a [`JointImpedanceController`].
///
/// Every command is validated completely before it is applied. A rejected command leaves the
/// setpoint untouched.
#[derive(Clone)]
pub struct JointImpedanceCommander {
    setpoint: Arc<ArcSwap<JointSetpoint>>,
    nr_of_joints: usize,
}

impl JointImpedanceCommander {
    /// Sets the desired joint positions.
    /// # Errors
    /// * CommandDimension if `position` does not have one entry per joint.
    /// * CommandException if an entry is not finite.
    pub fn set_position(&self, position: &[f64]) -> LwrResult<CommandStatus> {
        if check_command_size("position", position, self.nr_of_joints)? == CommandStatus::Queried
        {
            return Ok(CommandStatus::Queried);
        }
        check_finite("position", position)?;
        self.setpoint.rcu(|current| JointSetpoint {
            position: Some(position.to_vec()),
            ..JointSetpoint::clone(current)
        });
        Ok(CommandStatus::Applied)
    }

    /// Sets the feed forward torques.
    /// # Errors
    /// * CommandDimension if `torque` does not have one entry per joint.
    /// * CommandException if an entry is not finite.
    pub fn set_feed_forward_torque(&self, torque: &[f64]) -> LwrResult<CommandStatus> {
        if check_command_size("add_torque", torque, self.nr_of_joints)? == CommandStatus::Queried {
            return Ok(CommandStatus::Queried);
        }
        check_finite("add_torque", torque)?;
        self.setpoint.rcu(|current| JointSetpoint {
            feed_forward_torque: torque.to_vec(),
            ..JointSetpoint::clone(current)
        });
        Ok(CommandStatus::Applied)
    }

    /// Sets stiffness and damping of all joints together.
    /// # Arguments
    /// * `gains` - stiffness of every joint followed by the damping of every joint.
    /// # Errors
    /// * CommandDimension if `gains` does not have two entries per joint.
    /// * CommandException if a gain is negative or not finite.
    pub fn set_gains(&self, gains: &[f64]) -> LwrResult<CommandStatus> {
        let n = self.nr_of_joints;
        if check_command_size("gains", gains, 2 * n)? == CommandStatus::Queried {
            return Ok(CommandStatus::Queried);
        }
        check_gains("gains", gains)?;
        let (stiffness, damping) = gains.split_at(n);
        self.setpoint.rcu(|current| JointSetpoint {
            stiffness: stiffness.to_vec(),
            damping: damping.to_vec(),
            ..JointSetpoint::clone(current)
        });
        Ok(CommandStatus::Applied)
    }

    /// Current setpoint.
    pub fn setpoint(&self) -> Arc<JointSetpoint> {
        self.setpoint.load_full()
    }

    pub fn nr_of_joints(&self) -> usize {
        self.nr_of_joints
    }
}
