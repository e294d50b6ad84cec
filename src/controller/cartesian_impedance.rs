// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the Cartesian impedance controller.
//!
//! The Cartesian impedance law runs on the hardware. The controller keeps the setpoint in the
//! native root frame of the robot, converts commands given in the external frame at ingestion
//! and sends desired pose, stiffness, damping and feed forward wrench in every cycle.
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use nalgebra::Isometry3;

use crate::controller::config::ControllerConfig;
use crate::controller::control_types::{
    CartesianImpedanceCommand, FeedForward, FeedForwardMode, Pose, Stiffness, Wrench,
};
use crate::controller::telemetry::{PoseStamped, PoseTopic, TelemetrySink, WrenchStamped};
use crate::controller::{
    check_command_size, check_finite, check_gains, CommandStatus, Controller, ControllerState,
    Lifecycle,
};
use crate::exception::{
    create_command_exception, create_configuration_exception, LwrException, LwrResult,
};
use crate::hardware::{
    cartesian_pose_names, external_torque_names, resolve_handles, AxisHandle,
    CartesianImpedanceInterface, HandleSet,
};
use crate::kinematics::{
    estimate_wrench, multiply_jacobian, Jacobian, JacobianSolver, KinematicChainProvider,
    MountTransform,
};
use crate::utils::{
    fri_to_isometry, fri_to_stiffness, fri_to_wrench, isometry_to_fri, stiffness_to_fri,
    wrench_to_fri, FRAME_LEN, STIFFNESS_LEN, WRENCH_LEN,
};

/// Setpoint of the Cartesian impedance controller. Everything is expressed in the native root
/// frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CartesianSetpoint {
    /// Desired tool pose. `None` until the measured pose is latched or a pose is commanded.
    pub pose: Option<Isometry3<f64>>,
    pub stiffness: Stiffness,
    pub damping: Stiffness,
    /// Desired wrench.
    pub wrench: Wrench,
    /// Bias wrench which is added to the desired wrench.
    pub additional_wrench: Wrench,
}

impl CartesianSetpoint {
    pub fn nominal(stiffness: Stiffness, damping: Stiffness) -> Self {
        CartesianSetpoint {
            pose: None,
            stiffness,
            damping,
            wrench: Wrench::zero(),
            additional_wrench: Wrench::zero(),
        }
    }
}

/// Forwards a Cartesian impedance setpoint to hardware implementing
/// [`CartesianImpedanceInterface`].
///
/// The feed forward wrench is either sent as Cartesian wrench or mapped through the transposed
/// Jacobian into joint torques, depending on
/// [`feed_forward`](`crate::controller::ControllerConfig::feed_forward`). The mapping needs
/// a [`JacobianSolver`]. If a solver is available, the controller also estimates the external
/// wrench from the estimated external joint torques.
pub struct CartesianImpedanceController {
    root_name: String,
    base_link_name: String,
    mount: MountTransform,
    feed_forward: FeedForwardMode,
    pose_handles: Vec<AxisHandle>,
    joint_handles: Vec<AxisHandle>,
    external_torque_handles: Option<Vec<AxisHandle>>,
    jacobian_solver: Option<Box<dyn JacobianSolver>>,
    telemetry: Option<Box<dyn TelemetrySink>>,
    setpoint: Arc<ArcSwap<CartesianSetpoint>>,
    nominal: CartesianSetpoint,
    state: ControllerState,
    measured_frame: [f64; FRAME_LEN],
    measured_pose: Isometry3<f64>,
    joint_position: Vec<f64>,
    external_torque: Vec<f64>,
    jacobian: Jacobian,
    jacobian_valid: bool,
    jacobian_error_logged: bool,
    joint_torque: Vec<f64>,
    wrench_estimate: Option<Wrench>,
    measured_message: PoseStamped,
    goal_message: PoseStamped,
    wrench_message: WrenchStamped,
}

impl CartesianImpedanceController {
    /// Creates a new Cartesian impedance controller.
    /// # Arguments
    /// * `hardware` - handle set used to resolve the axes. Only used during construction.
    /// * `chain` - kinematic chain providing the joint names and the mounting transform.
    /// * `config` - needs `base_link_name`, `root_name` and `tip_name`.
    /// * `jacobian_solver` - optional, required for joint space feed forward.
    /// # Errors
    /// * ConfigurationException if a link name is missing, the mounting transform cannot be
    /// read, an axis is missing or joint space feed forward is configured without a Jacobian
    /// solver.
    pub fn new<H: HandleSet + ?Sized, C: KinematicChainProvider + ?Sized>(
        hardware: &H,
        chain: &C,
        config: &ControllerConfig,
        jacobian_solver: Option<Box<dyn JacobianSolver>>,
    ) -> LwrResult<Self> {
        let base_link_name = config.base_link_name()?;
        let root_name = config.root_name()?;
        config.tip_name()?;
        let robot_name = config.robot_name();
        let mount = MountTransform::from_chain(chain, &base_link_name, &root_name)?;

        let joint_names = chain.joint_names();
        if joint_names.is_empty() {
            return Err(create_configuration_exception(
                "kinematic chain does not contain any joints",
            ));
        }
        let n = joint_names.len();
        let pose_handles = resolve_handles(hardware, &cartesian_pose_names(&robot_name))?;
        let joint_handles = resolve_handles(hardware, &joint_names)?;

        let feed_forward = config.feed_forward;
        if feed_forward == FeedForwardMode::JointSpace && jacobian_solver.is_none() {
            tracing::error!("joint space feed forward needs a Jacobian solver");
            return Err(create_configuration_exception(
                "joint space feed forward needs a Jacobian solver",
            ));
        }
        let external_torque_handles = match jacobian_solver {
            Some(_) => match resolve_handles(hardware, &external_torque_names(&joint_names)) {
                Ok(handles) => Some(handles),
                Err(error) => {
                    tracing::warn!("external wrench will not be estimated: {}", error);
                    None
                }
            },
            None => None,
        };

        let nominal =
            CartesianSetpoint::nominal(config.cartesian_stiffness(), config.cartesian_damping());
        tracing::debug!(
            "Cartesian impedance controller created for {} with {:?} feed forward",
            robot_name,
            feed_forward
        );
        Ok(CartesianImpedanceController {
            mount,
            feed_forward,
            pose_handles,
            joint_handles,
            external_torque_handles,
            jacobian_solver,
            telemetry: None,
            setpoint: Arc::new(ArcSwap::from_pointee(nominal)),
            nominal,
            state: ControllerState::Uninitialized,
            measured_frame: [0.; FRAME_LEN],
            measured_pose: Isometry3::identity(),
            joint_position: vec![0.; n],
            external_torque: vec![0.; n],
            jacobian: Jacobian::zeros(n),
            jacobian_valid: false,
            jacobian_error_logged: false,
            joint_torque: vec![0.; n],
            wrench_estimate: None,
            measured_message: PoseStamped::new(&root_name),
            goal_message: PoseStamped::new(&root_name),
            wrench_message: WrenchStamped::new(&root_name, Wrench::zero()),
            root_name,
            base_link_name,
        })
    }

    /// Publishes measured pose, goal pose and wrench estimate to `sink` in every cycle.
    pub fn with_telemetry(mut self, sink: Box<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(sink);
        self
    }

    /// Returns a handle to command this controller from another thread.
    pub fn commander(&self) -> CartesianImpedanceCommander {
        CartesianImpedanceCommander {
            setpoint: self.setpoint.clone(),
            mount: self.mount,
            root_name: self.root_name.clone(),
            base_link_name: self.base_link_name.clone(),
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn mount(&self) -> &MountTransform {
        &self.mount
    }

    /// Tool pose in the native frame read in the last cycle.
    pub fn measured_pose(&self) -> &Isometry3<f64> {
        &self.measured_pose
    }

    /// External wrench estimated in the last cycle, in the native frame.
    ///
    /// `None` without Jacobian solver, if the Jacobian could not be computed or if it is
    /// singular.
    pub fn wrench_estimate(&self) -> Option<&Wrench> {
        self.wrench_estimate.as_ref()
    }

    fn latch_measured_pose(&self) {
        let measured = self.measured_pose;
        self.setpoint.rcu(|current| CartesianSetpoint {
            pose: current.pose.or(Some(measured)),
            ..**current
        });
    }

    fn update_jacobian(&mut self) {
        self.jacobian_valid = false;
        if let Some(solver) = self.jacobian_solver.as_mut() {
            match solver.jacobian(&self.joint_position, &mut self.jacobian) {
                Ok(()) => {
                    self.jacobian_valid = true;
                    self.jacobian_error_logged = false;
                }
                Err(error) => {
                    if !self.jacobian_error_logged {
                        tracing::error!("could not compute the Jacobian: {}", error);
                        self.jacobian_error_logged = true;
                    }
                }
            }
        }
    }

    fn publish(&mut self, time: &Duration, goal: &Isometry3<f64>) {
        if let Some(sink) = self.telemetry.as_mut() {
            self.measured_message.stamp = *time;
            self.measured_message.pose = self.measured_pose;
            sink.publish_pose(PoseTopic::Measured, &self.measured_message);
            self.goal_message.stamp = *time;
            self.goal_message.pose = *goal;
            sink.publish_pose(PoseTopic::Goal, &self.goal_message);
            if let Some(wrench) = self.wrench_estimate {
                self.wrench_message.stamp = *time;
                self.wrench_message.wrench = wrench;
                sink.publish_wrench(&self.wrench_message);
            }
        }
    }
}

impl Lifecycle for CartesianImpedanceController {
    fn starting(&mut self, _time: &Duration) {
        tracing::debug!("starting Cartesian impedance controller");
        self.state = ControllerState::Holding;
    }

    fn stopping(&mut self, _time: &Duration) {
        tracing::debug!("stopping Cartesian impedance controller");
        self.setpoint.store(Arc::new(self.nominal));
        self.state = ControllerState::Uninitialized;
    }
}

impl<H: CartesianImpedanceInterface + ?Sized> Controller<H> for CartesianImpedanceController {
    fn update(&mut self, hardware: &mut H, time: &Duration, _period: &Duration) {
        if self.state == ControllerState::Uninitialized {
            return;
        }
        for (value, axis) in self.measured_frame.iter_mut().zip(self.pose_handles.iter()) {
            *value = hardware.position(*axis);
        }
        self.measured_pose = fri_to_isometry(&self.measured_frame);
        if self.state == ControllerState::Holding {
            self.latch_measured_pose();
            self.state = ControllerState::Running;
        }

        for (q, axis) in self.joint_position.iter_mut().zip(self.joint_handles.iter()) {
            *q = hardware.position(*axis);
        }
        self.update_jacobian();
        self.wrench_estimate = None;
        if let (true, Some(handles)) = (self.jacobian_valid, self.external_torque_handles.as_ref())
        {
            for (tau, axis) in self.external_torque.iter_mut().zip(handles.iter()) {
                *tau = hardware.effort(*axis);
            }
            self.wrench_estimate = estimate_wrench(&self.jacobian, &self.external_torque);
        }

        let setpoint = **self.setpoint.load();
        let goal = setpoint.pose.unwrap_or(self.measured_pose);
        let wrench = setpoint.wrench + setpoint.additional_wrench;
        let feed_forward = match self.feed_forward {
            FeedForwardMode::Cartesian => FeedForward::Cartesian(wrench_to_fri(&wrench)),
            FeedForwardMode::JointSpace => {
                if self.jacobian_valid {
                    multiply_jacobian(&self.jacobian, &wrench, &mut self.joint_torque);
                } else {
                    self.joint_torque.iter_mut().for_each(|tau| *tau = 0.);
                }
                FeedForward::Joint(&self.joint_torque)
            }
        };
        hardware.set_cartesian_command(&CartesianImpedanceCommand {
            pose: isometry_to_fri(&goal),
            stiffness: stiffness_to_fri(&setpoint.stiffness),
            damping: stiffness_to_fri(&setpoint.damping),
            feed_forward,
        });
        self.publish(time, &goal);
    }
}

/// Command side of a [`CartesianImpedanceController`].
///
/// Every command is validated completely before it is applied. A rejected command leaves the
/// setpoint untouched.
#[derive(Clone)]
pub struct CartesianImpedanceCommander {
    setpoint: Arc<ArcSwap<CartesianSetpoint>>,
    mount: MountTransform,
    root_name: String,
    base_link_name: String,
}

impl CartesianImpedanceCommander {
    /// Sets the desired pose, expressed in the native root frame.
    /// # Errors
    /// * CommandException if the pose is not finite or the orientation has zero norm.
    pub fn set_pose(&self, pose: &Pose) -> LwrResult<CommandStatus> {
        let pose = checked(pose.to_isometry())?;
        self.store_pose(pose);
        Ok(CommandStatus::Applied)
    }

    /// Sets the desired pose, expressed in the external base link frame.
    /// # Errors
    /// * CommandException if the pose is not finite or the orientation has zero norm.
    pub fn set_pose_world(&self, pose: &Pose) -> LwrResult<CommandStatus> {
        let pose = checked(pose.to_isometry())?;
        self.store_pose(self.mount.to_native(&pose));
        Ok(CommandStatus::Applied)
    }

    /// Sets stiffness and damping together.
    /// # Arguments
    /// * `gains` - `[kx, ky, kz, krx, kry, krz, dx, dy, dz, drx, dry, drz]`
    /// # Errors
    /// * CommandDimension if `gains` does not have 12 entries.
    /// * CommandException if a gain is negative or not finite.
    pub fn set_gains(&self, gains: &[f64]) -> LwrResult<CommandStatus> {
        if check_command_size("gains", gains, 2 * STIFFNESS_LEN)? == CommandStatus::Queried {
            return Ok(CommandStatus::Queried);
        }
        check_gains("gains", gains)?;
        let stiffness = fri_to_stiffness(&gains[..STIFFNESS_LEN]);
        let damping = fri_to_stiffness(&gains[STIFFNESS_LEN..]);
        self.setpoint.rcu(|current| CartesianSetpoint {
            stiffness,
            damping,
            ..**current
        });
        Ok(CommandStatus::Applied)
    }

    /// Sets the bias wrench which is added to the desired wrench.
    ///
    /// The wrench has to be expressed in the native root frame or in the external base link
    /// frame, as named by its `frame_id`.
    /// # Errors
    /// * CommandException if the frame is unknown or a value is not finite.
    pub fn set_additional_wrench(&self, wrench: &WrenchStamped) -> LwrResult<CommandStatus> {
        check_finite("additional wrench", &wrench_to_fri(&wrench.wrench))?;
        let native = if wrench.frame_id == self.root_name {
            wrench.wrench
        } else if wrench.frame_id == self.base_link_name {
            self.mount.wrench_to_native(&wrench.wrench)
        } else {
            let error = create_command_exception(format!(
                "additional wrench has to be expressed in {} or {}, not in {}",
                self.root_name, self.base_link_name, wrench.frame_id
            ));
            tracing::error!("{}", error);
            return Err(error);
        };
        self.setpoint.rcu(|current| CartesianSetpoint {
            additional_wrench: native,
            ..**current
        });
        Ok(CommandStatus::Applied)
    }

    /// Replaces pose, stiffness, damping and desired wrench in one step. All values are given
    /// in device layout and in the native root frame.
    ///
    /// If all payloads are empty, nothing is changed and [`CommandStatus::Queried`] is returned.
    /// # Errors
    /// * CommandDimension if a payload has the wrong size.
    /// * CommandException if a value is not finite or a gain is negative.
    pub fn set_impedance(
        &self,
        pose: &[f64],
        stiffness: &[f64],
        damping: &[f64],
        wrench: &[f64],
    ) -> LwrResult<CommandStatus> {
        let payloads: [(&'static str, &[f64], usize); 4] = [
            ("pose", pose, FRAME_LEN),
            ("stiffness", stiffness, STIFFNESS_LEN),
            ("damping", damping, STIFFNESS_LEN),
            ("wrench", wrench, WRENCH_LEN),
        ];
        if payloads.iter().all(|(_, data, _)| data.is_empty()) {
            tracing::info!(
                "impedance command is empty. Expected pose: {}, stiffness: {}, damping: {}, wrench: {} entries",
                FRAME_LEN,
                STIFFNESS_LEN,
                STIFFNESS_LEN,
                WRENCH_LEN
            );
            return Ok(CommandStatus::Queried);
        }
        for &(command, data, expected) in payloads.iter() {
            if data.len() != expected {
                let error = LwrException::CommandDimension {
                    command,
                    expected,
                    actual: data.len(),
                };
                tracing::error!("{}", error);
                return Err(error);
            }
        }
        check_finite("pose", pose)?;
        check_gains("stiffness", stiffness)?;
        check_gains("damping", damping)?;
        check_finite("wrench", wrench)?;

        let pose = fri_to_isometry(pose);
        let stiffness = fri_to_stiffness(stiffness);
        let damping = fri_to_stiffness(damping);
        let wrench = fri_to_wrench(wrench);
        self.setpoint.rcu(|current| CartesianSetpoint {
            pose: Some(pose),
            stiffness,
            damping,
            wrench,
            ..**current
        });
        Ok(CommandStatus::Applied)
    }

    /// Current setpoint.
    pub fn setpoint(&self) -> Arc<CartesianSetpoint> {
        self.setpoint.load_full()
    }

    fn store_pose(&self, pose: Isometry3<f64>) {
        self.setpoint.rcu(|current| CartesianSetpoint {
            pose: Some(pose),
            ..**current
        });
    }
}

fn checked<T>(result: LwrResult<T>) -> LwrResult<T> {
    result.map_err(|error| {
        tracing::error!("{}", error);
        error
    })
}
