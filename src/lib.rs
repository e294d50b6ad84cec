// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! # lwr-controllers-rs
//! lwr-controllers-rs contains the real-time control core for KUKA LWR style arms which run
//! their impedance controllers on the hardware side (e.g. through FRI).
//!
//! The host (a scheduler running the control cycle) owns the hardware and drives the
//! controllers. This crate only contains what happens inside one control cycle and how commands
//! get into it:
//! * a joint impedance controller, forwarding desired positions, feed forward torques and gains,
//! * a Cartesian impedance controller, which keeps its setpoint in the native frame of the
//! robot and optionally maps its feed forward wrench through the transposed Jacobian,
//! * a state estimator, which republishes measured pose, wrench and joint state in the native
//! and in the external frame.
//!
//! ## Design
//! The library is divided into the following modules:
//! * [controller](`crate::controller`) - the controllers, their configuration and telemetry.
//! * [hardware](`crate::hardware`) - the interfaces to the per axis hardware handles.
//! * [kinematics](`crate::kinematics`) - kinematic chain, Jacobian and mounting transform.
//! * [utils](`crate::utils`) - conversions between the device array layouts and nalgebra.
//!
//! # Example:
//!```
//! use std::time::Duration;
//! use lwr_controllers::{
//!     Controller, ControllerConfig, FixedChain, JointImpedanceController, Lifecycle,
//!     LwrResult, MemoryHandleSet,
//! };
//! fn main() -> LwrResult<()> {
//!     let joints: Vec<String> = (0..7).map(|i| format!("lwr_{}_joint", i)).collect();
//!     let mut hardware = MemoryHandleSet::new(&joints);
//!     let chain = FixedChain::new(joints.clone());
//!     let mut controller =
//!         JointImpedanceController::new(&hardware, &chain, &ControllerConfig::new("lwr"))?;
//!     let commander = controller.commander();
//!
//!     controller.starting(&Duration::ZERO);
//!     controller.update(&mut hardware, &Duration::ZERO, &Duration::from_millis(1));
//!     commander.set_position(&[0.1; 7])?;
//!     controller.update(
//!         &mut hardware,
//!         &Duration::from_millis(1),
//!         &Duration::from_millis(1),
//!     );
//!     assert_eq!(hardware.joint_command("lwr_0_joint").unwrap().position, 0.1);
//!     Ok(())
//! }
//! ```
//!
//! Creating a controller is the equivalent of initializing it. If the configuration does not
//! fit the hardware, the constructor returns an error and there is no controller which could be
//! run. Commands are sent through the commander, which can be moved to the thread receiving
//! the commands. A rejected command returns an error and does not change anything.
pub mod controller;
pub mod exception;
pub mod hardware;
pub mod kinematics;
pub mod utils;

pub use controller::control_types::*;
pub use controller::{
    CartesianImpedanceCommander, CartesianImpedanceController, CommandStatus, Controller,
    ControllerConfig, ControllerState, JointImpedanceCommander, JointImpedanceController,
    Lifecycle, StateEstimator,
};
pub use exception::{LwrException, LwrResult};
pub use hardware::{HandleSet, MemoryHandleSet};
pub use kinematics::{FixedChain, JacobianSolver, KinematicChainProvider};
