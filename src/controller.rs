// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the controllers and everything which is shared between them.
//!
//! A controller is created with a fallible constructor (the equivalent of `init`). Afterwards
//! the host drives it through the [`Controller`] trait: [`starting`](`Lifecycle::starting`)
//! when it gets activated, [`update`](`Controller::update`) once per control cycle and
//! [`stopping`](`Lifecycle::stopping`) when it gets deactivated.
//!
//! Commands do not go through the controller itself but through a commander handle
//! (e.g. [`JointImpedanceCommander`]), which can be cloned and moved to the thread that
//! receives the commands. A commander validates a command completely before it replaces the
//! setpoint of the controller in one atomic step, so a running control cycle never sees a
//! partially applied command.
use std::time::Duration;

use crate::exception::{LwrException, LwrResult};

pub mod cartesian_impedance;
pub mod config;
pub mod control_types;
pub mod joint_impedance;
pub mod state_estimator;
pub mod telemetry;

pub use cartesian_impedance::{
    CartesianImpedanceCommander, CartesianImpedanceController, CartesianSetpoint,
};
pub use config::ControllerConfig;
pub use joint_impedance::{JointImpedanceCommander, JointImpedanceController, JointSetpoint};
pub use state_estimator::StateEstimator;

/// Activation boundary of a controller.
pub trait Lifecycle {
    /// Called once when the controller gets activated, before the first update.
    fn starting(&mut self, time: &Duration);
    /// Called once when the controller gets deactivated.
    fn stopping(&mut self, time: &Duration);
}

/// A controller driven by the host with hardware of type `H`.
pub trait Controller<H: ?Sized>: Lifecycle {
    /// Called once per control cycle. Must not block.
    ///
    /// # Arguments
    /// * `hardware` - the handle set, borrowed for this cycle only.
    /// * `time` - time of the current cycle.
    /// * `period` - time since the last cycle.
    fn update(&mut self, hardware: &mut H, time: &Duration, period: &Duration);
}

/// Activation state of a control law.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ControllerState {
    /// Not active. Updates are ignored.
    Uninitialized,
    /// Activated, the next update latches the measured state as setpoint.
    Holding,
    /// Active and commanding the hardware.
    Running,
}

/// Outcome of an accepted command.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CommandStatus {
    /// The setpoint was replaced.
    Applied,
    /// The command was empty. Nothing was changed.
    Queried,
}

/// Checks the length of a command payload.
///
/// An empty payload is answered with [`CommandStatus::Queried`] and logged as a reminder of the
/// expected size. Any other size mismatch is logged and returned as
/// [`CommandDimension`](`LwrException::CommandDimension`).
pub(crate) fn check_command_size(
    command: &'static str,
    data: &[f64],
    expected: usize,
) -> LwrResult<CommandStatus> {
    if data.is_empty() {
        tracing::info!(
            "{} message size = 0. Desired configuration must be: {} dimension",
            command,
            expected
        );
        return Ok(CommandStatus::Queried);
    }
    if data.len() != expected {
        let error = LwrException::CommandDimension {
            command,
            expected,
            actual: data.len(),
        };
        tracing::error!("{}", error);
        return Err(error);
    }
    Ok(CommandStatus::Applied)
}

/// Rejects payloads with non finite entries or negative gains.
pub(crate) fn check_gains(command: &'static str, gains: &[f64]) -> LwrResult<()> {
    if gains.iter().all(|x| x.is_finite() && *x >= 0.) {
        Ok(())
    } else {
        let error = crate::exception::create_command_exception(format!(
            "{} message contains negative or non finite gains",
            command
        ));
        tracing::error!("{}", error);
        Err(error)
    }
}

/// Rejects payloads with non finite entries.
pub(crate) fn check_finite(command: &'static str, data: &[f64]) -> LwrResult<()> {
    if data.iter().all(|x| x.is_finite()) {
        Ok(())
    } else {
        let error = crate::exception::create_command_exception(format!(
            "{} message contains non finite values",
            command
        ));
        tracing::error!("{}", error);
        Err(error)
    }
}


#[cfg(test)]
mod tests {
    use crate::controller::{check_command_size, check_finite, check_gains, CommandStatus};
    use crate::exception::LwrException;

    #[test]
    fn command_size() {
        assert_eq!(
            check_command_size("position", &[], 7),
            Ok(CommandStatus::Queried)
        );
        assert_eq!(
            check_command_size("position", &[0.; 7], 7),
            Ok(CommandStatus::Applied)
        );
        assert_eq!(
            check_command_size("position", &[0.; 8], 7),
            Err(LwrException::CommandDimension {
                command: "position",
                expected: 7,
                actual: 8
            })
        );
    }

    #[test]
    fn gains_and_values() {
        assert!(check_gains("gains", &[0., 300.]).is_ok());
        assert!(check_gains("gains", &[-1.]).is_err());
        assert!(check_gains("gains", &[f64::INFINITY]).is_err());
        assert!(check_finite("torque", &[-5., 2.]).is_ok());
        assert!(check_finite("torque", &[f64::NAN]).is_err());
    }
}
