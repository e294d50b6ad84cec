// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains a handle set which keeps all axis values in memory.
use std::collections::HashMap;

use crate::controller::control_types::{
    CartesianImpedanceCommand, FeedForward, JointImpedanceCommand,
};
use crate::hardware::{AxisHandle, CartesianImpedanceInterface, HandleSet, JointImpedanceInterface};

#[derive(Debug, Copy, Clone, Default, PartialEq)]
struct AxisState {
    position: f64,
    velocity: f64,
    effort: f64,
}

/// Last Cartesian command received by a [`MemoryHandleSet`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCartesianCommand {
    pub pose: [f64; 12],
    pub stiffness: [f64; 6],
    pub damping: [f64; 6],
    /// set if the command carried Cartesian feed forward
    pub wrench: Option<[f64; 6]>,
    /// set if the command carried joint space feed forward
    pub joint_torques: Option<Vec<f64>>,
}

/// Handle set without a robot behind it.
///
/// Measured values are written with the setters of [`HandleSet`], commands are recorded and can
/// be inspected afterwards. Used for testing controllers and for dry runs of a host.
#[derive(Debug, Clone)]
pub struct MemoryHandleSet {
    names: HashMap<String, usize>,
    axes: Vec<AxisState>,
    joint_commands: Vec<Option<JointImpedanceCommand>>,
    cartesian_command: Option<RecordedCartesianCommand>,
    cartesian_command_count: usize,
}

impl MemoryHandleSet {
    /// Creates a handle set with one axis per name, all values zero.
    pub fn new(names: &[String]) -> Self {
        MemoryHandleSet {
            names: names
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), i))
                .collect(),
            axes: vec![AxisState::default(); names.len()],
            joint_commands: vec![None; names.len()],
            cartesian_command: None,
            cartesian_command_count: 0,
        }
    }

    /// Sets the position of the named axis.
    /// # Panics
    /// if there is no axis with that name.
    pub fn set_position_by_name(&mut self, name: &str, value: f64) {
        let axis = self.expect_handle(name);
        self.set_position(axis, value);
    }

    pub fn set_velocity_by_name(&mut self, name: &str, value: f64) {
        let axis = self.expect_handle(name);
        self.set_velocity(axis, value);
    }

    pub fn set_effort_by_name(&mut self, name: &str, value: f64) {
        let axis = self.expect_handle(name);
        self.set_effort(axis, value);
    }

    /// Last joint impedance command sent to the named axis.
    pub fn joint_command(&self, name: &str) -> Option<JointImpedanceCommand> {
        self.handle(name).and_then(|axis| self.joint_command_at(axis))
    }

    /// Last joint impedance command sent to an axis.
    pub fn joint_command_at(&self, axis: AxisHandle) -> Option<JointImpedanceCommand> {
        self.joint_commands[axis.0]
    }

    /// Last Cartesian impedance command.
    pub fn cartesian_command(&self) -> Option<&RecordedCartesianCommand> {
        self.cartesian_command.as_ref()
    }

    /// Number of Cartesian commands received so far.
    pub fn cartesian_command_count(&self) -> usize {
        self.cartesian_command_count
    }

    fn expect_handle(&self, name: &str) -> AxisHandle {
        match self.handle(name) {
            Some(axis) => axis,
            None => panic!("no axis named {}", name),
        }
    }
}

impl HandleSet for MemoryHandleSet {
    fn handle(&self, name: &str) -> Option<AxisHandle> {
        self.names.get(name).map(|&i| AxisHandle(i))
    }

    fn position(&self, axis: AxisHandle) -> f64 {
        self.axes[axis.0].position
    }

    fn velocity(&self, axis: AxisHandle) -> f64 {
        self.axes[axis.0].velocity
    }

    fn effort(&self, axis: AxisHandle) -> f64 {
        self.axes[axis.0].effort
    }

    fn set_position(&mut self, axis: AxisHandle, value: f64) {
        self.axes[axis.0].position = value;
    }

    fn set_velocity(&mut self, axis: AxisHandle, value: f64) {
        self.axes[axis.0].velocity = value;
    }

    fn set_effort(&mut self, axis: AxisHandle, value: f64) {
        self.axes[axis.0].effort = value;
    }
}

impl JointImpedanceInterface for MemoryHandleSet {
    fn set_impedance_command(&mut self, axis: AxisHandle, command: &JointImpedanceCommand) {
        self.joint_commands[axis.0] = Some(*command);
    }
}

impl CartesianImpedanceInterface for MemoryHandleSet {
    fn set_cartesian_command(&mut self, command: &CartesianImpedanceCommand<'_>) {
        let (wrench, joint_torques) = match command.feed_forward {
            FeedForward::Cartesian(wrench) => (Some(wrench), None),
            FeedForward::Joint(torques) => (None, Some(torques.to_vec())),
        };
        self.cartesian_command = Some(RecordedCartesianCommand {
            pose: command.pose,
            stiffness: command.stiffness,
            damping: command.damping,
            wrench,
            joint_torques,
        });
        self.cartesian_command_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use crate::controller::control_types::{
        CartesianImpedanceCommand, FeedForward, JointImpedanceCommand,
    };
    use crate::hardware::{
        CartesianImpedanceInterface, HandleSet, JointImpedanceInterface, MemoryHandleSet,
    };

    #[test]
    fn values_and_commands() {
        let mut hardware = MemoryHandleSet::new(&["j0".to_string(), "j1".to_string()]);
        hardware.set_position_by_name("j1", 0.5);
        hardware.set_velocity_by_name("j1", -0.1);
        hardware.set_effort_by_name("j0", 2.);
        let j1 = hardware.handle("j1").unwrap();
        assert_eq!(hardware.position(j1), 0.5);
        assert_eq!(hardware.velocity(j1), -0.1);
        assert_eq!(hardware.effort(hardware.handle("j0").unwrap()), 2.);

        let command = JointImpedanceCommand {
            position: 0.5,
            torque: 0.,
            stiffness: 300.,
            damping: 0.7,
        };
        hardware.set_impedance_command(j1, &command);
        assert_eq!(hardware.joint_command("j1"), Some(command));
        assert_eq!(hardware.joint_command("j0"), None);

        let torques = [1., 2.];
        hardware.set_cartesian_command(&CartesianImpedanceCommand {
            pose: [0.; 12],
            stiffness: [1.; 6],
            damping: [0.7; 6],
            feed_forward: FeedForward::Joint(&torques),
        });
        let recorded = hardware.cartesian_command().unwrap();
        assert_eq!(recorded.joint_torques, Some(vec![1., 2.]));
        assert_eq!(recorded.wrench, None);
        assert_eq!(hardware.cartesian_command_count(), 1);
    }
}
