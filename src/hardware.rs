// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the interfaces to the hardware.
//!
//! The hardware is a set of named axes. Every axis exposes position, velocity and effort. The
//! handle set is owned by the host and only borrowed by a controller for the duration of a
//! control cycle. Handles are resolved by name once while a controller is constructed, the
//! control cycle itself only uses the resolved [`AxisHandle`]s.
use crate::controller::control_types::{CartesianImpedanceCommand, JointImpedanceCommand};
use crate::exception::{create_configuration_exception, LwrResult};

pub mod memory;

pub use memory::MemoryHandleSet;

/// Index of a resolved axis inside a [`HandleSet`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct AxisHandle(pub usize);

/// Per axis access to the hardware.
pub trait HandleSet {
    /// Resolves an axis by name.
    fn handle(&self, name: &str) -> Option<AxisHandle>;
    fn position(&self, axis: AxisHandle) -> f64;
    fn velocity(&self, axis: AxisHandle) -> f64;
    fn effort(&self, axis: AxisHandle) -> f64;
    fn set_position(&mut self, axis: AxisHandle, value: f64);
    fn set_velocity(&mut self, axis: AxisHandle, value: f64);
    fn set_effort(&mut self, axis: AxisHandle, value: f64);
}

/// Hardware which runs a joint impedance controller internally.
pub trait JointImpedanceInterface: HandleSet {
    /// Sends the impedance parameters of one joint. Expected to be called for every joint in
    /// every cycle.
    fn set_impedance_command(&mut self, axis: AxisHandle, command: &JointImpedanceCommand);
}

/// Hardware which runs a Cartesian impedance controller internally.
pub trait CartesianImpedanceInterface: HandleSet {
    /// Sends the complete Cartesian impedance command. Expected to be called in every cycle.
    fn set_cartesian_command(&mut self, command: &CartesianImpedanceCommand<'_>);
}

/// Resolves all axes in `names`, keeping their order.
/// # Errors
/// * ConfigurationException naming the first axis that does not exist.
pub fn resolve_handles<H: HandleSet + ?Sized>(
    hardware: &H,
    names: &[String],
) -> LwrResult<Vec<AxisHandle>> {
    names
        .iter()
        .map(|name| {
            hardware.handle(name).ok_or_else(|| {
                create_configuration_exception(format!("hardware has no axis named {}", name))
            })
        })
        .collect()
}

/// Names of the 12 axes holding the measured Cartesian pose, in device layout. `rot_yx` is the
/// entry in row y and column x.
pub fn cartesian_pose_names(robot_name: &str) -> Vec<String> {
    [
        "rot_xx", "rot_yx", "rot_zx", "pos_x", "rot_xy", "rot_yy", "rot_zy", "pos_y", "rot_xz",
        "rot_yz", "rot_zz", "pos_z",
    ]
    .iter()
    .map(|suffix| format!("{}_{}", robot_name, suffix))
    .collect()
}

/// Names of the 6 axes holding the estimated external wrench at the tool center point.
pub fn tool_wrench_names(robot_name: &str) -> Vec<String> {
    ["X", "Y", "Z", "A", "B", "C"]
        .iter()
        .map(|axis| format!("{}_{}_estExtTcpFT", robot_name, axis))
        .collect()
}

/// Names of the axes holding the estimated external joint torques.
pub fn external_torque_names(joint_names: &[String]) -> Vec<String> {
    joint_names
        .iter()
        .map(|joint| format!("{}_estExtJntTrq", joint))
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::exception::LwrException;
    use crate::hardware::{
        cartesian_pose_names, external_torque_names, resolve_handles, tool_wrench_names,
        AxisHandle, MemoryHandleSet,
    };

    #[test]
    fn handle_names() {
        let names = cartesian_pose_names("lwr");
        assert_eq!(names.len(), 12);
        assert_eq!(names[3], "lwr_pos_x");
        assert_eq!(names[11], "lwr_pos_z");
        assert_eq!(tool_wrench_names("lwr")[5], "lwr_C_estExtTcpFT");
        assert_eq!(
            external_torque_names(&["lwr_0_joint".to_string()]),
            vec!["lwr_0_joint_estExtJntTrq".to_string()]
        );
    }

    #[test]
    fn resolve_keeps_order_and_reports_missing() {
        let hardware = MemoryHandleSet::new(&["b".to_string(), "a".to_string()]);
        let handles = resolve_handles(&hardware, &["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(handles, vec![AxisHandle(1), AxisHandle(0)]);
        match resolve_handles(&hardware, &["c".to_string()]) {
            Err(LwrException::ConfigurationException { message }) => {
                assert!(message.ends_with(" c"))
            }
            other => panic!("expected configuration error, got {:?}", other),
        }
    }
}
