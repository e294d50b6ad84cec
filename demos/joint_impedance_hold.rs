// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

use std::time::Duration;

use clap::Parser;
use nalgebra::{Isometry3, Translation3, UnitQuaternion};

use lwr_controllers::controller::telemetry::{
    JointState, PoseStamped, PoseTopic, TelemetrySink, WrenchStamped,
};
use lwr_controllers::hardware::{
    cartesian_pose_names, external_torque_names, resolve_handles, tool_wrench_names, AxisHandle,
};
use lwr_controllers::utils::isometry_to_fri;
use lwr_controllers::{
    Controller, ControllerConfig, FixedChain, HandleSet, JointImpedanceController, Lifecycle,
    LwrResult, MemoryHandleSet, StateEstimator,
};

/// An example showing a joint impedance controller holding a simulated arm while an external
/// torque pushes one of its joints. After a while the desired position of that joint is moved
/// to where it got pushed to.
///
/// The state estimator publishes the joint state, which is logged at info level.
#[derive(Parser, Debug)]
#[clap(author, version, name = "joint_impedance_hold")]
struct CommandLineArguments {
    /// Simulated time in seconds
    #[clap(short, long, default_value_t = 2.0)]
    pub duration: f64,
    /// Stiffness of every joint in Nm/rad
    #[clap(short, long, default_value_t = 300.0)]
    pub stiffness: f64,
    /// External torque in Nm acting on joint 3
    #[clap(short, long, default_value_t = 15.0)]
    pub push: f64,
    /// Rate in Hz at which the joint state is logged
    #[clap(short, long, default_value_t = 10.0)]
    pub rate: f64,
}

/// Logs everything it receives.
struct LogSink;

impl TelemetrySink for LogSink {
    fn publish_joint_state(&mut self, state: &JointState) {
        tracing::info!(
            "t = {:.3}s q = {:.3?} tau_ext = {:.3?}",
            state.stamp.as_secs_f64(),
            state.position,
            state.effort
        );
    }
    fn publish_pose(&mut self, topic: PoseTopic, pose: &PoseStamped) {
        tracing::debug!("{:?} in {}: {}", topic, pose.frame_id, pose.pose);
    }
    fn publish_wrench(&mut self, wrench: &WrenchStamped) {
        tracing::debug!("wrench in {}: {:?}", wrench.frame_id, wrench.wrench);
    }
}

/// Integrates a unit inertia per joint driven by the commanded impedance.
fn simulate(
    hardware: &mut MemoryHandleSet,
    joints: &[AxisHandle],
    external: &[AxisHandle],
    push: &[f64],
    period: f64,
) {
    for ((joint, torque_handle), push) in joints.iter().zip(external.iter()).zip(push.iter()) {
        let q = hardware.position(*joint);
        let dq = hardware.velocity(*joint);
        let command = match hardware.joint_command_at(*joint) {
            Some(command) => command,
            None => continue,
        };
        // normalized damping relative to a unit inertia
        let damping = 2. * command.damping * command.stiffness.sqrt();
        let torque =
            command.stiffness * (command.position - q) - damping * dq + command.torque + push;
        let dq = dq + torque * period;
        hardware.set_velocity(*joint, dq);
        hardware.set_position(*joint, q + dq * period);
        hardware.set_effort(*torque_handle, *push);
    }
}

fn main() -> LwrResult<()> {
    tracing_subscriber::fmt::init();
    let args = CommandLineArguments::parse();

    let joint_names: Vec<String> = (0..7).map(|i| format!("lwr_{}_joint", i)).collect();
    let mut names = joint_names.clone();
    names.extend(external_torque_names(&joint_names));
    names.extend(cartesian_pose_names("lwr"));
    names.extend(tool_wrench_names("lwr"));
    let mut hardware = MemoryHandleSet::new(&names);
    for (name, value) in cartesian_pose_names("lwr")
        .iter()
        .zip(isometry_to_fri(&Isometry3::identity()).iter())
    {
        hardware.set_position_by_name(name, *value);
    }

    let chain = FixedChain::new(joint_names.clone()).with_segment(
        "world",
        "lwr_base_link",
        Isometry3::from_parts(Translation3::new(0., 0., 0.1), UnitQuaternion::identity()),
    );
    let config = ControllerConfig {
        robot_name: Some("lwr".to_string()),
        base_link_name: Some("world".to_string()),
        root_name: Some("lwr_base_link".to_string()),
        tip_name: Some("lwr_7_link".to_string()),
        publish_rate: Some(args.rate),
        stiffness_gains: Some(args.stiffness),
        damping_gains: Some(0.7),
        ..ControllerConfig::new("/lwr")
    };
    let mut controller = JointImpedanceController::new(&hardware, &chain, &config)?;
    let mut estimator = StateEstimator::new(&hardware, &chain, &config, Box::new(LogSink))?;
    let commander = controller.commander();

    let joints = resolve_handles(&hardware, &joint_names)?;
    let external = resolve_handles(&hardware, &external_torque_names(&joint_names))?;
    let mut push = vec![0.; joint_names.len()];
    push[3] = args.push;

    let period = Duration::from_millis(1);
    let cycles = (args.duration / period.as_secs_f64()) as u32;
    let mut time = Duration::ZERO;
    controller.starting(&time);
    estimator.starting(&time);
    for cycle in 0..cycles {
        controller.update(&mut hardware, &time, &period);
        estimator.update(&mut hardware, &time, &period);
        simulate(&mut hardware, &joints, &external, &push, period.as_secs_f64());
        if cycle == cycles / 2 {
            tracing::info!("moving the setpoint to the pushed position");
            let mut position = controller.measured_position().to_vec();
            position[3] = hardware.position(joints[3]);
            commander.set_position(&position)?;
        }
        time += period;
    }
    controller.stopping(&time);
    estimator.stopping(&time);
    println!(
        "Joint 3 ended at {:.4} rad, spring deflection for {} Nm is {:.4} rad",
        hardware.position(joints[3]),
        args.push,
        args.push / args.stiffness
    );
    Ok(())
}
