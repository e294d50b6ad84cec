// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the configuration of the controllers.
//!
//! Loading the configuration is up to the host; [`ControllerConfig`] implements
//! `Deserialize`, so any serde format works. Every value is optional. Missing values fall back to
//! a default where one exists, which is logged as a warning. Missing link names fail the
//! construction of the controllers that need them.
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::controller::control_types::{FeedForwardMode, Stiffness};
use crate::exception::{create_configuration_exception, LwrResult};

/// Publish rate used if none is configured: 500 Hz
pub static DEFAULT_PUBLISH_RATE: f64 = 500.0;
/// Joint stiffness used if none is configured: 300 Nm/rad
pub static DEFAULT_JOINT_STIFFNESS: f64 = 300.0;
/// Normalized joint damping used if none is configured: 0.7
pub static DEFAULT_JOINT_DAMPING: f64 = 0.7;
/// Cartesian stiffness used if none is configured: 800 N/m translational, 50 Nm/rad rotational
pub static DEFAULT_CARTESIAN_STIFFNESS: [f64; 6] = [800., 800., 800., 50., 50., 50.];
/// Normalized Cartesian damping used if none is configured: 0.7
pub static DEFAULT_CARTESIAN_DAMPING: [f64; 6] = [0.7; 6];

/// Configuration of a controller, read once at construction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ControllerConfig {
    /// Namespace the controller lives in. Used as robot name if none is given.
    pub namespace: String,
    /// Prefix of the hardware axis names, e.g. `lwr` for `lwr_pos_x`.
    pub robot_name: Option<String>,
    /// Name of the external reference link, e.g. `base_link` or `world`.
    pub base_link_name: Option<String>,
    /// Name of the native root link of the robot.
    pub root_name: Option<String>,
    /// Name of the tool link.
    pub tip_name: Option<String>,
    /// Rate in \[Hz\] at which the state estimator publishes.
    pub publish_rate: Option<f64>,
    /// Stiffness of every joint of the joint impedance controller.
    pub stiffness_gains: Option<f64>,
    /// Damping of every joint of the joint impedance controller.
    pub damping_gains: Option<f64>,
    /// Nominal stiffness of the Cartesian impedance controller.
    pub cartesian_stiffness: Option<[f64; 6]>,
    /// Nominal damping of the Cartesian impedance controller.
    pub cartesian_damping: Option<[f64; 6]>,
    /// Feed forward expected by the Cartesian hardware interface.
    pub feed_forward: FeedForwardMode,
}

impl ControllerConfig {
    /// Creates an otherwise empty configuration for a namespace.
    pub fn new(namespace: &str) -> Self {
        ControllerConfig {
            namespace: namespace.to_string(),
            ..Default::default()
        }
    }

    /// Robot name, falls back to the namespace (without leading slashes).
    pub fn robot_name(&self) -> String {
        match &self.robot_name {
            Some(name) => name.clone(),
            None => {
                let namespace = self.namespace.trim_start_matches('/').to_string();
                tracing::warn!(
                    "No robot name found in the configuration of {}, using the namespace...",
                    self.namespace
                );
                namespace
            }
        }
    }

    pub fn publish_rate(&self) -> f64 {
        match self.publish_rate {
            Some(rate) if rate.is_finite() && rate > 0. => rate,
            Some(rate) => {
                tracing::warn!(
                    "publish_rate {} is invalid, using {}",
                    rate,
                    DEFAULT_PUBLISH_RATE
                );
                DEFAULT_PUBLISH_RATE
            }
            None => {
                tracing::warn!("publish_rate not set, using {}", DEFAULT_PUBLISH_RATE);
                DEFAULT_PUBLISH_RATE
            }
        }
    }

    /// Period between two publications, `1 / publish_rate`.
    ///
    /// Falls back to the period of [`DEFAULT_PUBLISH_RATE`] if the rate is so low that its
    /// period does not fit into a [`Duration`].
    pub fn publish_period(&self) -> Duration {
        let rate = self.publish_rate();
        match Duration::try_from_secs_f64(1. / rate) {
            Ok(period) => period,
            Err(error) => {
                tracing::warn!(
                    "publish_rate {} gives no valid period ({}), using {}",
                    rate,
                    error,
                    DEFAULT_PUBLISH_RATE
                );
                Duration::from_secs_f64(1. / DEFAULT_PUBLISH_RATE)
            }
        }
    }

    pub fn base_link_name(&self) -> LwrResult<String> {
        required_link("base_link_name", &self.base_link_name)
    }

    pub fn root_name(&self) -> LwrResult<String> {
        required_link("root_name", &self.root_name)
    }

    pub fn tip_name(&self) -> LwrResult<String> {
        required_link("tip_name", &self.tip_name)
    }

    pub fn joint_stiffness(&self) -> f64 {
        self.stiffness_gains.unwrap_or_else(|| {
            tracing::warn!(
                "Stiffness gain not set, using {}",
                DEFAULT_JOINT_STIFFNESS
            );
            DEFAULT_JOINT_STIFFNESS
        })
    }

    pub fn joint_damping(&self) -> f64 {
        self.damping_gains.unwrap_or_else(|| {
            tracing::warn!("Damping gain not set, using {}", DEFAULT_JOINT_DAMPING);
            DEFAULT_JOINT_DAMPING
        })
    }

    pub fn cartesian_stiffness(&self) -> Stiffness {
        Stiffness::new(self.cartesian_stiffness.unwrap_or_else(|| {
            tracing::warn!(
                "Cartesian stiffness not set, using {:?}",
                DEFAULT_CARTESIAN_STIFFNESS
            );
            DEFAULT_CARTESIAN_STIFFNESS
        }))
    }

    pub fn cartesian_damping(&self) -> Stiffness {
        Stiffness::new(self.cartesian_damping.unwrap_or_else(|| {
            tracing::warn!(
                "Cartesian damping not set, using {:?}",
                DEFAULT_CARTESIAN_DAMPING
            );
            DEFAULT_CARTESIAN_DAMPING
        }))
    }
}

fn required_link(key: &str, value: &Option<String>) -> LwrResult<String> {
    match value {
        Some(name) if !name.is_empty() => Ok(name.clone()),
        _ => {
            tracing::error!("{} not set in the configuration", key);
            Err(create_configuration_exception(format!(
                "{} not set in the configuration",
                key
            )))
        }
    }
}
