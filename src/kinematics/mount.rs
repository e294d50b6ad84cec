// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the composition of poses and wrenches with the fixed mounting transform of the
//! robot.
use crate::controller::control_types::Wrench;
use crate::exception::{create_configuration_exception, LwrResult};
use crate::kinematics::KinematicChainProvider;
use nalgebra::Isometry3;

/// The rigid transform from the external reference link (e.g. `base_link` or `world`) to the
/// native root link of the robot.
///
/// It is read once from the kinematic chain and never recomputed.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MountTransform {
    frame: Isometry3<f64>,
}

impl MountTransform {
    pub fn new(frame: Isometry3<f64>) -> Self {
        MountTransform { frame }
    }

    /// Looks up the mounting transform between `external_link` and `root_link` in the chain.
    /// # Errors
    /// * ConfigurationException if the chain has no segment between the two links.
    pub fn from_chain<C: KinematicChainProvider + ?Sized>(
        chain: &C,
        external_link: &str,
        root_link: &str,
    ) -> LwrResult<Self> {
        chain
            .segment_transform(external_link, root_link)
            .map(MountTransform::new)
            .map_err(|error| {
                create_configuration_exception(format!(
                    "could not read the mounting transform from {} to {}: {}",
                    external_link, root_link, error
                ))
            })
    }

    pub fn frame(&self) -> &Isometry3<f64> {
        &self.frame
    }

    /// Expresses a pose given in the native frame in the external frame:
    /// `R_ext = R_mount * R_native`, `p_ext = R_mount * p_native + p_mount`.
    pub fn to_external(&self, native: &Isometry3<f64>) -> Isometry3<f64> {
        self.frame * native
    }

    /// Expresses a pose given in the external frame in the native frame.
    pub fn to_native(&self, external: &Isometry3<f64>) -> Isometry3<f64> {
        self.frame.inv_mul(external)
    }

    /// Changes the reference frame and reference point of a wrench from native to external.
    pub fn wrench_to_external(&self, wrench: &Wrench) -> Wrench {
        transform_wrench(&self.frame, wrench)
    }

    /// Changes the reference frame and reference point of a wrench from external to native.
    pub fn wrench_to_native(&self, wrench: &Wrench) -> Wrench {
        transform_wrench(&self.frame.inverse(), wrench)
    }
}

fn transform_wrench(frame: &Isometry3<f64>, wrench: &Wrench) -> Wrench {
    let force = frame.rotation * wrench.force;
    let torque = frame.rotation * wrench.torque + frame.translation.vector.cross(&force);
    Wrench::new(force, torque)
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use approx::assert_relative_eq;
    use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::controller::control_types::Wrench;
    use crate::exception::LwrException;
    use crate::kinematics::mount::MountTransform;
    use crate::kinematics::MockKinematicChainProvider;
    use crate::utils::test_utils::{assert_isometry_eq, random_isometry};

    fn translation_mount(z: f64) -> MountTransform {
        MountTransform::new(Isometry3::from_parts(
            Translation3::new(0., 0., z),
            UnitQuaternion::identity(),
        ))
    }

    #[test]
    fn identity_native_pose_is_mount() {
        let mount = translation_mount(0.1);
        let external = mount.to_external(&Isometry3::identity());
        assert_relative_eq!(external.translation.vector, Vector3::new(0., 0., 0.1));
        assert_relative_eq!(external.rotation.angle(), 0.);
    }

    #[test]
    fn external_command_is_shifted_into_native() {
        let mount = translation_mount(0.1);
        let external = Isometry3::from_parts(
            Translation3::new(0.4, -0.2, 0.7),
            UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.3),
        );
        let native = mount.to_native(&external);
        assert_relative_eq!(
            native.translation.vector,
            Vector3::new(0.4, -0.2, 0.6),
            epsilon = 1e-12
        );
        assert_relative_eq!(native.rotation, external.rotation, epsilon = 1e-12);
    }

    #[test]
    fn rotated_mount_composition() {
        let mount = MountTransform::new(Isometry3::from_parts(
            Translation3::new(1., 0., 0.),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2),
        ));
        let native = Isometry3::from_parts(Translation3::new(1., 0., 0.), UnitQuaternion::identity());
        let external = mount.to_external(&native);
        assert_relative_eq!(
            external.translation.vector,
            Vector3::new(1., 1., 0.),
            epsilon = 1e-12
        );
    }

    #[test]
    fn compose_then_decompose() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let mount = MountTransform::new(random_isometry(&mut rng));
            let native = random_isometry(&mut rng);
            let back = mount.to_native(&mount.to_external(&native));
            assert_isometry_eq(&back, &native, 1e-9);
        }
    }

    #[test]
    fn wrench_round_trip() {
        let mut rng = StdRng::seed_from_u64(5);
        let mount = MountTransform::new(random_isometry(&mut rng));
        let wrench = Wrench::new(Vector3::new(1., 2., 3.), Vector3::new(-1., 0.5, 0.));
        let back = mount.wrench_to_native(&mount.wrench_to_external(&wrench));
        assert_relative_eq!(back.force, wrench.force, epsilon = 1e-9);
        assert_relative_eq!(back.torque, wrench.torque, epsilon = 1e-9);
    }

    #[test]
    fn pure_force_gets_lever_torque() {
        let mount = translation_mount(0.5);
        let wrench = Wrench::new(Vector3::new(10., 0., 0.), Vector3::zeros());
        let external = mount.wrench_to_external(&wrench);
        assert_relative_eq!(external.force, wrench.force);
        assert_relative_eq!(external.torque, Vector3::new(0., 5., 0.), epsilon = 1e-12);
    }

    #[test]
    fn missing_segment_is_configuration_error() {
        let mut chain = MockKinematicChainProvider::new();
        chain.expect_segment_transform().returning(|root, tip| {
            Err(LwrException::KinematicsException {
                message: format!("no chain from {} to {}", root, tip),
            })
        });
        match MountTransform::from_chain(&chain, "base_link", "lwr_base_link") {
            Err(LwrException::ConfigurationException { message }) => {
                assert!(message.contains("base_link"));
            }
            other => panic!("expected configuration error, got {:?}", other),
        }
    }
}
