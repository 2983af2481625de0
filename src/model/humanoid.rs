// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Conventional parts of humanoid robots.
use tracing::warn;

use crate::device::Device;
use crate::exception::{model_exception, ManipulationResult};
use crate::model::{FrameIndex, JointIndex};
use crate::utils::robot_prefix;

const CHEST: &str = "CHEST_JOINT1";
const GAZE: &str = "gaze";
const LEFT_WRIST: &str = "LARM_JOINT5";
const RIGHT_WRIST: &str = "RARM_JOINT5";
const LEFT_ANKLE: &str = "LLEG_JOINT5";
const RIGHT_ANKLE: &str = "RLEG_JOINT5";

/// Joints and frames of a humanoid robot, looked up by their conventional names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HumanoidParts {
    pub waist: JointIndex,
    pub chest: Option<JointIndex>,
    pub gaze: Option<FrameIndex>,
    pub left_wrist: Option<JointIndex>,
    pub right_wrist: Option<JointIndex>,
    pub left_ankle: Option<JointIndex>,
    pub right_ankle: Option<JointIndex>,
}

/// Identifies the parts of humanoid robot `robot_name` and stores them in the device.
///
/// The waist is the root joint of the robot and must exist. Missing optional parts are
/// logged.
///
/// # Errors
/// * [`ModelException`](`crate::exception::ManipulationException::ModelException`) if the
/// robot has no root joint, e.g. because it is anchored.
pub fn setup_humanoid_robot(device: &mut Device, robot_name: &str) -> ManipulationResult<()> {
    let prefix = robot_prefix(robot_name);
    let waist_name = format!("{}root_joint", prefix);
    let waist = device.model.joint_id(&waist_name).ok_or_else(|| {
        model_exception(format!(
            "Humanoid robot {} has no root joint {}",
            robot_name, waist_name
        ))
    })?;
    let joint = |name: &str| {
        let full_name = format!("{}{}", prefix, name);
        let joint = device.model.joint_id(&full_name);
        if joint.is_none() {
            warn!(robot = robot_name, joint = %full_name, "no joint found for humanoid part");
        }
        joint
    };
    let gaze_name = format!("{}{}", prefix, GAZE);
    let gaze = device.model.frame_id(&gaze_name);
    if gaze.is_none() {
        warn!(robot = robot_name, frame = %gaze_name, "no frame found for the gaze");
    }
    let parts = HumanoidParts {
        waist,
        chest: joint(CHEST),
        gaze,
        left_wrist: joint(LEFT_WRIST),
        right_wrist: joint(RIGHT_WRIST),
        left_ankle: joint(LEFT_ANKLE),
        right_ankle: joint(RIGHT_ANKLE),
    };
    device.humanoids.insert(robot_name.to_string(), parts);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::device::Device;
    use crate::model::humanoid::setup_humanoid_robot;
    use crate::model::{urdf, ModelSource};
    use crate::test_data::{ARM_URDF, HUMANOID_URDF};

    #[test]
    fn conventional_parts() {
        let mut device = Device::new("Robot");
        urdf::load_model(
            &mut device,
            0,
            "hrp",
            "freeflyer",
            &ModelSource::Xml(HUMANOID_URDF),
        )
        .unwrap();
        setup_humanoid_robot(&mut device, "hrp").unwrap();
        let parts = &device.humanoids["hrp"];
        assert_eq!(parts.waist, device.model.joint_id("hrp/root_joint").unwrap());
        assert_eq!(parts.chest, device.model.joint_id("hrp/CHEST_JOINT1"));
        assert_eq!(parts.gaze, device.model.frame_id("hrp/gaze"));
        assert!(parts.gaze.is_some());
        assert!(parts.left_wrist.is_some());
        assert_eq!(parts.right_wrist, None);
        assert_eq!(parts.left_ankle, None);
    }

    #[test]
    fn anchored_robot_has_no_waist() {
        let mut device = Device::new("Robot");
        urdf::load_model(&mut device, 0, "arm", "anchor", &ModelSource::Xml(ARM_URDF)).unwrap();
        assert!(setup_humanoid_robot(&mut device, "arm").is_err());
        assert!(device.humanoids.is_empty());
    }
}
