// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Appends the kinematic tree described by a URDF document to a [`Device`](`Device`).
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use nalgebra::{Isometry3, Translation3, Unit, UnitQuaternion, Vector3};
use tracing::debug;

use crate::device::Device;
use crate::exception::{model_exception, ManipulationException, ManipulationResult};
use crate::model::geometry::{GeometryObject, Shape};
use crate::model::{Frame, FrameIndex, FrameType, JointIndex, JointType, ModelSource};
use crate::utils::robot_prefix;

/// How the root link of a robot is attached to the frame it is inserted on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RootJointType {
    /// rigidly fixed
    Anchor,
    /// 6 degrees of freedom
    FreeFlyer,
    /// moves in the horizontal plane
    Planar,
}

impl FromStr for RootJointType {
    type Err = ManipulationException;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anchor" => Ok(RootJointType::Anchor),
            "freeflyer" => Ok(RootJointType::FreeFlyer),
            "planar" => Ok(RootJointType::Planar),
            _ => Err(model_exception(format!("Root joint type \"{}\" not known", s))),
        }
    }
}

impl fmt::Display for RootJointType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RootJointType::Anchor => write!(f, "anchor"),
            RootJointType::FreeFlyer => write!(f, "freeflyer"),
            RootJointType::Planar => write!(f, "planar"),
        }
    }
}

/// Converts a URDF origin to an Isometry. `rpy` are fixed axis roll, pitch and yaw angles.
pub fn pose_to_isometry(pose: &urdf_rs::Pose) -> Isometry3<f64> {
    Isometry3::from_parts(
        Translation3::new(pose.xyz[0], pose.xyz[1], pose.xyz[2]),
        UnitQuaternion::from_euler_angles(pose.rpy[0], pose.rpy[1], pose.rpy[2]),
    )
}

/// Parses the URDF in `source` and appends it to `device` at frame `base_frame`.
///
/// All frames and joints are prefixed with `<robotName>/` (nothing for an empty name). The
/// root link is attached through a joint named `<prefix>root_joint` of type
/// `root_joint_type`. An anchored root creates a fixed joint frame of that name instead.
///
/// Every fixed URDF joint becomes a [`FixedJoint`](`FrameType::FixedJoint`) frame and every
/// moving joint a joint of the tree with a frame of the same name. Each link gets a
/// [`Body`](`FrameType::Body`) frame and its collision elements become geometry objects.
///
/// # Errors
/// * [`ModelException`](`crate::exception::ManipulationException::ModelException`) if the
/// document cannot be read or parsed, if the root joint type is unknown or if it contains
/// unsupported joints.
/// * [`InvalidArgument`](`crate::exception::ManipulationException::InvalidArgument`) if a
/// frame or joint name already exists.
///
/// The device may be partially modified on error. Callers stage the operation on a copy.
pub fn load_model(
    device: &mut Device,
    base_frame: FrameIndex,
    robot_name: &str,
    root_joint_type: &str,
    source: &ModelSource,
) -> ManipulationResult<()> {
    let root_joint_type: RootJointType = root_joint_type.parse()?;
    let xml = source.read()?;
    let robot = urdf_rs::read_from_string(&xml)
        .map_err(|e| model_exception(format!("Failed to parse URDF: {}", e)))?;
    let base = device
        .model
        .frames
        .get(base_frame)
        .cloned()
        .ok_or_else(|| model_exception(format!("Frame {} does not exist", base_frame)))?;
    let prefix = robot_prefix(robot_name);
    let root_link = find_root_link(&robot)?;

    let root_joint_name = format!("{}root_joint", prefix);
    let (joint, body_placement, previous_frame) = match root_joint_type {
        RootJointType::Anchor => {
            let frame = device.model.add_frame(Frame::new(
                root_joint_name,
                base.parent,
                base_frame,
                base.placement,
                FrameType::FixedJoint,
            ))?;
            (base.parent, base.placement, frame)
        }
        RootJointType::FreeFlyer | RootJointType::Planar => {
            let joint_type = if root_joint_type == RootJointType::FreeFlyer {
                JointType::FreeFlyer
            } else {
                JointType::Planar
            };
            let joint = device.model.add_joint(
                base.parent,
                joint_type,
                base.placement,
                root_joint_name.clone(),
            )?;
            let frame = device.model.add_frame(Frame::new(
                root_joint_name,
                joint,
                base_frame,
                Isometry3::identity(),
                FrameType::Joint,
            ))?;
            (joint, Isometry3::identity(), frame)
        }
    };

    let mut builder = TreeBuilder {
        device: &mut *device,
        prefix: &prefix,
        links: robot.links.iter().map(|link| (link.name.as_str(), link)).collect(),
        children: HashMap::new(),
    };
    for urdf_joint in &robot.joints {
        builder
            .children
            .entry(urdf_joint.parent.link.as_str())
            .or_default()
            .push(urdf_joint);
    }
    builder.add_link(root_link, joint, body_placement, previous_frame)?;
    device.create_data();
    debug!(
        robot = robot_name,
        root_joint_type = %root_joint_type,
        joints = robot.joints.len(),
        links = robot.links.len(),
        "appended URDF model"
    );
    Ok(())
}

fn find_root_link(robot: &urdf_rs::Robot) -> ManipulationResult<&str> {
    let mut roots = robot.links.iter().filter(|link| {
        !robot
            .joints
            .iter()
            .any(|joint| joint.child.link == link.name)
    });
    match (roots.next(), roots.next()) {
        (Some(root), None) => Ok(root.name.as_str()),
        (None, _) => Err(model_exception(format!(
            "URDF model {} has no root link",
            robot.name
        ))),
        (Some(_), Some(_)) => Err(model_exception(format!(
            "URDF model {} has more than one root link",
            robot.name
        ))),
    }
}

struct TreeBuilder<'a> {
    device: &'a mut Device,
    prefix: &'a str,
    links: HashMap<&'a str, &'a urdf_rs::Link>,
    children: HashMap<&'a str, Vec<&'a urdf_rs::Joint>>,
}

impl<'a> TreeBuilder<'a> {
    /// Adds the body frame of `link_name` and, recursively, the joints below it.
    /// `placement` is the placement of the link relative to `joint`.
    fn add_link(
        &mut self,
        link_name: &str,
        joint: JointIndex,
        placement: Isometry3<f64>,
        previous_frame: FrameIndex,
    ) -> ManipulationResult<()> {
        let link = *self
            .links
            .get(link_name)
            .ok_or_else(|| model_exception(format!("Link {} is not defined", link_name)))?;
        let body = self.device.model.add_frame(Frame::new(
            format!("{}{}", self.prefix, link.name),
            joint,
            previous_frame,
            placement,
            FrameType::Body,
        ))?;
        for (i, collision) in link.collision.iter().enumerate() {
            self.device.geometries.push(GeometryObject {
                name: format!("{}{}_{}", self.prefix, link.name, i),
                parent_joint: joint,
                placement: placement * pose_to_isometry(&collision.origin),
                shape: Shape::from(&collision.geometry),
            });
        }

        let children = self.children.get(link_name).cloned().unwrap_or_default();
        for urdf_joint in children {
            let name = format!("{}{}", self.prefix, urdf_joint.name);
            let origin = placement * pose_to_isometry(&urdf_joint.origin);
            match joint_type(urdf_joint)? {
                None => {
                    let frame = self.device.model.add_frame(Frame::new(
                        name,
                        joint,
                        body,
                        origin,
                        FrameType::FixedJoint,
                    ))?;
                    self.add_link(&urdf_joint.child.link, joint, origin, frame)?;
                }
                Some(joint_type) => {
                    let limited = matches!(
                        urdf_joint.joint_type,
                        urdf_rs::JointType::Revolute | urdf_rs::JointType::Prismatic
                    );
                    let child = self
                        .device
                        .model
                        .add_joint(joint, joint_type, origin, name.clone())?;
                    if limited {
                        let limits = &urdf_joint.limit;
                        self.device.model.joints[child].lower_limits = vec![limits.lower];
                        self.device.model.joints[child].upper_limits = vec![limits.upper];
                    }
                    let frame = self.device.model.add_frame(Frame::new(
                        name,
                        child,
                        body,
                        Isometry3::identity(),
                        FrameType::Joint,
                    ))?;
                    self.add_link(&urdf_joint.child.link, child, Isometry3::identity(), frame)?;
                }
            }
        }
        Ok(())
    }
}

/// Motion model of a URDF joint, `None` for fixed joints.
fn joint_type(joint: &urdf_rs::Joint) -> ManipulationResult<Option<JointType>> {
    let axis = || {
        Unit::try_new(
            Vector3::new(joint.axis.xyz[0], joint.axis.xyz[1], joint.axis.xyz[2]),
            1e-9,
        )
        .ok_or_else(|| model_exception(format!("Joint {} has a null axis", joint.name)))
    };
    Ok(match joint.joint_type {
        urdf_rs::JointType::Fixed => None,
        urdf_rs::JointType::Revolute | urdf_rs::JointType::Continuous => {
            Some(JointType::Revolute { axis: axis()? })
        }
        urdf_rs::JointType::Prismatic => Some(JointType::Prismatic { axis: axis()? }),
        urdf_rs::JointType::Floating => Some(JointType::FreeFlyer),
        urdf_rs::JointType::Planar => Some(JointType::Planar),
        _ => {
            return Err(model_exception(format!(
                "Type of joint {} is not supported",
                joint.name
            )))
        }
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use crate::device::Device;
    use crate::exception::ManipulationException;
    use crate::model::urdf::{load_model, RootJointType};
    use crate::model::{FrameType, ModelSource};
    use crate::test_data::ARM_URDF;
    use crate::utils::test::{float_compare, slice_compare};

    #[test]
    fn anchored_arm() {
        let mut device = Device::new("Robot");
        load_model(&mut device, 0, "arm", "anchor", &ModelSource::Xml(ARM_URDF)).unwrap();
        let model = &device.model;
        assert_eq!(model.nq(), 1);
        assert_eq!(device.robot_frames("arm")[0], model.frame_id("arm/root_joint").unwrap());
        let root = model.frame_id("arm/root_joint").unwrap();
        assert_eq!(model.frames[root].frame_type, FrameType::FixedJoint);
        let joint1 = model.joint_id("arm/joint1").unwrap();
        assert_eq!(model.joints[joint1].lower_limits, vec![-3.0]);
        assert_eq!(model.joints[joint1].upper_limits, vec![3.0]);
        let tool = model.frame_id("arm/tool_link").unwrap();
        assert_eq!(model.frames[tool].frame_type, FrameType::Body);
        assert_eq!(model.frames[tool].parent, joint1);
        slice_compare(
            device.data.frame_placements[tool].translation.vector.as_slice(),
            &[0., 0., 0.8],
            1e-12,
        );
        assert_eq!(device.geometries.len(), 2);
        assert_eq!(device.geometries[1].name, "arm/link1_0");
        assert_eq!(device.geometries[1].parent_joint, joint1);
    }

    #[test]
    fn free_flyer_root_on_frame() {
        let mut device = Device::new("Robot");
        load_model(&mut device, 0, "table", "anchor", &ModelSource::Xml(ARM_URDF)).unwrap();
        let tool = device.model.frame_id("table/tool_link").unwrap();
        load_model(
            &mut device,
            tool,
            "arm",
            "freeflyer",
            &ModelSource::Xml(ARM_URDF),
        )
        .unwrap();
        assert_eq!(device.model.nq(), 1 + 7 + 1);
        let tool = device.model.frame_id("arm/tool_link").unwrap();
        float_compare(
            device.data.frame_placements[tool].translation.vector.z,
            1.6,
            1e-12,
        );
    }

    #[test]
    fn root_joint_type_is_checked() {
        assert_eq!(
            "planar".parse::<RootJointType>().unwrap(),
            RootJointType::Planar
        );
        let mut device = Device::new("Robot");
        let error = load_model(&mut device, 0, "arm", "hinge", &ModelSource::Xml(ARM_URDF))
            .unwrap_err();
        assert!(matches!(error, ManipulationException::ModelException { .. }));
        assert_eq!(device.model.frames.len(), 1);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(ARM_URDF.as_bytes()).unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let mut device = Device::new("Robot");
        load_model(&mut device, 0, "arm", "planar", &ModelSource::File(&path)).unwrap();
        assert_eq!(device.model.nq(), 4 + 1);
        let missing = load_model(
            &mut device,
            0,
            "other",
            "anchor",
            &ModelSource::File("/nonexistent/arm.urdf"),
        );
        assert!(matches!(
            missing,
            Err(ManipulationException::ModelException { .. })
        ));
    }

    #[test]
    fn invalid_document() {
        let mut device = Device::new("Robot");
        let error = load_model(&mut device, 0, "arm", "anchor", &ModelSource::Xml("<robot"))
            .unwrap_err();
        assert!(error.to_string().starts_with("Failed to parse URDF"));
    }
}
