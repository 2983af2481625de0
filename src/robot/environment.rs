// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Merges environment models into the problem solver.
use std::collections::BTreeSet;

use nalgebra::Isometry3;
use tracing::info;

use crate::device::{Container, Device, JointAndShapes};
use crate::exception::{invalid_argument, ManipulationResult};
use crate::gripper::Gripper;
use crate::handle::Handle;
use crate::model::{srdf, urdf, Frame, FrameType, JointIndex, ModelSource};
use crate::robot::Robot;

/// Something attached to a joint of a device which can be moved to another device.
pub trait Attachment: Sized {
    /// kind of attachment, as used in error messages
    const KIND: &'static str;
    fn name(&self) -> &str;
    fn joint(&self) -> Option<JointIndex>;
    fn position_in_joint(&self) -> Isometry3<f64>;
    /// copy of `self` named `name`, fixed in the world at `position`
    fn relocated(&self, name: String, position: Isometry3<f64>) -> Self;
    fn collection(device: &Device) -> &Container<Self>;
    fn collection_mut(device: &mut Device) -> &mut Container<Self>;
}

impl Attachment for Gripper {
    const KIND: &'static str = "gripper";
    fn name(&self) -> &str {
        &self.name
    }
    fn joint(&self) -> Option<JointIndex> {
        self.joint
    }
    fn position_in_joint(&self) -> Isometry3<f64> {
        self.object_position_in_joint
    }
    fn relocated(&self, name: String, position: Isometry3<f64>) -> Self {
        Gripper {
            name,
            joint: None,
            object_position_in_joint: position,
            clearance: self.clearance,
        }
    }
    fn collection(device: &Device) -> &Container<Self> {
        &device.grippers
    }
    fn collection_mut(device: &mut Device) -> &mut Container<Self> {
        &mut device.grippers
    }
}

impl Attachment for Handle {
    const KIND: &'static str = "handle";
    fn name(&self) -> &str {
        &self.name
    }
    fn joint(&self) -> Option<JointIndex> {
        self.joint
    }
    fn position_in_joint(&self) -> Isometry3<f64> {
        self.local_position
    }
    fn relocated(&self, name: String, position: Isometry3<f64>) -> Self {
        Handle {
            name,
            local_position: position,
            joint: None,
            clearance: self.clearance,
            mask: self.mask,
        }
    }
    fn collection(device: &Device) -> &Container<Self> {
        &device.handles
    }
    fn collection_mut(device: &mut Device) -> &mut Container<Self> {
        &mut device.handles
    }
}

/// Computes the world placed copies of the attachments of `object`, named `<prefix><name>`.
///
/// Fails if a frame of that name exists in `robot` or was already planned.
fn plan_relocation<T: Attachment>(
    object: &Device,
    robot: &Device,
    prefix: &str,
    planned: &mut BTreeSet<String>,
) -> ManipulationResult<Vec<T>> {
    T::collection(object)
        .iter()
        .map(|(_, attachment)| {
            let name = format!("{}{}", prefix, attachment.name());
            if robot.model.exist_frame(&name) || !planned.insert(name.clone()) {
                return Err(invalid_argument(format!(
                    "Could not add the {} because a frame '{}' already exists.",
                    T::KIND,
                    name
                )));
            }
            let position =
                object.joint_transformation(attachment.joint()) * attachment.position_in_joint();
            Ok(attachment.relocated(name, position))
        })
        .collect()
}

/// Inserts a universe frame for each attachment and registers it in `robot`.
fn commit_relocation<T: Attachment>(
    robot: &mut Device,
    attachments: Vec<T>,
) -> ManipulationResult<()> {
    for attachment in attachments {
        robot.model.add_frame(Frame::new(
            attachment.name(),
            0,
            0,
            attachment.position_in_joint(),
            FrameType::OpFrame,
        ))?;
        let name = attachment.name().to_string();
        T::collection_mut(robot).add(name, attachment);
    }
    Ok(())
}

impl<'a> Robot<'a> {
    /// Loads an environment model and merges it into the problem.
    ///
    /// The model is loaded as an anchored standalone device. Its collision geometry becomes
    /// static world placed obstacles, its contact surfaces are expressed in world
    /// coordinates and its grippers and handles are copied to the robot, fixed in the world.
    /// Everything is renamed `<prefix><name>`.
    ///
    /// # Errors
    /// * [`InvalidArgument`](`crate::exception::ManipulationException::InvalidArgument`) if no
    /// robot is loaded or if the robot already has a frame with the name of a copied gripper
    /// or handle. Nothing is modified in that case.
    /// * [`ModelException`](`crate::exception::ManipulationException::ModelException`) if one
    /// of the descriptions cannot be loaded.
    pub fn load_environment_model(
        &mut self,
        urdf: ModelSource,
        srdf: ModelSource,
        prefix: &str,
    ) -> ManipulationResult<()> {
        let robot = self.solver.robot_or_throw()?;
        let mut object = Device::new(prefix);
        urdf::load_model(&mut object, 0, "", "anchor", &urdf)?;
        srdf::load_model(&mut object, "", &srdf)?;
        object.compute_forward_kinematics();

        let contacts: Vec<(String, JointAndShapes)> = object
            .joint_and_shapes
            .iter()
            .map(|(name, shapes)| {
                let shapes = shapes
                    .iter()
                    .map(|(joint, points)| {
                        let transform = object.joint_transformation(*joint);
                        (None, points.iter().map(|point| transform * point).collect())
                    })
                    .collect();
                (format!("{}{}", prefix, name), shapes)
            })
            .collect();
        let mut planned = BTreeSet::new();
        let handles = plan_relocation::<Handle>(&object, robot, prefix, &mut planned)?;
        let grippers = plan_relocation::<Gripper>(&object, robot, prefix, &mut planned)?;

        self.solver.add_obstacle(&object, prefix, true, true);
        for (name, shapes) in contacts {
            self.solver.joint_and_shapes.add(name, shapes);
        }
        let robot = self.solver.robot_or_throw_mut()?;
        commit_relocation(robot, handles)?;
        commit_relocation(robot, grippers)?;
        robot.create_data();
        self.solver.reset_problem();
        info!(
            prefix,
            obstacles = object.geometries.len(),
            "loaded environment model"
        );
        Ok(())
    }
}
