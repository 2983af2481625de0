// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the Gripper type.
use nalgebra::Isometry3;

use crate::device::Device;
use crate::exception::{invalid_argument, ManipulationResult};
use crate::model::JointIndex;

/// A gripper is an operational frame of the robot which can grasp handles.
#[derive(Debug, Clone, PartialEq)]
pub struct Gripper {
    pub name: String,
    /// joint carrying the gripper, `None` for the universe
    pub joint: Option<JointIndex>,
    /// pose of the gripper in the frame of [`joint`](`Self::joint`)
    pub object_position_in_joint: Isometry3<f64>,
    pub clearance: f64,
}

impl Gripper {
    /// Creates a gripper from the frame `name` of the device. The gripper takes over the
    /// parent joint and the placement of the frame. Clearance is 0.
    ///
    /// # Errors
    /// * [`InvalidArgument`](`crate::exception::ManipulationException::InvalidArgument`) if
    /// the device has no frame of that name.
    pub fn create(name: &str, device: &Device) -> ManipulationResult<Gripper> {
        let frame_id = device
            .model
            .frame_id(name)
            .ok_or_else(|| invalid_argument(format!("No frame named {}.", name)))?;
        let frame = &device.model.frames[frame_id];
        Ok(Gripper {
            name: name.to_string(),
            joint: if frame.parent == 0 {
                None
            } else {
                Some(frame.parent)
            },
            object_position_in_joint: frame.placement,
            clearance: 0.,
        })
    }
}
