// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the Handle type.
use nalgebra::Isometry3;

use crate::model::JointIndex;
use crate::utils::HANDLE_MASK_SIZE;

/// Part of an object which a [`Gripper`](`crate::gripper::Gripper`) can grasp.
#[derive(Debug, Clone, PartialEq)]
pub struct Handle {
    pub name: String,
    /// pose of the handle in the frame of [`joint`](`Self::joint`)
    pub local_position: Isometry3<f64>,
    /// joint carrying the handle, `None` for the universe
    pub joint: Option<JointIndex>,
    pub clearance: f64,
    /// which of the axes `[x, y, z, rx, ry, rz]` are constrained by a grasp
    pub mask: [bool; HANDLE_MASK_SIZE],
}

impl Handle {
    /// Creates a handle with clearance 0 which constrains all six axes.
    pub fn new(
        name: impl Into<String>,
        local_position: Isometry3<f64>,
        joint: Option<JointIndex>,
    ) -> Self {
        Handle {
            name: name.into(),
            local_position,
            joint,
            clearance: 0.,
            mask: [true; HANDLE_MASK_SIZE],
        }
    }
}
