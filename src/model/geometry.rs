// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Collision geometry attached to the joints of a model.
use nalgebra::{Isometry3, Vector3};

use crate::model::{Data, JointIndex};

/// Primitive or mesh shape of a [`GeometryObject`](`GeometryObject`).
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Box { size: Vector3<f64> },
    Cylinder { radius: f64, length: f64 },
    Sphere { radius: f64 },
    Capsule { radius: f64, length: f64 },
    /// the mesh itself is not loaded, only referenced
    Mesh { filename: String, scale: Vector3<f64> },
}

impl From<&urdf_rs::Geometry> for Shape {
    fn from(geometry: &urdf_rs::Geometry) -> Self {
        match geometry {
            urdf_rs::Geometry::Box { size } => Shape::Box {
                size: Vector3::new(size[0], size[1], size[2]),
            },
            urdf_rs::Geometry::Cylinder { radius, length } => Shape::Cylinder {
                radius: *radius,
                length: *length,
            },
            urdf_rs::Geometry::Capsule { radius, length } => Shape::Capsule {
                radius: *radius,
                length: *length,
            },
            urdf_rs::Geometry::Sphere { radius } => Shape::Sphere { radius: *radius },
            urdf_rs::Geometry::Mesh { filename, scale } => Shape::Mesh {
                filename: filename.clone(),
                scale: scale
                    .as_ref()
                    .map(|s| Vector3::new(s[0], s[1], s[2]))
                    .unwrap_or_else(|| Vector3::new(1., 1., 1.)),
            },
        }
    }
}

/// A collision object moving with a joint.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryObject {
    pub name: String,
    pub parent_joint: JointIndex,
    /// placement relative to the parent joint
    pub placement: Isometry3<f64>,
    pub shape: Shape,
}

impl GeometryObject {
    /// World placement of the object for the joint placements stored in `data`.
    pub fn world_placement(&self, data: &Data) -> Isometry3<f64> {
        data.joint_placements[self.parent_joint] * self.placement
    }
}
