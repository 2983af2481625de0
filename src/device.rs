// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the Device type, the robot aggregate the problem solver works on.
use std::collections::btree_map::{Iter, IterMut};
use std::collections::BTreeMap;

use nalgebra::{DVector, Isometry3, Point3};

use crate::exception::{invalid_argument, model_exception, ManipulationResult};
use crate::gripper::Gripper;
use crate::handle::Handle;
use crate::model::geometry::GeometryObject;
use crate::model::humanoid::HumanoidParts;
use crate::model::{forward_kinematics, Data, FrameType, JointIndex, Model, UNIVERSE};
use crate::utils::robot_prefix;

/// One polygon of a contact surface together with the joint it moves with.
pub type JointAndShape = (Option<JointIndex>, Vec<Point3<f64>>);
/// A named contact surface made of several polygons.
pub type JointAndShapes = Vec<JointAndShape>;

/// Map of named elements. Adding an element under an existing name replaces it.
#[derive(Debug, Clone, PartialEq)]
pub struct Container<T> {
    map: BTreeMap<String, T>,
}

impl<T> Default for Container<T> {
    fn default() -> Self {
        Container {
            map: BTreeMap::new(),
        }
    }
}

impl<T> Container<T> {
    pub fn add(&mut self, name: impl Into<String>, element: T) -> Option<T> {
        self.map.insert(name.into(), element)
    }
    pub fn get(&self, name: &str) -> Option<&T> {
        self.map.get(name)
    }
    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        self.map.get_mut(name)
    }
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }
    /// names in lexicographic order
    pub fn names(&self) -> Vec<String> {
        self.map.keys().cloned().collect()
    }
    pub fn iter(&self) -> Iter<'_, String, T> {
        self.map.iter()
    }
    pub fn iter_mut(&mut self) -> IterMut<'_, String, T> {
        self.map.iter_mut()
    }
    pub fn len(&self) -> usize {
        self.map.len()
    }
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// A (possibly multi-robot) kinematic chain with everything needed for manipulation planning.
///
/// Several robots can live in the same device. The frames, joints, grippers and handles
/// of a robot are prefixed with `<robotName>/`.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub name: String,
    pub model: Model,
    pub data: Data,
    pub current_configuration: DVector<f64>,
    pub geometries: Vec<GeometryObject>,
    pub grippers: Container<Gripper>,
    pub handles: Container<Handle>,
    pub joint_and_shapes: Container<JointAndShapes>,
    pub disabled_collision_pairs: Vec<(String, String)>,
    pub reference_configurations: BTreeMap<String, DVector<f64>>,
    /// humanoid parts, by robot name
    pub humanoids: BTreeMap<String, HumanoidParts>,
}

impl Device {
    /// Creates an empty device which only contains the universe.
    pub fn new(name: impl Into<String>) -> Self {
        let model = Model::new();
        let data = Data::new(&model);
        Device {
            name: name.into(),
            model,
            data,
            current_configuration: DVector::zeros(0),
            geometries: vec![],
            grippers: Container::default(),
            handles: Container::default(),
            joint_and_shapes: Container::default(),
            disabled_collision_pairs: vec![],
            reference_configurations: BTreeMap::new(),
            humanoids: BTreeMap::new(),
        }
    }

    /// Recreates the kinematic data after the model changed.
    ///
    /// The values of joints which already existed are kept, new joints start at their neutral
    /// configuration. Forward kinematics is recomputed.
    pub fn create_data(&mut self) {
        let mut configuration = self.model.neutral_configuration();
        let kept = self.current_configuration.len().min(configuration.len());
        configuration
            .rows_mut(0, kept)
            .copy_from(&self.current_configuration.rows(0, kept));
        self.current_configuration = configuration;
        self.data = Data::new(&self.model);
        self.compute_forward_kinematics();
    }

    pub fn compute_forward_kinematics(&mut self) {
        if self.data.frame_placements.len() != self.model.frames.len()
            || self.data.joint_placements.len() != self.model.joints.len()
        {
            self.data = Data::new(&self.model);
        }
        forward_kinematics(&self.model, &mut self.data, &self.current_configuration);
    }

    /// World placements of all geometry objects, in the order of
    /// [`geometries`](`Self::geometries`). Requires up to date forward kinematics.
    pub fn update_geometry_placements(&self) -> Vec<Isometry3<f64>> {
        self.geometries
            .iter()
            .map(|geometry| geometry.world_placement(&self.data))
            .collect()
    }

    /// Indices of the frames belonging to robot `robot_name`, in insertion order.
    pub fn robot_frames(&self, robot_name: &str) -> Vec<usize> {
        let prefix = format!("{}/", robot_name);
        self.model
            .frames
            .iter()
            .enumerate()
            .filter(|(_, frame)| frame.name.starts_with(&prefix))
            .map(|(index, _)| index)
            .collect()
    }

    /// Returns the joint which carries the body `body_name`, `None` if it is the universe.
    ///
    /// # Errors
    /// * [`ModelException`](`crate::exception::ManipulationException::ModelException`) if
    /// there is no body frame of that name.
    pub fn get_joint_by_body_name(&self, body_name: &str) -> ManipulationResult<Option<JointIndex>> {
        match self.model.frame_id(body_name) {
            Some(id) if self.model.frames[id].frame_type == FrameType::Body => {
                let parent = self.model.frames[id].parent;
                Ok(if parent == 0 { None } else { Some(parent) })
            }
            _ => Err(model_exception(format!(
                "Device {} has no joint with body of name {}",
                self.name, body_name
            ))),
        }
    }

    /// Name of the joint, `"universe"` for `None`.
    pub fn joint_name(&self, joint: Option<JointIndex>) -> String {
        match joint {
            Some(index) => self.model.joints[index].name.clone(),
            None => UNIVERSE.to_string(),
        }
    }

    /// World placement of the joint for the last computed forward kinematics.
    pub fn joint_transformation(&self, joint: Option<JointIndex>) -> Isometry3<f64> {
        match joint {
            Some(index) => self.data.joint_placements[index],
            None => Isometry3::identity(),
        }
    }

    /// Placement of the root of robot `robot_name` relative to its parent joint.
    ///
    /// # Errors
    /// * [`InvalidArgument`](`crate::exception::ManipulationException::InvalidArgument`) if
    /// no frame of the robot exists.
    pub fn root_joint_position(&self, robot_name: &str) -> ManipulationResult<Isometry3<f64>> {
        let frames = self.robot_frames(robot_name);
        let root = frames
            .first()
            .map(|&index| &self.model.frames[index])
            .ok_or_else(|| invalid_argument("Root of subtree with the provided prefix not found"))?;
        Ok(if root.frame_type == FrameType::Joint {
            self.model.joints[root.parent].placement
        } else {
            root.placement
        })
    }

    /// Moves the root of robot `robot_name` to `position`, relative to its parent joint.
    ///
    /// If the root is a joint, its placement is replaced. Otherwise the root is a fixed frame
    /// and every frame, joint, geometry, gripper and handle of the robot attached to the same
    /// parent joint is moved along. Forward kinematics is not recomputed.
    pub fn set_robot_root_position(
        &mut self,
        robot_name: &str,
        position: Isometry3<f64>,
    ) -> ManipulationResult<()> {
        let frames = self.robot_frames(robot_name);
        let root_index = *frames.first().ok_or_else(|| {
            invalid_argument(format!("No frame for robot name {}", robot_name))
        })?;
        let root = self.model.frames[root_index].clone();
        if root.frame_type == FrameType::Joint {
            self.model.joints[root.parent].placement = position;
            return Ok(());
        }
        let shift = position * root.placement.inverse();
        self.model.frames[root_index].placement = position;
        for &index in frames.iter().skip(1) {
            let frame = &mut self.model.frames[index];
            if frame.parent == root.parent {
                frame.placement = shift * frame.placement;
            }
        }
        let prefix = robot_prefix(robot_name);
        let parent_joint = if root.parent == 0 {
            None
        } else {
            Some(root.parent)
        };
        for joint in self.model.joints.iter_mut().skip(1) {
            if joint.parent == root.parent && joint.name.starts_with(&prefix) {
                joint.placement = shift * joint.placement;
            }
        }
        for geometry in self.geometries.iter_mut() {
            if geometry.parent_joint == root.parent && geometry.name.starts_with(&prefix) {
                geometry.placement = shift * geometry.placement;
            }
        }
        for (name, gripper) in self.grippers.iter_mut() {
            if gripper.joint == parent_joint && name.starts_with(&prefix) {
                gripper.object_position_in_joint = shift * gripper.object_position_in_joint;
            }
        }
        for (name, handle) in self.handles.iter_mut() {
            if handle.joint == parent_joint && name.starts_with(&prefix) {
                handle.local_position = shift * handle.local_position;
            }
        }
        Ok(())
    }
}
