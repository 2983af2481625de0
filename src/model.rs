// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the kinematic model: a tree of joints, a table of named frames and forward
//! kinematics.
//!
//! The layout follows the usual multi-body convention:
//! * joint 0 is the `universe` joint, every other joint has a parent with a smaller index,
//! * a joint placement is expressed in the frame of its parent joint,
//! * a frame placement is expressed in the frame of its parent joint,
//! * frame 0 is the `universe` frame.
use std::borrow::Cow;
use std::fmt;

use nalgebra::{DVector, Isometry3, Quaternion, Translation3, Unit, UnitQuaternion, Vector3};

use crate::exception::{invalid_argument, model_exception, ManipulationResult};

pub mod geometry;
pub mod humanoid;
pub mod srdf;
pub mod urdf;

/// Index of a joint in [`Model::joints`](`Model::joints`).
pub type JointIndex = usize;
/// Index of a frame in [`Model::frames`](`Model::frames`).
pub type FrameIndex = usize;

/// Name of the root joint and root frame of every model.
pub const UNIVERSE: &str = "universe";

/// Where a URDF or SRDF description comes from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ModelSource<'a> {
    /// path of a file containing the description
    File(&'a str),
    /// the XML document itself
    Xml(&'a str),
}

impl<'a> ModelSource<'a> {
    /// An empty path or an empty document means that there is nothing to load.
    pub fn is_empty(&self) -> bool {
        match self {
            ModelSource::File(content) | ModelSource::Xml(content) => content.trim().is_empty(),
        }
    }

    /// Returns the XML document, reading the file if necessary.
    ///
    /// # Errors
    /// * [`ModelException`](`crate::exception::ManipulationException::ModelException`) if the
    /// file cannot be read.
    pub fn read(&self) -> ManipulationResult<Cow<'a, str>> {
        match self {
            ModelSource::File(path) => std::fs::read_to_string(path)
                .map(Cow::Owned)
                .map_err(|e| model_exception(format!("Failed to read {}: {}", path, e))),
            ModelSource::Xml(xml) => Ok(Cow::Borrowed(xml)),
        }
    }
}

/// Enumerates the kinds of frames stored in the frame table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FrameType {
    /// operational frame, e.g. added for a gripper or a handle
    OpFrame,
    /// frame of a moving joint
    Joint,
    /// frame of a joint which does not move, e.g. a fixed URDF joint or an anchored root
    FixedJoint,
    /// frame of a link
    Body,
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FrameType::OpFrame => write!(f, "operational frame"),
            FrameType::Joint => write!(f, "joint"),
            FrameType::FixedJoint => write!(f, "fixed joint"),
            FrameType::Body => write!(f, "body"),
        }
    }
}

/// An entry of the frame table.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub name: String,
    /// joint the frame moves with
    pub parent: JointIndex,
    /// frame this one was attached to when it was created
    pub previous_frame: FrameIndex,
    /// placement relative to the parent joint
    pub placement: Isometry3<f64>,
    pub frame_type: FrameType,
}

impl Frame {
    pub fn new(
        name: impl Into<String>,
        parent: JointIndex,
        previous_frame: FrameIndex,
        placement: Isometry3<f64>,
        frame_type: FrameType,
    ) -> Self {
        Frame {
            name: name.into(),
            parent,
            previous_frame,
            placement,
            frame_type,
        }
    }
}

/// Motion model of a joint.
#[derive(Debug, Clone, PartialEq)]
pub enum JointType {
    /// The universe joint. Never moves and has no configuration.
    Universe,
    /// 6 degrees of freedom, configuration `[x, y, z, qx, qy, qz, qw]`
    FreeFlyer,
    /// translation in the xy-plane and rotation about z, configuration `[x, y, cos, sin]`
    Planar,
    /// rotation about an axis, configuration `[angle]`
    Revolute { axis: Unit<Vector3<f64>> },
    /// translation along an axis, configuration `[distance]`
    Prismatic { axis: Unit<Vector3<f64>> },
}

impl JointType {
    /// Number of configuration variables.
    pub fn nq(&self) -> usize {
        match self {
            JointType::Universe => 0,
            JointType::FreeFlyer => 7,
            JointType::Planar => 4,
            JointType::Revolute { .. } | JointType::Prismatic { .. } => 1,
        }
    }

    /// Configuration where the joint transform is the identity.
    pub fn neutral(&self) -> Vec<f64> {
        match self {
            JointType::Universe => vec![],
            JointType::FreeFlyer => vec![0., 0., 0., 0., 0., 0., 1.],
            JointType::Planar => vec![0., 0., 1., 0.],
            JointType::Revolute { .. } | JointType::Prismatic { .. } => vec![0.],
        }
    }

    /// Transform of the joint for the given configuration slice (of length [`nq`](`JointType::nq`)).
    pub fn transform(&self, q: &[f64]) -> Isometry3<f64> {
        match self {
            JointType::Universe => Isometry3::identity(),
            JointType::FreeFlyer => Isometry3::from_parts(
                Translation3::new(q[0], q[1], q[2]),
                UnitQuaternion::from_quaternion(Quaternion::new(q[6], q[3], q[4], q[5])),
            ),
            JointType::Planar => Isometry3::from_parts(
                Translation3::new(q[0], q[1], 0.),
                UnitQuaternion::from_axis_angle(&Vector3::z_axis(), q[3].atan2(q[2])),
            ),
            JointType::Revolute { axis } => Isometry3::from_parts(
                Translation3::identity(),
                UnitQuaternion::from_axis_angle(axis, q[0]),
            ),
            JointType::Prismatic { axis } => Isometry3::from_parts(
                Translation3::from(axis.into_inner() * q[0]),
                UnitQuaternion::identity(),
            ),
        }
    }
}

/// A joint of the kinematic tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub name: String,
    pub parent: JointIndex,
    /// placement relative to the parent joint, for the neutral configuration
    pub placement: Isometry3<f64>,
    pub joint_type: JointType,
    /// index of the first configuration variable of this joint
    pub idx_q: usize,
    /// lower position limits, one per configuration variable
    pub lower_limits: Vec<f64>,
    /// upper position limits, one per configuration variable
    pub upper_limits: Vec<f64>,
}

impl Joint {
    pub fn nq(&self) -> usize {
        self.joint_type.nq()
    }
}

/// Kinematic tree and frame table.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub joints: Vec<Joint>,
    pub frames: Vec<Frame>,
    nq: usize,
}

impl Default for Model {
    fn default() -> Self {
        Model::new()
    }
}

impl Model {
    /// Creates a model which only contains the `universe` joint and frame.
    pub fn new() -> Self {
        Model {
            joints: vec![Joint {
                name: UNIVERSE.to_string(),
                parent: 0,
                placement: Isometry3::identity(),
                joint_type: JointType::Universe,
                idx_q: 0,
                lower_limits: vec![],
                upper_limits: vec![],
            }],
            frames: vec![Frame::new(
                UNIVERSE,
                0,
                0,
                Isometry3::identity(),
                FrameType::FixedJoint,
            )],
            nq: 0,
        }
    }

    /// Size of the configuration vector.
    pub fn nq(&self) -> usize {
        self.nq
    }

    pub fn exist_frame(&self, name: &str) -> bool {
        self.frame_id(name).is_some()
    }

    pub fn frame_id(&self, name: &str) -> Option<FrameIndex> {
        self.frames.iter().position(|frame| frame.name == name)
    }

    pub fn joint_id(&self, name: &str) -> Option<JointIndex> {
        self.joints.iter().position(|joint| joint.name == name)
    }

    /// Appends a frame to the frame table.
    ///
    /// # Errors
    /// * [`InvalidArgument`](`crate::exception::ManipulationException::InvalidArgument`) if a
    /// frame with this name already exists or if the parent joint or previous frame is unknown.
    pub fn add_frame(&mut self, frame: Frame) -> ManipulationResult<FrameIndex> {
        if self.exist_frame(&frame.name) {
            return Err(invalid_argument(format!(
                "A frame named '{}' already exists.",
                frame.name
            )));
        }
        if frame.parent >= self.joints.len() || frame.previous_frame >= self.frames.len() {
            return Err(invalid_argument(format!(
                "Frame '{}' refers to a joint or frame which does not exist.",
                frame.name
            )));
        }
        self.frames.push(frame);
        Ok(self.frames.len() - 1)
    }

    /// Appends a joint to the kinematic tree and returns its index.
    ///
    /// No frame is created for the joint. Limits default to `-inf..inf`.
    pub fn add_joint(
        &mut self,
        parent: JointIndex,
        joint_type: JointType,
        placement: Isometry3<f64>,
        name: impl Into<String>,
    ) -> ManipulationResult<JointIndex> {
        let name = name.into();
        if self.joint_id(&name).is_some() {
            return Err(invalid_argument(format!(
                "A joint named '{}' already exists.",
                name
            )));
        }
        if parent >= self.joints.len() {
            return Err(invalid_argument(format!(
                "Parent of joint '{}' does not exist.",
                name
            )));
        }
        let nq = joint_type.nq();
        self.joints.push(Joint {
            name,
            parent,
            placement,
            joint_type,
            idx_q: self.nq,
            lower_limits: vec![f64::NEG_INFINITY; nq],
            upper_limits: vec![f64::INFINITY; nq],
        });
        self.nq += nq;
        Ok(self.joints.len() - 1)
    }

    /// Configuration where every joint is at its neutral position.
    pub fn neutral_configuration(&self) -> DVector<f64> {
        let mut q = DVector::zeros(self.nq);
        for joint in &self.joints {
            for (i, value) in joint.joint_type.neutral().into_iter().enumerate() {
                q[joint.idx_q + i] = value;
            }
        }
        q
    }

    /// Whether `ancestor` is `joint` or one of its ancestors.
    pub fn is_ancestor(&self, ancestor: JointIndex, mut joint: JointIndex) -> bool {
        loop {
            if joint == ancestor {
                return true;
            }
            if joint == 0 {
                return false;
            }
            joint = self.joints[joint].parent;
        }
    }
}

/// Placements computed by [`forward_kinematics`](`forward_kinematics`).
#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    /// world placement of each joint
    pub joint_placements: Vec<Isometry3<f64>>,
    /// world placement of each frame
    pub frame_placements: Vec<Isometry3<f64>>,
}

impl Data {
    /// Creates data matching the shape of `model`, with every placement at identity.
    pub fn new(model: &Model) -> Self {
        Data {
            joint_placements: vec![Isometry3::identity(); model.joints.len()],
            frame_placements: vec![Isometry3::identity(); model.frames.len()],
        }
    }
}

/// Computes the world placement of every joint and frame of `model` for configuration `q`.
///
/// `data` must have been created for `model`, see [`Data::new`](`Data::new`).
pub fn forward_kinematics(model: &Model, data: &mut Data, q: &DVector<f64>) {
    debug_assert_eq!(q.len(), model.nq());
    debug_assert_eq!(data.joint_placements.len(), model.joints.len());
    data.joint_placements[0] = Isometry3::identity();
    for (index, joint) in model.joints.iter().enumerate().skip(1) {
        let q_joint = &q.as_slice()[joint.idx_q..joint.idx_q + joint.nq()];
        let local = joint.placement * joint.joint_type.transform(q_joint);
        data.joint_placements[index] = data.joint_placements[joint.parent] * local;
    }
    for (index, frame) in model.frames.iter().enumerate() {
        data.frame_placements[index] = data.joint_placements[frame.parent] * frame.placement;
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{forward_kinematics, Data, Frame, FrameType, JointType, Model};
    use crate::utils::test::{isometry_compare, slice_compare};
    use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
    use std::f64::consts::FRAC_PI_2;

    fn two_link_arm() -> Model {
        let mut model = Model::new();
        let shoulder = model
            .add_joint(
                0,
                JointType::Revolute {
                    axis: Vector3::z_axis(),
                },
                Isometry3::translation(0., 0., 1.),
                "shoulder",
            )
            .unwrap();
        model
            .add_frame(Frame::new(
                "shoulder",
                shoulder,
                0,
                Isometry3::identity(),
                FrameType::Joint,
            ))
            .unwrap();
        model
            .add_frame(Frame::new(
                "tool",
                shoulder,
                1,
                Isometry3::translation(0.5, 0., 0.),
                FrameType::OpFrame,
            ))
            .unwrap();
        model
    }

    #[test]
    fn universe_exists() {
        let model = Model::new();
        assert_eq!(model.frame_id("universe"), Some(0));
        assert_eq!(model.joint_id("universe"), Some(0));
        assert_eq!(model.nq(), 0);
    }

    #[test]
    fn duplicate_frame_is_rejected() {
        let mut model = two_link_arm();
        let frames = model.frames.len();
        let error = model
            .add_frame(Frame::new(
                "tool",
                0,
                0,
                Isometry3::identity(),
                FrameType::OpFrame,
            ))
            .unwrap_err();
        assert_eq!(error.to_string(), "A frame named 'tool' already exists.");
        assert_eq!(model.frames.len(), frames);
    }

    #[test]
    fn revolute_forward_kinematics() {
        let model = two_link_arm();
        let mut data = Data::new(&model);
        let mut q = model.neutral_configuration();
        q[0] = FRAC_PI_2;
        forward_kinematics(&model, &mut data, &q);
        let tool = model.frame_id("tool").unwrap();
        slice_compare(
            data.frame_placements[tool].translation.vector.as_slice(),
            &[0., 0.5, 1.],
            1e-12,
        );
    }

    #[test]
    fn free_flyer_and_planar_neutral_are_identity() {
        for joint_type in [JointType::FreeFlyer, JointType::Planar] {
            let neutral = joint_type.neutral();
            isometry_compare(
                &joint_type.transform(&neutral),
                &Isometry3::identity(),
                1e-12,
            );
        }
        let planar = JointType::Planar.transform(&[1., 2., 0., 1.]);
        isometry_compare(
            &planar,
            &Isometry3::from_parts(
                Translation3::new(1., 2., 0.),
                UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2),
            ),
            1e-12,
        );
    }

    #[test]
    fn configuration_indices_follow_insertion_order() {
        let mut model = Model::new();
        let root = model
            .add_joint(0, JointType::FreeFlyer, Isometry3::identity(), "root")
            .unwrap();
        let elbow = model
            .add_joint(
                root,
                JointType::Prismatic {
                    axis: Vector3::x_axis(),
                },
                Isometry3::identity(),
                "elbow",
            )
            .unwrap();
        assert_eq!(model.joints[root].idx_q, 0);
        assert_eq!(model.joints[elbow].idx_q, 7);
        assert_eq!(model.nq(), 8);
        assert!(model.is_ancestor(root, elbow));
        assert!(!model.is_ancestor(elbow, root));
    }
}
