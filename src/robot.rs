// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the Robot type, which loads robot models into a problem solver and attaches
//! grippers and handles to them.
use nalgebra::Isometry3;
use tracing::info;

use crate::device::Device;
use crate::exception::{invalid_argument, model_exception, ManipulationResult};
use crate::gripper::Gripper;
use crate::handle::Handle;
use crate::model::{humanoid, srdf, urdf, Frame, FrameType, JointIndex, ModelSource, UNIVERSE};
use crate::problem_solver::{ProblemSolver, DEFAULT_ROBOT_NAME};
use crate::utils::{
    bool_seq_to_mask, isometry_to_transform, transform_to_isometry, Transform, HANDLE_MASK_SIZE,
};

pub mod environment;

/// Robot operations on the problem solver of a session.
///
/// Operations which change the structure of the kinematic model are executed on a copy of
/// the robot which replaces the robot only on success, so a failed operation leaves the robot
/// unchanged. They reset the planning problem.
pub struct Robot<'a> {
    solver: &'a mut ProblemSolver,
}

impl<'a> Robot<'a> {
    pub fn new(solver: &'a mut ProblemSolver) -> Self {
        Robot { solver }
    }

    /// Runs `operation` on a copy of the robot, which is created if needed, and commits the
    /// copy if the operation succeeds.
    fn staged<F>(&mut self, operation: F) -> ManipulationResult<()>
    where
        F: FnOnce(&mut Device) -> ManipulationResult<()>,
    {
        let robot = self.solver.get_or_create_robot(DEFAULT_ROBOT_NAME);
        let mut staged = robot.clone();
        operation(&mut staged)?;
        *robot = staged;
        self.solver.reset_problem();
        Ok(())
    }

    /// Loads a robot model and inserts it at the universe frame.
    ///
    /// See [`insert_robot_model_on_frame`](`Self::insert_robot_model_on_frame`).
    pub fn insert_robot_model(
        &mut self,
        robot_name: &str,
        root_joint_type: &str,
        urdf: ModelSource,
        srdf: ModelSource,
    ) -> ManipulationResult<()> {
        self.insert_robot_model_on_frame(robot_name, UNIVERSE, root_joint_type, urdf, srdf)
    }

    /// Loads a robot model and inserts it at frame `frame_name`.
    ///
    /// # Arguments
    /// * `robot_name` - Unique name of the robot. Frames and joints of the robot are prefixed
    /// with `<robot_name>/`.
    /// * `frame_name` - Frame the root of the robot is attached to.
    /// * `root_joint_type` - One of `anchor`, `freeflyer` or `planar`.
    /// * `urdf` - Kinematic description.
    /// * `srdf` - Semantic description, may be empty.
    /// # Errors
    /// * [`InvalidArgument`](`crate::exception::ManipulationException::InvalidArgument`) if a
    /// robot named `robot_name` already exists or if there is no frame named `frame_name`.
    /// * [`ModelException`](`crate::exception::ManipulationException::ModelException`) if one
    /// of the descriptions cannot be loaded.
    pub fn insert_robot_model_on_frame(
        &mut self,
        robot_name: &str,
        frame_name: &str,
        root_joint_type: &str,
        urdf: ModelSource,
        srdf: ModelSource,
    ) -> ManipulationResult<()> {
        self.staged(|robot| {
            check_robot_name_is_free(robot, robot_name)?;
            let frame = robot
                .model
                .frame_id(frame_name)
                .ok_or_else(|| invalid_argument(format!("No frame named {}.", frame_name)))?;
            urdf::load_model(robot, frame, robot_name, root_joint_type, &urdf)?;
            srdf::load_model(robot, robot_name, &srdf)
        })?;
        info!(
            robot = robot_name,
            frame = frame_name,
            root_joint_type,
            "inserted robot model"
        );
        Ok(())
    }

    /// Loads a humanoid robot model at the universe frame and identifies its waist, chest,
    /// gaze, wrists and ankles.
    ///
    /// # Errors
    /// Same as [`insert_robot_model`](`Self::insert_robot_model`). The root joint must not be
    /// anchored.
    pub fn insert_humanoid_model(
        &mut self,
        robot_name: &str,
        root_joint_type: &str,
        urdf: ModelSource,
        srdf: ModelSource,
    ) -> ManipulationResult<()> {
        self.staged(|robot| {
            check_robot_name_is_free(robot, robot_name)?;
            urdf::load_model(robot, 0, robot_name, root_joint_type, &urdf)?;
            humanoid::setup_humanoid_robot(robot, robot_name)?;
            srdf::load_model(robot, robot_name, &srdf)
        })?;
        info!(robot = robot_name, root_joint_type, "inserted humanoid model");
        Ok(())
    }

    /// Applies a semantic description to the already loaded robot `robot_name`.
    pub fn insert_robot_srdf_model(
        &mut self,
        robot_name: &str,
        srdf: ModelSource,
    ) -> ManipulationResult<()> {
        self.staged(|robot| srdf::load_model(robot, robot_name, &srdf))?;
        info!(robot = robot_name, "inserted SRDF model");
        Ok(())
    }

    /// Returns the placement of the root of robot `robot_name` relative to its parent joint.
    ///
    /// # Errors
    /// * [`InvalidArgument`](`crate::exception::ManipulationException::InvalidArgument`) if no
    /// robot is loaded or if it contains no robot named `robot_name`.
    pub fn get_root_joint_position(&self, robot_name: &str) -> ManipulationResult<Transform> {
        let robot = self.solver.robot_or_throw()?;
        Ok(isometry_to_transform(&robot.root_joint_position(robot_name)?))
    }

    /// Moves the root of robot `robot_name` and recomputes forward kinematics.
    pub fn set_root_joint_position(
        &mut self,
        robot_name: &str,
        position: &Transform,
    ) -> ManipulationResult<()> {
        let robot = self.solver.robot_or_throw_mut()?;
        robot.set_robot_root_position(robot_name, transform_to_isometry(position))?;
        robot.compute_forward_kinematics();
        Ok(())
    }

    /// Attaches a gripper to link `link_name`.
    ///
    /// # Arguments
    /// * `link_name` - Body the gripper is attached to.
    /// * `gripper_name` - Name of the gripper and of the frame created for it.
    /// * `position` - Pose of the gripper in the link frame.
    /// * `clearance` - Clearance of the gripper.
    /// # Errors
    /// * [`InvalidArgument`](`crate::exception::ManipulationException::InvalidArgument`) if no
    /// robot is loaded or if a frame named `gripper_name` already exists.
    /// * [`ModelException`](`crate::exception::ManipulationException::ModelException`) if
    /// there is no body named `link_name`.
    pub fn add_gripper(
        &mut self,
        link_name: &str,
        gripper_name: &str,
        position: &Transform,
        clearance: f64,
    ) -> ManipulationResult<()> {
        let robot = self.solver.robot_or_throw_mut()?;
        let (_, placement) = insert_frame_on_link(robot, link_name, gripper_name, position)?;
        let mut gripper = Gripper::create(gripper_name, robot)?;
        gripper.clearance = clearance;
        robot.grippers.add(gripper_name, gripper);
        info!(
            gripper = gripper_name,
            link = link_name,
            position = ?isometry_to_transform(&placement),
            "added gripper"
        );
        Ok(())
    }

    /// Attaches a handle to link `link_name`.
    ///
    /// # Arguments
    /// * `link_name` - Body the handle is attached to.
    /// * `handle_name` - Name of the handle and of the frame created for it.
    /// * `local_position` - Pose of the handle in the link frame.
    /// * `clearance` - Clearance of the handle.
    /// * `mask` - Which of the six axes a grasp of this handle constrains.
    /// # Errors
    /// * [`InvalidArgument`](`crate::exception::ManipulationException::InvalidArgument`) if no
    /// robot is loaded, if a frame named `handle_name` already exists or if `mask` does not
    /// have six entries.
    /// * [`ModelException`](`crate::exception::ManipulationException::ModelException`) if
    /// there is no body named `link_name`.
    pub fn add_handle(
        &mut self,
        link_name: &str,
        handle_name: &str,
        local_position: &Transform,
        clearance: f64,
        mask: &[bool],
    ) -> ManipulationResult<()> {
        let mask = bool_seq_to_mask::<HANDLE_MASK_SIZE>(mask)?;
        let robot = self.solver.robot_or_throw_mut()?;
        let (joint, placement) =
            insert_frame_on_link(robot, link_name, handle_name, local_position)?;
        let mut handle = Handle::new(handle_name, placement, joint);
        handle.clearance = clearance;
        handle.mask = mask;
        robot.handles.add(handle_name, handle);
        info!(handle = handle_name, link = link_name, ?mask, "added handle");
        Ok(())
    }

    /// Returns the name of the joint carrying gripper `gripper_name` and the pose of the
    /// gripper in that joint.
    pub fn get_gripper_position_in_joint(
        &self,
        gripper_name: &str,
    ) -> ManipulationResult<(String, Transform)> {
        let robot = self.solver.robot_or_throw()?;
        let gripper = robot
            .grippers
            .get(gripper_name)
            .ok_or_else(|| invalid_argument("This gripper does not exists."))?;
        Ok((
            robot.joint_name(gripper.joint),
            isometry_to_transform(&gripper.object_position_in_joint),
        ))
    }

    /// Returns the name of the joint carrying handle `handle_name` and the pose of the
    /// handle in that joint.
    pub fn get_handle_position_in_joint(
        &self,
        handle_name: &str,
    ) -> ManipulationResult<(String, Transform)> {
        let robot = self.solver.robot_or_throw()?;
        let handle = robot
            .handles
            .get(handle_name)
            .ok_or_else(|| invalid_argument("This handle does not exists."))?;
        Ok((
            robot.joint_name(handle.joint),
            isometry_to_transform(&handle.local_position),
        ))
    }

    /// Overwrites the pose of handle `handle_name` in its joint. The frame of the handle is
    /// left untouched.
    pub fn set_handle_position_in_joint(
        &mut self,
        handle_name: &str,
        position: &Transform,
    ) -> ManipulationResult<()> {
        let robot = self.solver.robot_or_throw_mut()?;
        let handle = robot.handles.get_mut(handle_name).ok_or_else(|| {
            invalid_argument(format!("Robot does not have any handle named {}", handle_name))
        })?;
        handle.local_position = transform_to_isometry(position);
        Ok(())
    }
}

fn check_robot_name_is_free(robot: &Device, robot_name: &str) -> ManipulationResult<()> {
    if robot.robot_frames(robot_name).is_empty() {
        Ok(())
    } else {
        Err(invalid_argument(format!(
            "A robot named {} already exists",
            robot_name
        )))
    }
}

/// Inserts operational frame `name` on the joint carrying body `link_name` and returns that
/// joint together with the placement of the frame in it.
fn insert_frame_on_link(
    robot: &mut Device,
    link_name: &str,
    name: &str,
    position: &Transform,
) -> ManipulationResult<(Option<JointIndex>, Isometry3<f64>)> {
    let joint = robot.get_joint_by_body_name(link_name)?;
    let link_frame = robot
        .model
        .frame_id(link_name)
        .map(|id| &robot.model.frames[id])
        .ok_or_else(|| model_exception(format!("No frame named {}.", link_name)))?;
    debug_assert_eq!(link_frame.frame_type, FrameType::Body);
    let placement = link_frame.placement * transform_to_isometry(position);
    let joint_name = robot.joint_name(joint);
    let previous_frame = robot
        .model
        .frame_id(&joint_name)
        .ok_or_else(|| model_exception(format!("No frame named {}.", joint_name)))?;
    robot.model.add_frame(Frame::new(
        name,
        joint.unwrap_or(0),
        previous_frame,
        placement,
        FrameType::OpFrame,
    ))?;
    robot.create_data();
    Ok((joint, placement))
}
