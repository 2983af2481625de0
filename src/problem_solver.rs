// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the problem solving context of a session.
use std::collections::BTreeMap;
use std::mem;

use nalgebra::Isometry3;
use tracing::{debug, info};

use crate::device::{Container, Device, JointAndShapes};
use crate::exception::{invalid_argument, ManipulationResult};
use crate::model::geometry::Shape;
use crate::model::JointIndex;

/// Name of the robot created on first need.
pub const DEFAULT_ROBOT_NAME: &str = "Robot";
/// Name of the problem solver selected when a session starts.
pub const DEFAULT_PROBLEM_NAME: &str = "default";

/// A collision object of the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Obstacle {
    pub name: String,
    pub shape: Shape,
    /// joint of the source device the obstacle moves with, `None` once detached
    pub joint: Option<JointIndex>,
    /// world placement for detached obstacles, placement in the joint otherwise
    pub placement: Isometry3<f64>,
    pub is_static: bool,
}

/// The planning problem built from the current robot and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanningProblem {
    pub robot_name: String,
    pub obstacles: usize,
    /// incremented each time the problem is rebuilt
    pub revision: u64,
}

/// Holds the robot, the environment and the cached planning problem.
#[derive(Debug, Clone, Default)]
pub struct ProblemSolver {
    robot: Option<Device>,
    problem: Option<PlanningProblem>,
    pub obstacles: Container<Obstacle>,
    /// contact surfaces of the environment, in world coordinates
    pub joint_and_shapes: Container<JointAndShapes>,
    pub constraint_graph: Option<String>,
    revision: u64,
}

impl ProblemSolver {
    pub fn robot(&self) -> Option<&Device> {
        self.robot.as_ref()
    }

    /// Replaces the robot and resets the problem.
    pub fn set_robot(&mut self, robot: Device) {
        self.robot = Some(robot);
        self.reset_problem();
    }

    /// Returns the robot, creating an empty one named `name` if there is none yet.
    pub fn get_or_create_robot(&mut self, name: &str) -> &mut Device {
        self.robot.get_or_insert_with(|| {
            info!(robot = name, "creating robot");
            Device::new(name)
        })
    }

    /// # Errors
    /// * [`InvalidArgument`](`crate::exception::ManipulationException::InvalidArgument`) if no
    /// robot has been loaded.
    pub fn robot_or_throw(&self) -> ManipulationResult<&Device> {
        self.robot
            .as_ref()
            .ok_or_else(|| invalid_argument("No robot loaded."))
    }

    /// # Errors
    /// * [`InvalidArgument`](`crate::exception::ManipulationException::InvalidArgument`) if no
    /// robot has been loaded.
    pub fn robot_or_throw_mut(&mut self) -> ManipulationResult<&mut Device> {
        self.robot
            .as_mut()
            .ok_or_else(|| invalid_argument("No robot loaded."))
    }

    pub fn problem(&self) -> Option<&PlanningProblem> {
        self.problem.as_ref()
    }

    /// Drops the cached problem and rebuilds it from the current robot and obstacles.
    pub fn reset_problem(&mut self) {
        self.revision += 1;
        self.problem = self.robot.as_ref().map(|robot| PlanningProblem {
            robot_name: robot.name.clone(),
            obstacles: self.obstacles.len(),
            revision: self.revision,
        });
        debug!(revision = self.revision, "problem reset");
    }

    /// Registers the geometry of `object` as obstacles named `<prefix><geometry>`.
    ///
    /// Forward kinematics and geometry placements of `object` must be up to date. Detached
    /// obstacles are placed in the world and no longer follow the joints of `object`.
    pub fn add_obstacle(&mut self, object: &Device, prefix: &str, detach: bool, is_static: bool) {
        let placements = object.update_geometry_placements();
        for (geometry, world_placement) in object.geometries.iter().zip(placements) {
            let name = format!("{}{}", prefix, geometry.name);
            let (joint, placement) = if detach {
                (None, world_placement)
            } else {
                (Some(geometry.parent_joint), geometry.placement)
            };
            debug!(obstacle = %name, "adding obstacle");
            self.obstacles.add(
                name.clone(),
                Obstacle {
                    name,
                    shape: geometry.shape.clone(),
                    joint,
                    placement,
                    is_static,
                },
            );
        }
    }
}

/// The named problem solvers of a session, one of which is selected.
#[derive(Debug)]
pub struct ProblemSolverMap {
    selected_name: String,
    selected: ProblemSolver,
    others: BTreeMap<String, ProblemSolver>,
}

impl Default for ProblemSolverMap {
    fn default() -> Self {
        ProblemSolverMap {
            selected_name: DEFAULT_PROBLEM_NAME.to_string(),
            selected: ProblemSolver::default(),
            others: BTreeMap::new(),
        }
    }
}

impl ProblemSolverMap {
    pub fn selected(&self) -> &ProblemSolver {
        &self.selected
    }

    pub fn selected_mut(&mut self) -> &mut ProblemSolver {
        &mut self.selected
    }

    pub fn selected_name(&self) -> &str {
        &self.selected_name
    }

    /// Selects the problem solver `name`, creating it if it does not exist.
    /// Returns whether a new problem solver was created.
    pub fn select(&mut self, name: &str) -> bool {
        if name == self.selected_name {
            return false;
        }
        let (solver, created) = match self.others.remove(name) {
            Some(solver) => (solver, false),
            None => (ProblemSolver::default(), true),
        };
        let previous = mem::replace(&mut self.selected, solver);
        let previous_name = mem::replace(&mut self.selected_name, name.to_string());
        self.others.insert(previous_name, previous);
        info!(problem = name, created, "selected problem");
        created
    }

    /// Names of all problem solvers in lexicographic order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.others.keys().cloned().collect();
        names.push(self.selected_name.clone());
        names.sort();
        names
    }
}
