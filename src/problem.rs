// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the Problem type, which selects problem solvers and lists what they contain.
use tracing::info;

use crate::exception::{invalid_argument, ManipulationResult};
use crate::problem_solver::ProblemSolverMap;

/// Kinds of entities accepted by [`Problem::get_available`](`Problem::get_available`).
pub const AVAILABLE_TYPES: [&str; 6] = [
    "gripper",
    "handle",
    "obstacle",
    "robotcontact",
    "envcontact",
    "problem",
];

/// Problem operations on the problem solvers of a session.
pub struct Problem<'a> {
    solvers: &'a mut ProblemSolverMap,
}

impl<'a> Problem<'a> {
    pub fn new(solvers: &'a mut ProblemSolverMap) -> Self {
        Problem { solvers }
    }

    /// Selects problem solver `name`, creating it if needed. Returns whether it was created.
    pub fn select_problem(&mut self, name: &str) -> bool {
        self.solvers.select(name)
    }

    /// Rebuilds the planning problem of the selected problem solver.
    pub fn reset_problem(&mut self) {
        self.solvers.selected_mut().reset_problem();
        info!(problem = self.solvers.selected_name(), "reset problem");
    }

    /// Lists the names of the entities of kind `kind`, case insensitive:
    /// * `type` - the accepted kinds,
    /// * `gripper`, `handle`, `robotcontact` - grippers, handles and contact surfaces of the robot,
    /// * `obstacle`, `envcontact` - obstacles and contact surfaces of the environment,
    /// * `problem` - the problem solvers.
    ///
    /// # Errors
    /// * [`InvalidArgument`](`crate::exception::ManipulationException::InvalidArgument`) if
    /// `kind` is unknown, or if the robot is needed and none is loaded.
    pub fn get_available(&self, kind: &str) -> ManipulationResult<Vec<String>> {
        let solver = self.solvers.selected();
        match kind.to_lowercase().as_str() {
            "type" => Ok(AVAILABLE_TYPES.iter().map(|t| t.to_string()).collect()),
            "gripper" => Ok(solver.robot_or_throw()?.grippers.names()),
            "handle" => Ok(solver.robot_or_throw()?.handles.names()),
            "robotcontact" => Ok(solver.robot_or_throw()?.joint_and_shapes.names()),
            "obstacle" => Ok(solver.obstacles.names()),
            "envcontact" => Ok(solver.joint_and_shapes.names()),
            "problem" => Ok(self.solvers.names()),
            _ => Err(invalid_argument(format!("Type {} not understood", kind))),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::ModelSource;
    use crate::problem::Problem;
    use crate::problem_solver::ProblemSolverMap;
    use crate::robot::Robot;
    use crate::test_data::{ARM_SRDF, ARM_URDF, BOX_SRDF, BOX_URDF};

    #[test]
    fn available_entities() {
        let mut solvers = ProblemSolverMap::default();
        let mut robot = Robot::new(solvers.selected_mut());
        robot
            .insert_robot_model(
                "arm",
                "anchor",
                ModelSource::Xml(ARM_URDF),
                ModelSource::Xml(ARM_SRDF),
            )
            .unwrap();
        robot
            .load_environment_model(
                ModelSource::Xml(BOX_URDF),
                ModelSource::Xml(BOX_SRDF),
                "box/",
            )
            .unwrap();
        let problem = Problem::new(&mut solvers);
        assert_eq!(
            problem.get_available("Gripper").unwrap(),
            vec!["arm/gripper".to_string(), "box/magnet".to_string()]
        );
        assert_eq!(
            problem.get_available("handle").unwrap(),
            vec!["box/handle".to_string()]
        );
        assert_eq!(
            problem.get_available("envcontact").unwrap(),
            vec!["box/top".to_string()]
        );
        assert!(problem.get_available("robotcontact").unwrap().is_empty());
        assert_eq!(problem.get_available("obstacle").unwrap().len(), 2);
        assert_eq!(problem.get_available("type").unwrap().len(), 6);
        assert_eq!(
            problem.get_available("joint").unwrap_err().to_string(),
            "Type joint not understood"
        );
    }

    #[test]
    fn select_and_reset() {
        let mut solvers = ProblemSolverMap::default();
        let mut problem = Problem::new(&mut solvers);
        assert_eq!(
            problem.get_available("gripper").unwrap_err().to_string(),
            "No robot loaded."
        );
        assert!(problem.select_problem("second"));
        assert!(!problem.select_problem("second"));
        problem.reset_problem();
        assert_eq!(
            problem.get_available("problem").unwrap(),
            vec!["default".to_string(), "second".to_string()]
        );
        assert!(solvers.selected().problem().is_none());
    }
}
