// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the Graph type.
use tracing::info;

use crate::exception::ManipulationResult;
use crate::problem_solver::ProblemSolver;

/// Constraint graph operations on the problem solver of a session.
pub struct Graph<'a> {
    solver: &'a mut ProblemSolver,
}

impl<'a> Graph<'a> {
    pub fn new(solver: &'a mut ProblemSolver) -> Self {
        Graph { solver }
    }

    /// Creates an empty constraint graph named `graph_name` for the robot and makes it the
    /// current graph. Resets the problem.
    ///
    /// # Errors
    /// * [`InvalidArgument`](`crate::exception::ManipulationException::InvalidArgument`) if no
    /// robot is loaded.
    pub fn create_graph(&mut self, graph_name: &str) -> ManipulationResult<()> {
        self.solver.robot_or_throw()?;
        self.solver.constraint_graph = Some(graph_name.to_string());
        self.solver.reset_problem();
        info!(graph = graph_name, "created constraint graph");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::device::Device;
    use crate::graph::Graph;
    use crate::problem_solver::ProblemSolver;

    #[test]
    fn create_graph() {
        let mut solver = ProblemSolver::default();
        assert_eq!(
            Graph::new(&mut solver)
                .create_graph("graph")
                .unwrap_err()
                .to_string(),
            "No robot loaded."
        );
        assert!(solver.constraint_graph.is_none());
        solver.set_robot(Device::new("Robot"));
        let revision = solver.problem().unwrap().revision;
        Graph::new(&mut solver).create_graph("graph").unwrap();
        assert_eq!(solver.constraint_graph.as_deref(), Some("graph"));
        assert_eq!(solver.problem().unwrap().revision, revision + 1);
    }
}
