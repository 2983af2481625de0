// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! # manipulation-rpc
//! manipulation-rpc is a server for setting up manipulation planning problems remotely,
//! together with a client to talk to it.
//!
//! A session holds one composite robot per planning problem. Robot models are loaded from
//! URDF and SRDF descriptions and each one is prefixed with `<robotName>/`, so several robots
//! and environment objects can live in the same composite robot. Grippers and handles can be
//! attached to the links of the robot.
//!
//! The library is divided into these main modules:
//! * [server](`crate::server`) - exposes the robot, problem and graph objects of a session
//! under `<context>/manipulation/{robot,problem,graph}`.
//! * [client](`crate::client`) - connects to a server and resolves these objects.
//! * [robot](`crate::robot`) - loads models and manages grippers and handles.
//! * [model](`crate::model`) - kinematic trees, URDF and SRDF parsing.
//!
//! # Example:
//!```no_run
//! use manipulation::{Client, ClientConfig, ManipulationResult};
//! fn main() -> ManipulationResult<()> {
//!     let mut client = Client::connect(&ClientConfig::default())?;
//!     let mut robot = client.robot().expect("no robot object");
//!     robot.insert_robot_model("arm", "anchor", "/tmp/arm.urdf", "/tmp/arm.srdf")?;
//!     robot.add_handle(
//!         "arm/link1",
//!         "arm/handle",
//!         &[0., 0., 0.1, 0., 0., 0., 1.],
//!         0.01,
//!         &[true; 6],
//!     )?;
//!     let (joint, position) = robot.get_handle_position_in_joint("arm/handle")?;
//!     println!("{} {:?}", joint, position);
//!     Ok(())
//! }
//! ```
//! The server is started with the `manipulation-server` binary or with
//! [`Server::bind`](`crate::Server::bind`). Errors raised by the server are returned to the
//! client as [`ServerError`](`crate::exception::ManipulationException::ServerError`) carrying
//! the original message.
pub mod client;
pub mod device;
pub mod exception;
pub mod graph;
pub mod gripper;
pub mod handle;
pub mod model;
pub mod network;
pub mod problem;
pub mod problem_solver;
pub mod robot;
pub mod server;
pub mod service_types;
pub mod utils;

#[cfg(test)]
mod test_data;

pub use client::{Client, ClientConfig, GraphProxy, ProblemProxy, RobotProxy};
pub use device::Device;
pub use exception::{ManipulationException, ManipulationResult};
pub use graph::Graph;
pub use gripper::Gripper;
pub use handle::Handle;
pub use model::ModelSource;
pub use problem::Problem;
pub use problem_solver::{ProblemSolver, ProblemSolverMap};
pub use robot::Robot;
pub use server::{Server, ServerConfig};
pub use utils::Transform;
