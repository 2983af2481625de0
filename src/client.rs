// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the Client, which connects to a [`Server`](`crate::Server`) and resolves its
//! objects.
use std::time::Duration;

use tracing::{info, warn};

use crate::exception::ManipulationResult;
use crate::network::Network;
use crate::service_types::{
    AddGripperRequest, AddHandleRequest, Command, InsertRobotModelOnFrameRequest,
    InsertRobotModelRequest, InsertRobotSrdfModelRequest, LoadEnvironmentModelRequest, ObjectRef,
    PositionInJoint, Reply, ResolveRequest, SetHandlePositionInJointRequest, SetRootJointPositionRequest,
    DEFAULT_CONTEXT, DEFAULT_PORT, GRAPH_INTERFACE, NAMING_CONTEXT_ID, PLUGIN, PROBLEM_INTERFACE,
    ROBOT_INTERFACE,
};
use crate::utils::Transform;

/// Where to find the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub address: String,
    pub port: u16,
    /// naming context the server registered its objects in
    pub context: String,
    /// maximum time to wait for a reply
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            address: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            context: DEFAULT_CONTEXT.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Connection to the manipulation objects of a server.
///
/// The `robot`, `problem` and `graph` objects are resolved once when connecting. An object
/// which could not be resolved, or which does not implement the expected interface, is
/// unavailable and the corresponding accessor returns `None`.
pub struct Client {
    network: Network,
    robot: Option<ObjectRef>,
    problem: Option<ObjectRef>,
    graph: Option<ObjectRef>,
}

impl Client {
    /// Connects to the server and resolves `<context>/manipulation/{robot,problem,graph}`.
    ///
    /// # Errors
    /// * [`NetworkException`](`crate::exception::ManipulationException::NetworkException`) if
    /// the connection cannot be established or a resolve request cannot be transmitted.
    pub fn connect(config: &ClientConfig) -> ManipulationResult<Client> {
        let mut network = Network::new(&config.address, config.port, config.timeout)?;
        let robot = resolve(&mut network, &config.context, "robot", ROBOT_INTERFACE)?;
        let problem = resolve(&mut network, &config.context, "problem", PROBLEM_INTERFACE)?;
        let graph = resolve(&mut network, &config.context, "graph", GRAPH_INTERFACE)?;
        info!(
            address = %config.address,
            port = config.port,
            context = %config.context,
            "connected to server"
        );
        Ok(Client {
            network,
            robot,
            problem,
            graph,
        })
    }

    pub fn robot(&mut self) -> Option<RobotProxy<'_>> {
        let object = self.robot.clone()?;
        Some(RobotProxy {
            network: &mut self.network,
            object,
        })
    }

    pub fn problem(&mut self) -> Option<ProblemProxy<'_>> {
        let object = self.problem.clone()?;
        Some(ProblemProxy {
            network: &mut self.network,
            object,
        })
    }

    pub fn graph(&mut self) -> Option<GraphProxy<'_>> {
        let object = self.graph.clone()?;
        Some(GraphProxy {
            network: &mut self.network,
            object,
        })
    }
}

/// Resolves `[context, plugin, role]` and narrows it to `interface`.
///
/// Transport failures are errors. A missing name or a foreign interface yields `None`.
fn resolve(
    network: &mut Network,
    context: &str,
    role: &str,
    interface: &str,
) -> ManipulationResult<Option<ObjectRef>> {
    let request = ResolveRequest {
        path: vec![context.to_string(), PLUGIN.to_string(), role.to_string()],
    };
    let command_id = network.tcp_send_request(Command::Resolve, NAMING_CONTEXT_ID, &request)?;
    let reply: Reply<ObjectRef> = network.tcp_blocking_receive_response(command_id)?;
    match reply.into_result() {
        Ok(object) if object.interface == interface => Ok(Some(object)),
        Ok(object) => {
            warn!(
                role,
                expected = interface,
                actual = %object.interface,
                "could not narrow object"
            );
            Ok(None)
        }
        Err(e) => {
            warn!(role, error = %e, "could not resolve object");
            Ok(None)
        }
    }
}

/// Remote [`Robot`](`crate::Robot`).
pub struct RobotProxy<'a> {
    network: &'a mut Network,
    object: ObjectRef,
}

impl<'a> RobotProxy<'a> {
    pub fn insert_robot_model(
        &mut self,
        robot_name: &str,
        root_joint_type: &str,
        urdf_path: &str,
        srdf_path: &str,
    ) -> ManipulationResult<()> {
        self.insert(Command::InsertRobotModel, robot_name, root_joint_type, urdf_path, srdf_path)
    }

    pub fn insert_robot_model_from_string(
        &mut self,
        robot_name: &str,
        root_joint_type: &str,
        urdf: &str,
        srdf: &str,
    ) -> ManipulationResult<()> {
        self.insert(Command::InsertRobotModelFromString, robot_name, root_joint_type, urdf, srdf)
    }

    pub fn insert_humanoid_model(
        &mut self,
        robot_name: &str,
        root_joint_type: &str,
        urdf_path: &str,
        srdf_path: &str,
    ) -> ManipulationResult<()> {
        self.insert(Command::InsertHumanoidModel, robot_name, root_joint_type, urdf_path, srdf_path)
    }

    pub fn insert_humanoid_model_from_string(
        &mut self,
        robot_name: &str,
        root_joint_type: &str,
        urdf: &str,
        srdf: &str,
    ) -> ManipulationResult<()> {
        self.insert(Command::InsertHumanoidModelFromString, robot_name, root_joint_type, urdf, srdf)
    }

    fn insert(
        &mut self,
        command: Command,
        robot_name: &str,
        root_joint_type: &str,
        urdf: &str,
        srdf: &str,
    ) -> ManipulationResult<()> {
        let request = InsertRobotModelRequest {
            robot_name: robot_name.to_string(),
            root_joint_type: root_joint_type.to_string(),
            urdf: urdf.to_string(),
            srdf: srdf.to_string(),
        };
        self.network.call(self.object.id, command, &request)
    }

    pub fn insert_robot_model_on_frame(
        &mut self,
        robot_name: &str,
        frame_name: &str,
        root_joint_type: &str,
        urdf_path: &str,
        srdf_path: &str,
    ) -> ManipulationResult<()> {
        self.insert_on_frame(
            Command::InsertRobotModelOnFrame,
            robot_name,
            frame_name,
            root_joint_type,
            urdf_path,
            srdf_path,
        )
    }

    pub fn insert_robot_model_on_frame_from_string(
        &mut self,
        robot_name: &str,
        frame_name: &str,
        root_joint_type: &str,
        urdf: &str,
        srdf: &str,
    ) -> ManipulationResult<()> {
        self.insert_on_frame(
            Command::InsertRobotModelOnFrameFromString,
            robot_name,
            frame_name,
            root_joint_type,
            urdf,
            srdf,
        )
    }

    fn insert_on_frame(
        &mut self,
        command: Command,
        robot_name: &str,
        frame_name: &str,
        root_joint_type: &str,
        urdf: &str,
        srdf: &str,
    ) -> ManipulationResult<()> {
        let request = InsertRobotModelOnFrameRequest {
            robot_name: robot_name.to_string(),
            frame_name: frame_name.to_string(),
            root_joint_type: root_joint_type.to_string(),
            urdf: urdf.to_string(),
            srdf: srdf.to_string(),
        };
        self.network.call(self.object.id, command, &request)
    }

    pub fn insert_robot_srdf_model(
        &mut self,
        robot_name: &str,
        srdf_path: &str,
    ) -> ManipulationResult<()> {
        let request = InsertRobotSrdfModelRequest {
            robot_name: robot_name.to_string(),
            srdf: srdf_path.to_string(),
        };
        self.network
            .call(self.object.id, Command::InsertRobotSrdfModel, &request)
    }

    pub fn insert_robot_srdf_model_from_string(
        &mut self,
        robot_name: &str,
        srdf: &str,
    ) -> ManipulationResult<()> {
        let request = InsertRobotSrdfModelRequest {
            robot_name: robot_name.to_string(),
            srdf: srdf.to_string(),
        };
        self.network
            .call(self.object.id, Command::InsertRobotSrdfModelFromString, &request)
    }

    pub fn load_environment_model(
        &mut self,
        urdf_path: &str,
        srdf_path: &str,
        prefix: &str,
    ) -> ManipulationResult<()> {
        self.load_environment(Command::LoadEnvironmentModel, urdf_path, srdf_path, prefix)
    }

    pub fn load_environment_model_from_string(
        &mut self,
        urdf: &str,
        srdf: &str,
        prefix: &str,
    ) -> ManipulationResult<()> {
        self.load_environment(Command::LoadEnvironmentModelFromString, urdf, srdf, prefix)
    }

    fn load_environment(
        &mut self,
        command: Command,
        urdf: &str,
        srdf: &str,
        prefix: &str,
    ) -> ManipulationResult<()> {
        let request = LoadEnvironmentModelRequest {
            urdf: urdf.to_string(),
            srdf: srdf.to_string(),
            prefix: prefix.to_string(),
        };
        self.network.call(self.object.id, command, &request)
    }

    pub fn get_root_joint_position(&mut self, robot_name: &str) -> ManipulationResult<Transform> {
        self.network.call(
            self.object.id,
            Command::GetRootJointPosition,
            &robot_name.to_string(),
        )
    }

    pub fn set_root_joint_position(
        &mut self,
        robot_name: &str,
        position: &Transform,
    ) -> ManipulationResult<()> {
        let request = SetRootJointPositionRequest {
            robot_name: robot_name.to_string(),
            position: *position,
        };
        self.network
            .call(self.object.id, Command::SetRootJointPosition, &request)
    }

    pub fn add_handle(
        &mut self,
        link_name: &str,
        handle_name: &str,
        local_position: &Transform,
        clearance: f64,
        mask: &[bool],
    ) -> ManipulationResult<()> {
        let request = AddHandleRequest {
            link_name: link_name.to_string(),
            handle_name: handle_name.to_string(),
            local_position: *local_position,
            clearance,
            mask: mask.to_vec(),
        };
        self.network.call(self.object.id, Command::AddHandle, &request)
    }

    pub fn add_gripper(
        &mut self,
        link_name: &str,
        gripper_name: &str,
        position: &Transform,
        clearance: f64,
    ) -> ManipulationResult<()> {
        let request = AddGripperRequest {
            link_name: link_name.to_string(),
            gripper_name: gripper_name.to_string(),
            position: *position,
            clearance,
        };
        self.network.call(self.object.id, Command::AddGripper, &request)
    }

    /// Returns the joint name and the pose of the gripper in that joint.
    pub fn get_gripper_position_in_joint(
        &mut self,
        gripper_name: &str,
    ) -> ManipulationResult<(String, Transform)> {
        let reply: PositionInJoint = self.network.call(
            self.object.id,
            Command::GetGripperPositionInJoint,
            &gripper_name.to_string(),
        )?;
        Ok((reply.joint_name, reply.position))
    }

    /// Returns the joint name and the pose of the handle in that joint.
    pub fn get_handle_position_in_joint(
        &mut self,
        handle_name: &str,
    ) -> ManipulationResult<(String, Transform)> {
        let reply: PositionInJoint = self.network.call(
            self.object.id,
            Command::GetHandlePositionInJoint,
            &handle_name.to_string(),
        )?;
        Ok((reply.joint_name, reply.position))
    }

    pub fn set_handle_position_in_joint(
        &mut self,
        handle_name: &str,
        position: &Transform,
    ) -> ManipulationResult<()> {
        let request = SetHandlePositionInJointRequest {
            handle_name: handle_name.to_string(),
            position: *position,
        };
        self.network
            .call(self.object.id, Command::SetHandlePositionInJoint, &request)
    }
}

/// Remote [`Problem`](`crate::Problem`).
pub struct ProblemProxy<'a> {
    network: &'a mut Network,
    object: ObjectRef,
}

impl<'a> ProblemProxy<'a> {
    /// Returns whether a new problem was created.
    pub fn select_problem(&mut self, name: &str) -> ManipulationResult<bool> {
        self.network
            .call(self.object.id, Command::SelectProblem, &name.to_string())
    }

    pub fn reset_problem(&mut self) -> ManipulationResult<()> {
        self.network.call(self.object.id, Command::ResetProblem, &())
    }

    pub fn get_available(&mut self, kind: &str) -> ManipulationResult<Vec<String>> {
        self.network
            .call(self.object.id, Command::GetAvailable, &kind.to_string())
    }
}

/// Remote [`Graph`](`crate::Graph`).
pub struct GraphProxy<'a> {
    network: &'a mut Network,
    object: ObjectRef,
}

impl<'a> GraphProxy<'a> {
    pub fn create_graph(&mut self, graph_name: &str) -> ManipulationResult<()> {
        self.network
            .call(self.object.id, Command::CreateGraph, &graph_name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use mockall::automock;
    use std::net::TcpListener;
    use std::time::Duration;

    use crate::client::{Client, ClientConfig};
    use crate::exception::ManipulationException;
    use crate::network::{deserialize, encode_raw_message, read_message, serialize};
    use crate::server::{Server, ServerConfig};
    use crate::service_types::{
        Command, ObjectRef, Reply, ResolveRequest, PROBLEM_INTERFACE, ROBOT_INTERFACE,
    };
    use crate::test_data::{ARM_SRDF, ARM_URDF, BOX_SRDF, BOX_URDF};
    use crate::utils::test::slice_compare;
    use num_traits::FromPrimitive;
    use std::io::Write;

    pub struct ServerReaction {}

    #[automock]
    #[allow(unused)]
    impl ServerReaction {
        fn resolve(&self, path: &[String]) -> Vec<u8> {
            Vec::new()
        }
    }

    /// Answers the resolve requests of one client with the reaction, then closes.
    fn mock_server(reaction: MockServerReaction) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            while let Some((header, payload)) = read_message(&mut stream).unwrap() {
                assert_eq!(Command::from_u32(header.command), Some(Command::Resolve));
                assert_eq!(header.object_id, 0);
                let request: ResolveRequest = deserialize(&payload).unwrap();
                let reply = reaction.resolve(&request.path);
                stream
                    .write_all(&encode_raw_message(header, reply).unwrap())
                    .unwrap();
            }
        });
        port
    }

    fn object(id: u32, interface: &str) -> Vec<u8> {
        serialize(&Reply::Success(ObjectRef {
            id,
            interface: interface.to_string(),
        }))
        .unwrap()
    }

    #[test]
    fn failed_narrow_is_none() {
        let mut reaction = MockServerReaction::default();
        reaction
            .expect_resolve()
            .returning(|path: &[String]| -> Vec<u8> {
                assert_eq!(path[0], "ctx");
                assert_eq!(path[1], "manipulation");
                match path[2].as_str() {
                    "robot" => object(1, ROBOT_INTERFACE),
                    // registered under the graph role but implements another interface
                    "graph" => object(3, PROBLEM_INTERFACE),
                    _ => serialize(&Reply::<()>::Error {
                        message: "Name not found".to_string(),
                    })
                    .unwrap(),
                }
            })
            .times(3);
        let port = mock_server(reaction);
        let mut client = Client::connect(&ClientConfig {
            port,
            context: "ctx".to_string(),
            timeout: Duration::from_secs(2),
            ..ClientConfig::default()
        })
        .unwrap();
        assert!(client.robot().is_some());
        assert!(client.problem().is_none());
        assert!(client.graph().is_none());
    }

    #[test]
    fn connection_refused() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let result = Client::connect(&ClientConfig {
            port,
            timeout: Duration::from_millis(500),
            ..ClientConfig::default()
        });
        assert!(matches!(
            result,
            Err(ManipulationException::NetworkException { .. })
        ));
    }

    #[test]
    fn timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let thread = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            std::thread::sleep(Duration::from_millis(500));
            drop(stream);
        });
        let result = Client::connect(&ClientConfig {
            port,
            timeout: Duration::from_millis(100),
            ..ClientConfig::default()
        });
        assert!(matches!(
            result,
            Err(ManipulationException::NetworkException { .. })
        ));
        thread.join().unwrap();
    }

    fn connect_to_new_server() -> Client {
        let server = Server::bind(&ServerConfig {
            port: 0,
            ..ServerConfig::default()
        })
        .unwrap();
        let port = server.local_addr().unwrap().port();
        server.spawn();
        Client::connect(&ClientConfig {
            port,
            ..ClientConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn remote_robot() {
        let mut client = connect_to_new_server();
        let mut robot = client.robot().unwrap();
        robot
            .insert_robot_model_from_string("arm", "anchor", ARM_URDF, ARM_SRDF)
            .unwrap();
        let error = robot
            .insert_robot_model_from_string("arm", "anchor", ARM_URDF, "")
            .unwrap_err();
        assert_eq!(
            error,
            ManipulationException::ServerError {
                message: "A robot named arm already exists".to_string()
            }
        );
        let error = robot
            .insert_robot_model_on_frame_from_string("other", "nowhere", "anchor", ARM_URDF, "")
            .unwrap_err();
        assert_eq!(error.to_string(), "No frame named nowhere.");

        let pose = [0.1, 0., 0.05, 0., 0., 0., 1.];
        robot
            .add_handle("arm/link1", "arm/handle", &pose, 0.01, &[true; 6])
            .unwrap();
        let (joint, position) = robot.get_handle_position_in_joint("arm/handle").unwrap();
        assert_eq!(joint, "arm/joint1");
        slice_compare(&position, &pose, 1e-12);
        assert!(robot
            .add_handle("arm/link1", "arm/handle2", &pose, 0.01, &[true; 3])
            .is_err());

        robot
            .add_gripper("arm/link1", "arm/gripper2", &pose, 0.)
            .unwrap();
        let (joint, _) = robot.get_gripper_position_in_joint("arm/gripper2").unwrap();
        assert_eq!(joint, "arm/joint1");
        assert_eq!(
            robot
                .get_gripper_position_in_joint("none")
                .unwrap_err()
                .to_string(),
            "This gripper does not exists."
        );

        let moved = [0., 1., 0., 0., 0., 0., 1.];
        robot.set_handle_position_in_joint("arm/handle", &moved).unwrap();
        let (_, position) = robot.get_handle_position_in_joint("arm/handle").unwrap();
        slice_compare(&position, &moved, 1e-12);

        robot.set_root_joint_position("arm", &moved).unwrap();
        slice_compare(&robot.get_root_joint_position("arm").unwrap(), &moved, 1e-12);

        robot
            .load_environment_model_from_string(BOX_URDF, BOX_SRDF, "box/")
            .unwrap();
        let (joint, _) = robot.get_handle_position_in_joint("box/handle").unwrap();
        assert_eq!(joint, "universe");

        let mut problem = client.problem().unwrap();
        assert_eq!(
            problem.get_available("handle").unwrap(),
            vec!["arm/handle".to_string(), "box/handle".to_string()]
        );
        assert_eq!(
            problem.get_available("nonsense").unwrap_err().to_string(),
            "Type nonsense not understood"
        );
        problem.reset_problem().unwrap();

        client.graph().unwrap().create_graph("graph").unwrap();
        let mut problem = client.problem().unwrap();
        assert!(problem.select_problem("empty").unwrap());
        assert_eq!(
            client.graph().unwrap().create_graph("graph").unwrap_err().to_string(),
            "No robot loaded."
        );
    }

    #[test]
    fn remote_robot_from_files() {
        let mut urdf = tempfile::NamedTempFile::new().unwrap();
        urdf.write_all(ARM_URDF.as_bytes()).unwrap();
        let mut srdf = tempfile::NamedTempFile::new().unwrap();
        srdf.write_all(ARM_SRDF.as_bytes()).unwrap();
        let urdf_path = urdf.path().to_str().unwrap().to_string();
        let srdf_path = srdf.path().to_str().unwrap().to_string();

        let mut client = connect_to_new_server();
        let mut robot = client.robot().unwrap();
        robot
            .insert_humanoid_model_from_string("arm", "anchor", ARM_URDF, "")
            .unwrap_err();
        robot
            .insert_robot_model("arm", "freeflyer", &urdf_path, "")
            .unwrap();
        robot.insert_robot_srdf_model("arm", &srdf_path).unwrap();
        robot
            .insert_robot_model_on_frame("second", "arm/tool_link", "anchor", &urdf_path, &srdf_path)
            .unwrap();
        let error = robot
            .insert_robot_model("third", "anchor", "/nonexistent.urdf", "")
            .unwrap_err();
        assert!(matches!(error, ManipulationException::ServerError { .. }));
        let (joint, _) = robot.get_gripper_position_in_joint("second/gripper").unwrap();
        assert_eq!(joint, "second/joint1");
        let mut problem = client.problem().unwrap();
        assert_eq!(
            problem.get_available("gripper").unwrap(),
            vec!["arm/gripper".to_string(), "second/gripper".to_string()]
        );
        assert!(!problem.select_problem("default").unwrap());
    }
}
