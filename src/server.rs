// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the Server, which exposes the robot, problem and graph objects of a session.
use std::collections::BTreeMap;
use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use num_traits::FromPrimitive;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::exception::{invalid_argument, network_exception, ManipulationResult};
use crate::graph::Graph;
use crate::model::ModelSource;
use crate::network::{deserialize, encode_raw_message, read_message, serialize};
use crate::problem::Problem;
use crate::problem_solver::ProblemSolverMap;
use crate::robot::Robot;
use crate::service_types::{
    AddGripperRequest, AddHandleRequest, Command, CommandHeader, InsertRobotModelOnFrameRequest,
    InsertRobotModelRequest, InsertRobotSrdfModelRequest, LoadEnvironmentModelRequest, ObjectRef,
    PositionInJoint, Reply, ResolveRequest, SetHandlePositionInJointRequest,
    SetRootJointPositionRequest, DEFAULT_CONTEXT, DEFAULT_PORT, GRAPH_INTERFACE,
    NAMING_CONTEXT_ID, PLUGIN, PROBLEM_INTERFACE, ROBOT_INTERFACE,
};

/// Where the server listens and under which naming context it registers its objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    pub context: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            address: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            context: DEFAULT_CONTEXT.to_string(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Servant {
    Robot,
    Problem,
    Graph,
}

impl Servant {
    fn interface(&self) -> &'static str {
        match self {
            Servant::Robot => ROBOT_INTERFACE,
            Servant::Problem => PROBLEM_INTERFACE,
            Servant::Graph => GRAPH_INTERFACE,
        }
    }
}

struct ServerState {
    /// `[context, plugin, role]` to object
    names: BTreeMap<Vec<String>, ObjectRef>,
    objects: BTreeMap<u32, Servant>,
    session: Mutex<ProblemSolverMap>,
}

impl ServerState {
    fn new(context: &str) -> Self {
        let mut names = BTreeMap::new();
        let mut objects = BTreeMap::new();
        for (id, (role, servant)) in [
            ("robot", Servant::Robot),
            ("problem", Servant::Problem),
            ("graph", Servant::Graph),
        ]
        .into_iter()
        .enumerate()
        {
            let id = id as u32 + 1;
            objects.insert(id, servant);
            names.insert(
                vec![context.to_string(), PLUGIN.to_string(), role.to_string()],
                ObjectRef {
                    id,
                    interface: servant.interface().to_string(),
                },
            );
        }
        ServerState {
            names,
            objects,
            session: Mutex::new(ProblemSolverMap::default()),
        }
    }
}

/// Serves one session to any number of clients.
///
/// Each connection is served by its own thread. Requests are executed one at a time.
pub struct Server {
    listener: TcpListener,
    state: Arc<ServerState>,
}

impl Server {
    /// Binds the listening socket and registers the objects under `config.context`.
    ///
    /// # Errors
    /// * [`NetworkException`](`crate::exception::ManipulationException::NetworkException`) if
    /// the socket cannot be bound.
    pub fn bind(config: &ServerConfig) -> ManipulationResult<Server> {
        let address = format!("{}:{}", config.address, config.port)
            .to_socket_addrs()
            .map_err(|e| network_exception(e.to_string()))?
            .next()
            .ok_or_else(|| network_exception(format!("Could not resolve {}", config.address)))?;
        let listener = TcpListener::bind(address)
            .map_err(|e| network_exception(format!("Could not bind {}: {}", address, e)))?;
        info!(%address, context = %config.context, "server listening");
        Ok(Server {
            listener,
            state: Arc::new(ServerState::new(&config.context)),
        })
    }

    pub fn local_addr(&self) -> ManipulationResult<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| network_exception(e.to_string()))
    }

    /// Accepts connections forever.
    pub fn run(self) -> ManipulationResult<()> {
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let state = self.state.clone();
                    std::thread::spawn(move || handle_connection(stream, state));
                }
                Err(e) => warn!(error = %e, "failed to accept connection"),
            }
        }
        Ok(())
    }

    /// Runs the server on a background thread.
    pub fn spawn(self) -> JoinHandle<ManipulationResult<()>> {
        std::thread::spawn(move || self.run())
    }
}

fn handle_connection(mut stream: TcpStream, state: Arc<ServerState>) {
    let peer = stream
        .peer_addr()
        .map(|address| address.to_string())
        .unwrap_or_default();
    info!(%peer, "client connected");
    if let Err(e) = stream.set_nodelay(true) {
        warn!(%peer, error = %e, "could not disable Nagle's algorithm");
    }
    loop {
        let (header, payload) = match read_message(&mut stream) {
            Ok(Some(message)) => message,
            Ok(None) => break,
            Err(e) => {
                warn!(%peer, error = %e, "dropping connection");
                break;
            }
        };
        let reply = match dispatch(&state, &header, &payload) {
            Ok(reply) => reply,
            Err(e) => {
                debug!(command = header.command, error = %e, "request failed");
                match serialize(&Reply::<()>::Error {
                    message: e.to_string(),
                }) {
                    Ok(reply) => reply,
                    Err(e) => {
                        error!(error = %e, "could not encode error reply");
                        break;
                    }
                }
            }
        };
        let sent = encode_raw_message(header, reply)
            .and_then(|message| {
                stream
                    .write_all(&message)
                    .map_err(|e| network_exception(e.to_string()))
            });
        if let Err(e) = sent {
            warn!(%peer, error = %e, "dropping connection");
            break;
        }
    }
    info!(%peer, "client disconnected");
}

fn success<T: Serialize>(value: T) -> ManipulationResult<Vec<u8>> {
    serialize(&Reply::Success(value))
}

/// Executes one request and returns the serialized successful reply.
fn dispatch(
    state: &ServerState,
    header: &CommandHeader,
    payload: &[u8],
) -> ManipulationResult<Vec<u8>> {
    let command = Command::from_u32(header.command)
        .ok_or_else(|| invalid_argument(format!("Unknown command {}", header.command)))?;
    debug!(?command, command_id = header.command_id, object = header.object_id, "request");
    if header.object_id == NAMING_CONTEXT_ID {
        if command != Command::Resolve {
            return Err(invalid_argument(format!(
                "The naming context does not understand {:?}",
                command
            )));
        }
        let request: ResolveRequest = deserialize(payload)?;
        let object = state.names.get(&request.path).cloned().ok_or_else(|| {
            invalid_argument(format!("Name {} not found", request.path.join("/")))
        })?;
        return success(object);
    }
    let servant = state
        .objects
        .get(&header.object_id)
        .ok_or_else(|| invalid_argument(format!("No object with id {}", header.object_id)))?;
    if command.interface() != Some(servant.interface()) {
        return Err(invalid_argument(format!(
            "Object {} does not implement {:?}",
            header.object_id, command
        )));
    }

    let mut session = state
        .session
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    match command {
        Command::Resolve => Err(invalid_argument("Resolve is only understood by the naming context")),
        Command::InsertRobotModel | Command::InsertRobotModelFromString => {
            let r: InsertRobotModelRequest = deserialize(payload)?;
            let (urdf, srdf) = sources(command == Command::InsertRobotModel, &r.urdf, &r.srdf);
            Robot::new(session.selected_mut()).insert_robot_model(
                &r.robot_name,
                &r.root_joint_type,
                urdf,
                srdf,
            )?;
            success(())
        }
        Command::InsertRobotModelOnFrame | Command::InsertRobotModelOnFrameFromString => {
            let r: InsertRobotModelOnFrameRequest = deserialize(payload)?;
            let (urdf, srdf) =
                sources(command == Command::InsertRobotModelOnFrame, &r.urdf, &r.srdf);
            Robot::new(session.selected_mut()).insert_robot_model_on_frame(
                &r.robot_name,
                &r.frame_name,
                &r.root_joint_type,
                urdf,
                srdf,
            )?;
            success(())
        }
        Command::InsertHumanoidModel | Command::InsertHumanoidModelFromString => {
            let r: InsertRobotModelRequest = deserialize(payload)?;
            let (urdf, srdf) = sources(command == Command::InsertHumanoidModel, &r.urdf, &r.srdf);
            Robot::new(session.selected_mut()).insert_humanoid_model(
                &r.robot_name,
                &r.root_joint_type,
                urdf,
                srdf,
            )?;
            success(())
        }
        Command::InsertRobotSrdfModel | Command::InsertRobotSrdfModelFromString => {
            let r: InsertRobotSrdfModelRequest = deserialize(payload)?;
            let (_, srdf) = sources(command == Command::InsertRobotSrdfModel, "", &r.srdf);
            Robot::new(session.selected_mut()).insert_robot_srdf_model(&r.robot_name, srdf)?;
            success(())
        }
        Command::LoadEnvironmentModel | Command::LoadEnvironmentModelFromString => {
            let r: LoadEnvironmentModelRequest = deserialize(payload)?;
            let (urdf, srdf) =
                sources(command == Command::LoadEnvironmentModel, &r.urdf, &r.srdf);
            Robot::new(session.selected_mut()).load_environment_model(urdf, srdf, &r.prefix)?;
            success(())
        }
        Command::GetRootJointPosition => {
            let robot_name: String = deserialize(payload)?;
            success(Robot::new(session.selected_mut()).get_root_joint_position(&robot_name)?)
        }
        Command::SetRootJointPosition => {
            let r: SetRootJointPositionRequest = deserialize(payload)?;
            Robot::new(session.selected_mut()).set_root_joint_position(&r.robot_name, &r.position)?;
            success(())
        }
        Command::AddHandle => {
            let r: AddHandleRequest = deserialize(payload)?;
            Robot::new(session.selected_mut()).add_handle(
                &r.link_name,
                &r.handle_name,
                &r.local_position,
                r.clearance,
                &r.mask,
            )?;
            success(())
        }
        Command::AddGripper => {
            let r: AddGripperRequest = deserialize(payload)?;
            Robot::new(session.selected_mut()).add_gripper(
                &r.link_name,
                &r.gripper_name,
                &r.position,
                r.clearance,
            )?;
            success(())
        }
        Command::GetGripperPositionInJoint | Command::GetHandlePositionInJoint => {
            let name: String = deserialize(payload)?;
            let robot = Robot::new(session.selected_mut());
            let (joint_name, position) = if command == Command::GetGripperPositionInJoint {
                robot.get_gripper_position_in_joint(&name)?
            } else {
                robot.get_handle_position_in_joint(&name)?
            };
            success(PositionInJoint {
                joint_name,
                position,
            })
        }
        Command::SetHandlePositionInJoint => {
            let r: SetHandlePositionInJointRequest = deserialize(payload)?;
            Robot::new(session.selected_mut())
                .set_handle_position_in_joint(&r.handle_name, &r.position)?;
            success(())
        }
        Command::SelectProblem => {
            let name: String = deserialize(payload)?;
            success(Problem::new(&mut session).select_problem(&name))
        }
        Command::ResetProblem => {
            Problem::new(&mut session).reset_problem();
            success(())
        }
        Command::GetAvailable => {
            let kind: String = deserialize(payload)?;
            success(Problem::new(&mut session).get_available(&kind)?)
        }
        Command::CreateGraph => {
            let name: String = deserialize(payload)?;
            Graph::new(session.selected_mut()).create_graph(&name)?;
            success(())
        }
    }
}

/// Interprets the content of a request as paths or as documents.
fn sources<'a>(from_file: bool, urdf: &'a str, srdf: &'a str) -> (ModelSource<'a>, ModelSource<'a>) {
    if from_file {
        (ModelSource::File(urdf), ModelSource::File(srdf))
    } else {
        (ModelSource::Xml(urdf), ModelSource::Xml(srdf))
    }
}
