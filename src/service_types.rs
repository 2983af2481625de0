// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Messages exchanged between [`Client`](`crate::Client`) and [`Server`](`crate::Server`).
//!
//! Every message is a [`CommandHeader`](`CommandHeader`) followed by `size` bytes of bincode
//! payload. Replies echo the header of the request and carry a [`Reply`](`Reply`).
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::exception::{ManipulationException, ManipulationResult};
use crate::utils::Transform;

pub static DEFAULT_PORT: u16 = 13331;
pub static DEFAULT_CONTEXT: &str = "corbaserver";
/// Name under which the manipulation objects are registered in a context.
pub static PLUGIN: &str = "manipulation";
/// Object id of the naming context.
pub static NAMING_CONTEXT_ID: u32 = 0;
/// Size of a serialized [`CommandHeader`](`CommandHeader`).
pub const COMMAND_HEADER_SIZE: usize = 16;
/// Largest payload a peer may announce in a header.
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024 * 1024;

pub static ROBOT_INTERFACE: &str = "IDL:hpp/corbaserver/manipulation/Robot:1.0";
pub static PROBLEM_INTERFACE: &str = "IDL:hpp/corbaserver/manipulation/Problem:1.0";
pub static GRAPH_INTERFACE: &str = "IDL:hpp/corbaserver/manipulation/Graph:1.0";

#[derive(FromPrimitive, ToPrimitive, Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u32)]
pub enum Command {
    Resolve,
    InsertRobotModel,
    InsertRobotModelOnFrame,
    InsertRobotModelFromString,
    InsertRobotModelOnFrameFromString,
    InsertRobotSrdfModel,
    InsertRobotSrdfModelFromString,
    InsertHumanoidModel,
    InsertHumanoidModelFromString,
    LoadEnvironmentModel,
    LoadEnvironmentModelFromString,
    GetRootJointPosition,
    SetRootJointPosition,
    AddHandle,
    AddGripper,
    GetGripperPositionInJoint,
    GetHandlePositionInJoint,
    SetHandlePositionInJoint,
    SelectProblem,
    ResetProblem,
    GetAvailable,
    CreateGraph,
}

impl Command {
    /// Interface of the objects which accept this command, `None` for the naming context.
    pub fn interface(&self) -> Option<&'static str> {
        match self {
            Command::Resolve => None,
            Command::SelectProblem | Command::ResetProblem | Command::GetAvailable => {
                Some(PROBLEM_INTERFACE)
            }
            Command::CreateGraph => Some(GRAPH_INTERFACE),
            _ => Some(ROBOT_INTERFACE),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct CommandHeader {
    pub command: u32,
    pub command_id: u32,
    pub object_id: u32,
    pub size: u32,
}

impl CommandHeader {
    pub fn new(command: Command, command_id: u32, object_id: u32, size: u32) -> CommandHeader {
        CommandHeader {
            command: command.to_u32().unwrap_or(u32::MAX),
            command_id,
            object_id,
            size,
        }
    }
}

/// Outcome of a remote operation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Reply<T> {
    Success(T),
    Error { message: String },
}

impl<T> Reply<T> {
    /// Turns a reply into a result, an error reply becomes a
    /// [`ServerError`](`crate::exception::ManipulationException::ServerError`).
    pub fn into_result(self) -> ManipulationResult<T> {
        match self {
            Reply::Success(value) => Ok(value),
            Reply::Error { message } => Err(ManipulationException::ServerError { message }),
        }
    }
}

/// Reference to a remote object.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub id: u32,
    /// repository id of the interface the object implements
    pub interface: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ResolveRequest {
    /// `[context, plugin, role]`
    pub path: Vec<String>,
}

/// Used for robot and humanoid models, from paths or from strings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InsertRobotModelRequest {
    pub robot_name: String,
    pub root_joint_type: String,
    pub urdf: String,
    pub srdf: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InsertRobotModelOnFrameRequest {
    pub robot_name: String,
    pub frame_name: String,
    pub root_joint_type: String,
    pub urdf: String,
    pub srdf: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InsertRobotSrdfModelRequest {
    pub robot_name: String,
    pub srdf: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LoadEnvironmentModelRequest {
    pub urdf: String,
    pub srdf: String,
    pub prefix: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SetRootJointPositionRequest {
    pub robot_name: String,
    pub position: Transform,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AddHandleRequest {
    pub link_name: String,
    pub handle_name: String,
    pub local_position: Transform,
    pub clearance: f64,
    pub mask: Vec<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AddGripperRequest {
    pub link_name: String,
    pub gripper_name: String,
    pub position: Transform,
    pub clearance: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SetHandlePositionInJointRequest {
    pub handle_name: String,
    pub position: Transform,
}

/// Reply of the position in joint queries.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PositionInJoint {
    pub joint_name: String,
    pub position: Transform,
}

#[cfg(test)]
mod tests {
    use crate::exception::ManipulationException;
    use crate::service_types::{Command, CommandHeader, Reply, COMMAND_HEADER_SIZE};
    use num_traits::FromPrimitive;

    #[test]
    fn header_has_fixed_size() {
        let header = CommandHeader::new(Command::AddHandle, 3, 1, 42);
        let bytes = bincode::serialize(&header).unwrap();
        assert_eq!(bytes.len(), COMMAND_HEADER_SIZE);
        assert_eq!(&bytes[0..4], &13_u32.to_le_bytes());
        assert_eq!(Command::from_u32(header.command), Some(Command::AddHandle));
        assert_eq!(Command::from_u32(1000), None);
    }

    #[test]
    fn error_reply_does_not_depend_on_payload_type() {
        let error: Reply<()> = Reply::Error {
            message: "No robot loaded.".to_string(),
        };
        let bytes = bincode::serialize(&error).unwrap();
        let decoded: Reply<Vec<String>> = bincode::deserialize(&bytes).unwrap();
        assert_eq!(
            decoded.into_result().unwrap_err(),
            ManipulationException::ServerError {
                message: "No robot loaded.".to_string()
            }
        );
    }
}
