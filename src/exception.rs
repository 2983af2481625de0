// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains exception and Result definitions
use thiserror::Error;

/// Represents all kind of errors raised by the model engine, the adapters and the transport.
///
/// Every variant displays its message verbatim, so the text that reaches a client through
/// [`ServerError`](`ManipulationException::ServerError`) is exactly the text of the original
/// failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ManipulationException {
    /// InvalidArgument is returned for duplicate names, missing frames, a missing robot or a
    /// missing gripper or handle.
    #[error("{message}")]
    InvalidArgument { message: String },

    /// ModelException is returned if the kinematic model could not be built, e.g. when a
    /// URDF or SRDF description cannot be read or parsed.
    #[error("{message}")]
    ModelException { message: String },

    /// NetworkException is returned if a connection to the server cannot be established, when a
    /// message is malformed or when a timeout occurs.
    #[error("{message}")]
    NetworkException { message: String },

    /// ServerError is the uniform error a client receives when a remote operation failed.
    #[error("{message}")]
    ServerError { message: String },
}

/// creates an InvalidArgument exception from anything that can be turned into a String
pub(crate) fn invalid_argument(message: impl Into<String>) -> ManipulationException {
    ManipulationException::InvalidArgument {
        message: message.into(),
    }
}

/// creates a ModelException from anything that can be turned into a String
pub(crate) fn model_exception(message: impl Into<String>) -> ManipulationException {
    ManipulationException::ModelException {
        message: message.into(),
    }
}

/// creates a NetworkException from anything that can be turned into a String
pub(crate) fn network_exception(message: impl Into<String>) -> ManipulationException {
    ManipulationException::NetworkException {
        message: message.into(),
    }
}

/// Result type which can have ManipulationException as Error
pub type ManipulationResult<T> = Result<T, ManipulationException>;
