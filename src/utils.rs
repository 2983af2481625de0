// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! contains useful type definitions and conversion functions.
use crate::exception::{invalid_argument, ManipulationResult};
use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion};

/// Rigid transform as it crosses the wire: `[x, y, z, qx, qy, qz, qw]`.
pub type Transform = [f64; 7];

/// The identity transform in wire layout.
pub const IDENTITY_TRANSFORM: Transform = [0., 0., 0., 0., 0., 0., 1.];

/// Number of axes a handle mask describes.
pub const HANDLE_MASK_SIZE: usize = 6;

/// converts a wire transform to an Isometry.
///
/// The quaternion is normalized, so slightly denormalized input coming from a client does not
/// corrupt the kinematic model.
pub fn transform_to_isometry(transform: &Transform) -> Isometry3<f64> {
    let rotation = UnitQuaternion::from_quaternion(Quaternion::new(
        transform[6],
        transform[3],
        transform[4],
        transform[5],
    ));
    Isometry3::from_parts(
        Translation3::new(transform[0], transform[1], transform[2]),
        rotation,
    )
}

/// converts an Isometry to a wire transform
pub fn isometry_to_transform(isometry: &Isometry3<f64>) -> Transform {
    let t = &isometry.translation.vector;
    let q = &isometry.rotation;
    [t.x, t.y, t.z, q.i, q.j, q.k, q.w]
}

/// converts a boolean sequence to a fixed size mask.
///
/// # Errors
/// * [`InvalidArgument`](`crate::exception::ManipulationException::InvalidArgument`) if the
/// sequence does not have exactly `N` entries.
pub fn bool_seq_to_mask<const N: usize>(sequence: &[bool]) -> ManipulationResult<[bool; N]> {
    if sequence.len() != N {
        return Err(invalid_argument(format!(
            "Expecting a vector of size {}, got a vector of size {}",
            N,
            sequence.len()
        )));
    }
    let mut mask = [false; N];
    mask.copy_from_slice(sequence);
    Ok(mask)
}

/// joins a robot name and an element name the way the engine prefixes frames, joints,
/// grippers and handles of a robot.
pub fn robot_prefix(robot_name: &str) -> String {
    if robot_name.is_empty() {
        String::new()
    } else {
        format!("{}/", robot_name)
    }
}
