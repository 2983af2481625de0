// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Applies the semantic description of a robot (SRDF) on top of its kinematic model.
//!
//! The following elements are understood, all other elements are ignored:
//! * `<gripper name clearance>` with a `<link name>` and an optional `<position>`,
//! * `<handle name clearance>` with a `<link name>`, an optional `<position>` and an optional
//!   `<mask>` of six 0/1 values,
//! * `<contact name>` with a `<link name>`, a `<point>` list of coordinates and a `<shape>`
//!   list of polygons, each given as the number of vertices followed by the point indices,
//! * `<disable_collisions link1 link2>`,
//! * `<group_state name>` with `<joint name value>` children.
//!
//! A `<position>` either contains the seven numbers `x y z qx qy qz qw` or carries an `xyz`
//! attribute and one of the rotation attributes `rpy`, `wxyz` or `xyzw`.
use nalgebra::{Isometry3, Point3, Quaternion, Translation3, UnitQuaternion};
use sxd_document::dom::Element;
use sxd_document::parser;
use tracing::{debug, trace};

use crate::device::{Device, JointAndShapes};
use crate::exception::{model_exception, ManipulationResult};
use crate::gripper::Gripper;
use crate::handle::Handle;
use crate::model::{Frame, FrameIndex, FrameType, JointIndex, ModelSource};
use crate::utils::{bool_seq_to_mask, robot_prefix, transform_to_isometry, HANDLE_MASK_SIZE};

/// Parses the SRDF in `source` and adds its grippers, handles, contact surfaces, disabled
/// collision pairs and reference configurations to `device`. Link, joint and element names
/// are prefixed with `<robotName>/`. An empty source is ignored.
///
/// # Errors
/// * [`ModelException`](`crate::exception::ManipulationException::ModelException`) if the
/// document cannot be read or parsed or if it refers to links or joints which do not exist.
/// * [`InvalidArgument`](`crate::exception::ManipulationException::InvalidArgument`) if a
/// gripper or handle frame already exists or if a mask does not have six entries.
pub fn load_model(
    device: &mut Device,
    robot_name: &str,
    source: &ModelSource,
) -> ManipulationResult<()> {
    if source.is_empty() {
        return Ok(());
    }
    let xml = source.read()?;
    let package = parser::parse(&xml)
        .map_err(|e| model_exception(format!("Failed to parse SRDF: {}", e)))?;
    let document = package.as_document();
    let root = document
        .root()
        .children()
        .into_iter()
        .find_map(|child| child.element())
        .ok_or_else(|| model_exception("SRDF document has no root element"))?;

    let prefix = robot_prefix(robot_name);
    for element in child_elements(root) {
        match element.name().local_part() {
            "gripper" => add_gripper(device, &prefix, element)?,
            "handle" => add_handle(device, &prefix, element)?,
            "contact" => add_contact(device, &prefix, element)?,
            "disable_collisions" => {
                let link1 = required_attribute(element, "link1")?;
                let link2 = required_attribute(element, "link2")?;
                device
                    .disabled_collision_pairs
                    .push((format!("{}{}", prefix, link1), format!("{}{}", prefix, link2)));
            }
            "group_state" => add_reference_configuration(device, &prefix, element)?,
            other => trace!(element = other, "ignoring SRDF element"),
        }
    }
    device.create_data();
    debug!(
        robot = robot_name,
        grippers = device.grippers.len(),
        handles = device.handles.len(),
        "applied SRDF model"
    );
    Ok(())
}

fn child_elements<'d>(element: Element<'d>) -> impl Iterator<Item = Element<'d>> {
    element
        .children()
        .into_iter()
        .filter_map(|child| child.element())
}

fn first_child<'d>(element: Element<'d>, tag: &str) -> Option<Element<'d>> {
    child_elements(element).find(|child| child.name().local_part() == tag)
}

fn text(element: Element) -> String {
    element
        .children()
        .into_iter()
        .filter_map(|child| child.text())
        .map(|text| text.text())
        .collect()
}

fn required_attribute<'d>(element: Element<'d>, name: &str) -> ManipulationResult<&'d str> {
    element.attribute_value(name).ok_or_else(|| {
        model_exception(format!(
            "SRDF element <{}> has no attribute {}",
            element.name().local_part(),
            name
        ))
    })
}

fn parse_numbers(text: &str, what: &str) -> ManipulationResult<Vec<f64>> {
    text.split_whitespace()
        .map(|value| {
            value
                .parse::<f64>()
                .map_err(|_| model_exception(format!("Could not parse {} \"{}\"", what, text)))
        })
        .collect()
}

fn parse_fixed<const N: usize>(text: &str, what: &str) -> ManipulationResult<[f64; N]> {
    let values = parse_numbers(text, what)?;
    values.as_slice().try_into().map_err(|_| {
        model_exception(format!(
            "Expecting {} values for {}, got {}",
            N,
            what,
            values.len()
        ))
    })
}

fn clearance(element: Element) -> ManipulationResult<f64> {
    element
        .attribute_value("clearance")
        .map(|value| {
            value
                .trim()
                .parse::<f64>()
                .map_err(|_| model_exception(format!("Could not parse clearance \"{}\"", value)))
        })
        .unwrap_or(Ok(0.))
}

/// Pose of a `<position>` element, identity when the element is absent.
fn position(parent: Element) -> ManipulationResult<Isometry3<f64>> {
    let element = match first_child(parent, "position") {
        Some(element) => element,
        None => return Ok(Isometry3::identity()),
    };
    let content = text(element);
    if !content.trim().is_empty() {
        return Ok(transform_to_isometry(&parse_fixed::<7>(&content, "position")?));
    }
    let translation = match element.attribute_value("xyz") {
        Some(xyz) => {
            let [x, y, z] = parse_fixed::<3>(xyz, "xyz")?;
            Translation3::new(x, y, z)
        }
        None => Translation3::identity(),
    };
    let rotation = if let Some(rpy) = element.attribute_value("rpy") {
        let [roll, pitch, yaw] = parse_fixed::<3>(rpy, "rpy")?;
        UnitQuaternion::from_euler_angles(roll, pitch, yaw)
    } else if let Some(wxyz) = element.attribute_value("wxyz") {
        let [w, x, y, z] = parse_fixed::<4>(wxyz, "wxyz")?;
        UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z))
    } else if let Some(xyzw) = element.attribute_value("xyzw") {
        let [x, y, z, w] = parse_fixed::<4>(xyzw, "xyzw")?;
        UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z))
    } else {
        UnitQuaternion::identity()
    };
    Ok(Isometry3::from_parts(translation, rotation))
}

/// Resolves the `<link name>` child of `element` to its body frame.
fn link_frame(
    device: &Device,
    prefix: &str,
    element: Element,
) -> ManipulationResult<(FrameIndex, JointIndex, Isometry3<f64>)> {
    let owner = required_attribute(element, "name")?;
    let link = first_child(element, "link").ok_or_else(|| {
        model_exception(format!(
            "SRDF element {} has no link",
            owner
        ))
    })?;
    let link_name = format!("{}{}", prefix, required_attribute(link, "name")?);
    let id = device
        .model
        .frame_id(&link_name)
        .filter(|&id| device.model.frames[id].frame_type == FrameType::Body)
        .ok_or_else(|| model_exception(format!("Link {} of {} not found", link_name, owner)))?;
    let frame = &device.model.frames[id];
    Ok((id, frame.parent, frame.placement))
}

fn add_gripper(device: &mut Device, prefix: &str, element: Element) -> ManipulationResult<()> {
    let name = format!("{}{}", prefix, required_attribute(element, "name")?);
    let (link, joint, link_placement) = link_frame(device, prefix, element)?;
    let placement = link_placement * position(element)?;
    device.model.add_frame(Frame::new(
        name.clone(),
        joint,
        link,
        placement,
        FrameType::OpFrame,
    ))?;
    let mut gripper = Gripper::create(&name, device)?;
    gripper.clearance = clearance(element)?;
    device.grippers.add(name, gripper);
    Ok(())
}

fn add_handle(device: &mut Device, prefix: &str, element: Element) -> ManipulationResult<()> {
    let name = format!("{}{}", prefix, required_attribute(element, "name")?);
    let (link, joint, link_placement) = link_frame(device, prefix, element)?;
    let placement = link_placement * position(element)?;
    let mut handle = Handle::new(
        name.clone(),
        placement,
        if joint == 0 { None } else { Some(joint) },
    );
    handle.clearance = clearance(element)?;
    if let Some(mask) = first_child(element, "mask") {
        let values = text(mask)
            .split_whitespace()
            .map(|value| match value {
                "1" | "true" => Ok(true),
                "0" | "false" => Ok(false),
                _ => Err(model_exception(format!(
                    "Could not parse mask of handle {}",
                    name
                ))),
            })
            .collect::<ManipulationResult<Vec<bool>>>()?;
        handle.mask = bool_seq_to_mask::<HANDLE_MASK_SIZE>(&values)?;
    }
    device.model.add_frame(Frame::new(
        name.clone(),
        joint,
        link,
        placement,
        FrameType::OpFrame,
    ))?;
    device.handles.add(name, handle);
    Ok(())
}

fn add_contact(device: &mut Device, prefix: &str, element: Element) -> ManipulationResult<()> {
    let name = format!("{}{}", prefix, required_attribute(element, "name")?);
    let (_, joint, link_placement) = link_frame(device, prefix, element)?;
    let coordinates = first_child(element, "point")
        .map(|point| parse_numbers(&text(point), "point"))
        .transpose()?
        .unwrap_or_default();
    if coordinates.len() % 3 != 0 {
        return Err(model_exception(format!(
            "Points of contact {} must have three coordinates",
            name
        )));
    }
    let points: Vec<Point3<f64>> = coordinates
        .chunks(3)
        .map(|c| link_placement * Point3::new(c[0], c[1], c[2]))
        .collect();
    let indices = first_child(element, "shape")
        .map(|shape| parse_indices(&text(shape), &name))
        .transpose()?
        .unwrap_or_default();
    let owner = if joint == 0 { None } else { Some(joint) };
    let mut shapes: JointAndShapes = vec![];
    let mut cursor = indices.into_iter();
    while let Some(size) = cursor.next() {
        let mut polygon = vec![];
        for _ in 0..size {
            let point = cursor
                .next()
                .and_then(|index| points.get(index))
                .ok_or_else(|| model_exception(format!("Invalid shape of contact {}", name)))?;
            polygon.push(*point);
        }
        shapes.push((owner, polygon));
    }
    device.joint_and_shapes.add(name, shapes);
    Ok(())
}

/// Polygon sizes and point indices of a `<shape>`.
fn parse_indices(text: &str, contact: &str) -> ManipulationResult<Vec<usize>> {
    text.split_whitespace()
        .map(|value| {
            value.parse::<usize>().map_err(|_| {
                model_exception(format!(
                    "Could not parse shape of contact {}: \"{}\" is not an index",
                    contact, value
                ))
            })
        })
        .collect()
}

fn add_reference_configuration(
    device: &mut Device,
    prefix: &str,
    element: Element,
) -> ManipulationResult<()> {
    let name = format!("{}{}", prefix, required_attribute(element, "name")?);
    let mut configuration = device.model.neutral_configuration();
    for joint_element in child_elements(element).filter(|e| e.name().local_part() == "joint") {
        let joint_name = format!("{}{}", prefix, required_attribute(joint_element, "name")?);
        let joint = device
            .model
            .joint_id(&joint_name)
            .map(|id| &device.model.joints[id])
            .ok_or_else(|| {
                model_exception(format!("Joint {} of group state {} not found", joint_name, name))
            })?;
        let values = parse_numbers(required_attribute(joint_element, "value")?, "value")?;
        if values.len() != joint.nq() {
            return Err(model_exception(format!(
                "Joint {} of group state {} expects {} values",
                joint_name,
                name,
                joint.nq()
            )));
        }
        configuration
            .rows_mut(joint.idx_q, joint.nq())
            .copy_from_slice(&values);
    }
    device.reference_configurations.insert(name, configuration);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::device::Device;
    use crate::exception::ManipulationException;
    use crate::model::{srdf, urdf, ModelSource};
    use crate::test_data::{ARM_SRDF, ARM_URDF, BOX_SRDF, BOX_URDF};
    use crate::utils::test::{float_compare, slice_compare};

    fn arm() -> Device {
        let mut device = Device::new("Robot");
        urdf::load_model(&mut device, 0, "arm", "anchor", &ModelSource::Xml(ARM_URDF)).unwrap();
        device
    }

    #[test]
    fn arm_semantics() {
        let mut device = arm();
        srdf::load_model(&mut device, "arm", &ModelSource::Xml(ARM_SRDF)).unwrap();
        let gripper = device.grippers.get("arm/gripper").unwrap();
        float_compare(gripper.clearance, 0.01, 1e-12);
        assert_eq!(device.joint_name(gripper.joint), "arm/joint1");
        slice_compare(
            gripper.object_position_in_joint.translation.vector.as_slice(),
            &[0., 0., 0.4],
            1e-12,
        );
        assert!(device.model.exist_frame("arm/gripper"));
        assert_eq!(
            device.disabled_collision_pairs,
            vec![("arm/base_link".to_string(), "arm/link1".to_string())]
        );
        let half_turn = &device.reference_configurations["arm/half_turn"];
        assert_eq!(half_turn.as_slice(), &[1.5]);
    }

    #[test]
    fn object_semantics() {
        let mut device = Device::new("box");
        urdf::load_model(&mut device, 0, "", "anchor", &ModelSource::Xml(BOX_URDF)).unwrap();
        srdf::load_model(&mut device, "", &ModelSource::Xml(BOX_SRDF)).unwrap();
        let handle = device.handles.get("handle").unwrap();
        assert_eq!(handle.joint, None);
        assert_eq!(handle.mask, [true, true, true, true, true, false]);
        float_compare(handle.clearance, 0.05, 1e-12);
        slice_compare(
            handle.local_position.translation.vector.as_slice(),
            &[0., 0., 0.3],
            1e-12,
        );
        assert!(device.grippers.contains("magnet"));
        let top = device.joint_and_shapes.get("top").unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].0, None);
        assert_eq!(top[0].1.len(), 4);
        slice_compare(top[0].1[2].coords.as_slice(), &[0.1, 0.1, 0.2], 1e-12);
    }

    #[test]
    fn empty_source_is_ignored() {
        let mut device = arm();
        let before = device.clone();
        srdf::load_model(&mut device, "arm", &ModelSource::Xml("")).unwrap();
        srdf::load_model(&mut device, "arm", &ModelSource::File("")).unwrap();
        assert_eq!(device, before);
    }

    #[test]
    fn unknown_link() {
        let mut device = arm();
        let error = srdf::load_model(&mut device, "other", &ModelSource::Xml(ARM_SRDF))
            .unwrap_err();
        assert!(matches!(error, ManipulationException::ModelException { .. }));
        assert_eq!(error.to_string(), "Link other/tool_link of gripper not found");
    }

    fn contact_on_base(shape: &str) -> String {
        format!(
            r#"<robot>
  <contact name="pad">
    <link name="base_link"/>
    <point>0 0 0  1 0 0  0 1 0</point>
    <shape>{}</shape>
  </contact>
</robot>"#,
            shape
        )
    }

    #[test]
    fn contact_shape_indices() {
        let mut device = arm();
        srdf::load_model(&mut device, "arm", &ModelSource::Xml(&contact_on_base("3 0 1 2")))
            .unwrap();
        assert_eq!(device.joint_and_shapes.get("arm/pad").unwrap()[0].1.len(), 3);
        for shape in ["1e30 0", "18446744073709551615 0", "3 2 -1 0", "3 2 0.7 0", "2 0 3", "3 0 1"] {
            let mut device = arm();
            let before = device.clone();
            let error = srdf::load_model(&mut device, "arm", &ModelSource::Xml(&contact_on_base(shape)))
                .unwrap_err();
            assert!(
                matches!(error, ManipulationException::ModelException { .. }),
                "{}",
                shape
            );
            assert!(!device.joint_and_shapes.contains("arm/pad"));
            assert_eq!(device.model.frames.len(), before.model.frames.len());
        }
    }

    #[test]
    fn link_must_be_a_body() {
        let mut device = arm();
        let srdf = r#"<robot>
  <gripper name="g">
    <link name="joint1"/>
  </gripper>
</robot>"#;
        let error = srdf::load_model(&mut device, "arm", &ModelSource::Xml(srdf)).unwrap_err();
        assert_eq!(error.to_string(), "Link arm/joint1 of g not found");
        assert!(!device.grippers.contains("arm/g"));
    }

    #[test]
    fn duplicate_gripper_frame() {
        let mut device = arm();
        srdf::load_model(&mut device, "arm", &ModelSource::Xml(ARM_SRDF)).unwrap();
        let error = srdf::load_model(&mut device, "arm", &ModelSource::Xml(ARM_SRDF))
            .unwrap_err();
        assert!(matches!(error, ManipulationException::InvalidArgument { .. }));
    }
}
