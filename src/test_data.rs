// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Robot and object descriptions shared by the unit tests.

/// `base_link` -> `joint1` (revolute z, 0.5 above the base) -> `link1`
/// -> `tool_joint` (fixed, 0.3 above joint1) -> `tool_link`
pub(crate) const ARM_URDF: &str = r#"<?xml version="1.0"?>
<robot name="arm">
  <link name="base_link">
    <collision>
      <origin xyz="0 0 0.05" rpy="0 0 0"/>
      <geometry><box size="0.2 0.2 0.1"/></geometry>
    </collision>
  </link>
  <link name="link1">
    <collision>
      <origin xyz="0 0 0.15" rpy="0 0 0"/>
      <geometry><cylinder radius="0.05" length="0.3"/></geometry>
    </collision>
  </link>
  <link name="tool_link"/>
  <joint name="joint1" type="revolute">
    <parent link="base_link"/>
    <child link="link1"/>
    <origin xyz="0 0 0.5" rpy="0 0 0"/>
    <axis xyz="0 0 1"/>
    <limit lower="-3.0" upper="3.0" effort="10" velocity="1"/>
  </joint>
  <joint name="tool_joint" type="fixed">
    <parent link="link1"/>
    <child link="tool_link"/>
    <origin xyz="0 0 0.3" rpy="0 0 0"/>
  </joint>
</robot>
"#;

pub(crate) const ARM_SRDF: &str = r#"<?xml version="1.0"?>
<robot name="arm">
  <gripper name="gripper" clearance="0.01">
    <link name="tool_link"/>
    <position>0 0 0.1 0 0 0 1</position>
  </gripper>
  <disable_collisions link1="base_link" link2="link1" reason="Adjacent"/>
  <group_state name="half_turn" group="all">
    <joint name="joint1" value="1.5"/>
  </group_state>
</robot>
"#;

/// A box on a table leg: `base_link` is fixed in the world, the box sits on `top_link`.
pub(crate) const BOX_URDF: &str = r#"<?xml version="1.0"?>
<robot name="box">
  <link name="base_link">
    <collision>
      <geometry><box size="0.1 0.1 0.1"/></geometry>
    </collision>
  </link>
  <link name="top_link">
    <collision>
      <geometry><sphere radius="0.02"/></geometry>
    </collision>
  </link>
  <joint name="top_joint" type="fixed">
    <parent link="base_link"/>
    <child link="top_link"/>
    <origin xyz="0 0 0.2" rpy="0 0 0"/>
  </joint>
</robot>
"#;

pub(crate) const BOX_SRDF: &str = r#"<?xml version="1.0"?>
<robot name="box">
  <handle name="handle" clearance="0.05">
    <position xyz="0 0 0.1" rpy="0 0 0"/>
    <link name="top_link"/>
    <mask>1 1 1 1 1 0</mask>
  </handle>
  <gripper name="magnet">
    <link name="base_link"/>
  </gripper>
  <contact name="top">
    <link name="top_link"/>
    <point>0 0 0  0.1 0 0  0.1 0.1 0  0 0.1 0</point>
    <shape>4 0 1 2 3</shape>
  </contact>
</robot>
"#;

/// Minimal humanoid: a free floating waist with a chest joint, a gaze frame and one wrist.
pub(crate) const HUMANOID_URDF: &str = r#"<?xml version="1.0"?>
<robot name="humanoid">
  <link name="BODY"/>
  <link name="CHEST_LINK1"/>
  <link name="HEAD"/>
  <link name="LARM_LINK5"/>
  <joint name="CHEST_JOINT1" type="revolute">
    <parent link="BODY"/>
    <child link="CHEST_LINK1"/>
    <origin xyz="0 0 0.3" rpy="0 0 0"/>
    <axis xyz="0 0 1"/>
    <limit lower="-1" upper="1" effort="10" velocity="1"/>
  </joint>
  <joint name="gaze" type="fixed">
    <parent link="CHEST_LINK1"/>
    <child link="HEAD"/>
    <origin xyz="0.1 0 0.4" rpy="0 0 0"/>
  </joint>
  <joint name="LARM_JOINT5" type="continuous">
    <parent link="CHEST_LINK1"/>
    <child link="LARM_LINK5"/>
    <origin xyz="0 0.3 0.2" rpy="0 0 0"/>
    <axis xyz="0 1 0"/>
  </joint>
</robot>
"#;
