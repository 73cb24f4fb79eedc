//! Joint payload sent over the wire

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use super::JointId;
use crate::{RelayError, Result};

/// Joint position projected into frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointCoord {
    pub x: i32,
    pub y: i32,
}

impl JointCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Subset of a skeleton's joints in frame coordinates.
///
/// Encodes as `{"joint_<id>": {"x": <int>, "y": <int>}, ...}`. Built once per
/// qualifying frame and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JointPayload {
    joints: BTreeMap<JointId, JointCoord>,
}

impl JointPayload {
    pub fn get(&self, id: JointId) -> Option<JointCoord> {
        self.joints.get(&id).copied()
    }

    pub fn contains(&self, id: JointId) -> bool {
        self.joints.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (JointId, JointCoord)> + '_ {
        self.joints.iter().map(|(id, coord)| (*id, *coord))
    }

    /// Encode as a UTF-8 JSON text frame.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| RelayError::serialization("joint payload", e))
    }

    /// Decode a JSON text frame received from the relay.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| RelayError::serialization("joint payload", e))
    }
}

impl FromIterator<(JointId, JointCoord)> for JointPayload {
    fn from_iter<I: IntoIterator<Item = (JointId, JointCoord)>>(iter: I) -> Self {
        Self { joints: iter.into_iter().collect() }
    }
}

impl Serialize for JointPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.joints.len()))?;
        for (id, coord) in &self.joints {
            map.serialize_entry(&id.wire_key(), coord)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for JointPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct PayloadVisitor;

        impl<'de> Visitor<'de> for PayloadVisitor {
            type Value = JointPayload;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of joint_<id> keys to {x, y} coordinates")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut joints = BTreeMap::new();
                while let Some(key) = access.next_key::<String>()? {
                    let id = JointId::from_wire_key(&key).ok_or_else(|| {
                        serde::de::Error::custom(format!("unexpected payload key '{key}'"))
                    })?;
                    joints.insert(id, access.next_value::<JointCoord>()?);
                }
                Ok(JointPayload { joints })
            }
        }

        deserializer.deserialize_map(PayloadVisitor)
    }
}
