//! Serde utilities for glam types.
//!
//! glam is built without its serde feature; vectors go over the wire as
//! plain `[x, y, z]` arrays so renderers can consume them directly.

use glam::Vec3;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub fn serialize_vec3<S>(v: &Vec3, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    v.to_array().serialize(s)
}

pub fn deserialize_vec3<'de, D>(d: D) -> Result<Vec3, D::Error>
where
    D: Deserializer<'de>,
{
    <[f32; 3]>::deserialize(d).map(Vec3::from_array)
}

/// Polyline as nested arrays: `[[x, y, z], ...]`
pub fn serialize_points<S>(points: &[Vec3], s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.collect_seq(points.iter().map(|p| p.to_array()))
}

pub fn deserialize_points<'de, D>(d: D) -> Result<Vec<Vec3>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<[f32; 3]>::deserialize(d).map(|raw| raw.into_iter().map(Vec3::from_array).collect())
}
