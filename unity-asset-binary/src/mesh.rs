//! Mesh decoding: channel/stream vertex layouts, index buffer unpacking,
//! submesh topology expansion, and compressed-mesh reconstruction via
//! `PackedBitVector`.

use crate::error::{BinaryError, Result};
use crate::object::UnityObject;
use crate::packed_bit_vector::PackedBitVector;
use crate::reader::{BinaryReader, ByteOrder};
use crate::unity_version::{UnityFeature, UnityVersion};
use indexmap::IndexMap;
use unity_asset_core::UnityValue;

/// Primitive topology a submesh's index range is interpreted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    Triangles,
    TriangleStrip,
    Quads,
    Lines,
    LineStrip,
    Points,
}

impl Topology {
    fn from_i32(value: i32) -> Self {
        match value {
            1 => Topology::TriangleStrip,
            2 => Topology::Quads,
            3 => Topology::Lines,
            4 => Topology::LineStrip,
            5 => Topology::Points,
            _ => Topology::Triangles,
        }
    }
}

/// Axis-aligned bounding box, center + extent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AABB {
    pub center: [f32; 3],
    pub extent: [f32; 3],
}

/// One draw range within the shared index buffer.
#[derive(Debug, Clone)]
pub struct SubMesh {
    pub first_byte: u32,
    pub index_count: u32,
    pub topology: Topology,
    pub base_vertex: Option<u32>,
    pub first_vertex: Option<u32>,
    pub vertex_count: Option<u32>,
    pub local_aabb: Option<AABB>,
}

/// One vertex attribute's location within its stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelInfo {
    pub stream: u8,
    pub offset: u8,
    pub format: u8,
    pub dimension: u8,
}

/// A stream's layout, either read explicitly (pre-Unity-4) or computed from
/// `channels` (Unity >= 5).
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamInfo {
    pub channel_mask: u32,
    pub offset: u32,
    pub stride: u32,
    pub divider_op: u8,
    pub frequency: u16,
}

/// Raw packed fields of `m_CompressedMesh`, expanded lazily by `Mesh::decode`.
#[derive(Debug, Clone)]
pub struct CompressedMesh {
    pub vertices: PackedBitVector,
    pub uv: PackedBitVector,
    pub normals: PackedBitVector,
    pub tangents: PackedBitVector,
    pub weights: PackedBitVector,
    pub normal_signs: PackedBitVector,
    pub tangent_signs: PackedBitVector,
    pub float_colors: PackedBitVector,
    pub bone_indices: PackedBitVector,
    pub triangles: PackedBitVector,
    pub colors: PackedBitVector,
    pub uv_info: u32,
}

/// Geometry reconstructed out of `CompressedMesh`'s packed fields.
#[derive(Debug, Clone, Default)]
pub struct ExpandedCompressedMesh {
    pub vertices: Vec<[f32; 3]>,
    pub uv: Vec<[f32; 2]>,
    pub normals: Vec<[f32; 3]>,
    pub tangents: Vec<[f32; 4]>,
    pub triangles: Vec<u32>,
    pub colors: Vec<f32>,
    pub weights: Vec<f32>,
    pub bone_indices: Vec<i32>,
}

/// A fully decoded Unity Mesh object.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: String,
    pub sub_meshes: Vec<SubMesh>,
    pub vertex_count: u32,
    pub use_16bit_indices: bool,
    pub indices: Vec<u32>,
    pub channels: Vec<ChannelInfo>,
    pub streams: Vec<StreamInfo>,
    pub vertex_data: Vec<u8>,
    pub compressed_mesh: Option<CompressedMesh>,
    pub expanded_compressed_mesh: Option<ExpandedCompressedMesh>,
    pub bind_poses: Option<Vec<[f32; 16]>>,
    pub bone_name_hashes: Option<Vec<u32>>,
    pub local_aabb: Option<AABB>,
}

impl Mesh {
    /// Decode a `Mesh` object (class id 43): index buffer, stream/channel
    /// layout, and (if present) compressed-mesh expansion.
    pub fn decode(obj: &UnityObject, unity_version: &UnityVersion) -> Result<Self> {
        let props = &obj.properties;
        let name = string_field(props, "m_Name");

        let sub_meshes = parse_sub_meshes(props)?;
        let channels = parse_channels(props);
        let vertex_count = props
            .get("m_VertexData")
            .and_then(|v| v.as_object())
            .and_then(|vd| vd.get("m_VertexCount"))
            .and_then(|v| v.as_i64())
            .unwrap_or(0) as u32;

        let vertex_data = props
            .get("m_VertexData")
            .and_then(|v| v.as_object())
            .map(|vd| bytes_field(vd, "m_DataSize"))
            .unwrap_or_default();

        let modern_layout =
            unity_version.supports_feature(UnityFeature::ExplicitIndexFormat) || unity_version.major >= 5;
        let (channels, streams) = if modern_layout {
            (channels, streams_from_channels(&channels))
        } else {
            let legacy_streams = parse_legacy_streams(props);
            let legacy_channels = channels_from_legacy_streams(&legacy_streams);
            (legacy_channels, legacy_streams)
        };

        let (use_16bit_indices, index_buffer_raw) = parse_index_buffer(props, unity_version);
        let indices = unpack_indices(&index_buffer_raw, use_16bit_indices, obj.byte_order)?;

        let compressed_mesh = parse_compressed_mesh(props)?;

        if vertex_data.is_empty() && compressed_mesh.is_none() {
            return Err(BinaryError::MeshMissingVertexData);
        }

        let expanded_compressed_mesh = compressed_mesh
            .as_ref()
            .map(expand_compressed_mesh)
            .transpose()?;

        let bind_poses = props.get("m_BindPose").and_then(parse_matrix_array);
        let bone_name_hashes = props.get("m_BoneNameHashes").and_then(|v| {
            v.as_array().map(|arr| {
                arr.iter()
                    .filter_map(|e| e.as_i64())
                    .map(|v| v as u32)
                    .collect()
            })
        });

        let local_aabb = props.get("m_LocalAABB").map(parse_aabb);

        Ok(Self {
            name,
            sub_meshes,
            vertex_count,
            use_16bit_indices,
            indices,
            channels,
            streams,
            vertex_data,
            compressed_mesh,
            expanded_compressed_mesh,
            bind_poses,
            bone_name_hashes,
            local_aabb,
        })
    }

    /// Expand every submesh's index range into per-triangle `[u32; 3]`
    /// windows. `Lines`/`LineStrip`/`Points` are surfaced unexpanded (empty)
    /// since they have no triangle representation.
    pub fn get_triangles(&self) -> Vec<Vec<[u32; 3]>> {
        let index_size = if self.use_16bit_indices { 2 } else { 4 };
        self.sub_meshes
            .iter()
            .map(|sm| expand_submesh_triangles(sm, &self.indices, index_size))
            .collect()
    }
}

fn expand_submesh_triangles(sub_mesh: &SubMesh, indices: &[u32], index_size: usize) -> Vec<[u32; 3]> {
    let start = sub_mesh.first_byte as usize / index_size;
    let count = sub_mesh.index_count as usize;
    if start >= indices.len() {
        return Vec::new();
    }
    let end = (start + count).min(indices.len());
    let window = &indices[start..end];

    match sub_mesh.topology {
        Topology::Triangles => window
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect(),
        Topology::TriangleStrip => {
            let mut tris = Vec::new();
            if window.len() < 3 {
                return tris;
            }
            for i in 0..window.len() - 2 {
                let (a, b, c) = (window[i], window[i + 1], window[i + 2]);
                if a == b || b == c || a == c {
                    continue;
                }
                if i % 2 == 0 {
                    tris.push([a, b, c]);
                } else {
                    tris.push([b, a, c]);
                }
            }
            tris
        }
        Topology::Quads => window
            .chunks_exact(4)
            .flat_map(|c| [[c[0], c[1], c[2]], [c[0], c[2], c[3]]])
            .collect(),
        Topology::Lines | Topology::LineStrip | Topology::Points => Vec::new(),
    }
}

fn string_field(props: &IndexMap<String, UnityValue>, key: &str) -> String {
    props
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn bytes_field(props: &IndexMap<String, UnityValue>, key: &str) -> Vec<u8> {
    match props.get(key) {
        Some(UnityValue::Array(arr)) => arr
            .iter()
            .filter_map(|v| v.as_i64())
            .map(|v| v as u8)
            .collect(),
        _ => Vec::new(),
    }
}

fn int_field(props: &IndexMap<String, UnityValue>, key: &str) -> i64 {
    props.get(key).and_then(|v| v.as_i64()).unwrap_or(0)
}

fn bool_field(props: &IndexMap<String, UnityValue>, key: &str) -> bool {
    props.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

fn float_field(props: &IndexMap<String, UnityValue>, key: &str) -> f32 {
    props.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0) as f32
}

fn parse_aabb(value: &UnityValue) -> AABB {
    let Some(obj) = value.as_object() else {
        return AABB::default();
    };
    let vec3 = |key: &str| -> [f32; 3] {
        match obj.get(key).and_then(|v| v.as_object()) {
            Some(v) => [float_field(v, "x"), float_field(v, "y"), float_field(v, "z")],
            None => [0.0, 0.0, 0.0],
        }
    };
    AABB {
        center: vec3("m_Center"),
        extent: vec3("m_Extent"),
    }
}

/// `m_BindPose` is an array of 4x4 matrices serialized field-by-field as
/// `e00`..`e33`; anything else (or a missing field) bails out to `None`
/// rather than returning a partially built matrix.
fn parse_matrix_array(value: &UnityValue) -> Option<Vec<[f32; 16]>> {
    let arr = value.as_array()?;
    let mut out = Vec::with_capacity(arr.len());
    for entry in arr {
        let obj = entry.as_object()?;
        obj.get("e00")?;
        let mut m = [0.0f32; 16];
        for row in 0..4 {
            for col in 0..4 {
                let key = format!("e{row}{col}");
                m[row * 4 + col] = obj.get(&key).and_then(|v| v.as_f64()).unwrap_or(0.0) as f32;
            }
        }
        out.push(m);
    }
    Some(out)
}

fn parse_sub_meshes(props: &IndexMap<String, UnityValue>) -> Result<Vec<SubMesh>> {
    let Some(UnityValue::Array(arr)) = props.get("m_SubMeshes") else {
        return Ok(Vec::new());
    };
    let mut out = Vec::with_capacity(arr.len());
    for entry in arr {
        let Some(obj) = entry.as_object() else {
            continue;
        };
        out.push(SubMesh {
            first_byte: int_field(obj, "firstByte") as u32,
            index_count: int_field(obj, "indexCount") as u32,
            topology: Topology::from_i32(int_field(obj, "topology") as i32),
            base_vertex: obj.get("baseVertex").and_then(|v| v.as_i64()).map(|v| v as u32),
            first_vertex: obj.get("firstVertex").and_then(|v| v.as_i64()).map(|v| v as u32),
            vertex_count: obj.get("vertexCount").and_then(|v| v.as_i64()).map(|v| v as u32),
            local_aabb: obj.get("localAABB").map(parse_aabb),
        });
    }
    Ok(out)
}

fn parse_channels(props: &IndexMap<String, UnityValue>) -> Vec<ChannelInfo> {
    let Some(vd) = props.get("m_VertexData").and_then(|v| v.as_object()) else {
        return Vec::new();
    };
    let Some(UnityValue::Array(arr)) = vd.get("m_Channels") else {
        return Vec::new();
    };
    arr.iter()
        .filter_map(|entry| entry.as_object())
        .map(|obj| ChannelInfo {
            stream: int_field(obj, "stream") as u8,
            offset: int_field(obj, "offset") as u8,
            format: int_field(obj, "format") as u8,
            dimension: int_field(obj, "dimension") as u8,
        })
        .collect()
}

fn parse_legacy_streams(props: &IndexMap<String, UnityValue>) -> Vec<StreamInfo> {
    let Some(vd) = props.get("m_VertexData").and_then(|v| v.as_object()) else {
        return Vec::new();
    };
    let Some(UnityValue::Array(arr)) = vd.get("m_Streams") else {
        return Vec::new();
    };
    arr.iter()
        .filter_map(|entry| entry.as_object())
        .map(|obj| StreamInfo {
            channel_mask: int_field(obj, "channelMask") as u32,
            offset: int_field(obj, "offset") as u32,
            stride: int_field(obj, "stride") as u32,
            divider_op: int_field(obj, "dividerOp") as u8,
            frequency: int_field(obj, "frequency") as u16,
        })
        .collect()
}

/// Unity's fixed pre-5 shader-channel order: each bit of `channel_mask`
/// names one of these slots, in ascending order, packed into the stream with
/// no padding between them. Position/normal/uv/tangent are stored as floats;
/// color is four unsigned normalized bytes.
const LEGACY_CHANNEL_SLOTS: [(u8, u8); 6] = [
    (0, 3), // position
    (0, 3), // normal
    (2, 4), // color (UNorm8 x4)
    (0, 2), // uv0
    (0, 2), // uv1
    (0, 4), // tangent
];

/// Derives `ChannelInfo[]` from each legacy stream's `channel_mask` by
/// iterating its set bits in slot order and assigning offsets within the
/// stream by cumulative size, matching the channel-array shape modern Unity
/// versions serialize explicitly.
fn channels_from_legacy_streams(streams: &[StreamInfo]) -> Vec<ChannelInfo> {
    let mut channels = Vec::new();
    for (stream_index, stream) in streams.iter().enumerate() {
        let mut offset = 0u8;
        for (bit, &(format, dimension)) in LEGACY_CHANNEL_SLOTS.iter().enumerate() {
            if stream.channel_mask & (1 << bit) == 0 {
                continue;
            }
            channels.push(ChannelInfo {
                stream: stream_index as u8,
                offset,
                format,
                dimension,
            });
            offset += (vertex_format_size(format) * dimension as u32) as u8;
        }
    }
    channels
}

fn streams_from_channels(channels: &[ChannelInfo]) -> Vec<StreamInfo> {
    if channels.is_empty() {
        return Vec::new();
    }
    let max_stream = channels.iter().map(|c| c.stream).max().unwrap_or(0) as usize;
    let mut streams = vec![StreamInfo::default(); max_stream + 1];
    for channel in channels {
        if channel.dimension == 0 {
            continue;
        }
        let size = vertex_format_size(channel.format) * channel.dimension as u32;
        streams[channel.stream as usize].stride += size;
    }
    let mut offset = 0u32;
    for stream in &mut streams {
        stream.offset = offset;
        offset += stream.stride;
    }
    streams
}

/// Modern (Unity >= 2017) `VertexFormat` byte width. Covers the wire values
/// this repository's target range (2017.4+) actually emits; anything
/// unrecognized falls back to 4 bytes, matching a plain float field.
fn vertex_format_size(format: u8) -> u32 {
    match format {
        2 => 1,  // UNorm8
        3 => 1,  // SNorm8
        4 => 2,  // UNorm16
        5 => 2,  // SNorm16
        6 => 1,  // UInt8
        7 => 1,  // SInt8
        8 => 2,  // UInt16
        9 => 2,  // SInt16
        10 => 4, // UInt32
        11 => 4, // SInt32
        _ => 4,  // Float / Float16 / unknown
    }
}

fn parse_index_buffer(
    props: &IndexMap<String, UnityValue>,
    unity_version: &UnityVersion,
) -> (bool, Vec<u8>) {
    let data = bytes_field(props, "m_IndexBuffer");
    let use_16bit = if unity_version.supports_feature(UnityFeature::ExplicitIndexFormat) {
        int_field(props, "m_IndexFormat") == 0
    } else {
        bool_field(props, "m_Use16BitIndices") || bool_field(props, "m_Use16bitIndices")
    };
    (use_16bit, data)
}

fn unpack_indices(data: &[u8], use_16bit: bool, byte_order: ByteOrder) -> Result<Vec<u32>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let mut reader = BinaryReader::new(data, byte_order);
    let mut out = Vec::new();
    if use_16bit {
        for _ in 0..(data.len() / 2) {
            out.push(reader.read_u16()? as u32);
        }
    } else {
        for _ in 0..(data.len() / 4) {
            out.push(reader.read_u32()?);
        }
    }
    Ok(out)
}

fn empty_packed_vector() -> PackedBitVector {
    PackedBitVector {
        num_items: 0,
        range: 0.0,
        start: 0.0,
        data: Vec::new(),
        bit_size: None,
    }
}

fn packed_vector_field(props: &IndexMap<String, UnityValue>, key: &str) -> PackedBitVector {
    let Some(obj) = props.get(key).and_then(|v| v.as_object()) else {
        return empty_packed_vector();
    };
    PackedBitVector {
        num_items: int_field(obj, "m_NumItems") as u32,
        range: float_field(obj, "m_Range"),
        start: float_field(obj, "m_Start"),
        data: bytes_field(obj, "m_Data"),
        bit_size: match int_field(obj, "m_BitSize") as u8 {
            0 => None,
            n => Some(n),
        },
    }
}

fn parse_compressed_mesh(props: &IndexMap<String, UnityValue>) -> Result<Option<CompressedMesh>> {
    let Some(cm) = props.get("m_CompressedMesh").and_then(|v| v.as_object()) else {
        return Ok(None);
    };
    let vertices = packed_vector_field(cm, "m_Vertices");
    if vertices.num_items == 0 {
        return Ok(None);
    }
    Ok(Some(CompressedMesh {
        vertices,
        uv: packed_vector_field(cm, "m_UV"),
        normals: packed_vector_field(cm, "m_Normals"),
        tangents: packed_vector_field(cm, "m_Tangents"),
        weights: packed_vector_field(cm, "m_Weights"),
        normal_signs: packed_vector_field(cm, "m_NormalSigns"),
        tangent_signs: packed_vector_field(cm, "m_TangentSigns"),
        float_colors: packed_vector_field(cm, "m_FloatColors"),
        bone_indices: packed_vector_field(cm, "m_BoneIndices"),
        triangles: packed_vector_field(cm, "m_Triangles"),
        colors: packed_vector_field(cm, "m_Colors"),
        uv_info: int_field(cm, "m_UVInfo") as u32,
    }))
}

/// Expand a `CompressedMesh`'s packed fields into real geometry. Normals and
/// tangents are "sign-expanded": two packed floats give X/Y, Z is
/// reconstructed as `sqrt(max(0, 1 - x^2 - y^2))` with sign taken from the
/// companion sign bit vector (tangents additionally carry a handedness sign
/// as their fourth component).
fn expand_compressed_mesh(cm: &CompressedMesh) -> Result<ExpandedCompressedMesh> {
    let vertex_floats = cm.vertices.unpack_all_floats()?;
    let vertices: Vec<[f32; 3]> = vertex_floats
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect();

    let uv_floats = cm.uv.unpack_all_floats()?;
    let uv: Vec<[f32; 2]> = uv_floats.chunks_exact(2).map(|c| [c[0], c[1]]).collect();

    let normal_xy = cm.normals.unpack_all_floats()?;
    let normal_signs = if cm.normal_signs.num_items > 0 {
        cm.normal_signs.unpack_all_ints()?
    } else {
        Vec::new()
    };
    let normals: Vec<[f32; 3]> = normal_xy
        .chunks_exact(2)
        .enumerate()
        .map(|(i, c)| {
            let (x, y) = (c[0], c[1]);
            let mut z = (1.0 - x * x - y * y).max(0.0).sqrt();
            if normal_signs.get(i).copied().unwrap_or(1) == 0 {
                z = -z;
            }
            [x, y, z]
        })
        .collect();

    let tangent_xy = cm.tangents.unpack_all_floats()?;
    let tangent_signs = if cm.tangent_signs.num_items > 0 {
        cm.tangent_signs.unpack_all_ints()?
    } else {
        Vec::new()
    };
    let tangents: Vec<[f32; 4]> = tangent_xy
        .chunks_exact(2)
        .enumerate()
        .map(|(i, c)| {
            let (x, y) = (c[0], c[1]);
            let z = (1.0 - x * x - y * y).max(0.0).sqrt();
            let handedness = if tangent_signs.get(i).copied().unwrap_or(1) == 0 {
                -1.0
            } else {
                1.0
            };
            [x, y, z, handedness]
        })
        .collect();

    let triangles = cm.triangles.unpack_all_ints()?;

    let colors = if cm.colors.num_items > 0 {
        cm.colors.unpack_all_floats()?
    } else {
        Vec::new()
    };
    let weights = if cm.weights.num_items > 0 {
        cm.weights.unpack_all_floats()?
    } else {
        Vec::new()
    };
    let bone_indices = if cm.bone_indices.num_items > 0 {
        cm.bone_indices
            .unpack_all_ints()?
            .into_iter()
            .map(|v| v as i32)
            .collect()
    } else {
        Vec::new()
    };

    Ok(ExpandedCompressedMesh {
        vertices,
        uv,
        normals,
        tangents,
        triangles,
        colors,
        weights,
        bone_indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec3_value(x: f32, y: f32, z: f32) -> UnityValue {
        let mut obj = IndexMap::new();
        obj.insert("x".to_string(), UnityValue::Float(x as f64));
        obj.insert("y".to_string(), UnityValue::Float(y as f64));
        obj.insert("z".to_string(), UnityValue::Float(z as f64));
        UnityValue::Object(obj)
    }

    fn index_buffer_bytes() -> Vec<u8> {
        vec![0, 0, 1, 0, 2, 0, 3, 0, 4, 0, 5, 0]
    }

    fn make_object(props: IndexMap<String, UnityValue>) -> UnityObject {
        UnityObject {
            path_id: 1,
            class_id: 43,
            byte_size: 0,
            properties: props,
            byte_order: ByteOrder::Little,
        }
    }

    #[test]
    fn test_unpack_indices_16bit_little_endian() {
        let indices = unpack_indices(&index_buffer_bytes(), true, ByteOrder::Little).unwrap();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_triangles_topology_expansion() {
        let sub_mesh = SubMesh {
            first_byte: 0,
            index_count: 9,
            topology: Topology::Triangles,
            base_vertex: None,
            first_vertex: None,
            vertex_count: None,
            local_aabb: None,
        };
        let indices: Vec<u32> = (0..9).collect();
        let tris = expand_submesh_triangles(&sub_mesh, &indices, 4);
        assert_eq!(tris, vec![[0, 1, 2], [3, 4, 5], [6, 7, 8]]);
    }

    #[test]
    fn test_triangle_strip_topology_expansion() {
        let sub_mesh = SubMesh {
            first_byte: 0,
            index_count: 5,
            topology: Topology::TriangleStrip,
            base_vertex: None,
            first_vertex: None,
            vertex_count: None,
            local_aabb: None,
        };
        let indices = vec![0u32, 1, 2, 3, 4];
        let tris = expand_submesh_triangles(&sub_mesh, &indices, 4);
        assert_eq!(tris, vec![[0, 1, 2], [2, 1, 3], [2, 3, 4]]);
    }

    #[test]
    fn test_quads_topology_expansion() {
        let sub_mesh = SubMesh {
            first_byte: 0,
            index_count: 4,
            topology: Topology::Quads,
            base_vertex: None,
            first_vertex: None,
            vertex_count: None,
            local_aabb: None,
        };
        let indices = vec![0u32, 1, 2, 3];
        let tris = expand_submesh_triangles(&sub_mesh, &indices, 4);
        assert_eq!(tris, vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn test_second_submesh_first_byte_is_divided_by_index_width() {
        // 16-bit indices: first_byte is a byte offset, so a second submesh
        // starting after 3 indices reports first_byte = 3 * 2 = 6, not 3.
        let sub_mesh = SubMesh {
            first_byte: 6,
            index_count: 3,
            topology: Topology::Triangles,
            base_vertex: None,
            first_vertex: None,
            vertex_count: None,
            local_aabb: None,
        };
        let indices: Vec<u32> = (0..6).collect();
        let tris = expand_submesh_triangles(&sub_mesh, &indices, 2);
        assert_eq!(tris, vec![[3, 4, 5]]);
    }

    #[test]
    fn test_get_triangles_uses_use_16bit_indices_for_submesh_offsets() {
        let sub_meshes = vec![
            SubMesh {
                first_byte: 0,
                index_count: 3,
                topology: Topology::Triangles,
                base_vertex: None,
                first_vertex: None,
                vertex_count: None,
                local_aabb: None,
            },
            SubMesh {
                first_byte: 6,
                index_count: 3,
                topology: Topology::Triangles,
                base_vertex: None,
                first_vertex: None,
                vertex_count: None,
                local_aabb: None,
            },
        ];
        let mesh = Mesh {
            name: "Two".to_string(),
            sub_meshes,
            vertex_count: 6,
            use_16bit_indices: true,
            indices: (0..6).collect(),
            channels: Vec::new(),
            streams: Vec::new(),
            vertex_data: vec![0],
            compressed_mesh: None,
            expanded_compressed_mesh: None,
            bind_poses: None,
            bone_name_hashes: None,
            local_aabb: None,
        };
        let tris = mesh.get_triangles();
        assert_eq!(tris, vec![vec![[0, 1, 2]], vec![[3, 4, 5]]]);
    }

    #[test]
    fn test_decode_missing_vertex_data_and_compressed_mesh_errors() {
        let props = IndexMap::new();
        let obj = make_object(props);
        let version = UnityVersion::parse_version("2020.3.12f1").unwrap();
        let err = Mesh::decode(&obj, &version).unwrap_err();
        assert!(matches!(err, BinaryError::MeshMissingVertexData));
    }

    #[test]
    fn test_decode_uses_uncompressed_vertex_data() {
        let mut vd = IndexMap::new();
        vd.insert("m_VertexCount".to_string(), UnityValue::Integer(3));
        vd.insert(
            "m_DataSize".to_string(),
            UnityValue::Array(vec![UnityValue::Integer(1), UnityValue::Integer(2)]),
        );
        vd.insert("m_Channels".to_string(), UnityValue::Array(vec![]));

        let mut props = IndexMap::new();
        props.insert("m_Name".to_string(), UnityValue::String("Cube".to_string()));
        props.insert("m_VertexData".to_string(), UnityValue::Object(vd));

        let obj = make_object(props);
        let version = UnityVersion::parse_version("2020.3.12f1").unwrap();
        let mesh = Mesh::decode(&obj, &version).unwrap();
        assert_eq!(mesh.name, "Cube");
        assert_eq!(mesh.vertex_count, 3);
        assert_eq!(mesh.vertex_data, vec![1, 2]);
    }

    #[test]
    fn test_parse_aabb_reads_center_and_extent() {
        let mut aabb = IndexMap::new();
        aabb.insert("m_Center".to_string(), vec3_value(1.0, 2.0, 3.0));
        aabb.insert("m_Extent".to_string(), vec3_value(0.5, 0.5, 0.5));
        let parsed = parse_aabb(&UnityValue::Object(aabb));
        assert_eq!(parsed.center, [1.0, 2.0, 3.0]);
        assert_eq!(parsed.extent, [0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_compressed_mesh_expansion_roundtrips_vertices() {
        let vertices = PackedBitVector {
            num_items: 6,
            range: 10.0,
            start: -5.0,
            data: vec![0xE4, 0xE4],
            bit_size: Some(2),
        };
        let cm = CompressedMesh {
            vertices,
            uv: empty_packed_vector(),
            normals: empty_packed_vector(),
            tangents: empty_packed_vector(),
            weights: empty_packed_vector(),
            normal_signs: empty_packed_vector(),
            tangent_signs: empty_packed_vector(),
            float_colors: empty_packed_vector(),
            bone_indices: empty_packed_vector(),
            triangles: empty_packed_vector(),
            colors: empty_packed_vector(),
            uv_info: 0,
        };
        let expanded = expand_compressed_mesh(&cm).unwrap();
        assert_eq!(expanded.vertices.len(), 2);
    }
}
