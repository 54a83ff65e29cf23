//! Geometry builders.
//!
//! Every builder produces non-indexed triangle lists with `vertex` (3),
//! `normal` (3) and `uv` (2) buffers. Triangles wind counter-clockwise when
//! seen from the side the normal points to. `uv` has `v = 0` at the top edge.

use std::io::{BufReader, Cursor};

use crate::{
    data_structures::geometry::{Geometry, GeometryBuffer},
    error::{Error, Result},
};

/// Expands `index` into a flat list of `data_size`-wide entries of `data`.
fn indexed_repeat(data: &[f32], data_size: usize, index: &[usize]) -> Vec<f32> {
    index
        .iter()
        .flat_map(|i| data[i * data_size..(i + 1) * data_size].iter().copied())
        .collect()
}

fn assemble(vertices: Vec<f32>, normals: Vec<f32>, uvs: Vec<f32>) -> Result<Geometry> {
    let mut geometry = Geometry::new();
    geometry.add_buffer("vertex", GeometryBuffer::new(vertices, 3)?)?;
    geometry.add_buffer("normal", GeometryBuffer::new(normals, 3)?)?;
    geometry.add_buffer("uv", GeometryBuffer::new(uvs, 2)?)?;
    Ok(geometry)
}

// 0 ----- 1
// |     / |
// |   /   |
// | /     |
// 2 ----- 3
const QUAD_INDEX: [usize; 6] = [0, 2, 1, 1, 2, 3];
const QUAD_UVS: [f32; 8] = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0];

/// A `width` x `height` rectangle in the XY plane facing +Z, centered at the origin.
pub fn build_plane_geometry(width: f32, height: f32) -> Result<Geometry> {
    let (hx, hy) = (width / 2.0, height / 2.0);
    #[rustfmt::skip]
    let vertices = [
        -hx, hy, 0.0,
        hx, hy, 0.0,
        -hx, -hy, 0.0,
        hx, -hy, 0.0,
    ];
    assemble(
        indexed_repeat(&vertices, 3, &QUAD_INDEX),
        indexed_repeat(&[0.0, 0.0, 1.0], 3, &[0; 6]),
        indexed_repeat(&QUAD_UVS, 2, &QUAD_INDEX),
    )
}

/// An axis-aligned box centered at the origin.
pub fn build_box_geometry(width: f32, height: f32, depth: f32) -> Result<Geometry> {
    let (hx, hy, hz) = (width / 2.0, height / 2.0, depth / 2.0);
    #[rustfmt::skip]
    let vertices = [
        -hx, hy, hz,
        hx, hy, hz,
        -hx, -hy, hz,
        hx, -hy, hz,
        -hx, hy, -hz,
        hx, hy, -hz,
        -hx, -hy, -hz,
        hx, -hy, -hz,
    ];
    // front, right, back, left, top, bottom
    #[rustfmt::skip]
    let faces: [([usize; 6], [f32; 3]); 6] = [
        ([0, 2, 1, 1, 2, 3], [0.0, 0.0, 1.0]),
        ([1, 3, 5, 5, 3, 7], [1.0, 0.0, 0.0]),
        ([5, 7, 4, 4, 7, 6], [0.0, 0.0, -1.0]),
        ([4, 6, 0, 0, 6, 2], [-1.0, 0.0, 0.0]),
        ([4, 0, 5, 5, 0, 1], [0.0, 1.0, 0.0]),
        ([2, 6, 3, 3, 6, 7], [0.0, -1.0, 0.0]),
    ];
    let mut positions = Vec::with_capacity(36 * 3);
    let mut normals = Vec::with_capacity(36 * 3);
    let mut uvs = Vec::with_capacity(36 * 2);
    for (index, normal) in faces {
        positions.extend(indexed_repeat(&vertices, 3, &index));
        normals.extend(indexed_repeat(&normal, 3, &[0; 6]));
        uvs.extend(indexed_repeat(&QUAD_UVS, 2, &QUAD_INDEX));
    }
    assemble(positions, normals, uvs)
}

/// Parses OBJ text into a de-indexed geometry.
///
/// Faces are triangulated and all models in the file are merged. Missing
/// normals or texture coordinates are filled with zeros. Materials are ignored.
pub async fn parse_obj_geometry(source_id: &str, text: &str) -> Result<Geometry> {
    let mut reader = BufReader::new(Cursor::new(text));
    let (models, _) = tobj::load_obj_buf_async(
        &mut reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |_| async { Err(tobj::LoadError::OpenFileFailed) },
    )
    .await
    .map_err(|e| Error::load(source_id, e))?;

    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut uvs = Vec::new();
    for model in &models {
        let mesh = &model.mesh;
        for &index in &mesh.indices {
            let i = index as usize;
            let position = mesh
                .positions
                .get(i * 3..i * 3 + 3)
                .ok_or_else(|| Error::load(source_id, format!("vertex index {} out of range", i)))?;
            positions.extend_from_slice(position);
            match mesh.normals.get(i * 3..i * 3 + 3) {
                Some(normal) => normals.extend_from_slice(normal),
                None => normals.extend_from_slice(&[0.0; 3]),
            }
            match mesh.texcoords.get(i * 2..i * 2 + 2) {
                // OBJ puts v = 0 at the bottom
                Some(uv) => uvs.extend_from_slice(&[uv[0], 1.0 - uv[1]]),
                None => uvs.extend_from_slice(&[0.0; 2]),
            }
        }
    }
    if positions.is_empty() {
        return Err(Error::load(source_id, "no faces"));
    }
    log::debug!(
        "parsed {}: {} models, {} vertices",
        source_id,
        models.len(),
        positions.len() / 3
    );
    assemble(positions, normals, uvs)
}
