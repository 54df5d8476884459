use std::collections::HashMap;

use anyhow::{bail, Context};

use crate::rendering::backend::PrimitiveTopology;

/// CPU-side geometry: interleaved `f32` vertices plus `u32` indices.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<f32>,
    pub floats_per_vertex: u32,
    pub indices: Vec<u32>,
    pub topology: PrimitiveTopology,
}

impl MeshData {
    pub fn new(
        vertices: Vec<f32>,
        floats_per_vertex: u32,
        indices: Vec<u32>,
        topology: PrimitiveTopology,
    ) -> Self {
        Self {
            vertices,
            floats_per_vertex,
            indices,
            topology,
        }
    }

    pub fn vertex_count(&self) -> u32 {
        if self.floats_per_vertex == 0 {
            return 0;
        }
        self.vertices.len() as u32 / self.floats_per_vertex
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Size of one vertex in bytes.
    pub fn vertex_stride(&self) -> u32 {
        self.floats_per_vertex * std::mem::size_of::<f32>() as u32
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Builds position + normal vertices from separately indexed attributes.
    ///
    /// Every distinct `(position index, normal index)` pair becomes one
    /// interleaved vertex, numbered in order of first appearance.
    pub fn weld(
        positions: &[[f32; 3]],
        normals: &[[f32; 3]],
        position_indices: &[u32],
        normal_indices: &[u32],
        topology: PrimitiveTopology,
    ) -> anyhow::Result<MeshData> {
        if position_indices.len() != normal_indices.len() {
            bail!(
                "Attribute index streams differ in length: {} positions, {} normals",
                position_indices.len(),
                normal_indices.len()
            );
        }

        let mut welded: HashMap<(u32, u32), u32> = HashMap::new();
        let mut vertices = Vec::new();
        let mut indices = Vec::with_capacity(position_indices.len());

        for (&p, &n) in position_indices.iter().zip(normal_indices) {
            let index = match welded.get(&(p, n)) {
                Some(&index) => index,
                None => {
                    let position = positions
                        .get(p as usize)
                        .with_context(|| format!("Position index {} out of range", p))?;
                    let normal = normals
                        .get(n as usize)
                        .with_context(|| format!("Normal index {} out of range", n))?;

                    let index = welded.len() as u32;
                    vertices.extend_from_slice(position);
                    vertices.extend_from_slice(normal);
                    welded.insert((p, n), index);
                    index
                }
            };

            indices.push(index);
        }

        Ok(MeshData::new(vertices, 6, indices, topology))
    }

    /// Axis-aligned cube centered on the origin with per-face normals.
    pub fn cube(half_extent: f32) -> MeshData {
        let h = half_extent;
        let positions = [
            [-h, -h, -h],
            [h, -h, -h],
            [h, h, -h],
            [-h, h, -h],
            [-h, -h, h],
            [h, -h, h],
            [h, h, h],
            [-h, h, h],
        ];
        let normals = [
            [0.0, 0.0, -1.0],
            [0.0, 0.0, 1.0],
            [-1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, -1.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        let faces: [([usize; 4], usize); 6] = [
            ([0, 3, 2, 1], 0),
            ([4, 5, 6, 7], 1),
            ([0, 4, 7, 3], 2),
            ([1, 2, 6, 5], 3),
            ([0, 1, 5, 4], 4),
            ([3, 7, 6, 2], 5),
        ];

        let mut vertices = Vec::with_capacity(24 * 6);
        let mut indices = Vec::with_capacity(36);
        for (quad, normal) in faces {
            let base = (vertices.len() / 6) as u32;
            for corner in quad {
                vertices.extend_from_slice(&positions[corner]);
                vertices.extend_from_slice(&normals[normal]);
            }
            indices.extend([0, 1, 2, 0, 2, 3].map(|i| base + i));
        }

        MeshData::new(vertices, 6, indices, PrimitiveTopology::TriangleList)
    }

    /// Three coloured axis lines from the origin; the second attribute carries the colour.
    pub fn axis_gizmo(length: f32) -> MeshData {
        #[rustfmt::skip]
        let vertices = vec![
            0.0, 0.0, 0.0,       1.0, 0.0, 0.0,
            length, 0.0, 0.0,    1.0, 0.0, 0.0,
            0.0, 0.0, 0.0,       0.0, 1.0, 0.0,
            0.0, length, 0.0,    0.0, 1.0, 0.0,
            0.0, 0.0, 0.0,       0.0, 0.0, 1.0,
            0.0, 0.0, length,    0.0, 0.0, 1.0,
        ];

        MeshData::new(vertices, 6, (0..6).collect(), PrimitiveTopology::LineList)
    }

    /// Flat quad in the XZ plane drawn as a triangle strip, normal pointing up.
    pub fn ground_quad(half_extent: f32) -> MeshData {
        let h = half_extent;
        #[rustfmt::skip]
        let vertices = vec![
            -h, 0.0, -h,    0.0, 1.0, 0.0,
            -h, 0.0, h,     0.0, 1.0, 0.0,
            h, 0.0, -h,     0.0, 1.0, 0.0,
            h, 0.0, h,      0.0, 1.0, 0.0,
        ];

        MeshData::new(vertices, 6, vec![0, 1, 2, 3], PrimitiveTopology::TriangleStrip)
    }
}
