use std::collections::HashMap;

use wgpu::{
    DepthBiasState, MultisampleState, PipelineCompilationOptions, ShaderSource, StencilState,
};

use crate::rendering::{
    backend::{BackendError, PrimitiveTopology},
    offscreen::DepthTexture,
};

/// Position plus one `vec3` attribute, both `f32`.
pub const VERTEX_STRIDE: u32 = 24;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

const VERTEX_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: VERTEX_STRIDE as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &VERTEX_ATTRIBUTES,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub topology: wgpu::PrimitiveTopology,
    pub wireframe: bool,
}

/// Maps a topology tag onto wgpu's. Adjacency and patch topologies have no wgpu equivalent.
pub fn wgpu_topology(
    topology: PrimitiveTopology,
) -> Result<wgpu::PrimitiveTopology, BackendError> {
    match topology {
        PrimitiveTopology::PointList => Ok(wgpu::PrimitiveTopology::PointList),
        PrimitiveTopology::LineList => Ok(wgpu::PrimitiveTopology::LineList),
        PrimitiveTopology::LineStrip => Ok(wgpu::PrimitiveTopology::LineStrip),
        PrimitiveTopology::TriangleList => Ok(wgpu::PrimitiveTopology::TriangleList),
        PrimitiveTopology::TriangleStrip => Ok(wgpu::PrimitiveTopology::TriangleStrip),
        other => Err(BackendError::UnsupportedTopology(other)),
    }
}

/// Render pipelines for the instanced shader, one per topology and fill mode,
/// built on first use.
pub struct Pipelines {
    shader: wgpu::ShaderModule,
    layout: wgpu::PipelineLayout,
    color_format: wgpu::TextureFormat,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl Pipelines {
    pub fn new(
        device: &wgpu::Device,
        instance_state_layout: &wgpu::BindGroupLayout,
        color_format: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Instanced shader"),
            source: ShaderSource::Wgsl(include_str!("../../shaders/instanced.wgsl").into()),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Instanced pipeline layout"),
            bind_group_layouts: &[instance_state_layout],
            push_constant_ranges: &[],
        });

        Self {
            shader,
            layout,
            color_format,
            pipelines: HashMap::new(),
        }
    }

    pub fn get(&self, key: PipelineKey) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(&key)
    }

    pub fn ensure(&mut self, device: &wgpu::Device, key: PipelineKey) {
        if self.pipelines.contains_key(&key) {
            return;
        }

        log::debug!("Creating pipeline for {:?}", key);
        let pipeline = self.create_pipeline(device, key);
        self.pipelines.insert(key, pipeline);
    }

    fn create_pipeline(&self, device: &wgpu::Device, key: PipelineKey) -> wgpu::RenderPipeline {
        let strip_index_format = match key.topology {
            wgpu::PrimitiveTopology::LineStrip | wgpu::PrimitiveTopology::TriangleStrip => {
                Some(wgpu::IndexFormat::Uint32)
            }
            _ => None,
        };
        let triangles = matches!(
            key.topology,
            wgpu::PrimitiveTopology::TriangleList | wgpu::PrimitiveTopology::TriangleStrip
        );
        let polygon_mode = if key.wireframe && triangles {
            wgpu::PolygonMode::Line
        } else {
            wgpu::PolygonMode::Fill
        };

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Instanced render pipeline"),
            layout: Some(&self.layout),
            vertex: wgpu::VertexState {
                module: &self.shader,
                entry_point: Some("vs_main"),
                buffers: &[VERTEX_LAYOUT],
                compilation_options: PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.color_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: key.topology,
                strip_index_format,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DepthTexture::DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: StencilState::default(),
                bias: DepthBiasState::default(),
            }),
            multisample: MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjacency_and_patches_are_unsupported() {
        assert_eq!(
            wgpu_topology(PrimitiveTopology::TriangleStrip),
            Ok(wgpu::PrimitiveTopology::TriangleStrip)
        );
        assert_eq!(
            wgpu_topology(PrimitiveTopology::LineListAdjacency),
            Err(BackendError::UnsupportedTopology(
                PrimitiveTopology::LineListAdjacency
            ))
        );
        assert!(wgpu_topology(PrimitiveTopology::PatchList(3)).is_err());
    }
}
