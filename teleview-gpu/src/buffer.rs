//! Fixed-capacity device buffer of point instances and its draw call

use crate::device::GpuContext;
use bytemuck::{Pod, Zeroable};
use nalgebra::Matrix4;
use teleview_core::{DecodedFrame, Error, PointInstance, Result};

/// Corners of the quad template drawn once per point
pub const QUAD_CORNERS: [[f32; 2]; 4] = [
    [-0.5, -0.5],
    [0.5, -0.5],
    [0.5, 0.5],
    [-0.5, 0.5],
];

/// Two counter-clockwise triangles over [`QUAD_CORNERS`]
pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

const CORNER_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

/// Uniform block shared by every instance of one draw
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct PointUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub object_to_world: [[f32; 4]; 4],
    pub viewport: [f32; 2],
    pub point_size: f32,
    pub _padding: f32,
}

impl Default for PointUniforms {
    fn default() -> Self {
        Self {
            view_proj: Matrix4::identity().into(),
            object_to_world: Matrix4::identity().into(),
            viewport: [1.0, 1.0],
            point_size: 1.0,
            _padding: 0.0,
        }
    }
}

/// Device-resident point storage with a static capacity.
///
/// The storage buffer is allocated once for `capacity` points; changing the
/// capacity means building a new `GpuPointBuffer`. Uploads overwrite from
/// offset 0 and draws consult the requested instance count, so the unused
/// tail of the buffer is never rendered.
pub struct GpuPointBuffer {
    capacity: usize,
    uploaded: usize,
    uniforms: PointUniforms,
    point_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    corner_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    pipeline: wgpu::RenderPipeline,
}

impl GpuPointBuffer {
    /// Allocate storage for `capacity` points and build the draw pipeline
    /// for the given target formats.
    pub fn new(
        context: &GpuContext,
        color_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
        capacity: usize,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidConfig("point buffer capacity must be greater than 0".to_string()));
        }

        let limit = context.max_storage_elements::<PointInstance>();
        if capacity > limit {
            return Err(Error::Gpu(format!(
                "{} points exceed the storage binding limit of {} points",
                capacity, limit
            )));
        }

        let point_buffer = context.create_array_buffer::<PointInstance>(
            "Point Instance Buffer",
            capacity,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        );

        let uniforms = PointUniforms::default();
        let uniform_buffer = context.create_buffer_init(
            "Point Uniform Buffer",
            &[uniforms],
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        );
        let corner_buffer = context.create_buffer_init("Quad Corner Buffer", &QUAD_CORNERS, wgpu::BufferUsages::VERTEX);
        let index_buffer = context.create_buffer_init("Quad Index Buffer", &QUAD_INDICES, wgpu::BufferUsages::INDEX);

        let (bind_group_layout, bind_group) = context.create_vertex_bind_group(
            "point_bind_group",
            &[
                (&uniform_buffer, wgpu::BufferBindingType::Uniform),
                (&point_buffer, wgpu::BufferBindingType::Storage { read_only: true }),
            ],
        );

        let shader = context.create_shader_module("Point Quad Shader", include_str!("shaders/point_quad.wgsl"));

        let pipeline_layout = context.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Point Quad Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = context.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Point Quad Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &CORNER_ATTRIBUTES,
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: depth_format.map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        tracing::debug!(
            "allocated point buffer for {} points ({} bytes)",
            capacity,
            capacity * std::mem::size_of::<PointInstance>()
        );

        Ok(Self {
            capacity,
            uploaded: 0,
            uniforms,
            point_buffer,
            uniform_buffer,
            corner_buffer,
            index_buffer,
            bind_group,
            pipeline,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of points written by the last upload
    pub fn uploaded(&self) -> usize {
        self.uploaded
    }

    /// Write `frame` at offset 0. Frames longer than the capacity are refused.
    pub fn upload(&mut self, queue: &wgpu::Queue, frame: &DecodedFrame) -> Result<()> {
        if frame.len() > self.capacity {
            return Err(Error::CapacityExceeded { requested: frame.len(), capacity: self.capacity });
        }
        if !frame.is_empty() {
            queue.write_buffer(&self.point_buffer, 0, bytemuck::cast_slice(&frame.to_instances()));
        }
        self.uploaded = frame.len();
        Ok(())
    }

    /// Set the camera used by subsequent draws
    pub fn set_view(&mut self, view_proj: &Matrix4<f32>, viewport: [f32; 2]) {
        self.uniforms.view_proj = (*view_proj).into();
        self.uniforms.viewport = viewport;
    }

    /// Record one instanced draw of the quad template.
    ///
    /// Returns the number of instances actually drawn, which is
    /// `instance_count` limited to the buffer capacity.
    pub fn draw<'a>(
        &'a self,
        queue: &wgpu::Queue,
        pass: &mut wgpu::RenderPass<'a>,
        instance_count: u32,
        point_size: f32,
        world: &Matrix4<f32>,
    ) -> u32 {
        let instances = instance_count.min(self.capacity as u32);
        if instances < instance_count {
            tracing::warn!("draw of {} instances clamped to capacity {}", instance_count, self.capacity);
        }

        let uniforms = PointUniforms {
            object_to_world: (*world).into(),
            point_size,
            ..self.uniforms
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        if instances == 0 {
            return 0;
        }

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.corner_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
        pass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..instances);
        instances
    }
}
