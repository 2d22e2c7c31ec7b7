//! Headless renderer that draws the point buffer into an offscreen target

use crate::buffer::GpuPointBuffer;
use crate::device::GpuContext;
use nalgebra::{Matrix4, Point3, Vector3};
use teleview_core::{DecodedFrame, Error, PointSink, Result};

pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Maps OpenGL clip depth [-1, 1] to wgpu's [0, 1]
#[rustfmt::skip]
fn opengl_to_wgpu() -> Matrix4<f32> {
    Matrix4::new(
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 0.5, 0.5,
        0.0, 0.0, 0.0, 1.0,
    )
}

/// Camera looking down +Z from just behind the sensor origin
pub fn default_view_proj(aspect: f32) -> Matrix4<f32> {
    let view = Matrix4::look_at_rh(
        &Point3::new(0.0, 0.0, -1.0),
        &Point3::new(0.0, 0.0, 5.0),
        &Vector3::y(),
    );
    let proj = Matrix4::new_perspective(aspect, 60f32.to_radians(), 0.05, 100.0);
    opengl_to_wgpu() * proj * view
}

/// Color and depth textures the points are drawn into
pub struct OffscreenTarget {
    pub color: wgpu::Texture,
    pub color_view: wgpu::TextureView,
    pub depth_view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl OffscreenTarget {
    pub fn new(context: &GpuContext, width: u32, height: u32) -> Self {
        let size = wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        };

        let color = context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen Color Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth = context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen Depth Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        Self {
            color_view: color.create_view(&wgpu::TextureViewDescriptor::default()),
            depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
            color,
            width: size.width,
            height: size.height,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// Owns a GPU context, one point buffer and an offscreen target
pub struct GpuPointRenderer {
    context: GpuContext,
    buffer: GpuPointBuffer,
    target: OffscreenTarget,
    clear_color: wgpu::Color,
    frames_drawn: u64,
}

impl GpuPointRenderer {
    /// Create a renderer on a fresh GPU context
    pub async fn new_headless(width: u32, height: u32, capacity: usize) -> Result<Self> {
        let context = GpuContext::new().await?;
        Self::from_context(context, width, height, capacity)
    }

    pub fn from_context(context: GpuContext, width: u32, height: u32, capacity: usize) -> Result<Self> {
        let target = OffscreenTarget::new(&context, width, height);
        let mut buffer = GpuPointBuffer::new(&context, COLOR_FORMAT, Some(DEPTH_FORMAT), capacity)?;
        buffer.set_view(
            &default_view_proj(target.aspect()),
            [target.width as f32, target.height as f32],
        );

        Ok(Self {
            context,
            buffer,
            target,
            clear_color: wgpu::Color { r: 0.1, g: 0.1, b: 0.1, a: 1.0 },
            frames_drawn: 0,
        })
    }

    /// Replace the camera used for subsequent draws
    pub fn set_camera(&mut self, view_proj: &Matrix4<f32>) {
        let viewport = [self.target.width as f32, self.target.height as f32];
        self.buffer.set_view(view_proj, viewport);
    }

    pub fn set_clear_color(&mut self, color: wgpu::Color) {
        self.clear_color = color;
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    pub fn buffer(&self) -> &GpuPointBuffer {
        &self.buffer
    }

    pub fn target(&self) -> &OffscreenTarget {
        &self.target
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    /// Copy the color target back as tightly packed RGBA8 rows, top row first
    pub async fn read_color(&self) -> Result<Vec<u8>> {
        let (width, height) = (self.target.width, self.target.height);
        let row_bytes = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_row_bytes = row_bytes.div_ceil(align) * align;

        let staging_buffer = self.context.create_array_buffer::<u8>(
            "Color Readback Buffer",
            (padded_row_bytes * height) as usize,
            wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        );

        let mut encoder = self.context.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Color Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.target.color,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row_bytes),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        );
        self.context.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |v| {
            let _ = sender.send(v);
        });
        self.context.device.poll(wgpu::Maintain::Wait);

        match receiver.receive().await {
            Some(Ok(())) => {}
            Some(Err(e)) => return Err(Error::Gpu(format!("failed to map color readback: {}", e))),
            None => return Err(Error::Gpu("color readback was cancelled".to_string())),
        }

        let data = buffer_slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((row_bytes * height) as usize);
        for row in data.chunks(padded_row_bytes as usize) {
            pixels.extend_from_slice(&row[..row_bytes as usize]);
        }
        drop(data);
        staging_buffer.unmap();

        Ok(pixels)
    }
}

impl PointSink for GpuPointRenderer {
    fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    fn upload(&mut self, frame: &DecodedFrame) -> Result<()> {
        self.buffer.upload(&self.context.queue, frame)
    }

    fn draw(&mut self, instance_count: u32, point_size: f32, world: &Matrix4<f32>) -> Result<()> {
        let mut encoder = self.context.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Point Cloud Render Encoder"),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Point Cloud Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.target.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.buffer.draw(&self.context.queue, &mut render_pass, instance_count, point_size, world);
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        self.frames_drawn += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector4;
    use teleview_core::{Color3f, Point3f};

    fn renderer(capacity: usize) -> Option<GpuPointRenderer> {
        match pollster::block_on(GpuPointRenderer::new_headless(64, 64, capacity)) {
            Ok(r) => Some(r),
            Err(e) => {
                eprintln!("skipping GPU test: {}", e);
                None
            }
        }
    }

    #[test]
    fn test_default_camera_puts_forward_points_in_clip_volume() {
        let m = default_view_proj(1.0);
        let clip = m * Vector4::new(0.0, 0.0, 5.0, 1.0);
        let ndc = clip / clip.w;
        assert_relative_eq!(ndc.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(ndc.y, 0.0, epsilon = 1e-6);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_upload_and_draw() {
        let Some(mut renderer) = renderer(16) else { return };
        let frame: DecodedFrame = (0..8)
            .map(|i| (Point3f::new(i as f32 * 0.1, 0.0, 2.0), [1.0, 0.5, 0.0]))
            .collect();

        renderer.upload(&frame).unwrap();
        assert_eq!(renderer.buffer().uploaded(), 8);
        renderer.draw(8, 4.0, &Matrix4::identity()).unwrap();
        assert_eq!(renderer.frames_drawn(), 1);
    }

    /// Pixel covering `point` under the default camera
    fn pixel_of(renderer: &GpuPointRenderer, point: &Point3f) -> (u32, u32) {
        let target = renderer.target();
        let clip = default_view_proj(target.aspect()) * Vector4::new(point.x, point.y, point.z, 1.0);
        let ndc = clip / clip.w;
        let x = (ndc.x * 0.5 + 0.5) * target.width as f32;
        let y = (0.5 - ndc.y * 0.5) * target.height as f32;
        (x as u32, y as u32)
    }

    fn rgba_at(renderer: &GpuPointRenderer, pixels: &[u8], (x, y): (u32, u32)) -> [u8; 4] {
        let i = ((y * renderer.target().width + x) * 4) as usize;
        [pixels[i], pixels[i + 1], pixels[i + 2], pixels[i + 3]]
    }

    #[test]
    fn test_draw_renders_only_requested_instances() {
        let Some(mut renderer) = renderer(8) else { return };
        renderer.set_clear_color(wgpu::Color::BLACK);

        let red: Color3f = [1.0, 0.0, 0.0];
        let green: Color3f = [0.0, 1.0, 0.0];
        let near = Point3f::new(0.0, 0.0, 2.0);
        let beside = Point3f::new(0.6, 0.0, 2.0);
        let frame: DecodedFrame = vec![(near, red), (beside, green)].into_iter().collect();
        renderer.upload(&frame).unwrap();

        // one of two uploaded points; the second stays in the unused tail
        renderer.draw(1, 8.0, &Matrix4::identity()).unwrap();
        let pixels = pollster::block_on(renderer.read_color()).unwrap();
        assert_eq!(pixels.len(), 64 * 64 * 4);
        assert_eq!(rgba_at(&renderer, &pixels, pixel_of(&renderer, &near)), [255, 0, 0, 255]);
        assert_eq!(rgba_at(&renderer, &pixels, pixel_of(&renderer, &beside)), [0, 0, 0, 255]);

        renderer.draw(2, 8.0, &Matrix4::identity()).unwrap();
        let pixels = pollster::block_on(renderer.read_color()).unwrap();
        assert_eq!(rgba_at(&renderer, &pixels, pixel_of(&renderer, &near)), [255, 0, 0, 255]);
        assert_eq!(rgba_at(&renderer, &pixels, pixel_of(&renderer, &beside)), [0, 255, 0, 255]);
    }

    #[test]
    fn test_zero_instances_leave_clear_color() {
        let Some(mut renderer) = renderer(4) else { return };
        renderer.set_clear_color(wgpu::Color::BLACK);
        let near = Point3f::new(0.0, 0.0, 2.0);
        let frame: DecodedFrame = std::iter::once((near, [1.0, 1.0, 1.0])).collect();

        renderer.upload(&frame).unwrap();
        renderer.draw(0, 8.0, &Matrix4::identity()).unwrap();
        let pixels = pollster::block_on(renderer.read_color()).unwrap();
        assert!(pixels.chunks(4).all(|p| p == [0, 0, 0, 255]));
    }

    #[test]
    fn test_upload_over_capacity_is_refused() {
        let Some(mut renderer) = renderer(4) else { return };
        let frame: DecodedFrame = (0..5).map(|_| (Point3f::origin(), [1.0, 1.0, 1.0])).collect();

        let err = renderer.upload(&frame).unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded { requested: 5, capacity: 4 }));
        assert_eq!(renderer.buffer().uploaded(), 0);
    }
}
