//! Scene renderer: room shell, grid and the active point cloud

use crate::backdrop::{grid_vertices, room_vertices, LineVertex, MeshVertex};
use crate::device::GpuContext;
use bytemuck::{Pod, Zeroable};
use nalgebra::Matrix4;
use teleop_core::{Error, OrbitCamera, Result, Scene};
use winit::window::Window;

/// Vertex data for point cloud rendering
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct PointVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl PointVertex {
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PointVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Camera uniform data
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub view_pos: [f32; 3],
    pub _padding: f32,
}

/// Model matrix for the active point cloud
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct ModelUniform {
    pub model: [[f32; 4]; 4],
}

/// Light parameters for the room shader
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct LightUniform {
    pub direction: [f32; 3],
    pub ambient: f32,
    pub intensity: f32,
    pub _padding: [f32; 3],
}

/// Rendering configuration
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub background_color: [f64; 4],
    pub enable_depth_test: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            background_color: [0.0, 0.0, 0.0, 1.0],
            enable_depth_test: true,
        }
    }
}

/// Renderer owning the window surface, pipelines and static backdrop buffers
pub struct SceneRenderer<'window> {
    pub gpu: GpuContext,
    surface: wgpu::Surface<'window>,
    surface_config: wgpu::SurfaceConfiguration,
    config: RenderConfig,

    point_pipeline: wgpu::RenderPipeline,
    room_pipeline: wgpu::RenderPipeline,
    grid_pipeline: wgpu::RenderPipeline,

    camera_uniform: CameraUniform,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    model_buffer: wgpu::Buffer,
    model_bind_group: wgpu::BindGroup,
    light_buffer: wgpu::Buffer,
    light_bind_group: wgpu::BindGroup,

    room_buffer: wgpu::Buffer,
    room_vertex_count: u32,
    grid_buffer: wgpu::Buffer,
    grid_vertex_count: u32,

    depth_view: wgpu::TextureView,
}

impl<'window> SceneRenderer<'window> {
    /// Create a renderer drawing to the given window
    pub async fn new(window: &'window Window, config: RenderConfig, scene: &Scene) -> Result<Self> {
        let gpu = GpuContext::new().await?;

        let surface = gpu
            .instance
            .create_surface(window)
            .map_err(|e| Error::Gpu(format!("Failed to create surface: {:?}", e)))?;

        let surface_caps = surface.get_capabilities(&gpu.adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        let size = window.inner_size();
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&gpu.device, &surface_config);

        // Uniform buffers and bind groups
        let camera_uniform = CameraUniform {
            view_proj: Matrix4::identity().into(),
            view_pos: [0.0, 0.0, 0.0],
            _padding: 0.0,
        };
        let camera_buffer = gpu.create_buffer_init(
            "Camera Buffer",
            &[camera_uniform],
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        );

        let model_uniform = ModelUniform {
            model: Matrix4::identity().into(),
        };
        let model_buffer = gpu.create_buffer_init(
            "Model Buffer",
            &[model_uniform],
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        );

        let light_dir = scene.lighting.directional_position.normalize();
        let light_uniform = LightUniform {
            direction: [light_dir.x, light_dir.y, light_dir.z],
            ambient: scene.lighting.ambient_intensity,
            intensity: scene.lighting.directional_intensity,
            _padding: [0.0; 3],
        };
        let light_buffer = gpu.create_buffer_init(
            "Light Buffer",
            &[light_uniform],
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        );

        let uniform_bgl_entry = wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let camera_bgl = gpu
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[uniform_bgl_entry],
                label: Some("camera_bind_group_layout"),
            });
        let model_bgl = gpu
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[uniform_bgl_entry],
                label: Some("model_bind_group_layout"),
            });
        let light_bgl = gpu
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[uniform_bgl_entry],
                label: Some("light_bind_group_layout"),
            });

        let camera_bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &camera_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });
        let model_bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &model_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: model_buffer.as_entire_binding(),
            }],
            label: Some("model_bind_group"),
        });
        let light_bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &light_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: light_buffer.as_entire_binding(),
            }],
            label: Some("light_bind_group"),
        });

        // Shaders and pipelines
        let point_shader = gpu
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Point Cloud Shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("shaders/point_cloud.wgsl").into()),
            });
        let backdrop_shader = gpu
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Backdrop Shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("shaders/backdrop.wgsl").into()),
            });

        let point_layout = gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Point Pipeline Layout"),
                bind_group_layouts: &[&camera_bgl, &model_bgl],
                push_constant_ranges: &[],
            });
        let backdrop_layout = gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Backdrop Pipeline Layout"),
                bind_group_layouts: &[&camera_bgl, &light_bgl],
                push_constant_ranges: &[],
            });

        let depth_stencil = if config.enable_depth_test {
            Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            })
        } else {
            None
        };

        let make_pipeline = |label: &str,
                             layout: &wgpu::PipelineLayout,
                             shader: &wgpu::ShaderModule,
                             vs: &str,
                             fs: &str,
                             buffer: wgpu::VertexBufferLayout,
                             topology: wgpu::PrimitiveTopology| {
            gpu.device
                .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(label),
                    layout: Some(layout),
                    vertex: wgpu::VertexState {
                        module: shader,
                        entry_point: vs,
                        buffers: &[buffer],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: shader,
                        entry_point: fs,
                        targets: &[Some(wgpu::ColorTargetState {
                            format: surface_format,
                            blend: Some(wgpu::BlendState::REPLACE),
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology,
                        strip_index_format: None,
                        front_face: wgpu::FrontFace::Ccw,
                        cull_mode: None,
                        unclipped_depth: false,
                        polygon_mode: wgpu::PolygonMode::Fill,
                        conservative: false,
                    },
                    depth_stencil: depth_stencil.clone(),
                    multisample: wgpu::MultisampleState {
                        count: 1,
                        mask: !0,
                        alpha_to_coverage_enabled: false,
                    },
                    multiview: None,
                })
        };

        let point_pipeline = make_pipeline(
            "Point Cloud Pipeline",
            &point_layout,
            &point_shader,
            "vs_main",
            "fs_main",
            PointVertex::desc(),
            wgpu::PrimitiveTopology::PointList,
        );
        let room_pipeline = make_pipeline(
            "Room Pipeline",
            &backdrop_layout,
            &backdrop_shader,
            "vs_room",
            "fs_room",
            MeshVertex::desc(),
            wgpu::PrimitiveTopology::TriangleList,
        );
        let grid_pipeline = make_pipeline(
            "Grid Pipeline",
            &backdrop_layout,
            &backdrop_shader,
            "vs_grid",
            "fs_grid",
            LineVertex::desc(),
            wgpu::PrimitiveTopology::LineList,
        );

        // Static backdrop geometry
        let room = room_vertices(&scene.backdrop);
        let room_buffer = gpu.create_buffer_init("Room Vertex Buffer", &room, wgpu::BufferUsages::VERTEX);
        let grid = grid_vertices(&scene.backdrop);
        let grid_buffer = gpu.create_buffer_init("Grid Vertex Buffer", &grid, wgpu::BufferUsages::VERTEX);

        let depth_view = Self::create_depth_view(&gpu.device, surface_config.width, surface_config.height);

        Ok(Self {
            gpu,
            surface,
            surface_config,
            config,
            point_pipeline,
            room_pipeline,
            grid_pipeline,
            camera_uniform,
            camera_buffer,
            camera_bind_group,
            model_buffer,
            model_bind_group,
            light_buffer,
            light_bind_group,
            room_buffer,
            room_vertex_count: room.len() as u32,
            grid_buffer,
            grid_vertex_count: grid.len() as u32,
            depth_view,
        })
    }

    fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    /// Resize the draw surface; the camera frustum is the caller's concern
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.surface_config.width = width;
            self.surface_config.height = height;
            self.surface.configure(&self.gpu.device, &self.surface_config);
            self.depth_view = Self::create_depth_view(&self.gpu.device, width, height);
        }
    }

    pub fn surface_size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    fn update_uniforms(&mut self, scene: &Scene, camera: &OrbitCamera) {
        let view_proj = camera.projection_matrix() * camera.view_matrix();
        let pos = camera.position();
        self.camera_uniform.view_proj = view_proj.into();
        self.camera_uniform.view_pos = [pos.x, pos.y, pos.z];
        self.gpu.queue.write_buffer(
            &self.camera_buffer,
            0,
            bytemuck::bytes_of(&self.camera_uniform),
        );

        let model: Matrix4<f32> = scene
            .cloud()
            .map(|c| c.model_matrix())
            .unwrap_or_else(Matrix4::identity);
        let model_uniform = ModelUniform {
            model: model.into(),
        };
        self.gpu
            .queue
            .write_buffer(&self.model_buffer, 0, bytemuck::bytes_of(&model_uniform));
    }

    fn cloud_vertices(scene: &Scene) -> Vec<PointVertex> {
        scene
            .cloud()
            .map(|shape| {
                shape
                    .cloud
                    .iter()
                    .map(|p| PointVertex {
                        position: [p.position.x, p.position.y, p.position.z],
                        color: p.color,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn encode_scene_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        color_view: &wgpu::TextureView,
        depth_view: &wgpu::TextureView,
        point_buffer: Option<(&wgpu::Buffer, u32)>,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: self.config.background_color[0],
                        g: self.config.background_color[1],
                        b: self.config.background_color[2],
                        a: self.config.background_color[3],
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: if self.config.enable_depth_test {
                Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                })
            } else {
                None
            },
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.room_pipeline);
        pass.set_bind_group(0, &self.camera_bind_group, &[]);
        pass.set_bind_group(1, &self.light_bind_group, &[]);
        pass.set_vertex_buffer(0, self.room_buffer.slice(..));
        pass.draw(0..self.room_vertex_count, 0..1);

        pass.set_pipeline(&self.grid_pipeline);
        pass.set_vertex_buffer(0, self.grid_buffer.slice(..));
        pass.draw(0..self.grid_vertex_count, 0..1);

        if let Some((buffer, count)) = point_buffer {
            pass.set_pipeline(&self.point_pipeline);
            pass.set_bind_group(0, &self.camera_bind_group, &[]);
            pass.set_bind_group(1, &self.model_bind_group, &[]);
            pass.set_vertex_buffer(0, buffer.slice(..));
            pass.draw(0..count, 0..1);
        }
    }

    /// Draw one frame of the scene to the window surface
    pub fn render(&mut self, scene: &Scene, camera: &OrbitCamera) -> Result<()> {
        self.update_uniforms(scene, camera);

        let vertices = Self::cloud_vertices(scene);
        let point_buffer = if vertices.is_empty() {
            None
        } else {
            Some(self.gpu.create_buffer_init(
                "Point Cloud Vertex Buffer",
                &vertices,
                wgpu::BufferUsages::VERTEX,
            ))
        };

        let output = self
            .surface
            .get_current_texture()
            .map_err(|e| Error::Gpu(format!("Failed to get surface texture: {:?}", e)))?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Scene Render Encoder"),
            });

        self.encode_scene_pass(
            &mut encoder,
            &view,
            &self.depth_view,
            point_buffer
                .as_ref()
                .map(|b| (b, vertices.len() as u32)),
        );

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }

    /// Render the current view offscreen and return it as PNG bytes
    pub fn capture_frame(&mut self, scene: &Scene, camera: &OrbitCamera) -> Result<Vec<u8>> {
        self.update_uniforms(scene, camera);

        let (width, height) = (self.surface_config.width, self.surface_config.height);
        let format = self.surface_config.format;

        let texture = self.gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Capture Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = Self::create_depth_view(&self.gpu.device, width, height);

        let vertices = Self::cloud_vertices(scene);
        let point_buffer = if vertices.is_empty() {
            None
        } else {
            Some(self.gpu.create_buffer_init(
                "Capture Point Buffer",
                &vertices,
                wgpu::BufferUsages::VERTEX,
            ))
        };

        // 256-byte row alignment required for texture-to-buffer copies
        let bytes_per_row = width * 4;
        let padded_bytes_per_row = (bytes_per_row + 255) / 256 * 256;
        let readback = self.gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Capture Readback Buffer"),
            size: (padded_bytes_per_row * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Capture Encoder"),
            });
        self.encode_scene_pass(
            &mut encoder,
            &view,
            &depth_view,
            point_buffer
                .as_ref()
                .map(|b| (b, vertices.len() as u32)),
        );
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &readback,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.gpu.queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.gpu.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| Error::Gpu("Capture readback channel closed".to_string()))?
            .map_err(|e| Error::Gpu(format!("Capture readback failed: {:?}", e)))?;

        let mapped = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((bytes_per_row * height) as usize);
        for row in 0..height {
            let start = (row * padded_bytes_per_row) as usize;
            pixels.extend_from_slice(&mapped[start..start + bytes_per_row as usize]);
        }
        drop(mapped);
        readback.unmap();

        // Surface formats are usually BGRA; PNG wants RGBA
        if matches!(
            format,
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb
        ) {
            for px in pixels.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
        }

        let image = image::RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| Error::Gpu("Capture produced a malformed image".to_string()))?;
        let mut png = Vec::new();
        image::DynamicImage::ImageRgba8(image)
            .write_to(
                &mut std::io::Cursor::new(&mut png),
                image::ImageFormat::Png,
            )
            .map_err(|e| Error::Gpu(format!("PNG encode failed: {}", e)))?;

        log::debug!("Captured {}x{} still frame ({} bytes)", width, height, png.len());
        Ok(png)
    }
}
