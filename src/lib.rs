mod buffers;
mod capacity;
mod draw_pass;
#[cfg(test)]
mod meshing_tests;
mod voxel_pass;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

use bytemuck::{Pod, Zeroable};
use cgmath::{perspective, Deg, Matrix4, Point3, Vector3};
use web_time::Instant;
use wgpu::util::DeviceExt;
use winit::{
    event::{ElementState, Event, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

use crate::buffers::GeometryBuffers;
use crate::capacity::{CapacityPlan, CHUNK_SIZE, WORKGROUP_EXTENT};
use crate::draw_pass::{DrawBindings, DrawPass, RenderMode};
use crate::voxel_pass::{VoxelBindings, VoxelPipelines};

#[repr(C)]
#[derive(Default, Copy, Clone, Debug, Pod, Zeroable)]
struct GenParamsUniformBufferInput {
    origin: [f32; 3],
    frequency: f32,
    amplitude: f32,
    _pad: [f32; 3],
}

#[repr(C)]
#[derive(Default, Copy, Clone, Debug, Pod, Zeroable)]
struct CameraUniformBufferInput {
    view_proj: [[f32; 4]; 4],
}

#[rustfmt::skip]
const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Per-frame mutable state of the chunk pipeline: the moving noise origin,
/// the field parameters fed to the generation kernel, and the currently
/// selected draw strategy.
struct ChunkState {
    origin: Vector3<f32>,
    velocity: Vector3<f32>,
    frequency: f32,
    amplitude: f32,
    render_mode: RenderMode,
}

impl ChunkState {
    fn new() -> Self {
        Self {
            origin: Vector3::new(0.0, 0.0, 0.0),
            velocity: Vector3::new(5.0, 5.0, 5.0),
            frequency: 0.1,
            amplitude: 1.0,
            render_mode: RenderMode::default(),
        }
    }

    /// Frame-rate-dependent accumulation: origin advances by velocity times
    /// the elapsed frame delta, not by a fixed step.
    fn advance(&mut self, dt: f32) {
        self.origin += self.velocity * dt;
    }

    fn params(&self) -> GenParamsUniformBufferInput {
        GenParamsUniformBufferInput {
            origin: self.origin.into(),
            frequency: self.frequency,
            amplitude: self.amplitude,
            _pad: [0.0; 3],
        }
    }
}

fn camera_view_proj(elapsed: f32, aspect: f32) -> [[f32; 4]; 4] {
    let half_chunk = CHUNK_SIZE as f32 / 2.0;
    let center = Point3::new(half_chunk, half_chunk, half_chunk);
    let angle = elapsed * 0.15;
    let eye = Point3::new(
        half_chunk + 140.0 * angle.cos(),
        110.0,
        half_chunk + 140.0 * angle.sin(),
    );
    let view = Matrix4::look_at_rh(eye, center, Vector3::unit_y());
    let proj = perspective(Deg(60.0), aspect, 0.1, 600.0);
    (OPENGL_TO_WGPU_MATRIX * proj * view).into()
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
        format: draw_pass::DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

async fn arun() {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            std::panic::set_hook(Box::new(console_error_panic_hook::hook));
            console_log::init_with_level(log::Level::Debug).expect("Couldn't initialize logger");
        } else {
            env_logger::init();
        }
    }

    let event_loop = EventLoop::new().unwrap();
    let window = WindowBuilder::new()
        .with_title("voxel playground")
        .build(&event_loop)
        .unwrap();

    #[cfg(target_arch = "wasm32")]
    {
        // Winit prevents sizing with CSS, so we have to set
        // the size manually when on web.
        use winit::dpi::PhysicalSize;
        let _ = window.request_inner_size(PhysicalSize::new(450, 400));

        use winit::platform::web::WindowExtWebSys;
        web_sys::window()
            .and_then(|win| win.document())
            .and_then(|doc| {
                let dst = doc.get_element_by_id("wasm-example")?;
                let canvas = web_sys::Element::from(window.canvas()?);
                dst.append_child(&canvas).ok()?;
                Some(())
            })
            .expect("Couldn't append canvas to document body.");
    }

    let size = window.inner_size();

    let instance = wgpu::Instance::default();

    let surface = instance.create_surface(&window).unwrap();
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            // Request an adapter which can render to our surface
            compatible_surface: Some(&surface),
        })
        .await
        .expect("Failed to find an appropriate adapter");
    log::info!("using adapter: {}", adapter.get_info().name);

    let required_features = wgpu::Features::empty();
    let mut required_limits = wgpu::Limits::downlevel_defaults();
    // The worst-case vertex buffer is ~393 MiB, well past the default
    // storage binding limit, and every kernel workgroup runs 8x8x8 = 512
    // invocations.
    required_limits.max_buffer_size = 2147483647;
    required_limits.max_storage_buffer_binding_size = 2147483647;
    required_limits.max_compute_invocations_per_workgroup = 512;

    // Create the logical device and command queue
    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: None,
                required_features,
                required_limits,
                memory_hints: wgpu::MemoryHints::MemoryUsage,
            },
            None,
        )
        .await
        .expect("Failed to create device");

    // Capacity errors are fatal here, before any buffer exists.
    let plan = CapacityPlan::for_chunk(CHUNK_SIZE, WORKGROUP_EXTENT)
        .expect("chunk capacity configuration rejected");
    log::info!(
        "chunk {}^3, {} sub-regions, capacity {} vertices / {} indices",
        plan.chunk_size,
        plan.sub_region_count,
        plan.vertex_capacity,
        plan.index_capacity
    );

    let mut state = ChunkState::new();

    let geometry = GeometryBuffers::new(&device, &plan);

    let params_uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Gen Params Uniform Buffer"),
        contents: bytemuck::cast_slice(&[state.params()]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });

    let camera_uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Camera Uniform Buffer"),
        contents: bytemuck::cast_slice(&[CameraUniformBufferInput::default()]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });

    let swapchain_capabilities = surface.get_capabilities(&adapter);
    let swapchain_format = swapchain_capabilities.formats[0];

    let voxel_pipelines = VoxelPipelines::new(&device);
    let voxel_bindings =
        VoxelBindings::new(&device, &voxel_pipelines, &geometry, &params_uniform_buffer);

    let draw_pass = DrawPass::new(&device, swapchain_format);
    let draw_bindings = DrawBindings::new(&device, &draw_pass, &geometry, &camera_uniform_buffer);

    let mut config = surface
        .get_default_config(&adapter, size.width, size.height)
        .unwrap();
    surface.configure(&device, &config);

    let mut depth_view = create_depth_view(&device, config.width, config.height);

    let start_time = Instant::now();
    let mut last_frame = start_time;

    let window = &window;

    event_loop
        .run(move |event, target| {
            // Have the closure take ownership of the resources.
            // `event_loop.run` never returns, therefore we must do this to ensure
            // the resources are properly cleaned up.
            let _ = (&instance, &adapter, &voxel_pipelines, &draw_pass);

            if let Event::AboutToWait = event {
                let frame = surface
                    .get_current_texture()
                    .expect("Failed to acquire next swap chain texture");
                let view = frame
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                let mut encoder =
                    device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });

                let now = Instant::now();
                let dt = (now - last_frame).as_secs_f32();
                last_frame = now;
                state.advance(dt);

                let aspect = config.width as f32 / config.height.max(1) as f32;
                queue.write_buffer(
                    &params_uniform_buffer,
                    0,
                    bytemuck::cast_slice(&[state.params()]),
                );
                queue.write_buffer(
                    &camera_uniform_buffer,
                    0,
                    bytemuck::cast_slice(&[CameraUniformBufferInput {
                        view_proj: camera_view_proj(start_time.elapsed().as_secs_f32(), aspect),
                    }]),
                );

                {
                    let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                        label: None,
                        timestamp_writes: None,
                    });
                    voxel_pipelines.record(&mut cpass, &voxel_bindings, plan.dispatch_extent());
                }

                // The feedback totals are final once the compute pass ends;
                // hand the true index count to the data-driven args.
                geometry.publish_frame_total(&mut encoder);

                {
                    let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: None,
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: &view,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(wgpu::Color {
                                    r: 0.05,
                                    g: 0.07,
                                    b: 0.12,
                                    a: 1.0,
                                }),
                                store: wgpu::StoreOp::Store,
                            },
                        })],
                        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                            view: &depth_view,
                            depth_ops: Some(wgpu::Operations {
                                load: wgpu::LoadOp::Clear(1.0),
                                store: wgpu::StoreOp::Discard,
                            }),
                            stencil_ops: None,
                        }),
                        timestamp_writes: None,
                        occlusion_query_set: None,
                    });
                    draw_pass.record(&mut rpass, &draw_bindings, &geometry, state.render_mode);
                }

                // Counters reset only after the draw that consumed them has
                // been recorded; queue order keeps the next frame's feedback
                // stage behind this clear.
                geometry.reset_feedback(&mut encoder);

                queue.submit(Some(encoder.finish()));
                frame.present();

                window.request_redraw();
            };

            if let Event::WindowEvent {
                window_id: _,
                event,
            } = event
            {
                match event {
                    WindowEvent::Resized(new_size) => {
                        // Reconfigure the surface with the new size
                        config.width = new_size.width.max(1);
                        config.height = new_size.height.max(1);
                        surface.configure(&device, &config);
                        depth_view = create_depth_view(&device, config.width, config.height);
                        // On macos the window needs to be redrawn manually after resizing
                        window.request_redraw();
                    }
                    WindowEvent::KeyboardInput {
                        event: key_event, ..
                    } => {
                        if key_event.state == ElementState::Pressed && !key_event.repeat {
                            let selected = match key_event.physical_key {
                                PhysicalKey::Code(KeyCode::Digit1) => RenderMode::from_index(0),
                                PhysicalKey::Code(KeyCode::Digit2) => RenderMode::from_index(1),
                                PhysicalKey::Code(KeyCode::Digit3) => RenderMode::from_index(2),
                                _ => None,
                            };
                            if let Some(mode) = selected {
                                if mode != state.render_mode {
                                    log::info!("render mode -> {:?}", mode);
                                    state.render_mode = mode;
                                }
                            }
                        }
                    }
                    WindowEvent::RedrawRequested => {}
                    WindowEvent::CloseRequested => target.exit(),
                    _ => {}
                };
            }
        })
        .unwrap();
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen(start))]
pub fn run() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        pollster::block_on(arun());
    }
    #[cfg(target_arch = "wasm32")]
    {
        wasm_bindgen_futures::spawn_local(arun());
    }
}
