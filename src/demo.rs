use std::path::PathBuf;

use anyhow::Context;
use glam::Vec3;

use crate::{
    camera::{Camera, InstanceState, Placement, Projection, Rotation},
    model::MeshData,
    rendering::{
        backend::PrimitiveTopology, batch_assembler::FrameStats, config::RenderConfig,
        object_registry::ObjectId, offscreen::OffscreenTarget, scene::RenderScene,
        wgpu_backend::WgpuBackend,
    },
};

const LIGHT_POSITIONS: [Vec3; 2] = [Vec3::new(0.0, 8.5, 7.0), Vec3::new(3.0, 0.0, -5.0)];

#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub width: u32,
    pub height: u32,
    pub clear_color: wgpu::Color,
    pub output_path: PathBuf,
    pub render: RenderConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            clear_color: wgpu::Color::BLACK,
            output_path: PathBuf::from("demo.png"),
            render: RenderConfig::default(),
        }
    }
}

impl DemoConfig {
    /// Defaults, with the output path replaced by the first argument if given.
    pub fn from_args(mut args: impl Iterator<Item = String>) -> Self {
        let mut config = Self::default();
        if let Some(path) = args.next() {
            config.output_path = PathBuf::from(path);
        }
        config
    }
}

pub struct GpuContext {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

/// Opens a device without a surface. Line polygon mode is enabled when the
/// adapter offers it.
pub async fn request_headless_device() -> anyhow::Result<GpuContext> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .context("Failed to find a GPU adapter")?;

    let info = adapter.get_info();
    log::info!(
        "Adapter: {} ({:?}, {:?}), driver {} {}",
        info.name,
        info.device_type,
        info.backend,
        info.driver,
        info.driver_info
    );

    let required_features = adapter.features() & wgpu::Features::POLYGON_MODE_LINE;

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            required_features,
            required_limits: wgpu::Limits::default(),
            label: None,
            memory_hints: Default::default(),
            trace: wgpu::Trace::Off,
        })
        .await
        .context("Failed to create device")?;

    Ok(GpuContext {
        adapter,
        device,
        queue,
    })
}

/// Square pyramid welded from separately indexed positions and face normals.
fn prop_mesh() -> anyhow::Result<MeshData> {
    const SLOPE_Y: f32 = 0.447_213_6;
    const SLOPE_XZ: f32 = 0.894_427_2;

    let positions = [
        [-1.5, 0.0, -1.5],
        [1.5, 0.0, -1.5],
        [1.5, 0.0, 1.5],
        [-1.5, 0.0, 1.5],
        [0.0, 3.0, 0.0],
    ];
    let normals = [
        [0.0, -1.0, 0.0],
        [0.0, SLOPE_Y, -SLOPE_XZ],
        [SLOPE_XZ, SLOPE_Y, 0.0],
        [0.0, SLOPE_Y, SLOPE_XZ],
        [-SLOPE_XZ, SLOPE_Y, 0.0],
    ];

    MeshData::weld(
        &positions,
        &normals,
        &[0, 2, 1, 0, 3, 2, 0, 1, 4, 1, 2, 4, 2, 3, 4, 3, 0, 4],
        &[0, 0, 0, 0, 0, 0, 1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4],
        PrimitiveTopology::TriangleList,
    )
    .context("Failed to weld prop mesh")
}

struct DemoObjects {
    light_bulb: ObjectId,
    prop: ObjectId,
    axis: ObjectId,
    ground: ObjectId,
}

impl DemoObjects {
    fn create(scene: &mut RenderScene<WgpuBackend>) -> anyhow::Result<Self> {
        let light_bulb = scene
            .create_object(&MeshData::cube(0.5), LIGHT_POSITIONS.len() as u32)
            .context("Failed to create light bulb")?;
        let prop = scene
            .create_object(&prop_mesh()?, 1)
            .context("Failed to create prop")?;
        let axis = scene
            .create_object(&MeshData::axis_gizmo(100.0), 3)
            .context("Failed to create axis gizmo")?;
        let ground = scene
            .create_object(&MeshData::ground_quad(20.0), 1)
            .context("Failed to create ground")?;

        Ok(Self {
            light_bulb,
            prop,
            axis,
            ground,
        })
    }

    /// Destroys in creation order, so every destruction but the last relocates survivors.
    fn destroy(self, scene: &mut RenderScene<WgpuBackend>) -> anyhow::Result<()> {
        for id in [self.light_bulb, self.prop, self.axis, self.ground] {
            scene
                .destroy_object(id)
                .with_context(|| format!("Failed to destroy {:?}", id))?;
        }

        Ok(())
    }
}

pub async fn run(config: DemoConfig) -> anyhow::Result<()> {
    let gpu = request_headless_device().await?;

    let target = OffscreenTarget::new(&gpu.device, config.width, config.height);
    let backend = WgpuBackend::new(
        &gpu.device,
        &gpu.queue,
        &config.render,
        OffscreenTarget::COLOR_FORMAT,
    );
    let mut scene = RenderScene::new(backend, &config.render);

    let camera = Camera {
        position: Vec3::new(-8.0, 10.0, -10.0),
        rotation: Rotation::new(40.0, 40.0, 0.0),
        projection: Projection::Perspective {
            fov_y_degrees: 80.0,
        },
        aspect_ratio: config.width as f32 / config.height as f32,
        near: 1.0,
        far: 100.0,
    };

    let objects = DemoObjects::create(&mut scene)?;

    scene.begin_frame_selection();
    let prop_placement =
        Placement::at(Vec3::new(-9.0, 0.0, 0.0)).with_rotation(Rotation::new(0.0, -90.0, 180.0));
    scene.select_state(objects.prop, 0, &InstanceState::new(&camera, &prop_placement))?;
    let ground_placement = Placement::at(Vec3::new(0.0, -3.0, 0.0));
    scene.select_state(objects.ground, 0, &InstanceState::new(&camera, &ground_placement))?;
    render_frame(&mut scene, &gpu, &target, Some(config.clear_color))?;

    scene.backend_mut().set_wireframe(true);
    scene.begin_frame_selection();
    for (instance, position) in LIGHT_POSITIONS.iter().enumerate() {
        let placement = Placement::at(*position).with_scale(Vec3::splat(2.5));
        scene.select_state(
            objects.light_bulb,
            instance as u32,
            &InstanceState::new(&camera, &placement),
        )?;
    }
    render_frame(&mut scene, &gpu, &target, None)?;
    scene.backend_mut().set_wireframe(false);

    scene.begin_frame_selection();
    let axis_positions = [LIGHT_POSITIONS[0], LIGHT_POSITIONS[1], Vec3::new(0.0, 0.0, 5.0)];
    for (instance, position) in axis_positions.iter().enumerate() {
        scene.select_state(
            objects.axis,
            instance as u32,
            &InstanceState::new(&camera, &Placement::at(*position)),
        )?;
    }
    render_frame(&mut scene, &gpu, &target, None)?;

    target.save_png(&gpu.device, &gpu.queue, &config.output_path)?;

    objects.destroy(&mut scene)?;
    log::info!(
        "Demo finished, {} instance states still live",
        scene.backend().live_instance_states()
    );

    Ok(())
}

fn render_frame(
    scene: &mut RenderScene<WgpuBackend>,
    gpu: &GpuContext,
    target: &OffscreenTarget,
    clear: Option<wgpu::Color>,
) -> anyhow::Result<FrameStats> {
    let stats = scene
        .assemble_and_draw()
        .context("Failed to assemble frame")?;

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame encoder"),
        });

    {
        let mut render_pass = target.begin_pass(&mut encoder, clear);
        scene.backend_mut().encode(&mut render_pass);
    }

    gpu.queue.submit(Some(encoder.finish()));

    log::info!(
        "Rendered frame: {} objects in {} draw calls",
        stats.objects,
        stats.draw_calls
    );

    Ok(stats)
}
