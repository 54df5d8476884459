use glam::{EulerRot, Mat4, Quat, Vec3};

/// Euler angles in degrees. Applied roll first, then pitch, then yaw.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rotation {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl Rotation {
    pub const ZERO: Rotation = Rotation {
        pitch: 0.0,
        yaw: 0.0,
        roll: 0.0,
    };

    pub fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }

    pub fn to_quat(self) -> Quat {
        Quat::from_euler(
            EulerRot::YXZ,
            self.yaw.to_radians(),
            self.pitch.to_radians(),
            self.roll.to_radians(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective { fov_y_degrees: f32 },
    /// View volume `height` units tall, width following the aspect ratio.
    Orthographic { height: f32 },
}

#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub rotation: Rotation,
    pub projection: Projection,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation.to_quat(), self.position).inverse()
    }

    pub fn projection_matrix(&self) -> Mat4 {
        match self.projection {
            Projection::Perspective { fov_y_degrees } => Mat4::perspective_lh(
                fov_y_degrees.to_radians(),
                self.aspect_ratio,
                self.near,
                self.far,
            ),
            Projection::Orthographic { height } => {
                let half_height = height / 2.0;
                let half_width = half_height * self.aspect_ratio;
                Mat4::orthographic_lh(
                    -half_width,
                    half_width,
                    -half_height,
                    half_height,
                    self.near,
                    self.far,
                )
            }
        }
    }

    pub fn get_vp_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Direction the camera looks along.
    pub fn forward(&self) -> Vec3 {
        self.rotation.to_quat() * Vec3::Z
    }
}

/// Where one instance of an object sits in the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub position: Vec3,
    pub rotation: Rotation,
    pub scale: Vec3,
}

impl Placement {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: Rotation::ZERO,
            scale: Vec3::ONE,
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation.to_quat(), self.position)
    }
}

/// Per-instance uniform block read by `instanced.wgsl`.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable, Default)]
pub struct InstanceState {
    pub world: Mat4,
    pub view_proj: Mat4,
}

impl InstanceState {
    pub fn new(camera: &Camera, placement: &Placement) -> Self {
        Self {
            world: placement.world_matrix(),
            view_proj: camera.get_vp_matrix(),
        }
    }
}
