use cgmath::Vector3;

use crate::data_structures::color::Color;

/// Uniform light reaching every surface regardless of orientation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AmbientLight {
    pub color: Color,
    pub intensity: f32,
}

impl AmbientLight {
    pub fn new(color: Color, intensity: f32) -> Self {
        Self { color, intensity }
    }
}

impl Default for AmbientLight {
    fn default() -> Self {
        Self::new(Color::WHITE, 1.0)
    }
}

/// Parallel light. `direction` points from the scene towards the light and is
/// rotated by the node's world transform.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DirectionalLight {
    pub color: Color,
    pub intensity: f32,
    pub direction: Vector3<f32>,
    pub enable_shadows: bool,
}

impl DirectionalLight {
    pub fn new(color: Color, intensity: f32, direction: Vector3<f32>) -> Self {
        Self {
            color,
            intensity,
            direction,
            enable_shadows: true,
        }
    }

    pub fn with_shadows(mut self, enable_shadows: bool) -> Self {
        self.enable_shadows = enable_shadows;
        self
    }
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self::new(Color::WHITE, 1.0, Vector3::new(0.0, 0.0, 1.0))
    }
}

/// Light emitted from the node's world position, falling off with
/// `1 / distance^decay`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PointLight {
    pub color: Color,
    pub intensity: f32,
    pub decay: f32,
}

impl PointLight {
    pub fn new(color: Color, intensity: f32, decay: f32) -> Self {
        Self {
            color,
            intensity,
            decay,
        }
    }
}

impl Default for PointLight {
    fn default() -> Self {
        Self::new(Color::WHITE, 1.0, 2.0)
    }
}
