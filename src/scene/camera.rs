use cgmath::{Deg, Matrix4, Point3, SquareMatrix, Vector3};

use crate::scene::object::SceneObject;

/// Maps OpenGL clip space depth (`-1..1`) to wgpu's `0..1`.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Projection {
    Orthographic {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    },
    Perspective {
        /// Vertical field of view in degrees.
        fovy: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
}

impl Projection {
    /// The projection in wgpu clip space.
    pub fn matrix(&self) -> Matrix4<f32> {
        let raw = match *self {
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
                near,
                far,
            } => cgmath::ortho(left, right, bottom, top, near, far),
            Projection::Perspective {
                fovy,
                aspect,
                near,
                far,
            } => cgmath::perspective(Deg(fovy), aspect, near, far),
        };
        OPENGL_TO_WGPU_MATRIX * raw
    }
}

/// The viewer of a scene.
///
/// A camera is not part of the scene tree. Its world transform is its own
/// `matrix`, composed with the world transform of `parent` when it follows a
/// scene object.
#[derive(Clone, Debug)]
pub struct Camera {
    pub projection: Projection,
    pub matrix: Matrix4<f32>,
    pub parent: Option<SceneObject>,
    model_matrix: Matrix4<f32>,
    view_matrix: Matrix4<f32>,
    projection_view_inverse: Matrix4<f32>,
}

impl Camera {
    pub fn new(projection: Projection) -> Self {
        let mut camera = Self {
            projection,
            matrix: Matrix4::identity(),
            parent: None,
            model_matrix: Matrix4::identity(),
            view_matrix: Matrix4::identity(),
            projection_view_inverse: Matrix4::identity(),
        };
        camera.update();
        camera
    }

    pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        Self::new(Projection::Orthographic {
            left,
            right,
            bottom,
            top,
            near,
            far,
        })
    }

    pub fn perspective(fovy: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self::new(Projection::Perspective {
            fovy,
            aspect,
            near,
            far,
        })
    }

    /// Places the camera at `eye` looking at `target`.
    pub fn look_at(&mut self, eye: Point3<f32>, target: Point3<f32>, up: Vector3<f32>) {
        self.matrix = look_at(eye, target, up)
            .invert()
            .unwrap_or_else(Matrix4::identity);
        self.update();
    }

    /// Recomputes the derived matrices from the current transform and parent.
    pub fn update(&mut self) {
        self.model_matrix = match &self.parent {
            Some(parent) => parent.model_matrix() * self.matrix,
            None => self.matrix,
        };
        self.view_matrix = self
            .model_matrix
            .invert()
            .unwrap_or_else(Matrix4::identity);
        self.projection_view_inverse = (self.projection_matrix() * self.view_matrix)
            .invert()
            .unwrap_or_else(Matrix4::identity);
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        self.projection.matrix()
    }

    pub fn model_matrix(&self) -> Matrix4<f32> {
        self.model_matrix
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        self.view_matrix
    }

    /// Inverse of projection times view, for reconstructing world positions
    /// from depth.
    pub fn projection_view_inverse(&self) -> Matrix4<f32> {
        self.projection_view_inverse
    }

    pub fn position(&self) -> Point3<f32> {
        Point3::new(
            self.model_matrix.w.x,
            self.model_matrix.w.y,
            self.model_matrix.w.z,
        )
    }
}

/// Right-handed view matrix looking from `eye` to `target`.
pub fn look_at(eye: Point3<f32>, target: Point3<f32>, up: Vector3<f32>) -> Matrix4<f32> {
    Matrix4::look_at_rh(eye, target, up)
}
