use crate::{data_structures::color::Color, error::Result, scene::object::SceneObject};

/// Root of a scene tree plus the color the geometry pass clears to.
#[derive(Debug, Clone)]
pub struct Scene {
    pub clear_color: Color,
    root: SceneObject,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            clear_color: Color::BLACK,
            root: SceneObject::group(),
        }
    }

    pub fn root(&self) -> &SceneObject {
        &self.root
    }

    pub fn add(&self, object: &SceneObject) -> Result<()> {
        self.root.add(object)
    }

    pub fn remove(&self, object: &SceneObject) -> bool {
        self.root.remove(object)
    }

    pub fn clear(&self) {
        self.root.clear();
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}
