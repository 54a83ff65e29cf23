//! Nodes of the transform hierarchy.
//!
//! A [`SceneObject`] is a shared handle: clones refer to the same node. Children
//! are owned by their parent, the parent is held weakly, so dropping the last
//! handle of a root releases the whole subtree.

use std::{
    cell::{Ref, RefCell, RefMut},
    rc::{Rc, Weak},
};

use cgmath::{Matrix4, SquareMatrix};

use crate::{
    error::{Error, Result},
    scene::{
        lights::{AmbientLight, DirectionalLight, PointLight},
        mesh::Mesh,
    },
};

/// What a node is. Traversal buckets nodes by this tag.
pub enum ObjectKind {
    Other,
    Mesh(Mesh),
    AmbientLight(AmbientLight),
    DirectionalLight(DirectionalLight),
    PointLight(PointLight),
}

impl ObjectKind {
    pub fn name(&self) -> &'static str {
        match self {
            ObjectKind::Other => "other",
            ObjectKind::Mesh(_) => "mesh",
            ObjectKind::AmbientLight(_) => "ambient light",
            ObjectKind::DirectionalLight(_) => "directional light",
            ObjectKind::PointLight(_) => "point light",
        }
    }
}

pub struct SceneObjectData {
    pub kind: ObjectKind,
    pub visible: bool,
    /// Local transform relative to the parent.
    pub matrix: Matrix4<f32>,
    model_matrix: Matrix4<f32>,
    model_view_matrix: Matrix4<f32>,
    normal_matrix: Matrix4<f32>,
    parent: Weak<RefCell<SceneObjectData>>,
    children: Vec<SceneObject>,
}

#[derive(Clone)]
pub struct SceneObject(Rc<RefCell<SceneObjectData>>);

impl SceneObject {
    pub fn new(kind: ObjectKind) -> Self {
        Self(Rc::new(RefCell::new(SceneObjectData {
            kind,
            visible: true,
            matrix: Matrix4::identity(),
            model_matrix: Matrix4::identity(),
            model_view_matrix: Matrix4::identity(),
            normal_matrix: Matrix4::identity(),
            parent: Weak::new(),
            children: Vec::new(),
        })))
    }

    /// A node without content, used to group children.
    pub fn group() -> Self {
        Self::new(ObjectKind::Other)
    }

    pub fn mesh(mesh: Mesh) -> Self {
        Self::new(ObjectKind::Mesh(mesh))
    }

    pub fn ambient_light(light: AmbientLight) -> Self {
        Self::new(ObjectKind::AmbientLight(light))
    }

    pub fn directional_light(light: DirectionalLight) -> Self {
        Self::new(ObjectKind::DirectionalLight(light))
    }

    pub fn point_light(light: PointLight) -> Self {
        Self::new(ObjectKind::PointLight(light))
    }

    pub fn borrow(&self) -> Ref<'_, SceneObjectData> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, SceneObjectData> {
        self.0.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &SceneObject) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn kind(&self) -> Ref<'_, ObjectKind> {
        Ref::map(self.0.borrow(), |data| &data.kind)
    }

    pub fn kind_mut(&self) -> RefMut<'_, ObjectKind> {
        RefMut::map(self.0.borrow_mut(), |data| &mut data.kind)
    }

    pub fn visible(&self) -> bool {
        self.0.borrow().visible
    }

    pub fn set_visible(&self, visible: bool) {
        self.0.borrow_mut().visible = visible;
    }

    pub fn matrix(&self) -> Matrix4<f32> {
        self.0.borrow().matrix
    }

    pub fn set_matrix(&self, matrix: Matrix4<f32>) {
        self.0.borrow_mut().matrix = matrix;
    }

    /// World transform as of the last scene update.
    pub fn model_matrix(&self) -> Matrix4<f32> {
        self.0.borrow().model_matrix
    }

    /// Camera-relative transform as of the last scene update. Meshes only.
    pub fn model_view_matrix(&self) -> Matrix4<f32> {
        self.0.borrow().model_view_matrix
    }

    /// Inverse transpose of the world transform. Meshes only.
    pub fn normal_matrix(&self) -> Matrix4<f32> {
        self.0.borrow().normal_matrix
    }

    pub fn parent(&self) -> Option<SceneObject> {
        self.0.borrow().parent.upgrade().map(SceneObject)
    }

    pub fn children(&self) -> Vec<SceneObject> {
        self.0.borrow().children.clone()
    }

    fn is_ancestor_or_self(&self, other: &SceneObject) -> bool {
        let mut current = Some(self.clone());
        while let Some(node) = current {
            if node.ptr_eq(other) {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// Appends `child`, detaching it from its previous parent first.
    ///
    /// Adding a node to itself or to one of its descendants is a configuration
    /// error.
    pub fn add(&self, child: &SceneObject) -> Result<()> {
        if self.is_ancestor_or_self(child) {
            return Err(Error::configuration(format!(
                "cannot add a {} below itself",
                child.kind().name()
            )));
        }
        if let Some(previous) = child.parent() {
            previous.remove(child);
        }
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        self.0.borrow_mut().children.push(child.clone());
        Ok(())
    }

    /// Detaches `child`. Returns whether it was a child of this node.
    pub fn remove(&self, child: &SceneObject) -> bool {
        let mut data = self.0.borrow_mut();
        match data.children.iter().position(|c| c.ptr_eq(child)) {
            Some(index) => {
                let removed = data.children.remove(index);
                removed.0.borrow_mut().parent = Weak::new();
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        let children = std::mem::take(&mut self.0.borrow_mut().children);
        for child in children {
            child.0.borrow_mut().parent = Weak::new();
        }
    }

    /// Depth-first, pre-order visit of this node and all descendants.
    pub fn for_each(&self, callback: &mut dyn FnMut(&SceneObject)) {
        callback(self);
        for child in self.children() {
            child.for_each(callback);
        }
    }

    /// Like [`SceneObject::for_each`], skipping invisible subtrees.
    pub fn for_each_visible(&self, callback: &mut dyn FnMut(&SceneObject)) {
        if !self.visible() {
            return;
        }
        callback(self);
        for child in self.children() {
            child.for_each_visible(callback);
        }
    }

    /// Recomputes world transforms of the visible subtree and visits each node.
    ///
    /// `parent_model` is the world transform this node is attached under,
    /// identity for roots.
    pub fn update_world(&self, parent_model: Matrix4<f32>, callback: &mut dyn FnMut(&SceneObject)) {
        let model = {
            let mut data = self.0.borrow_mut();
            if !data.visible {
                return;
            }
            data.model_matrix = parent_model * data.matrix;
            data.model_matrix
        };
        callback(self);
        for child in self.children() {
            child.update_world(model, callback);
        }
    }

    /// Derives the camera-relative and normal matrices from the world transform.
    pub(crate) fn update_view(&self, view: &Matrix4<f32>) {
        let mut data = self.0.borrow_mut();
        data.model_view_matrix = view * data.model_matrix;
        data.normal_matrix = data
            .model_matrix
            .invert()
            .map(|inverse| cgmath::Matrix::transpose(&inverse))
            .unwrap_or_else(Matrix4::identity);
    }
}

impl std::fmt::Debug for SceneObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.0.borrow();
        f.debug_struct("SceneObject")
            .field("kind", &data.kind.name())
            .field("visible", &data.visible)
            .field("children", &data.children.len())
            .finish()
    }
}
