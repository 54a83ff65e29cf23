use std::{cell::Cell, collections::BTreeMap};

use crate::data_structures::{ResourceId, texture::RenderTexture};

/// Attachment point of a frame buffer. Colors sort before depth.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attachment {
    Color(u32),
    Depth,
}

/// Describes a set of render textures drawn into together.
///
/// `draw_buffers` restricts which color attachments are written; `None`
/// writes all of them.
#[derive(Debug)]
pub struct FrameBuffer {
    id: ResourceId,
    attachments: BTreeMap<Attachment, RenderTexture>,
    draw_buffers: Option<Vec<Attachment>>,
    needs_update: Cell<bool>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            id: ResourceId::next(),
            attachments: BTreeMap::new(),
            draw_buffers: None,
            needs_update: Cell::new(true),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment, texture: RenderTexture) -> Self {
        self.set_attachment(attachment, texture);
        self
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn set_attachment(&mut self, attachment: Attachment, texture: RenderTexture) {
        self.attachments.insert(attachment, texture);
        self.needs_update.set(true);
    }

    pub fn remove_attachment(&mut self, attachment: Attachment) -> Option<RenderTexture> {
        self.needs_update.set(true);
        self.attachments.remove(&attachment)
    }

    pub fn attachments(&self) -> impl Iterator<Item = (Attachment, &RenderTexture)> {
        self.attachments.iter().map(|(a, t)| (*a, t))
    }

    pub fn attachment(&self, attachment: Attachment) -> Option<&RenderTexture> {
        self.attachments.get(&attachment)
    }

    pub fn set_draw_buffers(&mut self, draw_buffers: Option<Vec<Attachment>>) {
        self.draw_buffers = draw_buffers;
        self.needs_update.set(true);
    }

    /// Color attachment points that are written, in attachment order.
    pub fn active_color_attachments(&self) -> Vec<u32> {
        let mut active: Vec<u32> = match &self.draw_buffers {
            Some(draw_buffers) => draw_buffers
                .iter()
                .filter_map(|a| match a {
                    Attachment::Color(n) if self.attachments.contains_key(a) => Some(*n),
                    _ => None,
                })
                .collect(),
            None => self
                .attachments
                .keys()
                .filter_map(|a| match a {
                    Attachment::Color(n) => Some(*n),
                    Attachment::Depth => None,
                })
                .collect(),
        };
        active.sort_unstable();
        active.dedup();
        active
    }

    pub fn needs_update(&self) -> bool {
        self.needs_update.get()
    }

    pub fn set_needs_update(&self, value: bool) {
        self.needs_update.set(value);
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
