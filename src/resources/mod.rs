//! Asset loading.
//!
//! Natively assets are read from `./assets`; on wasm they are fetched relative
//! to `<origin>/assets/`. Every failure to fetch or decode is a
//! [`Error::Load`](crate::error::Error::Load).

pub mod geometry;

pub use geometry::{build_box_geometry, build_plane_geometry, parse_obj_geometry};

use crate::{
    data_structures::{
        geometry::Geometry,
        texture::Texture,
    },
    error::{Error, Result},
};

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> Result<reqwest::Url> {
    let origin = web_sys::window()
        .and_then(|window| window.location().origin().ok())
        .ok_or_else(|| Error::load(file_name, "no window origin"))?;
    let base = reqwest::Url::parse(&format!("{}/assets/", origin))
        .map_err(|e| Error::load(file_name, e))?;
    base.join(file_name).map_err(|e| Error::load(file_name, e))
}

pub async fn load_string(file_name: &str) -> Result<String> {
    #[cfg(target_arch = "wasm32")]
    let txt = {
        let url = format_url(file_name)?;
        reqwest::get(url)
            .await
            .map_err(|e| Error::load(file_name, e))?
            .text()
            .await
            .map_err(|e| Error::load(file_name, e))?
    };
    #[cfg(not(target_arch = "wasm32"))]
    let txt = {
        let path = std::path::Path::new("./").join("assets").join(file_name);
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::load(file_name, e))?
    };

    Ok(txt)
}

pub async fn load_binary(file_name: &str) -> Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(file_name)?;
        reqwest::get(url)
            .await
            .map_err(|e| Error::load(file_name, e))?
            .bytes()
            .await
            .map_err(|e| Error::load(file_name, e))?
            .to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        let path = std::path::Path::new("./").join("assets").join(file_name);
        tokio::fs::read(path)
            .await
            .map_err(|e| Error::load(file_name, e))?
    };

    Ok(data)
}

/// Decodes an in-memory image into 8-bit RGBA.
pub fn decode_image(source_id: &str, bytes: &[u8]) -> Result<image::RgbaImage> {
    let image = image::load_from_memory(bytes).map_err(|e| Error::load(source_id, e))?;
    Ok(image.to_rgba8())
}

pub async fn load_image(file_name: &str) -> Result<image::RgbaImage> {
    let data = load_binary(file_name).await?;
    decode_image(file_name, &data)
}

/// Loads an image into a texture with default sampling parameters.
pub async fn load_texture(file_name: &str) -> Result<Texture> {
    let image = load_image(file_name).await?;
    log::debug!(
        "loaded texture {} ({}x{})",
        file_name,
        image.width(),
        image.height()
    );
    Ok(Texture::from_image(image))
}

pub async fn load_obj_geometry(file_name: &str) -> Result<Geometry> {
    let text = load_string(file_name).await?;
    parse_obj_geometry(file_name, &text).await
}
