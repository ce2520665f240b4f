use arbor_core::Result;
use serde::Deserialize;

use super::{Elements, invalid, parse_json};
use crate::params::{ResElem, ResParam, TexParam};
use crate::types::{ResFlags, TextureFormat};

#[derive(Debug, Deserialize)]
struct TextureDesc {
    #[serde(default)]
    format: TextureFormat,
    width: u32,
    height: u32,
    /// Pixel data per slice. Missing data is zero-filled.
    #[serde(default)]
    images: Vec<Vec<u8>>,
}

/// Texture map. Each slice stores its base image; a cubemap has six slices.
#[derive(Debug, Clone, Default)]
pub struct TextureData {
    pub(crate) format: TextureFormat,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) images: Vec<Vec<u8>>,
}

impl TextureData {
    /// Creates a zero-filled texture.
    #[must_use]
    pub fn blank(format: TextureFormat, width: u32, height: u32, flags: ResFlags) -> Self {
        let slices = Self::slice_count_for(flags);
        Self {
            format,
            width,
            height,
            images: vec![vec![0; format.image_size(width, height)]; slices],
        }
    }

    fn slice_count_for(flags: ResFlags) -> usize {
        if flags.contains(ResFlags::TEX_CUBEMAP) { 6 } else { 1 }
    }

    pub(crate) fn parse(name: &str, flags: ResFlags, bytes: &[u8]) -> Result<Self> {
        let desc: TextureDesc = parse_json(name, bytes)?;
        if desc.format == TextureFormat::Unknown {
            return Err(invalid(name, "unknown texture format"));
        }
        if desc.width == 0 || desc.height == 0 {
            return Err(invalid(name, "texture dimensions must be positive"));
        }

        let mut texture = Self::blank(desc.format, desc.width, desc.height, flags);
        if !desc.images.is_empty() {
            if desc.images.len() != texture.images.len() {
                return Err(invalid(
                    name,
                    format!("expected {} slices, got {}", texture.images.len(), desc.images.len()),
                ));
            }
            let expected = desc.format.image_size(desc.width, desc.height);
            if let Some(bad) = desc.images.iter().find(|img| img.len() != expected) {
                return Err(invalid(name, format!("image has {} bytes, expected {expected}", bad.len())));
            }
            texture.images = desc.images;
        }
        Ok(texture)
    }

    #[must_use]
    pub fn format(&self) -> TextureFormat {
        self.format
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn slice_count(&self) -> usize {
        self.images.len()
    }

    /// Estimated memory footprint in bytes.
    #[must_use]
    pub fn memory_size(&self) -> usize {
        self.images.iter().map(Vec::len).sum()
    }
}

impl Elements for TextureData {
    fn elem_count(&self, elem: ResElem) -> usize {
        match elem {
            ResElem::Texture => 1,
            ResElem::TexImage => self.images.len(),
            _ => 0,
        }
    }

    fn get_int(&self, _elem: ResElem, _index: usize, param: ResParam) -> i32 {
        match param {
            ResParam::Tex(TexParam::Format) => self.format as i32,
            ResParam::Tex(TexParam::SliceCount) => self.images.len() as i32,
            ResParam::Tex(TexParam::ImageWidth) => self.width as i32,
            ResParam::Tex(TexParam::ImageHeight) => self.height as i32,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cubemap_has_six_slices() {
        let data = r#"{"format": "BGRA8", "width": 2, "height": 2}"#;
        let tex = TextureData::parse("sky", ResFlags::TEX_CUBEMAP, data.as_bytes()).unwrap();
        assert_eq!(tex.slice_count(), 6);
        assert_eq!(tex.memory_size(), 6 * 16);
    }

    #[test]
    fn test_pixel_size_checked() {
        let data = r#"{"format": "BGRA8", "width": 1, "height": 1, "images": [[1, 2, 3]]}"#;
        assert!(TextureData::parse("bad", ResFlags::empty(), data.as_bytes()).is_err());
    }
}
