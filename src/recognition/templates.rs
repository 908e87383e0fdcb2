//! Template image storage
//!
//! Every widget references its reference image through a [`TemplateId`]. The
//! identifier is a bare file name; anything that could escape the storage
//! directory is rejected at construction.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{Image, Rect};
use crate::{Error, Result};

/// File extension of stored templates
pub const TEMPLATE_EXTENSION: &str = "png";

/// Identifier of a stored template image
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateId(String);

impl TemplateId {
    /// Validate and wrap a template name
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::Template("template name is empty".to_string()));
        }
        if name.contains("..") || name.contains('/') || name.contains('\\') {
            return Err(Error::Template(format!(
                "template name must not contain path components: {name}"
            )));
        }
        Ok(Self(name))
    }

    /// Fresh identifier: millisecond timestamp plus a short random suffix
    pub fn generate() -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{}-{}.{}", millis, &suffix[..8], TEMPLATE_EXTENSION))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Load, save and delete template images
pub trait TemplateStore {
    /// Load a template; `Ok(None)` when it does not exist
    fn load(&self, id: &TemplateId) -> Result<Option<Image>>;

    /// Store an image under a freshly generated identifier
    fn save(&mut self, image: &Image) -> Result<TemplateId>;

    /// Remove a template; `Ok(false)` when there was nothing to remove
    fn delete(&mut self, id: &TemplateId) -> Result<bool>;
}

/// PNG files in a single directory
#[derive(Debug, Clone)]
pub struct DirTemplateStore {
    root: PathBuf,
}

impl DirTemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, id: &TemplateId) -> PathBuf {
        self.root.join(id.as_str())
    }
}

impl TemplateStore for DirTemplateStore {
    fn load(&self, id: &TemplateId) -> Result<Option<Image>> {
        let path = self.path_of(id);
        if !path.exists() {
            return Ok(None);
        }
        let image = image::open(&path)?.to_rgba8();
        Ok(Some(image))
    }

    fn save(&mut self, image: &Image) -> Result<TemplateId> {
        fs::create_dir_all(&self.root)?;
        let id = TemplateId::generate();
        let path = self.path_of(&id);
        image.save_with_format(&path, image::ImageFormat::Png)?;
        debug!(path = %path.display(), "Saved template");
        Ok(id)
    }

    fn delete(&mut self, id: &TemplateId) -> Result<bool> {
        match fs::remove_file(self.path_of(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(template = %id, "Template file already gone");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store, used for dry runs and tests
#[derive(Debug, Default, Clone)]
pub struct MemoryTemplateStore {
    images: HashMap<TemplateId, Image>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an image under a caller-chosen identifier
    pub fn insert(&mut self, id: TemplateId, image: Image) {
        self.images.insert(id, image);
    }

    pub fn contains(&self, id: &TemplateId) -> bool {
        self.images.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl TemplateStore for MemoryTemplateStore {
    fn load(&self, id: &TemplateId) -> Result<Option<Image>> {
        Ok(self.images.get(id).cloned())
    }

    fn save(&mut self, image: &Image) -> Result<TemplateId> {
        let id = TemplateId::generate();
        self.images.insert(id.clone(), image.clone());
        Ok(id)
    }

    fn delete(&mut self, id: &TemplateId) -> Result<bool> {
        Ok(self.images.remove(id).is_some())
    }
}

/// Cut `rect` out of `image`, clipped to the image bounds.
///
/// Returns `None` when nothing of the rectangle lies inside the image.
pub fn subimage(image: &Image, rect: Rect) -> Option<Image> {
    let left = i64::from(rect.x).max(0);
    let top = i64::from(rect.y).max(0);
    let right = (i64::from(rect.x) + i64::from(rect.width)).min(i64::from(image.width()));
    let bottom = (i64::from(rect.y) + i64::from(rect.height)).min(i64::from(image.height()));

    if right <= left || bottom <= top {
        return None;
    }

    let view = image::imageops::crop_imm(
        image,
        left as u32,
        top as u32,
        (right - left) as u32,
        (bottom - top) as u32,
    );
    Some(view.to_image())
}
