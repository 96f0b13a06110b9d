use std::path::PathBuf;

use async_trait::async_trait;
use config::AttributeCollection;
use tracing::trace;

use super::{blocking, load_image};
use crate::{Error, Result, context::DisplayContext, registry::DisplayElement, render::auto_size};

/// Image from a local `path`, or from a `url` fetched through the image cache.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ImageDisplay;

/// Non-empty value of an optional attribute.
fn non_empty(v: Option<&String>) -> Option<&str> {
    v.map(String::as_str).filter(|s| !s.is_empty())
}

#[async_trait]
impl DisplayElement for ImageDisplay {
    async fn display(&self, cx: &DisplayContext, idx: usize, attrs: &AttributeCollection) -> Result<()> {
        let path = match (non_empty(attrs.path.as_ref()), non_empty(attrs.url.as_ref())) {
            (Some(p), _) => PathBuf::from(p),
            (None, Some(url)) => cx.services().images.fetch(url).await?,
            (None, None) => return Err(Error::missing("image", "path")),
        };
        trace!(key = idx, path = %path.display(), "image_load");
        let size = cx.icon_size();
        let img = blocking(move || load_image(&path).map(|i| auto_size(&i, size))).await?;
        cx.fill_image(idx, &img).await
    }
}
