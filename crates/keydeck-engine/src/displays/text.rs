use async_trait::async_trait;
use config::AttributeCollection;

use super::TextFace;
use crate::{Result, context::DisplayContext, registry::DisplayElement};

/// Static text and caption, optionally over a background `image`.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TextDisplay;

#[async_trait]
impl DisplayElement for TextDisplay {
    async fn display(&self, cx: &DisplayContext, idx: usize, attrs: &AttributeCollection) -> Result<()> {
        let face = TextFace::from_attrs("text", attrs)?;
        if cx.is_cancelled() {
            return Ok(());
        }
        let img = face.render(cx).await?;
        cx.fill_image(idx, &img).await
    }
}
