use async_trait::async_trait;
use config::AttributeCollection;

use crate::{Error, Result, context::DisplayContext, registry::DisplayElement};

/// Color shown on keys whose display element failed.
pub const ERROR_COLOR: [u8; 4] = [0xff, 0x00, 0x00, 0xff];

/// Fills a key with one color: named `color`, else `rgba`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ColorDisplay;

#[async_trait]
impl DisplayElement for ColorDisplay {
    async fn display(&self, cx: &DisplayContext, idx: usize, attrs: &AttributeCollection) -> Result<()> {
        let named = attrs
            .named_color()
            .map_err(|e| Error::invalid("color", "color", e))?;
        let rgba = match named {
            Some(c) => c,
            None => attrs
                .rgba_color()
                .map_err(|e| Error::invalid("color", "rgba", e))?
                .ok_or_else(|| Error::missing("color", "color"))?,
        };
        cx.fill_color(idx, rgba).await
    }
}

/// Paint [`ERROR_COLOR`] on key `idx`, bypassing the registry.
pub(crate) async fn show_error(cx: &DisplayContext, idx: usize) -> Result<()> {
    let attrs = AttributeCollection {
        rgba: Some(ERROR_COLOR.to_vec()),
        ..Default::default()
    };
    ColorDisplay.display(cx, idx, &attrs).await
}
