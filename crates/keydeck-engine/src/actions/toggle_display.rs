use async_trait::async_trait;
use config::AttributeCollection;

use crate::{Result, context::ActionContext, registry::Action};

/// Switches the panel off, or back on at its previous brightness.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ToggleDisplayAction;

#[async_trait]
impl Action for ToggleDisplayAction {
    async fn execute(&self, cx: &ActionContext, _attrs: &AttributeCollection) -> Result<()> {
        cx.engine().toggle_display().await
    }
}
