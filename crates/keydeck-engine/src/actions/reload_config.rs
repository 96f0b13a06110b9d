use async_trait::async_trait;
use config::AttributeCollection;

use crate::{Result, context::ActionContext, registry::Action};

/// Reloads the configuration from its source.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ReloadConfigAction;

#[async_trait]
impl Action for ReloadConfigAction {
    async fn execute(&self, cx: &ActionContext, _attrs: &AttributeCollection) -> Result<()> {
        cx.engine().reload_config().await
    }
}
