use async_trait::async_trait;
use config::AttributeCollection;

use crate::{Error, Result, context::ActionContext, registry::Action};

/// Switches to page `name`, or `relative` entries back in the history.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct PageAction;

#[async_trait]
impl Action for PageAction {
    async fn execute(&self, cx: &ActionContext, attrs: &AttributeCollection) -> Result<()> {
        if let Some(n) = attrs.relative {
            return cx.engine().go_back(n).await;
        }
        match attrs.name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => cx.engine().toggle_page(name).await,
            None => Err(Error::missing("page", "name")),
        }
    }
}
