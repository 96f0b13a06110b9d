//! Emulate key presses.

use async_trait::async_trait;
use config::AttributeCollection;
use tracing::warn;

use crate::{Error, Result, context::ActionContext, deps::Keyboard, registry::Action};

/// Presses `keys` in order, `delay` apart, while holding the configured
/// modifiers. Modifiers are always released, in reverse order.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct KeyPressAction;

/// Modifier key names requested by `attrs`, in press order.
fn modifiers(attrs: &AttributeCollection) -> Vec<&'static str> {
    [
        (attrs.mod_shift, "shift"),
        (attrs.mod_alt, "alt"),
        (attrs.mod_ctrl, "ctrl"),
    ]
    .into_iter()
    .filter_map(|(on, name)| on.then_some(name))
    .collect()
}

/// Hold the modifiers and press the keys; `held` collects pressed modifiers.
async fn press_all(
    kb: &dyn Keyboard,
    attrs: &AttributeCollection,
    keys: &[String],
    held: &mut Vec<&'static str>,
) -> Result<()> {
    for m in modifiers(attrs) {
        kb.key_down(m).await?;
        held.push(m);
    }
    let delay = attrs.delay.unwrap_or_default();
    for (i, key) in keys.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        kb.key_press(key).await?;
    }
    Ok(())
}

#[async_trait]
impl Action for KeyPressAction {
    async fn execute(&self, cx: &ActionContext, attrs: &AttributeCollection) -> Result<()> {
        let keys = attrs
            .keys
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::missing("key_press", "keys"))?;
        let kb = cx.services().keyboard.clone();
        let mut held = Vec::new();
        let res = press_all(kb.as_ref(), attrs, keys, &mut held).await;
        for m in held.into_iter().rev() {
            if let Err(e) = kb.key_up(m).await {
                warn!(modifier = m, error = %e, "modifier_release_failed");
            }
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeKeyboard, action_context_with};

    #[tokio::test(flavor = "multi_thread")]
    async fn modifiers_wrap_the_keys() {
        let kb = FakeKeyboard::new();
        let cx = action_context_with(kb.clone());
        let attrs = AttributeCollection {
            keys: Some(vec!["a".into(), "b".into()]),
            mod_shift: true,
            mod_ctrl: true,
            ..Default::default()
        };
        KeyPressAction.execute(&cx, &attrs).await.unwrap();
        assert_eq!(
            kb.log(),
            vec!["down shift", "down ctrl", "press a", "press b", "up ctrl", "up shift"]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failures_still_release_modifiers() {
        let kb = FakeKeyboard::new();
        let cx = action_context_with(kb.clone());
        let attrs = AttributeCollection {
            keys: Some(vec!["a".into(), "bad".into(), "c".into()]),
            mod_alt: true,
            ..Default::default()
        };
        assert!(matches!(
            KeyPressAction.execute(&cx, &attrs).await,
            Err(Error::Keyboard(_))
        ));
        assert_eq!(kb.log(), vec!["down alt", "press a", "up alt"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn keys_are_required() {
        let cx = action_context_with(FakeKeyboard::new());
        assert!(matches!(
            KeyPressAction.execute(&cx, &AttributeCollection::default()).await,
            Err(Error::MissingAttribute { attribute: "keys", .. })
        ));
    }
}
