//! Type name to handler factory registry.
//!
//! Actions and display elements live in two independent namespaces. Every
//! lookup produces a fresh handler, so concurrent key presses never share
//! handler state.

use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use config::AttributeCollection;

use crate::{
    Result,
    context::{ActionContext, DisplayContext},
    error::{ElementKind, Error},
};

/// Behavior executed on a key press.
#[async_trait]
pub trait Action: Send + Sync {
    /// Run the action with its configured attributes.
    async fn execute(&self, cx: &ActionContext, attrs: &AttributeCollection) -> Result<()>;
}

/// One-shot renderer for a key face.
#[async_trait]
pub trait DisplayElement: Send + Sync {
    /// Render once onto key `idx`.
    ///
    /// Writes go through `cx`, which drops them once the page is gone; a
    /// render that observes cancellation returns `Ok(())`.
    async fn display(&self, cx: &DisplayContext, idx: usize, attrs: &AttributeCollection) -> Result<()>;
}

/// Display element that can keep its key up to date on its own.
#[async_trait]
pub trait RefreshingDisplayElement: DisplayElement {
    /// Whether these attributes ask for a refresh loop.
    fn needs_loop(&self, attrs: &AttributeCollection) -> bool;

    /// Start refreshing key `idx` until stopped or the page token is cancelled.
    async fn start_loop_display(
        &mut self,
        cx: &DisplayContext,
        idx: usize,
        attrs: &AttributeCollection,
    ) -> Result<()>;

    /// Stop the refresh loop.
    async fn stop_loop_display(&mut self) -> Result<()>;
}

/// A freshly constructed display handler.
pub enum DisplayHandler {
    /// Renders once per page activation.
    OneShot(Box<dyn DisplayElement>),
    /// May run a refresh loop, depending on its attributes.
    Refreshing(Box<dyn RefreshingDisplayElement>),
}

impl fmt::Debug for DisplayHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneShot(_) => f.write_str("DisplayHandler::OneShot"),
            Self::Refreshing(_) => f.write_str("DisplayHandler::Refreshing"),
        }
    }
}

/// Constructs a fresh action.
pub type ActionFactory = Arc<dyn Fn() -> Box<dyn Action> + Send + Sync>;

/// Constructs a fresh display handler.
pub type DisplayFactory = Arc<dyn Fn() -> DisplayHandler + Send + Sync>;

/// Registry of action and display element factories.
///
/// Filled during start-up, then shared read-only behind an `Arc`.
#[derive(Clone, Default)]
pub struct Registry {
    /// Action namespace.
    actions: HashMap<String, ActionFactory>,
    /// Display element namespace.
    displays: HashMap<String, DisplayFactory>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in action and display element.
    pub fn with_builtins() -> Self {
        let mut r = Self::new();
        crate::actions::register(&mut r);
        crate::displays::register(&mut r);
        r
    }

    /// Register an action factory. The last registration for a name wins.
    pub fn register_action<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Action> + Send + Sync + 'static,
    {
        self.actions.insert(name.into(), Arc::new(factory));
    }

    /// Register a display element factory. The last registration for a name wins.
    pub fn register_display_element<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> DisplayHandler + Send + Sync + 'static,
    {
        self.displays.insert(name.into(), Arc::new(factory));
    }

    /// Construct a fresh action for `name`.
    pub fn action(&self, name: &str) -> Result<Box<dyn Action>> {
        self.actions
            .get(name)
            .map(|f| f())
            .ok_or_else(|| Error::UnknownType {
                kind: ElementKind::Action,
                name: name.to_string(),
            })
    }

    /// Construct a fresh display handler for `name`.
    pub fn display_element(&self, name: &str) -> Result<DisplayHandler> {
        self.displays
            .get(name)
            .map(|f| f())
            .ok_or_else(|| Error::UnknownType {
                kind: ElementKind::Display,
                name: name.to_string(),
            })
    }

    /// Registered action names, sorted.
    pub fn action_names(&self) -> Vec<&str> {
        let mut v: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        v.sort_unstable();
        v
    }

    /// Registered display element names, sorted.
    pub fn display_names(&self) -> Vec<&str> {
        let mut v: Vec<&str> = self.displays.keys().map(String::as_str).collect();
        v.sort_unstable();
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::displays::ColorDisplay;

    /// Action that does nothing, tagged so tests can tell registrations apart.
    struct Tagged(&'static str);

    #[async_trait]
    impl Action for Tagged {
        async fn execute(&self, _cx: &ActionContext, _attrs: &AttributeCollection) -> Result<()> {
            Err(Error::Msg(self.0.to_string()))
        }
    }

    #[test]
    fn builtins_are_registered() {
        let r = Registry::with_builtins();
        assert_eq!(
            r.action_names(),
            vec!["exec", "key_press", "page", "pulsevolume", "reload_config", "toggle_display"]
        );
        assert_eq!(
            r.display_names(),
            vec!["color", "exec", "image", "pulsevolume", "text"]
        );
        assert!(matches!(r.display_element("color"), Ok(DisplayHandler::OneShot(_))));
        assert!(matches!(r.display_element("exec"), Ok(DisplayHandler::Refreshing(_))));
    }

    #[test]
    fn unknown_names_are_errors() {
        let r = Registry::new();
        match r.action("nonexistent") {
            Err(Error::UnknownType { kind, name }) => {
                assert_eq!(kind, ElementKind::Action);
                assert_eq!(name, "nonexistent");
            }
            _ => panic!("expected unknown type"),
        }
        assert!(matches!(
            r.display_element("nonexistent"),
            Err(Error::UnknownType {
                kind: ElementKind::Display,
                ..
            })
        ));
    }

    #[test]
    fn reregistering_keeps_one_entry() {
        let mut r = Registry::new();
        r.register_action("x", || Box::new(Tagged("first")));
        r.register_action("x", || Box::new(Tagged("second")));
        r.register_display_element("c", || DisplayHandler::OneShot(Box::new(ColorDisplay)));
        assert_eq!(r.action_names(), vec!["x"]);
        assert!(r.action("x").is_ok());
        assert!(r.display_element("c").is_ok());
    }
}
