//! Built-in actions.

use crate::registry::Registry;

mod exec;
mod key_press;
mod page;
mod pulsevolume;
mod reload_config;
mod toggle_display;

pub(crate) use exec::build_command;

/// Register every built-in action.
pub(crate) fn register(r: &mut Registry) {
    r.register_action("exec", || Box::new(exec::ExecAction));
    r.register_action("key_press", || Box::new(key_press::KeyPressAction));
    r.register_action("page", || Box::new(page::PageAction));
    r.register_action("pulsevolume", || Box::new(pulsevolume::PulseVolumeAction));
    r.register_action("reload_config", || Box::new(reload_config::ReloadConfigAction));
    r.register_action("toggle_display", || Box::new(toggle_display::ToggleDisplayAction));
}
