//! Pages injected by the daemon rather than written by the user.

use crate::{
    AttributeCollection, Config, DynamicElement, KeyDefinition, Page, defaults::BLANK_PAGE,
};

/// Inject the system pages into `cfg`.
///
/// `@@blank` paints every key black; pressing any key returns to the default
/// page. It is what the display-off timer switches to.
pub fn apply_system_pages(cfg: &mut Config, num_keys: usize) {
    let blank_key = KeyDefinition {
        display: DynamicElement::new(
            "color",
            AttributeCollection {
                rgba: Some(vec![0x0, 0x0, 0x0, 0xff]),
                ..Default::default()
            },
        ),
        actions: vec![DynamicElement::new(
            "page",
            AttributeCollection {
                name: Some(cfg.default_page.clone()),
                ..Default::default()
            },
        )],
        ..Default::default()
    };

    let page = Page {
        keys: (0..num_keys).map(|i| (i, blank_key.clone())).collect(),
        ..Default::default()
    };
    cfg.pages.insert(BLANK_PAGE.to_string(), page);
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn blank_page_covers_every_key() {
        let mut cfg = Config::from_pages("main", BTreeMap::new());
        apply_system_pages(&mut cfg, 6);
        let blank = cfg.page(BLANK_PAGE).unwrap();
        assert_eq!(blank.keys.len(), 6);
        let kd = &blank.keys[&5];
        assert_eq!(kd.display.kind, "color");
        assert_eq!(kd.actions[0].kind, "page");
        assert_eq!(kd.actions[0].attributes.name.as_deref(), Some("main"));
    }
}
