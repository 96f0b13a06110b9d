#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::*;

    fn key(kind: &str, text: &str) -> KeyDefinition {
        KeyDefinition {
            display: DynamicElement::new(
                kind,
                AttributeCollection {
                    text: Some(text.to_string()),
                    ..Default::default()
                },
            ),
            ..Default::default()
        }
    }

    fn page(keys: &[(usize, KeyDefinition)]) -> Page {
        Page {
            keys: keys.iter().cloned().collect(),
            ..Default::default()
        }
    }

    fn text_of(map: &BTreeMap<usize, KeyDefinition>, idx: usize) -> Option<&str> {
        map.get(&idx)
            .and_then(|kd| kd.display.attributes.text.as_deref())
    }

    fn layered() -> Config {
        let under = page(&[
            (0, key("text", "U0")),
            (1, key("text", "U1")),
            (2, key("text", "U2")),
        ]);
        let over = page(&[(0, key("text", "V0"))]);
        let mut own = page(&[(0, key("text", "O0")), (1, key("text", "O1"))]);
        own.underlay = Some("under".into());
        own.overlay = Some("over".into());

        let mut pages = BTreeMap::new();
        pages.insert("under".to_string(), under);
        pages.insert("over".to_string(), over);
        pages.insert("own".to_string(), own);
        Config::from_pages("own", pages)
    }

    #[test]
    fn overlay_wins_then_own_then_underlay() {
        let cfg = layered();
        let keys = cfg.resolved_keys("own");
        assert_eq!(text_of(&keys, 0), Some("V0"));
        assert_eq!(text_of(&keys, 1), Some("O1"));
        assert_eq!(text_of(&keys, 2), Some("U2"));
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn blank_entries_never_overwrite() {
        let mut cfg = layered();
        if let Some(over) = cfg.pages.get_mut("over") {
            over.keys.insert(1, KeyDefinition::default());
        }
        if let Some(own) = cfg.pages.get_mut("own") {
            own.keys.insert(2, KeyDefinition::default());
        }
        let keys = cfg.resolved_keys("own");
        assert_eq!(text_of(&keys, 1), Some("O1"));
        assert_eq!(text_of(&keys, 2), Some("U2"));
    }

    #[test]
    fn missing_layers_contribute_nothing() {
        let mut pages = BTreeMap::new();
        let mut p = page(&[(3, key("color", "own"))]);
        p.overlay = Some("ghost".into());
        p.underlay = Some("phantom".into());
        pages.insert("main".to_string(), p);
        let cfg = Config::from_pages("main", pages);
        let keys = cfg.resolved_keys("main");
        assert_eq!(keys.len(), 1);
        assert_eq!(text_of(&keys, 3), Some("own"));
    }

    #[test]
    fn unknown_page_resolves_empty() {
        assert!(layered().resolved_keys("nowhere").is_empty());
    }

    #[test]
    fn layer_cycles_do_not_recurse() {
        let mut pages = BTreeMap::new();
        let mut a = page(&[(0, key("text", "A0"))]);
        a.underlay = Some("b".into());
        let mut b = page(&[(1, key("text", "B1"))]);
        b.underlay = Some("a".into());
        b.overlay = Some("b".into());
        pages.insert("a".to_string(), a);
        pages.insert("b".to_string(), b);
        let cfg = Config::from_pages("a", pages);

        let ka = cfg.resolved_keys("a");
        assert_eq!(text_of(&ka, 0), Some("A0"));
        assert_eq!(text_of(&ka, 1), Some("B1"));

        let kb = cfg.resolved_keys("b");
        assert_eq!(text_of(&kb, 0), Some("A0"));
        assert_eq!(text_of(&kb, 1), Some("B1"));
        assert_eq!(kb.len(), 2);
    }

    #[test]
    fn routing_keeps_action_only_keys() {
        let mut cfg = layered();
        let action = DynamicElement::new("page", AttributeCollection::default());
        if let Some(own) = cfg.pages.get_mut("own") {
            own.keys.insert(
                5,
                KeyDefinition {
                    actions: vec![action.clone()],
                    ..Default::default()
                },
            );
            // Blank own entry under a drawn key does not shadow it.
            own.keys.insert(2, KeyDefinition::default());
        }
        assert!(!cfg.resolved_keys("own").contains_key(&5));

        let routes = cfg.routed_keys("own");
        assert_eq!(routes[&5].actions, vec![action]);
        assert_eq!(text_of(&routes, 0), Some("V0"));
        assert_eq!(text_of(&routes, 2), Some("U2"));
        assert_eq!(routes.len(), 4);
        assert!(layered().routed_keys("nowhere").is_empty());
    }

    #[test]
    fn actions_travel_with_their_display() {
        let mut cfg = layered();
        if let Some(under) = cfg.pages.get_mut("under")
            && let Some(kd) = under.keys.get_mut(&2)
        {
            kd.actions.push(DynamicElement::new("page", AttributeCollection::default()));
        }
        let keys = cfg.resolved_keys("own");
        assert_eq!(keys[&2].actions.len(), 1);
        assert!(keys[&0].actions.is_empty());
    }
}
