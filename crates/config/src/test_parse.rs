#[cfg(test)]
mod tests {
    use std::{env, fs, path::PathBuf, process, time::Duration};

    use crate::*;

    const RON_CONFIG: &str = r#"(
        default_page: "main",
        default_brightness: 70,
        display_off_time: "5m",
        long_press_duration: "750ms",
        caption_position: top,
        pages: {
            "main": (
                underlay: "base",
                keys: {
                    0: (
                        display: (type: "color", attributes: (rgba: [255, 0, 0, 255])),
                        actions: [
                            (type: "exec", attributes: (command: ["true"], wait: true)),
                            (type: "page", long_press: true, attributes: (name: "base")),
                        ],
                    ),
                    4: (
                        display: (type: "exec", attributes: (command: ["date"], interval: "1s")),
                        on: down,
                    ),
                },
            ),
            "base": (keys: {1: (display: (type: "text", attributes: (text: "hi")))}),
        },
    )"#;

    #[test]
    fn ron_config_decodes() {
        let cfg = load_from_str(RON_CONFIG, Format::Ron).unwrap();
        assert_eq!(cfg.default_page, "main");
        assert_eq!(cfg.default_brightness, 70);
        assert_eq!(cfg.display_off_time, Duration::from_secs(300));
        assert_eq!(cfg.long_press_duration, Duration::from_millis(750));
        assert_eq!(cfg.caption_position, CaptionPosition::Top);
        assert!(cfg.auto_reload);

        let main = cfg.page("main").unwrap();
        assert_eq!(main.underlay.as_deref(), Some("base"));
        let k0 = &main.keys[&0];
        assert_eq!(k0.display.kind, "color");
        assert_eq!(k0.display.attributes.rgba, Some(vec![255, 0, 0, 255]));
        assert_eq!(k0.actions.len(), 2);
        assert!(!k0.actions[0].long_press);
        assert!(k0.actions[0].attributes.wait);
        assert!(k0.actions[1].long_press);
        assert_eq!(k0.on, KeyTrigger::Up);

        let k4 = &main.keys[&4];
        assert_eq!(k4.on, KeyTrigger::Down);
        assert_eq!(k4.display.attributes.interval, Some(Duration::from_secs(1)));

        assert_eq!(cfg.resolved_keys("main").len(), 3);
    }

    #[test]
    fn json_config_decodes() {
        let json = r#"{
            "default_page": "main",
            "pages": {
                "main": {
                    "keys": {
                        "2": {
                            "display": {"type": "image", "attributes": {"url": "https://example.com/a.png"}},
                            "actions": [{"type": "toggle_display"}]
                        }
                    }
                }
            }
        }"#;
        let cfg = load_from_str(json, Format::Json).unwrap();
        assert_eq!(cfg.long_press_duration, Duration::from_millis(500));
        assert_eq!(cfg.display_off_time, Duration::ZERO);
        assert_eq!(cfg.caption_color, [0xff, 0xff, 0xff, 0xff]);
        let kd = &cfg.page("main").unwrap().keys[&2];
        assert_eq!(kd.display.kind, "image");
        assert_eq!(kd.actions[0].kind, "toggle_display");
    }

    #[test]
    fn json_errors_carry_location() {
        let err = load_from_str("{\n  \"default_page\": ,\n}", Format::Json).unwrap_err();
        match err {
            Error::Parse { line, excerpt, .. } => {
                assert_eq!(line, Some(2));
                assert!(excerpt.is_some());
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn unknown_fields_fail() {
        let ron = r#"(default_page: "main", pages: {"main": (keyz: {})})"#;
        assert!(matches!(
            load_from_str(ron, Format::Ron),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn validation_runs_after_decode() {
        let ron = r#"(default_page: "missing", pages: {"main": ()})"#;
        assert!(matches!(
            load_from_str(ron, Format::Ron),
            Err(Error::Validation { .. })
        ));
    }

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(format!("keydeck-config-{}-{}", process::id(), name))
    }

    #[test]
    fn load_from_path_attaches_path() {
        let good = temp_path("good.ron");
        fs::write(&good, RON_CONFIG).unwrap();
        assert!(load_from_path(&good).is_ok());

        let bad = temp_path("bad.ron");
        fs::write(&bad, "(default_page: )").unwrap();
        let err = load_from_path(&bad).unwrap_err();
        assert_eq!(err.path(), Some(bad.as_path()));
        assert!(err.pretty().contains(&bad.display().to_string()));

        let _ = fs::remove_file(good);
        let _ = fs::remove_file(bad);
    }

    #[test]
    fn unsupported_extension_is_a_read_error() {
        let err = load_from_path(&temp_path("deck.yaml")).unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
    }

    #[test]
    fn explicit_config_path_wins() {
        let p = PathBuf::from("/tmp/deck.ron");
        assert_eq!(resolve_config_path(Some(&p)).unwrap(), p);
    }
}
