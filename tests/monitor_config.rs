use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use queue_monitor::config::{ConfigOverrides, MonitorConfig};
use queue_monitor::ContainmentMode;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "QUEUE_MONITOR_CONFIG",
        "QUEUE_MONITOR_MODEL",
        "QUEUE_MONITOR_DEVICE",
        "QUEUE_MONITOR_VIDEO",
        "QUEUE_MONITOR_QUEUE_PARAM",
        "QUEUE_MONITOR_OUTPUT_PATH",
        "QUEUE_MONITOR_MAX_PEOPLE",
        "QUEUE_MONITOR_THRESHOLD",
        "QUEUE_MONITOR_CONTAINMENT",
        "QUEUE_MONITOR_FONT",
        "QUEUE_MONITOR_INPUT_WIDTH",
        "QUEUE_MONITOR_INPUT_HEIGHT",
    ] {
        std::env::remove_var(key);
    }
}

fn minimal_overrides() -> ConfigOverrides {
    ConfigOverrides {
        model: Some("stub://person".to_string()),
        video: Some("stub://checkout".to_string()),
        ..ConfigOverrides::default()
    }
}

#[test]
fn defaults_apply_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = MonitorConfig::load(None, minimal_overrides()).expect("load config");

    assert_eq!(cfg.device, "CPU");
    assert_eq!(cfg.output_path, PathBuf::from("/results"));
    assert_eq!(cfg.max_people, 2);
    assert_eq!(cfg.threshold, 0.60);
    assert_eq!(cfg.queue_param, None);
    assert_eq!(cfg.containment, ContainmentMode::Horizontal);
    assert_eq!((cfg.input_width, cfg.input_height), (544, 320));
}

#[test]
fn loads_config_from_file_with_env_and_cli_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "model": "models/person-detection-retail-0013",
        "device": "CPU",
        "video": "videos/retail.mp4",
        "queue_param": "params/retail.json",
        "output_path": "out/retail",
        "max_people": 5,
        "threshold": 0.7,
        "containment": "full",
        "input": { "width": 640, "height": 384 }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("QUEUE_MONITOR_MAX_PEOPLE", "3");
    std::env::set_var("QUEUE_MONITOR_VIDEO", "videos/manufacturing.mp4");

    let overrides = ConfigOverrides {
        threshold: Some(0.55),
        ..ConfigOverrides::default()
    };
    let cfg = MonitorConfig::load(Some(file.path()), overrides).expect("load config");

    assert_eq!(cfg.model, "models/person-detection-retail-0013");
    assert_eq!(cfg.video, "videos/manufacturing.mp4");
    assert_eq!(cfg.queue_param, Some(PathBuf::from("params/retail.json")));
    assert_eq!(cfg.output_path, PathBuf::from("out/retail"));
    assert_eq!(cfg.max_people, 3);
    assert_eq!(cfg.threshold, 0.55);
    assert_eq!(cfg.containment, ContainmentMode::Full);
    assert_eq!((cfg.input_width, cfg.input_height), (640, 384));

    clear_env();
}

#[test]
fn font_and_input_size_follow_every_layer() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{ "font": "fonts/file.ttf", "input": { "width": 640, "height": 384 } }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("QUEUE_MONITOR_FONT", "fonts/env.ttf");
    std::env::set_var("QUEUE_MONITOR_INPUT_WIDTH", "300");
    std::env::set_var("QUEUE_MONITOR_INPUT_HEIGHT", "300");

    let cfg = MonitorConfig::load(Some(file.path()), minimal_overrides()).expect("load config");
    assert_eq!(cfg.font, Some(PathBuf::from("fonts/env.ttf")));
    assert_eq!((cfg.input_width, cfg.input_height), (300, 300));

    let overrides = ConfigOverrides {
        font: Some(PathBuf::from("fonts/cli.ttf")),
        input_height: Some(544),
        ..minimal_overrides()
    };
    let cfg = MonitorConfig::load(Some(file.path()), overrides).expect("load config");
    assert_eq!(cfg.font, Some(PathBuf::from("fonts/cli.ttf")));
    assert_eq!((cfg.input_width, cfg.input_height), (300, 544));

    std::env::set_var("QUEUE_MONITOR_INPUT_WIDTH", "wide");
    assert!(MonitorConfig::load(None, minimal_overrides()).is_err());

    clear_env();
}

#[test]
fn rejects_out_of_range_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let too_high = ConfigOverrides {
        threshold: Some(1.5),
        ..minimal_overrides()
    };
    assert!(MonitorConfig::load(None, too_high).is_err());

    let no_room = ConfigOverrides {
        max_people: Some(0),
        ..minimal_overrides()
    };
    assert!(MonitorConfig::load(None, no_room).is_err());

    std::env::set_var("QUEUE_MONITOR_THRESHOLD", "high");
    assert!(MonitorConfig::load(None, minimal_overrides()).is_err());

    clear_env();
}

#[test]
fn requires_model_and_video() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let no_model = ConfigOverrides {
        model: None,
        ..minimal_overrides()
    };
    let err = MonitorConfig::load(None, no_model).unwrap_err();
    assert!(err.to_string().contains("model"));

    let no_video = ConfigOverrides {
        video: None,
        ..minimal_overrides()
    };
    assert!(MonitorConfig::load(None, no_video).is_err());
}

#[test]
fn rejects_unknown_config_keys() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{ "max_peple": 4 }"#).expect("write config");

    assert!(MonitorConfig::load(Some(file.path()), minimal_overrides()).is_err());
}
