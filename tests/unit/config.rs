use super::*;

#[test]
fn empty_document_yields_defaults() {
    let cfg = EditorConfig::from_json_str("{}").unwrap();
    assert_eq!(cfg, EditorConfig::default());
    assert_eq!(cfg.timeline.min_clip_duration, 0.1);
    assert_eq!(cfg.timeline.min_project_duration, 10.0);
    assert_eq!(cfg.prerender_opts(), PrerenderOpts::default());
    assert_eq!(cfg.media_opts(), MediaPoolOpts::default());
    assert_eq!(cfg.audio_sync_interval(), Duration::from_millis(250));
}

#[test]
fn partial_sections_keep_other_defaults() {
    let cfg = EditorConfig::from_json_str(
        r#"{
            "project": { "fps": { "num": 24, "den": 1 } },
            "prerender": { "max_batch": 48, "yield_ms": 0 },
            "playback": { "looping": true, "loop_start": 1.5 }
        }"#,
    )
    .unwrap();
    assert_eq!(cfg.project.fps, Fps::new(24, 1).unwrap());
    assert_eq!(cfg.project.canvas, Canvas::default());
    let opts = cfg.prerender_opts();
    assert_eq!(opts.max_batch, 48);
    assert_eq!(opts.yield_delay, Duration::ZERO);
    assert_eq!(opts.render_scale, 0.5);
    let clock = cfg.clock_opts();
    assert!(clock.looping);
    assert_eq!(clock.loop_start, 1.5);
    assert_eq!(clock.rate, 1.0);
}

#[test]
fn unknown_fields_are_rejected() {
    let err = EditorConfig::from_json_str(r#"{ "prerender": { "batch": 3 } }"#).unwrap_err();
    assert!(matches!(err, EditorError::Serde(_)));
}

#[test]
fn invalid_values_fail_validation() {
    for doc in [
        r#"{ "project": { "fps": { "num": 0, "den": 1 } } }"#,
        r#"{ "project": { "canvas": { "width": 0, "height": 10 } } }"#,
        r#"{ "timeline": { "min_clip_duration": 0 } }"#,
        r#"{ "prerender": { "max_batch": 0 } }"#,
        r#"{ "prerender": { "render_scale": 1.5 } }"#,
        r#"{ "media": { "seek_timeout_ms": 0 } }"#,
        r#"{ "playback": { "rate": -1 } }"#,
    ] {
        let err = EditorConfig::from_json_str(doc).unwrap_err();
        assert!(matches!(err, EditorError::Config(_)), "{doc}: {err}");
    }
}

#[test]
fn missing_file_is_reported() {
    let err = EditorConfig::from_path("/definitely/not/here/cutframe.json").unwrap_err();
    assert!(matches!(err, EditorError::Other(_)));
    assert!(err.to_string().contains("read config"));
}

#[test]
fn round_trips_through_json() {
    let mut cfg = EditorConfig::default();
    cfg.media.drift_threshold = 0.5;
    let s = serde_json::to_string(&cfg).unwrap();
    assert_eq!(EditorConfig::from_json_str(&s).unwrap(), cfg);
}

#[test]
fn new_timeline_uses_configured_limits() {
    let cfg = EditorConfig::from_json_str(r#"{ "timeline": { "min_project_duration": 30 } }"#)
        .unwrap();
    let tl = cfg.new_timeline();
    assert_eq!(tl.duration(), 30.0);
    assert_eq!(tl.limits().min_clip_duration, 0.1);
}
