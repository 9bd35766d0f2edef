use lumberjack::logging::DEFAULT_FORMAT;
use lumberjack::prelude::*;

#[test]
fn empty_object_gives_defaults() {
    let cfg: LumberjackConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(cfg, LumberjackConfig::default());
    assert_eq!(cfg.format, DEFAULT_FORMAT);
}

#[test]
fn parses_every_field() {
    let cfg: LumberjackConfig = serde_json::from_str(
        r#"{
            "ranks_limit": 3,
            "topology": "root",
            "format": "{ranks}: {message}",
            "level": "warning",
            "abort_on_error": false,
            "abort_on_warning": true,
            "flush_levels": ["error", "warning"]
        }"#,
    )
    .unwrap();
    assert_eq!(cfg.ranks_limit, 3);
    assert_eq!(cfg.topology, Topology::Root);
    assert_eq!(cfg.level, Level::Warning);
    assert!(!cfg.abort_on_error);
    assert!(cfg.abort_on_warning);
    assert_eq!(cfg.flush_levels, vec![Level::Error, Level::Warning]);

    let comm = cfg.build_communicator(NoComm);
    assert_eq!(comm.num_pushes_to_flush(), 1);
    assert_eq!(comm.ranks_limit(), 3);
}

#[test]
fn unknown_level_is_rejected() {
    let err = serde_json::from_str::<LumberjackConfig>(r#"{ "level": "verbose" }"#);
    assert!(err.is_err());
}

#[test]
fn serializes_back() {
    let cfg = LumberjackConfig {
        topology: Topology::BinaryTree,
        ..Default::default()
    };
    let json = serde_json::to_value(&cfg).unwrap();
    assert_eq!(json["topology"], "binary_tree");
    assert_eq!(json["level"], "debug");
    assert_eq!(json["ranks_limit"], 5);
}
