//! Command pipeline tests: payload files in, hex out, JSON lines back.

use std::io::Cursor;

use aero_cli::{
    decode_frame, encode_frame, load_payloads, monitor, parse_payloads, PayloadFormat, ReadOnly,
};
use aero_link::{LinkConfig, LinkSession};
use aero_protocol::{Battery, Endpoint, FrameFormat, Payload, Pitot};

fn payload_file(name: &str, contents: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("aero-cli-{}-{}", std::process::id(), name));
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_encode_from_json_file() {
    let path = payload_file(
        "payloads.json",
        r#"[{"pitot": {"differential_pressure": -5}}, {"battery": {"voltage": 25, "current": 12}}]"#,
    );
    let payloads = load_payloads(&path).unwrap();
    std::fs::remove_file(&path).ok();

    let format = FrameFormat::default();
    let hex = encode_frame(&format, Endpoint::Plane, Endpoint::Ground, &payloads).unwrap();
    let report = decode_frame(&format, &hex).unwrap();

    assert!(report.valid);
    assert_eq!(report.length, 6);
    assert_eq!(
        report.payloads,
        vec![
            Payload::Pitot(Pitot { differential_pressure: -5 }),
            Payload::Battery(Battery { voltage: 25, current: 12 }),
        ]
    );
}

#[test]
fn test_encode_over_capacity_fails() {
    let yaml = "- actuators: {servos: [0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0]}\n- pitot: {differential_pressure: 1}\n";
    let payloads = parse_payloads(yaml, PayloadFormat::Yaml).unwrap();
    let format = FrameFormat::new(64).unwrap();

    assert!(encode_frame(&format, Endpoint::Ground, Endpoint::Plane, &payloads).is_err());
}

#[test]
fn test_decode_report_json_shape() {
    let format = FrameFormat::default();
    let payloads = [Payload::Battery(Battery { voltage: 25, current: 12 })];
    let hex = encode_frame(&format, Endpoint::Ground, Endpoint::RelayG1, &payloads).unwrap();

    let report = decode_frame(&format, &hex).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["from"], "ground");
    assert_eq!(json["to"], "relay_g1");
    assert_eq!(json["valid"], true);
    assert_eq!(json["bitmask"], 16);
    assert_eq!(json["payloads"][0]["battery"]["voltage"], 25);
}

#[test]
fn test_monitor_prints_json_lines() {
    let format = FrameFormat::default();
    let mut stream = vec![0xAA, 0xBB];
    for voltage in [10, 11, 12] {
        let payloads = [Payload::Battery(Battery { voltage, current: 1 })];
        let hex = encode_frame(&format, Endpoint::Plane, Endpoint::Ground, &payloads).unwrap();
        stream.extend(hex::decode(hex).unwrap());
    }

    let config = LinkConfig {
        name: "monitor".to_string(),
        ..LinkConfig::default()
    };
    let session = LinkSession::new(&config, ReadOnly(Cursor::new(stream))).unwrap();
    let mut out = Vec::new();
    let stats = monitor(session, &mut out).unwrap();

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    for (line, voltage) in lines.iter().zip([10, 11, 12]) {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(value["from"], "plane");
        assert_eq!(value["payloads"][0]["battery"]["voltage"], voltage);
    }
    assert_eq!(stats.received, 3);
    assert_eq!(stats.discarded, 2);
}
