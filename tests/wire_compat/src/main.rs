fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use hisho_protocol::{
        AlertData, DetectionData, Frame, InboundMessage, NotificationKind, OutboundMessage,
        decode,
    };

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn read_fixture(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    /// Decodes an inbound fixture, requiring a known `type`.
    fn inbound(name: &str) -> InboundMessage {
        let raw = read_fixture(&format!("inbound/{name}"));
        match decode(&raw).unwrap_or_else(|e| panic!("failed to decode {name}: {e}")) {
            Frame::Known(msg) => msg,
            Frame::Unknown(kind) => panic!("{name}: unexpected unknown type {kind:?}"),
        }
    }

    /// Loads an outbound fixture as a JSON value.
    fn outbound(name: &str) -> serde_json::Value {
        let raw = read_fixture(&format!("outbound/{name}"));
        serde_json::from_str(&raw).unwrap_or_else(|e| panic!("failed to parse {name}: {e}"))
    }

    #[test]
    fn every_inbound_fixture_matches_its_type() {
        let dir = fixtures_dir().join("inbound");
        let mut seen = 0;
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            if name == "unknown_type.json" {
                continue;
            }
            let msg = inbound(&name);
            assert!(
                name.starts_with(msg.type_name()),
                "{name} decoded as {}",
                msg.type_name()
            );
            seen += 1;
        }
        assert_eq!(seen, 10);
    }

    // --- Inbound ---

    #[test]
    fn fixture_voicevox_status() {
        let InboundMessage::VoicevoxStatus { status } = inbound("voicevox_status.json") else {
            panic!("wrong variant");
        };
        assert_eq!(status, "available");
    }

    #[test]
    fn fixture_speak() {
        let InboundMessage::Speak(p) = inbound("speak.json") else {
            panic!("wrong variant");
        };
        assert_eq!(p.text.as_deref(), Some("おかえりなさい！"));
        assert_eq!(p.emotion.as_deref(), Some("happy"));
        assert_eq!(p.display_time, Some(3000));
        assert_eq!(p.animation.as_deref(), Some("bounce_light"));
        assert_eq!(p.preset_sound.as_deref(), Some("chime"));
    }

    #[test]
    fn fixture_status_update() {
        let InboundMessage::StatusUpdate { status, message } = inbound("status_update.json")
        else {
            panic!("wrong variant");
        };
        assert_eq!(status, "error");
        assert_eq!(message, "Camera disconnected");
    }

    #[test]
    fn fixture_zombie_overload_keeps_extra_fields() {
        let InboundMessage::ZombieOverload { data } = inbound("zombie_overload.json") else {
            panic!("wrong variant");
        };
        let alert = AlertData::rescue(data);
        assert_eq!(alert.count, Some(12));
        assert!(alert.extra.contains_key("timestamp"));
        assert_eq!(alert.source, None);
    }

    #[test]
    fn fixture_zombie_few_double_encoded() {
        let InboundMessage::ZombieFew { data } = inbound("zombie_few.json") else {
            panic!("wrong variant");
        };
        assert!(data.is_string());
        assert_eq!(AlertData::rescue(data).count, Some(2));
    }

    #[test]
    fn fixture_zombie_warning_without_data() {
        let InboundMessage::ZombieWarning { data } = inbound("zombie_warning.json") else {
            panic!("wrong variant");
        };
        assert_eq!(AlertData::rescue(data), AlertData::default());
    }

    #[test]
    fn fixture_notification_alert() {
        let InboundMessage::Notification { data: Some(data) } = inbound("notification_alert.json")
        else {
            panic!("wrong variant");
        };
        assert_eq!(data.kind(), Some(NotificationKind::FewZombiesAlert));
        assert_eq!(data.alert_data().count, Some(4));
        assert_eq!(data.speak_text, None);
    }

    #[test]
    fn fixture_notification_preset() {
        let InboundMessage::Notification { data: Some(data) } =
            inbound("notification_preset.json")
        else {
            panic!("wrong variant");
        };
        assert_eq!(data.kind(), None);
        assert_eq!(data.preset_sound.as_deref(), Some("alert"));
        assert_eq!(data.speak_text.as_deref(), Some("気をつけて！"));
        assert_eq!(data.emotion.as_deref(), Some("serious"));
    }

    #[test]
    fn fixture_detection() {
        let InboundMessage::Detection { data: Some(data) } = inbound("detection.json") else {
            panic!("wrong variant");
        };
        assert!(data.resnet_alive);
        assert_eq!(data.yolo.len(), 1);
        assert_eq!(data.yolo[0].y2, 210.25);
        assert_eq!(data.yolo[0].confidence, 0.87);
    }

    #[test]
    fn fixture_test_detection_without_data() {
        let InboundMessage::TestDetection { data } = inbound("test_detection.json") else {
            panic!("wrong variant");
        };
        assert_eq!(data, None);
        assert_eq!(DetectionData::sample().yolo.len(), 2);
    }

    #[test]
    fn fixture_unknown_type_is_not_an_error() {
        let raw = read_fixture("inbound/unknown_type.json");
        assert_eq!(decode(&raw).unwrap(), Frame::Unknown(Some("heartbeat".into())));
    }

    // --- Outbound ---

    #[test]
    fn fixture_client_hello() {
        let fixture = outbound("client_hello.json");
        let mut ours = serde_json::to_value(OutboundMessage::client_hello()).unwrap();

        let ts = ours["client_info"]["timestamp"].as_str().unwrap();
        assert_eq!(ts.len(), fixture["client_info"]["timestamp"].as_str().unwrap().len());
        assert!(ts.ends_with('Z'));

        // Timestamps differ by construction.
        ours["client_info"]["timestamp"] = fixture["client_info"]["timestamp"].clone();
        assert_eq!(ours, fixture);
    }

    #[test]
    fn fixture_check_status() {
        let ours = serde_json::to_value(OutboundMessage::check_status()).unwrap();
        assert_eq!(ours, outbound("check_status.json"));
        assert!(ours.get("type").is_none());
    }

    #[test]
    fn fixture_start_monitoring() {
        let ours = serde_json::to_value(OutboundMessage::start_monitoring()).unwrap();
        assert_eq!(ours, outbound("start_monitoring.json"));
    }
}
