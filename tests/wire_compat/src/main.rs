fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use vac_client::{
        ClientConfig, StaticConfig, build_snapshot_from_navigation_state, resolve,
    };
    use vac_protocol::messages::{ClientFrame, Hello};
    use vac_protocol::{Edge, NavigatorSnapshot};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values.
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));
        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  fixture: {fixture}\n  Rust:    {reserialized}"
        );
        parsed
    }

    #[test]
    fn fixture_hello() {
        let frame: ClientFrame = roundtrip_test("hello.json");
        assert_eq!(frame, ClientFrame::Hello(Hello::default()));
    }

    #[test]
    fn fixture_nav_snapshot() {
        let frame: ClientFrame = roundtrip_test("nav_snapshot.json");
        assert_eq!(
            frame,
            ClientFrame::NavSnapshot(NavigatorSnapshot::new(vec![
                "Home".into(),
                "Detail".into(),
                "Settings".into()
            ]))
        );
    }

    #[test]
    fn fixture_nav_snapshot_with_edges() {
        let frame: ClientFrame = roundtrip_test("nav_snapshot_with_edges.json");
        let ClientFrame::NavSnapshot(snapshot) = frame else {
            panic!("expected nav:snapshot");
        };
        assert_eq!(snapshot.edges, Some(vec![Edge::new("Home", "Detail")]));
    }

    #[test]
    fn hello_built_by_client_matches_fixture() {
        let text = ClientFrame::from(Hello::new("rn-app", "0")).to_text().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, load_fixture("hello.json"));
    }

    #[test]
    fn navigation_state_fixture_yields_expected_screens() {
        let fixture = load_fixture("navigation_state.json");
        let snapshot = build_snapshot_from_navigation_state(&fixture["state"]);
        let expected: Vec<String> = serde_json::from_value(fixture["screens"].clone()).unwrap();
        assert_eq!(snapshot.screens, expected);

        let frame = serde_json::to_value(ClientFrame::from(snapshot)).unwrap();
        assert_eq!(frame["command"], "nav:snapshot");
        assert!(frame.get("edges").is_none());
    }

    #[test]
    fn vacrc_fixture_resolves() {
        let file = StaticConfig::load(&fixtures_dir().join("vacrc.json")).unwrap();
        let target = resolve(&ClientConfig::new().with_static_config(file)).unwrap();
        assert_eq!(
            target.url().unwrap(),
            "ws://192.168.1.20:8787/?token=dev-token&v=1"
        );
    }
}
