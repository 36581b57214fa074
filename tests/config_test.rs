//! Tests for loading the engine config from disk.

use gomoku_royale::{EngineConfig, LlmProvider, PeerTimings};
use std::io::Write;
use std::time::Duration;

#[test]
fn test_config_file_round_trip() {
    let config = EngineConfig::from_toml(
        r#"
        player = "ines"

        [wager]
        tiers = [1000, 2000]
        minimum = 1000
        payout_percent = 150

        [protocol]
        seek_interval_ms = 250
        stall_timeout_secs = 30

        [llm]
        provider = "openai"
        model = "gpt-4o-mini"
        "#,
    )
    .expect("parse");

    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    let text = toml::to_string(&config).expect("serialize");
    file.write_all(text.as_bytes()).expect("write");

    let loaded = EngineConfig::from_file(file.path()).expect("load");
    assert_eq!(loaded.player(), "ines");
    assert_eq!(loaded.wager().tiers(), &vec![1_000, 2_000]);
    assert_eq!(loaded.wager().payout(2_000), 3_000);
    assert!(loaded.wager().validate_choice(1_500).is_err());

    let timings = PeerTimings::from(loaded.protocol());
    assert_eq!(timings.seek_interval, Duration::from_millis(250));
    assert_eq!(timings.seek_timeout, Duration::from_secs(120));
    assert_eq!(timings.stall_timeout, Duration::from_secs(30));

    let llm = loaded.llm().as_ref().expect("llm");
    assert_eq!(llm.provider(), &LlmProvider::OpenAI);
    assert_eq!(llm.model(), "gpt-4o-mini");
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = EngineConfig::from_file(dir.path().join("absent.toml")).expect_err("missing");
    assert!(err.message.contains("Failed to read config file"));
}
