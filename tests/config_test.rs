//! Tests for the configuration builder.

use std::time::Duration;

use municrawl::CollectConfig;

#[test]
fn defaults_match_the_documented_knobs() {
    let config = CollectConfig::builder()
        .download_root("/tmp/municrawl")
        .resource_url("https://library.municode.com/fl/testville/codes/code_of_ordinances")
        .build()
        .unwrap();

    assert!(config.headless());
    assert_eq!(config.artifact_extension(), ".docx");
    assert_eq!(config.rotate_after_downloads(), 5);
    assert_eq!(config.max_retries(), 1);
    assert_eq!(config.artifact_timeout(), Duration::from_secs(60));
    assert_eq!(config.worker_count(), 4);
    assert_eq!(config.politeness_delay_ms(), (1_000, 3_000));
}

#[test]
fn url_scheme_is_normalized() {
    let config = CollectConfig::builder()
        .download_root("/tmp/municrawl")
        .resource_url("library.municode.com/fl/testville")
        .build()
        .unwrap();
    assert_eq!(
        config.resource_url(),
        "https://library.municode.com/fl/testville"
    );

    let config = CollectConfig::builder()
        .download_root("/tmp/municrawl")
        .resource_url("http://example.test/codes")
        .build()
        .unwrap();
    assert_eq!(config.resource_url(), "http://example.test/codes");
}

#[test]
fn extension_gets_a_leading_dot() {
    let config = CollectConfig::builder()
        .download_root("/tmp/municrawl")
        .resource_url("https://example.test")
        .artifact_extension("pdf")
        .build()
        .unwrap();
    assert_eq!(config.artifact_extension(), ".pdf");
}

#[test]
fn invalid_knobs_are_rejected() {
    assert!(CollectConfig::builder()
        .download_root("/tmp/municrawl")
        .resource_url("https://example.test")
        .worker_count(0)
        .build()
        .is_err());

    assert!(CollectConfig::builder()
        .download_root("/tmp/municrawl")
        .resource_url("https://example.test")
        .politeness_delay_ms(5_000, 1_000)
        .build()
        .is_err());
}

#[test]
fn optional_knobs_flow_through() {
    let config = CollectConfig::builder()
        .download_root("/tmp/municrawl")
        .resource_url("https://example.test")
        .headless(false)
        .rotate_after_downloads(10)
        .max_retries(2)
        .artifact_timeout(Duration::from_secs(90))
        .worker_count(8)
        .build()
        .unwrap();

    assert!(!config.headless());
    assert_eq!(config.rotate_after_downloads(), 10);
    assert_eq!(config.max_retries(), 2);
    assert_eq!(config.artifact_timeout(), Duration::from_secs(90));
    assert_eq!(config.worker_count(), 8);
}
