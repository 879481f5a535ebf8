//! Reconciliation behavior of the record manager: no-change ticks, drift
//! correction, dual-family hostnames and validator rejection.

mod common;

use common::*;
use dns_ha::record::RecordFamily;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_no_change_tick_leaves_file_and_service_alone() {
    let seed = format!("# local zone\n{}\n{}\n", desired_line(30, "A", "10.0.0.1"), UNRELATED_LINE);
    let fixture = ZoneFixture::new(&seed);

    let records = vec![
        make_record("10.0.0.1", RecordFamily::A, 20, 30, SwitchProbe::new(true)),
        make_record("10.0.0.2", RecordFamily::A, 10, 30, SwitchProbe::new(true)),
    ];
    let service = RecordingService::new();
    let mut manager = make_manager(fixture.zone(), service.clone(), records);

    manager.tick(&CancellationToken::new()).await;

    assert_eq!(fixture.contents(), seed, "file must stay byte-identical");
    assert!(service.calls().is_empty(), "no reload without changes");
}

#[tokio::test]
async fn test_ttl_drift_replaces_stale_line_and_reloads() {
    let fixture = ZoneFixture::new(&format!(
        "{}\n{}\n",
        desired_line(60, "A", "10.0.0.1"),
        UNRELATED_LINE
    ));

    let records = vec![
        make_record("10.0.0.1", RecordFamily::A, 20, 30, SwitchProbe::new(true)),
        make_record("10.0.0.2", RecordFamily::A, 10, 30, SwitchProbe::new(true)),
    ];
    let service = RecordingService::new();
    let mut manager = make_manager(fixture.zone(), service.clone(), records);

    manager.tick(&CancellationToken::new()).await;

    assert_eq!(
        fixture.lines(),
        vec![UNRELATED_LINE.to_string(), desired_line(30, "A", "10.0.0.1")]
    );
    assert_eq!(service.calls(), vec!["reload"]);
}

#[tokio::test]
async fn test_dual_family_serves_both_without_churn() {
    let fixture = ZoneFixture::new("");

    let records = vec![
        make_record("10.0.0.1", RecordFamily::A, 20, 30, SwitchProbe::new(true)),
        make_record("10.0.0.2", RecordFamily::A, 10, 30, SwitchProbe::new(true)),
        make_record("fd00::1", RecordFamily::Aaaa, 20, 30, SwitchProbe::new(true)),
    ];
    let service = RecordingService::new();
    let mut manager = make_manager(fixture.zone(), service.clone(), records);
    let cancel = CancellationToken::new();

    manager.tick(&cancel).await;

    let mut lines = fixture.lines();
    lines.sort();
    assert_eq!(
        lines,
        vec![
            desired_line(30, "A", "10.0.0.1"),
            desired_line(30, "AAAA", "fd00::1"),
        ]
    );
    assert_eq!(service.calls(), vec!["reload"]);

    // A second tick with identical health must not touch the file again.
    let before = fixture.contents();
    manager.tick(&cancel).await;
    assert_eq!(fixture.contents(), before);
    assert_eq!(service.calls(), vec!["reload"]);
}

#[tokio::test]
async fn test_validator_rejection_blocks_reload_but_keeps_edit() {
    let fixture = ZoneFixture::new("");

    let records = vec![
        make_record("10.0.0.1", RecordFamily::A, 20, 30, SwitchProbe::new(true)),
        make_record("10.0.0.2", RecordFamily::A, 10, 30, SwitchProbe::new(true)),
    ];
    let service = RecordingService::new();
    let mut manager = make_manager(fixture.zone_rejecting_validator(), service.clone(), records);
    let cancel = CancellationToken::new();

    manager.tick(&cancel).await;

    // The edited file stays on disk, but unbound is never reloaded.
    assert_eq!(fixture.lines(), vec![desired_line(30, "A", "10.0.0.1")]);
    assert!(service.calls().is_empty());

    // Next tick: the file already matches, so nothing is written and the
    // validator verdict does not matter.
    let before = fixture.contents();
    manager.tick(&cancel).await;
    assert_eq!(fixture.contents(), before);
    assert!(service.calls().is_empty());
}
