//! Failover behavior of the record manager: priority switchover, total
//! outage fail-static handling and the reload-to-restart fallback.

mod common;

use common::*;
use dns_ha::record::RecordFamily;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_failover_to_lower_priority_record() {
    let fixture = ZoneFixture::new("");

    let high_probe = SwitchProbe::new(true);
    let records = vec![
        make_record("10.0.0.1", RecordFamily::A, 200, 30, high_probe.clone()),
        make_record("10.0.0.2", RecordFamily::A, 100, 30, SwitchProbe::new(true)),
    ];
    let service = RecordingService::new();
    let mut manager = make_manager(fixture.zone(), service.clone(), records);
    let cancel = CancellationToken::new();

    manager.tick(&cancel).await;
    assert_eq!(fixture.lines(), vec![desired_line(30, "A", "10.0.0.1")]);

    high_probe.set_healthy(false);
    manager.tick(&cancel).await;
    assert_eq!(fixture.lines(), vec![desired_line(30, "A", "10.0.0.2")]);
    assert_eq!(service.calls(), vec!["reload", "reload"]);
}

#[tokio::test]
async fn test_total_outage_keeps_last_known_records() {
    let seed = format!("{}\n", desired_line(30, "A", "10.0.0.1"));
    let fixture = ZoneFixture::new(&seed);

    let records = vec![
        make_record("10.0.0.1", RecordFamily::A, 200, 30, SwitchProbe::new(false)),
        make_record("10.0.0.2", RecordFamily::A, 100, 30, SwitchProbe::new(false)),
    ];
    let service = RecordingService::new();
    let mut manager = make_manager(fixture.zone(), service.clone(), records);
    let cancel = CancellationToken::new();

    // Both records settle unhealthy; the zone must keep its previous
    // records rather than being emptied.
    manager.tick(&cancel).await;
    manager.tick(&cancel).await;

    assert_eq!(fixture.contents(), seed);
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn test_recovery_after_outage_rewrites_zone() {
    let fixture = ZoneFixture::new("");

    let probe = SwitchProbe::new(false);
    let records = vec![
        make_record("10.0.0.1", RecordFamily::A, 200, 30, probe.clone()),
        make_record("10.0.0.2", RecordFamily::A, 100, 30, SwitchProbe::new(false)),
    ];
    let service = RecordingService::new();
    let mut manager = make_manager(fixture.zone(), service.clone(), records);
    let cancel = CancellationToken::new();

    manager.tick(&cancel).await;
    assert_eq!(fixture.contents(), "");

    probe.set_healthy(true);
    manager.tick(&cancel).await;

    assert_eq!(fixture.lines(), vec![desired_line(30, "A", "10.0.0.1")]);
    assert_eq!(service.calls(), vec!["reload"]);
}

#[tokio::test]
async fn test_reload_not_supported_falls_back_to_restart() {
    let fixture = ZoneFixture::new("");

    let records = vec![
        make_record("10.0.0.1", RecordFamily::A, 200, 30, SwitchProbe::new(true)),
        make_record("10.0.0.2", RecordFamily::A, 100, 30, SwitchProbe::new(true)),
    ];
    let service = RecordingService::with_reload_unsupported();
    let mut manager = make_manager(fixture.zone(), service.clone(), records);

    manager.tick(&CancellationToken::new()).await;

    assert_eq!(service.calls(), vec!["reload", "restart"]);
}
