//! Scheduler pacing tests
//!
//! Uses the real task set from `gateway::assemble` with an in-memory byte
//! source and a scripted transport, and checks the sleep chosen after each
//! cycle together with the order in which tasks see each other's output.

mod common;

use common::ScriptedTransport;
use std::io::Cursor;
use std::time::Duration;
use telemetry_gateway::config::GatewayConfig;
use telemetry_gateway::gateway;
use telemetry_gateway::scheduler::Scheduler;
use telemetry_gateway::sink::MemorySink;
use telemetry_gateway::source::ReaderSource;

fn scheduler_with_input(config: &GatewayConfig, input: &[u8]) -> (Scheduler, ScriptedTransport) {
    let transport = ScriptedTransport::new();
    let source = ReaderSource::new("memory", Cursor::new(input.to_vec()));
    let scheduler = gateway::assemble(
        config,
        source,
        transport.clone(),
        Some(MemorySink::default()),
    )
    .unwrap();
    (scheduler, transport)
}

#[test]
fn test_all_idle_selects_long_sleep() {
    let config = GatewayConfig::default();
    let (mut scheduler, transport) = scheduler_with_input(&config, b"");

    assert_eq!(scheduler.tick().unwrap(), Duration::from_secs(1));
    assert_eq!(scheduler.tick().unwrap(), Duration::from_secs(1));
    assert_eq!(transport.script.borrow().opened, 0);
}

#[test]
fn test_incoming_bytes_select_short_sleep() {
    let config = GatewayConfig::default();
    let (mut scheduler, _transport) = scheduler_with_input(&config, b"no json here");

    assert_eq!(scheduler.tick().unwrap(), Duration::from_millis(10));
}

#[test]
fn test_pacing_follows_configuration() {
    let mut config = GatewayConfig::default();
    config.scheduler.short_sleep = Duration::from_millis(2);
    config.scheduler.long_sleep = Duration::from_millis(250);

    let (mut scheduler, _transport) = scheduler_with_input(&config, b"x");
    assert_eq!(scheduler.tick().unwrap(), Duration::from_millis(2));

    // Serial source drained, framer consumed the chunk: everything idle
    let mut last = Duration::ZERO;
    for _ in 0..5 {
        last = scheduler.tick().unwrap();
    }
    assert_eq!(last, Duration::from_millis(250));
}

#[test]
fn test_record_crosses_all_stages_in_one_cycle() {
    let config = GatewayConfig::default();
    let (mut scheduler, transport) =
        scheduler_with_input(&config, br#"boot banner {"sensor":{"id":7}} trailer"#);

    scheduler.tick().unwrap();

    // Serial → framer → delivery → storage, in that order within the cycle
    let buffers = scheduler.buffers();
    assert!(buffers.raw.is_empty());
    assert_eq!(buffers.delivery.len(), 1);
    assert!(buffers.storage.is_empty());
    assert_eq!(transport.script.borrow().opened, 0);

    // Delivery picked the record up in the same cycle and opens next
    scheduler.tick().unwrap();
    assert_eq!(transport.script.borrow().opened, 1);
}
