//! Integration tests: open → switch → close sessions against the mock firmware.
//!
//! These go through the public API only, checking the frames that reach the
//! device and that every USB handle is released at the end.

use std::time::Duration;

use rfrelay_lib::config::Config;
use rfrelay_lib::matcher::{MatchPattern, ScanOptions};
use rfrelay_lib::protocol::*;
use rfrelay_lib::transport::mock::{MockHandle, MockTransport, MockUnit};
use rfrelay_lib::{Backend, RelayBank, RelayDevice, RelayError, RelaySwitch, SwitchBox};

fn bench() -> MockTransport {
    MockTransport::new(vec![
        MockUnit::new("11405130032", "USB-1SP8T-63H"),
        MockUnit::new("11405130045", "USB-2SP4T-63H"),
        MockUnit::new("11908220007", "RC-2SPDT-A18"),
    ])
}

fn open(transport: &MockTransport, serial: &str, model: &str) -> RelayDevice<MockHandle> {
    RelayDevice::open(
        transport,
        &ScanOptions::default(),
        &MatchPattern::new(serial, model),
        "bench",
    )
    .unwrap()
}

// ── Test: solid-state session ──

#[test]
fn solid_state_session() {
    let transport = bench();
    let dev = open(&transport, "032", "*");
    assert_eq!(dev.model(), "USB-1SP8T-63H");

    let sw = RelaySwitch::new(&dev, 'A').unwrap();
    for n in 1..=8 {
        sw.set_position(n).unwrap();
        assert_eq!(sw.get_position().unwrap(), n);
    }
    assert_eq!(transport.scpi_log(0)[6], ":SP8T:STATE:4");

    dev.close();
    let stats = transport.stats();
    assert_eq!(stats.open_now, 0, "all handles released");
    assert_eq!(stats.max_open, 1, "at most one device open at a time");
}

// ── Test: two switches share one device ──

#[test]
fn two_switches_share_one_device() {
    let transport = bench();
    let dev = open(&transport, "*", "2SP4T");
    let a = RelaySwitch::new(&dev, 'a').unwrap();
    let b = RelaySwitch::new(&dev, 'b').unwrap();
    assert_eq!(a.name(), "benchA");
    assert_eq!(b.name(), "benchB");

    a.set_position(1).unwrap();
    b.set_position(4).unwrap();
    assert_eq!(a.get_position().unwrap(), 1);
    assert_eq!(b.get_position().unwrap(), 4);

    dev.close();
    assert!(matches!(a.get_position(), Err(RelayError::DeviceClosed)));
    assert!(matches!(b.set_position(2), Err(RelayError::DeviceClosed)));
}

// ── Test: mechanical session with discard reads ──

#[test]
fn mechanical_session_frames() {
    let transport = bench();
    let dev = open(&transport, "*", "SPDT");
    assert_eq!(dev.relay_count(), 2);
    transport.clear_io();

    let sw = RelaySwitch::new(&dev, 'B').unwrap();
    sw.set_position(2).unwrap();
    assert_eq!(sw.get_position().unwrap(), 2);

    let stats = transport.stats();
    let opcodes: Vec<u8> = stats.writes.iter().map(|w| w[0]).collect();
    assert_eq!(
        opcodes,
        vec![
            op_set_relay(1),
            OP_GET_SERIAL,
            OP_GET_ALL_RELAYS,
            OP_GET_SERIAL,
            OP_GET_SERIAL,
        ]
    );
    assert!(stats.writes.iter().all(|w| w.len() == FRAME_SIZE));
    assert_eq!(transport.relay_mask(2), 0b10);
}

#[test]
fn switch_box_drives_whole_mask() {
    let transport = bench();
    let dev = open(&transport, "0007", "*");
    let bx = SwitchBox::new(&dev, dev.name());
    bx.set_position(0b11).unwrap();
    assert_eq!(bx.get_position().unwrap(), 0b11);
    assert_eq!(dev.get_all_relays().unwrap(), 0b11);
    assert_eq!(RelayBank::relay_count(&dev), 2);
}

// ── Test: discovery ──

#[test]
fn list_all_then_open_each() {
    let transport = bench();
    let listing = RelayDevice::<MockHandle>::list_matches(
        &transport,
        &ScanOptions::default(),
        &MatchPattern::any(),
    )
    .unwrap();
    assert_eq!(listing.len(), 3);
    assert_eq!(transport.stats().open_now, 0);

    for entry in &listing {
        let dev = open(&transport, &entry.serial, &entry.model);
        assert_eq!(dev.serial(), entry.serial);
        assert_eq!(dev.query_serial_number().unwrap(), entry.serial);
    }
    assert_eq!(transport.stats().open_now, 0);
}

#[test]
fn no_match_is_not_found_but_empty_list() {
    let transport = bench();
    let pattern = MatchPattern::new("*", "ZFSWA");
    let listing =
        RelayDevice::<MockHandle>::list_matches(&transport, &ScanOptions::default(), &pattern)
            .unwrap();
    assert!(listing.is_empty());
    let err = RelayDevice::open(&transport, &ScanOptions::default(), &pattern, "x")
        .err()
        .unwrap();
    assert!(matches!(err, RelayError::NotFound));
    assert_eq!(err.to_string(), "Relay device not found");
}

#[test]
fn config_drives_scan() {
    let transport = bench();
    let config = Config {
        model: "SP8T".into(),
        timeout_ms: 200,
        ..Config::default()
    };
    let opts = config.scan_options().unwrap();
    assert_eq!(opts.timeout, Duration::from_millis(200));
    let dev = RelayDevice::open(&transport, &opts, &config.pattern(), &config.name).unwrap();
    assert_eq!(dev.model(), "USB-1SP8T-63H");
    assert_eq!(dev.name(), "relay");
}

#[test]
fn foreign_ids_find_nothing() {
    let transport = bench();
    let mut opts = Backend::MiniCircuits.scan_options(Duration::from_millis(100));
    opts.product_id = 0x0023;
    let listing =
        RelayDevice::<MockHandle>::list_matches(&transport, &opts, &MatchPattern::any()).unwrap();
    assert!(listing.is_empty());
    assert_eq!(transport.stats().opens, 0);
}
