//! Benchmarks for the advertisement processing pipeline.
//!
//! Covers the hot path a busy channel exercises per packet: the address
//! filter, the payload decoder, and a full controller event dispatch.

use atc_listener::{
    AnomalyThresholds, DeviceFilter, MacAddress, Radio, RadioError, RadioEvent, RawAdvertisement,
    ScanController, decode_advertisement,
};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

const SENSOR_MAC: MacAddress = MacAddress([0xA4, 0xC1, 0x38, 0x11, 0x22, 0x33]);

/// A 16-byte ATC advertising payload with known field values.
fn atc_payload() -> Vec<u8> {
    vec![
        0x10, // AD structure length
        0x16, // AD type: service data
        0x1A, 0x18, // environmental sensing service UUID, little-endian
        0xA4, 0xC1, 0x38, // embedded source address, vendor prefix
        0x11, 0x22, 0x33, // embedded source address, device suffix
        0x00, 0x96, // temperature: 15.0°C
        0x2A, // humidity: 42%
        0x50, // battery: 80%
        0x0B, 0xB8, // battery voltage: 3000 mV
    ]
}

fn atc_advertisement() -> RawAdvertisement {
    RawAdvertisement {
        address: SENSOR_MAC,
        payload: atc_payload(),
        rssi: -63,
    }
}

/// Radio stub; the benchmarks only exercise event handling.
struct NullRadio;

impl Radio for NullRadio {
    fn start_scan(&mut self, _duration_secs: u32) -> Result<(), RadioError> {
        Ok(())
    }

    fn stop_scan(&mut self) -> Result<(), RadioError> {
        Ok(())
    }
}

fn bench_filter(c: &mut Criterion) {
    let filter = DeviceFilter::default();
    let payload = atc_payload();
    let foreign = MacAddress([0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01]);

    c.bench_function("filter_match", |b| {
        b.iter(|| filter.matches(black_box(&SENSOR_MAC), black_box(&payload)))
    });

    c.bench_function("filter_miss", |b| {
        b.iter(|| filter.matches(black_box(&foreign), black_box(&payload)))
    });
}

fn bench_decode(c: &mut Criterion) {
    let payload = atc_payload();

    c.bench_function("decode", |b| {
        b.iter(|| decode_advertisement(black_box(&payload), black_box(-63)))
    });
}

fn bench_controller_event(c: &mut Criterion) {
    let mut controller = ScanController::new(
        NullRadio,
        DeviceFilter::default(),
        AnomalyThresholds::default(),
    );
    controller
        .start(6, Box::new(|reading| {
            black_box(reading);
        }))
        .unwrap();
    let adv = atc_advertisement();

    c.bench_function("controller_advertisement", |b| {
        b.iter(|| controller.handle_event(RadioEvent::Advertisement(black_box(adv.clone()))))
    });
}

criterion_group!(benches, bench_filter, bench_decode, bench_controller_event);
criterion_main!(benches);
