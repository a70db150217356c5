//! Simulated adapter -> scheduler -> decoder, for every vehicle family

use obd_protocol::{ObdClient, Response};
use obd_scheduler::{QueueScheduler, SchedulerConfig, SchedulerEvent};
use proptest::prelude::*;
use std::time::{Duration, Instant};
use vehicle_decoder::{samples, DecodeContext, Decoder, VehicleFamily, VehicleModel};
use vehicle_telemetry::TelemetryRecord;

/// Poll `model` against its sample responses until one full cycle completes
fn poll_one_cycle(model: VehicleModel) -> (TelemetryRecord, Vec<SchedulerEvent>) {
    let decoder = Decoder::for_model(model);
    let (mut client, rx) = ObdClient::simulated(samples::responses(model.family()));
    let queue = decoder.command_queue().unwrap();
    let mut scheduler = QueueScheduler::new(queue, SchedulerConfig::default(), rx);

    let mut record = decoder.new_record();
    let ctx = DecodeContext::now();
    let mut handler = |response: &Response| {
        decoder.decode(response, &mut record, &ctx);
    };

    let mut events = Vec::new();
    let mut now = Instant::now();
    for _ in 0..500 {
        let batch = scheduler.tick(now, &mut client, &mut handler);
        let done = batch
            .iter()
            .any(|e| matches!(e, SchedulerEvent::CycleComplete { .. }));
        events.extend(batch);
        if done {
            break;
        }
        now += Duration::from_millis(2);
    }
    (record, events)
}

#[test]
fn test_every_family_decodes_a_full_cycle() {
    for family in VehicleFamily::ALL {
        let model = VehicleModel::ALL
            .into_iter()
            .find(|m| m.family() == family)
            .unwrap();
        let (record, events) = poll_one_cycle(model);

        assert!(
            events
                .iter()
                .any(|e| matches!(e, SchedulerEvent::CycleComplete { cycle: 1, .. })),
            "{model}: {events:?}"
        );
        assert!(
            !events.iter().any(|e| matches!(e, SchedulerEvent::NoData { .. })),
            "{model}: {events:?}"
        );
        assert!(record.soc_perc.is_some(), "{model}");
        assert!(record.bat_voltage.is_some(), "{model}");
        assert!(record.bat_power_kw.is_some_and(|p| p > 0.0), "{model}");
        assert!(record.odo_km.is_some(), "{model}");
        assert_eq!(record.odo_km_start, record.odo_km, "{model}");
    }
}

#[test]
fn test_pipeline_matches_direct_decode() {
    let (record, _) = poll_one_cycle(VehicleModel::HyundaiKona64);
    assert_eq!(record.soc_perc, Some(55.5));
    assert_eq!(record.bat_voltage, Some(360.0));
    assert_eq!(record.bat_temp_c, Some(19.0));
    assert_eq!(record.known_cell_voltages().count(), 98);
    assert!(record.tires.iter().all(|t| t.pressure_bar.is_some()));
}

#[test]
fn test_smaller_pack_polls_fewer_banks() {
    let (record, events) = poll_one_cycle(VehicleModel::HyundaiIoniq5Sr58);
    assert!(!events.iter().any(|e| matches!(e, SchedulerEvent::NoData { .. })));
    assert_eq!(record.known_cell_voltages().count(), 144);
    assert_eq!(record.module_temps_c.iter().flatten().count(), 16);
}

#[test]
fn test_snapshot_serializes() {
    let (record, _) = poll_one_cycle(VehicleModel::SkodaEnyaq62);
    let json = serde_json::to_value(&*record.snapshot()).unwrap();
    assert_eq!(json["soc_perc"], serde_json::json!(70.0));
    assert_eq!(json["odo_km"], serde_json::json!(15000.0));
}

/// Sample payload for `(header, request)`
fn sample(family: VehicleFamily, header: &str, request: &str) -> String {
    samples::responses(family)
        .into_iter()
        .find(|(h, r, _)| *h == header && *r == request)
        .map(|(_, _, p)| p)
        .unwrap()
}

fn decode_one(
    model: VehicleModel,
    header: &str,
    request: &str,
    payload: &str,
    record: &mut TelemetryRecord,
) {
    let mut ecu = obd_protocol::EcuContext::new();
    ecu.on_send(&format!("ATSH{header}").parse().unwrap());
    ecu.on_send(&request.parse().unwrap());
    let response = ecu.response(obd_protocol::Payload::new(payload));
    Decoder::for_model(model).decode(&response, record, &DecodeContext::now());
}

proptest! {
    #[test]
    fn prop_truncated_payload_never_panics(cut in 0usize..124) {
        let model = VehicleModel::KiaEniro64;
        let full = sample(VehicleFamily::KiaEniro, "7E4", "220101");
        let mut record = Decoder::for_model(model).new_record();
        record.odo_km = Some(1000.0);

        decode_one(model, "7E4", "220101", &full[..cut.min(full.len())], &mut record);

        // Fields owned by other responses stay as they were
        prop_assert_eq!(record.odo_km, Some(1000.0));
        prop_assert!(record.soc_perc.is_none());
        prop_assert!(record.tires.iter().all(|t| t.pressure_bar.is_none()));
        // Fields past the cut are never invented
        if cut < 122 {
            prop_assert!(record.isolation_resistance_kohm.is_none());
        }
    }

    #[test]
    fn prop_arbitrary_payload_never_panics(
        family_index in 0usize..VehicleFamily::ALL.len(),
        body in "[0-9A-F]{0,300}",
    ) {
        let family = VehicleFamily::ALL[family_index];
        let model = VehicleModel::ALL.into_iter().find(|m| m.family() == family).unwrap();
        for (header, request, _) in samples::responses(family) {
            let mut record = Decoder::for_model(model).new_record();
            let sid = u8::from_str_radix(&request[..2], 16).unwrap() + 0x40;
            let payload = format!("{sid:02X}{}{body}", &request[2..]);
            decode_one(model, header, request, &payload, &mut record);
            prop_assert!(record.soc_perc.map_or(true, f64::is_finite));
            prop_assert!(record.bat_power_kw.map_or(true, f64::is_finite));
        }
    }
}
