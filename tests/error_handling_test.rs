use fleet_replay::error::{InputError, SerializationError, StateError, StorageError};
use fleet_replay::{
    parse_event_log, parse_trip_logs, FleetError, PlaybackEngine, ReplayConfig, Replayer,
    TransformConfig, TripTransformer,
};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// **Feature: fleet-trip-replay, Property 17: Malformed Event Context**
    ///
    /// A malformed-event error names the trip, the index, the event and the missing field.
    #[test]
    fn property_malformed_event_context(
        trip_id in "trip_[a-z0-9]{4,8}",
        index in 0usize..10_000,
        event_id in "evt_[a-z0-9]{4,12}",
        field in prop_oneof![Just("location"), Just("trip_id"), Just("event_id")]
    ) {
        let error: FleetError = InputError::malformed(&trip_id, index, &event_id, field).into();
        prop_assert!(error.is_malformed_event());
        prop_assert!(!error.is_invalid_input());

        let message = error.to_string();
        prop_assert!(message.contains(&trip_id));
        let expected_index = format!("index {}", index);
        prop_assert!(message.contains(&expected_index));
        prop_assert!(message.contains(&event_id));
        prop_assert!(message.contains(field));
    }

    /// **Feature: fleet-trip-replay, Property 18: Garbage Logs Fail Cleanly**
    #[test]
    fn property_garbage_log_is_serialization_error(garbage in "[a-z{}\\[\\]:,]{0,40}") {
        if let Err(error) = parse_event_log(&garbage) {
            let is_deserialization = matches!(error, SerializationError::DeserializationFailed { .. });
            prop_assert!(is_deserialization);
        }
    }
}

#[test]
fn test_error_conversions() {
    let storage: FleetError = StorageError::ReadFailed {
        key: "fleet_trip_1".to_string(),
        reason: "timeout".to_string(),
    }
    .into();
    assert!(matches!(storage, FleetError::Storage(_)));
    assert!(storage.to_string().contains("fleet_trip_1"));

    let state: FleetError = StateError::Mismatch {
        expected: "trip_a".to_string(),
        actual: "trip_b".to_string(),
    }
    .into();
    assert_eq!(state.to_string(), "State error: State mismatch: expected trip_a, got trip_b");
}

#[test]
fn test_invalid_config_rejected() {
    let config = TransformConfig::default().with_safety_penalty(3.0, 120.0);
    match TripTransformer::new(config) {
        Err(FleetError::Input(InputError::InvalidConfig { reason })) => {
            assert!(reason.contains("safety_score_floor"));
        }
        other => panic!("expected invalid config, got {:?}", other.map(|_| ())),
    }

    assert!(TransformConfig::from_json("{\"route_sample_target\": -1}").is_err());
    assert!(ReplayConfig::from_json("[]").is_err());
}

#[test]
fn test_parse_failures() {
    assert!(parse_event_log("{}").is_err());
    assert!(parse_trip_logs("[{}]").is_err());

    // Missing the required identity fields
    assert!(parse_event_log(r#"[{"event_type": "trip_started"}]"#).is_err());
    assert!(parse_event_log(r#"[{"event_id": "e", "event_type": "x", "timestamp": "yesterday",
        "vehicle_id": "v", "trip_id": "t"}]"#)
        .is_err());
}

#[test]
fn test_unlocated_first_event_is_malformed() {
    let events = parse_event_log(
        r#"[{"event_id": "e0", "event_type": "trip_started", "timestamp": 0,
             "vehicle_id": "VH_1", "trip_id": "trip_1"}]"#,
    )
    .unwrap();
    let err = PlaybackEngine::new().initialize("trip_1", &events, 10.0).unwrap_err();
    assert!(err.is_malformed_event());
}
