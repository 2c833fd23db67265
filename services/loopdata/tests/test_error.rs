use loopdata::units::{Unit, UnitGroup};
use loopdata::LoopDataError;

#[test]
fn test_error_messages() {
    assert_eq!(
        LoopDataError::Config("bad week".to_string()).to_string(),
        "Configuration error: bad week"
    );
    assert_eq!(
        LoopDataError::UnknownObservation("mystery".to_string()).to_string(),
        "Unknown observation: mystery"
    );
    assert_eq!(
        LoopDataError::History("offline".to_string()).to_string(),
        "Historical store error: offline"
    );
    let conversion = LoopDataError::Conversion {
        from: Unit::MilePerHour,
        group: UnitGroup::Temperature,
    };
    assert!(conversion.to_string().starts_with("Cannot convert"));
}

#[test]
fn test_io_and_json_errors_convert() {
    let io: LoopDataError =
        std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(matches!(io, LoopDataError::Io(_)));
    assert!(io.to_string().starts_with("IO error:"));

    let json: LoopDataError = serde_json::from_str::<serde_json::Value>("{")
        .unwrap_err()
        .into();
    assert!(matches!(json, LoopDataError::Json(_)));
}

#[test]
fn test_errors_are_send_and_sync() {
    fn assert_send_sync<T: Send + Sync + std::error::Error>() {}
    assert_send_sync::<LoopDataError>();
}
