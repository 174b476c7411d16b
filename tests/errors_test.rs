#[cfg(test)]
mod error_tests {
    use pitchcam::errors::CaptureError;
    use std::error::Error;

    #[test]
    fn test_device_unavailable_message() {
        let error = CaptureError::DeviceUnavailable("no ultraWide lens".to_string());
        assert!(error.to_string().contains("Capture device unavailable"));
        assert!(error.to_string().contains("no ultraWide lens"));
    }

    #[test]
    fn test_recording_in_progress_display() {
        let error = CaptureError::RecordingInProgress;
        assert_eq!(
            format!("{}", error),
            "Operation rejected while a recording is in progress"
        );
    }

    #[test]
    fn test_no_suitable_format_debug_format() {
        let error = CaptureError::NoSuitableFormat("Debug test".to_string());
        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("NoSuitableFormat"));
        assert!(debug_str.contains("Debug test"));
    }

    #[test]
    fn test_error_implements_error_trait() {
        let error = CaptureError::InputAttachFailed("Error trait test".to_string());
        let _error_trait: &dyn Error = &error;
        assert!(error.source().is_none());
    }

    #[test]
    fn test_error_is_clone_and_comparable() {
        let error = CaptureError::RecordingFailed("disk full".to_string());
        let published = error.clone();
        assert_eq!(error, published);
        assert_ne!(error, CaptureError::RecordingInProgress);
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only volume");
        let error: CaptureError = io.into();
        assert!(matches!(error, CaptureError::Io(ref msg) if msg.contains("read-only volume")));
    }

    #[test]
    fn test_json_error_conversion() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: CaptureError = parse.into();
        assert!(matches!(error, CaptureError::Serialization(_)));
        assert!(error.to_string().starts_with("Serialization error"));
    }

    #[test]
    fn test_errors_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CaptureError>();
    }
}
