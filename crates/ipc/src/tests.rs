// Path: crates/ipc/src/tests.rs

#[cfg(test)]
mod tests {
    use crate::grpcutils::{
        dial, duration_from_nanos, duration_to_nanos, new_listener, timestamp_as_time,
        timestamp_from_time, ServerCloser,
    };
    use plugvm_types::VmError;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn timestamp_conversion_preserves_instant() {
        let time = UNIX_EPOCH + Duration::new(1_700_000_000, 123_456_789);
        let wire = timestamp_from_time(time);
        assert_eq!(wire.seconds, 1_700_000_000);
        assert_eq!(wire.nanos, 123_456_789);
        assert_eq!(timestamp_as_time(Some(wire)).unwrap(), time);
    }

    #[test]
    fn missing_timestamp_is_rejected() {
        assert!(matches!(
            timestamp_as_time(None),
            Err(VmError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn durations_are_nanoseconds() {
        assert_eq!(duration_to_nanos(Duration::from_millis(3)), 3_000_000);
        assert_eq!(duration_to_nanos(Duration::MAX), i64::MAX);
        assert_eq!(duration_from_nanos(1_500), Duration::from_nanos(1_500));
        assert_eq!(duration_from_nanos(-1), Duration::ZERO);
    }

    #[tokio::test]
    async fn dial_accepts_bare_and_schemed_addresses() {
        assert!(dial("127.0.0.1:9651").is_ok());
        assert!(dial("http://127.0.0.1:9651").is_ok());
        assert!(matches!(dial("not a uri"), Err(VmError::Transport(_))));
    }

    #[tokio::test]
    async fn closer_stops_spawned_servers() {
        let closer = ServerCloser::new();
        let listener = new_listener().await.unwrap();
        assert!(listener.local_addr().unwrap().port() > 0);
        drop(listener);

        closer.spawn("idle", |stop| async move {
            let _ = stop.await;
            Ok(())
        });
        assert_eq!(closer.len(), 1);

        tokio::time::timeout(Duration::from_secs(5), closer.stop())
            .await
            .expect("closer should stop promptly");
        assert!(closer.is_empty());
    }
}
