use crate::{
    config::EndpointParseError,
    coordinator::{self, ProvisioningError},
    stream::{ScalingPolicy, memory::InMemoryBackend},
    test::e2e,
};

#[tokio::test]
async fn test_malformed_endpoint_dispatches_nothing() {
    for controller in ["not a uri", "tcp://", "127.0.0.1:9090", "tcp://host:99999"] {
        let mut config = e2e::runtime::bench_config(2, 5, 2, 50);
        config.controller = controller.to_owned();
        let backend = InMemoryBackend::default();

        let err = coordinator::run(&config, &backend).await.unwrap_err();
        assert!(
            matches!(
                err.downcast_ref::<ProvisioningError>(),
                Some(ProvisioningError::Endpoint(_))
            ),
            "controller = {controller}, err = {err}"
        );
        assert_eq!(backend.writers_created(), 0, "controller = {controller}");
        assert_eq!(backend.stream_config("Scope", "aaj"), None);
    }
}

#[tokio::test]
async fn test_endpoint_error_is_reported() {
    let mut config = e2e::runtime::bench_config(1, 1, 1, 10);
    config.controller = String::new();

    let err = coordinator::run(&config, &InMemoryBackend::default())
        .await
        .unwrap_err();
    let Some(ProvisioningError::Endpoint(inner)) = err.downcast_ref::<ProvisioningError>() else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(*inner, EndpointParseError::Empty);
    assert!(err.to_string().starts_with("ProvisioningError:"));
}

#[tokio::test(start_paused = true)]
async fn test_stream_is_provisioned_with_a_segment_per_producer() {
    let config = e2e::runtime::bench_config(3, 1, 1, 10);
    let backend = InMemoryBackend::default();

    coordinator::run(&config, &backend).await.unwrap();

    let stream = backend.stream_config("Scope", "aaj").unwrap();
    assert_eq!(stream.scaling, ScalingPolicy::Fixed(3));

    // provisioning is idempotent: a second run reuses the stream
    coordinator::run(&config, &backend).await.unwrap();
    assert_eq!(backend.events_appended("Scope", "aaj"), Some(6));
}
