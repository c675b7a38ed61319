use imgcheck::ServiceState;
use imgcheck_client::ClientError;
use imgcheck_suite::TestDeployment;
use imgcheck_testbed::IMAGE_API_SERVICE;

#[tokio::test]
async fn paused_service_stops_and_refuses_traffic() {
    let deployment = TestDeployment::start()
        .await
        .expect("Failed to start test deployment");

    deployment
        .harness
        .pause(IMAGE_API_SERVICE)
        .await
        .expect("pause failed");
    let status = deployment
        .harness
        .service_status(IMAGE_API_SERVICE)
        .await
        .expect("status query failed");
    assert_eq!(status.state, ServiceState::Stopped);

    // The image API refuses requests while its service is down.
    let err = deployment
        .images
        .list_by_name("anything")
        .await
        .expect_err("image API answered while paused");
    assert!(matches!(
        err,
        ClientError::UnexpectedStatus { status: 503, .. }
    ));

    deployment
        .harness
        .resume(IMAGE_API_SERVICE)
        .await
        .expect("resume failed");
    let status = deployment
        .harness
        .service_status(IMAGE_API_SERVICE)
        .await
        .expect("status query failed");
    assert_eq!(status.state, ServiceState::Running);

    deployment
        .images
        .list_by_name("anything")
        .await
        .expect("image API still refusing traffic after resume");
}

#[tokio::test]
async fn pause_resume_utility_round_trips() {
    let deployment = TestDeployment::start()
        .await
        .expect("Failed to start test deployment");

    deployment
        .harness
        .pause_resume(&[IMAGE_API_SERVICE])
        .await
        .expect("pause/resume round trip failed");

    let status = deployment
        .harness
        .service_status(IMAGE_API_SERVICE)
        .await
        .expect("status query failed");
    assert_eq!(status.state, ServiceState::Running);
}
