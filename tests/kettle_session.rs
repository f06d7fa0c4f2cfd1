use std::time::Duration;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

fn kettle_config() -> g200s::KettleConfig {
    g200s::KettleConfig::builder()
        .address("E7:6C:1D:02:0A:F0")
        .build()
}

async fn establish_fake(
    fake_config: g200s::FakeKettleConfig,
) -> Result<(g200s::Kettle, g200s::CommandJournal), g200s::ProtocolError> {
    let link = g200s::FakeDeviceLink::new(fake_config);
    let journal = link.journal();
    let kettle = g200s::Kettle::establish(Box::new(link), &kettle_config()).await?;
    Ok((kettle, journal))
}

fn method_bytes(journal: &g200s::CommandJournal) -> Vec<u8> {
    journal.frames().iter().map(|frame| frame[2]).collect()
}

#[tokio::test]
async fn establish_sends_auth_version_status_in_order() -> anyhow::Result<()> {
    let (kettle, journal) = establish_fake(g200s::FakeKettleConfig::builder().build()).await?;

    assert_eq!(vec![0xFF, 0x01, 0x06], method_bytes(&journal));
    assert_eq!(
        vec![0x55, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xAA],
        journal.frames()[0]
    );

    assert!(kettle.is_authenticated());
    assert_eq!(Some(g200s::FirmwareVersion::new(3, 8)), kettle.version());
    let status = kettle.status().expect("handshake stores a status snapshot");
    assert_eq!(g200s::Mode::Boiling, status.mode());
    assert_eq!(0, status.target_temperature());
    assert_eq!(23, status.current_temperature());
    assert_eq!(g200s::RunState::Stopped, status.state());

    kettle.close().await?;
    Ok(())
}

#[tokio::test]
async fn refused_key_stops_the_handshake_before_the_version_query() -> anyhow::Result<()> {
    let fake_config = g200s::FakeKettleConfig::builder()
        .accepted_key("0011223344556677".parse::<g200s::AccessKey>()?)
        .build();
    let link = g200s::FakeDeviceLink::new(fake_config);
    let journal = link.journal();

    let error = g200s::Kettle::establish(Box::new(link), &kettle_config())
        .await
        .expect_err("handshake with the wrong key should fail");

    match error {
        g200s::ProtocolError::Command(command_error) => assert_eq!(
            g200s::CommandError::AuthenticationRequired {
                method: g200s::Method::Version,
            },
            *command_error,
        ),
        other => panic!("unexpected error: {other:?}"),
    }
    // Only the AUTH frame reached the device; the gated VERSION query was
    // refused locally without a write.
    assert_eq!(vec![0xFF], method_bytes(&journal));
    Ok(())
}

#[tokio::test]
async fn set_heating_executes_stop_configure_run_refresh() -> anyhow::Result<()> {
    let (mut kettle, journal) = establish_fake(g200s::FakeKettleConfig::builder().build()).await?;

    let status = kettle.set_heating(60).await?;

    assert_eq!(g200s::Mode::Heat, status.mode());
    assert_eq!(60, status.target_temperature());
    assert_eq!(23, status.current_temperature());
    assert_eq!(g200s::RunState::Running, status.state());

    assert_eq!(
        vec![0xFF, 0x01, 0x06, 0x04, 0x05, 0x03, 0x06],
        method_bytes(&journal)
    );
    assert_eq!(
        vec![
            0x55, 4, 5, 1, 0, 60, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x80, 0, 0, 0xAA,
        ],
        journal.frames()[4]
    );
    Ok(())
}

#[tokio::test]
async fn set_boiling_resets_the_target_temperature() -> anyhow::Result<()> {
    let fake_config = g200s::FakeKettleConfig::builder()
        .status("heat|60|70|stopped".parse::<g200s::StatusFixture>()?)
        .build();
    let (mut kettle, journal) = establish_fake(fake_config).await?;

    let status = kettle.set_boiling().await?;

    assert_eq!(g200s::Mode::Boiling, status.mode());
    assert_eq!(0, status.target_temperature());
    assert_eq!(70, status.current_temperature());
    assert_eq!(g200s::RunState::Running, status.state());

    let configure_frame = &journal.frames()[4];
    assert_eq!(5, configure_frame[2]);
    assert_eq!(0, configure_frame[3]);
    assert_eq!(0, configure_frame[5]);
    Ok(())
}

#[tokio::test]
async fn set_mode_rejection_surfaces_the_reply_frame() -> anyhow::Result<()> {
    let fake_config = g200s::FakeKettleConfig::builder()
        .status("heat|60|70|running".parse::<g200s::StatusFixture>()?)
        .scenario(
            g200s::FakeScenario::builder()
                .set_mode(g200s::ReplyAction::Reject)
                .build(),
        )
        .build();
    let (mut kettle, _journal) = establish_fake(fake_config).await?;

    let error = kettle
        .set_heating(90)
        .await
        .expect_err("a refused SET_MODE should fail the mode change");

    match error {
        g200s::ProtocolError::Command(command_error) => assert_eq!(
            g200s::CommandError::SetModeRejected {
                frame: vec![0x55, 4, 5, 0, 0xAA],
            },
            *command_error,
        ),
        other => panic!("unexpected error: {other:?}"),
    }

    // The refused configure step left the programme untouched.
    let status = kettle.refresh_status().await?;
    assert_eq!(g200s::Mode::Heat, status.mode());
    assert_eq!(60, status.target_temperature());
    Ok(())
}

#[tokio::test]
async fn run_refusal_skips_the_status_refresh() -> anyhow::Result<()> {
    let fake_config = g200s::FakeKettleConfig::builder()
        .scenario(
            g200s::FakeScenario::builder()
                .run(g200s::ReplyAction::Reject)
                .build(),
        )
        .build();
    let (mut kettle, journal) = establish_fake(fake_config).await?;

    let error = kettle
        .run()
        .await
        .expect_err("a refused RUN should fail the command");

    assert_matches!(
        &error,
        g200s::ProtocolError::Command(command_error)
            if matches!(command_error.as_ref(), g200s::CommandError::RunRejected { .. })
    );
    assert_eq!(vec![0xFF, 0x01, 0x06, 0x03], method_bytes(&journal));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn silent_device_reports_a_notify_timeout() -> anyhow::Result<()> {
    let fake_config = g200s::FakeKettleConfig::builder()
        .scenario(
            g200s::FakeScenario::builder()
                .stop(g200s::ReplyAction::Silent)
                .build(),
        )
        .build();
    let (mut kettle, _journal) = establish_fake(fake_config).await?;

    let error = kettle
        .stop()
        .await
        .expect_err("a silent device should time the command out");

    match error {
        g200s::ProtocolError::Command(command_error) => assert_eq!(
            g200s::CommandError::NotifyTimeout {
                method: g200s::Method::Stop,
                waited: g200s::DEFAULT_NOTIFY_TIMEOUT,
            },
            *command_error,
        ),
        other => panic!("unexpected error: {other:?}"),
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn notify_timeout_honours_the_configured_bound() -> anyhow::Result<()> {
    let fake_config = g200s::FakeKettleConfig::builder()
        .scenario(
            g200s::FakeScenario::builder()
                .auth(g200s::ReplyAction::Silent)
                .build(),
        )
        .build();
    let link = g200s::FakeDeviceLink::new(fake_config);
    let config = g200s::KettleConfig::builder()
        .address("E7:6C:1D:02:0A:F0")
        .notify_timeout(Duration::from_millis(250))
        .build();

    let started_at = tokio::time::Instant::now();
    let error = g200s::Kettle::establish(Box::new(link), &config)
        .await
        .expect_err("a silent key exchange should time out");
    assert_eq!(Duration::from_millis(250), started_at.elapsed());

    match error {
        g200s::ProtocolError::Command(command_error) => assert_eq!(
            g200s::CommandError::NotifyTimeout {
                method: g200s::Method::Auth,
                waited: Duration::from_millis(250),
            },
            *command_error,
        ),
        other => panic!("unexpected error: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn late_status_reply_is_skipped_not_matched() -> anyhow::Result<()> {
    let fake_config = g200s::FakeKettleConfig::builder().build();
    let mut link = g200s::FakeDeviceLink::new(fake_config);
    let journal = link.journal();

    // A stale GET_MODE reply from an earlier window arrives ahead of the
    // AUTH reply. It must be absorbed without satisfying the AUTH exchange.
    let mut stale_payload = [0u8; 16];
    stale_payload[0] = 3;
    stale_payload[5] = 45;
    stale_payload[8] = 2;
    link.inject_notification(g200s::FrameCodec::encode(
        99,
        g200s::Method::GetMode,
        &stale_payload,
    ));

    let kettle = g200s::Kettle::establish(Box::new(link), &kettle_config()).await?;

    assert!(kettle.is_authenticated());
    assert_eq!(vec![0xFF, 0x01, 0x06], method_bytes(&journal));
    // The handshake's own refresh overwrote the stale snapshot.
    let status = kettle.status().expect("handshake stores a status snapshot");
    assert_eq!(g200s::Mode::Boiling, status.mode());
    assert_eq!(g200s::RunState::Stopped, status.state());
    Ok(())
}

#[tokio::test]
async fn stale_rejected_ack_fails_the_active_exchange() -> anyhow::Result<()> {
    let fake_config = g200s::FakeKettleConfig::builder().build();
    let mut link = g200s::FakeDeviceLink::new(fake_config);

    let stale_frame = g200s::FrameCodec::encode(99, g200s::Method::Stop, &[0x00]);
    link.inject_notification(stale_frame.clone());

    let error = g200s::Kettle::establish(Box::new(link), &kettle_config())
        .await
        .expect_err("an absorbed rejection should fail the exchange");

    match error {
        g200s::ProtocolError::Command(command_error) => assert_eq!(
            g200s::CommandError::StopRejected { frame: stale_frame },
            *command_error,
        ),
        other => panic!("unexpected error: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn sequence_wraps_to_zero_after_one_hundred() -> anyhow::Result<()> {
    let (mut kettle, journal) = establish_fake(g200s::FakeKettleConfig::builder().build()).await?;

    for _ in 0..99 {
        kettle.refresh_status().await?;
    }

    let frames = journal.frames();
    assert_eq!(102, frames.len());
    assert_eq!(g200s::SEQUENCE_MAX, frames[100][1]);
    assert_eq!(0, frames[101][1]);
    Ok(())
}

#[tokio::test]
async fn fake_client_matches_addresses_case_insensitively() -> anyhow::Result<()> {
    let client = g200s::fake_hardware_client(g200s::FakeArgs::builder().build()).await?;
    let link = client.connect("e7:6c:1d:02:0a:f0").await?;
    assert_eq!("E7:6C:1D:02:0A:F0", link.device().address());
    link.close().await?;
    Ok(())
}

#[tokio::test]
async fn fake_client_reports_unknown_addresses() -> anyhow::Result<()> {
    let client = g200s::fake_hardware_client(g200s::FakeArgs::builder().build()).await?;
    let error = client
        .connect("AA:BB:CC:DD:EE:FF")
        .await
        .expect_err("an unknown address should not connect");

    assert_matches!(
        error,
        g200s::InteractionError::DeviceNotFound { address } if address == "AA:BB:CC:DD:EE:FF"
    );
    Ok(())
}
