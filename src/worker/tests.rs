//! End-to-end tests driving a decode worker through a [`CptvPlayer`]

use std::io;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;

use super::*;
use crate::config::DecoderConfig;
use crate::session::SessionState;
use crate::test_utils::{
    FakeEngine, FakeFrame, FakeScript, StallGate, frame_header, header_builder, init_tracing,
};
use crate::{CptvError, Result};

async fn player(script: FakeScript) -> CptvPlayer {
    init_tracing();
    CptvPlayer::spawn::<FakeEngine, _>(async move { Ok(script) }, DecoderConfig::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn frames_stream_yields_every_distinct_frame() {
    let player = player(FakeScript::with_frames(3)).await;
    player.init_with_bytes(vec![0u8; 1000]).await.unwrap();

    let frames: Vec<_> = player.frames().collect().await;
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[2].header.time_on_ms, 1222);
    assert_eq!(player.get_state().await.unwrap(), SessionState::Exhausted);
    assert_eq!(player.get_total_frames().await.unwrap(), Some(3));

    player.terminate().await;
}

#[tokio::test]
async fn frames_stream_skips_repeats() {
    let frame = |time_on_ms| FakeFrame {
        header: frame_header(time_on_ms, 160, 120),
        samples: vec![3000; 160 * 120],
    };
    let frames = vec![frame(1000), frame(1000), frame(1111)];
    let script = FakeScript::new(header_builder().build(), frames);
    let player = player(script).await;
    player.init_with_bytes(vec![0u8; 1000]).await.unwrap();

    let times: Vec<_> = player.frames().map(|f| f.header.time_on_ms).collect().await;
    assert_eq!(times, vec![1000, 1111]);

    player.terminate().await;
}

#[tokio::test]
async fn metadata_crosses_the_worker_boundary() {
    let player = player(FakeScript::with_frames(45)).await;
    player.init_with_bytes(vec![0u8; 500_000]).await.unwrap();

    let metadata = player.get_metadata().await.unwrap();
    assert_eq!(metadata.total_frames, 45);
    assert!((metadata.duration - 5.0).abs() < 1e-9);
    assert_eq!(metadata.header.width, 160);

    player.terminate().await;
}

#[tokio::test]
async fn status_queries_answer_unknown_while_a_read_is_in_flight() {
    let gate = StallGate::default();
    let player = player(FakeScript::with_frames(2).with_gate(gate.clone())).await;
    player.init_with_bytes(vec![0u8; 1000]).await.unwrap();
    assert!(player.get_load_progress().await.unwrap().is_some());

    {
        let read = player.get_next_frame();
        tokio::pin!(read);
        tokio::select! {
            _ = &mut read => panic!("read finished while gated"),
            _ = gate.entered.notified() => {}
        }

        assert_eq!(player.get_load_progress().await.unwrap(), None);
        assert_eq!(player.get_total_frames().await.unwrap(), None);

        gate.release.notify_one();
        let frame = read.await.unwrap();
        assert!(frame.is_some());
    }
    assert!(player.get_load_progress().await.unwrap().is_some());

    player.terminate().await;
}

/// Start a frame read, wait until the engine is stalled inside it, then
/// drop the call.
async fn abandon_gated_read(player: &CptvPlayer, gate: &StallGate) {
    let read = player.get_next_frame();
    tokio::pin!(read);
    tokio::select! {
        _ = &mut read => panic!("read finished while gated"),
        _ = gate.entered.notified() => {}
    }
}

#[tokio::test]
async fn abandoned_call_does_not_shift_later_replies() {
    let gate = StallGate::default();
    let player = player(FakeScript::with_frames(3).with_gate(gate.clone())).await;
    player.init_with_bytes(vec![0u8; 1000]).await.unwrap();

    abandon_gated_read(&player, &gate).await;

    let release = async {
        gate.release.notify_one();
        gate.entered.notified().await;
        gate.release.notify_one();
    };
    let (next, ()) = tokio::join!(player.get_next_frame(), release);

    let frame = next.unwrap().expect("second frame");
    assert_eq!(frame.header.time_on_ms, 1111);
    assert_eq!(player.get_state().await.unwrap(), SessionState::Reading);

    player.terminate().await;
}

#[tokio::test]
async fn terminate_stops_a_worker_stalled_in_the_engine() {
    let gate = StallGate::default();
    let player = player(FakeScript::with_frames(2).with_gate(gate.clone())).await;
    player.init_with_bytes(vec![0u8; 1000]).await.unwrap();

    abandon_gated_read(&player, &gate).await;

    tokio::time::timeout(Duration::from_secs(2), player.terminate())
        .await
        .expect("terminate should not wait for a stalled engine call");
}

#[tokio::test]
async fn init_failure_is_reported_and_recoverable() {
    let player = player(FakeScript::with_frames(1)).await;

    let err = player.init_with_bytes(Vec::new()).await.unwrap_err();
    assert!(matches!(err, CptvError::DecodeInit { .. }));
    assert!(player.has_stream_error().await.unwrap());
    assert_eq!(player.get_state().await.unwrap(), SessionState::Errored);

    player.init_with_bytes(vec![0u8; 100]).await.unwrap();
    assert!(!player.has_stream_error().await.unwrap());
    assert!(player.get_stream_error().await.unwrap().is_none());

    player.terminate().await;
}

#[tokio::test]
async fn stream_transport_errors_surface_as_stream_errors() {
    let player = player(FakeScript::with_frames(3)).await;
    let chunks =
        vec![Ok(Bytes::from_static(&[0u8; 64])), Err(io::Error::other("connection reset"))];
    player.init_with_byte_stream(futures::stream::iter(chunks), Some(4096)).await.unwrap();

    assert!(player.get_header().await.is_err());
    assert!(player.has_stream_error().await.unwrap());
    assert!(matches!(player.get_stream_error().await.unwrap(), Some(CptvError::Source { .. })));

    player.terminate().await;
}

#[tokio::test]
async fn free_resets_the_session_but_keeps_the_worker() {
    let player = player(FakeScript::with_frames(2)).await;
    player.init_with_bytes(vec![0u8; 100]).await.unwrap();
    player.free().await.unwrap();

    assert_eq!(player.get_state().await.unwrap(), SessionState::Empty);
    assert!(player.get_next_frame().await.unwrap().is_none());

    player.init_with_bytes(vec![0u8; 100]).await.unwrap();
    assert!(player.get_next_frame().await.unwrap().is_some());

    player.terminate().await;
}

#[tokio::test]
async fn failed_context_load_fails_spawn() {
    init_tracing();
    let loader = async { Err::<FakeScript, _>(CptvError::decode_init("decoder module missing")) };
    let err = CptvPlayer::spawn::<FakeEngine, _>(loader, DecoderConfig::default()).await.err();

    assert!(matches!(err, Some(CptvError::WorkerUnavailable { .. })));
}

#[tokio::test]
async fn slow_context_load_times_out() {
    init_tracing();
    let loader = async {
        std::future::pending::<()>().await;
        Ok::<_, CptvError>(FakeScript::with_frames(1))
    };
    let config = DecoderConfig::default().with_ready_timeout(Duration::from_millis(20));
    let err = CptvPlayer::spawn::<FakeEngine, _>(loader, config).await.err();

    assert!(matches!(err, Some(CptvError::Timeout { .. })));
}

#[tokio::test]
async fn invalid_config_is_rejected_before_spawning() {
    let config = DecoderConfig { request_capacity: 0, ..DecoderConfig::default() };
    let loader = async { Result::Ok(FakeScript::with_frames(1)) };
    let err = CptvPlayer::spawn::<FakeEngine, _>(loader, config).await.err();

    assert!(matches!(err, Some(CptvError::Config { .. })));
}
