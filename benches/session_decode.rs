//! Benchmarks for session and worker decode overhead
//!
//! Uses the scripted engine from `test_utils`, so the numbers cover only
//! orchestration: locking, engine hand-off, deduplication and (for the worker
//! variant) the request/response round trip per frame.
//!
//! Platform: Cross-platform (synthetic recordings, CI-safe)

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use cptv_player::test_utils::{FakeEngine, FakeScript};
use cptv_player::{BufferedSource, CptvPlayer, DecodeSession, DecoderConfig};
use futures::StreamExt;
use std::hint::black_box;
use std::sync::Arc;

const FRAMES: usize = 100;
const RECORDING_BYTES: usize = 256 * 1024;

fn bench_session_reads(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let script = FakeScript::with_frames(FRAMES);
    let bytes = vec![0u8; RECORDING_BYTES];

    let mut group = c.benchmark_group("session_decode");
    group.throughput(Throughput::Elements(FRAMES as u64));

    group.bench_function("direct_session", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let session = DecodeSession::<FakeEngine>::new(Arc::new(script.clone()));
                let source = BufferedSource::new(bytes.clone(), Some(16 * 1024));
                session.init(Box::new(source)).await.unwrap();

                let mut read = 0;
                while let Some(frame) = session.fetch_next_frame().await {
                    read += black_box(frame).samples.len();
                }
                session.free().await;
                black_box(read)
            })
        })
    });

    group.finish();
}

fn bench_worker_round_trips(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let script = FakeScript::with_frames(FRAMES);
    let player = runtime
        .block_on(CptvPlayer::spawn::<FakeEngine, _>(
            async move { Ok(script) },
            DecoderConfig::default().with_max_chunk_size(16 * 1024),
        ))
        .unwrap();
    let bytes = vec![0u8; RECORDING_BYTES];

    let mut group = c.benchmark_group("worker_decode");
    group.throughput(Throughput::Elements(FRAMES as u64));

    group.bench_function("frames_stream", |b| {
        b.iter(|| {
            runtime.block_on(async {
                player.init_with_bytes(bytes.clone()).await.unwrap();
                let count = player.frames().count().await;
                black_box(count)
            })
        })
    });

    group.finish();
    runtime.block_on(player.terminate());
}

criterion_group!(benches, bench_session_reads, bench_worker_round_trips);
criterion_main!(benches);
