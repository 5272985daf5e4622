//! Benchmarks for channel buffer draining
//!
//! Measures how fast a channel reader turns a full read chunk of frames into records,
//! with and without leading garbage the decoder has to skip.

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rttlog::channel::ChannelReader;
use rttlog::config::TimingConfig;
use rttlog::sink::TracingSink;
use rttlog::test_utils::{SyncFrameDecoder, encode_frame, test_catalog};
use std::hint::black_box;

fn frames(count: usize, garbage_every: Option<usize>) -> Vec<u8> {
    let mut bytes = Vec::new();
    for i in 0..count {
        if garbage_every.is_some_and(|every| i % every == 0) {
            bytes.extend_from_slice(&[0x00, 0xff, 0x13]);
        }
        let text = format!(r#"("adc.c", {i}, 1, {i}us, """sample""")value={i}"#);
        bytes.extend(encode_frame(1, text.as_bytes()));
    }
    bytes
}

fn bench_drain(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime");
    let _guard = runtime.enter();
    let catalog = test_catalog();
    let timing = TimingConfig::default();

    let mut group = c.benchmark_group("channel_drain");
    for (name, garbage) in [("clean", None), ("garbage_every_16", Some(16))] {
        let input = frames(512, garbage);
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &input, |b, input| {
            b.iter_batched(
                || {
                    let mut reader = ChannelReader::new(0, &timing);
                    reader.ingest(input);
                    (reader, Vec::with_capacity(512))
                },
                |(mut reader, mut out)| {
                    reader.drain(&SyncFrameDecoder, &catalog, &TracingSink, &mut out);
                    black_box(out)
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_drain);
criterion_main!(benches);
