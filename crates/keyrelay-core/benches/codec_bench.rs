//! Criterion benchmarks for the KeyRelay wire codec and keystroke pipeline.
//!
//! Run with:
//! ```bash
//! cargo bench --package keyrelay-core --bench codec_bench
//! ```

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use keyrelay_core::protocol::{
    decode_message, encode_frame, encode_message, CodecLimits, FrameDecoder, Message, ScreenInfo,
};
use keyrelay_core::{
    KeyAction, KeyId, KeyResolver, KeystrokePlanner, ModifierMask, ModifierTracker, StaticLayout,
};

// ── Message fixtures ──────────────────────────────────────────────────────────

fn fixtures() -> Vec<(&'static str, Message)> {
    vec![
        (
            "KeyDown",
            Message::KeyDown {
                id: KeyId(0x41),
                mask: ModifierMask::SHIFT,
                button: 0x41,
            },
        ),
        (
            "KeyRepeat",
            Message::KeyRepeat {
                id: KeyId(0x61),
                mask: ModifierMask::empty(),
                count: 3,
                button: 0x41,
            },
        ),
        ("MouseRelativeMove", Message::MouseRelativeMove { dx: 10, dy: -5 }),
        ("MouseWheel", Message::MouseWheel { x_delta: 0, y_delta: -120 }),
        ("KeepAlive", Message::KeepAlive),
        (
            "HelloBack",
            Message::HelloBack {
                major: 1,
                minor: 6,
                name: "benchmark-client".to_string(),
            },
        ),
        (
            "Info",
            Message::Info(ScreenInfo {
                x: 0,
                y: 0,
                width: 1920,
                height: 1080,
                mouse_x: 960,
                mouse_y: 540,
            }),
        ),
        ("SetOptions(16)", Message::SetOptions((0..16).map(|i| (i, i * 2)).collect())),
    ]
}

// ── Benchmark groups ──────────────────────────────────────────────────────────

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_message");
    for (name, msg) in fixtures() {
        group.bench_with_input(BenchmarkId::new("msg", name), &msg, |b, msg| {
            b.iter(|| encode_message(black_box(msg)).expect("encode must succeed"))
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let limits = CodecLimits::default();
    let mut group = c.benchmark_group("decode_message");
    for (name, msg) in fixtures() {
        let bytes = encode_message(&msg).expect("encode must succeed for benchmark setup");
        group.bench_with_input(BenchmarkId::new("msg", name), &bytes, |b, bytes| {
            b.iter(|| decode_message(black_box(bytes), &limits).expect("decode must succeed"))
        });
    }
    group.finish();
}

/// Framed stream of 64 key events split into socket-sized reads.
fn bench_frame_stream(c: &mut Criterion) {
    let mut stream = Vec::new();
    for i in 0..64u32 {
        let msg = Message::KeyDown {
            id: KeyId(0x61 + i % 26),
            mask: ModifierMask::empty(),
            button: i as u16,
        };
        stream.extend(encode_frame(&msg).expect("frame"));
    }
    let limits = CodecLimits::default();

    c.bench_function("frame_decoder_64_keys", |b| {
        b.iter(|| {
            let mut decoder = FrameDecoder::new(limits.max_message_size);
            let mut count = 0;
            for chunk in stream.chunks(37) {
                decoder.extend(black_box(chunk));
                while let Some(frame) = decoder.next_frame().expect("frame") {
                    decode_message(&frame, &limits).expect("decode");
                    count += 1;
                }
            }
            count
        })
    });
}

/// Resolve + plan for a shifted letter and an AltGr character.
fn bench_keystroke_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_and_plan");
    for (name, layout, id) in [
        ("us_shift_A", StaticLayout::us(), KeyId(0x41)),
        ("de_altgr_at", StaticLayout::de(), KeyId::from_char('@')),
    ] {
        let tracker = ModifierTracker::new(&layout);
        let resolver = KeyResolver::new(Arc::new(layout));
        let planner = KeystrokePlanner::new();
        group.bench_function(name, |b| {
            b.iter(|| {
                let r = resolver
                    .resolve(black_box(id), ModifierMask::empty(), false, &tracker)
                    .expect("resolves");
                planner.plan(&r, &tracker, KeyAction::Press)
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_encode,
    bench_decode,
    bench_frame_stream,
    bench_keystroke_pipeline
);
criterion_main!(benches);
