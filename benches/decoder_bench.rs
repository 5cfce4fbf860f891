//! Benchmarks for the upstream event decoder.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use prompt_relay::relay::decoder::EventDecoder;

/// A 1,000-event completion stream followed by the sentinel.
fn sample_stream() -> Vec<u8> {
    let mut body = String::new();
    for i in 0..1_000 {
        body.push_str(&format!(
            "data: {{\"id\":\"chatcmpl-1\",\"object\":\"chat.completion.chunk\",\"choices\":[{{\"index\":0,\"delta\":{{\"content\":\"token{i} \"}},\"finish_reason\":null}}]}}\n\n"
        ));
    }
    body.push_str("data: [DONE]\n\n");
    body.into_bytes()
}

fn bench_decode(c: &mut Criterion) {
    let body = sample_stream();

    for chunk_size in [64usize, 1024, 16 * 1024] {
        c.bench_function(&format!("decode_1k_events_{chunk_size}b_chunks"), |b| {
            b.iter(|| {
                let mut decoder = EventDecoder::new();
                let mut count = 0;
                for chunk in black_box(&body).chunks(chunk_size) {
                    count += decoder.push(chunk).len();
                }
                black_box(count);
            })
        });
    }
}

criterion_group!(benches, bench_decode);
criterion_main!(benches);
