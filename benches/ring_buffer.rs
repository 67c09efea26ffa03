//! Criterion benchmarks for the ring buffer and framer hot paths.
//!
//! Every raw chunk passes through one ring buffer write and read, and every
//! byte through the framer, so these two paths bound gateway throughput.
//!
//! Key metrics:
//! - Write throughput for various record sizes
//! - Write with circular overwrite once the buffer is full
//! - Framer scan rate over noisy and clean input
//!
//! Run with: cargo bench --bench ring_buffer

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use telemetry_gateway::data::ring_buffer::RingBuffer;
use telemetry_gateway::framer::JsonFramer;

/// Benchmark write-then-pop for different record sizes.
fn ring_buffer_write_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_buffer_write_pop");

    let sizes = vec![("64B", 64), ("512B", 512), ("1KB", 1024)];

    for (name, size) in sizes {
        let mut rb = RingBuffer::new("bench", 32, size).unwrap();
        let data = vec![b'a'; size];
        let mut out = Vec::with_capacity(size);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("write_pop", name), &size, |b, _| {
            b.iter(|| {
                rb.write(black_box(&data)).unwrap();
                rb.pop_into(&mut out);
                black_box(&out);
            });
        });
    }

    group.finish();
}

/// Benchmark writes into a full buffer, each discarding the oldest record.
fn ring_buffer_overwrite(c: &mut Criterion) {
    let mut rb = RingBuffer::new("bench", 10, 512).unwrap();
    let data = vec![b'b'; 400];
    for _ in 0..10 {
        rb.write(&data).unwrap();
    }

    c.bench_function("ring_buffer_overwrite", |b| {
        b.iter(|| {
            rb.write(black_box(&data)).unwrap();
        });
    });
}

/// Benchmark peek, which trims the zero padding on every call.
fn ring_buffer_peek(c: &mut Criterion) {
    let mut rb = RingBuffer::new("bench", 4, 512).unwrap();
    rb.write(br#"{"timestamp":"2019-03-07T14:05:09Z","data":{"t":21.5}}"#)
        .unwrap();

    c.bench_function("ring_buffer_peek", |b| {
        b.iter(|| {
            black_box(rb.peek());
        });
    });
}

/// Benchmark framing one object out of a chunk.
fn framer_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("framer_extract");

    let clean = br#"{"data":{"t":21.5,"h":40.1,"p":1013.2}}"#.to_vec();
    let mut noisy = vec![b'.'; 512];
    noisy.extend_from_slice(&clean);

    for (name, chunk) in [("clean", clean), ("noisy", noisy)] {
        let mut framer = JsonFramer::new(2, 448);

        group.throughput(Throughput::Bytes(chunk.len() as u64));
        group.bench_with_input(BenchmarkId::new("extract", name), &chunk, |b, chunk| {
            b.iter(|| {
                let mut offset = 0;
                while offset < chunk.len() {
                    let extraction = framer.extract(black_box(&chunk[offset..]));
                    offset += extraction.consumed.max(1);
                    if extraction.object.is_some() {
                        break;
                    }
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    ring_buffer_write_pop,
    ring_buffer_overwrite,
    ring_buffer_peek,
    framer_extract
);
criterion_main!(benches);
