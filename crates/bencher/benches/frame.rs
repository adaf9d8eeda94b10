use bencher::{UPGRADE_REQUEST, frame_cases};
use bytes::{Bytes, BytesMut};
use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use micro_http::codec::HeaderDecoder;
use micro_ws::codec::FrameEncoder;
use micro_ws::handshake;
use micro_ws::protocol::{Frame, apply_mask};
use std::hint::black_box;
use tokio_util::codec::{Decoder, Encoder};

const KEY: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];

fn benchmark_frame_encoder(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("frame_encoder");

    for case in frame_cases() {
        let payload = Bytes::from(case.bytes());
        group.throughput(Throughput::Bytes(case.payload().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &payload, |b, payload| {
            let mut encoder = FrameEncoder::new();
            let mut dst = BytesMut::with_capacity(payload.len() + 14);
            b.iter(|| {
                dst.clear();
                encoder.encode(Frame::binary(payload.clone()), &mut dst).expect("encoding into memory should not fail");
                black_box(&dst);
            });
        });
    }

    group.finish();
}

fn benchmark_mask(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("mask");

    for case in frame_cases() {
        group.throughput(Throughput::Bytes(case.payload().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            let mut data = case.bytes();
            b.iter(|| apply_mask(black_box(&mut data), KEY, 0));
        });
    }

    group.finish();
}

fn benchmark_upgrade_request(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("upgrade_request");
    group.throughput(Throughput::Bytes(UPGRADE_REQUEST.len() as u64));

    group.bench_function("decode_and_validate", |b| {
        b.iter_batched_ref(
            || BytesMut::from(UPGRADE_REQUEST),
            |bytes_mut| {
                let (header, _payload) = HeaderDecoder.decode(bytes_mut).expect("input should be a valid request head").unwrap();
                black_box(handshake::validate(&header).expect("input should be a valid upgrade request"));
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(frame, benchmark_frame_encoder, benchmark_mask, benchmark_upgrade_request);
criterion_main!(frame);
