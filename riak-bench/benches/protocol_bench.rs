//! Protocol encoding/decoding benchmarks.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use riak_protocol::pb::kv::RpbListKeysResp;
use riak_protocol::timeseries::{self, Cell, Row};
use riak_protocol::ttb::TermWriter;
use riak_protocol::{encode_message, Frame, MessageCode, RiakMessage};

fn create_rows(count: usize) -> Vec<Row> {
    (0..count)
        .map(|i| {
            Row::new(vec![
                Cell::Varchar("family1".to_string()),
                Cell::Varchar("series1".to_string()),
                Cell::Timestamp(1_443_806_900_000 + i as i64),
                Cell::Varchar("hurricane".to_string()),
                Cell::Double(79.5 + i as f64),
            ])
        })
        .collect()
}

fn create_query_response(rows: usize) -> Bytes {
    let mut w = TermWriter::with_version();
    w.write_tuple_head(2);
    w.write_atom("tsqueryresp").unwrap();
    w.write_tuple_head(3);

    w.write_list_head(3);
    for name in ["time", "weather", "temperature"] {
        w.write_string_as_binary(name);
    }
    w.write_nil();

    w.write_list_head(3);
    for column_type in ["timestamp", "varchar", "double"] {
        w.write_atom(column_type).unwrap();
    }
    w.write_nil();

    w.write_list_head(rows as u32);
    for i in 0..rows {
        w.write_tuple_head(3);
        w.write_long(1_443_806_900_000 + i as i64);
        w.write_string_as_binary("hurricane");
        w.write_double(79.5);
    }
    if rows > 0 {
        w.write_nil();
    }
    w.freeze()
}

fn bench_frame_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encode");

    for size in [100, 1000, 10000] {
        let frame = Frame::new(MessageCode::TsTtbMsg, Bytes::from("x".repeat(size)));

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &frame, |b, frame| {
            b.iter(|| black_box(frame.encode().unwrap()));
        });
    }

    group.finish();
}

fn bench_frame_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decode");

    for size in [100, 1000, 10000] {
        let frame = Frame::new(MessageCode::TsTtbMsg, Bytes::from("x".repeat(size)));
        let encoded = frame.encode().unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &encoded, |b, encoded| {
            b.iter(|| {
                let mut buf = encoded.clone();
                black_box(Frame::decode(&mut buf).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_pb_list_keys(c: &mut Criterion) {
    let mut group = c.benchmark_group("pb_list_keys");

    for keys in [10, 100, 1000] {
        let page = RpbListKeysResp {
            keys: (0..keys).map(|i| format!("key-{:08}", i).into_bytes()).collect(),
            done: None,
        };
        let encoded = encode_message(&page).unwrap();
        let payload = Bytes::copy_from_slice(&encoded[5..]);

        group.throughput(Throughput::Elements(keys as u64));
        group.bench_with_input(BenchmarkId::new("encode", keys), &page, |b, page| {
            b.iter(|| black_box(encode_message(page).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("decode", keys), &payload, |b, payload| {
            b.iter(|| black_box(RpbListKeysResp::decode_payload(payload.clone()).unwrap()));
        });
    }

    group.finish();
}

fn bench_ttb_put_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("ttb_put_encode");

    for count in [1, 100, 1000] {
        let rows = create_rows(count);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &rows, |b, rows| {
            b.iter(|| black_box(timeseries::encode_put_request("GeoCheckin", rows).unwrap()));
        });
    }

    group.finish();
}

fn bench_ttb_query_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("ttb_query_decode");

    for count in [1, 100, 1000] {
        let payload = create_query_response(count);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &payload, |b, payload| {
            b.iter(|| black_box(timeseries::decode_query_response(payload.clone()).unwrap()));
        });
    }

    group.finish();
}

fn bench_ttb_long(c: &mut Criterion) {
    let values = [7i64, -1_000_000, i64::MAX];

    c.bench_function("ttb_write_long", |b| {
        b.iter(|| {
            let mut w = TermWriter::new();
            for v in values {
                w.write_long(black_box(v));
            }
            black_box(w.freeze())
        });
    });

    let mut w = TermWriter::new();
    for v in values {
        w.write_long(v);
    }
    let encoded = w.freeze();

    c.bench_function("ttb_read_long", |b| {
        b.iter(|| {
            let mut r = riak_protocol::ttb::TermReader::new(encoded.clone());
            for _ in 0..values.len() {
                black_box(r.read_long().unwrap());
            }
        });
    });
}

criterion_group!(
    benches,
    bench_frame_encode,
    bench_frame_decode,
    bench_pb_list_keys,
    bench_ttb_put_encode,
    bench_ttb_query_decode,
    bench_ttb_long,
);

criterion_main!(benches);
