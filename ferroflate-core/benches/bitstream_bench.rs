//! Performance benchmarks for bit-level I/O.
//!
//! Measures read/write throughput of the LSB-first bit buffer across the
//! code widths the DEFLATE codec actually uses (1-15 bit codes plus the
//! 16-bit stored-block fields).

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use ferroflate_core::bitstream::{BitReader, BitWriter};
use std::hint::black_box;
use std::io::Cursor;

fn bench_write_bits(c: &mut Criterion) {
    let mut group = c.benchmark_group("bitwriter");

    for width in [1u8, 5, 9, 15] {
        let writes = 100_000usize;
        group.throughput(Throughput::Bytes((writes * width as usize / 8) as u64));
        group.bench_with_input(BenchmarkId::new("write_bits", width), &width, |b, &w| {
            b.iter(|| {
                let mut out = Vec::with_capacity(writes * 2);
                let mut writer = BitWriter::new(&mut out);
                for i in 0..writes {
                    writer.write_bits(i as u32, w).unwrap();
                }
                writer.flush().unwrap();
                black_box(out);
            });
        });
    }

    group.finish();
}

fn bench_read_bits(c: &mut Criterion) {
    let mut group = c.benchmark_group("bitreader");

    for width in [1u8, 5, 9, 15] {
        let reads = 100_000usize;
        let mut data = Vec::new();
        {
            let mut writer = BitWriter::new(&mut data);
            for i in 0..reads {
                writer.write_bits(i as u32, width).unwrap();
            }
            writer.flush().unwrap();
        }

        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::new("read_bits", width), &data, |b, data| {
            b.iter(|| {
                let mut reader = BitReader::new(Cursor::new(data));
                for _ in 0..reads {
                    black_box(reader.read_bits(width).unwrap());
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_write_bits, bench_read_bits);
criterion_main!(benches);
