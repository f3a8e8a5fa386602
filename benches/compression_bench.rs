use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::NamedTempFile;
use zipcraft::{Archive, Method};

fn generate_compressible_data(size: usize) -> Vec<u8> {
    let pattern = b"The quick brown fox jumps over the lazy dog. ";
    let mut data = Vec::with_capacity(size);
    while data.len() < size {
        data.extend_from_slice(pattern);
    }
    data.truncate(size);
    data
}

fn generate_random_data(size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let mut state = 0x12345678u32;
    for _ in 0..size {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        data.push((state >> 16) as u8);
    }
    data
}

fn write_one(data: &[u8], method: Method, level: u8) {
    let temp = NamedTempFile::new().unwrap();
    let mut archive = Archive::create();
    archive.set_compression_level(level).unwrap();
    archive.add_bytes("test.bin", data.to_vec(), method).unwrap();
    archive.save_as_file(temp.path()).unwrap();
}

fn bench_compression_methods(c: &mut Criterion) {
    let sizes = vec![
        1024,
        10 * 1024,
        100 * 1024,
        1024 * 1024,
        10 * 1024 * 1024,
    ];

    for size in sizes {
        let mut group = c.benchmark_group(format!("write_compressible_{}", format_size(size)));
        group.throughput(Throughput::Bytes(size as u64));

        let data = generate_compressible_data(size);

        group.bench_with_input(BenchmarkId::new("deflate_level_6", size), &data, |b, data| {
            b.iter(|| write_one(black_box(data), Method::Deflate, 6));
        });

        group.bench_with_input(BenchmarkId::new("deflate_level_9", size), &data, |b, data| {
            b.iter(|| write_one(black_box(data), Method::Deflate, 9));
        });

        group.bench_with_input(BenchmarkId::new("bzip2_level_6", size), &data, |b, data| {
            b.iter(|| write_one(black_box(data), Method::Bzip2, 6));
        });

        group.finish();
    }
}

fn bench_random_data_compression(c: &mut Criterion) {
    let sizes = vec![100 * 1024, 1024 * 1024];

    for size in sizes {
        let mut group = c.benchmark_group(format!("write_random_{}", format_size(size)));
        group.throughput(Throughput::Bytes(size as u64));

        let data = generate_random_data(size);

        group.bench_with_input(BenchmarkId::new("deflate_level_6", size), &data, |b, data| {
            b.iter(|| write_one(black_box(data), Method::Deflate, 6));
        });

        group.bench_with_input(BenchmarkId::new("store", size), &data, |b, data| {
            b.iter(|| write_one(black_box(data), Method::Store, 6));
        });

        group.finish();
    }
}

fn bench_multiple_entries(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_multiple_entries");

    let entry_count = 100;
    let entry_size = 10 * 1024;
    group.throughput(Throughput::Bytes((entry_count * entry_size) as u64));

    let data = generate_compressible_data(entry_size);

    group.bench_function("deflate_100_entries", |b| {
        b.iter(|| {
            let temp = NamedTempFile::new().unwrap();
            let mut archive = Archive::create();
            archive.set_compression_level(6).unwrap();
            for i in 0..entry_count {
                archive
                    .add_bytes(&format!("file_{}.txt", i), black_box(data.clone()), Method::Deflate)
                    .unwrap();
            }
            archive.save_as_file(temp.path()).unwrap();
        });
    });

    group.finish();
}

fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{}B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{}KB", bytes / 1024)
    } else {
        format!("{}MB", bytes / (1024 * 1024))
    }
}

criterion_group!(
    benches,
    bench_compression_methods,
    bench_random_data_compression,
    bench_multiple_entries
);
criterion_main!(benches);
