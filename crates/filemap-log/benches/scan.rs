use criterion::{black_box, criterion_group, criterion_main, Criterion};
use filemap_log::BufferedAccessor;
use std::fs::OpenOptions;
use std::io::Write;
use tempfile::TempDir;

const LINES: usize = 100_000;

fn setup() -> (TempDir, std::path::PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("bench.jkv");
    let mut file = std::fs::File::create(&path).expect("Failed to create file");
    for i in 0..LINES {
        writeln!(file, "\"key-{}\"\t\"{:032x}\"", i, i).expect("Failed to write");
    }
    (temp_dir, path)
}

fn open(path: &std::path::Path) -> BufferedAccessor {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .expect("Failed to open file");
    BufferedAccessor::new(file).expect("Failed to wrap file")
}

fn bench_scan(c: &mut Criterion) {
    let (_temp_dir, path) = setup();
    let mut accessor = open(&path);

    c.bench_function("read_line 100k", |b| {
        b.iter(|| {
            accessor.seek(0).unwrap();
            let mut count = 0;
            while let Some(line) = accessor.read_line().unwrap() {
                black_box(line);
                count += 1;
            }
            assert_eq!(count, LINES);
        })
    });

    c.bench_function("skip_until 100k", |b| {
        b.iter(|| {
            accessor.seek(0).unwrap();
            let mut count = 0;
            while accessor.skip_until(b'\n').unwrap() {
                count += 1;
            }
            assert_eq!(count, LINES);
        })
    });
}

criterion_group!(benches, bench_scan);
criterion_main!(benches);
