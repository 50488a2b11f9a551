//! Benchmarks for the name codec and source state reading
//!
//! - Decoding and encoding source names (done once per source entry)
//! - Reading a source tree of N files

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use hearth_engine::codec::AttrCodec;
use hearth_engine::{AbsPath, SourceState};
use tempfile::TempDir;

const NAMES: [&str; 8] = [
    "dot_bashrc",
    "private_readonly_dot_netrc",
    "encrypted_private_id_ed25519.age",
    "executable_dot_local_bin_tool.tmpl",
    "create_dot_gitconfig.local",
    "run_onchange_before_install.sh.tmpl",
    "symlink_dot_vimrc",
    "literal_dot_literal.literal",
];

/// Create a source tree with N files spread over a few directories
fn create_source_tree(num_files: usize) -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp directory");

    for i in 0..num_files {
        let dir = match i % 3 {
            0 => "dot_config",
            1 => "exact_dot_vim",
            _ => "private_dot_ssh",
        };
        let dir = temp.path().join(format!("{dir}_{}", i % 5));
        std::fs::create_dir_all(&dir).expect("Failed to create directory");

        let name = match i % 4 {
            0 => format!("file_{i}.txt"),
            1 => format!("dot_config_{i}"),
            2 => format!("private_data_{i}.json.tmpl"),
            _ => format!("executable_script_{i}.sh"),
        };
        std::fs::write(dir.join(&name), format!("Content for file {i}\n"))
            .unwrap_or_else(|_| panic!("Failed to write file: {name}"));
    }

    temp
}

fn bench_decode(c: &mut Criterion) {
    let codec = AttrCodec::default();
    c.bench_function("codec_decode", |b| {
        b.iter(|| {
            for name in NAMES {
                black_box(codec.decode(black_box(name), false).ok());
            }
        });
    });
}

fn bench_encode(c: &mut Criterion) {
    let codec = AttrCodec::default();
    let decoded: Vec<_> = NAMES
        .iter()
        .filter_map(|name| codec.decode(name, false).ok())
        .collect();

    c.bench_function("codec_encode", |b| {
        b.iter(|| {
            for name in &decoded {
                black_box(codec.encode(black_box(name)).ok());
            }
        });
    });
}

fn bench_source_state_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("source_state_read");
    let codec = AttrCodec::default();

    for size in &[10, 50, 100, 500] {
        let temp = create_source_tree(*size);
        let root = AbsPath::new(temp.path().to_path_buf()).expect("absolute temp path");

        group.bench_with_input(BenchmarkId::from_parameter(size), &root, |b, root| {
            b.iter(|| {
                let state = SourceState::read(black_box(root.clone()), &codec)
                    .expect("Failed to read source state");
                black_box(state.len())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_decode, bench_encode, bench_source_state_read);
criterion_main!(benches);
