use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tinyimg::api::{CompressionResult, UploadResponse};
use tinyimg::files::SelectedFile;
use tinyimg::formats::{FormatSelector, FormatSet, FormatTag, FormatToggle};
use tinyimg::orchestrator::{BatchLimits, BatchState};
use tinyimg::utils::{format_stat_bytes, format_stat_count};

fn files(count: usize) -> Vec<SelectedFile> {
    (0..count)
        .map(|i| SelectedFile::from_bytes(format!("image{}.png", i), vec![0u8; 1024]))
        .collect()
}

fn results(formats: &FormatSet) -> Vec<CompressionResult> {
    formats
        .iter()
        .map(|tag| CompressionResult {
            saved_bytes: 512,
            new_size_bytes: 512,
            elapsed_ms: 10,
            artifact_url: format!("http://api.test/image?f=out.{}", tag),
            format: tag.to_string(),
        })
        .collect()
}

fn bench_batch_completion(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_completion");
    let limits = BatchLimits {
        max_file_size: 10 * 1024 * 1024,
        max_files: None,
    };
    let formats = FormatSet::all();

    for count in [1usize, 20, 200] {
        let selection = files(count);
        group.bench_with_input(BenchmarkId::new("fill", count), &selection, |b, selection| {
            b.iter(|| {
                let mut state = BatchState::new();
                state.replace_formats(formats.clone(), &limits);
                for dispatch in state.replace_files(selection.clone(), &limits) {
                    state.record_success(dispatch.generation, dispatch.index, results(&formats));
                }
                black_box(state.is_complete())
            })
        });
    }

    group.finish();
}

fn bench_format_toggles(c: &mut Criterion) {
    c.bench_function("format_toggles", |b| {
        b.iter(|| {
            let mut selector = FormatSelector::new();
            for tag in FormatTag::ALL {
                selector.toggle(FormatToggle::Format(black_box(tag)));
            }
            selector.toggle(FormatToggle::SelectAll);
            black_box(selector.selected().to_request_value())
        })
    });
}

fn bench_response_parsing(c: &mut Criterion) {
    let body = r#"{
        "data": [
            {"savedBytes": 1200, "newSize": 800, "time": 31, "imageUrl": "http://api.test/image?f=a.png", "format": "png"},
            {"savedBytes": 1500, "newSize": 500, "time": 27, "imageUrl": "http://api.test/image?f=a.jpg", "format": "jpg"},
            {"savedBytes": 1700, "newSize": 300, "time": 44, "imageUrl": "http://api.test/image?f=a.webp", "format": "webp"}
        ],
        "files": ["http://api.test/image?f=a.png", "http://api.test/image?f=a.jpg", "http://api.test/image?f=a.webp"]
    }"#;
    let formats = FormatSet::all();

    c.bench_function("upload_response_parsing", |b| {
        b.iter(|| {
            let response: UploadResponse = serde_json::from_str(black_box(body)).unwrap();
            black_box(response.into_results(&formats).unwrap())
        })
    });
}

fn bench_stat_formatting(c: &mut Criterion) {
    c.bench_function("stat_formatting", |b| {
        b.iter(|| {
            black_box(format_stat_count(black_box(1_234_567)));
            black_box(format_stat_bytes(black_box(98_765_432)))
        })
    });
}

criterion_group!(
    benches,
    bench_batch_completion,
    bench_format_toggles,
    bench_response_parsing,
    bench_stat_formatting
);
criterion_main!(benches);
