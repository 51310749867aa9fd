//! Benchmarks for asset folder templates and link building.

use std::path::Path;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use markbridge::assets::{TemplateContext, relative_link, resolve_asset_dir};
use markbridge::document::DocumentBuffer;

fn bench_resolve_asset_dir(c: &mut Criterion) {
    let ctx = TemplateContext {
        file: Path::new("/proj/docs/guide/intro.md"),
        project_root: Some(Path::new("/proj")),
    };
    c.bench_function("resolve_asset_dir", |b| {
        b.iter(|| {
            resolve_asset_dir(
                black_box("${projectRoot}/assets/${fileBasenameNoExtension}"),
                &ctx,
            )
        })
    });
}

fn bench_relative_link(c: &mut Criterion) {
    let document = Path::new("/proj/docs/guide/intro.md");
    let target = Path::new("/proj/assets/intro/screenshot 1.png");
    c.bench_function("relative_link", |b| {
        b.iter(|| relative_link(black_box(document), black_box(target)))
    });
}

fn bench_replace_all(c: &mut Criterion) {
    let text = "# Heading\n\nSome paragraph text.\n".repeat(2_000);
    let edited = format!("{text}one more line\n");
    c.bench_function("replace_all_large", |b| {
        b.iter(|| {
            let mut buffer = DocumentBuffer::from_text(&text);
            buffer.replace_all(black_box(&edited))
        })
    });
}

criterion_group!(
    benches,
    bench_resolve_asset_dir,
    bench_relative_link,
    bench_replace_all
);
criterion_main!(benches);
