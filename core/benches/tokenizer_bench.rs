use criterion::{criterion_group, criterion_main, Criterion};
use imgsearch_core::tokenizer::{tokenize, tokenize_url};

fn bench_tokenize(c: &mut Criterion) {
    let text = "A red sports car parked by the harbor at sunset, photographed for the city gallery. ".repeat(64);
    c.bench_function("tokenize_caption", |b| b.iter(|| tokenize(&text)));
    let url = "https://cdn.example-photos.com/gallery/2023/summer/red-sports-car_harbor%20sunset.jpg?w=1200";
    c.bench_function("tokenize_url", |b| b.iter(|| tokenize_url(url)));
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
