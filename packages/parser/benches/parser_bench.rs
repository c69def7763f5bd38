use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stagehand_parser::{compose, parse, scan_outline};

fn layer_source(walls: usize) -> String {
    let mut source = String::from("#usda 1.0\n(\n    defaultPrim = \"World\"\n)\n\ndef Xform \"World\"\n{\n");
    for i in 0..walls {
        source.push_str(&format!(
            "    def Mesh \"Wall_{i}\"\n    {{\n        custom string status = \"WIP\"\n        custom double height = 3.0\n        double3 xformOp:translate = ({i}, 0, 0)\n    }}\n"
        ));
    }
    source.push_str("}\n");
    source
}

fn parse_small_layer(c: &mut Criterion) {
    let source = layer_source(10);
    c.bench_function("parse_small_layer", |b| b.iter(|| parse(black_box(&source))));
}

fn parse_large_layer(c: &mut Criterion) {
    let source = layer_source(1_000);
    c.bench_function("parse_large_layer", |b| b.iter(|| parse(black_box(&source))));
}

fn outline_large_layer(c: &mut Criterion) {
    let source = layer_source(1_000);
    c.bench_function("outline_large_layer", |b| {
        b.iter(|| scan_outline(black_box(&source)))
    });
}

fn compose_large_layer(c: &mut Criterion) {
    let doc = parse(&layer_source(1_000)).unwrap();
    c.bench_function("compose_large_layer", |b| {
        b.iter(|| compose(black_box(&doc.prims), "World"))
    });
}

criterion_group!(
    benches,
    parse_small_layer,
    parse_large_layer,
    outline_large_layer,
    compose_large_layer
);
criterion_main!(benches);
