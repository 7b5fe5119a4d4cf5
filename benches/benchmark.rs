use std::fmt::Write;
use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use lineal::include::NoIncluder;
use lineal::{Reader, Root, read_str};

// A chain of `depth` generations, each adding to a counter and a list.
fn chain(depth: usize) -> String {
    let mut text = String::from("node \"0\" { count = 0; path = [0]; }\n");
    for generation in 1..depth {
        writeln!(
            text,
            "node \"{}\" : node \"{}\" {{ count += 1; path += [{}]; }}",
            generation,
            generation - 1,
            generation
        )
        .unwrap();
    }
    text
}

// `width` leaves, each inheriting from every one of `width` bases.
fn wide(width: usize) -> String {
    let mut text = String::new();
    for base in 0..width {
        writeln!(text, "base \"{}\" {{ v{} = {}; shared += 1; }}", base, base, base).unwrap();
    }
    for leaf in 0..width {
        write!(text, "leaf \"{}\"", leaf).unwrap();
        for base in 0..width {
            write!(text, " : base \"{}\"", base).unwrap();
        }
        writeln!(text, " {{ total = shared * {}; }}", leaf).unwrap();
    }
    text
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let reader = Reader::new().with_includer(NoIncluder);

    let text = chain(200);
    c.bench_function("read chain 200", |b| {
        b.iter(|| {
            let mut root = Root::new();
            reader.read("chain", black_box(&text), &mut root).unwrap();
            root
        })
    });

    let text = wide(30);
    c.bench_function("read wide 30x30", |b| {
        b.iter(|| {
            let mut root = Root::new();
            reader.read("wide", black_box(&text), &mut root).unwrap();
            root
        })
    });

    let root = read_str(&chain(200)).unwrap();
    let last = root.get("node", Some("199")).unwrap();
    c.bench_function("resolve scalar through 200", |b| {
        b.iter(|| last.get_field(black_box("count")).unwrap())
    });
    c.bench_function("resolve list through 200", |b| {
        b.iter(|| last.get_field(black_box("path")).unwrap())
    });
    c.bench_function("flatten 200", |b| {
        b.iter(|| {
            let mut copy = last.duplicate();
            copy.flatten().unwrap();
            copy
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
