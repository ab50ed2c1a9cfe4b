use criterion::{criterion_group, criterion_main, Criterion};
use gosh::Gosh;

fn fibonacci() {
    let src = r#"
        fib := nil
        fib := func(n) {
            if n < 2 {
                return n
            }
            return fib(n - 2) + fib(n - 1)
        }

        fib(20)
    "#;

    let mut gosh = Gosh::new();
    gosh.run("fib", src).unwrap();
}

fn counter() {
    let src = r#"
        make := func() {
            count := 0
            return func() {
                extern count
                count += 1
                return count
            }
        }

        next := make()
        sum := 0
        while sum < 100000 {
            sum += next()
        }
    "#;

    let mut gosh = Gosh::new();
    gosh.run("counter", src).unwrap();
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("my-benchmark");
    group.sample_size(20);
    group.bench_function("fib 20", |b| b.iter(fibonacci));
    group.bench_function("closure counter", |b| b.iter(counter));
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
