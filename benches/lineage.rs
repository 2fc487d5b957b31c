use std::fmt::Write;
use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use dataflow::sql_engine::dialects::DialectKind;
use dataflow::sql_engine::parse_sql;
use dataflow::sql_engine::script::split_statements;

/// A chain of views, each built from the previous one through two CTEs
fn generate_script(views: usize) -> String {
    let mut sql = String::from("CREATE TABLE raw.events (id INT, kind TEXT, amount INT);\n");
    for i in 0..views {
        let source = if i == 0 {
            "raw.events".to_string()
        } else {
            format!("marts.view_{}", i - 1)
        };
        let _ = writeln!(
            sql,
            "CREATE VIEW marts.view_{i} AS \
             WITH base AS (SELECT * FROM {source}), \
             filtered AS (SELECT * FROM base WHERE id IN (SELECT id FROM ref.allowed_{i})) \
             SELECT f.* FROM filtered f JOIN raw.events e ON e.id = f.id;"
        );
    }
    sql
}

fn criterion_benchmark(c: &mut Criterion) {
    let script = generate_script(200);
    let broken = format!("{script}\nCREATE VIEW marts.broken AS SELEC;\n");

    c.bench_function("lineage 200 views", |b| {
        b.iter(|| parse_sql(black_box(&script), DialectKind::Generic))
    });
    c.bench_function("lineage 200 views with fallback", |b| {
        b.iter(|| parse_sql(black_box(&broken), DialectKind::Generic))
    });
    c.bench_function("split statements", |b| {
        b.iter(|| split_statements(black_box(&script), false))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
