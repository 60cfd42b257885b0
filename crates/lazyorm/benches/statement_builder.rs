use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use lazyorm::{InsertQb, Statement, UpdateQb, Value, WhereQb, qb};

/// SELECT c0, c1, ... FROM t WHERE c0 = $1 AND c1 = $2 ...
fn build_select_statement(n: usize) -> Statement {
    let mut stmt = Statement::new("SELECT ");
    for i in 0..n {
        if i > 0 {
            stmt.push(", ");
        }
        stmt.push(&format!("col{i}"));
    }
    stmt.push(" FROM t WHERE ");
    for i in 0..n {
        if i > 0 {
            stmt.push(" AND ");
        }
        stmt.push(&format!("col{i} = "));
        stmt.push_bind(i as i64);
    }
    stmt
}

fn bench_statement(c: &mut Criterion) {
    let mut group = c.benchmark_group("statement/push_bind");
    for n in [1, 5, 10, 50, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| black_box(build_select_statement(n)));
        });
    }
    group.finish();
}

fn bench_update_builder(c: &mut Criterion) {
    let mut group = c.benchmark_group("qb/update_build");
    for n in [1, 5, 20] {
        let mut qb: UpdateQb = qb::update("users");
        for i in 0..n {
            qb = qb.set(&format!("col{i}"), i as i64);
        }
        let qb = qb.eq("id", 1).in_list("status", ["a", "b", "c"]);
        group.bench_with_input(BenchmarkId::from_parameter(n), &qb, |b, qb| {
            b.iter(|| black_box(qb.build()));
        });
    }
    group.finish();
}

fn bench_insert_chunk(c: &mut Criterion) {
    let mut group = c.benchmark_group("qb/insert_chunk");
    for rows in [10, 100, 1000] {
        let data: Vec<Vec<Value>> = (0..rows)
            .map(|i| vec![Value::Int(i), Value::from(format!("name{i}")), Value::Float(1.5)])
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(rows), &data, |b, data| {
            b.iter(|| {
                let qb = data.iter().cloned().fold(
                    InsertQb::new("staging").columns(&["id", "name", "score"]),
                    |qb, row| qb.values(row),
                );
                black_box(qb.build())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_statement, bench_update_builder, bench_insert_chunk);
criterion_main!(benches);
