//! Benchmarks for the fedsql pipeline.
//!
//! Benchmarks cover:
//! - SQL parsing (text → language objects)
//! - Reference rendering (language objects → text)
//! - Source translation (rewrite + dialect rendering)
//! - Type-filtered collection
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fedsql::ast::{collect_elements, collect_groups, parse_single, parse_sql, render};
use fedsql::translators::TranslatorRegistry;

// ---------------------------------------------------------------------------
// SQL test inputs organized by complexity
// ---------------------------------------------------------------------------

const SIMPLE_SELECT: &str = "SELECT * FROM users";

const SELECT_WITH_WHERE: &str =
    "SELECT id, name, email FROM users WHERE age > 18 AND status = 'active'";

const SELECT_WITH_JOIN: &str = "SELECT u.name, o.total, o.created_at \
    FROM users u \
    JOIN orders o ON u.id = o.user_id \
    WHERE o.total > 100.00 \
    ORDER BY o.created_at DESC \
    LIMIT 50";

const MULTI_JOIN: &str = "SELECT u.name, o.id, p.name AS product, oi.quantity \
    FROM users u \
    JOIN orders o ON u.id = o.user_id \
    JOIN order_items oi ON o.id = oi.order_id \
    JOIN products p ON oi.product_id = p.id \
    WHERE o.status = 'completed' AND u.active = true \
    ORDER BY o.created_at DESC";

const AGGREGATION: &str = "SELECT department, COUNT(*) AS emp_count, \
    AVG(salary) AS avg_salary, MAX(salary) AS max_salary, MIN(salary) AS min_salary \
    FROM employees \
    WHERE hire_date > '2020-01-01' \
    GROUP BY department \
    HAVING COUNT(*) > 5 \
    ORDER BY avg_salary DESC";

const CTE_QUERY: &str = "WITH active_users AS (\
        SELECT id, name, email FROM users WHERE status = 'active'\
    ), user_orders AS (\
        SELECT u.id, u.name, COUNT(o.id) AS order_count, SUM(o.total) AS total_spent \
        FROM active_users u \
        JOIN orders o ON u.id = o.user_id \
        GROUP BY u.id, u.name\
    ) \
    SELECT name, order_count, total_spent \
    FROM user_orders \
    WHERE total_spent > 1000 \
    ORDER BY total_spent DESC";

const WINDOW_FUNCTION: &str = "SELECT name, department, salary, \
    ROW_NUMBER() OVER (PARTITION BY department ORDER BY salary DESC) AS rn, \
    AVG(salary) OVER (PARTITION BY department) AS dept_avg \
    FROM employees";

const SUBQUERY: &str = "SELECT u.name, u.email \
    FROM users u \
    WHERE u.id IN (SELECT DISTINCT user_id FROM orders WHERE total > 500) \
    AND u.department = (SELECT department FROM departments WHERE name = 'Engineering') \
    AND EXISTS (SELECT 1 FROM reviews r WHERE r.user_id = u.id AND r.rating > 4)";

const UNION_QUERY: &str = "SELECT id, name, 'customer' AS kind FROM customers WHERE active = true \
    UNION ALL \
    SELECT id, name, 'supplier' AS kind FROM suppliers WHERE active = true \
    UNION ALL \
    SELECT id, name, 'partner' AS kind FROM partners WHERE active = true";

const INSERT_QUERY: &str =
    "INSERT INTO users (name, email, age, department) VALUES ('John Doe', 'john@example.com', 30, 'Engineering')";

const UPDATE_QUERY: &str = "UPDATE employees SET salary = salary * 1.10 \
    WHERE department = 'Engineering' AND performance_rating > 4";

const DELETE_QUERY: &str = "DELETE FROM sessions WHERE last_active < '2024-01-01'";

const CASE_EXPRESSION: &str = "SELECT name, \
    CASE \
        WHEN salary > 100000 THEN 'senior' \
        WHEN salary > 60000 THEN 'mid' \
        WHEN salary > 30000 THEN 'junior' \
        ELSE 'intern' \
    END AS level, \
    CASE department \
        WHEN 'Engineering' THEN 'tech' \
        WHEN 'Marketing' THEN 'business' \
        ELSE 'other' \
    END AS category \
    FROM employees";

const ALL_CASES: &[(&str, &str)] = &[
    ("simple_select", SIMPLE_SELECT),
    ("select_where", SELECT_WITH_WHERE),
    ("select_join", SELECT_WITH_JOIN),
    ("multi_join", MULTI_JOIN),
    ("aggregation", AGGREGATION),
    ("cte", CTE_QUERY),
    ("window_function", WINDOW_FUNCTION),
    ("subquery", SUBQUERY),
    ("union", UNION_QUERY),
    ("insert", INSERT_QUERY),
    ("update", UPDATE_QUERY),
    ("delete", DELETE_QUERY),
    ("case_expression", CASE_EXPRESSION),
];

// ---------------------------------------------------------------------------
// Benchmark groups
// ---------------------------------------------------------------------------

fn bench_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing");

    for (name, sql) in ALL_CASES {
        group.bench_with_input(BenchmarkId::new("parse", name), sql, |b, sql| {
            b.iter(|| parse_single(black_box(sql)).unwrap());
        });
    }

    group.finish();
}

fn bench_rendering(c: &mut Criterion) {
    let mut group = c.benchmark_group("rendering");

    for (name, sql) in ALL_CASES {
        let command = parse_single(sql).unwrap();
        group.bench_with_input(BenchmarkId::new("render", name), &command, |b, command| {
            b.iter(|| render(black_box(command)));
        });
    }

    group.finish();
}

fn bench_translation(c: &mut Criterion) {
    let mut group = c.benchmark_group("translation");

    let mut registry = TranslatorRegistry::new();

    let cases = [
        ("select_where", SELECT_WITH_WHERE),
        ("multi_join", MULTI_JOIN),
        ("aggregation", AGGREGATION),
        ("cte", CTE_QUERY),
        ("subquery", SUBQUERY),
        ("union", UNION_QUERY),
    ];

    for (name, sql) in &cases {
        let command = parse_single(sql).unwrap();
        group.bench_with_input(
            BenchmarkId::new("sqlserver", name),
            &command,
            |b, command| {
                b.iter(|| {
                    let mut command = command.clone();
                    registry.translate("sqlserver", black_box(&mut command)).unwrap()
                });
            },
        );
    }

    group.finish();
}

fn bench_collection(c: &mut Criterion) {
    let mut group = c.benchmark_group("collection");

    let cases = [
        ("multi_join", MULTI_JOIN),
        ("cte", CTE_QUERY),
        ("subquery", SUBQUERY),
    ];

    for (name, sql) in &cases {
        let command = parse_single(sql).unwrap();
        group.bench_with_input(BenchmarkId::new("elements", name), &command, |b, command| {
            b.iter(|| collect_elements(black_box(command)).len());
        });
        group.bench_with_input(BenchmarkId::new("groups", name), &command, |b, command| {
            b.iter(|| collect_groups(black_box(command)).len());
        });
    }

    group.finish();
}

fn bench_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("round_trip");

    for (name, sql) in ALL_CASES {
        group.bench_with_input(BenchmarkId::new("parse_render", name), sql, |b, sql| {
            b.iter(|| {
                let command = parse_single(black_box(sql)).unwrap();
                render(&command)
            });
        });
    }

    group.finish();
}

fn bench_multi_statement(c: &mut Criterion) {
    let mut group = c.benchmark_group("multi_statement");

    let two_stmts = format!("{}; {}", SIMPLE_SELECT, SELECT_WITH_WHERE);
    let five_stmts = format!(
        "{}; {}; {}; {}; {}",
        SIMPLE_SELECT, SELECT_WITH_WHERE, INSERT_QUERY, UPDATE_QUERY, DELETE_QUERY
    );

    group.bench_function("parse_2_statements", |b| {
        b.iter(|| parse_sql(black_box(&two_stmts)).unwrap());
    });

    group.bench_function("parse_5_statements", |b| {
        b.iter(|| parse_sql(black_box(&five_stmts)).unwrap());
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_parsing,
    bench_rendering,
    bench_translation,
    bench_collection,
    bench_round_trip,
    bench_multi_statement,
);
criterion_main!(benches);
