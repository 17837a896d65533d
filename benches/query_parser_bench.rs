use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use nosql_query::lexer::Lexer;
use nosql_query::parser::Parser;
use nosql_query::{parse, parse_method, NameMappingConfig, OptimizationConfig, SqlCompiler};

const STATEMENTS: [(&str, &str); 4] = [
    ("simple", r#"select * from God where name = "Diana""#),
    ("medium", r#"select name, age from God where age > 10 and power in [1, 2, 3] order by age desc limit 10"#),
    (
        "complex",
        r#"select * from God where not age between 10 and 20 and name like "Di%" or power = @power or power = 3 order by name, age desc skip 5 limit 20"#,
    ),
    ("insert_json", r#"insert God {"name": "Diana", "tags": ["hunt", "moon"], "origin": {"city": "Rome"}} ttl 1 day"#),
];

fn create_compiler() -> SqlCompiler {
    let mapping = NameMappingConfig::from_json_str(
        r#"{ "entities": { "God": "gods" }, "fields": { "God.name": "god_name" } }"#,
    )
    .expect("valid mapping");
    SqlCompiler::with_config(OptimizationConfig { max_or_conditions_for_in: 2 }).with_translator(mapping)
}

fn benchmark_lexer(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer_performance");

    for (name, text) in STATEMENTS {
        group.bench_with_input(BenchmarkId::new("tokenize", name), &text, |b, &text| {
            b.iter(|| {
                let tokens: Vec<_> = Lexer::new(black_box(text)).collect();
                black_box(tokens)
            })
        });
    }

    group.finish();
}

fn benchmark_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser_performance");

    for (name, text) in STATEMENTS {
        let tokens: Vec<_> = Lexer::new(text).collect();

        group.bench_with_input(BenchmarkId::new("parse", name), &tokens, |b, tokens| {
            b.iter(|| black_box(Parser::new(text, black_box(tokens)).parse().ok()))
        });
    }

    group.finish();
}

fn benchmark_method_parser(c: &mut Criterion) {
    let methods = [
        ("simple", "findByName"),
        ("medium", "findByAgeGreaterThanAndNameLike"),
        ("complex", "findAllByAgeBetweenAndNameNotInOrPowerLessThanEqualOrderByNameDescAge"),
    ];

    let mut group = c.benchmark_group("method_parser_performance");

    for (name, method) in methods {
        group.bench_with_input(BenchmarkId::new("parse_method", name), &method, |b, &method| {
            b.iter(|| black_box(parse_method(black_box(method), "God").ok()))
        });
    }

    group.finish();
}

fn benchmark_sql_compilation(c: &mut Criterion) {
    let compiler = create_compiler();
    let mut group = c.benchmark_group("sql_compilation_performance");

    for &(name, text) in STATEMENTS.iter().take(3) {
        let mut parsed = parse(text).expect("valid statement");
        parsed.params.bind("power", 7);

        group.bench_with_input(BenchmarkId::new("compile", name), &parsed.query, |b, query| {
            b.iter(|| black_box(compiler.compile(black_box(query)).ok()))
        });
    }

    group.finish();
}

fn benchmark_end_to_end(c: &mut Criterion) {
    let compiler = create_compiler();
    let text = STATEMENTS[1].1;

    c.bench_function("parse_and_compile", |b| {
        b.iter(|| {
            let parsed = parse(black_box(text)).ok()?;
            compiler.compile(&parsed.query).ok()
        })
    });
}

criterion_group!(
    benches,
    benchmark_lexer,
    benchmark_parser,
    benchmark_method_parser,
    benchmark_sql_compilation,
    benchmark_end_to_end
);
criterion_main!(benches);
