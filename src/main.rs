use std::env;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use nosql_query::{parse, parse_method, NameMappingConfig, Query, SqlCompiler};

const DEFAULT_MAPPING_FILE: &str = "name_mapping.json";
const METHOD_PREFIXES: [&str; 5] = ["find", "count", "exists", "delete", "remove"];

fn create_compiler() -> SqlCompiler {
    let path = env::var("NOSQL_QUERY_MAPPING").unwrap_or_else(|_| DEFAULT_MAPPING_FILE.to_string());
    match NameMappingConfig::from_json_file(&path) {
        Ok(mapping) => {
            println!("Loaded {} name mappings from {}", mapping.len(), path);
            SqlCompiler::new().with_translator(mapping)
        }
        Err(e) => {
            println!("{}; names are used as written", e);
            SqlCompiler::new()
        }
    }
}

fn is_method_name(line: &str) -> bool {
    let name = line.split('(').next().unwrap_or_default();
    !name.is_empty()
        && name.chars().all(|c| c.is_alphanumeric() || c == '_')
        && METHOD_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

fn run(line: &str, entity: &str, compiler: &SqlCompiler) {
    let parsed = if is_method_name(line) {
        parse_method(line, entity).map(|method| (method.query, method.params))
    } else {
        parse(line).map(|parsed| (parsed.query, parsed.params))
    };

    let (query, params) = match parsed {
        Ok(parsed) => parsed,
        Err(e) => {
            println!("Parse failed: {}", e);
            return;
        }
    };

    println!("AST: {:#?}", query);
    if params.is_not_empty() {
        println!("Parameters: {}", params.declared_names().join(", "));
    }

    if matches!(query, Query::Get(_) | Query::Put(_) | Query::Del(_)) {
        return;
    }
    match compiler.compile(&query) {
        Ok(result) => {
            println!("SQL: {}", result.sql);
            for optimization in &result.optimizations {
                println!("  optimization: {:?}", optimization);
            }
        }
        Err(e) => println!("SQL compilation failed: {}", e),
    }
}

fn main() -> anyhow::Result<()> {
    println!("--- nosql_query REPL ---");
    println!("Enter a statement or a method name; `:entity <Name>` sets the method entity, `:quit` exits.");

    let compiler = create_compiler();
    let mut entity = String::from("Entity");
    let mut editor = DefaultEditor::new()?;

    loop {
        let line = match editor.readline("query> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        editor.add_history_entry(line)?;

        if line == ":quit" {
            break;
        }
        if let Some(name) = line.strip_prefix(":entity") {
            let name = name.trim();
            if name.is_empty() {
                println!("Current entity: {}", entity);
            } else {
                entity = name.to_string();
                println!("Entity set to {}", entity);
            }
            continue;
        }

        run(line, &entity, &compiler);
    }

    Ok(())
}
