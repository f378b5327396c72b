//! CLI tool to print the catalog DDL
//!
//! Usage:
//!   cargo run --bin catalog-ddl
//!   cargo run --bin catalog-ddl -- catalog_staging

use platform_catalog::schema::CatalogDdl;
use std::env;

fn main() {
    let args: Vec<String> = env::args().collect();

    let schema = match args.len() {
        1 => "platforms",
        2 => args[1].as_str(),
        _ => {
            eprintln!("Usage:");
            eprintln!("  {}           - DDL for the 'platforms' schema", args[0]);
            eprintln!("  {} <schema>  - DDL for a named schema", args[0]);
            std::process::exit(1);
        }
    };

    match CatalogDdl::render(schema) {
        Ok(ddl) => {
            println!("-- Platform catalog schema: {}", ddl.schema);
            println!("-- Checksum: {}", ddl.checksum());
            println!();
            print!("{}", ddl.script());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}
