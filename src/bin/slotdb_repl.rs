//! Read-eval-print loop over the `slotdb` engine: reads a line, parses it
//! as one statement, executes it against a [`slotdb::Engine`], and prints
//! the rendered [`slotdb::QueryResult`] or an `Error: ...` line.

use clap::Parser as ClapParser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use slotdb::{Config, Engine};
use std::path::PathBuf;
use tracing::info;

#[derive(ClapParser, Debug)]
#[command(name = "slotdb-repl", about = "Minimal relational database engine REPL")]
struct Args {
    /// Directory backing files are read from and written to.
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = Config {
        data_dir: args.data_dir,
    };
    let mut engine = match Engine::open(&config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    info!(data_dir = %config.data_dir.display(), "engine opened");

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    loop {
        match rl.readline("slotdb> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);
                match engine.run(line) {
                    Ok(result) => println!("{result}"),
                    Err(e) => println!("Error: {e}"),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error: {e}");
                break;
            }
        }
    }
}
