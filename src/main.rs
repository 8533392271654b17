use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use domrec::config::ReplayConfig;
use domrec::dom::Document;
use domrec::protocol::{MacroFile, Service};
use domrec::replay::{ConsoleListener, DomHost, ReplayExecutor, ReplayStatus};
use domrec::selector;

#[derive(Parser)]
#[command(name = "domrec")]
#[command(version = "0.2.1")]
#[command(about = "Record and replay user interactions against rendered documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded macro against a document snapshot
    Replay {
        /// Macro file (wrapped form or a bare step array)
        macro_file: PathBuf,

        /// Document snapshot (XML/XHTML)
        #[arg(short, long)]
        document: PathBuf,

        /// Delay between steps in milliseconds
        #[arg(long, default_value = "500")]
        step_delay: u64,
    },

    /// Print the synthesized selector for a node addressed by child-index
    /// path (e.g. "0.2.1")
    Resolve {
        /// Document snapshot (XML/XHTML)
        #[arg(short, long)]
        document: PathBuf,

        /// Child-index path from the root; empty addresses the root
        #[arg(short, long, default_value = "")]
        path: String,
    },

    /// Serve the JSON-lines controller protocol over stdin/stdout
    Serve {
        /// Document snapshot (XML/XHTML)
        #[arg(short, long)]
        document: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay { macro_file, document, step_delay } => {
            let doc = load_document(&document)?;
            let file = MacroFile::load(&macro_file)?;
            println!(
                "{} '{}' ({} steps)",
                "Replaying".cyan().bold(),
                file.name,
                file.steps.len()
            );
            let config = ReplayConfig {
                inter_step_delay_ms: step_delay,
                ..ReplayConfig::default()
            };
            let mut executor = ReplayExecutor::new(DomHost::new(doc), config);
            let listener = ConsoleListener::spawn(executor.emitter().subscribe());
            let session = executor.run(&file.steps).await;
            drop(executor);
            listener.await?;
            if session.status != ReplayStatus::Completed {
                std::process::exit(1);
            }
        }

        Commands::Resolve { document, path } => {
            let doc = load_document(&document)?;
            let indices: Vec<usize> = if path.is_empty() {
                Vec::new()
            } else {
                path.split('.')
                    .map(|p| p.parse())
                    .collect::<Result<_, _>>()
                    .map_err(|_| anyhow::anyhow!("bad path '{}'", path))?
            };
            let node = doc
                .node_at_path(&indices)
                .ok_or_else(|| anyhow::anyhow!("no node at path '{}'", path))?;
            println!("{}", selector::resolve(&doc, node));
        }

        Commands::Serve { document } => {
            let doc = load_document(&document)?;
            let mut service = Service::new(doc);
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            service.serve(stdin, tokio::io::stdout()).await?;
        }
    }

    Ok(())
}

fn load_document(path: &PathBuf) -> anyhow::Result<Document> {
    let markup = std::fs::read_to_string(path)?;
    Ok(Document::parse(&markup)?)
}
