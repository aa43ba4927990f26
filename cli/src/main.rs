//! Netclade CLI: run a cohort analysis and explore its clusters
//!
//! `netclade run <config>` performs the whole analysis, writes its results and
//! prints the cluster summary; `--shell` then opens an interactive prompt.

use anyhow::Context;
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use netclade::analysis::SUMMARY_HEADERS;
use netclade::{AnalysisSession, ClusterAnalysis, Configuration};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "netclade", version, about = "Cohort comparison by interactome subnetworks")]
struct Cli {
    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an analysis
    Run {
        /// Configuration file of key=value lines
        config: PathBuf,

        /// Option overrides, e.g. maxPathLength=4
        overrides: Vec<String>,

        /// Start an interactive shell once the analysis is done
        #[arg(long)]
        shell: bool,
    },
    /// Print the resolved configuration
    Config {
        /// Configuration file of key=value lines
        config: PathBuf,

        /// Option overrides, e.g. maxPathLength=4
        overrides: Vec<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run { config, overrides, shell } => run_analysis(&config, &overrides, shell, &cli.format),
        Commands::Config { config, overrides } => run_config(&config, &overrides),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn load_config(path: &Path, overrides: &[String]) -> anyhow::Result<Configuration> {
    Configuration::from_file_with_overrides(path, overrides)
        .with_context(|| format!("cannot read configuration {}", path.display()))
}

fn run_config(path: &Path, overrides: &[String]) -> anyhow::Result<()> {
    let config = load_config(path, overrides)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn run_analysis(path: &Path, overrides: &[String], shell: bool, format: &OutputFormat) -> anyhow::Result<()> {
    let config = load_config(path, overrides)?;
    info!(config = %path.display(), project = %config.general.project_name, "starting analysis");
    let session = AnalysisSession::run(config)?;

    let written = session.write_outputs()?;
    info!(files = written.len(), "outputs written");
    for file in written {
        println!("Wrote {}", file.display());
    }
    print_summary(&session, format)?;

    if shell {
        run_shell(&session, format)?;
    }
    Ok(())
}

fn print_summary(session: &AnalysisSession, format: &OutputFormat) -> anyhow::Result<()> {
    let clusters = session.summary();
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&clusters)?);
        }
        OutputFormat::Csv => {
            println!("{}", csv_line(SUMMARY_HEADERS.iter().map(|h| h.to_string())));
            for cluster in &clusters {
                println!("{}", csv_line(cluster.summary_row()));
            }
        }
        OutputFormat::Table => {
            if clusters.is_empty() {
                println!("(no clusters)");
                return Ok(());
            }

            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(SUMMARY_HEADERS);
            for cluster in &clusters {
                table.add_row(cluster.summary_row());
            }

            println!("{}", table);
            println!("{} cluster(s)", clusters.len());
        }
    }
    Ok(())
}

fn print_cluster(cluster: &ClusterAnalysis, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(cluster)?),
        OutputFormat::Csv => {
            println!("{}", csv_line(SUMMARY_HEADERS.iter().map(|h| h.to_string())));
            println!("{}", csv_line(cluster.summary_row()));
        }
        OutputFormat::Table => println!("{}\n", cluster.printable()),
    }
    Ok(())
}

fn print_help(session: &AnalysisSession) {
    let patient = session
        .combined()
        .patient_ids()
        .next()
        .cloned()
        .unwrap_or_else(|| "patient".to_string());
    println!("Commands:");
    println!("  info              Show the summary of every cluster");
    println!("  info <id>         Show one cluster or patient, e.g. info C17");
    println!("  distance <a> <b>  Mean dissimilarity between two clusters, e.g. distance C12 C20");
    println!("  export <id>       Write the graphs of a cluster or patient, e.g. export C5 or export {}", patient);
    println!("  <id>              Same as export <id>");
    println!("  help              Show this message");
    println!("  quit              Exit the shell");
}

fn run_shell(session: &AnalysisSession, format: &OutputFormat) -> anyhow::Result<()> {
    println!("Netclade Interactive Shell");
    print_help(session);
    println!();

    let stdin = std::io::stdin();
    let mut line = String::new();

    loop {
        eprint!("netclade> ");
        std::io::stderr().flush()?;

        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break; // EOF
        }

        let words: Vec<&str> = line.split_whitespace().collect();
        let outcome = match words.as_slice() {
            [] => continue,
            [cmd] if cmd.eq_ignore_ascii_case("quit") || cmd.eq_ignore_ascii_case("q") => break,
            [cmd] if cmd.eq_ignore_ascii_case("help") => {
                print_help(session);
                Ok(())
            }
            [cmd] if cmd.eq_ignore_ascii_case("info") => print_summary(session, format),
            [cmd, id] if cmd.eq_ignore_ascii_case("info") => session
                .cluster(id)
                .map_err(anyhow::Error::from)
                .and_then(|cluster| print_cluster(cluster, format)),
            [cmd, rest @ ..] if cmd.eq_ignore_ascii_case("distance") => match rest {
                [a, b] => session.mean_dissimilarity(a, b).map(|d| println!("{}\n", d)).map_err(Into::into),
                _ => {
                    println!("Must specify exactly two clusters to take the mean dissimilarity between");
                    Ok(())
                }
            },
            [cmd, id] if cmd.eq_ignore_ascii_case("export") => export(session, id),
            [id] => export(session, id),
            _ => {
                println!("Unrecognized command; type help for the list of commands");
                Ok(())
            }
        };

        if let Err(e) = outcome {
            eprintln!("{}", shell_failure(line.trim(), &e));
        }
    }

    println!("Bye!");
    Ok(())
}

/// Log a failed shell command and return the line shown to the user
fn shell_failure(command: &str, error: &anyhow::Error) -> String {
    warn!(command = command, "shell command failed: {:#}", error);
    format!("Error: {:#}", error)
}

fn export(session: &AnalysisSession, id: &str) -> anyhow::Result<()> {
    for file in session.export(id)? {
        println!("Wrote {}", file.display());
    }
    println!();
    Ok(())
}

fn csv_line(fields: impl IntoIterator<Item = String>) -> String {
    fields
        .into_iter()
        .map(|f| format_csv_value(&f))
        .collect::<Vec<_>>()
        .join(",")
}

fn format_csv_value(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_failure_keeps_context_chain() {
        let error = anyhow::anyhow!("Cluster C42 not found").context("info C42");
        assert_eq!(shell_failure("info C42", &error), "Error: info C42: Cluster C42 not found");
    }

    #[test]
    fn test_csv_quoting() {
        let line = csv_line(["C1".to_string(), "a,b".to_string(), "say \"hi\"".to_string()]);
        assert_eq!(line, "C1,\"a,b\",\"say \"\"hi\"\"\"");
    }
}
