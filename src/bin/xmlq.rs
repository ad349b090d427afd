//! xmlq -- parse XML/HTML files, run `XPath` queries, and re-serialize.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use xmlhandle::{Document, Error, NodeType, ParseOptions};

/// xmlq -- parse XML/HTML files and query them with `XPath`.
#[derive(Parser, Debug)]
#[command(name = "xmlq", version, about, long_about = None)]
struct Cli {
    /// Files to process.
    #[arg(required = true)]
    files: Vec<String>,

    /// Parse input as HTML instead of XML.
    #[arg(long)]
    html: bool,

    /// Remove whitespace-only text nodes.
    #[arg(long)]
    noblanks: bool,

    /// Evaluate an `XPath` expression and print the result.
    #[arg(long, value_name = "EXPR")]
    xpath: Option<String>,

    /// Bind a namespace prefix for `--xpath`, as `prefix=uri`.
    #[arg(long = "ns", value_name = "PREFIX=URI")]
    namespaces: Vec<String>,

    /// Indent the output.
    #[arg(long)]
    format: bool,

    /// Output encoding (e.g. UTF-8, ISO-8859-1).
    #[arg(long, value_name = "ENCODING")]
    encoding: Option<String>,

    /// Write output to a file instead of stdout.
    #[arg(long, value_name = "FILE")]
    output: Option<String>,
}

const EXIT_SUCCESS: u8 = 0;
const EXIT_PARSE_ERROR: u8 = 1;
const EXIT_QUERY_ERROR: u8 = 2;
const EXIT_OUTPUT_ERROR: u8 = 3;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let worst = cli.files.iter().map(|file| process_file(&cli, file)).max().unwrap_or(EXIT_SUCCESS);
    ExitCode::from(worst)
}

fn process_file(cli: &Cli, filename: &str) -> u8 {
    let options = ParseOptions::default().html(cli.html).no_blanks(cli.noblanks);
    let doc = match Document::parse_file(filename, &options) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("{}", e.diagnostic());
            return EXIT_PARSE_ERROR;
        }
    };
    for warning in doc.warnings() {
        eprintln!("{warning}");
    }

    if let Some(expr) = &cli.xpath {
        return match run_query(cli, &doc, expr) {
            Ok(()) => EXIT_SUCCESS,
            Err(e) => {
                eprintln!("{filename}: {e}");
                EXIT_QUERY_ERROR
            }
        };
    }

    let result = match &cli.output {
        Some(path) => doc.save_file(path, cli.format, cli.encoding.as_deref()),
        None => doc.serialize_to_bytes(cli.format, cli.encoding.as_deref()).map(|bytes| {
            use std::io::Write;
            let _ = std::io::stdout().write_all(&bytes);
        }),
    };
    match result {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("{filename}: {e}");
            EXIT_OUTPUT_ERROR
        }
    }
}

/// Prints each selected node on its own line, or the string value of a
/// scalar result.
fn run_query(cli: &Cli, doc: &Document, expr: &str) -> Result<(), Error> {
    let bindings: Vec<(&str, &str)> = cli
        .namespaces
        .iter()
        .filter_map(|binding| binding.split_once('='))
        .collect();

    let nodes = doc.evaluate(expr, &bindings)?;
    if nodes.is_empty() {
        let document_node = doc.root_element().and_then(|root| root.parent());
        let value = match &document_node {
            Some(node) => node.eval_to_string(expr, &bindings)?,
            None => String::new(),
        };
        println!("{value}");
        return Ok(());
    }
    for node in nodes {
        match node.node_type() {
            Some(NodeType::Attribute) => {
                println!(
                    " {}=\"{}\"",
                    node.qualified_name().unwrap_or_default(),
                    node.content().unwrap_or_default()
                );
            }
            _ => println!("{}", node.serialize(cli.format)),
        }
    }
    Ok(())
}
