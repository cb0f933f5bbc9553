//! jsbridge Runtime
//!
//! Command-line host: creates one script context, runs inline snippets and
//! files in order, and prints each non-undefined result as JSON.
//!
//! ```text
//! jsbridge [--config FILE] [--label NAME] [-e CODE]... [FILE]...
//! ```

use anyhow::{bail, Context as _, Result};
use jsbridge_core::HostValue;
use jsbridge_script::{Context, ContextConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: jsbridge [--config FILE] [--label NAME] [-e CODE]... [FILE]...";

/// One unit of work, run in command-line order.
#[derive(Debug, PartialEq)]
enum Source {
    Inline(String),
    File(PathBuf),
}

#[derive(Debug, Default, PartialEq)]
struct Args {
    config: Option<PathBuf>,
    label: Option<String>,
    sources: Vec<Source>,
}

fn parse_args(mut raw: impl Iterator<Item = String>) -> Result<Args> {
    let mut args = Args::default();
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--config" => {
                let path = raw.next().context("--config needs a file")?;
                args.config = Some(PathBuf::from(path));
            }
            "--label" => {
                args.label = Some(raw.next().context("--label needs a name")?);
            }
            "-e" => {
                let code = raw.next().context("-e needs code")?;
                args.sources.push(Source::Inline(code));
            }
            flag if flag.starts_with('-') && flag.len() > 1 => bail!("unknown option '{flag}'\n{USAGE}"),
            _ => args.sources.push(Source::File(PathBuf::from(arg))),
        }
    }
    Ok(args)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;

    let mut config = match &args.config {
        Some(path) => ContextConfig::load(path)?,
        None => ContextConfig::default(),
    };
    if args.label.is_some() {
        config.label = args.label.clone();
    }

    tracing::info!("jsbridge v{} on {}", jsbridge_core::VERSION, jsbridge_script::ENGINE_VERSION);
    let context = Context::with_config(config)?;

    for source in &args.sources {
        let result = match source {
            Source::Inline(code) => context.evaluate(code, Some("<command line>")),
            Source::File(path) => context.evaluate_file(path),
        }?;
        if !result.is_undefined() {
            println!("{}", serde_json::Value::from(result));
        }
    }

    Ok(())
}
