use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::env;
use std::fs;

mod cases;
mod cli;
mod codegen;
mod oracle;
mod output;
mod query;
mod registry;
mod template;
mod util;

use cases::ParamShape;
use cli::RootArgs;
use oracle::LnurlSigner;
use registry::Registry;
use util::{display_path, sha256_hex};

fn main() -> Result<()> {
    init_tracing();
    let args = RootArgs::parse();
    run(&args)
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "generate=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &RootArgs) -> Result<()> {
    let registry = load_registry(args)?;
    tracing::info!(
        cases = registry.cases().len(),
        shape = registry.shape().as_str(),
        "loaded test case registry"
    );

    let template = fs::read_to_string(&args.template)
        .with_context(|| format!("read template {}", args.template.display()))?;
    let cwd = env::current_dir().context("resolve current directory")?;
    let template_hint = display_path(&cwd.join(&args.template), Some(&cwd));

    let replacements = codegen::build_replacements(&registry, &LnurlSigner, &template_hint)?;
    let substitution = template::substitute(&template, &replacements)?;
    for key in &substitution.unused_keys {
        tracing::warn!(marker = %template::marker(key), "template has no marker; generated content dropped");
    }
    for key in &substitution.repeated_keys {
        tracing::warn!(marker = %template::marker(key), "marker repeated; only the first occurrence was replaced");
    }
    for key in &substitution.unknown_markers {
        tracing::warn!(marker = %key, "marker has no replacement; left untouched");
    }

    if args.check {
        if output::is_up_to_date(&args.output, &substitution.text)? {
            tracing::info!(path = %args.output.display(), "generated tests are up to date");
            return Ok(());
        }
        return Err(anyhow!(
            "{} is out of date with {}; rerun generate",
            args.output.display(),
            args.template.display()
        ));
    }

    output::write_atomic(&args.output, &substitution.text)?;
    tracing::info!(
        path = %args.output.display(),
        sha256 = %sha256_hex(substitution.text.as_bytes()),
        "wrote generated tests"
    );
    Ok(())
}

fn load_registry(args: &RootArgs) -> Result<Registry> {
    let shape = args.shape.map(ParamShape::from);
    match &args.cases {
        Some(path) => {
            let file = cases::load_case_file(path)?;
            let shape = shape.or(file.shape).unwrap_or_default();
            Registry::new(shape, file.cases)
                .with_context(|| format!("validate case file {}", path.display()))
        }
        None => {
            let shape = shape.unwrap_or_default();
            Registry::new(shape, registry::builtin_cases(shape))
                .context("validate built-in registry")
        }
    }
}
