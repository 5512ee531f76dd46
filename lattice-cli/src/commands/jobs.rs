use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use lattice_core::{ConfigParser, MatrixExpander, RunTrigger};

/// List the expanded jobs without running them
#[derive(Args, Debug)]
pub struct JobsArgs {
    /// Path to the matrix description YAML file
    #[arg(default_value = "lattice.yaml")]
    pub config: PathBuf,

    /// Expand as a tag-triggered run with this tag
    #[arg(long, value_name = "TAG")]
    pub tag: Option<String>,
}

pub fn execute(args: JobsArgs) -> Result<()> {
    if !args.config.exists() {
        color_eyre::eyre::bail!("Matrix description not found: {}", args.config.display());
    }

    let config = ConfigParser::from_file(&args.config)
        .and_then(|c| {
            ConfigParser::validate(&c)?;
            Ok(c)
        })
        .map_err(|e| color_eyre::eyre::eyre!("{}", e))?;

    let trigger = match &args.tag {
        Some(tag) => RunTrigger::Tag(tag.clone()),
        None => RunTrigger::Branch,
    };

    let jobs =
        MatrixExpander::expand(&config, &trigger).map_err(|e| color_eyre::eyre::eyre!("{}", e))?;

    output::header(&format!("{} ({} jobs)", config.project, jobs.len()));
    for job in &jobs {
        println!("  {:2}  {}", job.index, job.name);
        if job.install_override().is_some() {
            println!("        install: overridden");
        }
        if job.script_override().is_some() {
            println!("        script: overridden");
        }
    }

    Ok(())
}
