use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use lattice_core::{ConfigParser, MatrixExpander, RunTrigger};

/// Validate a matrix description YAML file
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the matrix description YAML file
    #[arg(default_value = "lattice.yaml")]
    pub config: PathBuf,
}

pub fn execute(args: ValidateArgs) -> Result<()> {
    if !args.config.exists() {
        color_eyre::eyre::bail!("Matrix description not found: {}", args.config.display());
    }

    output::status("Validating", &format!("{}", args.config.display()));

    // Step 1: YAML syntax
    let config = match ConfigParser::from_file(&args.config) {
        Ok(c) => c,
        Err(e) => {
            output::error(&format!("Parse error: {}", e));
            std::process::exit(1);
        }
    };
    output::check("YAML syntax valid");

    // Step 2: Semantic validation (providers, conditions, structure)
    if let Err(e) = ConfigParser::validate(&config) {
        output::error(&format!("{}", e));
        std::process::exit(1);
    }
    output::check("Semantic validation passed");

    // Step 3: Expansion dry run, against both trigger shapes
    for trigger in [RunTrigger::Branch, RunTrigger::Tag("v0.0.0".to_string())] {
        if let Err(e) = MatrixExpander::expand(&config, &trigger) {
            output::error(&format!("Expansion failed: {}", e));
            std::process::exit(1);
        }
    }
    output::check(&format!(
        "Matrix expands to {} job(s)",
        config.matrix.len()
    ));

    if config.deploy.is_some() {
        output::check("Deploy stage configured");
    }

    output::success("Matrix description is valid");
    Ok(())
}
