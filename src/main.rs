use std::{process::ExitCode, sync::Arc};

use arrayc::{
    CompilerOptions, LoggingMode, MemoryAllocation,
    compile::{compile_unit, unit_instances},
    middle::instance::{InstanceBody, resolver::InstanceResolver},
};
use clap::{CommandFactory, Parser as ClapParser, error::ErrorKind};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod demos;

#[derive(Debug, ClapParser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Demonstration functions to compile; all of them when empty
    functions: Vec<String>,

    /// Log the given pass (repeatable)
    #[arg(long = "log-pass", value_name = "PASS")]
    log_passes: Vec<String>,

    /// Log every pass
    #[arg(long)]
    log_all: bool,

    #[arg(long, default_value_t = MemoryAllocation::Dynamic)]
    allocation: MemoryAllocation,

    /// Let copies into output names be fused away
    #[arg(long)]
    no_preserve_final_names: bool,

    /// Emit the given operation as a function instead of inlining it
    #[arg(long = "no-inline", value_name = "OPERATION")]
    no_inline: Vec<String>,
}

impl Args {
    fn logging_mode(&self) -> LoggingMode {
        if self.log_all {
            LoggingMode::AlwaysOn
        } else if !self.log_passes.is_empty() {
            LoggingMode::selective(self.log_passes.iter().cloned())
        } else {
            LoggingMode::Silent
        }
    }

    fn options(&self) -> CompilerOptions {
        self.no_inline.iter().fold(
            CompilerOptions::default()
                .with_memory_allocation(self.allocation)
                .with_logging(self.logging_mode())
                .with_preserve_final_names(!self.no_preserve_final_names),
            |options, operation| options.without_inlining(operation.clone()),
        )
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = match args.logging_mode() {
        LoggingMode::Silent => "warn",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let functions = demos::all()
        .into_iter()
        .filter(|(body, _)| args.functions.is_empty() || args.functions.iter().any(|f| f == body.name()))
        .collect::<Vec<_>>();

    if functions.is_empty() {
        Args::command()
            .error(
                ErrorKind::InvalidValue,
                format!("No demonstration function named {}", args.functions.join(", ")),
            )
            .exit();
    }

    let resolver = InstanceResolver::new(Arc::new(args.options()));
    let results = compile_unit(functions, &resolver);

    /* Functions */

    let mut failed = false;
    for (name, result) in &results {
        match result {
            Ok(compiled) => {
                println!("{}", compiled.body);

                for (variable, ty) in compiled.variable_types() {
                    println!("  {} {}", ty.declaration(variable).dimmed(), ty.to_string().dimmed());
                }
                println!();
            }
            Err(error) => {
                failed = true;
                eprintln!("{} {name}: {error}", "error:".red().bold());
            }
        }
    }

    /* Instances */

    let compiled = results.iter().filter_map(|(_, result)| result.as_ref().ok());
    for instance in unit_instances(compiled) {
        match instance.body() {
            InstanceBody::Literal(code) => println!("{code}"),
            InstanceBody::Inlined(_) => println!(
                "{} {}",
                "inlined".cyan(),
                instance.function_type().prototype(instance.name())
            ),
            InstanceBody::Instructions(body) => println!("{body}"),
        }
    }

    tracing::debug!(instances = resolver.build_count(), "instances built");

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
