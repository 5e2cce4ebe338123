//! Stackforge - compose stacks for scaffolded backend projects
//!
//! This is the main CLI entry point for Stackforge.

use clap::{Parser, Subcommand};
use stackforge::compose::parser::DEFAULT_OUTPUT_PATH;
use stackforge::compose::{generate, ComposeParser};
use stackforge::error::{Result, StackforgeError};
use stackforge::project::{self, switch, DatabaseKind, OptionLayer, Orm};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Stackforge - generate docker-compose stacks for new projects
#[derive(Parser)]
#[command(name = "stackforge")]
#[command(author = "Evoker Industries")]
#[command(version)]
#[command(about = "Generate docker-compose stacks for scaffolded backend projects", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a compose file from project options
    Generate {
        /// Options file (YAML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Project name
        #[arg(short, long)]
        name: Option<String>,
        /// Database (none, sqlite, postgresql, mysql)
        #[arg(long)]
        database: Option<DatabaseKind>,
        /// Database image
        #[arg(long)]
        db_image: Option<String>,
        /// Database port
        #[arg(long)]
        db_port: Option<u16>,
        /// ORM (none, sqlalchemy, ormar, tortoise, piccolo)
        #[arg(long)]
        orm: Option<Orm>,
        /// Add a redis service
        #[arg(long, overrides_with = "no_redis")]
        redis: bool,
        /// Leave out redis even if an options file enables it
        #[arg(long, overrides_with = "redis")]
        no_redis: bool,
        /// Add a rabbitmq service
        #[arg(long, overrides_with = "no_rmq")]
        rmq: bool,
        /// Leave out rmq even if an options file enables it
        #[arg(long, overrides_with = "rmq")]
        no_rmq: bool,
        /// Add zookeeper and kafka services
        #[arg(long, overrides_with = "no_kafka")]
        kafka: bool,
        /// Leave out kafka even if an options file enables it
        #[arg(long, overrides_with = "kafka")]
        no_kafka: bool,
        /// Add a taskiq worker service
        #[arg(long, overrides_with = "no_taskiq")]
        taskiq: bool,
        /// Leave out taskiq even if an options file enables it
        #[arg(long, overrides_with = "taskiq")]
        no_taskiq: bool,
        /// Add a migrator service
        #[arg(long, overrides_with = "no_migrations")]
        migrations: bool,
        /// Leave out migrations even if an options file enables it
        #[arg(long, overrides_with = "migrations")]
        no_migrations: bool,
        /// Add traefik labels and network
        #[arg(long, overrides_with = "no_traefik")]
        traefik: bool,
        /// Leave out traefik even if an options file enables it
        #[arg(long, overrides_with = "traefik")]
        no_traefik: bool,
        /// Output path
        #[arg(short, long, default_value = DEFAULT_OUTPUT_PATH)]
        output: PathBuf,
        /// Print to stdout instead of writing a file
        #[arg(long, conflicts_with = "output")]
        stdout: bool,
        /// Overwrite an existing output file
        #[arg(long)]
        force: bool,
    },

    /// Check an existing compose file
    Check {
        /// Directory to search for a compose file
        #[arg(default_value = ".")]
        dir: PathBuf,
        /// Compose file
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Generate {
            config,
            name,
            database,
            db_image,
            db_port,
            orm,
            redis,
            no_redis,
            rmq,
            no_rmq,
            kafka,
            no_kafka,
            taskiq,
            no_taskiq,
            migrations,
            no_migrations,
            traefik,
            no_traefik,
            output,
            stdout,
            force,
        } => {
            let overrides = OptionLayer {
                project_name: name,
                database,
                database_image: db_image,
                database_port: db_port,
                orm,
                enable_redis: switch(redis, no_redis),
                enable_rmq: switch(rmq, no_rmq),
                enable_kafka: switch(kafka, no_kafka),
                enable_taskiq: switch(taskiq, no_taskiq),
                enable_migrations: switch(migrations, no_migrations),
                traefik_labels: switch(traefik, no_traefik),
            };

            let options = project::resolve(config.as_deref(), overrides)?;
            tracing::info!(
                "Generating stack for {} (database: {}, orm: {})",
                options.project_name,
                options.database.kind,
                options.orm
            );

            let compose = generate(&options)?;

            if stdout {
                print!("{}", ComposeParser::render(&compose)?);
            } else {
                ComposeParser::write_file(&compose, &output, force)?;
                println!(
                    "Generated {} with services: {}",
                    output.display(),
                    compose.service_names().join(", ")
                );
            }
        }

        Commands::Check { dir, file } => {
            let compose_file = match file {
                Some(f) => f,
                None => ComposeParser::find_compose_file(&dir).ok_or_else(|| {
                    StackforgeError::ComposeParse(format!(
                        "No compose file found in {}",
                        dir.display()
                    ))
                })?,
            };

            let config = ComposeParser::parse_file(&compose_file)?;
            let warnings = ComposeParser::validate(&config)?;
            for warning in &warnings {
                tracing::warn!("{}", warning);
            }

            let order = ComposeParser::startup_order(&config)?;
            println!("{} is valid", compose_file.display());
            println!("Startup order: {}", order.join(" -> "));
        }
    }

    Ok(())
}
