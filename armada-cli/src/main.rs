//! Armada CLI tool

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "armada")]
#[command(author, version, about = "Armada fleet operations CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Tenant directory file
    #[arg(long, env = "ARMADA_DIRECTORY")]
    directory: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Onboard a tenant (account, region) into the directory
    Onboard {
        /// Tenant account id
        #[arg(long)]
        account: String,

        /// Tenant region
        #[arg(long)]
        region: String,

        /// Execution role name assumed in the tenant account
        #[arg(long)]
        role: Option<String>,
    },

    /// List onboarded tenants
    Tenants,

    /// Normalize a request and resolve its targets (front-door dry run)
    Resolve {
        /// Path to the automation request JSON
        #[arg(long)]
        request: String,

        /// Pipeline to normalize for (summary, backup, upgrade)
        #[arg(long)]
        pipeline: String,
    },

    /// Dry-run the cluster input filter
    Filter {
        /// Path to a JSON array of work items
        #[arg(long)]
        input: String,

        /// Comma-separated live clusters visible on the host
        #[arg(long)]
        clusters: String,

        /// Host account id
        #[arg(long)]
        account: String,

        /// Host region
        #[arg(long)]
        region: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    let directory_file = || {
        cli.directory
            .clone()
            .ok_or_else(|| anyhow::anyhow!("ARMADA_DIRECTORY not set"))
    };

    match cli.command {
        Commands::Onboard {
            account,
            region,
            role,
        } => {
            commands::onboard::execute(&directory_file()?, &account, &region, role.as_deref())
                .await?;
        }
        Commands::Tenants => {
            commands::tenants::execute(&directory_file()?).await?;
        }
        Commands::Resolve { request, pipeline } => {
            commands::resolve::execute(&directory_file()?, &request, &pipeline).await?;
        }
        Commands::Filter {
            input,
            clusters,
            account,
            region,
        } => {
            commands::filter::execute(&input, &clusters, &account, &region)?;
        }
    }

    Ok(())
}
