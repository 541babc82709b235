//! image-credit CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use image_credit::{
    commands::{
        cmd_index, cmd_init, cmd_purge_site, cmd_render, cmd_resolve, cmd_status,
        print_index_report, print_init_report, print_purge_report, print_resolve_report,
        print_site_completions, print_status, Components, IndexOptions, InitOptions,
    },
    config::Config,
    error::Result,
    filter::RenderContext,
    progress::LogWriterFactory,
};
use std::io::Read;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "image-credit")]
#[command(version, about = "Resolve media URLs and add image credits to rendered HTML", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "IMAGE_CREDIT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and the lookup table
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Build the lookup index from the media library
    Index {
        /// Index every site of the network
        #[arg(long, conflicts_with = "site")]
        network: bool,

        /// Drop existing rows before indexing
        #[arg(long)]
        reindex: bool,

        /// Site to index (defaults to the main site)
        #[arg(long)]
        site: Option<u64>,
    },

    /// Resolve an image URL to a media item
    Resolve {
        /// Image URL
        url: String,

        /// Site the URL appears on (defaults to the main site)
        #[arg(long)]
        site: Option<u64>,
    },

    /// Add credits to a rendered HTML file
    Render {
        /// HTML file, or '-' for stdin
        input: PathBuf,

        /// Site the content belongs to (defaults to the main site)
        #[arg(long)]
        site: Option<u64>,

        /// Render as an admin screen
        #[arg(long)]
        admin: bool,

        /// Render as a search results page
        #[arg(long)]
        search: bool,

        /// Render as a REST response
        #[arg(long)]
        rest: bool,
    },

    /// Show system status
    Status {
        /// Output site IDs with descriptions for shell completions
        #[arg(long, value_enum, hide = true)]
        completion: Option<Shell>,
    },

    /// Remove a deleted site's rows from the lookup index
    PurgeSite {
        /// Site ID
        site_id: u64,

        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory::default()))
        .with(filter)
        .init();

    // Handle init command specially (doesn't need existing config)
    if matches!(cli.command, Commands::Init { .. }) {
        return handle_init(cli).await;
    }

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "image-credit", &mut std::io::stdout());
        print_completion_extras(shell);
        return Ok(());
    }

    let config = load_config(cli.config.as_deref()).await?;
    let components = Components::open(config).await?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Index {
            network,
            reindex,
            site,
        } => {
            let options = IndexOptions {
                network,
                reindex,
                site,
            };
            let report = cmd_index(&components, options).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_index_report(&report);
            }
        }

        Commands::Resolve { url, site } => {
            let report = cmd_resolve(&components, &url, site).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_resolve_report(&report);
            }
        }

        Commands::Render {
            input,
            site,
            admin,
            search,
            rest,
        } => {
            let content = read_input(&input)?;
            let render = RenderContext {
                rest_request: rest,
                admin,
                search,
            };
            let output = cmd_render(&components, &content, site, render).await?;

            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({ "content": output }))?
                );
            } else {
                print!("{}", output);
            }
        }

        Commands::Status { completion } => {
            let status = cmd_status(&components).await?;

            if let Some(shell) = completion {
                print_site_completions(&status.sites, shell);
            } else if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }

        Commands::PurgeSite { site_id, yes } => {
            if !yes {
                eprintln!("⚠️  This will delete every lookup row of site {}!", site_id);
                eprintln!("Run with --yes to confirm.");
                std::process::exit(1);
            }

            let report = cmd_purge_site(&components, site_id).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_purge_report(&report);
            }
        }
    }

    Ok(())
}

fn read_input(input: &std::path::Path) -> Result<String> {
    if input.as_os_str() == "-" {
        let mut content = String::new();
        std::io::stdin().read_to_string(&mut content)?;
        Ok(content)
    } else {
        Ok(std::fs::read_to_string(input)?)
    }
}

fn print_completion_extras(shell: Shell) {
    match shell {
        Shell::Bash => {
            println!();
            println!("{raw}", raw = r#"# Dynamic completion for 'image-credit purge-site' site IDs"#);
            println!("{raw}", raw = r#"_image_credit_dynamic() {"#);
            println!("{raw}", raw = r#"    local cur words cword"#);
            println!("{raw}", raw = r#"    cur="${COMP_WORDS[COMP_CWORD]}""#);
            println!("{raw}", raw = r#"    words=("${COMP_WORDS[@]}")"#);
            println!("{raw}", raw = r#"    cword=$COMP_CWORD"#);
            println!("{raw}", raw = r#"    if [[ $cword -ge 2 && "${words[cword-1]}" == "purge-site" ]]; then"#);
            println!(
                "{raw}",
                raw = r#"        COMPREPLY=( $(compgen -W "$(image-credit status --completion bash 2>/dev/null)" -- "$cur") )"#
            );
            println!("{raw}", raw = r#"        return 0"#);
            println!("{raw}", raw = r#"    fi"#);
            println!("{raw}", raw = r#"    _image-credit "$@""#);
            println!("{raw}", raw = r#"}"#);
            println!(
                "{raw}",
                raw = r#"complete -F _image_credit_dynamic -o bashdefault -o default image-credit"#
            );
        }
        Shell::Zsh => {
            println!();
            println!("{}", r#"# Dynamic completion for 'image-credit purge-site' site IDs"#);
            println!("{}", r#"_image_credit_site_ids() {"#);
            println!("{}", r#"    local -a entries"#);
            println!(
                "{}",
                r#"    entries=("${(@f)$(image-credit status --completion zsh 2>/dev/null)}")"#
            );
            println!("{}", r#"    _describe -t sites 'site ids' entries"#);
            println!("{}", r#"}"#);
            println!("{}", r#"compdef _image_credit_site_ids 'image-credit purge-site'"#);
        }
        Shell::Fish => {
            println!();
            println!("{}", r#"# Dynamic completion for 'image-credit purge-site' site IDs"#);
            println!(
                "{}",
                r#"complete -c image-credit -n '__fish_seen_subcommand_from purge-site' -a '(image-credit status --completion fish 2>/dev/null)'"#
            );
        }
        _ => {}
    }
}

async fn handle_init(cli: Cli) -> Result<()> {
    let Commands::Init { force } = cli.command else {
        unreachable!()
    };

    // A .toml path names the config file itself; anything else is a directory
    let (base_dir, config_path) = if let Some(path) = cli.config {
        if path.extension().is_some_and(|e| e == "toml") {
            let base = path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(Config::default_base_dir);
            (base, path)
        } else {
            (path.clone(), path.join("config.toml"))
        }
    } else {
        let base = Config::default_base_dir();
        (base.clone(), base.join("config.toml"))
    };

    let report = cmd_init(InitOptions {
        base_dir,
        config_path,
        force,
    })
    .await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_init_report(&report);
    }

    Ok(())
}

async fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_config_path);

    if !config_path.exists() {
        eprintln!(
            "Config file not found: {}\nRun 'image-credit init' first.",
            config_path.display()
        );
        std::process::exit(1);
    }

    Config::load(&config_path)
}
