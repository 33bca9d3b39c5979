mod ci;
mod client;
mod commands;
mod config;
mod error;
mod output;
mod scan;

use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser, Subcommand};
use client::CtmClient;
use commands::config_cmd::ConfigCommand;
use commands::definitions::DefinitionKind;
use commands::secrets::SecretFilter;
use commands::upsert::ExistenceCheck;
use commands::{DeployContext, Outcome};
use error::Result;
use output::Format;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// ctm-deploy: push Control-M definition files to the Automation API from CI.
///
/// Each subcommand scans one folder of the dist tree for *.json files and
/// uploads them one by one. The first failed request stops the run with a
/// non-zero exit code. A missing folder means nothing to deploy.
///
/// Dist layout:
///   {dist}/jobs/*.json                  -> ctm-deploy jobs
///   {dist}/calendars/*.json             -> ctm-deploy calendars
///   {dist}/connection-profiles/*.json   -> ctm-deploy connection-profiles
///   {dist}/site-standards/*.json        -> ctm-deploy site-standards
///   {dist}/roles/*.json                 -> ctm-deploy roles | add-roles
///   {dist}/resources/*.json             -> ctm-deploy resources
///   {dist}/deploy-descriptors/{name}    -> --deploy-descriptor {name}
///
/// Inputs (flag > env var > ~/.ctm-deploy/config.json):
///   --endpoint            CTM_ENDPOINT
///   --api-token           CTM_API_TOKEN
///   --dist-folder         CTM_DIST_FOLDER
///   --deploy-descriptor   CTM_DEPLOY_DESCRIPTOR
///   --debug-mode          CTM_DEBUG_MODE   (verbose logs, no TLS validation)
///   --user                GITHUB_ACTOR     (owner prefix for secrets)
#[derive(Parser, Debug)]
#[command(name = "ctm-deploy", version, about, long_about)]
struct Cli {
    /// Automation API base URL
    #[arg(long, global = true, env = "CTM_ENDPOINT")]
    endpoint: Option<String>,

    /// API key sent as x-api-key
    #[arg(long, global = true, env = "CTM_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Folder holding the definition sub-folders
    #[arg(long, global = true, env = "CTM_DIST_FOLDER")]
    dist_folder: Option<String>,

    /// Descriptor file name under {dist}/deploy-descriptors
    #[arg(long, global = true, env = "CTM_DEPLOY_DESCRIPTOR")]
    deploy_descriptor: Option<String>,

    /// Verbose request logging; also disables TLS certificate validation.
    /// Blank, `false`, `no`, `off` and `0` in the environment mean off.
    #[arg(
        long,
        global = true,
        env = "CTM_DEBUG_MODE",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    debug_mode: bool,

    /// Disable TLS certificate validation (self-signed endpoints)
    #[arg(
        long,
        global = true,
        env = "CTM_INSECURE",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    insecure: bool,

    /// Invoking user; its first three letters select owned secrets
    #[arg(long, global = true, env = "GITHUB_ACTOR")]
    user: Option<String>,

    /// Summary format: table (default), json, plain
    #[arg(long, global = true, env = "CTM_FORMAT")]
    format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Dist(DistCommand),
    /// Create or update secrets from a JSON mapping
    #[command(long_about = "Create or update secrets from a JSON object of name to value.\n\n\
        Only keys starting with CTM_ or with the first three letters of the\n\
        invoking user (upper-cased) are deployed; the rest are skipped.\n\n\
        Existing secrets are detected by listing /config/secrets (default) or\n\
        by probing with an update and creating on HTTP 400.\n\n\
        Examples:\n\
        ctm-deploy secrets --secrets '{\"CTM_DB_PASSWORD\": \"s3cret\"}'\n\
        ctm-deploy secrets --secrets @secrets.json --existence-check update-probe\n\
        echo '{\"CTM_A\": \"1\"}' | ctm-deploy secrets --secrets -")]
    Secrets {
        /// JSON object: inline, @file, or - for stdin
        #[arg(long, env = "CTM_SECRETS", hide_env_values = true)]
        secrets: Option<String>,
        /// How to tell whether a secret already exists
        #[arg(long, value_enum, default_value_t = ExistenceCheck::List)]
        existence_check: ExistenceCheck,
    },
    /// Delete every secret owned by the invoking user
    #[command(long_about = "Delete every secret whose name starts with the first three letters\n\
        of the invoking user (upper-cased). Shared CTM_ secrets are kept.\n\n\
        Deletions run concurrently; all of them are awaited and the failed\n\
        names are reported together.\n\n\
        Example:\n\
        ctm-deploy delete-secrets --user jdoe")]
    DeleteSecrets,
    /// Manage ctm-deploy configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCommand,
    },
}

/// Commands that work on the dist folder.
#[derive(Subcommand, Debug)]
enum DistCommand {
    /// Deploy job folders with the deploy descriptor
    #[command(long_about = "POST every {dist}/jobs/*.json to /deploy together with\n\
        {dist}/deploy-descriptors/{deploy-descriptor}.\n\n\
        Example:\n\
        ctm-deploy jobs --dist-folder dist --deploy-descriptor dev.json")]
    Jobs,
    /// Deploy calendars
    #[command(long_about = "POST every {dist}/calendars/*.json to /deploy.\n\n\
        Example:\n\
        ctm-deploy calendars --dist-folder dist")]
    Calendars,
    /// Deploy connection profiles with the deploy descriptor
    #[command(long_about = "POST every {dist}/connection-profiles/*.json to /deploy together\n\
        with {dist}/deploy-descriptors/{deploy-descriptor}.\n\n\
        Example:\n\
        ctm-deploy connection-profiles --deploy-descriptor prod.json")]
    ConnectionProfiles,
    /// Deploy site standards
    SiteStandards,
    /// Update roles, creating the ones that do not exist yet
    #[command(long_about = "For every {dist}/roles/*.json, POST it to\n\
        /config/authorization/role/{Name}. When the API answers 400 the role\n\
        is new and is created with /config/authorization/role instead.\n\n\
        Example:\n\
        ctm-deploy roles --dist-folder dist")]
    Roles,
    /// Create roles (initial bulk add, no update)
    AddRoles,
    /// Replace run-time resources (delete if present, then create)
    #[command(long_about = "For every {dist}/resources/*.json (fields ctm and name required):\n\
        list /run/resources, DELETE /run/resource/{ctm}/{name} when present,\n\
        then POST the file to /run/resource/{ctm}.\n\n\
        Example:\n\
        ctm-deploy resources --dist-folder dist")]
    Resources,
    /// Transform definitions into {dist}_transformed via the API
    #[command(long_about = "Send every *.json under {dist} (except deploy-descriptors, resources\n\
        and roles) to /deploy/transform with the deploy descriptor and write\n\
        each response to the same relative path under {dist}_transformed.\n\
        The deploy-descriptors folder is copied as-is. The output folder is\n\
        published as the step output transformPath.\n\n\
        Example:\n\
        ctm-deploy transform --dist-folder dist --deploy-descriptor dev.json")]
    Transform,
}

fn init_tracing(debug_mode: bool) {
    let default_filter = if debug_mode {
        "ctm_deploy=debug,reqwest=debug"
    } else {
        "ctm_deploy=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug_mode);

    if let Err(e) = run(cli).await {
        output::print_error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let flags = config::Config {
        endpoint: cli.endpoint,
        api_token: cli.api_token,
        dist_folder: cli.dist_folder,
        deploy_descriptor: cli.deploy_descriptor,
        format: cli.format,
    };
    let resolved = flags.resolve(config::Config::load_file());
    let format = Format::from_str(&resolved.format);

    let command = match cli.command {
        Command::Config { cmd } => return commands::config_cmd::handle(cmd, &resolved, &format),
        other => other,
    };

    if cli.debug_mode {
        output::print_warning(
            "debugMode is set to true. This disables TLS certificate validation. Do not use in production.",
        );
    } else if cli.insecure {
        output::print_warning("TLS certificate validation is disabled.");
    }

    let client = CtmClient::new(
        resolved.require_endpoint()?,
        resolved.require_token()?,
        cli.debug_mode || cli.insecure,
    )?;
    debug!("Using endpoint {}", client.base_url);
    let filter = SecretFilter::new(cli.user.as_deref());

    let outcomes = match command {
        Command::Secrets {
            secrets,
            existence_check,
        } => match secrets.filter(|s| !s.trim().is_empty()) {
            Some(raw) => {
                let secrets = commands::parse_data(&raw)?;
                commands::secrets::deploy(&client, &secrets, &filter, existence_check).await?
            }
            None => {
                info!("No secrets provided. Nothing to deploy.");
                Vec::new()
            }
        },
        Command::DeleteSecrets => commands::secrets::delete_owned(&client, &filter).await?,
        Command::Dist(cmd) => {
            let dist = resolved.require_dist_folder()?;
            let ctx = DeployContext {
                client: &client,
                dist_folder: &dist,
                deploy_descriptor: resolved.deploy_descriptor.as_deref(),
            };
            run_dist(cmd, &ctx).await?
        }
        Command::Config { .. } => Vec::new(),
    };

    report(&outcomes, &format)
}

async fn run_dist(cmd: DistCommand, ctx: &DeployContext<'_>) -> Result<Vec<Outcome>> {
    match cmd {
        DistCommand::Jobs => commands::definitions::deploy(DefinitionKind::Jobs, ctx).await,
        DistCommand::Calendars => {
            commands::definitions::deploy(DefinitionKind::Calendars, ctx).await
        }
        DistCommand::ConnectionProfiles => {
            commands::definitions::deploy(DefinitionKind::ConnectionProfiles, ctx).await
        }
        DistCommand::SiteStandards => {
            commands::definitions::deploy(DefinitionKind::SiteStandards, ctx).await
        }
        DistCommand::AddRoles => commands::definitions::deploy(DefinitionKind::NewRoles, ctx).await,
        DistCommand::Roles => commands::roles::deploy(ctx).await,
        DistCommand::Resources => commands::resources::deploy(ctx).await,
        DistCommand::Transform => {
            let (out, outcomes) = commands::transform::transform(ctx).await?;
            if out.is_dir() {
                ci::set_output("transformPath", &out.display().to_string())?;
            }
            Ok(outcomes)
        }
    }
}

fn report(outcomes: &[Outcome], format: &Format) -> Result<()> {
    if outcomes.is_empty() {
        output::print_success("Nothing to deploy");
        return Ok(());
    }
    output::print_output(&serde_json::to_value(outcomes)?, format);
    output::print_success(&format!("{} target(s) processed", outcomes.len()));
    Ok(())
}
