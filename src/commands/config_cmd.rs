use crate::config::{Config, ResolvedConfig};
use crate::error::{DeployError, Result};
use crate::output::Format;
use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the current resolved configuration
    #[command(long_about = "Display the current configuration with resolved values.\n\n\
        Shows values from all sources (CLI flags > env vars > config file).\n\
        The API token is masked.\n\n\
        Example:\n\
        ctm-deploy config show")]
    Show,
    /// Set a config value (endpoint, api_token, dist_folder, deploy_descriptor, format)
    #[command(long_about = "Persist a configuration value to ~/.ctm-deploy/config.json.\n\n\
        Valid keys:\n\
          endpoint            Automation API base URL\n\
          api_token           API key sent as x-api-key\n\
          dist_folder         Folder holding jobs/, calendars/, roles/, ...\n\
          deploy_descriptor   Descriptor file name under deploy-descriptors/\n\
          format              Summary format: table, json, plain\n\n\
        Examples:\n\
        ctm-deploy config set endpoint https://ctm.example.com:8443/automation-api\n\
        ctm-deploy config set deploy_descriptor dev.json")]
    Set {
        /// Config key to set
        key: String,
        /// Value to set
        value: String,
    },
    /// Show the config file path
    Path,
}

fn mask(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() > 12 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "****".to_string()
    }
}

pub fn handle(cmd: ConfigCommand, resolved: &ResolvedConfig, format: &Format) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            let display = serde_json::json!({
                "endpoint": resolved.endpoint,
                "api_token": resolved.api_token.as_deref().map(mask),
                "dist_folder": resolved.dist_folder.as_ref().map(|p| p.display().to_string()),
                "deploy_descriptor": resolved.deploy_descriptor,
                "format": resolved.format,
                "config_file": Config::config_path().to_string_lossy().to_string(),
            });
            crate::output::print_output(&display, format);
        }
        ConfigCommand::Set { key, value } => {
            let mut cfg = Config::load_file();
            match key.as_str() {
                "endpoint" => cfg.endpoint = Some(value),
                "api_token" | "api-token" => cfg.api_token = Some(value),
                "dist_folder" | "dist-folder" => cfg.dist_folder = Some(value),
                "deploy_descriptor" | "deploy-descriptor" => cfg.deploy_descriptor = Some(value),
                "format" => cfg.format = Some(value),
                _ => {
                    return Err(DeployError::InvalidInput(format!(
                        "Unknown config key: {key}. Valid keys: endpoint, api_token, dist_folder, deploy_descriptor, format"
                    )));
                }
            }
            cfg.save_file()?;
            crate::output::print_success(&format!("Config '{key}' saved"));
        }
        ConfigCommand::Path => {
            println!("{}", Config::config_path().to_string_lossy());
        }
    }
    Ok(())
}
