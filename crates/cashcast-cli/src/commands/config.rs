//! Configuration display command

use std::path::Path;

use anyhow::Result;
use cashcast_core::{default_config_path, PipelineConfig};

use super::load_config;

/// Render `config` as a TOML document accepted by `PipelineConfig::load`
pub fn render_config(config: &PipelineConfig) -> String {
    let horizons: Vec<String> = config.horizons.iter().map(u32::to_string).collect();
    let knowledge_dir = format!("{:?}", config.knowledge_dir().display().to_string());
    // Unset means the platform default, shown for reference only
    let dir_line = match config.knowledge_dir {
        Some(_) => format!("dir = {}", knowledge_dir),
        None => format!("# dir = {}", knowledge_dir),
    };

    format!(
        "[pipeline]\n\
         trailing_window_days = {}\n\
         horizons = [{}]\n\
         knowledge_horizon_days = {}\n\
         \n\
         [retry]\n\
         max_retries = {}\n\
         backoff_secs = {}\n\
         \n\
         [providers.stripe]\n\
         base_url = {:?}\n\
         \n\
         [providers.plaid]\n\
         base_url = {:?}\n\
         \n\
         [knowledge]\n\
         {}\n",
        config.trailing_window_days,
        horizons.join(", "),
        config.knowledge_horizon_days,
        config.retry.max_retries,
        config.retry.backoff.as_secs(),
        config.stripe_base_url,
        config.plaid_base_url,
        dir_line,
    )
}

pub fn cmd_config(path: Option<&Path>, show_path: bool) -> Result<()> {
    if show_path {
        match path.map(Path::to_path_buf).or_else(default_config_path) {
            Some(p) => {
                let status = if p.exists() { "" } else { " (not present, using defaults)" };
                println!("{}{}", p.display(), status);
            }
            None => println!("No config location available on this platform"),
        }
        return Ok(());
    }

    let config = load_config(path)?;
    print!("{}", render_config(&config));
    Ok(())
}
