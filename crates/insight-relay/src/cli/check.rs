// crates/insight-relay/src/cli/check.rs
// Configuration check command

use anyhow::{Result, bail};

use insight_relay::config::{RelayConfig, RelayConfigFile};

/// Print the resolved configuration and its validation report
pub fn run_check_config(config: &RelayConfig) -> Result<()> {
    println!("Config file:  {}", RelayConfigFile::config_path().display());
    println!("Listen:       {}", config.listen_addr());
    println!("Upstream:     {}", config.upstream_url);
    println!("Thread store: {}", config.thread_store_url);
    println!("Query type:   {}", config.query_type);
    println!();

    let validation = config.validate();
    println!("{}", validation.report());

    if !validation.is_valid() {
        bail!("configuration has {} error(s)", validation.errors.len());
    }
    Ok(())
}
