//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

use std::{
    env,
    fs,
    path::{Path, PathBuf},
};

use log::LevelFilter;
use log4rs::{
    append::console::ConsoleAppender,
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    Config,
};

const LOG_CONFIGURATION_ENV: &str = "NODE_CLIENT_LOG_CONFIGURATION";
const DEFAULT_LOG_CONFIGURATION: &str = "config/log4rs.yml";

pub fn get_log_configuration_path(cli_path: Option<PathBuf>) -> PathBuf {
    cli_path
        .or_else(|| {
            env::var_os(LOG_CONFIGURATION_ENV)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_CONFIGURATION))
}

/// Initialise log4rs from `config_file`. If the file does not exist, `default_config` is written there first. If the
/// file still cannot be loaded, warnings and errors are logged to the console.
pub fn initialize_logging(config_file: &Path, default_config: &str) -> anyhow::Result<()> {
    if !config_file.exists() {
        if let Err(err) = install_default_logfile_config(config_file, default_config) {
            eprintln!(
                "Could not write the default log configuration to {}: {}",
                config_file.display(),
                err
            );
        }
    }

    if let Err(err) = log4rs::init_file(config_file, Default::default()) {
        eprintln!(
            "Could not load the log configuration from {}: {}. Logging to the console.",
            config_file.display(),
            err
        );
        log4rs::init_config(console_config()?)?;
    }
    Ok(())
}

fn install_default_logfile_config(path: &Path, contents: &str) -> Result<(), std::io::Error> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, contents)
}

fn console_config() -> anyhow::Result<Config> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d(%H:%M:%S)} {h({l}):5} {m}{n}")))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Warn))?;
    Ok(config)
}
