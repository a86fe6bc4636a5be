use std::path::{Path, PathBuf};

use crate::db::Store;
use crate::error::Result;
use crate::settings::{load_config, save_config, shellexpand_path};

pub fn run(config_path: &Path, data_dir: Option<String>, force: bool) -> Result<()> {
    let mut config = load_config(config_path);
    let moved = data_dir.is_some();
    if let Some(dir) = data_dir {
        config.storage.data_dir = shellexpand_path(&dir);
    }

    if config_path.exists() && !force && !moved {
        println!("Config exists at {} (use --force to rewrite)", config_path.display());
    } else {
        save_config(config_path, &config)?;
        println!("Wrote {}", config_path.display());
    }

    let resolved = PathBuf::from(shellexpand_path(&config.storage.data_dir));
    std::fs::create_dir_all(&resolved)?;
    Store::open(&config.db_path())?;

    println!("Initialized reimburse at {}", resolved.display());
    Ok(())
}
