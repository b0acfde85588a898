//! `autograde init <marking_root>`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use autograde_core::config;
use autograde_core::paths::{config_path, expand_home};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to use as the marking root; created if missing.
    pub path: PathBuf,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let root = expand_home(&self.path);
        let written = config::scaffold_at(&root)
            .with_context(|| format!("failed to initialise '{}'", root.display()))?;
        let path = config_path(&root);
        if written {
            println!("✓ Wrote {}", path.display());
            println!("  Edit classroom_id and the roster file names, then run `autograde assignments`.");
        } else {
            println!("{} already exists; left unchanged", path.display());
        }
        Ok(())
    }
}
