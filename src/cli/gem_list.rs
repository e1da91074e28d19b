use std::error::Error;

use crate::core::config::DataDirs;
use crate::core::gem::GemStore;

pub fn list_gems(dirs: &DataDirs) -> Result<(), Box<dyn Error>> {
    let gems = GemStore::load(&dirs.gems)?;
    println!("Gems in {}:", dirs.gems.display());
    for (key, gem) in gems.iter() {
        println!("  {key:<20} {}", gem.name);
    }
    Ok(())
}
