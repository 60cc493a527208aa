use std::path::PathBuf;

use crate::dates::DateOrder;
use crate::dedup::DedupKeyKind;
use crate::error::Result;
use crate::settings::{load_settings, save_settings, settings_path, shellexpand_path};
use crate::store::Store;

pub fn run(
    data_dir: Option<String>,
    date_order: Option<DateOrder>,
    dedup_key: Option<DedupKeyKind>,
    default_account: Option<String>,
) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        let dir = PathBuf::from(shellexpand_path(&dir));
        std::fs::create_dir_all(&dir)?;
        settings.data_dir = shellexpand_path(&dir.to_string_lossy());
    }
    if let Some(order) = date_order {
        settings.date_order = order;
    }
    if let Some(key) = dedup_key {
        settings.dedup_key = key;
    }
    if default_account.is_some() {
        settings.default_account = default_account;
    }

    std::fs::create_dir_all(&settings.data_dir)?;
    let store = Store::open(&settings.db_path())?;
    store.init()?;
    save_settings(&settings)?;

    println!("Initialized hisaab at {}", settings.data_dir);
    println!("Settings saved to {}", settings_path().display());
    Ok(())
}
