// src/admin/main.rs

use std::env;
use std::sync::Arc;

use addon_license::client::manager::{Addon, LicenseManager};
use addon_license::config::get_config;
use addon_license::errors::{LicenseError, LicenseResult};
use addon_license::host::store::FileOptionStore;
use addon_license::host::Host;
use addon_license::logging::init_logging;

const USAGE: &str = "usage: license_admin <list | activate <name> <key> | deactivate <name> | check>";

/// Command-line administration of the licenses kept in the file-backed store.
///
/// Add-ons are addressed by display name. The version and author of an
/// add-on are not known here, so they are sent empty when the network
/// policy is live.
#[tokio::main]
async fn main() -> LicenseResult<()> {
    let config = get_config()?;
    init_logging(&config.logging);

    let dir = config.store.resolved_directory().ok_or_else(|| {
        LicenseError::ConfigError("could not determine the store directory".to_string())
    })?;
    let host = Host::with_options(config.clone(), Arc::new(FileOptionStore::new(dir)));

    let args: Vec<String> = env::args().skip(1).collect();
    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["list"] => {
            for (id, record) in host.license_store().all()? {
                let status = record
                    .data
                    .as_ref()
                    .and_then(|d| d.status())
                    .unwrap_or("unknown");
                println!("{id}\t{}\t{status}", mask(&record.key));
            }
        }
        ["activate", name, key] => {
            let license = LicenseManager::register(&host, Addon::by_name(name))?;
            let mut manager = license.lock().await;
            manager.activate_and_save(key).await?;
            println!("License key stored for {}.", manager.id());
        }
        ["deactivate", name] => {
            let license = LicenseManager::register(&host, Addon::by_name(name))?;
            let mut manager = license.lock().await;
            manager.deactivate().await;
            println!("Deactivation requested for {}.", manager.id());
        }
        ["check"] => {
            for (id, _) in host.license_store().all()? {
                LicenseManager::register(&host, Addon::by_name(&id))?;
            }
            let ran = host.actions.do_action(&config.schedule.hook).await;
            println!("Checked {ran} license(s).");
        }
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }

    Ok(())
}

/// Show only the last four characters of a key.
fn mask(key: &str) -> String {
    if key.is_empty() {
        return "-".to_string();
    }
    let visible: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("****{visible}")
}
