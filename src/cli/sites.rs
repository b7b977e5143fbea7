//! `revq sites`: list the registry.

use console::style;

use crate::config::Settings;

pub fn cmd_sites(settings: &Settings) -> anyhow::Result<()> {
    let profiles = settings.sites.profiles();
    if profiles.is_empty() {
        println!("{} No sites configured.", style("!").yellow());
        return Ok(());
    }

    println!("\n{}", style("Registered sites").bold());
    println!("{}", "-".repeat(60));
    println!("{:<15} {:<22} {:<16} Paging", "Name", "Host", "Channel");
    println!("{}", "-".repeat(60));

    for profile in profiles {
        let paging = match profile.strategy.advance {
            crate::scrapers::AdvanceMode::InfiniteScroll => "scroll",
            crate::scrapers::AdvanceMode::NumberedPages => "numbered",
        };
        println!(
            "{:<15} {:<22} {:<16} {}",
            profile.name,
            profile.host_pattern,
            profile.channel.as_str(),
            paging
        );
    }

    if let Some(ref path) = settings.source_path {
        println!("\nFrom {}", path.display());
    }
    Ok(())
}
