use anyhow::Result;

use embed_dl::default_registry;

pub fn cmd_hosts() -> Result<()> {
    let registry = default_registry()?;

    println!("Hosts ({}):", registry.len());
    for (i, domain) in registry.domains().enumerate() {
        println!("{:>3}. {domain}", i + 1);
    }

    let aliases = registry.aliases();
    println!("\nAliases ({}):", aliases.len());
    for (mirror, canonical) in aliases {
        println!("     {mirror} -> {canonical}");
    }
    Ok(())
}
