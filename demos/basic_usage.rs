// Basic usage example for uniconf
//
// Run with: cargo run --example basic_usage

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uniconf::{ConfigHandle, ConfigOptions, ConfigRegistry, FileOptions, RegistryEvent};

// Define a plugin's config schema
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GreeterConfig {
    greeting: String,
    repeat: u32,
    shout: bool,
}

impl Default for GreeterConfig {
    fn default() -> Self {
        Self {
            greeting: "Hello".to_string(),
            repeat: 1,
            shout: false,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let temp = tempfile::tempdir()?;
    let registry = ConfigRegistry::builder("demo-host")
        .config_dir(temp.path())
        .debounce(Duration::from_millis(200))
        .build()?;

    println!("=== uniconf Basic Usage ===\n");

    registry.events().on_change(|event| match event {
        RegistryEvent::ConfigReloaded { owner, source } => {
            println!("  [event] {owner} reloaded ({source:?})")
        }
        other => println!("  [event] {other:?}"),
    });
    registry.events().on_failure(|owner, error| {
        eprintln!("  [failure] {owner}: {error}");
    });

    // 1. Register with immediate init and hot reload
    println!("1. Registering 'greeter'...");
    registry
        .add_config::<GreeterConfig>(
            "greeter",
            ConfigOptions::new()
                .init_now(true)
                .watch(true)
                .on_reload(|config: &ConfigHandle<GreeterConfig>| {
                    println!("  [reload] greeting is now {:?}", config.read().greeting);
                }),
        )
        .await?;
    println!("   File: {}\n", registry.config_path("greeter").display());

    // 2. Read and modify the live instance
    println!("2. Updating config...");
    let config = registry.get_config::<GreeterConfig>("greeter")?;
    config.update(|c| {
        c.greeting = "Howdy".to_string();
        c.repeat = 3;
    });
    registry.save_config("greeter").await?;
    println!("   Saved: {:?}\n", config.snapshot());

    // 3. Simulate an external edit
    println!("3. Editing the file behind the registry's back...");
    tokio::time::sleep(Duration::from_millis(300)).await;
    std::fs::write(
        registry.config_path("greeter"),
        r#"{"greeting": "Ahoy", "repeat": 2, "shout": true}"#,
    )?;
    tokio::time::sleep(Duration::from_millis(800)).await;
    let config = registry.get_config::<GreeterConfig>("greeter")?;
    println!("   Live config: {:?}\n", config.snapshot());

    // 4. Tracked files
    println!("4. Tracking a template file...");
    registry
        .add_file(
            "greeter",
            "templates/banner.txt",
            "*** {greeting} ***",
            FileOptions::new(),
        )
        .await?;
    for path in registry.get_plugin_files("greeter") {
        let content = registry.get_cached_file_by_path("greeter", &path)?;
        println!("   {} => {content}", path.display());
    }

    // 5. Lookup by schema
    println!("\n5. Lookup by schema type...");
    let by_class = registry.get_config_by_class::<GreeterConfig>()?;
    println!(
        "   Same instance as by owner: {}",
        ConfigHandle::ptr_eq(&by_class, &config)
    );

    println!("\n=== Done ===");
    Ok(())
}
