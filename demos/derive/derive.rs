// Populates a settings struct from constant, env, file and dotenv variables
use secretstruct::{Config, Processor, SecretStruct};
use std::time::Duration;

#[derive(Debug, Default, SecretStruct)]
pub struct Database {
    #[secretstruct = "self"]
    pub url: String,
    #[secretstruct = "env:DEMO_DB_PASSWORD?decoder=string"]
    pub password: String,
}

#[derive(Debug, Default, SecretStruct)]
pub struct Cache {
    #[secretstruct = "constant://?val=redis%3A%2F%2Flocalhost%3A6379&decoder=string"]
    pub url: String,
}

#[derive(Debug, Default, SecretStruct)]
pub struct Settings {
    #[secretstruct = "constant://?val=billing&decoder=string"]
    pub service: String,
    #[secretstruct = "self"]
    pub api_key: String,
    pub database: Database,
    pub cache: Option<Cache>,
    #[secretstruct = "-"]
    pub region: String,
    pub port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    println!("secretstruct derive example\n");

    let dir = std::env::temp_dir().join("secretstruct-demo");
    std::fs::create_dir_all(&dir)?;
    let key_path = dir.join("api_key");
    std::fs::write(&key_path, "test-key-123")?;
    let env_path = dir.join(".env");
    std::fs::write(&env_path, "DATABASE_URL=postgres://localhost/testdb\n")?;
    // SAFETY: no other threads read the environment yet
    unsafe {
        std::env::set_var("DEMO_DB_PASSWORD", "hunter2");
    }

    // Example 1: everything resolves
    println!("1. Processing settings:");
    let mut settings = Settings {
        api_key: format!("file://{}?decoder=string", key_path.display()),
        database: Database {
            url: format!(
                "dotenv://{}?key=DATABASE_URL&decoder=string",
                env_path.display()
            ),
            ..Default::default()
        },
        region: "eu-west-1".to_string(),
        port: 8080,
        ..Default::default()
    };

    let processor = Processor::new().with_config(&Config::default().with_env_overrides()?);
    match processor.process(&mut settings).await {
        Ok(()) => {
            println!("   ✓ service: {}", settings.service);
            println!("   ✓ api key: {}", settings.api_key);
            println!("   ✓ database url: {}", settings.database.url);
            println!("   ✓ database password: {}", settings.database.password);
        }
        Err(e) => println!("   ✗ Failed to process settings: {}", e),
    }

    // The cache was absent, so it was materialized before being populated
    println!("\n2. Optional nested struct:");
    match &settings.cache {
        Some(cache) => println!("   ✓ cache url: {}", cache.url),
        None => println!("   ✗ cache was not materialized"),
    }

    // Example 3: failures are attributed to their fields
    println!("\n3. Processing with a broken locator:");
    let mut broken = Database {
        url: "constant://?err=connection%20refused".to_string(),
        password: String::new(),
    };
    match Processor::new()
        .with_timeout(Duration::from_secs(2))
        .process(&mut broken)
        .await
    {
        Ok(()) => println!("   ✗ unexpectedly succeeded"),
        Err(e) => {
            println!("   ✓ failed as expected: {}", e);
            for err in e.errors() {
                println!("   - field {:?}: {}", err.field(), err.root());
            }
        }
    }

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}
