use std::env;
use std::process::Command;

use assert_cmd::prelude::*;

use tidepool::repository::postgres::testutils::get_random_schema;

// Keep whatever the developer has exported from leaking into the child process
fn tidepool_command() -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("tidepool")?;
    cmd.arg("-c")
        .arg("tidepool-test-nonexistent.toml")
        .env_remove("POSTGRESDB_URL")
        .env_remove("TIDEPOOL__DATABASE__DSN")
        .env_remove("OPENAI_API_KEY");
    Ok(cmd)
}

#[test]
fn test_missing_dsn_fails() -> Result<(), Box<dyn std::error::Error>> {
    let output = tidepool_command()?.arg("--one-off").arg("SELECT 1").output()?;

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error loading the config"));
    Ok(())
}

#[test]
fn test_one_off() -> Result<(), Box<dyn std::error::Error>> {
    let dsn = match env::var("DATABASE_URL") {
        Ok(dsn) => dsn,
        Err(_) => return Ok(()),
    };

    let output = tidepool_command()?
        .arg("--one-off")
        .arg("SELECT 1 AS one, 'a' AS letter; SELECT true AS yes")
        .env("POSTGRESDB_URL", dsn)
        .env("TIDEPOOL__DATABASE__SCHEMA", get_random_schema())
        .output()?;

    assert!(output.status.success());

    // Logs go to stderr, so stdout only holds the rows
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "{\"one\":1,\"letter\":\"a\"}\n{\"yes\":true}\n"
    );
    Ok(())
}
