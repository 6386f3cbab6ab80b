// CLI commands for running submissions and managing executor config
use anyhow::{bail, Context, Result};
use judgebox_core::config::DEFAULT_CONFIG_PATH;
use judgebox_core::{ExecutionOutcome, Executor, ExecutorConfig, Language};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
pub struct LanguageInfo {
    pub name: String,
    pub aliases: Vec<&'static str>,
    pub extension: &'static str,
    pub compiled: bool,
    pub binaries: Vec<String>,
}

/// Load an explicit config file, or fall back to the default lookup.
/// Environment overrides apply either way.
fn load_config(config_path: Option<&Path>) -> Result<ExecutorConfig> {
    match config_path {
        Some(path) => {
            let config = ExecutorConfig::load(path)?.apply_env(|key| std::env::var(key).ok())?;
            config.validate()?;
            Ok(config)
        }
        None => ExecutorConfig::load_default(),
    }
}

/// Execute a single source file. Returns whether the submission succeeded.
pub async fn run_file(
    lang: &str,
    file: &Path,
    input: Option<&Path>,
    config_path: Option<&Path>,
) -> Result<bool> {
    let code = fs::read_to_string(file)
        .with_context(|| format!("Failed to read source file {}", file.display()))?;
    let stdin = match input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file {}", path.display()))?,
        None => String::new(),
    };

    let config = load_config(config_path)?;
    let executor = Executor::new(config).context("Failed to initialize executor")?;

    match executor.execute(lang, &code, &stdin).await {
        ExecutionOutcome::Success { output } => {
            print!("{}", output);
            Ok(true)
        }
        ExecutionOutcome::Failure { kind, message } => {
            eprintln!("❌ {} ({})", message, kind);
            Ok(false)
        }
    }
}

fn describe_languages(config: &ExecutorConfig) -> Vec<LanguageInfo> {
    Language::ALL
        .iter()
        .map(|&language| LanguageInfo {
            name: language.to_string(),
            aliases: language.aliases().to_vec(),
            extension: language.source_extension(),
            compiled: language != Language::Python,
            binaries: config
                .toolchains
                .binaries(language)
                .into_iter()
                .map(str::to_string)
                .collect(),
        })
        .collect()
}

/// List supported languages
pub fn list_languages(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let languages = describe_languages(&config);

    if json {
        println!("{}", serde_json::to_string_pretty(&languages)?);
        return Ok(());
    }

    println!("📋 Supported Languages:\n");
    println!(
        "{:<10} {:<22} {:<8} {:<10} {:<30}",
        "NAME", "ALIASES", "EXT", "COMPILED", "BINARIES"
    );
    println!("{}", "─".repeat(84));

    for info in &languages {
        println!(
            "{:<10} {:<22} {:<8} {:<10} {:<30}",
            info.name,
            info.aliases.join(", "),
            info.extension,
            if info.compiled { "yes" } else { "no" },
            info.binaries.join(", ")
        );
    }

    println!("\n✅ Total: {} language(s)", languages.len());
    Ok(())
}

/// The JDK tools only understand the single-dash form
fn version_flag(language: Language) -> &'static str {
    match language {
        Language::Java => "-version",
        Language::Cpp | Language::Python => "--version",
    }
}

async fn check_binary(binary: &str, flag: &str) -> Result<()> {
    let status = timeout(
        VERSION_CHECK_TIMEOUT,
        Command::new(binary)
            .arg(flag)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status(),
    )
    .await
    .with_context(|| format!("'{} {}' did not finish in time", binary, flag))?
    .with_context(|| format!("Failed to start '{}'", binary))?;

    if !status.success() {
        bail!("'{} {}' exited with {}", binary, flag, status);
    }
    Ok(())
}

/// Check that every toolchain binary can be started
pub async fn check_toolchains(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    println!("🔍 Checking toolchains...\n");

    let mut failures = 0;
    for &language in Language::ALL.iter() {
        for binary in config.toolchains.binaries(language) {
            match check_binary(binary, version_flag(language)).await {
                Ok(()) => println!("  ✅ {:<8} {}", language.to_string(), binary),
                Err(e) => {
                    failures += 1;
                    println!("  ❌ {:<8} {}: {:#}", language.to_string(), binary, e);
                }
            }
        }
    }

    if failures > 0 {
        bail!(
            "{} toolchain binar{} unavailable",
            failures,
            if failures == 1 { "y is" } else { "ies are" }
        );
    }

    println!("\n✅ All toolchains available");
    Ok(())
}

/// Write the default executor config under `<path>/config/judgebox.json`
pub fn init_config(path: &Path, force: bool) -> Result<()> {
    let config_path = path.join(DEFAULT_CONFIG_PATH);

    if config_path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }

    ExecutorConfig::default().save(&config_path)?;

    println!("✅ Wrote {}", config_path.display());
    println!("\n📋 Next steps:");
    println!("  1. Adjust toolchain paths and timeouts in {}", config_path.display());
    println!("  2. Verify toolchains: judgebox-cli check");
    println!("  3. Start the API: judgebox-api");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_config() {
        let tmp = tempfile::tempdir().unwrap();
        init_config(tmp.path(), false).unwrap();

        let written = tmp.path().join(DEFAULT_CONFIG_PATH);
        let loaded = ExecutorConfig::load(&written).unwrap();
        assert_eq!(loaded, ExecutorConfig::default());
    }

    #[test]
    fn test_init_refuses_overwrite_without_force() {
        let tmp = tempfile::tempdir().unwrap();
        init_config(tmp.path(), false).unwrap();

        let err = init_config(tmp.path(), false).unwrap_err();
        assert!(err.to_string().contains("already exists"));

        init_config(tmp.path(), true).unwrap();
    }

    #[test]
    fn test_describe_languages() {
        let languages = describe_languages(&ExecutorConfig::default());
        assert_eq!(languages.len(), 3);

        let java = languages.iter().find(|l| l.name == "java").unwrap();
        assert!(java.compiled);
        assert_eq!(java.extension, "java");
        assert_eq!(java.binaries, vec!["javac".to_string(), "java".to_string()]);

        let python = languages.iter().find(|l| l.name == "python").unwrap();
        assert!(!python.compiled);
        assert!(python.aliases.contains(&"py"));
    }

    #[test]
    fn test_version_flag() {
        assert_eq!(version_flag(Language::Java), "-version");
        assert_eq!(version_flag(Language::Cpp), "--version");
    }

    #[tokio::test]
    async fn test_check_binary_missing() {
        let err = check_binary("judgebox-no-such-binary", "--version").await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to start"));
    }

    #[tokio::test]
    async fn test_run_file_reports_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("main.rb");
        fs::write(&source, "puts 1").unwrap();

        let config = ExecutorConfig {
            workspace_root: tmp.path().join("codes"),
            ..ExecutorConfig::default()
        };
        let config_path = tmp.path().join("judgebox.json");
        config.save(&config_path).unwrap();

        let succeeded = run_file("ruby", &source, None, Some(&config_path)).await.unwrap();
        assert!(!succeeded);
    }

    #[test]
    fn test_run_file_missing_source() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let err = rt
            .block_on(run_file("python", Path::new("/no/such/file.py"), None, None))
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read source file"));
    }
}
