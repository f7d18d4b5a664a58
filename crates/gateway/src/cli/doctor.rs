use wc_domain::config::{Config, ConfigSeverity};
use wc_providers::resolve_api_key;
use wc_store::SqliteChatStore;

/// Run all diagnostic checks and print a summary.
///
/// Returns `Ok(true)` when every check passes.
pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("widgetchat doctor");
    println!("=================\n");

    let mut all_passed = true;

    check_config_file(config_path);
    check_config_validation(config, &mut all_passed);
    check_provider_key(config, &mut all_passed);
    check_provider_reachable(config, &mut all_passed).await;
    check_database(config, &mut all_passed);
    check_blob_root(config, &mut all_passed);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

// ── Individual checks ─────────────────────────────────────────────────

fn check_config_file(config_path: &str) {
    // Defaults are a valid setup, so a missing file is reported but not failed.
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file",
        true,
        if exists {
            config_path.to_owned()
        } else {
            format!("{config_path} not found (using defaults)")
        },
    );
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
        return;
    }
    print_check(
        "Config validation",
        error_count == 0,
        format!("{} issue(s) ({error_count} error(s))", issues.len()),
    );
    for issue in &issues {
        println!("      {issue}");
    }
    if error_count > 0 {
        *all_passed = false;
    }
}

fn check_provider_key(config: &Config, all_passed: &mut bool) {
    match resolve_api_key(&config.provider) {
        Ok(_) => print_check("Provider API key", true, "present".into()),
        Err(e) => {
            print_check("Provider API key", false, e.to_string());
            *all_passed = false;
        }
    }
}

async fn check_provider_reachable(config: &Config, all_passed: &mut bool) {
    let url = &config.provider.base_url;
    let reachable = match reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
    {
        Ok(client) => client.get(url).send().await.is_ok(),
        Err(_) => false,
    };

    print_check(
        "Provider reachable",
        reachable,
        if reachable {
            url.clone()
        } else {
            format!("{url} (unreachable)")
        },
    );
    if !reachable {
        *all_passed = false;
    }
}

fn check_database(config: &Config, all_passed: &mut bool) {
    let path = &config.storage.database_path;
    match SqliteChatStore::open(path) {
        Ok(_) => print_check("Chat database", true, path.display().to_string()),
        Err(e) => {
            print_check("Chat database", false, format!("{} ({e})", path.display()));
            *all_passed = false;
        }
    }
}

fn check_blob_root(config: &Config, all_passed: &mut bool) {
    let path = &config.storage.blob_root;
    let exists = path.is_dir();
    let readable = exists && std::fs::read_dir(path).is_ok();

    let detail = match (exists, readable) {
        (true, true) => format!("{} (readable)", path.display()),
        (true, false) => format!("{} (not readable)", path.display()),
        _ => format!("{} (does not exist)", path.display()),
    };
    print_check("Attachment storage", readable, detail);
    if !readable {
        *all_passed = false;
    }
}

// ── Formatting helper ─────────────────────────────────────────────────

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
