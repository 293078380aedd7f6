use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use hatchquote_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILE};
use secrecy::ExposeSecret;
use serde::Serialize;
use toml::Value;

use super::{to_data, CommandResult};

#[derive(Debug, Serialize)]
struct ConfigLine {
    key: &'static str,
    value: String,
    source: String,
}

pub fn run(options: LoadOptions) -> CommandResult {
    let explicit_path = options.config_path.clone();
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure("config", error),
    };

    let config_file_path = detect_config_path(explicit_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let api_token = match &config.orders.api_token {
        Some(token) => redact_token(token.expose_secret()),
        None => "<unset>".to_string(),
    };

    let lines = vec![
        line("catalog.base_url", config.catalog.base_url.clone(), &source, "HATCHQUOTE_CATALOG_BASE_URL"),
        line(
            "catalog.cache_ttl_secs",
            config.catalog.cache_ttl_secs.to_string(),
            &source,
            "HATCHQUOTE_CATALOG_CACHE_TTL_SECS",
        ),
        line(
            "catalog.timeout_secs",
            config.catalog.timeout_secs.to_string(),
            &source,
            "HATCHQUOTE_CATALOG_TIMEOUT_SECS",
        ),
        line("currency.rate_url", config.currency.rate_url.clone(), &source, "HATCHQUOTE_CURRENCY_RATE_URL"),
        line(
            "currency.display_currency",
            config.currency.display_currency.clone(),
            &source,
            "HATCHQUOTE_CURRENCY_DISPLAY_CURRENCY",
        ),
        line(
            "currency.fallback_rate",
            config.currency.fallback_rate.to_string(),
            &source,
            "HATCHQUOTE_CURRENCY_FALLBACK_RATE",
        ),
        line(
            "currency.cache_ttl_secs",
            config.currency.cache_ttl_secs.to_string(),
            &source,
            "HATCHQUOTE_CURRENCY_CACHE_TTL_SECS",
        ),
        line("orders.endpoint", config.orders.endpoint.clone(), &source, "HATCHQUOTE_ORDERS_ENDPOINT"),
        line("orders.api_token", api_token, &source, "HATCHQUOTE_ORDERS_API_TOKEN"),
        line("logging.level", config.logging.level.clone(), &source, "HATCHQUOTE_LOGGING_LEVEL"),
        line(
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &source,
            "HATCHQUOTE_LOGGING_FORMAT",
        ),
    ];

    CommandResult::success_with_data(
        "config",
        "effective config (source precedence: env > file > default)",
        to_data(&lines),
    )
}

fn line(
    key: &'static str,
    value: String,
    source: &impl Fn(&str, &str) -> String,
    env_key: &str,
) -> ConfigLine {
    ConfigLine { key, value, source: source(key, env_key) }
}

fn detect_config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then_some(path);
    }

    let root = PathBuf::from(DEFAULT_CONFIG_FILE);
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config").join(DEFAULT_CONFIG_FILE);
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

/// Keeps the first four characters of long tokens.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    if trimmed.len() > 8 && trimmed.is_char_boundary(4) {
        return format!("{}***", &trimmed[..4]);
    }
    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_token};

    #[test]
    fn nested_paths_are_found_in_config_doc() {
        let doc: Value = "[currency]\nrate_url = \"https://rates.example.uz\"\n"
            .parse()
            .expect("valid toml");
        assert!(contains_path(&doc, "currency.rate_url"));
        assert!(!contains_path(&doc, "currency.fallback_rate"));
        assert!(!contains_path(&doc, "orders.endpoint"));
    }

    #[test]
    fn tokens_never_print_in_full() {
        assert_eq!(redact_token("tok_live_1234567890"), "tok_***");
        assert_eq!(redact_token("short"), "<redacted>");
        assert_eq!(redact_token("   "), "<empty>");
    }
}
