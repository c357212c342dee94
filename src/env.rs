//! Fns to read variables from the environment more conveniently and help other functions figure
//! out what environment they're running in.

use std::{env, str::FromStr};

use lazy_static::lazy_static;
use tracing::{debug, warn};

const SECRET_LOG_BLACKLIST: [&str; 1] = ["AWS_SECRET_ACCESS_KEY"];

fn obfuscate_if_secret(blacklist: &[&str], key: &str, value: &str) -> String {
    if blacklist.contains(&key) {
        let mut last_four = value.to_string();
        last_four.drain(0..value.len().saturating_sub(4));
        format!("****{last_four}")
    } else {
        value.to_string()
    }
}

/// Get an environment variable, encoding found or missing as Option, and panic otherwise.
pub fn get_env_var(key: &str) -> Option<String> {
    let var = match env::var(key) {
        Err(env::VarError::NotPresent) => None,
        Err(err) => panic!("{err}"),
        Ok(var) => Some(var),
    };

    if let Some(ref existing_var) = var {
        let output = obfuscate_if_secret(&SECRET_LOG_BLACKLIST, key, existing_var);
        debug!("env var {key}: {output}");
    } else {
        debug!("env var {key} requested but not found")
    };

    var
}

pub fn get_env_bool(key: &str) -> bool {
    let flag = get_env_var(key).map_or(false, |var| var.to_lowercase() == "true");
    debug!("env flag {key}: {flag}");
    flag
}

/// Parse an environment variable, falling back to `default` when missing. A value which is present
/// but does not parse is a misconfiguration we refuse to run with.
pub fn get_env_parsed<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_env_var(key) {
        None => default,
        Some(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} present: {raw}, but failed to parse: {e}")),
    }
}

/// Some things are different between environments. Log formats, which store we talk to.
/// This enum is the main way to create these branches in our logic.
#[derive(Debug, PartialEq, Eq)]
pub enum Env {
    Dev,
    Prod,
    Stag,
}

pub fn get_env() -> Env {
    let env_str = get_env_var("ENV");
    match env_str {
        None => {
            warn!("no ENV in env, assuming Dev");
            Env::Dev
        }
        Some(str) => match str.as_ref() {
            "dev" => Env::Dev,
            "development" => Env::Dev,
            "stag" => Env::Stag,
            "staging" => Env::Stag,
            "prod" => Env::Prod,
            "production" => Env::Prod,
            _ => {
                panic!("ENV present: {str}, but not one of dev, stag, prod, panicking!")
            }
        },
    }
}

const MIB: u64 = 1024 * 1024;

pub const DEFAULT_MAX_ARCHIVE_SIZE: u64 = 100 * MIB;
pub const DEFAULT_MAX_EXTRACT_SIZE: u64 = 500 * MIB;
pub const DEFAULT_MAX_FILE_COUNT: usize = 10_000;
pub const DEFAULT_WORKER_COUNT: usize = 10;
pub const DEFAULT_JOB_QUEUE_CAPACITY: usize = 40;
pub const DEFAULT_QUARANTINE_KEY: &str = "invalid";

#[derive(Debug)]
pub struct EnvConfig {
    pub env: Env,
    pub pretty_print: bool,
    pub max_archive_size: u64,
    pub max_extract_size: u64,
    pub max_file_count: usize,
    pub worker_count: usize,
    pub job_queue_capacity: usize,
    pub quarantine_key: String,
    pub use_local_store: bool,
    pub local_store_root: String,
    pub aws_endpoint: Option<String>,
}

pub fn get_env_config() -> EnvConfig {
    EnvConfig {
        env: get_env(),
        pretty_print: get_env_bool("PRETTY_PRINT"),
        max_archive_size: get_env_parsed("MAX_ARCHIVE_SIZE", DEFAULT_MAX_ARCHIVE_SIZE),
        max_extract_size: get_env_parsed("MAX_EXTRACT_SIZE", DEFAULT_MAX_EXTRACT_SIZE),
        max_file_count: get_env_parsed("MAX_FILE_COUNT", DEFAULT_MAX_FILE_COUNT),
        worker_count: get_env_parsed("WORKER_COUNT", DEFAULT_WORKER_COUNT),
        job_queue_capacity: get_env_parsed("JOB_QUEUE_CAPACITY", DEFAULT_JOB_QUEUE_CAPACITY),
        quarantine_key: get_env_var("QUARANTINE_KEY")
            .unwrap_or_else(|| DEFAULT_QUARANTINE_KEY.to_string()),
        use_local_store: get_env_bool("USE_LOCAL_STORE"),
        local_store_root: get_env_var("LOCAL_STORE_ROOT").unwrap_or_else(|| "/tmp".to_string()),
        aws_endpoint: get_env_var("AWS_ENDPOINT"),
    }
}

lazy_static! {
    pub static ref ENV_CONFIG: EnvConfig = get_env_config();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_env_var_safe_some_test() {
        let test_key = "TEST_KEY_SAFE_SOME";
        let test_value = "my-env-value";
        std::env::set_var(test_key, test_value);
        assert_eq!(get_env_var(test_key), Some(test_value.to_string()));
    }

    #[test]
    fn get_env_var_safe_none_test() {
        let key = get_env_var("DOESNT_EXIST");
        assert!(key.is_none());
    }

    #[test]
    fn get_env_bool_test() {
        assert!(!get_env_bool("DOESNT_EXIST"));

        std::env::set_var("TEST_KEY_BOOL_UPPER", "TRUE");
        assert!(get_env_bool("TEST_KEY_BOOL_UPPER"));

        std::env::set_var("TEST_KEY_BOOL_FALSE", "false");
        assert!(!get_env_bool("TEST_KEY_BOOL_FALSE"));
    }

    #[test]
    fn get_env_parsed_default_test() {
        assert_eq!(get_env_parsed("DOESNT_EXIST_EITHER", 42u64), 42);
    }

    #[test]
    fn get_env_parsed_present_test() {
        std::env::set_var("TEST_KEY_PARSED", " 1024 ");
        assert_eq!(get_env_parsed("TEST_KEY_PARSED", 0u64), 1024);
    }

    #[test]
    #[should_panic]
    fn get_env_parsed_garbage_panics_test() {
        std::env::set_var("TEST_KEY_PARSED_GARBAGE", "ten thousand");
        get_env_parsed("TEST_KEY_PARSED_GARBAGE", 0usize);
    }

    #[test]
    fn obfuscate_if_secret_test() {
        let secret_key = "SECRET_KEY";
        let blacklist = vec![secret_key];
        assert_eq!(
            obfuscate_if_secret(&blacklist, secret_key, "my_secret_value"),
            "****alue"
        );

        let normal_key = "NORMAL_KEY";
        assert_eq!(
            obfuscate_if_secret(&blacklist, normal_key, "my_normal_value"),
            "my_normal_value"
        );
    }
}
