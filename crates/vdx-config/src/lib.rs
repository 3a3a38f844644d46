//! Layered YAML configuration for vendex.
//!
//! Config files merge in order (base -> env -> site); later documents
//! override earlier ones key-by-key. The merged document is canonicalized
//! and hashed so daemon status can report exactly which configuration a
//! cycle ran under.
//!
//! Secrets never live in config files: portal credentials and the database
//! URL come from the environment (`VDX_PORTAL_USERNAME`,
//! `VDX_PORTAL_PASSWORD`, `VDX_DATABASE_URL`). Loading aborts if any leaf
//! string value looks like a credential.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

/// Known secret-like prefixes. If any leaf string value in the effective
/// config starts with one of these, loading aborts with CONFIG_SECRET_DETECTED.
const SECRET_PREFIXES: &[&str] = &[
    "sk-",        // generic api keys
    "sk_live",    // Stripe live
    "sk_test",    // Stripe test
    "AKIA",       // AWS access key ID
    "-----BEGIN", // PEM private keys
    "ghp_",       // GitHub PAT
    "postgres://",
    "postgresql://",
];

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    // Merge YAML docs in order: earlier docs are base, later docs override.
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical_json =
        serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    collect_leaf_strings(v, "", &mut leaves);

    for (ptr, s) in leaves {
        if looks_like_secret(&s) {
            bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
        }
    }
    Ok(())
}

fn collect_leaf_strings(v: &Value, prefix: &str, out: &mut Vec<(String, String)>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map.iter() {
                let next = format!("{}/{}", prefix, k.replace('~', "~0").replace('/', "~1"));
                collect_leaf_strings(vv, &next, out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                collect_leaf_strings(vv, &format!("{prefix}/{i}"), out);
            }
        }
        Value::String(s) => out.push((prefix.to_string(), s.clone())),
        _ => {}
    }
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}

// ---------------------------------------------------------------------------
// Typed collector settings
// ---------------------------------------------------------------------------

/// Collector knobs read from the merged config document. Everything has a
/// default so an empty config is a valid config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorSettings {
    /// Scheduled cycle interval in minutes.
    pub schedule_minutes: u64,
    /// Pause between companies within one cycle, to avoid hammering the
    /// upstream portal.
    pub inter_company_delay_secs: u64,
    /// Upstream portal base URL.
    pub portal_base_url: String,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            schedule_minutes: 20,
            inter_company_delay_secs: 5,
            portal_base_url: "https://vending.cantaloupe.online".to_string(),
        }
    }
}

impl CollectorSettings {
    /// Read settings from the merged config JSON. Missing keys fall back to
    /// defaults; wrongly-typed keys are an error, not a silent default.
    pub fn from_config(config: &Value) -> Result<Self> {
        let defaults = Self::default();

        let u64_at = |ptr: &str, default: u64| -> Result<u64> {
            match config.pointer(ptr) {
                None | Some(Value::Null) => Ok(default),
                Some(v) => v
                    .as_u64()
                    .with_context(|| format!("config key {ptr} must be a non-negative integer")),
            }
        };

        let portal_base_url = match config.pointer("/portal/base_url") {
            None | Some(Value::Null) => defaults.portal_base_url,
            Some(v) => v
                .as_str()
                .context("config key /portal/base_url must be a string")?
                .to_string(),
        };

        Ok(Self {
            schedule_minutes: u64_at("/collector/schedule_minutes", defaults.schedule_minutes)?,
            inter_company_delay_secs: u64_at(
                "/collector/inter_company_delay_secs",
                defaults.inter_company_delay_secs,
            )?,
            portal_base_url,
        })
    }
}
