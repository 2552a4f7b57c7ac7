//! Test case model for generated signer tests.
//!
//! Cases are authored either in the built-in registry or in a JSON case file.
//! They are immutable once loaded; generation only ever reads them.
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Default protocol tag for withdraw tests.
pub const WITHDRAW_REQUEST_TAG: &str = "withdrawRequest";

/// Parameter shape of the signer API the generated tests target.
///
/// `Plain` carries withdrawable bounds as strings (`Lnurl::WithdrawParams`);
/// `Scaled` carries millisatoshi or fiat amounts as numbers.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParamShape {
    Plain,
    #[default]
    Scaled,
}

impl ParamShape {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamShape::Plain => "plain",
            ParamShape::Scaled => "scaled",
        }
    }
}

/// How `ApiKey::key` is encoded.
///
/// `Unspecified` is written as the empty string; the reference signer then
/// uses the key's UTF-8 bytes as written.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyEncoding {
    #[serde(rename = "hex")]
    Hex,
    #[serde(rename = "base64")]
    Base64,
    #[default]
    #[serde(rename = "")]
    Unspecified,
}

impl KeyEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyEncoding::Hex => "hex",
            KeyEncoding::Base64 => "base64",
            KeyEncoding::Unspecified => "",
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ApiKey {
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub encoding: KeyEncoding,
}

/// Withdrawable amount: millisatoshis, or currency units for fiat cases.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(transparent)]
pub struct Amount(pub f64);

impl Amount {
    /// Shortest decimal form, as carried in the query string (`50.00` -> `50`).
    pub fn query_value(self) -> String {
        format!("{}", self.0)
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WithdrawParams {
    pub min_withdrawable: Amount,
    pub max_withdrawable: Amount,
    #[serde(default)]
    pub default_description: String,
}

/// One scenario to generate a signer test for.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TestCase {
    pub name: String,
    pub api_key: ApiKey,
    pub callback_url: String,
    #[serde(default)]
    pub shorten: bool,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default = "default_tag")]
    pub tag: String,
    pub params: WithdrawParams,
    #[serde(default)]
    /// Extra query parameters, kept in declaration order.
    pub custom_params: Option<IndexMap<String, String>>,
    #[serde(default)]
    pub fiat_currency: Option<String>,
}

fn default_tag() -> String {
    WITHDRAW_REQUEST_TAG.to_string()
}

impl TestCase {
    /// Nonce to inject, if present and non-empty.
    pub fn nonce(&self) -> Option<&str> {
        self.nonce.as_deref().filter(|nonce| !nonce.is_empty())
    }

    /// Fiat currency to inject, if present and non-empty.
    pub fn fiat_currency(&self) -> Option<&str> {
        self.fiat_currency
            .as_deref()
            .filter(|currency| !currency.is_empty())
    }
}

/// JSON case file accepted by `--cases`.
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct CaseFile {
    #[serde(default)]
    pub shape: Option<ParamShape>,
    pub cases: Vec<TestCase>,
}

/// Load a case file from disk.
pub fn load_case_file(path: &Path) -> Result<CaseFile> {
    let bytes = fs::read(path).with_context(|| format!("read case file {}", path.display()))?;
    let file: CaseFile = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse case file {}", path.display()))?;
    Ok(file)
}
