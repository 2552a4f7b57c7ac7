//! Test case registry: built-in cases per parameter shape, plus validation.
//!
//! A `Registry` can only be built through `Registry::new`, which rejects
//! case sets the target framework would mis-handle (shadowed symbols,
//! invalid identifiers, reserved custom keys, amounts that cannot be
//! written as the C++ field type).
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::collections::BTreeSet;

use crate::cases::{
    Amount, ApiKey, KeyEncoding, ParamShape, TestCase, WithdrawParams, WITHDRAW_REQUEST_TAG,
};
use crate::query::{
    is_reserved_key, DEFAULT_DESCRIPTION_KEY, MAX_WITHDRAWABLE_KEY, MIN_WITHDRAWABLE_KEY,
};

const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";
const BASE_PARAM_KEYS: [&str; 3] = [
    MIN_WITHDRAWABLE_KEY,
    MAX_WITHDRAWABLE_KEY,
    DEFAULT_DESCRIPTION_KEY,
];

/// Ordered, validated, read-only set of cases.
#[derive(Debug)]
pub struct Registry {
    shape: ParamShape,
    cases: Vec<TestCase>,
}

impl Registry {
    pub fn new(shape: ParamShape, cases: Vec<TestCase>) -> Result<Self> {
        validate_cases(shape, &cases)?;
        Ok(Self { shape, cases })
    }

    pub fn shape(&self) -> ParamShape {
        self.shape
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }
}

fn validate_cases(shape: ParamShape, cases: &[TestCase]) -> Result<()> {
    let identifier = Regex::new(IDENTIFIER_PATTERN).context("compile identifier pattern")?;
    let mut seen = BTreeSet::new();
    for case in cases {
        if !identifier.is_match(&case.name) {
            return Err(anyhow!(
                "test case name {:?} is not a valid identifier",
                case.name
            ));
        }
        if !seen.insert(case.name.as_str()) {
            return Err(anyhow!("duplicate test case name {:?}", case.name));
        }
        if case.tag.is_empty() {
            return Err(anyhow!("test case {} has an empty tag", case.name));
        }
        if shape == ParamShape::Plain && case.fiat_currency().is_some() {
            return Err(anyhow!(
                "test case {} sets fiatCurrency, which the plain parameter shape cannot carry",
                case.name
            ));
        }
        validate_amounts(shape, case)?;
        if let Some(custom) = &case.custom_params {
            for key in custom.keys() {
                if BASE_PARAM_KEYS.contains(&key.as_str()) || is_reserved_key(key) {
                    return Err(anyhow!(
                        "test case {} custom parameter {:?} collides with a protocol parameter",
                        case.name,
                        key
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Amounts must render identically in the C++ literal and the signed query.
fn validate_amounts(shape: ParamShape, case: &TestCase) -> Result<()> {
    let bounds = [
        (MIN_WITHDRAWABLE_KEY, case.params.min_withdrawable),
        (MAX_WITHDRAWABLE_KEY, case.params.max_withdrawable),
    ];
    let fiat = case.fiat_currency().is_some();
    for (key, amount) in bounds {
        if !amount.0.is_finite() || amount.0 < 0.0 {
            return Err(anyhow!(
                "test case {} {key} must be a non-negative number",
                case.name
            ));
        }
        match shape {
            ParamShape::Scaled if fiat => {
                if format!("{:.2}", amount.0).parse::<f64>().ok() != Some(amount.0) {
                    return Err(anyhow!(
                        "test case {} {key} {} has more than two decimal places",
                        case.name,
                        amount.query_value()
                    ));
                }
            }
            ParamShape::Scaled => {
                if amount.0.fract() != 0.0 {
                    return Err(anyhow!(
                        "test case {} {key} {} is not a whole number of millisatoshis",
                        case.name,
                        amount.query_value()
                    ));
                }
            }
            ParamShape::Plain => {}
        }
    }
    if case.params.max_withdrawable.0 < case.params.min_withdrawable.0 {
        return Err(anyhow!(
            "test case {} maxWithdrawable is less than minWithdrawable",
            case.name
        ));
    }
    Ok(())
}

const CALLBACK_URL: &str = "https://localhost:3000/lnurl";

fn hex_key() -> ApiKey {
    ApiKey {
        id: "5d4aeb462a".to_string(),
        key: "ef9901bebc801518e7d862c2edaedd3acd86ec132fb3bd5ac0013c9a5ba478db".to_string(),
        encoding: KeyEncoding::Hex,
    }
}

fn reserved_chars_key() -> ApiKey {
    ApiKey {
        id: "2bd84343e7".to_string(),
        key: "6e778c37ed08882a934ad1a038d4e967b8a31dc2dbee9dba91de2ab6ded357db".to_string(),
        encoding: KeyEncoding::Hex,
    }
}

fn base64_key(encoding: KeyEncoding) -> ApiKey {
    ApiKey {
        id: "9Pfv1wY=".to_string(),
        key: "zc5UwZHCrug1GuOTIodVQKFii40gXEDbydClsqs/tIM=".to_string(),
        encoding,
    }
}

fn withdraw(min: f64, max: f64, description: &str) -> WithdrawParams {
    WithdrawParams {
        min_withdrawable: Amount(min),
        max_withdrawable: Amount(max),
        default_description: description.to_string(),
    }
}

fn case(
    name: &str,
    api_key: ApiKey,
    shorten: bool,
    nonce: &str,
    params: WithdrawParams,
) -> TestCase {
    TestCase {
        name: name.to_string(),
        api_key,
        callback_url: CALLBACK_URL.to_string(),
        shorten,
        nonce: Some(nonce.to_string()),
        tag: WITHDRAW_REQUEST_TAG.to_string(),
        params,
        custom_params: None,
        fiat_currency: None,
    }
}

fn with_custom(mut case: TestCase, custom: &[(&str, &str)]) -> TestCase {
    case.custom_params = Some(
        custom
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect(),
    );
    case
}

fn with_fiat(mut case: TestCase, currency: &str) -> TestCase {
    case.fiat_currency = Some(currency.to_string());
    case
}

const RESERVED_CHARS_DESCRIPTION: &str =
    "abcABC0123 ESCAPED # UNESCAPED -_.!~*'() RESERVED ;,/?:@&=+$";

/// Built-in cases for a parameter shape, in generation order.
pub fn builtin_cases(shape: ParamShape) -> Vec<TestCase> {
    match shape {
        ParamShape::Plain => plain_cases(),
        ParamShape::Scaled => scaled_cases(),
    }
}

fn plain_cases() -> Vec<TestCase> {
    vec![
        case(
            "create_url_withdraw",
            hex_key(),
            false,
            "test_withdraw",
            withdraw(40000.0, 60000.0, ""),
        ),
        case(
            "create_url_withdraw_shortened",
            hex_key(),
            true,
            "test_w_s",
            withdraw(50000.0, 60000.0, ""),
        ),
        case(
            "create_url_base64_encoded_key",
            base64_key(KeyEncoding::Base64),
            false,
            "test_base64_encoded_key",
            withdraw(50000.0, 60000.0, ""),
        ),
        case(
            "create_url_unspecified_encoding",
            base64_key(KeyEncoding::Unspecified),
            false,
            "test_base64_unspecified_encoding",
            withdraw(50000.0, 60000.0, ""),
        ),
        case(
            "create_url_unescaped_escaped_reserved_chars",
            reserved_chars_key(),
            false,
            "test_unescaped_escaped_reserved_chars",
            withdraw(12.0, 12.0, RESERVED_CHARS_DESCRIPTION),
        ),
        with_custom(
            case(
                "create_url_withdraw_custom_params",
                hex_key(),
                false,
                "test_withdraw_custom_params",
                withdraw(50000.0, 50000.0, ""),
            ),
            &[
                ("custom1", "custom param"),
                ("custom2", "another custom param"),
            ],
        ),
    ]
}

fn scaled_cases() -> Vec<TestCase> {
    vec![
        case(
            "create_url_withdraw_msat",
            hex_key(),
            false,
            "test_withdraw_msat",
            withdraw(50000.0, 60000.0, ""),
        ),
        with_fiat(
            case(
                "create_url_withdraw_fiat",
                hex_key(),
                false,
                "test_withdraw_fiat",
                withdraw(50.0, 50.0, "description: test_withdraw_fiat"),
            ),
            "CZK",
        ),
        case(
            "create_url_withdraw_msat_shortened",
            hex_key(),
            true,
            "test_w_msat_s",
            withdraw(50000.0, 60000.0, ""),
        ),
        with_fiat(
            case(
                "create_url_withdraw_fiat_shortened",
                hex_key(),
                true,
                "test_w_fiat_s",
                withdraw(50.0, 50.0, ""),
            ),
            "CZK",
        ),
        case(
            "create_url_base64_encoded_key",
            base64_key(KeyEncoding::Base64),
            false,
            "test_base64_encoded_key",
            withdraw(50000.0, 60000.0, ""),
        ),
        case(
            "create_url_unspecified_encoding",
            base64_key(KeyEncoding::Unspecified),
            false,
            "test_base64_unspecified_encoding",
            withdraw(50000.0, 60000.0, ""),
        ),
        case(
            "create_url_unescaped_escaped_reserved_chars",
            reserved_chars_key(),
            false,
            "test_unescaped_escaped_reserved_chars",
            withdraw(12.0, 12.0, RESERVED_CHARS_DESCRIPTION),
        ),
        with_custom(
            case(
                "create_url_withdraw_msat_custom_params",
                hex_key(),
                false,
                "test_withdraw_msat_custom_params",
                withdraw(50000.0, 50000.0, ""),
            ),
            &[
                ("custom1", "custom param"),
                ("custom2", "another custom param"),
            ],
        ),
    ]
}
