//! C++ code synthesis for Unity signer tests.
//!
//! Each case becomes one self-contained `void test_signer_<name>(void)`
//! routine plus its `RUN_TEST` registration. Output depends only on the case,
//! the parameter shape, and the oracle, so regenerating is byte-stable.
use anyhow::{Context, Result};

use crate::cases::{ParamShape, TestCase};
use crate::oracle::{QueryScheme, ReferenceOracle, SignOptions};
use crate::query::{
    derive_params, ParamValue, Query, DEFAULT_DESCRIPTION_KEY, FIAT_KEY, MAX_WITHDRAWABLE_KEY,
    MIN_WITHDRAWABLE_KEY, NONCE_KEY,
};
use crate::registry::Registry;
use crate::template::ReplacementMap;

pub const BANNER_KEY: &str = "DO_NOT_MODIFY";
pub const TESTS_KEY: &str = "SIGNER_TESTS";
pub const RUN_TESTS_KEY: &str = "SIGNER_RUN_TESTS";

const SYMBOL_PREFIX: &str = "test_signer_";
const BANNER_WIDTH: usize = 45;

/// Generated text for one case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub symbol: String,
    pub body: String,
    pub registration: String,
}

/// C++ type names and amount literal style for one generated routine.
struct CppTypes {
    config: &'static str,
    signer: &'static str,
    params: &'static str,
    amounts: AmountStyle,
}

#[derive(Clone, Copy)]
enum AmountStyle {
    /// `"50000"`
    Quoted,
    /// `50000`
    MilliSats,
    /// `50.00`
    Fiat,
}

impl CppTypes {
    fn for_shape(shape: ParamShape, derived: &Query) -> Self {
        match shape {
            ParamShape::Plain => CppTypes {
                config: "Lnurl::SignerConfig",
                signer: "Lnurl::Signer",
                params: "Lnurl::WithdrawParams",
                amounts: AmountStyle::Quoted,
            },
            ParamShape::Scaled if derived.get(FIAT_KEY).is_some() => CppTypes {
                config: "LnurlSignerConfig",
                signer: "LnurlSigner",
                params: "LnurlWithdrawParamsFiat",
                amounts: AmountStyle::Fiat,
            },
            ParamShape::Scaled => CppTypes {
                config: "LnurlSignerConfig",
                signer: "LnurlSigner",
                params: "LnurlWithdrawParamsMSat",
                amounts: AmountStyle::MilliSats,
            },
        }
    }
}

pub fn test_symbol(name: &str) -> String {
    format!("{SYMBOL_PREFIX}{name}")
}

/// Generate the test routine and registration for one case.
///
/// Any oracle failure aborts: a test with a wrong expected value is worse
/// than no test.
pub fn generate(
    case: &TestCase,
    shape: ParamShape,
    oracle: &dyn ReferenceOracle,
) -> Result<CodeBlock> {
    let derived = derive_params(case);
    let options = SignOptions {
        base_url: &case.callback_url,
        encode_output: false,
        shorten: case.shorten,
        scheme: QueryScheme::from(shape),
    };
    if derived.get(NONCE_KEY).is_none() {
        tracing::warn!(
            case = %case.name,
            "test case has no nonce; signers reject create_url without one"
        );
    }
    let signed_url = oracle
        .sign(&case.api_key, &case.tag, &derived, &options)
        .with_context(|| format!("compute expected url for test case {}", case.name))?;
    tracing::debug!(case = %case.name, params = derived.len(), "signed test case");

    let symbol = test_symbol(&case.name);
    let body = render_body(case, shape, &symbol, &derived, &signed_url);
    let registration = format!("\tRUN_TEST({symbol});");
    Ok(CodeBlock {
        symbol,
        body,
        registration,
    })
}

fn render_body(
    case: &TestCase,
    shape: ParamShape,
    symbol: &str,
    derived: &Query,
    signed_url: &str,
) -> String {
    let types = CppTypes::for_shape(shape, derived);
    let mut out = String::new();
    out.push_str(&format!("void {symbol}(void) {{\n"));
    push_line(&mut out, &format!("{} config;", types.config));
    push_line(
        &mut out,
        &format!("config.apiKey.id = {};", cpp_string(&case.api_key.id)),
    );
    push_line(
        &mut out,
        &format!("config.apiKey.key = {};", cpp_string(&case.api_key.key)),
    );
    push_line(
        &mut out,
        &format!(
            "config.apiKey.encoding = {};",
            cpp_string(case.api_key.encoding.as_str())
        ),
    );
    push_line(
        &mut out,
        &format!("config.callbackUrl = {};", cpp_string(&case.callback_url)),
    );
    if let Some(currency) = derived.get(FIAT_KEY) {
        push_line(
            &mut out,
            &format!(
                "config.fiatCurrency = {};",
                cpp_string(&currency.to_query_string())
            ),
        );
    }
    push_line(&mut out, &format!("config.shorten = {};", case.shorten));
    push_line(&mut out, &format!("{} signer(config);", types.signer));

    let nonce = derived.get(NONCE_KEY);
    if let Some(nonce) = nonce {
        push_line(
            &mut out,
            &format!(
                "const std::string nonce = {};",
                cpp_string(&nonce.to_query_string())
            ),
        );
    }

    push_line(&mut out, &format!("{} params;", types.params));
    for (key, value) in derived.iter() {
        match key {
            NONCE_KEY | FIAT_KEY => {}
            MIN_WITHDRAWABLE_KEY | MAX_WITHDRAWABLE_KEY | DEFAULT_DESCRIPTION_KEY => {
                push_line(
                    &mut out,
                    &format!("params.{key} = {};", param_literal(value, types.amounts)),
                );
            }
            _ => {
                push_line(
                    &mut out,
                    &format!(
                        "params.custom[{}] = {};",
                        cpp_string(key),
                        cpp_string(&value.to_query_string())
                    ),
                );
            }
        }
    }

    let call = if nonce.is_some() {
        "signer.create_url(params, nonce)"
    } else {
        "signer.create_url(params)"
    };
    push_line(&mut out, &format!("const std::string result = {call};"));
    push_line(
        &mut out,
        &format!("const std::string expected = {};", cpp_string(signed_url)),
    );
    push_line(&mut out, "TEST_ASSERT_EQUAL_STRING(");
    out.push_str("\t\texpected.c_str(),\n");
    out.push_str("\t\tresult.c_str()\n");
    push_line(&mut out, ");");
    out.push('}');
    out
}

fn push_line(out: &mut String, line: &str) {
    out.push('\t');
    out.push_str(line);
    out.push('\n');
}

fn param_literal(value: &ParamValue, style: AmountStyle) -> String {
    match (value, style) {
        (ParamValue::Text(text), _) => cpp_string(text),
        (ParamValue::Amount(amount), AmountStyle::Quoted) => cpp_string(&amount.query_value()),
        (ParamValue::Amount(amount), AmountStyle::MilliSats) => amount.query_value(),
        (ParamValue::Amount(amount), AmountStyle::Fiat) => format!("{:.2}", amount.0),
    }
}

/// Quote `value` as a C++ string literal.
///
/// Control bytes become three-digit octal escapes (hex escapes would swallow
/// following hex digits); `??` is broken up so no trigraph can form.
pub fn cpp_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    let mut previous = None;
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '?' if previous == Some('?') => out.push_str("\\?"),
            ch if ch.is_ascii_control() => out.push_str(&format!("\\{:03o}", u32::from(ch))),
            ch => out.push(ch),
        }
        previous = Some(ch);
    }
    out.push('"');
    out
}

/// "Do not edit" comment box naming the template the output came from.
pub fn banner(template_hint: &str) -> String {
    let rule = format!("// {}", "-".repeat(BANNER_WIDTH + 6));
    let row = |text: &str| format!("// ---{text:^width$}---", width = BANNER_WIDTH);
    [
        rule.clone(),
        row("AUTO-GENERATED // DO NOT MODIFY"),
        rule.clone(),
        row(&format!("See {template_hint}")),
        rule,
    ]
    .join("\n")
}

/// Generate every case in registry order and assemble the replacement map.
pub fn build_replacements(
    registry: &Registry,
    oracle: &dyn ReferenceOracle,
    template_hint: &str,
) -> Result<ReplacementMap> {
    let blocks = registry
        .cases()
        .iter()
        .map(|case| generate(case, registry.shape(), oracle))
        .collect::<Result<Vec<_>>>()?;
    for block in &blocks {
        tracing::debug!(symbol = %block.symbol, "generated test routine");
    }

    let bodies = blocks
        .iter()
        .map(|block| block.body.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let registrations = blocks
        .iter()
        .map(|block| block.registration.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let mut replacements = ReplacementMap::new();
    replacements.insert(BANNER_KEY.to_string(), banner(template_hint));
    replacements.insert(TESTS_KEY.to_string(), bodies);
    replacements.insert(RUN_TESTS_KEY.to_string(), registrations);
    Ok(replacements)
}

#[cfg(test)]
#[path = "codegen_tests.rs"]
mod tests;
