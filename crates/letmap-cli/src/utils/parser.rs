use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid triple '{0}'. Expected three comma-separated values 'X,Y,Z' (e.g., '100,100,50').")]
    InvalidTriple(String),

    #[error("Component '{component}' of '{input}' is not a valid {expected}.")]
    InvalidComponent {
        component: String,
        input: String,
        expected: &'static str,
    },

    #[error("Invalid --set format: '{0}'. Expected KEY=VALUE.")]
    InvalidKeyValue(String),

    #[error("Invalid boolean '{0}'. Expected 'true' or 'false'.")]
    InvalidBool(String),
}

/// Parses `X,Y,Z` into three values of `T`. Whitespace around components is
/// ignored.
pub fn parse_triple<T: FromStr>(input: &str, expected: &'static str) -> Result<[T; 3], ParseError> {
    let parts: Vec<&str> = input.split(',').map(str::trim).collect();
    let [x, y, z] = parts.as_slice() else {
        return Err(ParseError::InvalidTriple(input.to_string()));
    };

    let parse = |component: &str| {
        component
            .parse::<T>()
            .map_err(|_| ParseError::InvalidComponent {
                component: component.to_string(),
                input: input.to_string(),
                expected,
            })
    };
    Ok([parse(x)?, parse(y)?, parse(z)?])
}

pub fn parse_resolution(input: &str) -> Result<[usize; 3], ParseError> {
    parse_triple(input, "voxel count")
}

pub fn parse_vector(input: &str) -> Result<[f64; 3], ParseError> {
    parse_triple(input, "number")
}

pub fn parse_bool(input: &str) -> Result<bool, ParseError> {
    match input.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ParseError::InvalidBool(input.to_string())),
    }
}

/// Splits a `-S KEY=VALUE` override at the first `=`.
pub fn parse_key_value(input: &str) -> Result<(&str, &str), ParseError> {
    match input.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value.trim())),
        _ => Err(ParseError::InvalidKeyValue(input.to_string())),
    }
}
