//! Parsers for the compact text forms accepted on the command line:
//! `"0.5,1,2"` for MIC lists, `"1:0.2,2:0.8"` for MIC distributions and
//! `"2000:24"` for a dose/interval pair.

use crate::dosing::Regimen;
use crate::mic::MicFrequency;
use crate::error::{PTAError, PTAResult};

fn parse_number(token: &str, what: &'static str) -> PTAResult<f64> {
    token.trim().parse::<f64>().map_err(|_| PTAError::Parse {
        what,
        input: token.to_string(),
    })
}

fn parse_pair(token: &str, what: &'static str) -> PTAResult<(f64, f64)> {
    let (left, right) = token.split_once(':').ok_or_else(|| PTAError::Parse {
        what,
        input: token.to_string(),
    })?;
    Ok((parse_number(left, what)?, parse_number(right, what)?))
}

fn fields(input: &str) -> impl Iterator<Item = &str> {
    input.split(',').map(str::trim).filter(|s| !s.is_empty())
}

pub fn parse_mic_list(input: &str) -> PTAResult<Vec<f64>> {
    let mics = fields(input)
        .map(|token| parse_number(token, "MIC value"))
        .collect::<PTAResult<Vec<f64>>>()?;

    if mics.is_empty() {
        return Err(PTAError::Parse { what: "MIC list", input: input.to_string() });
    }
    Ok(mics)
}

pub fn parse_mic_distribution(input: &str) -> PTAResult<Vec<MicFrequency>> {
    let entries = fields(input)
        .map(|token| {
            parse_pair(token, "MIC distribution entry")
                .map(|(mic, fraction)| MicFrequency::new(mic, fraction))
        })
        .collect::<PTAResult<Vec<MicFrequency>>>()?;

    if entries.is_empty() {
        return Err(PTAError::Parse { what: "MIC distribution", input: input.to_string() });
    }
    Ok(entries)
}

pub fn parse_regimen(input: &str) -> PTAResult<Regimen> {
    let (dose, interval) = parse_pair(input, "regimen (dose:interval)")?;
    Ok(Regimen::new(dose, interval))
}
