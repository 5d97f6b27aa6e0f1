//! Scales
//!
//! A scale maps a raw attribute value onto a visual range before the value is
//! formatted. Scales are configured declaratively with a [`ScaleConfig`] and
//! built once into a [`Scale`] when the stylesheet is constructed.
//!
//! # Kinds
//!
//! | kind       | input        | output                              |
//! |------------|--------------|-------------------------------------|
//! | `linear`   | number       | interpolated number or color        |
//! | `log`      | number       | interpolated in log space           |
//! | `pow`      | number       | interpolated in `x^exponent` space  |
//! | `sqrt`     | number       | `pow` with exponent 0.5             |
//! | `quantize` | number       | discrete range bucket, uniform      |
//! | `quantile` | number       | discrete range bucket, by sample    |
//! | `ordinal`  | any value    | range entry by domain position      |
//!
//! Continuous scales are piecewise: a domain of `n` stops maps onto the
//! first `n` range entries. A range of colors interpolates in RGBA space
//! and yields `[r, g, b, a]`.
//!
//! Inputs a scale cannot map produce the configured `unknown` value, or
//! nothing when none is configured.

use indexmap::IndexSet;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::color::{self, Rgba};
use crate::error::StyleError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleKind {
    #[default]
    Linear,
    Log,
    Pow,
    Sqrt,
    Quantize,
    Quantile,
    Ordinal,
}

/// Domain rounding: `true` for the default tick count, or an explicit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Nice {
    Enabled(bool),
    Count(usize),
}

/// Declarative scale parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    #[serde(rename = "type")]
    pub kind: ScaleKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clamp: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nice: Option<Nice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exponent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unknown: Option<Value>,
}

impl ScaleConfig {
    pub fn new(kind: ScaleKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn from_json(value: &Value) -> Result<Self, StyleError> {
        Self::deserialize(value).map_err(|e| StyleError::InvalidScale(e.to_string()))
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn domain<I, V>(mut self, domain: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.domain = Some(domain.into_iter().map(Into::into).collect());
        self
    }

    pub fn range<I, V>(mut self, range: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.range = Some(range.into_iter().map(Into::into).collect());
        self
    }

    pub fn clamp(mut self, clamp: bool) -> Self {
        self.clamp = Some(clamp);
        self
    }

    pub fn nice(mut self, nice: Nice) -> Self {
        self.nice = Some(nice);
        self
    }

    pub fn exponent(mut self, exponent: f64) -> Self {
        self.exponent = Some(exponent);
        self
    }

    pub fn base(mut self, base: f64) -> Self {
        self.base = Some(base);
        self
    }

    pub fn unknown(mut self, unknown: impl Into<Value>) -> Self {
        self.unknown = Some(unknown.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Transform {
    Identity,
    Log { base: f64, sign: f64 },
    Pow { exponent: f64 },
}

impl Transform {
    fn apply(self, x: f64) -> f64 {
        match self {
            Transform::Identity => x,
            Transform::Log { base, sign } => sign * (sign * x).ln() / base.ln(),
            Transform::Pow { exponent } => x.signum() * x.abs().powf(exponent),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Output {
    Numbers(Vec<f64>),
    Colors(Vec<Rgba>),
}

impl Output {
    fn parse(range: &[Value]) -> Result<Self, StyleError> {
        if let Some(numbers) = range.iter().map(Value::as_f64).collect::<Option<Vec<_>>>() {
            return Ok(Output::Numbers(numbers));
        }
        range
            .iter()
            .map(color::parse_color)
            .collect::<Result<Vec<_>, _>>()
            .map(Output::Colors)
            .map_err(|_| {
                StyleError::InvalidScale("continuous range must be all numbers or all colors".to_owned())
            })
    }

    fn len(&self) -> usize {
        match self {
            Output::Numbers(v) => v.len(),
            Output::Colors(v) => v.len(),
        }
    }

    fn reverse(&mut self) {
        match self {
            Output::Numbers(v) => v.reverse(),
            Output::Colors(v) => v.reverse(),
        }
    }

    fn interpolate(&self, i: usize, t: f64) -> Value {
        match self {
            Output::Numbers(v) => Value::from(v[i] + (v[i + 1] - v[i]) * t),
            Output::Colors(v) => Value::from(color::interpolate(v[i], v[i + 1], t).to_vec()),
        }
    }
}

#[derive(Debug)]
enum Mapping {
    Continuous {
        transform: Transform,
        stops: Vec<f64>,
        output: Output,
        clamp: bool,
    },
    Thresholds {
        thresholds: Vec<f64>,
        range: Vec<Value>,
    },
    Ordinal {
        domain: Mutex<IndexSet<String>>,
        range: Vec<Value>,
        implicit: bool,
    },
}

/// A built scale.
#[derive(Debug)]
pub struct Scale {
    config: ScaleConfig,
    mapping: Mapping,
}

impl Scale {
    pub fn new(config: ScaleConfig) -> Result<Self, StyleError> {
        let mapping = match config.kind {
            ScaleKind::Linear => continuous(&config, Transform::Identity)?,
            ScaleKind::Pow => continuous(
                &config,
                Transform::Pow {
                    exponent: config.exponent.unwrap_or(1.0),
                },
            )?,
            ScaleKind::Sqrt => continuous(&config, Transform::Pow { exponent: 0.5 })?,
            ScaleKind::Log => log(&config)?,
            ScaleKind::Quantize => quantize(&config)?,
            ScaleKind::Quantile => quantile(&config)?,
            ScaleKind::Ordinal => Mapping::Ordinal {
                domain: Mutex::new(
                    config
                        .domain
                        .iter()
                        .flatten()
                        .map(ordinal_key)
                        .collect(),
                ),
                range: config.range.clone().unwrap_or_default(),
                implicit: config.unknown.is_none(),
            },
        };
        Ok(Self { config, mapping })
    }

    pub fn config(&self) -> &ScaleConfig {
        &self.config
    }

    /// Map `input`, or fall back to the configured `unknown`.
    pub fn apply(&self, input: &Value) -> Option<Value> {
        self.map(input).or_else(|| self.config.unknown.clone())
    }

    fn map(&self, input: &Value) -> Option<Value> {
        match &self.mapping {
            Mapping::Continuous {
                transform,
                stops,
                output,
                clamp,
            } => {
                let x = transform.apply(numeric(input)?);
                if x.is_nan() {
                    return None;
                }
                let i = segment(stops, x);
                let span = stops[i + 1] - stops[i];
                let mut t = if span == 0.0 { 0.5 } else { (x - stops[i]) / span };
                if *clamp {
                    let last = stops.len() - 2;
                    let lo = if i == 0 { 0.0 } else { f64::NEG_INFINITY };
                    let hi = if i == last { 1.0 } else { f64::INFINITY };
                    t = t.clamp(lo, hi);
                }
                Some(output.interpolate(i, t))
            }
            Mapping::Thresholds { thresholds, range } => {
                let x = numeric(input)?;
                if x.is_nan() || range.is_empty() {
                    return None;
                }
                let i = thresholds.partition_point(|threshold| *threshold <= x);
                range.get(i).cloned()
            }
            Mapping::Ordinal {
                domain,
                range,
                implicit,
            } => {
                if range.is_empty() {
                    return None;
                }
                let key = ordinal_key(input);
                let mut domain = domain.lock();
                let index = match domain.get_index_of(&key) {
                    Some(index) => index,
                    None if *implicit => domain.insert_full(key).0,
                    None => return None,
                };
                Some(range[index % range.len()].clone())
            }
        }
    }
}

/// `1` and `1.0` share a key.
fn ordinal_key(value: &Value) -> String {
    match value {
        Value::Number(n) => n.as_f64().map_or_else(|| n.to_string(), |f| f.to_string()),
        other => other.to_string(),
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        _ => None,
    }
}

/// Index of the segment `[stops[i], stops[i + 1]]` holding `x`.
fn segment(stops: &[f64], x: f64) -> usize {
    let last = stops.len() - 2;
    stops[1..=last].partition_point(|stop| *stop <= x).min(last)
}

fn numbers(values: &[Value], what: &str) -> Result<Vec<f64>, StyleError> {
    values
        .iter()
        .map(|value| {
            numeric(value).ok_or_else(|| StyleError::InvalidScale(format!("{what} entry {value} is not a number")))
        })
        .collect()
}

fn continuous(config: &ScaleConfig, transform: Transform) -> Result<Mapping, StyleError> {
    let mut domain = match &config.domain {
        Some(domain) => numbers(domain, "domain")?,
        None if matches!(transform, Transform::Log { .. }) => vec![1.0, 10.0],
        None => vec![0.0, 1.0],
    };
    let mut output = match &config.range {
        Some(range) => Output::parse(range)?,
        None => Output::Numbers(vec![0.0, 1.0]),
    };

    let n = domain.len().min(output.len());
    if n < 2 {
        return Err(StyleError::InvalidScale(
            "continuous scales need at least two domain and range entries".to_owned(),
        ));
    }
    domain.truncate(n);
    match &mut output {
        Output::Numbers(v) => v.truncate(n),
        Output::Colors(v) => v.truncate(n),
    }

    if let Some(count) = nice_count(config.nice) {
        match transform {
            Transform::Log { base, .. } => nice_log(&mut domain, base),
            _ => nice_linear(&mut domain, count),
        }
    }

    if domain[n - 1] < domain[0] {
        domain.reverse();
        output.reverse();
    }

    Ok(Mapping::Continuous {
        transform,
        stops: domain.into_iter().map(|x| transform.apply(x)).collect(),
        output,
        clamp: config.clamp.unwrap_or(false),
    })
}

fn log(config: &ScaleConfig) -> Result<Mapping, StyleError> {
    let base = config.base.unwrap_or(10.0);
    if base <= 0.0 || base == 1.0 {
        return Err(StyleError::InvalidScale(format!("invalid log base {base}")));
    }

    let domain = match &config.domain {
        Some(domain) => numbers(domain, "domain")?,
        None => vec![1.0, 10.0],
    };
    let sign = match domain.first() {
        Some(first) if *first < 0.0 => -1.0,
        _ => 1.0,
    };
    if domain.iter().any(|x| *x == 0.0 || x.signum() != sign) {
        return Err(StyleError::InvalidScale(
            "log domain must be strictly positive or strictly negative".to_owned(),
        ));
    }

    continuous(config, Transform::Log { base, sign })
}

fn nice_count(nice: Option<Nice>) -> Option<usize> {
    match nice? {
        Nice::Enabled(true) => Some(10),
        Nice::Enabled(false) | Nice::Count(0) => None,
        Nice::Count(count) => Some(count),
    }
}

fn tick_increment(start: f64, stop: f64, count: usize) -> f64 {
    let step = (stop - start) / count as f64;
    let power = step.log10().floor();
    let error = step / 10f64.powf(power);
    let factor = if error >= 50f64.sqrt() {
        10.0
    } else if error >= 10f64.sqrt() {
        5.0
    } else if error >= 2f64.sqrt() {
        2.0
    } else {
        1.0
    };
    if power >= 0.0 {
        factor * 10f64.powf(power)
    } else {
        -(10f64.powf(-power)) / factor
    }
}

/// Extend the outer stops to round values.
fn nice_linear(domain: &mut [f64], count: usize) {
    let (mut i0, mut i1) = (0, domain.len() - 1);
    if domain[i1] < domain[i0] {
        std::mem::swap(&mut i0, &mut i1);
    }
    let (mut start, mut stop) = (domain[i0], domain[i1]);
    let mut previous = None;

    for _ in 0..10 {
        let step = tick_increment(start, stop, count);
        if !step.is_finite() || step == 0.0 {
            return;
        }
        if previous == Some(step) {
            break;
        }
        if step > 0.0 {
            start = (start / step).floor() * step;
            stop = (stop / step).ceil() * step;
        } else {
            start = (start * step).ceil() / step;
            stop = (stop * step).floor() / step;
        }
        previous = Some(step);
    }

    domain[i0] = start;
    domain[i1] = stop;
}

/// Extend the outer stops to whole powers of `base`.
fn nice_log(domain: &mut [f64], base: f64) {
    let (mut i0, mut i1) = (0, domain.len() - 1);
    if domain[i1].abs() < domain[i0].abs() {
        std::mem::swap(&mut i0, &mut i1);
    }
    let sign = domain[i0].signum();
    let exponent = |x: f64| x.abs().ln() / base.ln();
    domain[i0] = sign * base.powf(exponent(domain[i0]).floor());
    domain[i1] = sign * base.powf(exponent(domain[i1]).ceil());
}

fn quantize(config: &ScaleConfig) -> Result<Mapping, StyleError> {
    let domain = match &config.domain {
        Some(domain) => numbers(domain, "domain")?,
        None => vec![0.0, 1.0],
    };
    let [x0, x1] = match domain.as_slice() {
        [x0, x1] => [*x0, *x1],
        _ => {
            return Err(StyleError::InvalidScale(
                "quantize domain must have exactly two entries".to_owned(),
            ))
        }
    };
    let range = config
        .range
        .clone()
        .unwrap_or_else(|| vec![Value::from(0), Value::from(1)]);

    let n = range.len().saturating_sub(1);
    let thresholds = (0..n)
        .map(|i| ((i + 1) as f64 * x1 - (i as f64 - n as f64) * x0) / (n + 1) as f64)
        .collect();
    Ok(Mapping::Thresholds { thresholds, range })
}

fn quantile(config: &ScaleConfig) -> Result<Mapping, StyleError> {
    let mut samples: Vec<f64> = config
        .domain
        .iter()
        .flatten()
        .filter_map(numeric)
        .filter(|x| !x.is_nan())
        .collect();
    samples.sort_by(f64::total_cmp);

    let range = config.range.clone().unwrap_or_default();
    if samples.is_empty() {
        return Ok(Mapping::Thresholds {
            thresholds: Vec::new(),
            range: Vec::new(),
        });
    }

    let n = range.len();
    let thresholds = (1..n)
        .map(|i| quantile_of(&samples, i as f64 / n as f64))
        .collect();
    Ok(Mapping::Thresholds { thresholds, range })
}

/// R-7 quantile of sorted samples.
fn quantile_of(sorted: &[f64], p: f64) -> f64 {
    let position = (sorted.len() - 1) as f64 * p;
    let lo = position.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    sorted[lo] + (sorted[hi] - sorted[lo]) * (position - lo as f64)
}
