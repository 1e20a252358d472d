//! Initialization file: read, validate and write model specifications.
//!
//! The format is line based:
//!
//! - an all-uppercase token alone on a line opens a section
//! - `label value [value ...]` lines give options of the current section
//! - empty lines and lines starting with `#` are skipped
//!
//! Parameters are written `label value fixed [lower upper]` where `fixed` is
//! `True`/`False` and each bound is a float or `None`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::{
    EstimationRequest, IntegrityError, LbfgsOptions, ModelSpec, NelderMeadOptions, OptimizerKind, OptimizerOptions,
    SimulationRequest, UnsupportedOptimizer,
};
use crate::paras::para::fmt_bound;
use crate::paras::{Bounds, ParaError, ParaLabel, Parameter, ParameterCollection, parse_fixed_flag};

/// Raw parse: section -> option -> value tokens.
pub type InitDict = BTreeMap<String, BTreeMap<String, Vec<String>>>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access init file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("init file line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("init file is missing section '{0}'")]
    MissingSection(&'static str),
    #[error("init file section '{section}' is missing option '{option}'")]
    MissingOption { section: &'static str, option: &'static str },
    #[error("init file section '{section}', option '{option}': {message}")]
    BadValue {
        section: &'static str,
        option: &'static str,
        message: String,
    },
    #[error(transparent)]
    Optimizer(#[from] UnsupportedOptimizer),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    #[error(transparent)]
    Para(#[from] ParaError),
}

const PREFERENCES: &str = "PREFERENCES";
const LUCE: &str = "LUCE";
const SIMULATION: &str = "SIMULATION";
const ESTIMATION: &str = "ESTIMATION";

fn section_of(label: ParaLabel) -> &'static str {
    match label {
        ParaLabel::R | ParaLabel::Eta | ParaLabel::B => PREFERENCES,
        ParaLabel::Nu => LUCE,
    }
}

fn is_section_name(token: &str) -> bool {
    token.chars().any(|c| c.is_alphabetic()) && token.chars().filter(|c| c.is_alphabetic()).all(|c| c.is_uppercase())
}

pub fn read_init_dict(text: &str) -> Result<InitDict, ConfigError> {
    let mut dict = InitDict::new();
    let mut current: Option<String> = None;

    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() == 1 && is_section_name(tokens[0]) {
            let name = tokens[0].to_string();
            if dict.contains_key(&name) {
                return Err(ConfigError::Parse {
                    line: i + 1,
                    message: format!("section '{name}' appears twice"),
                });
            }
            dict.insert(name.clone(), BTreeMap::new());
            current = Some(name);
            continue;
        }

        let Some(section) = current.as_ref() else {
            return Err(ConfigError::Parse {
                line: i + 1,
                message: "option outside of a section".to_string(),
            });
        };
        if tokens.len() < 2 {
            return Err(ConfigError::Parse {
                line: i + 1,
                message: format!("option '{}' has no value", tokens[0]),
            });
        }
        let options = dict.entry(section.clone()).or_default();
        if options.contains_key(tokens[0]) {
            return Err(ConfigError::Parse {
                line: i + 1,
                message: format!("option '{}' repeated in section '{section}'", tokens[0]),
            });
        }
        options.insert(
            tokens[0].to_string(),
            tokens[1..].iter().map(|t| t.to_string()).collect(),
        );
    }
    Ok(dict)
}

fn section<'d>(dict: &'d InitDict, name: &'static str) -> Result<&'d BTreeMap<String, Vec<String>>, ConfigError> {
    dict.get(name).ok_or(ConfigError::MissingSection(name))
}

fn option<'d>(
    dict: &'d InitDict,
    section_name: &'static str,
    name: &'static str,
) -> Result<&'d [String], ConfigError> {
    section(dict, section_name)?
        .get(name)
        .map(|v| v.as_slice())
        .ok_or(ConfigError::MissingOption {
            section: section_name,
            option: name,
        })
}

fn scalar<T: std::str::FromStr>(
    dict: &InitDict,
    section_name: &'static str,
    name: &'static str,
    what: &str,
) -> Result<T, ConfigError> {
    let tokens = option(dict, section_name, name)?;
    let bad = |message: String| ConfigError::BadValue {
        section: section_name,
        option: name,
        message,
    };
    if tokens.len() != 1 {
        return Err(bad(format!("expected a single {what}")));
    }
    tokens[0]
        .parse()
        .map_err(|_| bad(format!("'{}' is not a valid {what}", tokens[0])))
}

fn boolean(dict: &InitDict, section_name: &'static str, name: &'static str) -> Result<bool, ConfigError> {
    let raw: String = scalar(dict, section_name, name, "boolean")?;
    parse_fixed_flag(&raw).map_err(|_| ConfigError::BadValue {
        section: section_name,
        option: name,
        message: format!("'{raw}' is not True or False"),
    })
}

fn tolerance(dict: &InitDict, section_name: &'static str, name: &'static str) -> Result<f64, ConfigError> {
    let v: f64 = scalar(dict, section_name, name, "float")?;
    if !(v.is_finite() && v > 0.0) {
        return Err(ConfigError::BadValue {
            section: section_name,
            option: name,
            message: format!("{v} must be positive"),
        });
    }
    Ok(v)
}

fn parse_bound(token: &str) -> Option<Option<f64>> {
    if token == "None" {
        Some(None)
    } else {
        token.parse::<f64>().ok().map(Some)
    }
}

fn parse_parameter(label: ParaLabel, tokens: &[String]) -> Result<Parameter, ConfigError> {
    let section_name = section_of(label);
    let bad = |message: String| ConfigError::BadValue {
        section: section_name,
        option: label.as_str(),
        message,
    };

    if tokens.len() != 2 && tokens.len() != 4 {
        return Err(bad("expected 'value fixed [lower upper]'".to_string()));
    }
    let value: f64 = tokens[0]
        .parse()
        .map_err(|_| bad(format!("'{}' is not a valid float", tokens[0])))?;
    let is_fixed = parse_fixed_flag(&tokens[1])?;
    let bounds = if tokens.len() == 4 {
        let lower = parse_bound(&tokens[2]).ok_or_else(|| bad(format!("invalid lower bound '{}'", tokens[2])))?;
        let upper = parse_bound(&tokens[3]).ok_or_else(|| bad(format!("invalid upper bound '{}'", tokens[3])))?;
        Bounds::new(lower, upper)
    } else {
        label.default_bounds()
    };
    Ok(Parameter::new(label, value, is_fixed, bounds)?)
}

impl ModelSpec {
    /// Typed view of a raw [`InitDict`], integrity-checked.
    pub fn from_init_dict(dict: &InitDict) -> Result<Self, ConfigError> {
        let mut paras = Vec::with_capacity(ParaLabel::ALL.len());
        for label in ParaLabel::ALL {
            let tokens = option(dict, section_of(label), label.as_str())?;
            paras.push(parse_parameter(label, tokens)?);
        }
        let paras = ParameterCollection::new(paras)?;

        let simulation = SimulationRequest {
            agents: scalar(dict, SIMULATION, "agents", "non-negative integer")?,
            seed: scalar(dict, SIMULATION, "seed", "non-negative integer")?,
            file: scalar(dict, SIMULATION, "file", "file name")?,
        };

        let optimizer: String = scalar(dict, ESTIMATION, "optimizer", "optimizer name")?;
        let estimation = EstimationRequest {
            detailed: boolean(dict, ESTIMATION, "detailed")?,
            optimizer: optimizer.parse::<OptimizerKind>()?,
            agents: scalar(dict, ESTIMATION, "agents", "positive integer")?,
            file: scalar::<PathBuf>(dict, ESTIMATION, "file", "file name")?,
            maxfun: scalar(dict, ESTIMATION, "maxfun", "non-negative integer")?,
        };

        let mut optimizer_options = OptimizerOptions::default();
        let lbfgs = OptimizerKind::Lbfgs.as_str();
        if dict.contains_key(lbfgs) {
            optimizer_options.lbfgs = LbfgsOptions {
                gtol: tolerance(dict, OptimizerKind::Lbfgs.as_str(), "gtol")?,
                eps: tolerance(dict, OptimizerKind::Lbfgs.as_str(), "eps")?,
            };
        }
        let nm = OptimizerKind::NelderMead.as_str();
        if dict.contains_key(nm) {
            optimizer_options.nelder_mead = NelderMeadOptions {
                xtol: tolerance(dict, OptimizerKind::NelderMead.as_str(), "xtol")?,
                ftol: tolerance(dict, OptimizerKind::NelderMead.as_str(), "ftol")?,
            };
        }

        let spec = ModelSpec {
            paras,
            simulation,
            estimation,
            optimizer_options,
        };
        spec.check_integrity()?;
        Ok(spec)
    }
}

pub fn parse_model_spec(text: &str) -> Result<ModelSpec, ConfigError> {
    ModelSpec::from_init_dict(&read_init_dict(text)?)
}

pub fn read_init_file(path: &Path) -> Result<ModelSpec, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let spec = parse_model_spec(&text)?;
    tracing::debug!(path = %path.display(), "init file loaded");
    Ok(spec)
}

/// Four decimals, moved inward if rounding would leave the bounds.
fn format_value(value: f64, bounds: &Bounds) -> String {
    let scaled = value * 1e4;
    for candidate in [scaled.round(), scaled.floor(), scaled.ceil()] {
        let v = candidate / 1e4;
        if bounds.contains(v) {
            return format!("{v:.4}");
        }
    }
    format!("{value}")
}

fn bool_token(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

pub fn format_init_file(spec: &ModelSpec) -> String {
    let mut out = String::new();
    let line = |out: &mut String, label: &str, value: &str| out.push_str(&format!("{label:<10} {value:>25}\n"));

    for section_name in [PREFERENCES, LUCE] {
        out.push_str(section_name);
        out.push_str("\n\n");
        for para in spec.paras.iter().filter(|p| section_of(p.label()) == section_name) {
            let bounds = para.bounds();
            out.push_str(&format!(
                "{:<10} {:>25} {:>10} {:>25} {:>25}\n",
                para.label().as_str(),
                format_value(para.value(), &bounds),
                bool_token(para.is_fixed()),
                fmt_bound(bounds.lower),
                fmt_bound(bounds.upper),
            ));
        }
        out.push('\n');
    }

    out.push_str(SIMULATION);
    out.push_str("\n\n");
    line(&mut out, "agents", &spec.simulation.agents.to_string());
    line(&mut out, "seed", &spec.simulation.seed.to_string());
    line(&mut out, "file", &spec.simulation.file);
    out.push('\n');

    let est = &spec.estimation;
    out.push_str(ESTIMATION);
    out.push_str("\n\n");
    line(&mut out, "detailed", bool_token(est.detailed));
    line(&mut out, "optimizer", est.optimizer.as_str());
    line(&mut out, "agents", &est.agents.to_string());
    line(&mut out, "file", &est.file.display().to_string());
    line(&mut out, "maxfun", &est.maxfun.to_string());
    out.push('\n');

    let opts = &spec.optimizer_options;
    out.push_str(OptimizerKind::Lbfgs.as_str());
    out.push_str("\n\n");
    line(&mut out, "gtol", &format!("{:.4e}", opts.lbfgs.gtol));
    line(&mut out, "eps", &format!("{:.4e}", opts.lbfgs.eps));
    out.push('\n');

    out.push_str(OptimizerKind::NelderMead.as_str());
    out.push_str("\n\n");
    line(&mut out, "xtol", &format!("{:.4e}", opts.nelder_mead.xtol));
    line(&mut out, "ftol", &format!("{:.4e}", opts.nelder_mead.ftol));
    out
}

pub fn write_init_file(spec: &ModelSpec, path: &Path) -> Result<(), ConfigError> {
    std::fs::write(path, format_init_file(spec)).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const INIT: &str = "\
# Baseline model.
PREFERENCES

r          0.1   False
eta        0.0   False  -0.5  0.5
b          1.0   True   0.0   None

LUCE

nu         1.0   False

SIMULATION

agents     5
seed       1423
file       data

ESTIMATION

detailed   False
optimizer  LBFGS
agents     5
file       data.csv
maxfun     100

LBFGS

gtol       1e-5
eps        1e-6
";

    #[test]
    fn parses_the_baseline_model() {
        let spec = parse_model_spec(INIT).unwrap();
        assert_eq!(spec.value(ParaLabel::R), 0.1);
        assert!(spec.paras.get(ParaLabel::B).is_fixed());
        assert_eq!(spec.paras.get(ParaLabel::Eta).bounds(), Bounds::new(Some(-0.5), Some(0.5)));
        assert_eq!(spec.paras.get(ParaLabel::B).bounds(), Bounds::new(Some(0.0), None));
        assert_eq!(spec.paras.get(ParaLabel::Nu).bounds(), ParaLabel::Nu.default_bounds());
        assert_eq!(spec.simulation.seed, 1423);
        assert_eq!(spec.estimation.optimizer, OptimizerKind::Lbfgs);
        assert_eq!(spec.estimation.file, PathBuf::from("data.csv"));
        assert_eq!(spec.optimizer_options.nelder_mead, NelderMeadOptions::default());
    }

    #[test]
    fn raw_dict_keeps_token_lists() {
        let dict = read_init_dict(INIT).unwrap();
        assert_eq!(dict["PREFERENCES"]["eta"], vec!["0.0", "False", "-0.5", "0.5"]);
        assert_eq!(dict.len(), 5);
    }

    #[test]
    fn unsupported_optimizer_is_rejected_at_load() {
        let text = INIT.replace("optimizer  LBFGS", "optimizer  SCIPY-POWELL");
        assert!(matches!(parse_model_spec(&text), Err(ConfigError::Optimizer(_))));
    }

    #[test]
    fn configuration_errors_are_specific() {
        let text = INIT.replace("LUCE\n\nnu         1.0   False\n", "");
        assert!(matches!(parse_model_spec(&text), Err(ConfigError::MissingSection("LUCE"))));

        let text = INIT.replace("seed       1423\n", "");
        assert!(matches!(
            parse_model_spec(&text),
            Err(ConfigError::MissingOption { section: "SIMULATION", option: "seed" })
        ));

        let text = INIT.replace("r          0.1   False", "r          0.1   maybe");
        assert!(matches!(parse_model_spec(&text), Err(ConfigError::Para(ParaError::InvalidFixedFlag(_)))));

        let text = INIT.replace("-0.5  0.5", "0.5  -0.5");
        assert!(matches!(
            parse_model_spec(&text),
            Err(ConfigError::Para(ParaError::MalformedBounds { .. }))
        ));

        let text = INIT.replace("agents     5\nfile       data.csv", "agents     0\nfile       data.csv");
        assert!(matches!(parse_model_spec(&text), Err(ConfigError::Integrity(_))));

        assert!(matches!(
            parse_model_spec("r 0.1 False\n"),
            Err(ConfigError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn write_then_read_is_stable() {
        let mut spec = parse_model_spec(INIT).unwrap();
        spec.paras
            .set_values(
                crate::paras::Perspective::Economic,
                crate::paras::Scope::All,
                &[0.123456, 0.49999, 1.0, 4.99996],
            )
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.ini");
        write_init_file(&spec, &path).unwrap();
        let back = read_init_file(&path).unwrap();

        for label in ParaLabel::ALL {
            assert!((back.value(label) - spec.value(label)).abs() <= 5e-5 + 1e-12, "{label}");
            assert_eq!(back.paras.get(label).bounds(), spec.paras.get(label).bounds());
            assert_eq!(back.paras.get(label).is_fixed(), spec.paras.get(label).is_fixed());
        }
        assert!(back.paras.get(ParaLabel::Nu).bounds().contains(back.value(ParaLabel::Nu)));
        assert_eq!(back.simulation, spec.simulation);
        assert_eq!(back.estimation, spec.estimation);

        // A second pass reproduces the file exactly.
        assert_eq!(format_init_file(&back), format_init_file(&parse_model_spec(&format_init_file(&back)).unwrap()));
    }

    #[test]
    fn rounding_stays_inside_bounds() {
        let bounds = Bounds::new(Some(0.01), Some(0.49999));
        assert_eq!(format_value(0.49999, &bounds), "0.4999");
        assert_eq!(format_value(0.25, &bounds), "0.2500");
        assert_eq!(format_value(2.0, &Bounds::new(Some(0.0), None)), "2.0000");
    }
}
