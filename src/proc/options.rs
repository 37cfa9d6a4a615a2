//! Typed option maps of processors.

use indexmap::IndexMap;

use crate::errs::{PanError, PanResult};
use crate::proc::meta::meta;
use crate::validate;

#[derive(Debug, Clone, PartialEq)]
pub enum OptValue {
    Bool(bool),
    Int(i64),
    Dec(f64),
    Str(String),
    List(Vec<String>),
}

impl OptValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            OptValue::Bool(_) => "bool",
            OptValue::Int(_) => "int",
            OptValue::Dec(_) => "decimal",
            OptValue::Str(_) => "string",
            OptValue::List(_) => "list",
        }
    }

    pub fn as_bool(&self) -> PanResult<bool> {
        match self {
            OptValue::Bool(x) => Ok(*x),
            _ => Err(self.type_error("bool")),
        }
    }

    pub fn as_int(&self) -> PanResult<i64> {
        match self {
            OptValue::Int(x) => Ok(*x),
            _ => Err(self.type_error("int")),
        }
    }

    pub fn as_dec(&self) -> PanResult<f64> {
        match self {
            OptValue::Dec(x) => Ok(*x),
            OptValue::Int(x) => Ok(*x as f64),
            _ => Err(self.type_error("decimal")),
        }
    }

    pub fn as_str(&self) -> PanResult<&str> {
        match self {
            OptValue::Str(x) => Ok(x),
            _ => Err(self.type_error("string")),
        }
    }

    fn type_error(&self, wanted: &str) -> PanError {
        PanError::Validation(format!(
            "option holds {}, not {wanted}",
            self.type_name()
        ))
    }

    /// Parse `raw` as the same type as `self`.
    pub fn parse_like(&self, raw: &str) -> PanResult<OptValue> {
        let bad = |kind: &str| {
            PanError::Validation(format!("bad {kind} value: {raw}"))
        };
        match self {
            OptValue::Bool(_) => match raw {
                "1" | "true" => Ok(OptValue::Bool(true)),
                "0" | "false" => Ok(OptValue::Bool(false)),
                _ => Err(bad("bool")),
            },
            OptValue::Int(_) => {
                raw.parse().map(OptValue::Int).map_err(|_| bad("int"))
            }
            OptValue::Dec(_) => {
                raw.parse().map(OptValue::Dec).map_err(|_| bad("decimal"))
            }
            OptValue::Str(_) => Ok(OptValue::Str(raw.to_owned())),
            OptValue::List(_) => Ok(OptValue::List(
                raw.split(',').map(|s| s.to_owned()).collect(),
            )),
        }
    }
}

pub type Validator = fn(&OptValue) -> bool;

#[derive(Debug, Clone)]
struct Opt {
    description: String,
    default: OptValue,
    global: Option<String>,
    value: Option<OptValue>,
    ignored: bool,
    validator: Option<Validator>,
}

/// Registry of typed options: name, description, default (possibly backed
/// by a named global of [`Meta`](crate::proc::meta::Meta)), current value
/// and an optional validation predicate. Unknown names and non-validating
/// values fail at set time.
#[derive(Debug, Clone, Default)]
pub struct Options {
    opts: IndexMap<String, Opt>,
}

impl Options {
    pub fn add_opt(&mut self, name: &str, description: &str, default: OptValue) {
        self.opts.insert(
            name.to_owned(),
            Opt {
                description: description.to_owned(),
                default,
                global: None,
                value: None,
                ignored: false,
                validator: None,
            },
        );
    }

    pub fn add_opt_check(
        &mut self,
        name: &str,
        description: &str,
        default: OptValue,
        validator: Validator,
    ) {
        self.add_opt(name, description, default);
        self.opts.get_mut(name).unwrap().validator = Some(validator);
    }

    /// Register an option whose default is the named global.
    pub fn add_gopt(&mut self, name: &str, description: &str, global: &str) {
        let default = meta()
            .get(global)
            .cloned()
            .unwrap_or_else(|| panic!("unknown global {global}"));
        self.add_opt(name, description, default);
        self.opts.get_mut(name).unwrap().global = Some(global.to_owned());
    }

    pub fn has(&self, name: &str) -> bool {
        self.opts.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.opts.keys().map(|k| k.as_str())
    }

    pub fn description(&self, name: &str) -> Option<&str> {
        self.opts.get(name).map(|o| o.description.as_str())
    }

    fn opt(&self, name: &str) -> PanResult<&Opt> {
        self.opts
            .get(name)
            .ok_or_else(|| PanError::Validation(format!("unknown option: {name}")))
    }

    /// Current value: the explicit override, else the global, else the
    /// default.
    pub fn get(&self, name: &str) -> PanResult<OptValue> {
        let opt = self.opt(name)?;
        if let Some(value) = &opt.value {
            return Ok(value.clone());
        }
        if let Some(global) = &opt.global {
            if let Some(value) = meta().get(global) {
                return Ok(value.clone());
            }
        }
        Ok(opt.default.clone())
    }

    pub fn set_value(&mut self, name: &str, value: OptValue) -> PanResult<()> {
        let opt = self.opt(name)?;
        validate!(
            std::mem::discriminant(&opt.default)
                == std::mem::discriminant(&value)
                || matches!(
                    (&opt.default, &value),
                    (OptValue::Dec(_), OptValue::Int(_))
                ),
            "option {name} holds {}, got {}",
            opt.default.type_name(),
            value.type_name()
        );
        if let Some(validator) = opt.validator {
            validate!(validator(&value), "bad value for option {name}");
        }
        self.opts.get_mut(name).unwrap().value = Some(value);
        Ok(())
    }

    /// Parse and set from text, typed like the default.
    pub fn set(&mut self, name: &str, raw: &str) -> PanResult<()> {
        let parsed = self.opt(name)?.default.parse_like(raw)?;
        self.set_value(name, parsed)
    }

    pub fn mark_ignored(&mut self, name: &str) -> PanResult<()> {
        self.opt(name)?;
        self.opts.get_mut(name).unwrap().ignored = true;
        Ok(())
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.opts.get(name).map(|o| o.ignored).unwrap_or(false)
    }

    // typed shorthands

    pub fn int(&self, name: &str) -> PanResult<i64> {
        self.get(name)?.as_int()
    }

    pub fn dec(&self, name: &str) -> PanResult<f64> {
        self.get(name)?.as_dec()
    }

    pub fn boolean(&self, name: &str) -> PanResult<bool> {
        self.get(name)?.as_bool()
    }

    pub fn string(&self, name: &str) -> PanResult<String> {
        Ok(self.get(name)?.as_str()?.to_owned())
    }
}

#[cfg(test)]
mod options_tests {
    use super::*;

    fn sample() -> Options {
        let mut opts = Options::default();
        opts.add_opt("min-block", "Minimum block size", OptValue::Int(2));
        opts.add_opt_check(
            "min-identity",
            "Minimum block identity",
            OptValue::Dec(0.9),
            |v| v.as_dec().map(|x| (0.0..=1.0).contains(&x)).unwrap_or(false),
        );
        opts.add_opt("timing", "Log elapsed time", OptValue::Bool(false));
        opts
    }

    #[test]
    fn test_defaults_and_overrides() {
        let mut opts = sample();
        assert_eq!(opts.int("min-block").unwrap(), 2);
        opts.set("min-block", "5").unwrap();
        assert_eq!(opts.int("min-block").unwrap(), 5);
        assert!(opts.set("min-block", "x").is_err());
        assert!(opts.set("no-such", "1").is_err());
    }

    #[test]
    fn test_validator_rejects() {
        let mut opts = sample();
        assert!(opts.set("min-identity", "0.5").is_ok());
        assert!(opts.set("min-identity", "1.5").is_err());
        assert_eq!(opts.dec("min-identity").unwrap(), 0.5);
    }

    #[test]
    fn test_gopt_reads_meta() {
        let mut opts = Options::default();
        opts.add_gopt("min-fragment", "Minimum fragment length", "MIN_LENGTH");
        assert_eq!(opts.int("min-fragment").unwrap(), 100);
        opts.set("min-fragment", "7").unwrap();
        assert_eq!(opts.int("min-fragment").unwrap(), 7);
    }

    #[test]
    fn test_ignored_flag() {
        let mut opts = sample();
        assert!(!opts.is_ignored("timing"));
        opts.mark_ignored("timing").unwrap();
        assert!(opts.is_ignored("timing"));
    }
}
