use std::time::Instant;

use indexmap::IndexMap;
use log::info;

use crate::block_set::BlockSet;
use crate::errs::{PanError, PanResult};
use crate::proc::options::{OptValue, Options};
use crate::validate;

/// Named block sets shared by the processors of one run.
#[derive(Debug, Default)]
pub struct Workspace {
    sets: IndexMap<String, BlockSet>,
}

impl Workspace {
    pub fn new() -> Workspace {
        Workspace::default()
    }

    pub fn with(key: &str, bs: BlockSet) -> Workspace {
        let mut ws = Workspace::new();
        ws.put(key, bs);
        ws
    }

    pub fn get(&self, key: &str) -> Option<&BlockSet> {
        self.sets.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> &mut BlockSet {
        self.sets.entry(key.to_owned()).or_default()
    }

    /// Move the set out (an empty one is created if the key is new). Put it
    /// back when done.
    pub fn take(&mut self, key: &str) -> BlockSet {
        self.sets.shift_remove(key).unwrap_or_default()
    }

    pub fn put(&mut self, key: &str, bs: BlockSet) {
        self.sets.insert(key.to_owned(), bs);
    }
}

#[derive(Debug, Clone)]
struct Slot {
    key: String,
    description: String,
}

/// Shared state of a processor: its typed options and its named block-set
/// slots. A slot holds a workspace key; by default the key equals the slot
/// name, `point_bs` re-keys it.
#[derive(Debug, Clone)]
pub struct ProcState {
    pub opts: Options,
    slots: IndexMap<String, Slot>,
    timing: bool,
    no_options: bool,
}

impl ProcState {
    pub fn new() -> ProcState {
        let mut opts = Options::default();
        opts.add_opt_check(
            "workers",
            "number of threads (-1 = all cores)",
            OptValue::Int(1),
            |v| v.as_int().map(|x| x == -1 || x > 0).unwrap_or(false),
        );
        opts.add_opt(
            "timing",
            "measure time for each processor",
            OptValue::Bool(false),
        );
        ProcState {
            opts,
            slots: IndexMap::new(),
            timing: false,
            no_options: false,
        }
    }

    pub fn declare_bs(&mut self, name: &str, description: &str) {
        self.slots.insert(
            name.to_owned(),
            Slot { key: name.to_owned(), description: description.to_owned() },
        );
    }

    pub fn slot_key(&self, name: &str) -> PanResult<String> {
        self.slots.get(name).map(|s| s.key.clone()).ok_or_else(|| {
            PanError::Validation(format!("undeclared blockset slot: {name}"))
        })
    }

    pub fn slot_description(&self, name: &str) -> Option<&str> {
        self.slots.get(name).map(|s| s.description.as_str())
    }

    pub fn set_slot_key(&mut self, name: &str, key: &str) -> PanResult<()> {
        match self.slots.get_mut(name) {
            Some(slot) => {
                slot.key = key.to_owned();
                Ok(())
            }
            None => Err(PanError::Validation(format!(
                "undeclared blockset slot: {name}"
            ))),
        }
    }

    pub fn timing(&self) -> bool {
        self.timing || self.opts.boolean("timing").unwrap_or(false)
    }

    pub fn set_timing(&mut self, timing: bool) {
        self.timing = timing;
    }

    pub fn no_options(&self) -> bool {
        self.no_options
    }

    /// Number of worker threads, `-1` meaning all available cores.
    pub fn workers(&self) -> usize {
        match self.opts.int("workers").unwrap_or(1) {
            -1 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n if n > 0 => n as usize,
            _ => 1,
        }
    }
}

impl Default for ProcState {
    fn default() -> Self {
        ProcState::new()
    }
}

/// A named unit of work over block-set slots.
///
/// `run` wraps `run_impl` with option handling and the timing log. Slot
/// resolution happens against the workspace passed to `run`, which makes
/// composition a matter of pointing slots of several processors at the
/// same workspace keys.
pub trait Processor {
    /// Human-readable description of the action.
    fn name(&self) -> &'static str;

    fn state(&self) -> &ProcState;

    fn state_mut(&mut self) -> &mut ProcState;

    fn run_impl(&mut self, ws: &mut Workspace) -> PanResult<()>;

    fn run(&mut self, ws: &mut Workspace) -> PanResult<()> {
        let start = Instant::now();
        let result = self.run_impl(ws);
        if self.state().timing() {
            info!("{}: {:.3}s", self.name(), start.elapsed().as_secs_f64());
        }
        result
    }

    /// Point this processor's slot at another processor's slot:
    /// `"lhs=rhs"` makes slot `lhs` resolve to wherever `source`'s `rhs`
    /// points.
    fn point_bs(&mut self, mapping: &str, source: &ProcState) -> PanResult<()> {
        let (lhs, rhs) = split_mapping(mapping)?;
        let key = source.slot_key(rhs)?;
        self.state_mut().set_slot_key(lhs, &key)
    }

    /// Apply a line of slot mappings and option overrides, e.g.
    /// `"target=other --min-block:=5 --timing"`. Slot mappings resolve
    /// against `source` when given, else map to raw workspace keys. A
    /// `:=` marks the option as ignored (suppressed from further
    /// propagation). `$NAME` values are looked up in `env`.
    fn configure(
        &mut self,
        line: &str,
        source: Option<&ProcState>,
        env: Option<&Options>,
    ) -> PanResult<()> {
        for token in line.split_whitespace() {
            if token == "--timing" {
                self.state_mut().set_timing(true);
            } else if token == "no_options" {
                self.state_mut().no_options = true;
            } else if let Some(raw) = token.strip_prefix("--") {
                let (name, value) = raw.split_once('=').ok_or_else(|| {
                    PanError::Validation(format!("bad option token: {token}"))
                })?;
                let (name, ignored) = match name.strip_suffix(':') {
                    Some(name) => (name, true),
                    None => (name, false),
                };
                // a no_options processor only accepts its bookkeeping
                // options
                if self.state().no_options()
                    && name != "timing"
                    && name != "workers"
                {
                    continue;
                }
                let value = resolve_env(value, env)?;
                self.state_mut().opts.set(name, &value)?;
                if ignored {
                    self.state_mut().opts.mark_ignored(name)?;
                }
            } else if token.contains('=') {
                let (lhs, rhs) = split_mapping(token)?;
                match source {
                    Some(state) => {
                        let key = state.slot_key(rhs)?;
                        self.state_mut().set_slot_key(lhs, &key)?;
                    }
                    None => {
                        self.state_mut().set_slot_key(lhs, rhs)?;
                    }
                }
            } else {
                return Err(PanError::Validation(format!(
                    "bad token: {token}"
                )));
            }
        }
        Ok(())
    }

    fn set_options(&mut self, line: &str) -> PanResult<()> {
        self.configure(line, None, None)
    }
}

fn split_mapping(mapping: &str) -> PanResult<(&str, &str)> {
    let (lhs, rhs) = mapping.split_once('=').ok_or_else(|| {
        PanError::Validation(format!("bad blockset mapping: {mapping}"))
    })?;
    validate!(
        !lhs.is_empty() && !rhs.is_empty(),
        "bad blockset mapping: {mapping}"
    );
    Ok((lhs, rhs))
}

fn resolve_env(value: &str, env: Option<&Options>) -> PanResult<String> {
    match value.strip_prefix('$') {
        None => Ok(value.to_owned()),
        Some(name) => {
            if let Some(env) = env {
                if env.has(name) {
                    return Ok(match env.get(name)? {
                        OptValue::Bool(x) => x.to_string(),
                        OptValue::Int(x) => x.to_string(),
                        OptValue::Dec(x) => x.to_string(),
                        OptValue::Str(x) => x,
                        OptValue::List(x) => x.join(","),
                    });
                }
            }
            match crate::proc::meta::meta().get(name) {
                Some(OptValue::Bool(x)) => Ok(x.to_string()),
                Some(OptValue::Int(x)) => Ok(x.to_string()),
                Some(OptValue::Dec(x)) => Ok(x.to_string()),
                Some(OptValue::Str(x)) => Ok(x.clone()),
                Some(OptValue::List(x)) => Ok(x.join(",")),
                None => Err(PanError::Validation(format!(
                    "unknown variable: ${name}"
                ))),
            }
        }
    }
}

#[cfg(test)]
mod processor_tests {
    use super::*;

    struct Probe {
        state: ProcState,
        runs: usize,
    }

    impl Probe {
        fn new() -> Probe {
            let mut state = ProcState::new();
            state.opts.add_opt(
                "min-block",
                "Minimum block size",
                OptValue::Int(2),
            );
            state.declare_bs("target", "Target blockset");
            state.declare_bs("other", "Source blockset");
            Probe { state, runs: 0 }
        }
    }

    impl Processor for Probe {
        fn name(&self) -> &'static str {
            "Probe"
        }

        fn state(&self) -> &ProcState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut ProcState {
            &mut self.state
        }

        fn run_impl(&mut self, _ws: &mut Workspace) -> PanResult<()> {
            self.runs += 1;
            Ok(())
        }
    }

    #[test]
    fn test_configure_options_and_slots() {
        let mut p = Probe::new();
        p.set_options("target=other --min-block:=5 --timing").unwrap();
        assert_eq!(p.state().slot_key("target").unwrap(), "other");
        assert_eq!(p.state().opts.int("min-block").unwrap(), 5);
        assert!(p.state().opts.is_ignored("min-block"));
        assert!(p.state().timing());
        assert!(p.set_options("--no-such=1").is_err());
        assert!(p.set_options("loose-token").is_err());
    }

    #[test]
    fn test_point_bs_follows_source() {
        let mut source = Probe::new();
        source.set_options("other=renamed").unwrap();
        let mut p = Probe::new();
        p.point_bs("target=other", &source.state).unwrap();
        assert_eq!(p.state().slot_key("target").unwrap(), "renamed");
    }

    #[test]
    fn test_env_substitution() {
        let mut env = Options::default();
        env.add_opt("LIMIT", "", OptValue::Int(7));
        let mut p = Probe::new();
        p.configure("--min-block=$LIMIT", None, Some(&env)).unwrap();
        assert_eq!(p.state().opts.int("min-block").unwrap(), 7);
        // unknown variables fall back to the process-wide globals
        p.configure("--min-block=$MIN_LENGTH", None, None).unwrap();
        assert_eq!(p.state().opts.int("min-block").unwrap(), 100);
        assert!(p.configure("--min-block=$NOPE", None, None).is_err());
    }

    #[test]
    fn test_no_options_suppresses_overrides() {
        let mut p = Probe::new();
        p.set_options("no_options").unwrap();
        p.set_options("--min-block=5 --workers=2").unwrap();
        assert_eq!(p.state().opts.int("min-block").unwrap(), 2);
        assert_eq!(p.state().opts.int("workers").unwrap(), 2);
    }

    #[test]
    fn test_workspace_take_put() {
        let mut ws = Workspace::new();
        let bs = BlockSet::new();
        ws.put("target", bs);
        let taken = ws.take("target");
        assert!(ws.get("target").is_none());
        ws.put("target", taken);
        assert!(ws.get("target").is_some());
    }

    #[test]
    fn test_run_counts() {
        let mut p = Probe::new();
        let mut ws = Workspace::new();
        p.run(&mut ws).unwrap();
        assert_eq!(p.runs, 1);
    }
}
