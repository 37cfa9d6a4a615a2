use log::debug;

use crate::errs::PanResult;
use crate::proc::processor::{ProcState, Processor, Workspace};

/// Ordered composition of processors.
///
/// Each child is stored with its option line. At run time the child's
/// `target`/`other` slots are pointed at the pipe's slots, the option line
/// is applied with `$VAR` bindings resolved from the pipe's own options,
/// and the child is run; the first failing child aborts the pipe.
pub struct Pipe {
    name: &'static str,
    state: ProcState,
    children: Vec<(Box<dyn Processor>, String)>,
}

impl Pipe {
    pub fn new(name: &'static str) -> Pipe {
        let mut state = ProcState::new();
        state.declare_bs("target", "Target blockset");
        state.declare_bs("other", "Other blockset");
        Pipe { name, state, children: Vec::new() }
    }

    pub fn add(
        &mut self,
        child: Box<dyn Processor>,
        options: &str,
    ) -> &mut Pipe {
        self.children.push((child, options.to_owned()));
        self
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl Processor for Pipe {
    fn name(&self) -> &'static str {
        self.name
    }

    fn state(&self) -> &ProcState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ProcState {
        &mut self.state
    }

    fn run_impl(&mut self, ws: &mut Workspace) -> PanResult<()> {
        let pipe_state = self.state.clone();
        for (child, options) in &mut self.children {
            for slot in ["target", "other"] {
                if child.state().slot_key(slot).is_ok()
                    && pipe_state.slot_key(slot).is_ok()
                {
                    child.point_bs(
                        &format!("{slot}={slot}"),
                        &pipe_state,
                    )?;
                }
            }
            child.configure(
                options,
                Some(&pipe_state),
                Some(&pipe_state.opts),
            )?;
            debug!("{}: running {}", self.name, child.name());
            child.run(ws)?;
        }
        Ok(())
    }
}
