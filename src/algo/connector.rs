use crate::errs::PanResult;
use crate::proc::{ProcState, Processor, Workspace};

/// Rebuild the neighbour chains of all fragments, per sequence in
/// coordinate order.
pub struct Connector {
    state: ProcState,
}

impl Default for Connector {
    fn default() -> Self {
        Connector::new()
    }
}

impl Connector {
    pub fn new() -> Connector {
        let mut state = ProcState::new();
        state.declare_bs("target", "Blockset to connect");
        Connector { state }
    }
}

impl Processor for Connector {
    fn name(&self) -> &'static str {
        "Connect all fragments in sequences"
    }

    fn state(&self) -> &ProcState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ProcState {
        &mut self.state
    }

    fn run_impl(&mut self, ws: &mut Workspace) -> PanResult<()> {
        let key = self.state.slot_key("target")?;
        ws.get_mut(&key).connect_all();
        Ok(())
    }
}
