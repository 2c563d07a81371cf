//! Side-effect run on link state changes

mod command;

pub use command::CommandAction;

use crate::core::state::LinkState;

/// Invoked once per confirmed link transition.
///
/// Implementations must return quickly; the monitor loop calls this inline.
pub trait LinkAction {
    fn notify_link_change(&mut self, state: LinkState);
}

impl<F: FnMut(LinkState)> LinkAction for F {
    fn notify_link_change(&mut self, state: LinkState) {
        self(state)
    }
}
