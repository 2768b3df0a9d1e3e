//! The `CALL_FUNC` host callback surface (component D's dispatch table),
//! wired here rather than in `gamos-core` since the concrete handlers it
//! names — module reload, shutdown — belong to the driver, not the VM
//! itself.
//!
//! Grounded on §4.D "`CALL_FUNC id` transfers to a host-callback dispatch
//! table" and §8 end-to-end scenario 6: a script calling `CALL_FUNC 14`
//! sets `needReload` with the module id it pushed as an argument, which
//! unwinds every in-flight rule walk via the VM's own `interrupt` check.
//! Every other id has no concrete in-scope behavior (subtitle spawn, sound,
//! cursor reset sit behind externals §1 places out of scope) and falls
//! through to §7's documented Runtime behavior: "returns 0 and logs once".

use std::collections::HashSet;

use gamos_core::vm::memory::Memory;
use gamos_core::vm::{RefTag, TaggedValue, VmHost, VmThread};

/// `CALL_FUNC 14`: switch to the module id pushed as the callback's sole argument.
pub const CALL_FUNC_RELOAD_MODULE: u32 = 14;

/// What the host observed since the last time the driver drained it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostSignal {
    #[default]
    None,
    ReloadModule(u32),
    Quit,
}

/// The concrete [`VmHost`] the fixed-tick driver runs every script through.
pub struct EngineHost {
    memory: Memory,
    signal: HostSignal,
    warned_ids: HashSet<u32>,
}

impl Default for EngineHost {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineHost {
    pub fn new() -> Self {
        Self {
            memory: Memory::new(),
            signal: HostSignal::None,
            warned_ids: HashSet::new(),
        }
    }

    /// Drains and resets the latched signal; called by the driver after
    /// every tick, never mid-tick (the VM's own `interrupt` cell is what
    /// actually aborts in-flight execution).
    pub fn take_signal(&mut self) -> HostSignal {
        std::mem::take(&mut self.signal)
    }

    /// Requests a clean shutdown, the CLI/signal-handling equivalent of a
    /// bytecode-originated quit (there is no documented `CALL_FUNC` id for
    /// this; the reference's own quit path is the window-close message,
    /// not a script call).
    pub fn request_quit(&mut self) {
        self.signal = HostSignal::Quit;
    }
}

impl VmHost for EngineHost {
    fn memory(&mut self) -> &mut Memory {
        &mut self.memory
    }

    fn call_func(&mut self, vm: &mut VmThread, func_id: u32) {
        match func_id {
            CALL_FUNC_RELOAD_MODULE => {
                let module_id = vm.call_arg(0);
                log::debug!("host: CALL_FUNC {CALL_FUNC_RELOAD_MODULE} requests reload to module {module_id}");
                self.signal = HostSignal::ReloadModule(module_id);
            }
            _ => {
                if self.warned_ids.insert(func_id) {
                    log::warn!("host: CALL_FUNC {func_id} has no registered handler, returning 0");
                }
                vm.eax = TaggedValue::default();
            }
        }
    }

    /// A reload or quit signal must abort every running VM instance
    /// immediately, not just at the end of the current tick — §5's
    /// "every live VM instance sets `interrupt`" re-entry contract.
    fn wants_interrupt(&self) -> bool {
        !matches!(self.signal, HostSignal::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_call_func_latches_signal_and_requests_interrupt() {
        let mut host = EngineHost::new();
        let mut vm = VmThread::new();
        host.call_func(&mut vm, CALL_FUNC_RELOAD_MODULE);
        assert!(host.wants_interrupt());
        assert_eq!(host.take_signal(), HostSignal::ReloadModule(0));
        assert_eq!(host.take_signal(), HostSignal::None);
    }

    #[test]
    fn unregistered_call_func_warns_once_and_zeros_eax() {
        let mut host = EngineHost::new();
        let mut vm = VmThread::new();
        vm.eax = TaggedValue {
            value: 5,
            tag: RefTag::Untagged,
        };
        host.call_func(&mut vm, 999);
        assert_eq!(vm.eax.value, 0);
        assert!(!host.wants_interrupt());
    }
}
