mod mesi;
mod moesi;
mod mosi;
mod msi;

pub use mesi::{Mesi, MesiState};
pub use moesi::{Moesi, MoesiState};
pub use mosi::{Mosi, MosiState};
pub use msi::{Msi, MsiState};

use crate::bus::BusOps;
use crate::commons::{Addr, BusSignal, CacheId, ProcSignal, ProtocolKind};
use crate::error::Result;
use crate::stats::Stats;

/// One coherence controller for one (cache, block) pair.
///
/// A closed union over the protocol family: every entry point is one
/// exhaustive match, so an unhandled (state, message) pair is a compile
/// error rather than a runtime surprise. All four variants share the same
/// calling convention; they differ only in their state sets and
/// transition tables.
pub enum Protocol {
    Msi(Msi),
    Mesi(Mesi),
    Mosi(Mosi),
    Moesi(Moesi),
}

impl Protocol {
    /// a fresh controller starts with nothing cached
    pub fn new(kind: ProtocolKind, addr: Addr, id: CacheId) -> Self {
        match kind {
            ProtocolKind::MSI => Protocol::Msi(Msi::new(addr, id)),
            ProtocolKind::MESI => Protocol::Mesi(Mesi::new(addr, id)),
            ProtocolKind::MOSI => Protocol::Mosi(Mosi::new(addr, id)),
            ProtocolKind::MOESI => Protocol::Moesi(Moesi::new(addr, id)),
        }
    }

    pub fn kind(&self) -> ProtocolKind {
        match self {
            Protocol::Msi(_) => ProtocolKind::MSI,
            Protocol::Mesi(_) => ProtocolKind::MESI,
            Protocol::Mosi(_) => ProtocolKind::MOSI,
            Protocol::Moesi(_) => ProtocolKind::MOESI,
        }
    }

    /// local processor access for this controller's block
    pub fn handle_local(
        &mut self,
        req: ProcSignal,
        bus: &mut dyn BusOps,
        stats: &mut Stats,
    ) -> Result<()> {
        match self {
            Protocol::Msi(p) => p.handle_local(req, bus, stats),
            Protocol::Mesi(p) => p.handle_local(req, bus, stats),
            Protocol::Mosi(p) => p.handle_local(req, bus, stats),
            Protocol::Moesi(p) => p.handle_local(req, bus, stats),
        }
    }

    /// bus message observed for this controller's block; `requester` is the
    /// cache the transaction belongs to
    pub fn handle_snoop(
        &mut self,
        requester: CacheId,
        sig: BusSignal,
        bus: &mut dyn BusOps,
    ) -> Result<()> {
        match self {
            Protocol::Msi(p) => p.handle_snoop(requester, sig, bus),
            Protocol::Mesi(p) => p.handle_snoop(requester, sig, bus),
            Protocol::Mosi(p) => p.handle_snoop(requester, sig, bus),
            Protocol::Moesi(p) => p.handle_snoop(requester, sig, bus),
        }
    }

    /// read-only state label, for inspection and logging only
    pub fn state_label(&self) -> &'static str {
        match self {
            Protocol::Msi(p) => p.state().label(),
            Protocol::Mesi(p) => p.state().label(),
            Protocol::Mosi(p) => p.state().label(),
            Protocol::Moesi(p) => p.state().label(),
        }
    }

    pub fn dump(&self) -> String {
        format!("{} - state: {}", self.kind().name(), self.state_label())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::bus::BusOps;
    use crate::commons::{Addr, CacheId};

    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub enum Action {
        BusRd(Addr),
        BusRdX(Addr),
        ToProc(Addr),
        Data(Addr, CacheId),
    }

    /// bus double for driving a single controller in isolation
    #[derive(Default)]
    pub struct RecordingBus {
        pub actions: Vec<Action>,
        pub shared: bool,
    }

    impl RecordingBus {
        pub fn new() -> Self {
            RecordingBus::default()
        }
        pub fn with_shared_line() -> Self {
            RecordingBus {
                shared: true,
                ..RecordingBus::default()
            }
        }
    }

    impl BusOps for RecordingBus {
        fn send_bus_rd(&mut self, addr: Addr) {
            self.actions.push(Action::BusRd(addr));
        }
        fn send_bus_rdx(&mut self, addr: Addr) {
            self.actions.push(Action::BusRdX(addr));
        }
        fn reply_to_proc(&mut self, addr: Addr) {
            self.actions.push(Action::ToProc(addr));
        }
        fn send_data(&mut self, addr: Addr, dest: CacheId) {
            self.actions.push(Action::Data(addr, dest));
        }
        fn set_shared_line(&mut self) {
            self.shared = true;
        }
        fn shared_line(&self) -> bool {
            self.shared
        }
    }
}
