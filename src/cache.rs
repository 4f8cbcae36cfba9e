// One CacheModule per cache in the system. It owns one protocol controller
// per cached block and routes processor accesses and snooped bus messages to
// the controller for the right address.

use std::collections::HashMap;

use log::debug;

use crate::bus::BusOps;
use crate::commons::{Addr, BusSignal, CacheId, ProcSignal, ProtocolKind};
use crate::error::Result;
use crate::protocol::Protocol;
use crate::stats::Stats;

pub struct CacheModule {
    pub id: CacheId,
    kind: ProtocolKind,
    blocks: HashMap<Addr, Protocol>,
}

impl CacheModule {
    pub fn new(id: CacheId, kind: ProtocolKind) -> Self {
        CacheModule {
            id,
            kind,
            blocks: HashMap::new(),
        }
    }

    /// controller for `addr`, allocated Invalid on first touch
    fn block_mut(&mut self, addr: Addr) -> &mut Protocol {
        let (id, kind) = (self.id, self.kind);
        self.blocks
            .entry(addr)
            .or_insert_with(|| Protocol::new(kind, addr, id))
    }

    pub fn handle_local(
        &mut self,
        req: ProcSignal,
        bus: &mut dyn BusOps,
        stats: &mut Stats,
    ) -> Result<()> {
        let id = self.id;
        let block = self.block_mut(req.addr());
        let before = block.state_label();
        block.handle_local(req, bus, stats)?;
        debug!(
            "cache {}: local {:?}, {} -> {}",
            id,
            req,
            before,
            block.state_label()
        );
        Ok(())
    }

    /// A snoop for a block this cache never touched needs no controller: an
    /// uncached block is Invalid, and Invalid reacts to nothing it could
    /// legally observe here.
    pub fn handle_snoop(
        &mut self,
        requester: CacheId,
        sig: BusSignal,
        bus: &mut dyn BusOps,
    ) -> Result<()> {
        if let Some(block) = self.blocks.get_mut(&sig.addr()) {
            let before = block.state_label();
            block.handle_snoop(requester, sig, bus)?;
            debug!(
                "cache {}: snoop {:?} from {}, {} -> {}",
                self.id,
                sig,
                requester,
                before,
                block.state_label()
            );
        }
        Ok(())
    }

    /// state label of the controller for `addr`, if one exists
    pub fn state_label(&self, addr: Addr) -> Option<&'static str> {
        self.blocks.get(&addr).map(|b| b.state_label())
    }

    pub fn dump(&self, addr: Addr) -> Option<String> {
        self.blocks.get(&addr).map(|b| b.dump())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::testing::{Action, RecordingBus};

    #[test]
    fn controllers_are_allocated_invalid_on_first_touch() {
        let mut cache = CacheModule::new(0, ProtocolKind::MESI);
        assert_eq!(cache.state_label(Addr(4)), None);

        let mut bus = RecordingBus::new();
        let mut stats = Stats::new();
        cache
            .handle_local(ProcSignal::Read(Addr(4)), &mut bus, &mut stats)
            .unwrap();
        assert_eq!(cache.state_label(Addr(4)), Some("ISE"));
        assert_eq!(bus.actions, vec![Action::BusRd(Addr(4))]);
    }

    #[test]
    fn snoops_for_untouched_blocks_are_ignored() {
        let mut cache = CacheModule::new(0, ProtocolKind::MSI);
        let mut bus = RecordingBus::new();
        cache
            .handle_snoop(1, BusSignal::BusRdX(Addr(8)), &mut bus)
            .unwrap();
        assert_eq!(cache.state_label(Addr(8)), None);
        assert!(bus.actions.is_empty());
    }

    #[test]
    fn blocks_are_tracked_independently() {
        let mut cache = CacheModule::new(0, ProtocolKind::MOSI);
        let mut bus = RecordingBus::new();
        let mut stats = Stats::new();
        cache
            .handle_local(ProcSignal::Read(Addr(4)), &mut bus, &mut stats)
            .unwrap();
        cache
            .handle_local(ProcSignal::Write(Addr(8)), &mut bus, &mut stats)
            .unwrap();
        assert_eq!(cache.state_label(Addr(4)), Some("IS"));
        assert_eq!(cache.state_label(Addr(8)), Some("IM"));
        assert_eq!(stats.cache_misses, 2);
    }

    #[test]
    fn dump_names_protocol_and_state() {
        let mut cache = CacheModule::new(0, ProtocolKind::MOESI);
        let mut bus = RecordingBus::new();
        let mut stats = Stats::new();
        cache
            .handle_local(ProcSignal::Read(Addr(4)), &mut bus, &mut stats)
            .unwrap();
        assert_eq!(cache.dump(Addr(4)).as_deref(), Some("MOESI - state: ISE"));
    }
}
