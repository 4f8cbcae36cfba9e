use log::debug;

use crate::bus::{BusTxn, BusTxnKind, SystemBus};
use crate::cache::CacheModule;
use crate::commons::{Addr, BusSignal, CacheId, ProcSignal, SystemSpec};
use crate::error::Result;
use crate::stats::Stats;

/// All caches of one simulated machine on one snooping bus.
///
/// Bus transactions are served strictly one after another: `step` pops one
/// queued request, broadcasts it to every cache except the requester in
/// ascending id order, then routes the data reply back to the requester.
/// Every controller therefore observes the same total order of messages per
/// address, which is the ordering guarantee the protocol tables assume.
pub struct System {
    spec: SystemSpec,
    caches: Vec<CacheModule>,
    bus: SystemBus,
    stats: Stats,
}

impl System {
    pub fn new(spec: SystemSpec) -> Self {
        let caches = (0..spec.num_caches)
            .map(|id| CacheModule::new(id, spec.protocol))
            .collect();
        System {
            spec,
            caches,
            bus: SystemBus::new(),
            stats: Stats::new(),
        }
    }

    pub fn spec(&self) -> &SystemSpec {
        &self.spec
    }

    pub fn bus(&self) -> &SystemBus {
        &self.bus
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// deliver one processor access to its cache; any bus request the
    /// controller emits is queued for `step`
    pub fn local_access(&mut self, cache: CacheId, req: ProcSignal) -> Result<()> {
        self.caches[cache as usize].handle_local(req, &mut self.bus, &mut self.stats)?;
        if self.bus.commit_staged(cache) {
            debug!("bus: request from cache {} queued for {:?}", cache, req.addr());
        }
        Ok(())
    }

    /// serve one queued bus transaction; false when the bus is idle
    pub fn step(&mut self) -> Result<bool> {
        let Some(txn) = self.bus.begin_txn() else {
            return Ok(false);
        };
        let BusTxn { kind, addr, src } = txn;
        let sig = match kind {
            BusTxnKind::BusRd => BusSignal::BusRd(addr),
            BusTxnKind::BusRdX => BusSignal::BusRdX(addr),
        };
        debug!("bus: broadcasting {:?} from cache {}", sig, src);
        for i in 0..self.caches.len() {
            if i as CacheId != src {
                self.caches[i].handle_snoop(src, sig, &mut self.bus)?;
            }
        }
        match self.bus.data_supplied() {
            Some(dest) => debug!("bus: data for cache {} supplied cache-to-cache", dest),
            None => debug!("bus: data for cache {} fetched from memory", src),
        }
        self.bus.record_data_transfer();
        self.caches[src as usize].handle_snoop(src, BusSignal::BusData(addr), &mut self.bus)?;
        Ok(true)
    }

    /// drain the bus queue
    pub fn run(&mut self) -> Result<()> {
        while self.step()? {}
        Ok(())
    }

    /// one access, run to quiescence
    pub fn access(&mut self, cache: CacheId, req: ProcSignal) -> Result<()> {
        self.local_access(cache, req)?;
        self.run()
    }

    pub fn state_label(&self, cache: CacheId, addr: Addr) -> Option<&'static str> {
        self.caches[cache as usize].state_label(addr)
    }

    pub fn dump(&self, cache: CacheId, addr: Addr) -> Option<String> {
        self.caches[cache as usize].dump(addr)
    }

    /// Cross-cache coherence check for one block, meaningful when the bus is
    /// idle: at most one cache in M or E, and an M/E/O holder excludes every
    /// other M or E.
    pub fn coherent(&self, addr: Addr) -> bool {
        let labels = self
            .caches
            .iter()
            .filter_map(|c| c.state_label(addr));
        let (mut writers, mut owners) = (0, 0);
        for label in labels {
            match label {
                "M" | "E" => writers += 1,
                "O" => owners += 1,
                _ => {}
            }
        }
        writers <= 1 && !(writers >= 1 && owners >= 1)
    }
}
