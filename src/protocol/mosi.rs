use std::fmt;

use log::trace;

use crate::bus::BusOps;
use crate::commons::{Addr, BusSignal, CacheId, ProcSignal};
use crate::error::{ProtocolError, Result};
use crate::stats::Stats;

/// MOSI block states. `O` holds data that is dirty but shared: the owner
/// keeps servicing read-share requests from the bus instead of writing back
/// to memory. `OM` is the owner's upgrade transient.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum MosiState {
    #[default]
    I,
    S,
    O,
    M,
    IS,
    IM,
    OM,
}

impl MosiState {
    pub fn label(&self) -> &'static str {
        match self {
            MosiState::I => "I",
            MosiState::S => "S",
            MosiState::O => "O",
            MosiState::M => "M",
            MosiState::IS => "IS",
            MosiState::IM => "IM",
            MosiState::OM => "OM",
        }
    }
}

impl fmt::Display for MosiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub struct Mosi {
    addr: Addr,
    id: CacheId,
    state: MosiState,
}

impl Mosi {
    pub fn new(addr: Addr, id: CacheId) -> Self {
        Mosi {
            addr,
            id,
            state: MosiState::I,
        }
    }

    pub fn state(&self) -> MosiState {
        self.state
    }

    fn transition(&mut self, to: MosiState) {
        trace!("MOSI cache {} {:?}: {} -> {}", self.id, self.addr, self.state, to);
        self.state = to;
    }

    pub fn handle_local(
        &mut self,
        req: ProcSignal,
        bus: &mut dyn BusOps,
        stats: &mut Stats,
    ) -> Result<()> {
        match self.state {
            MosiState::I => match req {
                ProcSignal::Read(addr) => {
                    bus.send_bus_rd(addr);
                    self.transition(MosiState::IS);
                    stats.record_miss();
                }
                ProcSignal::Write(addr) => {
                    bus.send_bus_rdx(addr);
                    self.transition(MosiState::IM);
                    stats.record_miss();
                }
            },
            MosiState::S => match req {
                ProcSignal::Read(addr) => bus.reply_to_proc(addr),
                ProcSignal::Write(addr) => {
                    bus.send_bus_rdx(addr);
                    self.transition(MosiState::IM);
                    stats.record_miss();
                }
            },
            MosiState::O => match req {
                // the owner's data is current, reads keep hitting
                ProcSignal::Read(addr) => bus.reply_to_proc(addr),
                ProcSignal::Write(addr) => {
                    bus.send_bus_rdx(addr);
                    self.transition(MosiState::OM);
                    stats.record_miss();
                }
            },
            MosiState::M => bus.reply_to_proc(req.addr()),
            MosiState::IS | MosiState::IM | MosiState::OM => {
                return Err(ProtocolError::AccessWhileOutstanding {
                    protocol: "MOSI",
                    state: self.state.label(),
                    access: req,
                })
            }
        }
        Ok(())
    }

    pub fn handle_snoop(
        &mut self,
        requester: CacheId,
        sig: BusSignal,
        bus: &mut dyn BusOps,
    ) -> Result<()> {
        match self.state {
            MosiState::I => {}
            MosiState::S => match sig {
                // an O or M copy is authoritative on this bus, S never supplies
                BusSignal::BusRd(_) => {}
                BusSignal::BusRdX(_) => self.transition(MosiState::I),
                BusSignal::BusData(_) => return Err(self.unexpected(requester, sig)),
            },
            MosiState::O => match sig {
                BusSignal::BusRd(addr) => bus.send_data(addr, requester),
                BusSignal::BusRdX(addr) => {
                    bus.send_data(addr, requester);
                    self.transition(MosiState::I);
                }
                BusSignal::BusData(_) => return Err(self.unexpected(requester, sig)),
            },
            MosiState::M => match sig {
                BusSignal::BusRd(addr) => {
                    // hand off sharing without a memory write-back
                    bus.send_data(addr, requester);
                    self.transition(MosiState::O);
                }
                BusSignal::BusRdX(addr) => {
                    bus.send_data(addr, requester);
                    self.transition(MosiState::I);
                }
                BusSignal::BusData(_) => return Err(self.unexpected(requester, sig)),
            },
            MosiState::IS => match sig {
                BusSignal::BusRd(_) | BusSignal::BusRdX(_) => {}
                BusSignal::BusData(addr) => {
                    if requester == self.id {
                        bus.reply_to_proc(addr);
                        self.transition(MosiState::S);
                    }
                }
            },
            MosiState::IM => match sig {
                BusSignal::BusRd(_) | BusSignal::BusRdX(_) => {}
                BusSignal::BusData(addr) => {
                    if requester == self.id {
                        bus.reply_to_proc(addr);
                        self.transition(MosiState::M);
                    }
                }
            },
            MosiState::OM => match sig {
                // still the owner while the upgrade is in flight
                BusSignal::BusRd(addr) => bus.send_data(addr, requester),
                BusSignal::BusRdX(addr) => {
                    bus.send_data(addr, requester);
                    self.transition(MosiState::IM);
                }
                BusSignal::BusData(addr) => {
                    if requester == self.id {
                        bus.reply_to_proc(addr);
                        self.transition(MosiState::M);
                    }
                }
            },
        }
        Ok(())
    }

    fn unexpected(&self, requester: CacheId, sig: BusSignal) -> ProtocolError {
        ProtocolError::UnexpectedSnoop {
            protocol: "MOSI",
            state: self.state.label(),
            signal: sig,
            requester,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::testing::{Action, RecordingBus};

    const A: Addr = Addr(0xc0);

    fn in_state(state: MosiState) -> Mosi {
        let mut p = Mosi::new(A, 0);
        p.state = state;
        p
    }

    #[test]
    fn owner_serves_local_reads_without_bus_traffic() {
        let mut p = in_state(MosiState::O);
        let mut bus = RecordingBus::new();
        let mut stats = Stats::new();
        p.handle_local(ProcSignal::Read(A), &mut bus, &mut stats).unwrap();
        assert_eq!(p.state(), MosiState::O);
        assert_eq!(bus.actions, vec![Action::ToProc(A)]);
        assert_eq!(stats.cache_misses, 0);
    }

    #[test]
    fn owner_write_upgrades_through_the_bus() {
        let mut p = in_state(MosiState::O);
        let mut bus = RecordingBus::new();
        let mut stats = Stats::new();
        p.handle_local(ProcSignal::Write(A), &mut bus, &mut stats).unwrap();
        assert_eq!(p.state(), MosiState::OM);
        assert_eq!(bus.actions, vec![Action::BusRdX(A)]);
        assert_eq!(stats.cache_misses, 1);
    }

    #[test]
    fn modified_becomes_owner_on_snooped_read() {
        let mut p = in_state(MosiState::M);
        let mut bus = RecordingBus::new();
        p.handle_snoop(1, BusSignal::BusRd(A), &mut bus).unwrap();
        assert_eq!(p.state(), MosiState::O);
        assert_eq!(bus.actions, vec![Action::Data(A, 1)]);
    }

    #[test]
    fn owner_keeps_supplying_readers_without_demotion() {
        let mut p = in_state(MosiState::O);
        let mut bus = RecordingBus::new();
        p.handle_snoop(1, BusSignal::BusRd(A), &mut bus).unwrap();
        p.handle_snoop(2, BusSignal::BusRd(A), &mut bus).unwrap();
        assert_eq!(p.state(), MosiState::O);
        assert_eq!(bus.actions, vec![Action::Data(A, 1), Action::Data(A, 2)]);
    }

    #[test]
    fn owner_supplies_and_invalidates_on_snooped_write() {
        let mut p = in_state(MosiState::O);
        let mut bus = RecordingBus::new();
        p.handle_snoop(1, BusSignal::BusRdX(A), &mut bus).unwrap();
        assert_eq!(p.state(), MosiState::I);
        assert_eq!(bus.actions, vec![Action::Data(A, 1)]);
    }

    #[test]
    fn upgrading_owner_still_supplies_then_loses_ownership() {
        let mut p = in_state(MosiState::OM);
        let mut bus = RecordingBus::new();

        // a read-share passes by: supply, stay in OM
        p.handle_snoop(1, BusSignal::BusRd(A), &mut bus).unwrap();
        assert_eq!(p.state(), MosiState::OM);

        // a competing writer takes the block: supply and fall back to IM
        p.handle_snoop(2, BusSignal::BusRdX(A), &mut bus).unwrap();
        assert_eq!(p.state(), MosiState::IM);
        assert_eq!(bus.actions, vec![Action::Data(A, 1), Action::Data(A, 2)]);

        // our own data still arrives and completes the write
        p.handle_snoop(0, BusSignal::BusData(A), &mut bus).unwrap();
        assert_eq!(p.state(), MosiState::M);
    }

    #[test]
    fn read_miss_resolves_to_shared() {
        let mut p = in_state(MosiState::IS);
        let mut bus = RecordingBus::new();
        p.handle_snoop(0, BusSignal::BusData(A), &mut bus).unwrap();
        assert_eq!(p.state(), MosiState::S);
        assert_eq!(bus.actions, vec![Action::ToProc(A)]);
    }

    #[test]
    fn local_access_while_upgrading_is_a_violation() {
        let mut p = in_state(MosiState::OM);
        let mut bus = RecordingBus::new();
        let mut stats = Stats::new();
        let err = p
            .handle_local(ProcSignal::Read(A), &mut bus, &mut stats)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::AccessWhileOutstanding { .. }));
    }
}
