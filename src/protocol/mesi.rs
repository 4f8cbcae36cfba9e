use std::fmt;

use log::trace;

use crate::bus::BusOps;
use crate::commons::{Addr, BusSignal, CacheId, ProcSignal};
use crate::error::{ProtocolError, Result};
use crate::stats::Stats;

/// MESI block states. `ISE` is the read-miss transient: it resolves to E or
/// S depending on whether the shared line was raised while the request was
/// on the bus. `SM` is the upgrade transient out of S; a competing
/// read-exclusive can demote it back to a plain write miss.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum MesiState {
    #[default]
    I,
    S,
    E,
    M,
    ISE,
    IM,
    SM,
}

impl MesiState {
    pub fn label(&self) -> &'static str {
        match self {
            MesiState::I => "I",
            MesiState::S => "S",
            MesiState::E => "E",
            MesiState::M => "M",
            MesiState::ISE => "ISE",
            MesiState::IM => "IM",
            MesiState::SM => "SM",
        }
    }
}

impl fmt::Display for MesiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub struct Mesi {
    addr: Addr,
    id: CacheId,
    state: MesiState,
}

impl Mesi {
    pub fn new(addr: Addr, id: CacheId) -> Self {
        Mesi {
            addr,
            id,
            state: MesiState::I,
        }
    }

    pub fn state(&self) -> MesiState {
        self.state
    }

    fn transition(&mut self, to: MesiState) {
        trace!("MESI cache {} {:?}: {} -> {}", self.id, self.addr, self.state, to);
        self.state = to;
    }

    pub fn handle_local(
        &mut self,
        req: ProcSignal,
        bus: &mut dyn BusOps,
        stats: &mut Stats,
    ) -> Result<()> {
        match self.state {
            MesiState::I => match req {
                ProcSignal::Read(addr) => {
                    bus.send_bus_rd(addr);
                    self.transition(MesiState::ISE);
                    stats.record_miss();
                }
                ProcSignal::Write(addr) => {
                    bus.send_bus_rdx(addr);
                    self.transition(MesiState::IM);
                    stats.record_miss();
                }
            },
            MesiState::S => match req {
                ProcSignal::Read(addr) => {
                    // a readable copy exists here; any concurrent read-share
                    // on the bus must see the line as shared
                    bus.set_shared_line();
                    bus.reply_to_proc(addr);
                }
                ProcSignal::Write(addr) => {
                    bus.send_bus_rdx(addr);
                    self.transition(MesiState::SM);
                    stats.record_miss();
                }
            },
            MesiState::E => match req {
                ProcSignal::Read(addr) => bus.reply_to_proc(addr),
                ProcSignal::Write(addr) => {
                    // sole copy: promote without telling anyone
                    bus.reply_to_proc(addr);
                    self.transition(MesiState::M);
                    stats.record_silent_upgrade();
                }
            },
            MesiState::M => bus.reply_to_proc(req.addr()),
            MesiState::ISE | MesiState::IM | MesiState::SM => {
                return Err(ProtocolError::AccessWhileOutstanding {
                    protocol: "MESI",
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
            MesiState::I => {}
            MesiState::S => match sig {
                BusSignal::BusRd(_) => bus.set_shared_line(),
                BusSignal::BusRdX(_) => self.transition(MesiState::I),
                BusSignal::BusData(_) => return Err(self.unexpected(requester, sig)),
            },
            MesiState::E => match sig {
                BusSignal::BusRd(addr) => {
                    bus.send_data(addr, requester);
                    bus.set_shared_line();
                    self.transition(MesiState::S);
                }
                BusSignal::BusRdX(addr) => {
                    bus.send_data(addr, requester);
                    self.transition(MesiState::I);
                }
                BusSignal::BusData(_) => return Err(self.unexpected(requester, sig)),
            },
            MesiState::M => match sig {
                BusSignal::BusRd(addr) => {
                    bus.send_data(addr, requester);
                    bus.set_shared_line();
                    self.transition(MesiState::S);
                }
                BusSignal::BusRdX(addr) => {
                    bus.send_data(addr, requester);
                    self.transition(MesiState::I);
                }
                BusSignal::BusData(_) => return Err(self.unexpected(requester, sig)),
            },
            MesiState::ISE => match sig {
                BusSignal::BusRd(_) | BusSignal::BusRdX(_) => {}
                BusSignal::BusData(addr) => {
                    if requester == self.id {
                        bus.reply_to_proc(addr);
                        // nobody raised the line: we hold the only copy
                        if bus.shared_line() {
                            self.transition(MesiState::S);
                        } else {
                            self.transition(MesiState::E);
                        }
                    }
                }
            },
            MesiState::IM => match sig {
                BusSignal::BusRd(_) | BusSignal::BusRdX(_) => {}
                BusSignal::BusData(addr) => {
                    if requester == self.id {
                        bus.reply_to_proc(addr);
                        self.transition(MesiState::M);
                    }
                }
            },
            MesiState::SM => match sig {
                BusSignal::BusRd(_) => bus.set_shared_line(),
                // another writer beat us; our copy is stale, fall back to a
                // plain write miss waiting for data
                BusSignal::BusRdX(_) => self.transition(MesiState::IM),
                BusSignal::BusData(addr) => {
                    if requester == self.id {
                        bus.reply_to_proc(addr);
                        self.transition(MesiState::M);
                    }
                }
            },
        }
        Ok(())
    }

    fn unexpected(&self, requester: CacheId, sig: BusSignal) -> ProtocolError {
        ProtocolError::UnexpectedSnoop {
            protocol: "MESI",
            state: self.state.label(),
            signal: sig,
            requester,
        }
    }
}
