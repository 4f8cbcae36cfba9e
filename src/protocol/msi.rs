use std::fmt;

use log::trace;

use crate::bus::BusOps;
use crate::commons::{Addr, BusSignal, CacheId, ProcSignal};
use crate::error::{ProtocolError, Result};
use crate::stats::Stats;

/// MSI block states. `IS` and `IM` are transient: a bus request is out and
/// the controller must not accept another local access until the data reply
/// resolves it.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum MsiState {
    #[default]
    I,
    S,
    M,
    IS,
    IM,
}

impl MsiState {
    pub fn label(&self) -> &'static str {
        match self {
            MsiState::I => "I",
            MsiState::S => "S",
            MsiState::M => "M",
            MsiState::IS => "IS",
            MsiState::IM => "IM",
        }
    }
}

impl fmt::Display for MsiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub struct Msi {
    addr: Addr,
    id: CacheId,
    state: MsiState,
}

impl Msi {
    pub fn new(addr: Addr, id: CacheId) -> Self {
        Msi {
            addr,
            id,
            state: MsiState::I,
        }
    }

    pub fn state(&self) -> MsiState {
        self.state
    }

    fn transition(&mut self, to: MsiState) {
        trace!("MSI cache {} {:?}: {} -> {}", self.id, self.addr, self.state, to);
        self.state = to;
    }

    pub fn handle_local(
        &mut self,
        req: ProcSignal,
        bus: &mut dyn BusOps,
        stats: &mut Stats,
    ) -> Result<()> {
        match self.state {
            MsiState::I => match req {
                ProcSignal::Read(addr) => {
                    bus.send_bus_rd(addr);
                    self.transition(MsiState::IS);
                    stats.record_miss();
                }
                ProcSignal::Write(addr) => {
                    bus.send_bus_rdx(addr);
                    self.transition(MsiState::IM);
                    stats.record_miss();
                }
            },
            MsiState::S => match req {
                ProcSignal::Read(addr) => bus.reply_to_proc(addr),
                // MSI has no exclusive state: every write from S goes to the
                // bus to invalidate the other sharers
                ProcSignal::Write(addr) => {
                    bus.send_bus_rdx(addr);
                    self.transition(MsiState::IM);
                    stats.record_miss();
                }
            },
            MsiState::M => bus.reply_to_proc(req.addr()),
            MsiState::IS | MsiState::IM => {
                return Err(ProtocolError::AccessWhileOutstanding {
                    protocol: "MSI",
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
            // nothing cached: nothing to supply, nothing to protect
            MsiState::I => {}
            MsiState::S => match sig {
                BusSignal::BusRd(_) => {}
                BusSignal::BusRdX(_) => self.transition(MsiState::I),
                BusSignal::BusData(_) => return Err(self.unexpected(requester, sig)),
            },
            MsiState::M => match sig {
                BusSignal::BusRd(addr) => {
                    bus.send_data(addr, requester);
                    self.transition(MsiState::S);
                }
                BusSignal::BusRdX(addr) => {
                    bus.send_data(addr, requester);
                    self.transition(MsiState::I);
                }
                BusSignal::BusData(_) => return Err(self.unexpected(requester, sig)),
            },
            MsiState::IS => match sig {
                // someone else's request; ours is already queued behind it
                BusSignal::BusRd(_) | BusSignal::BusRdX(_) => {}
                BusSignal::BusData(addr) => {
                    if requester == self.id {
                        bus.reply_to_proc(addr);
                        self.transition(MsiState::S);
                    }
                }
            },
            MsiState::IM => match sig {
                BusSignal::BusRd(_) | BusSignal::BusRdX(_) => {}
                BusSignal::BusData(addr) => {
                    if requester == self.id {
                        bus.reply_to_proc(addr);
                        self.transition(MsiState::M);
                    }
                }
            },
        }
        Ok(())
    }

    fn unexpected(&self, requester: CacheId, sig: BusSignal) -> ProtocolError {
        ProtocolError::UnexpectedSnoop {
            protocol: "MSI",
            state: self.state.label(),
            signal: sig,
            requester,
        }
    }
}
