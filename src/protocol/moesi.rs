use std::fmt;

use log::trace;

use crate::bus::BusOps;
use crate::commons::{Addr, BusSignal, CacheId, ProcSignal};
use crate::error::{ProtocolError, Result};
use crate::stats::Stats;

/// MOESI block states: the owned state of MOSI plus the exclusive state and
/// shared-line discovery of MESI. A snooped read-share demotes M to O, not
/// S, so the dirty data keeps an owner instead of forcing a write-back.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum MoesiState {
    #[default]
    I,
    S,
    E,
    O,
    M,
    ISE,
    IM,
    SM,
    OM,
}

impl MoesiState {
    pub fn label(&self) -> &'static str {
        match self {
            MoesiState::I => "I",
            MoesiState::S => "S",
            MoesiState::E => "E",
            MoesiState::O => "O",
            MoesiState::M => "M",
            MoesiState::ISE => "ISE",
            MoesiState::IM => "IM",
            MoesiState::SM => "SM",
            MoesiState::OM => "OM",
        }
    }
}

impl fmt::Display for MoesiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub struct Moesi {
    addr: Addr,
    id: CacheId,
    state: MoesiState,
}

impl Moesi {
    pub fn new(addr: Addr, id: CacheId) -> Self {
        Moesi {
            addr,
            id,
            state: MoesiState::I,
        }
    }

    pub fn state(&self) -> MoesiState {
        self.state
    }

    fn transition(&mut self, to: MoesiState) {
        trace!("MOESI cache {} {:?}: {} -> {}", self.id, self.addr, self.state, to);
        self.state = to;
    }

    pub fn handle_local(
        &mut self,
        req: ProcSignal,
        bus: &mut dyn BusOps,
        stats: &mut Stats,
    ) -> Result<()> {
        match self.state {
            MoesiState::I => match req {
                ProcSignal::Read(addr) => {
                    bus.send_bus_rd(addr);
                    self.transition(MoesiState::ISE);
                    stats.record_miss();
                }
                ProcSignal::Write(addr) => {
                    bus.send_bus_rdx(addr);
                    self.transition(MoesiState::IM);
                    stats.record_miss();
                }
            },
            MoesiState::S => match req {
                ProcSignal::Read(addr) => {
                    bus.set_shared_line();
                    bus.reply_to_proc(addr);
                }
                ProcSignal::Write(addr) => {
                    bus.send_bus_rdx(addr);
                    self.transition(MoesiState::SM);
                    stats.record_miss();
                }
            },
            MoesiState::E => match req {
                ProcSignal::Read(addr) => bus.reply_to_proc(addr),
                ProcSignal::Write(addr) => {
                    bus.reply_to_proc(addr);
                    self.transition(MoesiState::M);
                    stats.record_silent_upgrade();
                }
            },
            MoesiState::O => match req {
                ProcSignal::Read(addr) => bus.reply_to_proc(addr),
                ProcSignal::Write(addr) => {
                    bus.send_bus_rdx(addr);
                    self.transition(MoesiState::OM);
                    stats.record_miss();
                }
            },
            MoesiState::M => bus.reply_to_proc(req.addr()),
            MoesiState::ISE | MoesiState::IM | MoesiState::SM | MoesiState::OM => {
                return Err(ProtocolError::AccessWhileOutstanding {
                    protocol: "MOESI",
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
            MoesiState::I => {}
            MoesiState::S => match sig {
                BusSignal::BusRd(_) => bus.set_shared_line(),
                BusSignal::BusRdX(_) => self.transition(MoesiState::I),
                BusSignal::BusData(_) => return Err(self.unexpected(requester, sig)),
            },
            MoesiState::E => match sig {
                BusSignal::BusRd(addr) => {
                    bus.send_data(addr, requester);
                    bus.set_shared_line();
                    self.transition(MoesiState::S);
                }
                BusSignal::BusRdX(addr) => {
                    bus.send_data(addr, requester);
                    self.transition(MoesiState::I);
                }
                BusSignal::BusData(_) => return Err(self.unexpected(requester, sig)),
            },
            MoesiState::O => match sig {
                BusSignal::BusRd(addr) => {
                    bus.send_data(addr, requester);
                    bus.set_shared_line();
                }
                BusSignal::BusRdX(addr) => {
                    bus.send_data(addr, requester);
                    self.transition(MoesiState::I);
                }
                BusSignal::BusData(_) => return Err(self.unexpected(requester, sig)),
            },
            MoesiState::M => match sig {
                BusSignal::BusRd(addr) => {
                    // keep ownership of the dirty data rather than dropping
                    // straight to S
                    bus.send_data(addr, requester);
                    bus.set_shared_line();
                    self.transition(MoesiState::O);
                }
                BusSignal::BusRdX(addr) => {
                    bus.send_data(addr, requester);
                    self.transition(MoesiState::I);
                }
                BusSignal::BusData(_) => return Err(self.unexpected(requester, sig)),
            },
            MoesiState::ISE => match sig {
                BusSignal::BusRd(_) | BusSignal::BusRdX(_) => {}
                BusSignal::BusData(addr) => {
                    if requester == self.id {
                        bus.reply_to_proc(addr);
                        if bus.shared_line() {
                            self.transition(MoesiState::S);
                        } else {
                            self.transition(MoesiState::E);
                        }
                    }
                }
            },
            MoesiState::IM => match sig {
                BusSignal::BusRd(_) | BusSignal::BusRdX(_) => {}
                BusSignal::BusData(addr) => {
                    if requester == self.id {
                        bus.reply_to_proc(addr);
                        self.transition(MoesiState::M);
                    }
                }
            },
            MoesiState::SM => match sig {
                BusSignal::BusRd(_) => bus.set_shared_line(),
                BusSignal::BusRdX(_) => self.transition(MoesiState::IM),
                BusSignal::BusData(addr) => {
                    if requester == self.id {
                        bus.reply_to_proc(addr);
                        self.transition(MoesiState::M);
                    }
                }
            },
            MoesiState::OM => match sig {
                BusSignal::BusRd(addr) => {
                    bus.send_data(addr, requester);
                    bus.set_shared_line();
                }
                BusSignal::BusRdX(addr) => {
                    bus.send_data(addr, requester);
                    self.transition(MoesiState::IM);
                }
                BusSignal::BusData(addr) => {
                    if requester == self.id {
                        bus.reply_to_proc(addr);
                        self.transition(MoesiState::M);
                    }
                }
            },
        }
        Ok(())
    }

    fn unexpected(&self, requester: CacheId, sig: BusSignal) -> ProtocolError {
        ProtocolError::UnexpectedSnoop {
            protocol: "MOESI",
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

    const A: Addr = Addr(0x100);

    fn in_state(state: MoesiState) -> Moesi {
        let mut p = Moesi::new(A, 0);
        p.state = state;
        p
    }

    #[test]
    fn modified_demotes_to_owned_on_snooped_read() {
        let mut p = in_state(MoesiState::M);
        let mut bus = RecordingBus::new();
        p.handle_snoop(1, BusSignal::BusRd(A), &mut bus).unwrap();
        assert_eq!(p.state(), MoesiState::O);
        assert!(bus.shared);
        assert_eq!(bus.actions, vec![Action::Data(A, 1)]);
    }

    #[test]
    fn owner_raises_line_and_supplies_without_demotion() {
        let mut p = in_state(MoesiState::O);
        let mut bus = RecordingBus::new();
        p.handle_snoop(1, BusSignal::BusRd(A), &mut bus).unwrap();
        assert_eq!(p.state(), MoesiState::O);
        assert!(bus.shared);
        assert_eq!(bus.actions, vec![Action::Data(A, 1)]);
    }

    #[test]
    fn read_miss_discovers_exclusivity_from_the_line() {
        let mut p = in_state(MoesiState::ISE);
        let mut bus = RecordingBus::new();
        p.handle_snoop(0, BusSignal::BusData(A), &mut bus).unwrap();
        assert_eq!(p.state(), MoesiState::E);

        let mut p = in_state(MoesiState::ISE);
        let mut bus = RecordingBus::with_shared_line();
        p.handle_snoop(0, BusSignal::BusData(A), &mut bus).unwrap();
        assert_eq!(p.state(), MoesiState::S);
    }

    #[test]
    fn exclusive_write_upgrades_silently() {
        let mut p = in_state(MoesiState::E);
        let mut bus = RecordingBus::new();
        let mut stats = Stats::new();
        p.handle_local(ProcSignal::Write(A), &mut bus, &mut stats).unwrap();
        assert_eq!(p.state(), MoesiState::M);
        assert_eq!(stats.silent_upgrades, 1);
        assert_eq!(stats.cache_misses, 0);
    }

    #[test]
    fn shared_upgrade_goes_through_sm() {
        let mut p = in_state(MoesiState::S);
        let mut bus = RecordingBus::new();
        let mut stats = Stats::new();
        p.handle_local(ProcSignal::Write(A), &mut bus, &mut stats).unwrap();
        assert_eq!(p.state(), MoesiState::SM);
        assert_eq!(bus.actions, vec![Action::BusRdX(A)]);
        assert_eq!(stats.cache_misses, 1);

        p.handle_snoop(0, BusSignal::BusData(A), &mut bus).unwrap();
        assert_eq!(p.state(), MoesiState::M);
    }

    #[test]
    fn upgrading_owner_is_demoted_by_competing_writer() {
        let mut p = in_state(MoesiState::OM);
        let mut bus = RecordingBus::new();
        p.handle_snoop(2, BusSignal::BusRdX(A), &mut bus).unwrap();
        assert_eq!(p.state(), MoesiState::IM);
        assert_eq!(bus.actions, vec![Action::Data(A, 2)]);

        p.handle_snoop(0, BusSignal::BusData(A), &mut bus).unwrap();
        assert_eq!(p.state(), MoesiState::M);
    }

    #[test]
    fn upgrading_owner_still_answers_readers() {
        let mut p = in_state(MoesiState::OM);
        let mut bus = RecordingBus::new();
        p.handle_snoop(1, BusSignal::BusRd(A), &mut bus).unwrap();
        assert_eq!(p.state(), MoesiState::OM);
        assert!(bus.shared);
        assert_eq!(bus.actions, vec![Action::Data(A, 1)]);
    }

    #[test]
    fn stable_owner_must_not_see_stray_data() {
        let mut p = in_state(MoesiState::O);
        let mut bus = RecordingBus::new();
        let err = p.handle_snoop(1, BusSignal::BusData(A), &mut bus).unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedSnoop { .. }));
    }

    #[test]
    fn local_access_while_waiting_is_a_violation() {
        for state in [MoesiState::ISE, MoesiState::IM, MoesiState::SM, MoesiState::OM] {
            let mut p = in_state(state);
            let mut bus = RecordingBus::new();
            let mut stats = Stats::new();
            let err = p
                .handle_local(ProcSignal::Read(A), &mut bus, &mut stats)
                .unwrap_err();
            assert!(matches!(err, ProtocolError::AccessWhileOutstanding { .. }));
        }
    }
}
