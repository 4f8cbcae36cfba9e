use std::collections::VecDeque;

use crate::commons::{Addr, CacheId};

/// Bus primitives consumed by the protocol controllers.
///
/// `send_bus_rd`/`send_bus_rdx` queue a read-share / read-exclusive request
/// for this block; `reply_to_proc` answers the local processor from the
/// cache; `send_data` puts the block's data on the bus addressed to another
/// cache; the shared line is the wired-OR raised by snoopers that still hold
/// a readable copy of the requested block.
pub trait BusOps {
    fn send_bus_rd(&mut self, addr: Addr);
    fn send_bus_rdx(&mut self, addr: Addr);
    fn reply_to_proc(&mut self, addr: Addr);
    fn send_data(&mut self, addr: Addr, dest: CacheId);
    fn set_shared_line(&mut self);
    fn shared_line(&self) -> bool;
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BusTxnKind {
    BusRd,
    BusRdX,
}

/// one queued bus transaction; `src` is the requester the data reply is
/// routed back to
#[derive(Clone, Copy, Debug)]
pub struct BusTxn {
    pub kind: BusTxnKind,
    pub addr: Addr,
    pub src: CacheId,
}

/// In-order broadcast bus. Requests queue up and are served one at a time;
/// requests never overtake each other, which gives every controller the same
/// total order of messages per address.
pub struct SystemBus {
    queue: VecDeque<BusTxn>,
    staged: Option<(BusTxnKind, Addr)>,
    data_dest: Option<CacheId>,
    shared_line: bool,
    pub data_traffic: u64,
    pub invalidations: u64,
    pub proc_replies: u64,
}

impl SystemBus {
    pub fn new() -> Self {
        SystemBus {
            queue: VecDeque::new(),
            staged: None,
            data_dest: None,
            shared_line: false,
            data_traffic: 0,
            invalidations: 0,
            proc_replies: 0,
        }
    }

    /// move the request staged by the controller just driven (if any) into
    /// the transaction queue, stamped with the requester's id
    pub(crate) fn commit_staged(&mut self, src: CacheId) -> bool {
        match self.staged.take() {
            Some((kind, addr)) => {
                if kind == BusTxnKind::BusRdX {
                    self.invalidations += 1;
                }
                self.queue.push_back(BusTxn { kind, addr, src });
                true
            }
            None => false,
        }
    }

    /// pop the next transaction and reset the per-transaction signals
    pub(crate) fn begin_txn(&mut self) -> Option<BusTxn> {
        let txn = self.queue.pop_front()?;
        self.shared_line = false;
        self.data_dest = None;
        Some(txn)
    }

    /// which cache supplied data during the current broadcast, if any
    pub(crate) fn data_supplied(&self) -> Option<CacheId> {
        self.data_dest
    }

    pub(crate) fn record_data_transfer(&mut self) {
        self.data_traffic += 1;
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl Default for SystemBus {
    fn default() -> Self {
        SystemBus::new()
    }
}

impl BusOps for SystemBus {
    fn send_bus_rd(&mut self, addr: Addr) {
        debug_assert!(self.staged.is_none(), "one bus message per call");
        self.staged = Some((BusTxnKind::BusRd, addr));
    }
    fn send_bus_rdx(&mut self, addr: Addr) {
        debug_assert!(self.staged.is_none(), "one bus message per call");
        self.staged = Some((BusTxnKind::BusRdX, addr));
    }
    fn reply_to_proc(&mut self, _addr: Addr) {
        self.proc_replies += 1;
    }
    fn send_data(&mut self, _addr: Addr, dest: CacheId) {
        self.data_dest = Some(dest);
    }
    fn set_shared_line(&mut self) {
        self.shared_line = true;
    }
    fn shared_line(&self) -> bool {
        self.shared_line
    }
}
